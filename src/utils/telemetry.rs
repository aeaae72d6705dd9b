//! 日志初始化
//!
//! 基于 `tracing-subscriber` 的 EnvFilter,默认 info 级别,
//! 可通过 `RUST_LOG` 覆盖,例如 `RUST_LOG=sitecrawl=debug`。

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 初始化全局日志订阅器,重复调用静默忽略(测试场景常见)
pub fn init_tracing(json_output: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json_output {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true)).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already initialized");
    }
}
