//! 代理模型
//!
//! 代理来源三级决策:任务自带列表优先,其次全局代理池,最后直连。

use serde::{Deserialize, Serialize};

/// 代理协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProxyScheme {
    Http,
    Socks,
}

impl Default for ProxyScheme {
    fn default() -> Self {
        ProxyScheme::Http
    }
}

/// 单个代理端点
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProxyDescriptor {
    #[serde(default, rename = "proxyType")]
    pub scheme: ProxyScheme,
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl ProxyDescriptor {
    /// reqwest 可用的代理 URL。`force_http` 时 SOCKS 端点降级为
    /// HTTP CONNECT,用于 TLS 握手失败后的重试。
    pub fn proxy_url(&self, force_http: bool) -> String {
        let scheme = match self.scheme {
            ProxyScheme::Socks if !force_http => "socks5",
            _ => "http",
        };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    pub fn is_socks(&self) -> bool {
        self.scheme == ProxyScheme::Socks
    }
}

/// 代理决策来源
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxySource {
    Task,
    Global,
    None,
}

impl std::fmt::Display for ProxySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProxySource::Task => "TASK",
            ProxySource::Global => "GLOBAL",
            ProxySource::None => "NONE",
        };
        f.write_str(s)
    }
}

/// 任务一次运行内生效的代理集合
#[derive(Debug, Clone)]
pub struct EffectiveProxies {
    pub source: ProxySource,
    pub proxies: Vec<ProxyDescriptor>,
}

impl EffectiveProxies {
    pub fn none() -> Self {
        Self { source: ProxySource::None, proxies: Vec::new() }
    }

    /// 随机取一个代理,空集合返回 None 表示直连
    pub fn pick(&self) -> Option<&ProxyDescriptor> {
        if self.proxies.is_empty() {
            return None;
        }
        let idx = rand::random_range(0..self.proxies.len());
        self.proxies.get(idx)
    }
}
