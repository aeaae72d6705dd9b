//! 错误类型定义
//!
//! 按关注点拆分错误枚举:抓取错误、任务控制错误、仓储错误、存储错误。
//! 抓取错误额外区分连接类失败,用于重试与代理降级判断。

use thiserror::Error;
use uuid::Uuid;

use crate::domain::models::task::TaskStatus;

/// 单次页面/图片请求的失败原因
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("connect failed: {0}")]
    Connect(String),

    #[error("dns lookup failed: {0}")]
    Dns(String),

    #[error("tls handshake failed: {0}")]
    Tls(String),

    #[error("http status {0}")]
    HttpStatus(u16),

    #[error("io error: {0}")]
    Io(String),

    #[error("stop requested")]
    Interrupted,

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// 连接类失败:超时、拒绝连接、DNS、TLS 握手
    pub fn is_connect_class(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_) | FetchError::Connect(_) | FetchError::Dns(_) | FetchError::Tls(_)
        )
    }

    pub fn is_tls_handshake(&self) -> bool {
        matches!(self, FetchError::Tls(_))
    }

    /// 将 reqwest 错误映射为抓取错误,需要遍历 source 链判断底层原因
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        let chain = error_chain(&err);
        if err.is_timeout() {
            FetchError::Timeout(chain)
        } else if chain.contains("dns") {
            FetchError::Dns(chain)
        } else if chain.contains("handshake") || chain.contains("certificate") || chain.contains("tls") {
            FetchError::Tls(chain)
        } else if err.is_connect() {
            FetchError::Connect(chain)
        } else {
            FetchError::Io(chain)
        }
    }
}

/// 拼接错误及其 source 链的小写描述
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut cur = err.source();
    while let Some(src) = cur {
        parts.push(src.to_string());
        cur = src.source();
    }
    parts.join(": ").to_lowercase()
}

/// 任务生命周期控制错误
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("task {0} not found")]
    NotFound(Uuid),

    #[error("task {0} in invalid state {1}")]
    InvalidState(Uuid, TaskStatus),

    #[error("task {0} is not running")]
    NotRunning(Uuid),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// 仓储层错误,核心引擎不关心具体后端
#[derive(Error, Debug)]
pub enum RepositoryError {
    #[error("storage backend error: {0}")]
    Backend(String),

    #[error("record not found")]
    NotFound,
}

/// 文件存储错误
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid path: {0}")]
    InvalidPath(String),
}
