//! 全局代理池仓储

use async_trait::async_trait;

use crate::domain::models::proxy::ProxyDescriptor;
use crate::utils::errors::RepositoryError;

#[async_trait]
pub trait ProxyRepository: Send + Sync {
    /// 当前启用的全局代理
    async fn list_enabled(&self) -> Result<Vec<ProxyDescriptor>, RepositoryError>;
}
