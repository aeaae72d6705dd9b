//! 任务日志仓储

use async_trait::async_trait;

use crate::domain::models::log::CrawlLogEntry;
use crate::utils::errors::RepositoryError;

#[async_trait]
pub trait LogRepository: Send + Sync {
    async fn append(&self, entry: &CrawlLogEntry) -> Result<(), RepositoryError>;
}
