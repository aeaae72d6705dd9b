//! 任务仓储

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::task::CrawlTask;
use crate::utils::errors::RepositoryError;

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<CrawlTask>, RepositoryError>;

    /// 整体覆盖写回:状态、计数器、起止时间
    async fn update(&self, task: &CrawlTask) -> Result<(), RepositoryError>;
}
