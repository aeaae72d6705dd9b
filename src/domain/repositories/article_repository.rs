//! 文章仓储

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::article::CrawledArticle;
use crate::utils::errors::RepositoryError;

#[async_trait]
pub trait ArticleRepository: Send + Sync {
    async fn save(&self, article: &CrawledArticle) -> Result<(), RepositoryError>;

    async fn count_by_task(&self, task_id: Uuid) -> Result<u64, RepositoryError>;
}
