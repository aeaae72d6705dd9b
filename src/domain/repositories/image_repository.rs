//! 图片仓储

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::models::image::CrawledImage;
use crate::utils::errors::RepositoryError;

#[async_trait]
pub trait ImageRepository: Send + Sync {
    /// 发现阶段以 PENDING 入库
    async fn save(&self, image: &CrawledImage) -> Result<(), RepositoryError>;

    /// 下载完成后回写状态与文件信息
    async fn update(&self, image: &CrawledImage) -> Result<(), RepositoryError>;

    async fn count_by_task(&self, task_id: Uuid) -> Result<u64, RepositoryError>;
}
