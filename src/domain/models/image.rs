//! 图片模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::models::article::sha256_hex;
use crate::utils::url_utils::file_extension;

/// 图片下载状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStatus {
    Pending,
    Success,
    Failed,
}

/// 页面中发现的图片,先以 PENDING 入库,下载器再回写结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledImage {
    pub id: Uuid,
    pub task_id: Uuid,
    /// 关联文章,纯图片任务下可能为空
    pub article_id: Option<Uuid>,
    pub url: String,
    pub url_hash: String,
    pub file_name: Option<String>,
    /// 相对存储根的目录,由存储实现落到具体位置
    pub file_path: Option<String>,
    pub file_size: Option<u64>,
    pub format: Option<String>,
    /// 图片字节的 sha256
    pub checksum: Option<String>,
    pub download_status: DownloadStatus,
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CrawledImage {
    pub fn new(task_id: Uuid, article_id: Option<Uuid>, url: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            article_id,
            url: url.to_string(),
            url_hash: sha256_hex(url),
            file_name: None,
            file_path: None,
            file_size: None,
            format: file_extension(url),
            checksum: None,
            download_status: DownloadStatus::Pending,
            error_msg: None,
            created_at: Utc::now(),
        }
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.download_status = DownloadStatus::Failed;
        self.error_msg = Some(reason.into());
    }
}
