//! 文章模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::utils::url_utils::base_url;

/// 审核状态,新抓取的文章一律待审
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Pending,
    Approved,
    Rejected,
}

/// 抓取到的文章
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledArticle {
    pub id: Uuid,
    pub task_id: Uuid,
    pub url: String,
    /// URL 的 sha256,用于去重索引
    pub url_hash: String,
    pub title: String,
    pub content: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub publish_time: Option<DateTime<Utc>>,
    pub source_site: String,
    pub audit_status: AuditStatus,
    pub created_at: DateTime<Utc>,
}

impl CrawledArticle {
    pub fn new(task_id: Uuid, url: &str, title: String, content: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            url: url.to_string(),
            url_hash: sha256_hex(url),
            title,
            content,
            summary: None,
            author: None,
            publish_time: None,
            source_site: base_url(url),
            audit_status: AuditStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// 图片落盘目录名 `<文章id>_<yyyyMMddHHmmss>`
    pub fn folder_name(&self) -> String {
        format!("{}_{}", self.id, self.created_at.format("%Y%m%d%H%M%S"))
    }
}

pub fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_article_hashes_url_and_derives_site() {
        let article = CrawledArticle::new(
            Uuid::new_v4(),
            "https://example.com/post/1.html",
            "标题".into(),
            "正文".into(),
        );
        assert_eq!(article.url_hash.len(), 64);
        assert_eq!(article.source_site, "https://example.com");
        assert_eq!(article.audit_status, AuditStatus::Pending);
    }

    #[test]
    fn folder_name_embeds_timestamp() {
        let article = CrawledArticle::new(Uuid::new_v4(), "https://e.com/a", "t".into(), "c".into());
        let folder = article.folder_name();
        assert!(folder.starts_with(&article.id.to_string()));
        assert_eq!(folder.rsplit('_').next().unwrap().len(), 14);
    }
}
