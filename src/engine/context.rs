//! 单次任务运行的共享状态
//!
//! 边界队列、停止标志、计数器与图片目录缓存都挂在这里,
//! 工作协程之间通过 Arc 共享。

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::config::CrawlerSettings;
use crate::domain::models::article::CrawledArticle;
use crate::domain::models::task::CrawlTask;
use crate::engine::frontier::Frontier;
use crate::utils::url_utils::base_url;

pub struct RunContext {
    pub task_id: Uuid,
    pub frontier: Frontier,
    pub stop: Arc<AtomicBool>,

    pub crawled_urls: AtomicU32,
    pub success_count: AtomicU32,
    pub error_count: AtomicU32,
    /// 已处理的列表页数量,翻页预算用
    pub list_pages_processed: AtomicU32,
    /// 代理决策日志只打一次
    pub proxy_logged: AtomicBool,

    /// 文章 id -> 图片目录名
    folder_cache: DashMap<Uuid, String>,
    /// 脱离页面生命周期的图片下载协程
    pub downloads: Mutex<JoinSet<()>>,
}

impl RunContext {
    pub fn new(task: &CrawlTask, settings: &CrawlerSettings, stop: Arc<AtomicBool>) -> Self {
        let base = task
            .start_urls
            .first()
            .map(|u| base_url(u))
            .unwrap_or_default();
        Self {
            task_id: task.id,
            frontier: Frontier::new(task.scope, base, task.max_depth, settings.max_urls),
            stop,
            crawled_urls: AtomicU32::new(0),
            success_count: AtomicU32::new(0),
            error_count: AtomicU32::new(0),
            list_pages_processed: AtomicU32::new(0),
            proxy_logged: AtomicBool::new(false),
            folder_cache: DashMap::new(),
            downloads: Mutex::new(JoinSet::new()),
        }
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    pub fn crawled(&self) -> u32 {
        self.crawled_urls.load(Ordering::SeqCst)
    }

    /// 文章保存后登记图片目录
    pub fn register_article_folder(&self, article: &CrawledArticle) {
        self.folder_cache.insert(article.id, article.folder_name());
    }

    /// 图片落盘目录:有文章用 `<文章id>_<时间戳>`,否则 `task_<任务id>`
    pub fn image_dir(&self, article_id: Option<Uuid>) -> PathBuf {
        match article_id {
            Some(id) => {
                let folder = self
                    .folder_cache
                    .entry(id)
                    .or_insert_with(|| format!("{}_{}", id, Utc::now().format("%Y%m%d%H%M%S")));
                PathBuf::from(folder.value().clone())
            }
            None => PathBuf::from(format!("task_{}", self.task_id)),
        }
    }
}
