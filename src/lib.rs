//! sitecrawl:站点采集引擎
//!
//! 面向“任务”的并发网页采集库:每个任务从若干起始 URL 出发,
//! 在深度与范围约束内抓取页面,自动区分列表页与详情页,抽取
//! 文章正文与配图,图片由独立并发池下载落盘。持久化、代理池
//! 与事件推送都以 trait 注入,库本身不绑定具体后端。
//!
//! ```no_run
//! use std::sync::Arc;
//! use sitecrawl::config::Settings;
//! use sitecrawl::engine::orchestrator::TaskOrchestrator;
//!
//! # async fn run(
//! #     tasks: Arc<dyn sitecrawl::domain::repositories::TaskRepository>,
//! #     articles: Arc<dyn sitecrawl::domain::repositories::ArticleRepository>,
//! #     images: Arc<dyn sitecrawl::domain::repositories::ImageRepository>,
//! #     logs: Arc<dyn sitecrawl::domain::repositories::LogRepository>,
//! #     proxies: Arc<dyn sitecrawl::domain::repositories::ProxyRepository>,
//! #     storage: Arc<dyn sitecrawl::domain::repositories::StorageRepository>,
//! #     publisher: Arc<dyn sitecrawl::engine::progress::ProgressPublisher>,
//! #     task_id: uuid::Uuid,
//! # ) -> anyhow::Result<()> {
//! let settings = Settings::new()?;
//! let orchestrator = Arc::new(TaskOrchestrator::new(
//!     settings, tasks, articles, images, logs, proxies, storage, publisher,
//! ));
//! orchestrator.start(task_id).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod domain;
pub mod engine;
pub mod utils;

pub use config::Settings;
pub use domain::models::task::{CrawlScope, CrawlTask, CrawlType, TaskStatus};
pub use engine::orchestrator::TaskOrchestrator;
pub use utils::errors::ControlError;
pub use utils::telemetry::init_tracing;
