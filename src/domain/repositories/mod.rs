//! 仓储抽象
//!
//! 引擎只依赖这些 trait,持久化后端由调用方注入。

pub mod article_repository;
pub mod image_repository;
pub mod log_repository;
pub mod proxy_repository;
pub mod storage_repository;
pub mod task_repository;

pub use article_repository::ArticleRepository;
pub use image_repository::ImageRepository;
pub use log_repository::LogRepository;
pub use proxy_repository::ProxyRepository;
pub use storage_repository::{LocalStorage, StorageRepository};
pub use task_repository::TaskRepository;
