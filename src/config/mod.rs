//! 配置模块

pub mod settings;

pub use settings::{CrawlerSettings, Settings, StorageSettings};
