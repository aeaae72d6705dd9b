//! 引擎配置
//!
//! 通过 `config` crate 分层加载:内置默认值 -> 可选 `config/default.toml`
//! -> `SITECRAWL_` 前缀环境变量,例如 `SITECRAWL_CRAWLER__CONCURRENCY=20`。

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub crawler: CrawlerSettings,
    pub storage: StorageSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerSettings {
    /// 页面抓取并发上限
    pub concurrency: usize,
    /// 图片下载并发上限,独立于页面并发
    pub image_concurrency: usize,
    /// 单次运行 URL 总量上限
    pub max_urls: u32,
    /// 单个列表页最多提取的文章链接数
    pub max_links_per_page: usize,
    /// 兜底全链接提取的上限
    pub max_fallback_links: usize,
    /// 连接类失败的额外重试次数
    pub max_connect_retries: u32,
    pub default_request_interval_ms: u64,
    pub default_request_timeout_ms: u64,
    pub default_max_retries: u32,
    /// 小于该字节数的下载结果视为占位图
    pub min_image_bytes: u64,
    /// 收尾阶段等待单个工作协程的秒数
    pub worker_drain_secs: u64,
    /// 收尾阶段等待整个工作池的秒数
    pub pool_drain_secs: u64,
    /// 收尾阶段等待图片下载批次的秒数
    pub image_drain_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// 图片存储根目录
    pub image_base_path: String,
}

impl Default for CrawlerSettings {
    fn default() -> Self {
        Self {
            concurrency: 10,
            image_concurrency: 50,
            max_urls: 10_000,
            max_links_per_page: 20,
            max_fallback_links: 50,
            max_connect_retries: 2,
            default_request_interval_ms: 1000,
            default_request_timeout_ms: 30_000,
            default_max_retries: 3,
            min_image_bytes: 1024,
            worker_drain_secs: 30,
            pool_drain_secs: 60,
            image_drain_secs: 300,
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { image_base_path: "data/images".to_string() }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            crawler: CrawlerSettings::default(),
            storage: StorageSettings::default(),
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let defaults = CrawlerSettings::default();
        Config::builder()
            .set_default("crawler.concurrency", defaults.concurrency as u64)?
            .set_default("crawler.image_concurrency", defaults.image_concurrency as u64)?
            .set_default("crawler.max_urls", defaults.max_urls as u64)?
            .set_default("crawler.max_links_per_page", defaults.max_links_per_page as u64)?
            .set_default("crawler.max_fallback_links", defaults.max_fallback_links as u64)?
            .set_default("crawler.max_connect_retries", defaults.max_connect_retries as u64)?
            .set_default(
                "crawler.default_request_interval_ms",
                defaults.default_request_interval_ms,
            )?
            .set_default(
                "crawler.default_request_timeout_ms",
                defaults.default_request_timeout_ms,
            )?
            .set_default("crawler.default_max_retries", defaults.default_max_retries as u64)?
            .set_default("crawler.min_image_bytes", defaults.min_image_bytes)?
            .set_default("crawler.worker_drain_secs", defaults.worker_drain_secs)?
            .set_default("crawler.pool_drain_secs", defaults.pool_drain_secs)?
            .set_default("crawler.image_drain_secs", defaults.image_drain_secs)?
            .set_default("storage.image_base_path", StorageSettings::default().image_base_path)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(Environment::with_prefix("SITECRAWL").separator("__"))
            .build()?
            .try_deserialize()
    }
}
