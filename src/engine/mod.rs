//! 采集引擎
//!
//! 调度器驱动一次任务运行:边界队列供给工作协程,抓取后分类页面,
//! 按类型走链接提取或正文/图片提取,图片交给独立下载池。

pub mod classifier;
pub mod context;
pub mod downloader;
pub mod extract;
pub mod fetcher;
pub mod frontier;
pub mod orchestrator;
pub mod progress;
pub mod proxy_resolver;
