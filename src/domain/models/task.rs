//! 采集任务模型
//!
//! 任务携带全部抓取参数:起始 URL、深度与范围、请求节奏、代理与
//! 选择器配置。自定义头/Cookie/代理列表在任务装载时解析一次,
//! 引擎内部不再处理原始字符串。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::domain::models::proxy::ProxyDescriptor;

/// 任务生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
    Error,
    Stopped,
}

impl TaskStatus {
    /// 终态:完成、出错、停止
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error | TaskStatus::Stopped)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::NotStarted => "NOT_STARTED",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Paused => "PAUSED",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Error => "ERROR",
            TaskStatus::Stopped => "STOPPED",
        };
        f.write_str(s)
    }
}

/// 采集内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlType {
    Article,
    Image,
    Both,
}

impl CrawlType {
    pub fn wants_article(&self) -> bool {
        matches!(self, CrawlType::Article | CrawlType::Both)
    }

    pub fn wants_images(&self) -> bool {
        matches!(self, CrawlType::Image | CrawlType::Both)
    }
}

/// 抓取范围:仅同站点或不限制
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrawlScope {
    Site,
    All,
}

/// 自定义请求头:JSON 对象解析为结构化键值,否则保留原文并忽略
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderSpec {
    Structured(HashMap<String, String>),
    Raw(String),
}

impl HeaderSpec {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match serde_json::from_str::<HashMap<String, serde_json::Value>>(trimmed) {
            Ok(map) => HeaderSpec::Structured(
                map.into_iter()
                    .map(|(k, v)| (k, json_to_string(v)))
                    .collect(),
            ),
            Err(_) => {
                warn!("header spec is not a json object, keeping raw form");
                HeaderSpec::Raw(trimmed.to_string())
            }
        }
    }

    /// 可直接应用的键值对,原文形式无法安全拆分时返回空
    pub fn entries(&self) -> Vec<(String, String)> {
        match self {
            HeaderSpec::Structured(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            HeaderSpec::Raw(_) => Vec::new(),
        }
    }
}

/// 自定义 Cookie:JSON 对象或 `k=v; k=v` 原始串都接受
#[derive(Debug, Clone, PartialEq)]
pub enum CookieSpec {
    Structured(HashMap<String, String>),
    Raw(String),
}

impl CookieSpec {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('{') {
            if let Ok(map) = serde_json::from_str::<HashMap<String, serde_json::Value>>(trimmed) {
                return CookieSpec::Structured(
                    map.into_iter()
                        .map(|(k, v)| (k, json_to_string(v)))
                        .collect(),
                );
            }
            warn!("cookie spec looks like json but failed to parse, treating as raw");
        }
        CookieSpec::Raw(trimmed.to_string())
    }

    pub fn pairs(&self) -> Vec<(String, String)> {
        match self {
            CookieSpec::Structured(map) => {
                map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
            }
            CookieSpec::Raw(raw) => raw
                .split(';')
                .filter_map(|part| {
                    let (k, v) = part.split_once('=')?;
                    let k = k.trim();
                    if k.is_empty() {
                        return None;
                    }
                    Some((k.to_string(), v.trim().to_string()))
                })
                .collect(),
        }
    }
}

fn json_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

/// 采集任务
#[derive(Debug, Clone)]
pub struct CrawlTask {
    pub id: Uuid,
    pub name: String,
    pub start_urls: Vec<String>,
    pub crawl_type: CrawlType,
    pub scope: CrawlScope,
    pub max_depth: u32,
    /// 列表页翻页上限,小于 2 表示不翻页
    pub list_max_pages: u32,

    pub request_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub max_retries: u32,
    /// 请求间隔在 0.5~1.5 倍区间内随机
    pub random_interval: bool,

    pub user_agent: Option<String>,
    pub rotate_user_agent: bool,
    pub headers: Option<HeaderSpec>,
    pub cookies: Option<CookieSpec>,
    pub referer: Option<String>,

    pub use_proxy: bool,
    pub proxy_list: Vec<ProxyDescriptor>,

    pub download_images: bool,
    pub content_selector: Option<String>,
    pub image_selector: Option<String>,
    pub exclude_selector: Option<String>,

    pub status: TaskStatus,
    pub total_urls: u32,
    pub crawled_urls: u32,
    pub success_count: u32,
    pub error_count: u32,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub error_msg: Option<String>,
}

impl CrawlTask {
    pub fn new(name: impl Into<String>, start_urls: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            start_urls,
            crawl_type: CrawlType::Both,
            scope: CrawlScope::Site,
            max_depth: 3,
            list_max_pages: 1,
            request_interval_ms: 1000,
            request_timeout_ms: 30_000,
            max_retries: 3,
            random_interval: false,
            user_agent: None,
            rotate_user_agent: false,
            headers: None,
            cookies: None,
            referer: None,
            use_proxy: false,
            proxy_list: Vec::new(),
            download_images: false,
            content_selector: None,
            image_selector: None,
            exclude_selector: None,
            status: TaskStatus::NotStarted,
            total_urls: 0,
            crawled_urls: 0,
            success_count: 0,
            error_count: 0,
            start_time: None,
            end_time: None,
            error_msg: None,
        }
    }

    /// 解析任务存储的代理列表 JSON,忽略无法解析的条目
    pub fn parse_proxy_list(raw: &str) -> Vec<ProxyDescriptor> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<ProxyDescriptor>>(trimmed) {
            Ok(list) => list.into_iter().filter(|p| !p.host.is_empty()).collect(),
            Err(err) => {
                warn!(error = %err, "failed to parse task proxy list");
                Vec::new()
            }
        }
    }

    /// Cookie 头的值,无配置或为空时 None
    pub fn cookie_header(&self) -> Option<String> {
        let pairs = self.cookies.as_ref()?.pairs();
        if pairs.is_empty() {
            return None;
        }
        Some(
            pairs
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// 清洗后的正文选择器
    pub fn content_selector(&self) -> Option<&str> {
        self.content_selector.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn image_selector(&self) -> Option<&str> {
        self.image_selector.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn exclude_selector(&self) -> Option<&str> {
        self.exclude_selector.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
