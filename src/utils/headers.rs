//! 请求头构造
//!
//! 默认浏览器头、UA 轮换池以及按任务配置覆盖的合并逻辑。

use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::domain::models::task::{CrawlTask, HeaderSpec};
use crate::utils::url_utils::base_url;

/// UA 轮换池,覆盖主流桌面浏览器
pub const USER_AGENT_POOL: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
];

const DEFAULT_UA: &str = USER_AGENT_POOL[0];

/// 选择本次请求的 UA:自定义优先,开启轮换时按时间与尝试次数取池内一项
pub fn user_agent(task: &CrawlTask, attempt: u32) -> String {
    if let Some(custom) = task.user_agent.as_deref() {
        let custom = custom.trim();
        if !custom.is_empty() && !task.rotate_user_agent {
            return custom.to_string();
        }
    }
    if task.rotate_user_agent {
        let pool_len = USER_AGENT_POOL.len();
        let tick = (Utc::now().timestamp_millis() as usize) % pool_len;
        return USER_AGENT_POOL[(attempt as usize + tick) % pool_len].to_string();
    }
    task.user_agent
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_UA)
        .to_string()
}

/// 页面请求头:默认浏览器头,任务的结构化自定义头覆盖同名项
pub fn page_headers(task: &CrawlTask, target_url: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, "Accept", "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8");
    insert(&mut headers, "Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8");
    insert(&mut headers, "Cache-Control", "no-cache");
    insert(&mut headers, "Pragma", "no-cache");
    insert(&mut headers, "Upgrade-Insecure-Requests", "1");

    apply_task_overrides(&mut headers, task, target_url);
    headers
}

/// 图片请求头:Accept 指向图片类型,其余沿用任务覆盖
pub fn image_headers(task: &CrawlTask, referer: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    insert(&mut headers, "Accept", "image/avif,image/webp,image/apng,image/*,*/*;q=0.8");
    insert(&mut headers, "Accept-Language", "zh-CN,zh;q=0.9,en;q=0.8");
    insert(&mut headers, "Referer", referer);

    if let Some(spec) = &task.headers {
        merge_spec(&mut headers, spec);
    }
    if let Some(cookie) = task.cookie_header() {
        insert(&mut headers, "Cookie", &cookie);
    }
    headers
}

fn apply_task_overrides(headers: &mut HeaderMap, task: &CrawlTask, target_url: &str) {
    if let Some(spec) = &task.headers {
        merge_spec(headers, spec);
    }

    let referer = task
        .referer
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| base_url(target_url));
    insert(headers, "Referer", &referer);

    if let Some(cookie) = task.cookie_header() {
        insert(headers, "Cookie", &cookie);
    }
}

fn merge_spec(headers: &mut HeaderMap, spec: &HeaderSpec) {
    for (name, value) in spec.entries() {
        insert(headers, &name, &value);
    }
}

fn insert(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::from_bytes(name.as_bytes()),
        HeaderValue::from_str(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => warn!(header = name, "skipping invalid header"),
    }
}
