//! 页面抓取
//!
//! 每次尝试新建 reqwest 客户端,带任务级超时、重定向上限与
//! 可选代理。重试分两条阶梯:连接类失败最多追加
//! `max_connect_retries` 次,退避 2s 线性递增;SOCKS 代理 TLS
//! 握手失败时降级为 HTTP CONNECT 再试;普通 IO 失败只追加一次。
//! HTTP >= 400 直接判失败,不重试。

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::CrawlerSettings;
use crate::domain::models::proxy::{EffectiveProxies, ProxyDescriptor};
use crate::domain::models::task::CrawlTask;
use crate::utils::errors::FetchError;
use crate::utils::headers;

/// 抓取结果
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// 重定向后的最终 URL
    pub url: String,
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

pub struct PageFetcher {
    settings: CrawlerSettings,
}

impl PageFetcher {
    pub fn new(settings: CrawlerSettings) -> Self {
        Self { settings }
    }

    /// 抓取单个页面,内部完成全部重试。停止标志在每次尝试前检查。
    pub async fn fetch_page(
        &self,
        task: &CrawlTask,
        url: &str,
        proxies: &EffectiveProxies,
        stop: &AtomicBool,
    ) -> Result<FetchedPage, FetchError> {
        let timeout = Duration::from_millis(task.request_timeout_ms.max(1));
        let max_retries = task.max_retries;
        let max_connect = self.settings.max_connect_retries;
        // TLS 降级标志对单个 URL 生效,成功后自动复位(下一 URL 重新开始)
        let mut force_http_proxy = false;
        let mut io_retried = false;
        let mut last_err = FetchError::Other("no attempt made".into());

        for attempt in 0..=max_retries {
            if stop.load(Ordering::SeqCst) {
                return Err(FetchError::Interrupted);
            }
            let proxy = proxies.pick();
            match self.execute(task, url, proxy, force_http_proxy, attempt, timeout).await {
                Ok(page) => {
                    if page.status >= 400 {
                        warn!(url, status = page.status, "http error status, not retrying");
                        return Err(FetchError::HttpStatus(page.status));
                    }
                    return Ok(page);
                }
                Err(err) if err.is_connect_class() => {
                    let socks_active = proxy.map(ProxyDescriptor::is_socks).unwrap_or(false);
                    if err.is_tls_handshake() && socks_active && !force_http_proxy {
                        warn!(url, "tls handshake failed via socks proxy, downgrading to http connect");
                        force_http_proxy = true;
                        last_err = err;
                        continue;
                    }
                    if attempt < max_connect {
                        let backoff = Duration::from_secs(2 * (attempt as u64 + 1));
                        warn!(url, attempt, error = %err, backoff_secs = backoff.as_secs(), "connect failed, retrying");
                        last_err = err;
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    warn!(url, attempt, error = %err, "connect retries exhausted");
                    return Err(err);
                }
                Err(err @ FetchError::Io(_)) => {
                    if !io_retried && attempt < max_retries {
                        warn!(url, attempt, error = %err, "io failure, one more attempt after 2s");
                        io_retried = true;
                        last_err = err;
                        tokio::time::sleep(Duration::from_secs(2)).await;
                        continue;
                    }
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
        Err(last_err)
    }

    async fn execute(
        &self,
        task: &CrawlTask,
        url: &str,
        proxy: Option<&ProxyDescriptor>,
        force_http_proxy: bool,
        attempt: u32,
        timeout: Duration,
    ) -> Result<FetchedPage, FetchError> {
        let client = build_client(task, proxy, force_http_proxy, attempt, timeout)?;
        debug!(url, attempt, proxy = proxy.map(|p| p.host.as_str()).unwrap_or("direct"), "sending request");

        let response = client
            .get(url)
            .headers(headers::page_headers(task, url))
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.map_err(FetchError::from_reqwest)?;

        Ok(FetchedPage { url: final_url, status, content_type, body })
    }
}

/// 每次尝试独立构建客户端,避免坏连接复用
fn build_client(
    task: &CrawlTask,
    proxy: Option<&ProxyDescriptor>,
    force_http_proxy: bool,
    attempt: u32,
    timeout: Duration,
) -> Result<reqwest::Client, FetchError> {
    let mut builder = reqwest::Client::builder()
        .user_agent(headers::user_agent(task, attempt))
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(15)))
        .redirect(reqwest::redirect::Policy::limited(10))
        .cookie_store(true);

    if let Some(descriptor) = proxy {
        let url = descriptor.proxy_url(force_http_proxy);
        let mut proxy = reqwest::Proxy::all(&url)
            .map_err(|e| FetchError::Other(format!("invalid proxy {}: {}", url, e)))?;
        if let Some(user) = descriptor.username.as_deref() {
            proxy = proxy.basic_auth(user, descriptor.password.as_deref().unwrap_or(""));
        }
        builder = builder.proxy(proxy);
    }

    builder
        .build()
        .map_err(|e| FetchError::Other(format!("client build failed: {}", e)))
}

#[cfg(test)]
#[path = "fetcher_test.rs"]
mod fetcher_test;
