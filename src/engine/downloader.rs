//! 图片下载器
//!
//! 独立于页面抓取池的并发配额(默认 50)。每张图首次失败后按
//! `task.max_retries`(封顶 3)重试,指数退避 1s/2s/4s;SOCKS 代理 TLS 握手
//! 失败同样降级为 HTTP CONNECT。响应是 HTML 时做一次真实地址
//! 提取(结构化优先,失败退正则扫描)再重下。小于阈值的响应
//! 按占位图处理。结果回写图片仓储。

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use url::Url;

use crate::config::CrawlerSettings;
use crate::domain::models::image::{CrawledImage, DownloadStatus};
use crate::domain::models::proxy::{EffectiveProxies, ProxyDescriptor};
use crate::domain::models::task::CrawlTask;
use crate::domain::repositories::{ImageRepository, StorageRepository};
use crate::utils::errors::FetchError;
use crate::utils::headers;
use crate::utils::url_utils::{file_extension, sanitize_file_name};

static FALLBACK_IMG_SEL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("img[src], img[data-src], img[data-original]").expect("static selector")
});
static INLINE_IMAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)https?://[^\s"'<>()]+\.(?:jpg|jpeg|png|webp|bmp)(?:\?[^\s"'<>()]*)?"#)
        .expect("static regex")
});
const FALLBACK_SKIP_WORDS: &[&str] = &["logo", "icon", "avatar", "banner", "sponsor", "adblock"];

pub struct ImageDownloader {
    images: Arc<dyn ImageRepository>,
    storage: Arc<dyn StorageRepository>,
    settings: CrawlerSettings,
    semaphore: Arc<Semaphore>,
}

impl ImageDownloader {
    pub fn new(
        images: Arc<dyn ImageRepository>,
        storage: Arc<dyn StorageRepository>,
        settings: CrawlerSettings,
    ) -> Self {
        let semaphore = Arc::new(Semaphore::new(settings.image_concurrency.max(1)));
        Self { images, storage, settings, semaphore }
    }

    /// 下载一张图并回写状态。占用图片池配额,内部完成全部重试,
    /// 不向调用方抛错。
    pub async fn download(
        &self,
        task: &CrawlTask,
        dir: &Path,
        mut image: CrawledImage,
        referer: &str,
        proxies: &EffectiveProxies,
        stop: &AtomicBool,
    ) {
        let _permit = match self.semaphore.acquire().await {
            Ok(p) => p,
            Err(_) => return,
        };

        match self.try_download(task, dir, &mut image, referer, proxies, stop).await {
            Ok(()) => {
                image.download_status = DownloadStatus::Success;
                image.error_msg = None;
            }
            Err(err) => {
                warn!(url = %image.url, error = %err, "image download failed");
                image.mark_failed(err.to_string());
            }
        }
        if let Err(err) = self.images.update(&image).await {
            warn!(image_id = %image.id, error = %err, "failed to persist image result");
        }
    }

    async fn try_download(
        &self,
        task: &CrawlTask,
        dir: &Path,
        image: &mut CrawledImage,
        referer: &str,
        proxies: &EffectiveProxies,
        stop: &AtomicBool,
    ) -> Result<(), FetchError> {
        let timeout = Duration::from_millis(task.request_timeout_ms.max(1)) * 2;
        let mut force_http_proxy = false;
        let mut fallback_used = false;
        let mut current_url = image.url.clone();
        let mut last_err = FetchError::Other("no attempt made".into());
        // 重试次数按任务配置,封顶 3 次
        let retries = task.max_retries.clamp(1, 3);

        for attempt in 0..=retries {
            if stop.load(Ordering::SeqCst) {
                return Err(FetchError::Interrupted);
            }
            if attempt > 0 {
                // 重试前退避 1s/2s/4s
                tokio::time::sleep(Duration::from_secs(1 << (attempt - 1))).await;
            }

            let proxy = if task.use_proxy { proxies.pick() } else { None };
            let fetched = self
                .fetch_once(task, &current_url, referer, proxy, force_http_proxy, attempt, timeout)
                .await;

            let response = match fetched {
                Ok(r) => r,
                Err(err) if err.is_tls_handshake() && !force_http_proxy
                    && proxy.map(ProxyDescriptor::is_socks).unwrap_or(false) =>
                {
                    warn!(url = %current_url, "tls handshake failed via socks proxy, downgrading");
                    force_http_proxy = true;
                    last_err = err;
                    continue;
                }
                Err(err) => {
                    last_err = err;
                    continue;
                }
            };

            if response.status != 200 {
                last_err = FetchError::HttpStatus(response.status);
                continue;
            }

            // 防盗链站点返回 HTML 包装页,提取真实图片地址后重下一次
            if response.content_type.starts_with("text/html") {
                if fallback_used {
                    last_err = FetchError::Other("image url keeps returning html".into());
                    continue;
                }
                fallback_used = true;
                let body = String::from_utf8_lossy(&response.bytes);
                match extract_real_image_url(&body, &current_url, &response.final_url) {
                    Some(real) if real != current_url => {
                        debug!(original = %current_url, real = %real, "extracted real image url from html");
                        current_url = real;
                        last_err = FetchError::Other("html wrapper page".into());
                        continue;
                    }
                    _ => {
                        last_err = FetchError::Other("html response without embedded image url".into());
                        continue;
                    }
                }
            }

            if (response.bytes.len() as u64) < self.settings.min_image_bytes {
                last_err =
                    FetchError::Other(format!("undersized image response: {} bytes", response.bytes.len()));
                continue;
            }

            return self.persist(dir, image, &current_url, &response.bytes).await;
        }
        Err(last_err)
    }

    async fn persist(
        &self,
        dir: &Path,
        image: &mut CrawledImage,
        final_url: &str,
        bytes: &[u8],
    ) -> Result<(), FetchError> {
        let ext = file_extension(final_url).unwrap_or_else(|| "jpg".to_string());
        let file_name = sanitize_file_name(&format!("{}.{}", image.id, ext));
        let relative = PathBuf::from(dir).join(&file_name);

        let written = self
            .storage
            .write_file(&relative, bytes)
            .await
            .map_err(|e| FetchError::Io(e.to_string()))?;

        let mut hasher = Sha256::new();
        hasher.update(bytes);
        image.file_name = Some(file_name);
        image.file_path = Some(relative.to_string_lossy().into_owned());
        image.file_size = Some(bytes.len() as u64);
        image.format = Some(ext);
        image.checksum = Some(hex::encode(hasher.finalize()));
        debug!(path = %written.display(), "image stored");
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn fetch_once(
        &self,
        task: &CrawlTask,
        url: &str,
        referer: &str,
        proxy: Option<&ProxyDescriptor>,
        force_http_proxy: bool,
        attempt: u32,
        timeout: Duration,
    ) -> Result<ImageResponse, FetchError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(headers::user_agent(task, attempt))
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(10));

        if let Some(descriptor) = proxy {
            let proxy_url = descriptor.proxy_url(force_http_proxy);
            let mut p = reqwest::Proxy::all(&proxy_url)
                .map_err(|e| FetchError::Other(format!("invalid proxy {}: {}", proxy_url, e)))?;
            if let Some(user) = descriptor.username.as_deref() {
                p = p.basic_auth(user, descriptor.password.as_deref().unwrap_or(""));
            }
            builder = builder.proxy(p);
        }
        let client = builder
            .build()
            .map_err(|e| FetchError::Other(format!("client build failed: {}", e)))?;

        let response = client
            .get(url)
            .headers(headers::image_headers(task, referer))
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
            .to_ascii_lowercase();
        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?.to_vec();

        Ok(ImageResponse { status, content_type, final_url, bytes })
    }
}

struct ImageResponse {
    status: u16,
    content_type: String,
    final_url: String,
    bytes: Vec<u8>,
}

/// 从 HTML 包装页里找真实图片地址。
/// 先按 DOM 选最大的 img,再退化为正则扫描内联地址。
fn extract_real_image_url(html: &str, original_url: &str, response_url: &str) -> Option<String> {
    let base = Url::parse(response_url)
        .or_else(|_| Url::parse(original_url))
        .ok()?;

    let doc = Html::parse_document(html);
    let mut best: Option<(u64, String)> = None;
    for img in doc.select(&FALLBACK_IMG_SEL) {
        let raw = img
            .value()
            .attr("src")
            .or_else(|| img.value().attr("data-src"))
            .or_else(|| img.value().attr("data-original"))
            .unwrap_or_default()
            .trim();
        if raw.is_empty() || raw.starts_with("data:") {
            continue;
        }
        let lower = raw.to_ascii_lowercase();
        if FALLBACK_SKIP_WORDS.iter().any(|w| lower.contains(w)) {
            continue;
        }
        let Ok(joined) = base.join(raw) else { continue };
        let area = declared_area(img);
        if best.as_ref().map(|(a, _)| area > *a).unwrap_or(true) {
            best = Some((area, joined.to_string()));
        }
    }
    if let Some((_, url)) = best {
        return Some(url);
    }

    INLINE_IMAGE_RE
        .find_iter(html)
        .map(|m| m.as_str().to_string())
        .find(|candidate| {
            let lower = candidate.to_ascii_lowercase();
            !FALLBACK_SKIP_WORDS.iter().any(|w| lower.contains(w))
        })
}

fn declared_area(img: scraper::ElementRef<'_>) -> u64 {
    let parse = |attr: Option<&str>| -> u64 {
        attr.and_then(|v| v.trim().trim_end_matches("px").parse().ok())
            .unwrap_or(1000)
    };
    parse(img.value().attr("width")) * parse(img.value().attr("height"))
}

#[cfg(test)]
#[path = "downloader_test.rs"]
mod downloader_test;
