//! 列表页翻页
//!
//! 只有显式配置 `list_max_pages >= 2` 才追翻页。下一页链接先查
//! 结构化选择器(rel=next 及常见翻页类名),再按锚文本
//! “下一页/Next/›/»”匹配。翻页入队深度与当前列表页相同层级 +1,
//! 已处理列表页计数到达上限后不再追页。

use std::sync::atomic::{AtomicU32, Ordering};

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::engine::frontier::Frontier;
use crate::utils::url_utils::normalize_url;

fn sel(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

static DIRECT_NEXT_SELS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "a[rel=next]",
        "a.next",
        ".pagination a.next",
        ".pagination a.page-next",
        ".page-numbers a.next",
        "a.page-numbers.next",
        ".page-nav a.next",
        ".pager a.next",
    ]
    .iter()
    .map(|s| sel(s))
    .collect()
});

static PAGINATION_ANCHOR_SEL: Lazy<Selector> =
    Lazy::new(|| sel(".pagination a[href], .page-numbers a[href], .page-nav a[href], .pager a[href], .pages a[href], a[href]"));

static NEXT_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(下一页|下一頁|Next\s*»?|›|»)\s*$").expect("static regex"));

/// 若还有翻页额度,提取并入队下一页。返回是否入队成功。
pub fn maybe_enqueue_next_page(
    list_max_pages: u32,
    pages_processed: &AtomicU32,
    page_url: &Url,
    doc: &Html,
    frontier: &Frontier,
    current_depth: u32,
) -> bool {
    if list_max_pages < 2 {
        return false;
    }
    let processed = pages_processed.fetch_add(1, Ordering::SeqCst) + 1;
    if processed >= list_max_pages {
        debug!(page = %page_url, processed, "list page budget reached, no more pagination");
        return false;
    }
    let Some(next) = find_next_page_url(doc, page_url) else {
        return false;
    };
    let added = frontier.enqueue(&next, current_depth + 1);
    if added {
        debug!(page = %page_url, next = %next, "pagination link enqueued");
    }
    added
}

/// 查找下一页的绝对 URL
pub fn find_next_page_url(doc: &Html, page_url: &Url) -> Option<String> {
    for selector in DIRECT_NEXT_SELS.iter() {
        for anchor in doc.select(selector) {
            if let Some(url) = resolve(anchor.value().attr("href"), page_url) {
                return Some(url);
            }
        }
    }
    for anchor in doc.select(&PAGINATION_ANCHOR_SEL).take(300) {
        let text = anchor.text().collect::<String>();
        if NEXT_TEXT_RE.is_match(&text) {
            if let Some(url) = resolve(anchor.value().attr("href"), page_url) {
                return Some(url);
            }
        }
    }
    None
}

fn resolve(href: Option<&str>, page_url: &Url) -> Option<String> {
    let raw = href?.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.starts_with("javascript:") {
        return None;
    }
    let joined = page_url.join(raw).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    let normalized = normalize_url(joined.as_str());
    // 下一页指回自身说明翻页已到尽头
    if normalized == normalize_url(page_url.as_str()) {
        return None;
    }
    Some(normalized)
}
