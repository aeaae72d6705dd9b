//! 列表页文章链接抽取
//!
//! 两段式策略:先找图文卡片容器,每张卡片按图片锚点、标题锚点、
//! 首个内容锚点的顺序取一条链接;卡片不足两张时回退传统列表
//! 选择器。候选链接统一做文章形态校验后入队,深度为发现页 +1。

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::engine::frontier::Frontier;
use crate::utils::url_utils::{normalize_url, path_segment_count};

fn sel(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

static CARD_CONTAINER_SELS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        "article.post",
        "article.entry",
        "article",
        ".post-item",
        ".entry-item",
        ".news-item",
        ".post-card",
        ".card",
        ".post",
        ".entry",
        "li.item",
    ]
    .iter()
    .map(|s| sel(s))
    .collect()
});

static TRADITIONAL_LINK_SELS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        ".article-list a[href]",
        ".post-list a[href]",
        ".news-list a[href]",
        ".item-list a[href]",
        "ul.posts a[href]",
        ".list-item a[href]",
        "h2 a[href]",
        "h3 a[href]",
        ".title a[href]",
        ".entry-title a[href]",
        ".post-title a[href]",
        ".headline a[href]",
    ]
    .iter()
    .map(|s| sel(s))
    .collect()
});

static TITLE_ANCHOR_SEL: Lazy<Selector> =
    Lazy::new(|| sel("h2 a[href], h3 a[href], h4 a[href], .title a[href], .entry-title a[href], .post-title a[href]"));
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| sel("a[href]"));
static IMG_SEL: Lazy<Selector> = Lazy::new(|| sel("img"));
static ALL_ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| sel("a[href]"));

static ARTICLE_PATH_MARKERS: &[&str] =
    &["/article/", "/post/", "/news/", "/detail/", "/view/"];
static NON_ARTICLE_MARKERS: &[&str] = &[
    "/tag/", "/author/", "/page/", "/search", "/login", "/register", "/about", "/contact",
    "/feed", "/rss", "/wp-admin", "/wp-login", "javascript:", "mailto:", "#",
];
static NUMERIC_SEGMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/\d+").expect("static regex"));
static CATEGORY_PAGED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/category/[^/]+(/[^/]+)*/page/\d+").expect("static regex"));

/// 一次列表页抽取的结果
#[derive(Debug, Default)]
pub struct LinkExtraction {
    pub found: usize,
    pub enqueued: usize,
    pub used_card_strategy: bool,
}

/// 从列表页提取文章链接并入队,入队深度固定为 1(文章层)。
/// 每页最多入队 `max_per_page` 条。
pub fn extract_article_links(
    page_url: &Url,
    doc: &Html,
    frontier: &Frontier,
    max_per_page: usize,
) -> LinkExtraction {
    let mut result = LinkExtraction::default();
    let mut candidates: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // 图文卡片优先
    for selector in CARD_CONTAINER_SELS.iter() {
        let cards: Vec<ElementRef> = doc
            .select(selector)
            .filter(|card| card.select(&IMG_SEL).next().is_some())
            .collect();
        if cards.len() < 2 {
            continue;
        }
        result.used_card_strategy = true;
        for card in cards {
            if let Some(href) = card_link(card, page_url) {
                if is_article_link_from_card(&href, page_url) && seen.insert(href.clone()) {
                    candidates.push(href);
                }
            }
        }
        if !candidates.is_empty() {
            break;
        }
    }

    // 传统列表回退
    if candidates.is_empty() {
        result.used_card_strategy = false;
        for selector in TRADITIONAL_LINK_SELS.iter() {
            for anchor in doc.select(selector) {
                let Some(href) = resolve_href(anchor, page_url) else { continue };
                if is_article_link(&href) && seen.insert(href.clone()) {
                    candidates.push(href);
                }
            }
        }
    }

    result.found = candidates.len();
    for href in candidates {
        if result.enqueued >= max_per_page {
            break;
        }
        if frontier.enqueue(&href, 1) {
            result.enqueued += 1;
        }
    }
    debug!(
        page = %page_url,
        found = result.found,
        enqueued = result.enqueued,
        card_strategy = result.used_card_strategy,
        "article links extracted"
    );
    result
}

/// 无内容页面的兜底:抓取页面上全部站内链接,上限 `max_links`。
pub fn extract_all_links(
    page_url: &Url,
    doc: &Html,
    frontier: &Frontier,
    current_depth: u32,
    max_links: usize,
) -> usize {
    let mut enqueued = 0;
    for anchor in doc.select(&ALL_ANCHOR_SEL) {
        if enqueued >= max_links || frontier.at_capacity() {
            break;
        }
        let Some(href) = resolve_href(anchor, page_url) else { continue };
        if NON_ARTICLE_MARKERS.iter().any(|m| href.contains(m)) {
            continue;
        }
        if frontier.enqueue(&href, current_depth + 1) {
            enqueued += 1;
        }
    }
    if enqueued > 0 {
        debug!(page = %page_url, enqueued, "fallback link sweep enqueued urls");
    }
    enqueued
}

/// 卡片内选一条代表链接:最大图片的锚点 > 标题锚点 > 首个内容锚点,
/// 卡片本身是 <a> 时直接用它。
fn card_link(card: ElementRef<'_>, page_url: &Url) -> Option<String> {
    // 图片锚点按声明尺寸取最大
    let mut best: Option<(u64, String)> = None;
    for anchor in card.select(&ANCHOR_SEL) {
        if anchor.select(&IMG_SEL).next().is_none() {
            continue;
        }
        let Some(href) = resolve_href(anchor, page_url) else { continue };
        let area = anchor
            .select(&IMG_SEL)
            .next()
            .map(|img| {
                let w = parse_dimension(img.value().attr("width"));
                let h = parse_dimension(img.value().attr("height"));
                w * h
            })
            .unwrap_or(1);
        if best.as_ref().map(|(a, _)| area > *a).unwrap_or(true) {
            best = Some((area, href));
        }
    }
    if let Some((_, href)) = best {
        return Some(href);
    }

    if let Some(anchor) = card.select(&TITLE_ANCHOR_SEL).next() {
        if let Some(href) = resolve_href(anchor, page_url) {
            return Some(href);
        }
    }

    for anchor in card.select(&ANCHOR_SEL) {
        if let Some(href) = resolve_href(anchor, page_url) {
            if !NON_ARTICLE_MARKERS.iter().any(|m| href.contains(m)) {
                return Some(href);
            }
        }
    }

    if card.value().name() == "a" {
        if let Some(raw) = card.value().attr("href") {
            return join_url(page_url, raw);
        }
    }
    None
}

fn parse_dimension(attr: Option<&str>) -> u64 {
    match attr {
        // 未声明尺寸的图默认较大,避免误选缩略图
        None => 1000,
        Some(v) => v.trim_end_matches("px").trim().parse().unwrap_or(1000),
    }
}

fn resolve_href(anchor: ElementRef<'_>, page_url: &Url) -> Option<String> {
    let raw = anchor.value().attr("href")?.trim();
    if raw.is_empty() || raw.starts_with('#') || raw.starts_with("javascript:") || raw.starts_with("mailto:") {
        return None;
    }
    join_url(page_url, raw)
}

fn join_url(page_url: &Url, raw: &str) -> Option<String> {
    let joined = page_url.join(raw).ok()?;
    if !matches!(joined.scheme(), "http" | "https") {
        return None;
    }
    Some(normalize_url(joined.as_str()))
}

/// 通用文章链接判断
pub fn is_article_link(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if NON_ARTICLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    // category 带翻页或查询翻页的是列表页
    if lower.contains("/category/") {
        if CATEGORY_PAGED_RE.is_match(&lower) || lower.contains("page=") {
            return false;
        }
        // 足够深的 category 路径才可能是文章
        return path_segment_count(&lower) >= 4;
    }
    if ARTICLE_PATH_MARKERS.iter().any(|m| lower.contains(m))
        || lower.ends_with(".html")
        || lower.ends_with(".htm")
        || NUMERIC_SEGMENT_RE.is_match(&lower)
    {
        return true;
    }
    path_segment_count(&lower) >= 2
}

/// 卡片来源的链接判断:同站且比当前列表页更深一层即可
fn is_article_link_from_card(url: &str, page_url: &Url) -> bool {
    let lower = url.to_ascii_lowercase();
    if NON_ARTICLE_MARKERS.iter().any(|m| lower.contains(m)) {
        return false;
    }
    if is_article_link(url) {
        return true;
    }
    match Url::parse(url) {
        Ok(parsed) => {
            parsed.host_str() == page_url.host_str()
                && path_segment_count(url) > path_segment_count(page_url.as_str())
        }
        Err(err) => {
            warn!(url, error = %err, "unparseable card link");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::task::CrawlScope;

    fn frontier() -> Frontier {
        Frontier::new(CrawlScope::Site, "https://example.com".into(), 0, 10_000)
    }

    fn card_page(cards: usize) -> Html {
        let mut body = String::new();
        for i in 0..cards {
            body.push_str(&format!(
                r#"<div class="post-item">
                     <a href="/post/{i}.html"><img src="/img/{i}.jpg" width="640" height="480"></a>
                     <h3><a href="/post/{i}.html">标题 {i}</a></h3>
                     <a href="/tag/rust">rust</a>
                   </div>"#
            ));
        }
        Html::parse_document(&format!("<html><body>{}</body></html>", body))
    }

    #[test]
    fn five_cards_enqueue_five_detail_urls_at_depth_one() {
        let f = Frontier::new(CrawlScope::Site, "https://example.com".into(), 1, 10_000);
        let page_url = Url::parse("https://example.com/list").unwrap();
        let doc = card_page(5);

        let result = extract_article_links(&page_url, &doc, &f, 20);

        assert!(result.used_card_strategy);
        assert_eq!(result.enqueued, 5);
        assert_eq!(f.total_urls(), 5);
        let mut depths = Vec::new();
        while let Some(entry) = f.claim() {
            depths.push(entry.depth);
        }
        assert_eq!(depths, vec![1, 1, 1, 1, 1]);
    }

    #[test]
    fn depth_one_entries_survive_enqueue_with_zero_max_depth() {
        // max_depth=0 时条目照常入队计数,只是不会被调度
        let f = frontier();
        let page_url = Url::parse("https://example.com/list").unwrap();
        let result = extract_article_links(&page_url, &card_page(5), &f, 20);
        assert_eq!(result.enqueued, 5);
        assert!(f.claim().is_none());
    }

    #[test]
    fn card_strategy_prefers_largest_image_anchor() {
        let html = r#"<html><body>
            <div class="post-item">
              <a href="/thumb/1"><img src="/t.jpg" width="80" height="60"></a>
              <a href="/post/big.html"><img src="/b.jpg" width="800" height="600"></a>
            </div>
            <div class="post-item">
              <a href="/post/2.html"><img src="/2.jpg"></a>
            </div>
        </body></html>"#;
        let f = Frontier::new(CrawlScope::Site, "https://example.com".into(), 3, 100);
        let page_url = Url::parse("https://example.com/list").unwrap();
        let result = extract_article_links(&page_url, &Html::parse_document(html), &f, 20);
        assert_eq!(result.enqueued, 2);
        let first = f.claim().unwrap();
        assert!(first.url.contains("/post/"), "got {}", first.url);
    }

    #[test]
    fn traditional_fallback_when_single_card() {
        let html = r#"<html><body>
            <ul class="article-list">
              <li><a href="/news/a.html">甲</a></li>
              <li><a href="/news/b.html">乙</a></li>
              <li><a href="/tag/x">标签</a></li>
            </ul>
        </body></html>"#;
        let f = Frontier::new(CrawlScope::Site, "https://example.com".into(), 3, 100);
        let page_url = Url::parse("https://example.com/news").unwrap();
        let result = extract_article_links(&page_url, &Html::parse_document(html), &f, 20);
        assert!(!result.used_card_strategy);
        assert_eq!(result.enqueued, 2);
    }

    #[test]
    fn per_page_cap_limits_enqueue() {
        let f = Frontier::new(CrawlScope::Site, "https://example.com".into(), 3, 100);
        let page_url = Url::parse("https://example.com/list").unwrap();
        let result = extract_article_links(&page_url, &card_page(30), &f, 20);
        assert_eq!(result.enqueued, 20);
        assert_eq!(f.total_urls(), 20);
    }

    #[test]
    fn article_link_rules() {
        assert!(is_article_link("https://e.com/post/1"));
        assert!(is_article_link("https://e.com/2024/03/title.html"));
        assert!(is_article_link("https://e.com/category/a/b/c/d"));
        assert!(!is_article_link("https://e.com/category/tech"));
        assert!(!is_article_link("https://e.com/category/tech/page/2"));
        assert!(!is_article_link("https://e.com/tag/rust"));
        assert!(!is_article_link("https://e.com/about"));
    }

    #[test]
    fn fallback_sweep_respects_limit_and_depth() {
        let mut body = String::new();
        for i in 0..60 {
            body.push_str(&format!("<a href=\"/x/{i}\">l</a>"));
        }
        let html = format!("<html><body>{}</body></html>", body);
        let f = Frontier::new(CrawlScope::Site, "https://example.com".into(), 5, 10_000);
        let page_url = Url::parse("https://example.com/start").unwrap();
        let added = extract_all_links(&page_url, &Html::parse_document(&html), &f, 2, 50);
        assert_eq!(added, 50);
        assert_eq!(f.claim().unwrap().depth, 3);
    }
}
