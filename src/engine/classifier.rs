//! 页面类型识别
//!
//! 结合 URL 形态与 DOM 结构信号打分,区分列表页、详情页与混合页。
//! 先走短路规则(搜索页、翻页 URL、body 分类 class、category 段数),
//! 再做双向计分,阈值 5/3,两边都高于 3 判混合。

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// 页面类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    List,
    Detail,
    Mixed,
}

fn sel(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

static CONTENT_ROOT_SEL: Lazy<Selector> =
    Lazy::new(|| sel("article, .article-content, .post-content, .content-detail, .entry-content, #content .article, .single-post"));
static H1_SEL: Lazy<Selector> = Lazy::new(|| sel("h1"));
static META_SEL: Lazy<Selector> =
    Lazy::new(|| sel(".article-meta, .post-meta, .publish-time, .post-date, time[datetime]"));
static LIST_CONTAINER_SEL: Lazy<Selector> =
    Lazy::new(|| sel(".article-list, .post-list, .news-list, .item-list, ul.posts, .list-item"));
static CARD_SEL: Lazy<Selector> =
    Lazy::new(|| sel("article, .post, .entry, .card, .post-item, .entry-item, .news-item, li.item"));
static IMG_SEL: Lazy<Selector> = Lazy::new(|| sel("img"));
static ANCHOR_SEL: Lazy<Selector> = Lazy::new(|| sel("a[href]"));
static BODY_SEL: Lazy<Selector> = Lazy::new(|| sel("body"));
static PAGINATION_SEL: Lazy<Selector> =
    Lazy::new(|| sel(".pagination, .page-nav, .pager, .page-numbers, a[rel=next]"));

static DETAIL_URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(article|post|news|detail|view)/").expect("static regex"));
static NUMERIC_HTML_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/\d+\.html?$").expect("static regex"));
pub static PAGE_PATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/page/\d+").expect("static regex"));
static NEXT_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"下一页|下一頁|Next|›|»").expect("static regex"));

/// 识别页面类型
pub fn classify(doc: &Html, url: &str) -> PageKind {
    let lower_url = url.to_ascii_lowercase();

    // 搜索结果页一律按列表处理
    if let Ok(parsed) = Url::parse(url) {
        if parsed.query().map(|q| q.contains("s=")).unwrap_or(false) {
            return PageKind::List;
        }
    }
    if PAGE_PATH_RE.is_match(&lower_url) {
        return PageKind::List;
    }
    if let Some(body) = doc.select(&BODY_SEL).next() {
        if let Some(class) = body.value().attr("class") {
            let class = class.to_ascii_lowercase();
            if ["archive", "category", "tag", "search"].iter().any(|k| class.contains(k)) {
                return PageKind::List;
            }
        }
    }
    // /category/ 前两级是栏目页,更深的形如文章路径
    if let Some(rest) = lower_url.split("/category/").nth(1) {
        let depth = rest.trim_matches('/').split('/').filter(|s| !s.is_empty()).count();
        if depth <= 2 {
            return PageKind::List;
        }
    }

    let detail_score = score_detail(doc, &lower_url);
    let list_score = score_list(doc, &lower_url);
    debug!(url, detail_score, list_score, "page classification scores");

    if detail_score >= 5 && list_score >= 5 {
        // 详情形态 URL 配唯一正文容器时直接判详情,不混判
        if looks_like_forced_detail(&lower_url) && doc.select(&CONTENT_ROOT_SEL).count() == 1 {
            return PageKind::Detail;
        }
        return PageKind::Mixed;
    }
    if detail_score >= 5 {
        return PageKind::Detail;
    }
    if list_score >= 5 {
        return PageKind::List;
    }
    if detail_score > 3 && list_score > 3 {
        return PageKind::Mixed;
    }
    // 信号不足打平时回退到 URL 形态
    if detail_score == list_score {
        return if looks_like_forced_detail(&lower_url) { PageKind::Detail } else { PageKind::List };
    }
    if detail_score > list_score {
        PageKind::Detail
    } else {
        PageKind::List
    }
}

fn score_detail(doc: &Html, lower_url: &str) -> i32 {
    let mut score = 0;

    let content_roots = doc.select(&CONTENT_ROOT_SEL).count();
    if content_roots == 1 {
        score += 4;
    } else if content_roots > 0 {
        score += 2;
    }

    if doc.select(&H1_SEL).count() == 1 {
        score += 2;
    }
    if doc.select(&META_SEL).next().is_some() {
        score += 2;
    }

    if DETAIL_URL_RE.is_match(lower_url) || NUMERIC_HTML_RE.is_match(lower_url) {
        score += 4;
    } else if lower_url.ends_with(".html") || lower_url.ends_with(".htm") {
        score += 2;
    }

    score
}

fn score_list(doc: &Html, lower_url: &str) -> i32 {
    let mut score = 0;

    if doc.select(&LIST_CONTAINER_SEL).next().is_some() {
        score += 3;
    }

    let image_cards = doc
        .select(&CARD_SEL)
        .filter(|card| card.select(&IMG_SEL).next().is_some())
        .count();
    if image_cards >= 2 {
        score += 4;
    }

    if has_pagination(doc) {
        score += 3;
    }

    if doc.select(&ANCHOR_SEL).count() > 20 {
        score += 2;
    }

    let list_markers = ["/list/", "/index/", "/category/", "/tag/", "/archive/"];
    if list_markers.iter().any(|m| lower_url.contains(m)) || PAGE_PATH_RE.is_match(lower_url) {
        score += 3;
    }

    score
}

/// 是否存在翻页控件:结构化选择器命中,或锚文本形如“下一页/Next/»”
pub fn has_pagination(doc: &Html) -> bool {
    if doc.select(&PAGINATION_SEL).next().is_some() {
        return true;
    }
    doc.select(&ANCHOR_SEL)
        .take(200)
        .any(|a| NEXT_TEXT_RE.is_match(&a.text().collect::<String>()))
}

/// 深层 URL 形如 `/123.html` 时强制按详情处理,列表误判兜底
pub fn looks_like_forced_detail(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    NUMERIC_HTML_RE.is_match(&lower) || DETAIL_URL_RE.is_match(&lower)
}

/// MIXED 页面仅当 URL 带 /page/ 时按列表流程走
pub fn mixed_prefers_list(url: &str) -> bool {
    PAGE_PATH_RE.is_match(&url.to_ascii_lowercase())
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod classifier_test;
