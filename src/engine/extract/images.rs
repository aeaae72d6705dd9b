//! 详情页图片抽取
//!
//! 选择器优先级:任务图片选择器 > 任务正文选择器内的 img >
//! 常见正文容器内的 img > body 内全部 img。排除选择器命中的
//! 子树整体剔除。懒加载属性按 src/data-src/data-original/
//! ess-data/data-link 顺序取值,最后按尺寸与容器语义过滤
//! 缩略图、广告与推荐位。

use std::collections::HashSet;

use ego_tree::NodeId;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};
use url::Url;
use uuid::Uuid;

use crate::domain::models::image::CrawledImage;
use crate::domain::models::task::CrawlTask;
use crate::engine::extract::{class_and_id, parent_element};
use crate::utils::url_utils::{normalize_url, strip_query};

fn sel(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

static IMG_SEL: Lazy<Selector> = Lazy::new(|| sel("img"));
static BODY_IMG_SEL: Lazy<Selector> = Lazy::new(|| sel("body img"));
static DEFAULT_ROOT_SEL: Lazy<Selector> = Lazy::new(|| {
    sel("#conttpc, .tpc_content, article, .article-content, .post-content, .entry-content, #content, .content, main")
});

/// 懒加载兜底属性,按声明顺序尝试
const SRC_ATTRS: &[&str] = &["src", "data-src", "data-original", "ess-data", "data-link"];

/// 一律排除的缩略图关键字
const STRICT_THUMB_KEYWORDS: &[&str] =
    &["thumbnail", "thumb_", "_thumb", "/thumb/", "-thumb", "avatar", "favicon", "spacer", "blank."];

/// 推荐位容器关键字
const RECOMMEND_CONTAINERS: &[&str] =
    &["related", "recommend", "hot-list", "rank", "popular", "read-also", "next-post", "prev-post"];

/// 推荐位文案关键字(简繁)
const RECOMMEND_TEXTS: &[&str] = &["相关推荐", "相關推薦", "相关阅读", "相關閱讀", "热门文章", "熱門文章", "猜你喜欢", "猜你喜歡"];

/// 广告与装饰容器关键字
const EXCLUDE_CONTAINERS: &[&str] =
    &["sidebar", "advertisement", "banner", "sponsor", "sponsored", "widget", "footer", "comment"];

/// img 自身 class/id 的排除关键字
const IMG_EXCLUDE_ATTRS: &[&str] = &["logo", "icon", "avatar", "emoji", "captcha", "qrcode"];

/// 从详情页提取图片记录,URL 去重,全部以 PENDING 状态返回
pub fn extract_images(
    task: &CrawlTask,
    article_id: Option<Uuid>,
    page_url: &Url,
    doc: &Html,
) -> Vec<CrawledImage> {
    let has_image_sel = task.image_selector().is_some();
    let has_content_sel = task.content_selector().is_some();

    let imgs = collect_img_elements(task, doc);
    let excluded = excluded_node_ids(task, doc);
    let exclusion_sels = exclusion_selectors(task);

    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for img in imgs {
        if is_under_excluded(img, &excluded, &exclusion_sels) {
            continue;
        }
        let Some(src) = image_url(img, page_url) else { continue };
        if !seen.insert(src.clone()) {
            continue;
        }
        if !is_valid_image(&src, img, has_image_sel, has_content_sel) {
            continue;
        }
        out.push(CrawledImage::new(task.id, article_id, &src));
    }
    debug!(page = %page_url, count = out.len(), "images extracted");
    out
}

fn collect_img_elements<'a>(task: &CrawlTask, doc: &'a Html) -> Vec<ElementRef<'a>> {
    if let Some(raw) = task.image_selector() {
        let actual = ensure_img_suffix(raw);
        let Ok(selector) = Selector::parse(&actual) else {
            warn!(selector = raw, "invalid image selector, skipping image extraction");
            return Vec::new();
        };
        if let Some(content_raw) = task.content_selector() {
            return match best_content_root(doc, content_raw) {
                Some(root) => root.select(&selector).collect(),
                None => {
                    warn!(selector = content_raw, "content selector matched nothing, no images taken");
                    Vec::new()
                }
            };
        }
        return doc.select(&selector).collect();
    }

    if let Some(content_raw) = task.content_selector() {
        return match best_content_root(doc, content_raw) {
            Some(root) => root.select(&IMG_SEL).collect(),
            None => Vec::new(),
        };
    }

    if let Some(root) = doc.select(&DEFAULT_ROOT_SEL).next() {
        let found: Vec<ElementRef<'a>> = root.select(&IMG_SEL).collect();
        if !found.is_empty() {
            return found;
        }
    }
    doc.select(&BODY_IMG_SEL).collect()
}

/// 用户习惯只写容器选择器,必要时补上 ` img` 后缀
fn ensure_img_suffix(raw: &str) -> String {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("img") || lower.contains("image") {
        raw.to_string()
    } else {
        format!("{} img", raw)
    }
}

/// 正文选择器可能命中多个容器,选图片最多的,数量相同选文本最长的
fn best_content_root<'a>(doc: &'a Html, content_raw: &str) -> Option<ElementRef<'a>> {
    let selector = match Selector::parse(content_raw) {
        Ok(s) => s,
        Err(_) => {
            warn!(selector = content_raw, "invalid content selector");
            return None;
        }
    };
    doc.select(&selector).max_by_key(|root| {
        let images = root.select(&IMG_SEL).count();
        let text_len = root.text().map(str::len).sum::<usize>();
        (images, text_len)
    })
}

fn exclusion_selectors(task: &CrawlTask) -> Vec<Selector> {
    let Some(raw) = task.exclude_selector() else { return Vec::new() };
    raw.split([',', '，', ';'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|part| match Selector::parse(part) {
            Ok(s) => Some(s),
            Err(_) => {
                warn!(selector = part, "invalid exclude selector part, ignored");
                None
            }
        })
        .collect()
}

fn excluded_node_ids(task: &CrawlTask, doc: &Html) -> HashSet<NodeId> {
    let mut ids = HashSet::new();
    for selector in exclusion_selectors(task) {
        for el in doc.select(&selector) {
            ids.insert(el.id());
        }
    }
    ids
}

/// 沿祖先链向上最多 20 层,命中排除节点则剔除
fn is_under_excluded(img: ElementRef<'_>, excluded: &HashSet<NodeId>, sels: &[Selector]) -> bool {
    if excluded.is_empty() && sels.is_empty() {
        return false;
    }
    let mut current = Some(img);
    for _ in 0..20 {
        let Some(el) = current else { break };
        if excluded.contains(&el.id()) || sels.iter().any(|s| s.matches(&el)) {
            return true;
        }
        current = parent_element(el);
    }
    false
}

/// 解析图片地址,处理懒加载属性与占位图
fn image_url(img: ElementRef<'_>, page_url: &Url) -> Option<String> {
    for attr in SRC_ATTRS {
        let Some(raw) = img.value().attr(attr) else { continue };
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            continue;
        }
        // 广告拦截器的占位图
        if raw.to_ascii_lowercase().contains("adblock") {
            return None;
        }
        let joined = page_url.join(raw).ok()?;
        if !matches!(joined.scheme(), "http" | "https") {
            return None;
        }
        return Some(normalize_url(joined.as_str()));
    }
    None
}

/// 图片有效性判定,返回 false 表示过滤掉
fn is_valid_image(src: &str, img: ElementRef<'_>, has_image_sel: bool, has_content_sel: bool) -> bool {
    let lower = strip_query(src).to_ascii_lowercase();
    let lower_full = src.to_ascii_lowercase();

    // GIF 多为表情与装饰,全局排除
    if lower.ends_with(".gif")
        || lower_full.contains(".gif?")
        || lower_full.contains(".gif#")
        || lower_full.contains(".gif&")
    {
        return false;
    }
    if STRICT_THUMB_KEYWORDS.iter().any(|k| lower_full.contains(k)) {
        return false;
    }

    // 用户显式指定了图片选择器,信任其命中
    if has_image_sel {
        return true;
    }

    if has_content_sel {
        // 正文容器内只排除明显的非内容区
        let mut current = parent_element(img);
        for _ in 0..5 {
            let Some(el) = current else { break };
            let name = el.value().name();
            if name == "aside" || name == "nav" {
                return false;
            }
            let (class, id) = class_and_id(el);
            if matches_container(&class, &id, EXCLUDE_CONTAINERS) {
                return false;
            }
            current = parent_element(el);
        }
        return true;
    }

    // 默认路径:容器语义 + 自身属性 + 尺寸三道过滤
    let mut current = parent_element(img);
    for _ in 0..8 {
        let Some(el) = current else { break };
        let name = el.value().name();
        if name == "aside" || name == "nav" {
            return false;
        }
        let (class, id) = class_and_id(el);
        if matches_container(&class, &id, RECOMMEND_CONTAINERS)
            || matches_container(&class, &id, EXCLUDE_CONTAINERS)
        {
            return false;
        }
        if heading_mentions_recommendation(el) {
            return false;
        }
        current = parent_element(el);
    }

    let (img_class, img_id) = class_and_id(img);
    if IMG_EXCLUDE_ATTRS.iter().any(|k| img_class.contains(k) || img_id.contains(k)) {
        return false;
    }

    size_acceptable(img, &lower_full)
}

/// 容器自己的标题写着“相关推荐/热门文章”之类的,整块是推荐位。
/// 只看直接子级标题,避免误伤包着推荐块的正文根容器。
fn heading_mentions_recommendation(el: ElementRef<'_>) -> bool {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "h2" | "h3" | "h4" | "div" | "span"))
        .take(3)
        .any(|h| {
            let text: String = h.text().take(2).collect();
            RECOMMEND_TEXTS.iter().any(|t| text.contains(t))
        })
}

fn matches_container(class: &str, id: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|k| {
        class == *k
            || id == *k
            || class.starts_with(&format!("{}-", k))
            || class.starts_with(&format!("{}_", k))
            || class.contains(&format!(" {}", k))
            || id.starts_with(&format!("{}-", k))
    })
}

/// 声明尺寸过滤:任一边小于 60 拒绝;小于 150 且 URL 带缩略关键字
/// 拒绝;长宽比大于 6 的按横幅处理拒绝。未声明尺寸放行。
fn size_acceptable(img: ElementRef<'_>, lower_url: &str) -> bool {
    let width = parse_size(img.value().attr("width"));
    let height = parse_size(img.value().attr("height"));

    if let (Some(w), Some(h)) = (width, height) {
        if w < 60 || h < 60 {
            return false;
        }
        let small = w < 150 || h < 150;
        if small && ["small", "mini", "tiny", "150x", "120x"].iter().any(|k| lower_url.contains(k)) {
            return false;
        }
        let (long, short) = if w > h { (w, h) } else { (h, w) };
        if short > 0 && long / short > 6 {
            return false;
        }
    } else if let Some(single) = width.or(height) {
        if single < 60 {
            return false;
        }
    }
    true
}

fn parse_size(attr: Option<&str>) -> Option<u32> {
    attr?.trim().trim_end_matches("px").parse().ok()
}
