//! 详情页正文抽取
//!
//! 任务可配置正文选择器,否则按常见正文容器回退,最后退到 body
//! 全文。标题与正文任一为空则放弃,不产出文章。

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, warn};
use url::Url;

use crate::domain::models::article::CrawledArticle;
use crate::domain::models::task::CrawlTask;
use crate::engine::extract::element_text;

fn sel(src: &str) -> Selector {
    Selector::parse(src).expect("static selector")
}

static TITLE_SEL: Lazy<Selector> = Lazy::new(|| sel("title"));
static HEADING_SEL: Lazy<Selector> =
    Lazy::new(|| sel("h1, h2, .title, .article-title, .post-title, .entry-title"));
static CONTENT_SEL: Lazy<Selector> =
    Lazy::new(|| sel("article, .article-content, .post-content, .entry-content, #content, .content"));
static BODY_SEL: Lazy<Selector> = Lazy::new(|| sel("body"));
static AUTHOR_SEL: Lazy<Selector> =
    Lazy::new(|| sel(".author, .writer, .post-author, a[rel=author]"));
static TIME_SEL: Lazy<Selector> =
    Lazy::new(|| sel("time[datetime], .publish-time, .post-date, .date"));

/// 从详情页抽取文章,标题或正文缺失时返回 None
pub fn extract_article(task: &CrawlTask, page_url: &Url, doc: &Html) -> Option<CrawledArticle> {
    let title = extract_title(doc);
    let content = extract_content(task, doc);

    if title.is_empty() || content.is_empty() {
        debug!(page = %page_url, "no extractable article on page");
        return None;
    }

    let mut article = CrawledArticle::new(task.id, page_url.as_str(), title, content);
    article.author = doc
        .select(&AUTHOR_SEL)
        .next()
        .map(|el| element_text(el))
        .filter(|s| !s.is_empty());
    article.publish_time = extract_publish_time(doc);
    article.summary = Some(summarize(&article.content));
    Some(article)
}

fn extract_title(doc: &Html) -> String {
    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|el| element_text(el))
        .unwrap_or_default();
    if !title.is_empty() {
        return title;
    }
    doc.select(&HEADING_SEL)
        .next()
        .map(|el| element_text(el))
        .unwrap_or_default()
}

fn extract_content(task: &CrawlTask, doc: &Html) -> String {
    if let Some(raw) = task.content_selector() {
        match Selector::parse(raw) {
            Ok(selector) => {
                if let Some(el) = doc.select(&selector).next() {
                    return element_text(el);
                }
                debug!(selector = raw, "content selector matched nothing, falling back");
            }
            Err(_) => warn!(selector = raw, "invalid content selector, falling back"),
        }
    }
    if let Some(el) = doc.select(&CONTENT_SEL).next() {
        let text = element_text(el);
        if !text.is_empty() {
            return text;
        }
    }
    doc.select(&BODY_SEL)
        .next()
        .map(|el| element_text(el))
        .unwrap_or_default()
}

fn extract_publish_time(doc: &Html) -> Option<DateTime<Utc>> {
    let el = doc.select(&TIME_SEL).next()?;
    let raw = el
        .value()
        .attr("datetime")
        .map(str::to_string)
        .unwrap_or_else(|| element_text(el));
    DateTime::parse_from_rfc3339(raw.trim())
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// 前 200 个字符作为摘要
fn summarize(content: &str) -> String {
    content.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> CrawlTask {
        CrawlTask::new("t", vec!["https://e.com/".into()])
    }

    fn page_url() -> Url {
        Url::parse("https://example.com/post/1.html").unwrap()
    }

    #[test]
    fn extracts_title_content_and_time() {
        let doc = Html::parse_document(
            r#"<html><head><title>标题甲</title></head><body>
                <article><p>正文第一段。</p><p>第二段。</p></article>
                <span class="author">作者乙</span>
                <time datetime="2024-03-01T10:00:00Z">2024-03-01</time>
            </body></html>"#,
        );
        let article = extract_article(&task(), &page_url(), &doc).unwrap();
        assert_eq!(article.title, "标题甲");
        assert!(article.content.contains("正文第一段"));
        assert_eq!(article.author.as_deref(), Some("作者乙"));
        assert!(article.publish_time.is_some());
        assert_eq!(article.source_site, "https://example.com");
    }

    #[test]
    fn custom_selector_takes_priority() {
        let mut t = task();
        t.content_selector = Some(".custom-body".into());
        let doc = Html::parse_document(
            r#"<html><head><title>t</title></head><body>
                <article>通用容器</article>
                <div class="custom-body">定制容器正文</div>
            </body></html>"#,
        );
        let article = extract_article(&t, &page_url(), &doc).unwrap();
        assert_eq!(article.content, "定制容器正文");
    }

    #[test]
    fn missing_title_or_content_yields_none() {
        let doc = Html::parse_document("<html><head></head><body></body></html>");
        assert!(extract_article(&task(), &page_url(), &doc).is_none());
    }

    #[test]
    fn invalid_custom_selector_falls_back() {
        let mut t = task();
        t.content_selector = Some(":::broken".into());
        let doc = Html::parse_document(
            r#"<html><head><title>t</title></head><body><article>回退正文</article></body></html>"#,
        );
        let article = extract_article(&t, &page_url(), &doc).unwrap();
        assert_eq!(article.content, "回退正文");
    }

    #[test]
    fn summary_truncates_long_content() {
        let long = "字".repeat(500);
        let doc = Html::parse_document(&format!(
            "<html><head><title>t</title></head><body><article>{}</article></body></html>",
            long
        ));
        let article = extract_article(&task(), &page_url(), &doc).unwrap();
        assert_eq!(article.summary.unwrap().chars().count(), 200);
    }
}
