//! 端到端采集流程

use std::time::Duration;

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitecrawl::domain::models::image::DownloadStatus;
use sitecrawl::domain::models::task::{CrawlTask, CrawlType};

use crate::helpers::{fixture, wait_terminal};

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "text/html; charset=utf-8")
}

fn png_bytes() -> Vec<u8> {
    let mut bytes = vec![0x89, b'P', b'N', b'G'];
    bytes.resize(4096, 0x5A);
    bytes
}

async fn mount_site(server: &MockServer) {
    let mut cards = String::new();
    for i in 0..3 {
        cards.push_str(&format!(
            r#"<div class="post-item">
                 <a href="/post/{i}.html"><img src="/img/{i}.png" width="640" height="480"></a>
                 <h3><a href="/post/{i}.html">文章 {i}</a></h3>
               </div>"#
        ));
    }
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(&format!(
            r#"<html><body><div class="article-list">{cards}</div></body></html>"#
        )))
        .mount(server)
        .await;

    for i in 0..3 {
        Mock::given(method("GET"))
            .and(path(format!("/post/{i}.html")))
            .respond_with(html(&format!(
                r#"<html><head><title>文章 {i}</title></head><body>
                     <h1>文章 {i}</h1>
                     <div class="article-meta"><time datetime="2024-05-01T08:00:00Z">2024-05-01</time></div>
                     <article><p>第 {i} 篇的正文内容,足够判定为详情页。</p>
                       <img src="/img/{i}.png" width="640" height="480">
                     </article>
                   </body></html>"#
            )))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/img/{i}.png")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "image/png")
                    .set_body_bytes(png_bytes()),
            )
            .mount(server)
            .await;
    }
}

fn crawl_task(server: &MockServer) -> CrawlTask {
    let mut task = CrawlTask::new("端到端", vec![format!("{}/list", server.uri())]);
    task.crawl_type = CrawlType::Both;
    task.max_depth = 1;
    task.download_images = true;
    task.request_interval_ms = 0;
    task.request_timeout_ms = 5_000;
    task
}

#[tokio::test]
async fn list_to_detail_crawl_completes_with_articles_and_images() {
    let server = MockServer::start().await;
    mount_site(&server).await;
    let fx = fixture();

    let task = crawl_task(&server);
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();
    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(30)).await;

    assert_eq!(done.status, sitecrawl::TaskStatus::Completed);
    // 列表页 + 3 篇详情
    assert_eq!(done.total_urls, 4);
    assert_eq!(done.crawled_urls, 4);
    assert_eq!(done.success_count, 4);
    assert_eq!(done.error_count, 0);
    assert!(done.start_time.is_some() && done.end_time.is_some());

    let articles = fx.articles.saved.lock();
    assert_eq!(articles.len(), 3);
    assert!(articles.iter().all(|a| a.task_id == task_id));
    assert!(articles.iter().any(|a| a.title.contains("文章 0")));

    let updated = fx.images.updated.lock();
    assert_eq!(updated.len(), 3);
    assert!(updated.iter().all(|i| i.download_status == DownloadStatus::Success));
    for img in updated.iter() {
        let stored = fx.storage_dir.path().join(img.file_path.as_deref().unwrap());
        assert_eq!(std::fs::read(stored).unwrap().len(), 4096);
        // 目录名以关联文章 id 开头
        let article_id = img.article_id.unwrap();
        assert!(img.file_path.as_deref().unwrap().starts_with(&article_id.to_string()));
    }

    let events = fx.publisher.event_names();
    assert_eq!(events.first().map(String::as_str), Some("task.started"));
    assert_eq!(events.last().map(String::as_str), Some("task.completed"));
    assert!(events.iter().any(|e| e == "task.progress"));
}

#[tokio::test]
async fn failed_detail_fetch_counts_as_error_but_run_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(
            r#"<html><body><div class="article-list">
                 <div class="post-item"><a href="/post/ok.html"><img src="/i.png"></a></div>
                 <div class="post-item"><a href="/post/gone.html"><img src="/i.png"></a></div>
               </div></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post/ok.html"))
        .respond_with(html(
            r#"<html><head><title>好的</title></head><body><h1>好的</h1><article><p>正文</p></article></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post/gone.html"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let fx = fixture();
    let mut task = crawl_task(&server);
    task.download_images = false;
    task.crawl_type = CrawlType::Article;
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();
    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(30)).await;

    assert_eq!(done.status, sitecrawl::TaskStatus::Completed);
    assert_eq!(done.crawled_urls, 3);
    assert_eq!(done.error_count, 1);
    assert_eq!(fx.articles.saved.lock().len(), 1);

    // 抓取失败会留下任务日志
    let logs = fx.logs.entries.lock();
    assert!(logs.iter().any(|l| l.log_type == "FETCH" && l.message.contains("gone.html")));
}

#[tokio::test]
async fn out_of_scope_links_are_never_crawled() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(html(
            r#"<html><body><div class="article-list">
                 <div class="post-item"><a href="/post/in.html"><img src="/i.png"></a></div>
                 <div class="post-item"><a href="https://elsewhere.example/post/out.html"><img src="/i.png"></a></div>
               </div></body></html>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/post/in.html"))
        .respond_with(html(
            r#"<html><head><title>站内</title></head><body><h1>站内</h1><article><p>正文</p></article></body></html>"#,
        ))
        .mount(&server)
        .await;

    let fx = fixture();
    let mut task = crawl_task(&server);
    task.download_images = false;
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();
    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(30)).await;

    // 站外链接在入队时就被拒绝,不计入总量
    assert_eq!(done.total_urls, 2);
    assert_eq!(done.crawled_urls, 2);
}
