//! 任务生命周期:启动校验、停止、异常收尾

use std::time::Duration;

use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use sitecrawl::domain::models::task::{CrawlTask, CrawlType, TaskStatus};
use sitecrawl::domain::repositories::TaskRepository;
use sitecrawl::utils::errors::ControlError;

use crate::helpers::{fixture, wait_terminal};

#[tokio::test]
async fn start_unknown_task_is_not_found() {
    let fx = fixture();
    let err = fx.orchestrator.start(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, ControlError::NotFound(_)));
}

#[tokio::test]
async fn start_rejects_running_and_paused_tasks() {
    let fx = fixture();

    let mut running = CrawlTask::new("r", vec!["https://e.com/".into()]);
    running.status = TaskStatus::Running;
    let running_id = running.id;
    fx.tasks.insert(running);

    let mut paused = CrawlTask::new("p", vec!["https://e.com/".into()]);
    paused.status = TaskStatus::Paused;
    let paused_id = paused.id;
    fx.tasks.insert(paused);

    assert!(matches!(
        fx.orchestrator.start(running_id).await.unwrap_err(),
        ControlError::InvalidState(_, TaskStatus::Running)
    ));
    assert!(matches!(
        fx.orchestrator.start(paused_id).await.unwrap_err(),
        ControlError::InvalidState(_, TaskStatus::Paused)
    ));
}

#[tokio::test]
async fn stop_without_running_task_errors() {
    let fx = fixture();
    assert!(matches!(
        fx.orchestrator.stop(Uuid::new_v4()).unwrap_err(),
        ControlError::NotRunning(_)
    ));
}

#[tokio::test]
async fn empty_start_urls_finish_as_error() {
    let fx = fixture();
    let task = CrawlTask::new("空任务", Vec::new());
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();
    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(10)).await;

    assert_eq!(done.status, TaskStatus::Error);
    assert_eq!(done.error_msg.as_deref(), Some("start url list is empty"));
    assert!(fx.publisher.event_names().contains(&"task.error".to_string()));
}

#[tokio::test]
async fn stop_mid_run_finishes_as_stopped() {
    let server = MockServer::start().await;
    // 每个响应都拖 400ms,保证停止请求赶在运行中途
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<html><head><title>慢页面</title></head><body><h1>慢</h1>
                       <article><p>慢条斯理的正文。</p></article></body></html>"#,
                    "text/html; charset=utf-8",
                )
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let fx = fixture();
    let mut task = CrawlTask::new(
        "可停止",
        (0..8).map(|i| format!("{}/slow/{i}.html", server.uri())).collect(),
    );
    task.crawl_type = CrawlType::Article;
    task.request_interval_ms = 0;
    task.request_timeout_ms = 5_000;
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();

    // 等任务真正跑起来再停(工作协程此刻还在节奏延迟里)
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(fx.orchestrator.is_running(task_id));
    fx.orchestrator.stop(task_id).unwrap();

    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(30)).await;
    assert_eq!(done.status, TaskStatus::Stopped);
    assert!(done.crawled_urls < 8, "stop should interrupt before all urls: {}", done.crawled_urls);
    assert_eq!(fx.publisher.event_names().last().map(String::as_str), Some("task.stopped"));

    // 状态落库后运行标志随即清除
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!fx.orchestrator.is_running(task_id));
}

#[tokio::test]
async fn ensure_not_running_clears_live_flag() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<html><head><title>慢</title></head><body><h1>慢</h1>
                       <article><p>正文。</p></article></body></html>"#,
                    "text/html; charset=utf-8",
                )
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;

    let fx = fixture();
    let mut task = CrawlTask::new(
        "待清场",
        (0..8).map(|i| format!("{}/slow/{i}.html", server.uri())).collect(),
    );
    task.crawl_type = CrawlType::Article;
    task.request_interval_ms = 0;
    task.request_timeout_ms = 5_000;
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    fx.orchestrator.ensure_not_running(task_id).await;
    assert!(!fx.orchestrator.is_running(task_id));

    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(30)).await;
    assert_eq!(done.status, TaskStatus::Stopped);
}

#[tokio::test]
async fn rapid_double_start_only_admits_one_run() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(
                    r#"<html><head><title>页面</title></head><body><h1>页面</h1>
                       <article><p>正文内容。</p></article></body></html>"#,
                    "text/html; charset=utf-8",
                )
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let fx = fixture();
    let mut task = CrawlTask::new("双重启动", vec![format!("{}/a.html", server.uri())]);
    task.crawl_type = CrawlType::Article;
    task.request_interval_ms = 0;
    task.request_timeout_ms = 5_000;
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.start(task_id).await.unwrap();
    // 第二次启动在状态落库前到达,也要被运行标志挡下
    assert!(matches!(
        fx.orchestrator.start(task_id).await.unwrap_err(),
        ControlError::InvalidState(_, _)
    ));

    // 第一轮不受影响,正常跑完
    let done = wait_terminal(&fx.tasks, task_id, Duration::from_secs(30)).await;
    assert_eq!(done.status, TaskStatus::Completed);
    assert_eq!(done.crawled_urls, 1);
}

#[tokio::test]
async fn pause_only_blocks_new_starts() {
    let fx = fixture();
    let mut task = CrawlTask::new("可暂停", vec!["https://e.com/".into()]);
    task.status = TaskStatus::Running;
    let task_id = task.id;
    fx.tasks.insert(task);

    fx.orchestrator.pause(task_id).await.unwrap();
    let paused = fx.tasks.get_by_id(task_id).await.unwrap().unwrap();
    assert_eq!(paused.status, TaskStatus::Paused);
    assert!(fx.publisher.event_names().contains(&"task.paused".to_string()));

    // 已暂停的任务不能再次暂停
    assert!(matches!(
        fx.orchestrator.pause(task_id).await.unwrap_err(),
        ControlError::InvalidState(_, TaskStatus::Paused)
    ));
}
