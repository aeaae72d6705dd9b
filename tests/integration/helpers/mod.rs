//! 内存版仓储与发布器,集成测试专用

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;

use sitecrawl::config::Settings;
use sitecrawl::domain::models::article::CrawledArticle;
use sitecrawl::domain::models::image::CrawledImage;
use sitecrawl::domain::models::log::CrawlLogEntry;
use sitecrawl::domain::models::proxy::ProxyDescriptor;
use sitecrawl::domain::models::task::CrawlTask;
use sitecrawl::domain::repositories::{
    ArticleRepository, ImageRepository, LocalStorage, LogRepository, ProxyRepository,
    TaskRepository,
};
use sitecrawl::engine::progress::ProgressPublisher;
use sitecrawl::utils::errors::RepositoryError;
use sitecrawl::TaskOrchestrator;

#[derive(Default)]
pub struct InMemoryTasks {
    rows: Mutex<HashMap<Uuid, CrawlTask>>,
}

impl InMemoryTasks {
    pub fn insert(&self, task: CrawlTask) {
        self.rows.lock().insert(task.id, task);
    }
}

#[async_trait]
impl TaskRepository for InMemoryTasks {
    async fn get_by_id(&self, id: Uuid) -> Result<Option<CrawlTask>, RepositoryError> {
        Ok(self.rows.lock().get(&id).cloned())
    }

    async fn update(&self, task: &CrawlTask) -> Result<(), RepositoryError> {
        self.rows.lock().insert(task.id, task.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryArticles {
    pub saved: Mutex<Vec<CrawledArticle>>,
}

#[async_trait]
impl ArticleRepository for InMemoryArticles {
    async fn save(&self, article: &CrawledArticle) -> Result<(), RepositoryError> {
        self.saved.lock().push(article.clone());
        Ok(())
    }

    async fn count_by_task(&self, task_id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.saved.lock().iter().filter(|a| a.task_id == task_id).count() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryImages {
    pub saved: Mutex<Vec<CrawledImage>>,
    pub updated: Mutex<Vec<CrawledImage>>,
}

#[async_trait]
impl ImageRepository for InMemoryImages {
    async fn save(&self, image: &CrawledImage) -> Result<(), RepositoryError> {
        self.saved.lock().push(image.clone());
        Ok(())
    }

    async fn update(&self, image: &CrawledImage) -> Result<(), RepositoryError> {
        self.updated.lock().push(image.clone());
        Ok(())
    }

    async fn count_by_task(&self, task_id: Uuid) -> Result<u64, RepositoryError> {
        Ok(self.saved.lock().iter().filter(|i| i.task_id == task_id).count() as u64)
    }
}

#[derive(Default)]
pub struct InMemoryLogs {
    pub entries: Mutex<Vec<CrawlLogEntry>>,
}

#[async_trait]
impl LogRepository for InMemoryLogs {
    async fn append(&self, entry: &CrawlLogEntry) -> Result<(), RepositoryError> {
        self.entries.lock().push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct NoProxies;

#[async_trait]
impl ProxyRepository for NoProxies {
    async fn list_enabled(&self) -> Result<Vec<ProxyDescriptor>, RepositoryError> {
        Ok(Vec::new())
    }
}

#[derive(Default)]
pub struct CapturingPublisher {
    pub events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl CapturingPublisher {
    pub fn event_names(&self) -> Vec<String> {
        self.events.lock().iter().map(|(name, _)| name.clone()).collect()
    }
}

#[async_trait]
impl ProgressPublisher for CapturingPublisher {
    async fn publish(
        &self,
        _topic: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> anyhow::Result<()> {
        self.events.lock().push((event.to_string(), payload));
        Ok(())
    }
}

/// 一套完整的测试装置
pub struct Fixture {
    pub orchestrator: Arc<TaskOrchestrator>,
    pub tasks: Arc<InMemoryTasks>,
    pub articles: Arc<InMemoryArticles>,
    pub images: Arc<InMemoryImages>,
    pub logs: Arc<InMemoryLogs>,
    pub publisher: Arc<CapturingPublisher>,
    pub storage_dir: tempfile::TempDir,
}

pub fn fixture() -> Fixture {
    let tasks = Arc::new(InMemoryTasks::default());
    let articles = Arc::new(InMemoryArticles::default());
    let images = Arc::new(InMemoryImages::default());
    let logs = Arc::new(InMemoryLogs::default());
    let publisher = Arc::new(CapturingPublisher::default());
    let storage_dir = tempfile::tempdir().expect("tempdir");

    let orchestrator = Arc::new(TaskOrchestrator::new(
        Settings::default(),
        Arc::clone(&tasks) as Arc<dyn TaskRepository>,
        Arc::clone(&articles) as Arc<dyn ArticleRepository>,
        Arc::clone(&images) as Arc<dyn ImageRepository>,
        Arc::clone(&logs) as Arc<dyn LogRepository>,
        Arc::new(NoProxies) as Arc<dyn ProxyRepository>,
        Arc::new(LocalStorage::new(storage_dir.path())),
        Arc::clone(&publisher) as Arc<dyn ProgressPublisher>,
    ));

    Fixture { orchestrator, tasks, articles, images, logs, publisher, storage_dir }
}

/// 轮询任务直到进入终态
pub async fn wait_terminal(tasks: &InMemoryTasks, id: Uuid, timeout: Duration) -> CrawlTask {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(task)) = tasks.get_by_id(id).await {
            if task.status.is_terminal() {
                return task;
            }
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "task {} did not reach a terminal state in {:?}",
            id,
            timeout
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}
