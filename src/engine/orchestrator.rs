//! 任务调度器
//!
//! 负责任务生命周期:启动校验、并发抓取循环、协作式停止、
//! 收尾与状态落库。一个调度器实例服务多个任务,每个任务持有
//! 独立的停止标志与运行上下文。页面抓取与图片下载各自限流。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use scraper::Html;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use crate::config::Settings;
use crate::domain::models::article::CrawledArticle;
use crate::domain::models::image::CrawledImage;
use crate::domain::models::log::{CrawlLogEntry, LogLevel};
use crate::domain::models::task::{CrawlTask, TaskStatus};
use crate::domain::repositories::{
    ArticleRepository, ImageRepository, LogRepository, ProxyRepository, StorageRepository,
    TaskRepository,
};
use crate::engine::classifier::{self, PageKind};
use crate::engine::context::RunContext;
use crate::engine::downloader::ImageDownloader;
use crate::engine::extract::{article, images, links, pagination};
use crate::engine::fetcher::{FetchedPage, PageFetcher};
use crate::engine::frontier::FrontierEntry;
use crate::engine::progress::{ProgressPublisher, ProgressReporter};
use crate::engine::proxy_resolver::ProxyResolver;
use crate::utils::errors::{ControlError, FetchError};

const IDLE_TICK: Duration = Duration::from_millis(50);

pub struct TaskOrchestrator {
    tasks: Arc<dyn TaskRepository>,
    articles: Arc<dyn ArticleRepository>,
    images: Arc<dyn ImageRepository>,
    logs: Arc<dyn LogRepository>,
    fetcher: PageFetcher,
    downloader: ImageDownloader,
    resolver: ProxyResolver,
    reporter: ProgressReporter,
    settings: Settings,
    stop_flags: DashMap<Uuid, Arc<AtomicBool>>,
}

impl TaskOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        settings: Settings,
        tasks: Arc<dyn TaskRepository>,
        articles: Arc<dyn ArticleRepository>,
        images: Arc<dyn ImageRepository>,
        logs: Arc<dyn LogRepository>,
        proxies: Arc<dyn ProxyRepository>,
        storage: Arc<dyn StorageRepository>,
        publisher: Arc<dyn ProgressPublisher>,
    ) -> Self {
        Self {
            fetcher: PageFetcher::new(settings.crawler.clone()),
            downloader: ImageDownloader::new(Arc::clone(&images), storage, settings.crawler.clone()),
            resolver: ProxyResolver::new(proxies),
            reporter: ProgressReporter::new(publisher),
            tasks,
            articles,
            images,
            logs,
            settings,
            stop_flags: DashMap::new(),
        }
    }

    /// 启动任务:校验状态、登记停止标志、后台执行。立即返回。
    pub async fn start(self: &Arc<Self>, task_id: Uuid) -> Result<(), ControlError> {
        let task = self
            .tasks
            .get_by_id(task_id)
            .await?
            .ok_or(ControlError::NotFound(task_id))?;
        if matches!(task.status, TaskStatus::Running | TaskStatus::Paused) {
            return Err(ControlError::InvalidState(task_id, task.status));
        }
        // 落库状态可能还没跟上刚启动的运行,以运行标志登记为准,
        // 并发 start 只有抢到空位的那次生效
        let stop = Arc::new(AtomicBool::new(false));
        match self.stop_flags.entry(task_id) {
            Entry::Occupied(_) => {
                return Err(ControlError::InvalidState(task_id, task.status));
            }
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&stop));
            }
        }

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.execute(task, stop).await;
        });
        Ok(())
    }

    /// 协作式停止:只置位标志,收尾由运行协程自己完成
    pub fn stop(&self, task_id: Uuid) -> Result<(), ControlError> {
        let flag = self
            .stop_flags
            .get(&task_id)
            .ok_or(ControlError::NotRunning(task_id))?;
        flag.store(true, Ordering::SeqCst);
        info!(%task_id, "stop requested");
        Ok(())
    }

    /// 暂停只改状态阻止重复启动,已在途的抓取照常收尾
    pub async fn pause(&self, task_id: Uuid) -> Result<(), ControlError> {
        let mut task = self
            .tasks
            .get_by_id(task_id)
            .await?
            .ok_or(ControlError::NotFound(task_id))?;
        if task.status != TaskStatus::Running {
            return Err(ControlError::InvalidState(task_id, task.status));
        }
        task.status = TaskStatus::Paused;
        self.tasks.update(&task).await?;
        self.reporter.status_changed(&task).await;
        Ok(())
    }

    pub fn is_running(&self, task_id: Uuid) -> bool {
        self.stop_flags.contains_key(&task_id)
    }

    /// 任务删改前调用:残留的运行标志置停并等待半秒
    pub async fn ensure_not_running(&self, task_id: Uuid) {
        if let Some((_, stale)) = self.stop_flags.remove(&task_id) {
            warn!(%task_id, "clearing stale run flag");
            stale.store(true, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    #[instrument(skip_all, fields(task_id = %task.id, task_name = %task.name))]
    async fn execute(self: Arc<Self>, mut task: CrawlTask, stop: Arc<AtomicBool>) {
        let started = Instant::now();
        let ctx = Arc::new(RunContext::new(&task, &self.settings.crawler, Arc::clone(&stop)));

        if let Err(err) = self.run(&mut task, Arc::clone(&ctx), started).await {
            error!(error = %err, "task run aborted");
            task.status = TaskStatus::Error;
            task.error_msg = Some(err.to_string());
            task.end_time = Some(chrono::Utc::now());
            if let Err(e) = self.tasks.update(&task).await {
                error!(error = %e, "failed to persist error status");
            }
            self.reporter.status_changed(&task).await;
            self.add_log(task.id, LogLevel::Error, "TASK", format!("task aborted: {}", err))
                .await;
        }
        // 只清掉属于本轮的标志,新一轮可能已经登记了自己的
        self.stop_flags.remove_if(&task.id, |_, v| Arc::ptr_eq(v, &stop));
    }

    async fn run(
        self: &Arc<Self>,
        task: &mut CrawlTask,
        ctx: Arc<RunContext>,
        started: Instant,
    ) -> anyhow::Result<()> {
        info!(urls = task.start_urls.len(), "task starting");
        self.add_log(task.id, LogLevel::Info, "TASK", format!("task started: {}", task.name))
            .await;

        let seeded = ctx.frontier.seed(&task.start_urls);
        if seeded == 0 {
            warn!("no usable start urls");
            task.status = TaskStatus::Error;
            task.error_msg = Some("start url list is empty".to_string());
            task.end_time = Some(chrono::Utc::now());
            self.tasks.update(task).await?;
            self.reporter.status_changed(task).await;
            self.add_log(task.id, LogLevel::Error, "TASK", "start url list is empty").await;
            return Ok(());
        }

        task.status = TaskStatus::Running;
        task.start_time = Some(chrono::Utc::now());
        task.end_time = None;
        task.error_msg = None;
        task.total_urls = seeded;
        task.crawled_urls = 0;
        task.success_count = 0;
        task.error_count = 0;
        self.tasks.update(task).await?;
        self.reporter.status_changed(task).await;

        let shared_task = Arc::new(task.clone());
        let semaphore = Arc::new(Semaphore::new(self.settings.crawler.concurrency.max(1)));
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            if ctx.stop_requested() {
                info!("stop flag observed, leaving dispatch loop");
                break;
            }
            if ctx.crawled() >= self.settings.crawler.max_urls {
                warn!(limit = self.settings.crawler.max_urls, "url budget exhausted");
                break;
            }
            while workers.try_join_next().is_some() {}
            if ctx.frontier.is_empty() && workers.is_empty() {
                break;
            }

            let mut dispatched = false;
            loop {
                if ctx.stop_requested() {
                    break;
                }
                let Ok(permit) = Arc::clone(&semaphore).try_acquire_owned() else { break };
                let Some(entry) = ctx.frontier.claim() else {
                    drop(permit);
                    break;
                };
                dispatched = true;
                let this = Arc::clone(self);
                let worker_task = Arc::clone(&shared_task);
                let worker_ctx = Arc::clone(&ctx);
                workers.spawn(async move {
                    let _permit = permit;
                    this.process_entry(worker_task, entry, worker_ctx).await;
                });
            }

            if !dispatched {
                if workers.is_empty() {
                    tokio::time::sleep(IDLE_TICK).await;
                } else {
                    tokio::select! {
                        _ = workers.join_next() => {}
                        _ = tokio::time::sleep(IDLE_TICK) => {}
                    }
                }
            }
        }

        self.drain_workers(&mut workers).await;
        self.drain_downloads(&ctx).await;
        self.finalize(task, &ctx, started).await
    }

    /// 等待在途工作协程:单个最多 worker_drain_secs,总共 pool_drain_secs
    async fn drain_workers(&self, workers: &mut JoinSet<()>) {
        if workers.is_empty() {
            return;
        }
        info!(pending = workers.len(), "waiting for in-flight page workers");
        let total = Duration::from_secs(self.settings.crawler.pool_drain_secs);
        let per_worker = Duration::from_secs(self.settings.crawler.worker_drain_secs);
        let deadline = Instant::now() + total;

        while !workers.is_empty() {
            if Instant::now() >= deadline {
                warn!(remaining = workers.len(), "drain deadline reached, aborting workers");
                workers.abort_all();
                break;
            }
            match tokio::time::timeout(per_worker, workers.join_next()).await {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(_) => {
                    warn!("a page worker exceeded its drain window");
                }
            }
        }
    }

    /// 等待图片下载批次落盘
    async fn drain_downloads(&self, ctx: &RunContext) {
        let mut downloads = ctx.downloads.lock().await;
        if downloads.is_empty() {
            return;
        }
        info!(pending = downloads.len(), "waiting for image downloads");
        let limit = Duration::from_secs(self.settings.crawler.image_drain_secs);
        let finished = tokio::time::timeout(limit, async {
            while downloads.join_next().await.is_some() {}
        })
        .await;
        if finished.is_err() {
            warn!("image downloads exceeded drain window, aborting the rest");
            downloads.abort_all();
        }
    }

    async fn finalize(
        &self,
        task: &mut CrawlTask,
        ctx: &RunContext,
        started: Instant,
    ) -> anyhow::Result<()> {
        let stopped = ctx.stop_requested();
        task.status = if stopped { TaskStatus::Stopped } else { TaskStatus::Completed };
        task.total_urls = ctx.frontier.total_urls();
        task.crawled_urls = ctx.crawled();
        task.success_count = ctx.success_count.load(Ordering::SeqCst);
        task.error_count = ctx.error_count.load(Ordering::SeqCst);
        task.end_time = Some(chrono::Utc::now());
        self.tasks.update(task).await?;
        self.reporter.status_changed(task).await;

        let elapsed = started.elapsed();
        let summary = format!(
            "task {}: crawled {}/{} urls, {} ok, {} failed, took {}.{:03}s",
            if stopped { "stopped" } else { "completed" },
            task.crawled_urls,
            task.total_urls,
            task.success_count,
            task.error_count,
            elapsed.as_secs(),
            elapsed.subsec_millis(),
        );
        info!(stopped, crawled = task.crawled_urls, total = task.total_urls, "task finished");
        self.add_log(task.id, LogLevel::Info, "TASK", summary).await;
        Ok(())
    }

    /// 单个 URL 的完整处理:节奏控制、抓取、解析、入库、派发图片下载
    #[instrument(skip_all, fields(url = %entry.url, depth = entry.depth))]
    async fn process_entry(
        self: Arc<Self>,
        task: Arc<CrawlTask>,
        entry: FrontierEntry,
        ctx: Arc<RunContext>,
    ) {
        self.pace(&task, &ctx).await;
        if ctx.stop_requested() {
            return;
        }

        let proxies = self.resolver.resolve(&task).await;
        if !ctx.proxy_logged.swap(true, Ordering::SeqCst) {
            info!(source = %proxies.source, count = proxies.proxies.len(), "proxy decision for this run");
        }

        match self.fetcher.fetch_page(&task, &entry.url, &proxies, &ctx.stop).await {
            Ok(page) => {
                let outcome = process_document(&task, &entry, &page, &ctx, &self.settings.crawler);
                let persisted = self.persist_outcome(&task, &ctx, &page, &proxies, outcome).await;
                if persisted {
                    ctx.success_count.fetch_add(1, Ordering::SeqCst);
                } else {
                    ctx.error_count.fetch_add(1, Ordering::SeqCst);
                }
            }
            Err(FetchError::Interrupted) => return,
            Err(err) => {
                warn!(error = %err, "page fetch failed");
                ctx.error_count.fetch_add(1, Ordering::SeqCst);
                self.add_log(
                    task.id,
                    LogLevel::Warn,
                    "FETCH",
                    format!("fetch failed for {}: {}", entry.url, err),
                )
                .await;
            }
        }

        let crawled = ctx.crawled_urls.fetch_add(1, Ordering::SeqCst) + 1;
        // 前 20 个 URL 每个都推进度,之后每 5 个推一次
        if crawled <= 20 || crawled % 5 == 0 {
            self.publish_progress(&task, &ctx).await;
        }
    }

    /// 请求节奏:任务间隔(可随机化)加 200~500ms 的自然抖动
    async fn pace(&self, task: &CrawlTask, ctx: &RunContext) {
        if ctx.crawled() > 0 && task.request_interval_ms > 0 {
            let mut interval = task.request_interval_ms;
            if task.random_interval {
                interval = (interval as f64 * rand::random_range(0.5..1.5)) as u64;
            }
            tokio::time::sleep(Duration::from_millis(interval)).await;
        }
        tokio::time::sleep(Duration::from_millis(rand::random_range(200..=500))).await;
    }

    /// 入库文章与图片,派发图片下载。返回本 URL 是否算成功。
    async fn persist_outcome(
        self: &Arc<Self>,
        task: &Arc<CrawlTask>,
        ctx: &Arc<RunContext>,
        page: &FetchedPage,
        proxies: &crate::domain::models::proxy::EffectiveProxies,
        outcome: PageOutcome,
    ) -> bool {
        let mut ok = true;

        let article_saved = match &outcome.article {
            Some(article) => match self.articles.save(article).await {
                Ok(()) => {
                    ctx.register_article_folder(article);
                    true
                }
                Err(err) => {
                    warn!(error = %err, "article save failed");
                    ok = false;
                    false
                }
            },
            None => false,
        };
        if article_saved {
            info!(title = %outcome.article.as_ref().map(|a| a.title.as_str()).unwrap_or_default(), "article saved");
        }

        for image in outcome.images {
            if let Err(err) = self.images.save(&image).await {
                warn!(error = %err, url = %image.url, "image record save failed");
                continue;
            }
            if !task.download_images || ctx.stop_requested() {
                continue;
            }
            let dir = ctx.image_dir(image.article_id);
            let this = Arc::clone(self);
            let dl_task = Arc::clone(task);
            let referer = page.url.clone();
            let dl_proxies = proxies.clone();
            let stop = Arc::clone(&ctx.stop);
            ctx.downloads.lock().await.spawn(async move {
                this.downloader
                    .download(&dl_task, &dir, image, &referer, &dl_proxies, &stop)
                    .await;
            });
        }
        ok
    }

    /// 刷新任务行计数并推送进度事件
    async fn publish_progress(&self, task: &CrawlTask, ctx: &RunContext) {
        let mut snapshot = task.clone();
        snapshot.status = TaskStatus::Running;
        snapshot.total_urls = ctx.frontier.total_urls();
        snapshot.crawled_urls = ctx.crawled();
        snapshot.success_count = ctx.success_count.load(Ordering::SeqCst);
        snapshot.error_count = ctx.error_count.load(Ordering::SeqCst);
        if let Err(err) = self.tasks.update(&snapshot).await {
            warn!(error = %err, "progress persist failed");
        }
        self.reporter.progress(&snapshot).await;
    }

    async fn add_log(&self, task_id: Uuid, level: LogLevel, log_type: &str, message: impl Into<String>) {
        let entry = CrawlLogEntry::new(task_id, level, log_type, message);
        if let Err(err) = self.logs.append(&entry).await {
            warn!(error = %err, "task log append failed");
        }
    }
}

#[derive(Default)]
struct PageOutcome {
    article: Option<CrawledArticle>,
    images: Vec<CrawledImage>,
    had_content: bool,
}

/// 同步的文档处理:分类、链接入队、正文与图片抽取。
/// DOM 不跨 await 存活,解析在这里一次完成。
fn process_document(
    task: &CrawlTask,
    entry: &FrontierEntry,
    page: &FetchedPage,
    ctx: &RunContext,
    settings: &crate::config::CrawlerSettings,
) -> PageOutcome {
    let mut outcome = PageOutcome::default();
    let Ok(page_url) = Url::parse(&page.url) else {
        warn!(url = %page.url, "unparseable final url");
        return outcome;
    };
    let doc = Html::parse_document(&page.body);

    let mut kind = classifier::classify(&doc, &page.url);
    // 列表判定撞上深层文章形态的 URL 时按详情纠偏
    if kind == PageKind::List && entry.depth > 0 && classifier::looks_like_forced_detail(&page.url) {
        info!(url = %page.url, "list verdict overridden to detail by url shape");
        kind = PageKind::Detail;
    }

    let list_flow = kind == PageKind::List
        || (kind == PageKind::Mixed && classifier::mixed_prefers_list(&page.url));
    let detail_flow = kind == PageKind::Detail
        || (kind == PageKind::Mixed && !classifier::mixed_prefers_list(&page.url));

    if list_flow && !ctx.stop_requested() {
        let extraction = links::extract_article_links(
            &page_url,
            &doc,
            &ctx.frontier,
            settings.max_links_per_page,
        );
        pagination::maybe_enqueue_next_page(
            task.list_max_pages,
            &ctx.list_pages_processed,
            &page_url,
            &doc,
            &ctx.frontier,
            entry.depth,
        );
        outcome.had_content = extraction.enqueued > 0 || extraction.found > 0;
    }

    if detail_flow && !ctx.stop_requested() {
        if task.crawl_type.wants_article() {
            outcome.article = article::extract_article(task, &page_url, &doc);
        }
        if task.crawl_type.wants_images() {
            let article_id = outcome.article.as_ref().map(|a| a.id);
            outcome.images = images::extract_images(task, article_id, &page_url, &doc);
        }
        outcome.had_content |= outcome.article.is_some() || !outcome.images.is_empty();
    }

    // 两边都没产出的页面,做一次兜底链接收集继续向下探
    if !outcome.had_content
        && entry.depth < task.max_depth
        && !ctx.frontier.at_capacity()
        && !ctx.stop_requested()
    {
        links::extract_all_links(&page_url, &doc, &ctx.frontier, entry.depth, settings.max_fallback_links);
    }
    outcome
}
