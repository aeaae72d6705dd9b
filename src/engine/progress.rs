//! 进度上报
//!
//! 任务状态变化与计数快照推给外部发布器(消息总线 / WebSocket
//! 由调用方实现)。发布失败只记 debug,不影响采集。

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::domain::models::task::{CrawlTask, TaskStatus};

/// 任务状态事件的默认主题
pub const TASK_STATUS_TOPIC: &str = "crawler-task-status";

/// 外部事件发布端
#[async_trait]
pub trait ProgressPublisher: Send + Sync {
    async fn publish(&self, topic: &str, event: &str, payload: serde_json::Value) -> anyhow::Result<()>;
}

pub struct ProgressReporter {
    publisher: Arc<dyn ProgressPublisher>,
}

impl ProgressReporter {
    pub fn new(publisher: Arc<dyn ProgressPublisher>) -> Self {
        Self { publisher }
    }

    /// 状态跃迁事件,事件名随状态确定
    pub async fn status_changed(&self, task: &CrawlTask) {
        let event = match task.status {
            TaskStatus::Running => "task.started",
            TaskStatus::Paused => "task.paused",
            TaskStatus::Completed => "task.completed",
            TaskStatus::Stopped => "task.stopped",
            TaskStatus::Error => "task.error",
            TaskStatus::NotStarted => "task.reset",
        };
        self.emit(event, task).await;
    }

    /// 运行中的计数快照
    pub async fn progress(&self, task: &CrawlTask) {
        self.emit("task.progress", task).await;
    }

    async fn emit(&self, event: &str, task: &CrawlTask) {
        let payload = build_payload(task);
        if let Err(err) = self.publisher.publish(TASK_STATUS_TOPIC, event, payload).await {
            debug!(event, task_id = %task.id, error = %err, "progress publish failed");
        }
    }
}

/// 对外载荷:状态与四个计数器,进度百分比保留两位小数
fn build_payload(task: &CrawlTask) -> serde_json::Value {
    let progress = if task.total_urls > 0 {
        (task.crawled_urls as f64 / task.total_urls as f64 * 10_000.0).round() / 100.0
    } else {
        0.0
    };
    json!({
        "taskId": task.id,
        "taskName": task.name,
        "status": task.status,
        "totalUrls": task.total_urls,
        "crawledUrls": task.crawled_urls,
        "successCount": task.success_count,
        "errorCount": task.error_count,
        "errorMsg": task.error_msg,
        "progress": progress,
    })
}
