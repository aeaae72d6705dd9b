//! 任务日志模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// 持久化的任务级日志条目,与 tracing 输出互为补充
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlLogEntry {
    pub id: Uuid,
    pub task_id: Uuid,
    pub level: LogLevel,
    /// 日志分类,如 TASK / FETCH / IMAGE
    pub log_type: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl CrawlLogEntry {
    pub fn new(task_id: Uuid, level: LogLevel, log_type: &str, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id,
            level,
            log_type: log_type.to_string(),
            message: message.into(),
            created_at: Utc::now(),
        }
    }
}
