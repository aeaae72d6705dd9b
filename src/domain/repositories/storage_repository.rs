//! 文件存储抽象与本地实现
//!
//! 引擎只计算相对路径,`StorageRepository` 负责落到具体介质。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use crate::utils::errors::StorageError;

#[async_trait]
pub trait StorageRepository: Send + Sync {
    async fn ensure_dir(&self, relative: &Path) -> Result<(), StorageError>;

    /// 写入文件并返回落盘后的绝对路径
    async fn write_file(&self, relative: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError>;
}

/// 本地磁盘存储
pub struct LocalStorage {
    base: PathBuf,
}

impl LocalStorage {
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn resolve(&self, relative: &Path) -> Result<PathBuf, StorageError> {
        if relative.is_absolute()
            || relative
                .components()
                .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(StorageError::InvalidPath(relative.display().to_string()));
        }
        Ok(self.base.join(relative))
    }
}

#[async_trait]
impl StorageRepository for LocalStorage {
    async fn ensure_dir(&self, relative: &Path) -> Result<(), StorageError> {
        let dir = self.resolve(relative)?;
        fs::create_dir_all(&dir).await?;
        Ok(())
    }

    async fn write_file(&self, relative: &Path, bytes: &[u8]) -> Result<PathBuf, StorageError> {
        let target = self.resolve(relative)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&target, bytes).await?;
        debug!(path = %target.display(), size = bytes.len(), "file written");
        Ok(target)
    }
}
