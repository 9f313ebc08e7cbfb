use crate::error::{AppError, AppResult};
use fs4::fs_std::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 按版本划分的安装锁（进程间的建议性独占锁），释放时机为 drop
#[derive(Debug)]
pub struct InstallLock {
    _file: File,
    path: PathBuf,
}

impl InstallLock {
    /// 阻塞直到获得锁；在阻塞线程池中等待，不占用异步运行时线程
    pub async fn acquire(path: &Path) -> AppResult<Self> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::acquire_blocking(path))
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))?
    }

    fn acquire_blocking(path: PathBuf) -> AppResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&path)?;
        debug!(lock = %path.display(), "等待安装锁");
        file.lock_exclusive()?;
        debug!(lock = %path.display(), "🔒 已获得安装锁");
        Ok(Self { _file: file, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_same_version_is_serialized() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("locks/3.9.6.lock");

        let first = InstallLock::acquire(&path).await.unwrap();
        let acquired = Arc::new(AtomicBool::new(false));
        let acquired_clone = acquired.clone();
        let path_clone = path.clone();
        let waiter = tokio::spawn(async move {
            let _lock = InstallLock::acquire(&path_clone).await.unwrap();
            acquired_clone.store(true, Ordering::SeqCst);
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!acquired.load(Ordering::SeqCst));

        drop(first);
        waiter.await.unwrap();
        assert!(acquired.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_different_versions_do_not_block() {
        let dir = TempDir::new().unwrap();
        let a = InstallLock::acquire(&dir.path().join("locks/3.9.6.lock")).await.unwrap();
        let b = tokio::time::timeout(
            Duration::from_secs(2),
            InstallLock::acquire(&dir.path().join("locks/3.8.8.lock")),
        )
        .await
        .unwrap()
        .unwrap();
        assert_ne!(a.path(), b.path());
    }
}
