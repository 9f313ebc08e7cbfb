use super::archive::ArchiveRepository;
use super::download::{ProgressCallback, RetryPolicy};
use super::nexus::NexusRepository;
use crate::error::AppResult;
use crate::infrastructure::config::NetworkSettings;
use crate::infrastructure::credentials::CredentialStore;
use crate::infrastructure::repository_config::{RepositoryEntry, RepositoryType};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Maven 发行包的来源
#[async_trait]
pub trait Repository: Send + Sync {
    fn name(&self) -> &str;

    /// 数值越小越优先
    fn priority(&self) -> i32;

    fn is_enabled(&self) -> bool;

    fn kind(&self) -> RepositoryType;

    fn url(&self) -> &str;

    /// 列出仓库中可用的版本号
    async fn discover_versions(&self, cancel: &CancellationToken) -> AppResult<Vec<String>>;

    /// 下载指定版本的发行包到 `dest_dir`，返回文件路径
    async fn download_distribution(
        &self,
        version: &str,
        dest_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> AppResult<PathBuf>;

    /// 校验已下载的发行包
    ///
    /// `Ok(true)` 表示校验通过，`Ok(false)` 表示仓库未提供校验文件且该来源允许跳过，
    /// 摘要不一致返回 `ChecksumMismatch`。
    async fn verify_checksum(
        &self,
        path: &Path,
        version: &str,
        cancel: &CancellationToken,
    ) -> AppResult<bool>;
}

/// 构建仓库实现所需的共享依赖
#[derive(Clone)]
pub struct RepositoryContext {
    pub credentials: Arc<dyn CredentialStore>,
    pub network: NetworkSettings,
}

impl RepositoryContext {
    pub fn new(credentials: Arc<dyn CredentialStore>, network: NetworkSettings) -> Self {
        Self {
            credentials,
            network,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.network.retry_count, self.network.retry_delay())
    }
}

/// 按配置条目的类型构造仓库实现
pub fn build_repository(
    entry: &RepositoryEntry,
    context: &RepositoryContext,
) -> AppResult<Arc<dyn Repository>> {
    entry.validate()?;
    let repository: Arc<dyn Repository> = match entry.repo_type {
        RepositoryType::Nexus => Arc::new(NexusRepository::new(entry.clone(), context)?),
        RepositoryType::Archive => Arc::new(ArchiveRepository::new(entry.clone(), context)?),
    };
    Ok(repository)
}

/// 拼接基础 URL 与相对路径，去掉多余的斜杠
pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
