use super::cache::{CachedMetadata, MetadataCache, RepositorySnapshot, VersionInfo};
use super::download::ProgressCallback;
use super::repository::{build_repository, Repository, RepositoryContext};
use crate::core::version::VersionComparer;
use crate::error::{AppError, AppResult};
use crate::infrastructure::credentials::CredentialStore;
use crate::infrastructure::repository_config::{RepositoryConfigStore, RepositoryEntry};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 成功下载的发行包
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedDistribution {
    pub path: PathBuf,
    pub repository: String,
    /// 是否经过摘要校验（归档站点缺少校验文件时为 false）
    pub verified: bool,
}

/// 管理一组有序的仓库：并发发现、按优先级回退下载
pub struct RepositoryManager {
    config: RepositoryConfigStore,
    cache: MetadataCache,
    context: RepositoryContext,
    repositories: Vec<Arc<dyn Repository>>,
    repository_timeout: Duration,
}

fn by_preference(a: &Arc<dyn Repository>, b: &Arc<dyn Repository>) -> std::cmp::Ordering {
    a.priority()
        .cmp(&b.priority())
        .then_with(|| a.name().cmp(b.name()))
}

impl RepositoryManager {
    /// 从配置文件加载仓库
    pub fn new(
        config: RepositoryConfigStore,
        cache: MetadataCache,
        context: RepositoryContext,
        repository_timeout: Duration,
    ) -> AppResult<Self> {
        let mut manager = Self {
            config,
            cache,
            context,
            repositories: Vec::new(),
            repository_timeout,
        };
        manager.reload()?;
        Ok(manager)
    }

    /// 使用现成的仓库实现（测试注入）
    pub fn with_repositories(
        config: RepositoryConfigStore,
        cache: MetadataCache,
        context: RepositoryContext,
        repositories: Vec<Arc<dyn Repository>>,
        repository_timeout: Duration,
    ) -> Self {
        let mut manager = Self {
            config,
            cache,
            context,
            repositories,
            repository_timeout,
        };
        manager.repositories.sort_by(by_preference);
        manager
    }

    fn reload(&mut self) -> AppResult<()> {
        let mut repositories = Vec::new();
        for entry in self.config.load()? {
            repositories.push(build_repository(&entry, &self.context)?);
        }
        repositories.sort_by(by_preference);
        self.repositories = repositories;
        Ok(())
    }

    /// 按 (优先级, 名称) 排序的全部仓库
    pub fn repositories(&self) -> &[Arc<dyn Repository>] {
        &self.repositories
    }

    /// 配置文件中的原始条目（保留 `${VAR}` 引用）
    pub fn entries(&self) -> AppResult<Vec<RepositoryEntry>> {
        self.config.load_raw()
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.context.credentials
    }

    fn enabled(&self) -> impl Iterator<Item = &Arc<dyn Repository>> {
        self.repositories.iter().filter(|r| r.is_enabled())
    }

    /// 发现所有可用版本
    ///
    /// 缓存新鲜且未强制刷新时直接返回缓存；否则并发查询所有启用的仓库，
    /// 同一版本保留优先级最高的来源。
    pub async fn discover_versions(
        &self,
        force_refresh: bool,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<VersionInfo>> {
        if !force_refresh && self.cache.is_fresh() {
            if let Some(cached) = self.cache.load() {
                debug!(versions = cached.versions.len(), "📖 使用缓存的版本列表");
                return Ok(cached.versions);
            }
        }

        let repositories: Vec<Arc<dyn Repository>> = self.enabled().cloned().collect();
        if repositories.is_empty() {
            return Err(AppError::NoRepositoriesAvailable {
                detail: "没有启用的仓库".to_string(),
            });
        }

        let timeout = self.repository_timeout;
        let results = join_all(repositories.iter().map(|repo| async move {
            let outcome = tokio::time::timeout(timeout, repo.discover_versions(cancel)).await;
            let outcome = match outcome {
                Ok(result) => result,
                Err(_) => Err(AppError::download_failed(
                    repo.name(),
                    format!("版本发现超时 ({}s)", timeout.as_secs()),
                )),
            };
            (repo.clone(), outcome)
        }))
        .await;

        if cancel.is_cancelled() {
            return Err(AppError::cancelled("发现可用版本"));
        }

        let now = Utc::now();
        let mut merged: HashMap<String, VersionInfo> = HashMap::new();
        let mut snapshots = BTreeMap::new();
        let mut failures = Vec::new();

        // `results` 与 `repositories` 同序，已按优先级排列，先到者胜出
        for (repo, outcome) in results {
            let available = match outcome {
                Ok(versions) => {
                    debug!(repository = repo.name(), count = versions.len(), "仓库返回版本");
                    for version in versions {
                        merged.entry(version.clone()).or_insert_with(|| VersionInfo {
                            version,
                            source_repository: repo.name().to_string(),
                            source_type: repo.kind(),
                        });
                    }
                    true
                }
                Err(e) => {
                    warn!(repository = repo.name(), error = %e, "⚠️ 仓库版本发现失败");
                    failures.push(format!("{}: {e}", repo.name()));
                    false
                }
            };
            snapshots.insert(
                repo.name().to_string(),
                RepositorySnapshot {
                    url: repo.url().to_string(),
                    priority: repo.priority(),
                    available,
                    timestamp: now,
                },
            );
        }

        if failures.len() == repositories.len() {
            return Err(AppError::NoRepositoriesAvailable {
                detail: failures.join("; "),
            });
        }

        let order = VersionComparer::sort_strings_descending(merged.keys());
        let versions: Vec<VersionInfo> = order
            .into_iter()
            .filter_map(|v| merged.remove(&v))
            .collect();

        let metadata = CachedMetadata::new(versions.clone(), snapshots);
        if let Err(e) = self.cache.save(&metadata) {
            warn!(error = %e, "写入版本缓存失败");
        }

        info!(versions = versions.len(), "🔍 版本发现完成");
        Ok(versions)
    }

    /// 下载候选顺序：缓存中记录的来源优先，其余按 (优先级, 名称)
    fn download_candidates(&self, version: &str) -> Vec<Arc<dyn Repository>> {
        let hint = self
            .cache
            .load()
            .and_then(|metadata| metadata.source_of(version).map(|info| info.source_repository.clone()));

        let mut candidates: Vec<Arc<dyn Repository>> = self.enabled().cloned().collect();
        if let Some(hint) = hint {
            if let Some(index) = candidates.iter().position(|r| r.name() == hint) {
                let preferred = candidates.remove(index);
                candidates.insert(0, preferred);
            }
        }
        candidates
    }

    /// 下载并校验指定版本，失败时依次回退到下一个仓库
    pub async fn download_version(
        &self,
        version: &str,
        dest_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> AppResult<DownloadedDistribution> {
        let candidates = self.download_candidates(version);
        if candidates.is_empty() {
            return Err(AppError::NoRepositoriesAvailable {
                detail: "没有启用的仓库".to_string(),
            });
        }

        let mut failures = Vec::new();
        for repo in candidates {
            if cancel.is_cancelled() {
                return Err(AppError::cancelled(&format!("下载 Maven {version}")));
            }

            let path = match repo
                .download_distribution(version, dest_dir, progress.clone(), cancel)
                .await
            {
                Ok(path) => path,
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(repository = repo.name(), version, error = %e, "⚠️ 下载失败，尝试下一个仓库");
                    failures.push(format!("{}: {e}", repo.name()));
                    continue;
                }
            };

            match repo.verify_checksum(&path, version, cancel).await {
                Ok(verified) => {
                    info!(repository = repo.name(), version, verified, "✅ 下载完成");
                    return Ok(DownloadedDistribution {
                        path,
                        repository: repo.name().to_string(),
                        verified,
                    });
                }
                Err(e) => {
                    let _ = tokio::fs::remove_file(&path).await;
                    if e.is_cancelled() {
                        return Err(e);
                    }
                    warn!(repository = repo.name(), version, error = %e, "⚠️ 校验失败，尝试下一个仓库");
                    failures.push(format!("{}: {e}", repo.name()));
                }
            }
        }

        Err(AppError::VersionNotFound {
            version: version.to_string(),
            detail: failures.join("; "),
        })
    }

    /// 添加仓库
    pub fn add_repository(&mut self, entry: RepositoryEntry) -> AppResult<()> {
        entry.validate()?;
        let mut entries = self.config.load_raw()?;
        if entries.iter().any(|e| e.name == entry.name) {
            return Err(AppError::RepositoryExists { name: entry.name });
        }

        info!(repository = %entry.name, url = %entry.url, "➕ 添加仓库");
        entries.push(entry);
        self.config.save_raw(&entries)?;
        self.cache.invalidate()?;
        self.reload()
    }

    /// 删除仓库及其凭据
    pub async fn remove_repository(&mut self, name: &str) -> AppResult<()> {
        let mut entries = self.config.load_raw()?;
        let before = entries.len();
        entries.retain(|e| e.name != name);
        if entries.len() == before {
            return Err(AppError::RepositoryNotFound {
                name: name.to_string(),
            });
        }

        self.config.save_raw(&entries)?;
        match self.context.credentials.delete(name).await {
            Ok(()) => {}
            Err(AppError::SecureStoreUnavailable { reason }) => {
                debug!(repository = name, reason = %reason, "安全存储不可用，跳过凭据清理");
            }
            Err(e) => warn!(repository = name, error = %e, "清理仓库凭据失败"),
        }
        self.cache.invalidate()?;
        info!(repository = name, "➖ 已删除仓库");
        self.reload()
    }

    /// 使版本缓存失效
    pub fn invalidate_cache(&self) -> AppResult<()> {
        self.cache.invalidate()
    }
}
