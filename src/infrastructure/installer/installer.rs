use super::extract::{extract_archive, locate_distribution_root};
use super::lock::InstallLock;
use crate::core::version::{Version, VersionComparer};
use crate::error::{AppError, AppResult, VersionSource};
use crate::infrastructure::config::ConfigStore;
use crate::infrastructure::remote::{ArchiveFormat, Platform, ProgressCallback, RepositoryManager};
use crate::shim::generator::{installed_version_dirs, ShimGenerator};
use crate::utils::{FileSystemUtils, MvnenvPaths};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// 单次安装的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    Requested,
    Downloading,
    ChecksumVerifying,
    Extracting,
    Verifying,
    Committed,
    RollingBack,
    Failed,
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InstallState::Requested => "已请求",
            InstallState::Downloading => "下载中",
            InstallState::ChecksumVerifying => "校验中",
            InstallState::Extracting => "解压中",
            InstallState::Verifying => "验证中",
            InstallState::Committed => "已提交",
            InstallState::RollingBack => "回滚中",
            InstallState::Failed => "失败",
        };
        f.write_str(label)
    }
}

/// 安装结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub version: String,
    pub path: PathBuf,
    pub repository: String,
    pub verified: bool,
}

/// 卸载结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub version: String,
    /// 被卸载的版本是否为全局默认版本（已清除）
    pub default_cleared: bool,
}

/// 原子地安装与卸载 Maven 版本
pub struct Installer {
    paths: MvnenvPaths,
    manager: Arc<RepositoryManager>,
    config: ConfigStore,
    shims: ShimGenerator,
}

impl Installer {
    pub fn new(
        paths: MvnenvPaths,
        manager: Arc<RepositoryManager>,
        config: ConfigStore,
        shims: ShimGenerator,
    ) -> Self {
        Self {
            paths,
            manager,
            config,
            shims,
        }
    }

    pub fn manager(&self) -> &Arc<RepositoryManager> {
        &self.manager
    }

    fn transition(version: &str, state: InstallState) {
        debug!(version, state = %state, "安装状态变更");
    }

    /// 安装指定版本
    ///
    /// 同一版本的并发安装通过版本级文件锁串行化。发行包解压在 versions 目录下的
    /// 临时目录中完成，验证通过后才整体重命名到 `versions/<v>`。
    pub async fn install(
        &self,
        version: &str,
        force: bool,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> AppResult<InstallOutcome> {
        let version = Version::parse(version)?.as_str().to_string();
        Self::transition(&version, InstallState::Requested);

        let _lock = InstallLock::acquire(&self.paths.lock_file(&version)).await?;

        let target = self.paths.version_dir(&version);
        if self.paths.is_installed(&version) {
            if !force {
                return Err(AppError::AlreadyInstalled { version });
            }
            info!(version, "🔄 强制重新安装，先移除现有版本");
            self.remove_version_dir(&version).await?;
        } else if target.exists() {
            warn!(version, path = %target.display(), "清理未完成的安装目录");
            self.remove_version_dir(&version).await?;
        }

        let versions_dir = self.paths.versions_dir();
        FileSystemUtils::create_dir_all(&versions_dir)?;
        let staging = tempfile::Builder::new()
            .prefix(".install-")
            .tempdir_in(&versions_dir)?;

        let result = self
            .install_into(&version, staging.path(), &target, progress, cancel)
            .await;

        match result {
            Ok((repository, verified)) => {
                if let Err(e) = staging.close() {
                    warn!(version, error = %e, "清理临时目录失败");
                }
                Self::transition(&version, InstallState::Committed);
                self.regenerate_shims();
                info!(version, repository, "✅ Maven 安装完成");
                Ok(InstallOutcome {
                    version,
                    path: target,
                    repository,
                    verified,
                })
            }
            Err(e) => {
                Self::transition(&version, InstallState::RollingBack);
                let staging_path = staging.path().to_path_buf();
                let cleanup = staging
                    .close()
                    .or_else(|_| FileSystemUtils::remove_dir_all(&staging_path));
                Err(Self::rolled_back(&version, &staging_path, e, cleanup))
            }
        }
    }

    /// 回滚收尾：暂存目录清理失败只记录日志，返回导致回滚的原始错误
    fn rolled_back(
        version: &str,
        staging: &Path,
        error: AppError,
        cleanup: std::io::Result<()>,
    ) -> AppError {
        if let Err(cleanup) = cleanup {
            warn!(version, path = %staging.display(), error = %cleanup, "回滚时清理临时目录失败");
        }
        Self::transition(version, InstallState::Failed);
        error
    }

    async fn install_into(
        &self,
        version: &str,
        staging: &Path,
        target: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> AppResult<(String, bool)> {
        Self::transition(version, InstallState::Downloading);
        let distribution = self
            .manager
            .download_version(version, staging, progress, cancel)
            .await?;

        Self::transition(version, InstallState::ChecksumVerifying);
        if !distribution.verified {
            warn!(version, repository = %distribution.repository, "⚠️ 来源未提供校验文件，跳过摘要校验");
        }

        Self::transition(version, InstallState::Extracting);
        let format = distribution
            .path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(ArchiveFormat::from_file_name)
            .unwrap_or_else(|| Platform::current().archive_format());
        let archive = distribution.path.clone();
        let extract_dir = staging.join("extract");
        let dest = extract_dir.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive, &dest, format))
            .await
            .map_err(|e| AppError::extraction_failed(version, e.to_string()))?
            .map_err(|e| AppError::extraction_failed(version, e.to_string()))?;

        if cancel.is_cancelled() {
            return Err(AppError::cancelled(&format!("安装 Maven {version}")));
        }

        Self::transition(version, InstallState::Verifying);
        let root = locate_distribution_root(&extract_dir)
            .ok_or_else(|| AppError::extraction_failed(version, "发行包中缺少 bin/mvn"))?;

        tokio::fs::rename(&root, target).await?;
        Ok((distribution.repository, distribution.verified))
    }

    /// 卸载指定版本
    ///
    /// 先把目录重命名为点开头的暂存名，安装判定随之立即失效，再删除暂存目录。
    pub async fn uninstall(&self, version: &str) -> AppResult<UninstallOutcome> {
        let version = Version::parse(version)?.as_str().to_string();
        let _lock = InstallLock::acquire(&self.paths.lock_file(&version)).await?;

        if !self.paths.is_installed(&version) {
            return Err(AppError::VersionNotInstalled {
                version,
                tier: None,
            });
        }

        self.remove_version_dir(&version).await?;
        let default_cleared = self.config.clear_default_if(&version)?;
        if default_cleared {
            info!(version, "已清除全局默认版本");
        }
        self.regenerate_shims();
        info!(version, "🗑️ Maven 已卸载");

        Ok(UninstallOutcome {
            version,
            default_cleared,
        })
    }

    async fn remove_version_dir(&self, version: &str) -> AppResult<()> {
        let dir = self.paths.version_dir(version);
        let staging = self
            .paths
            .versions_dir()
            .join(format!(".uninstall-{version}-{}", uuid::Uuid::new_v4()));
        tokio::fs::rename(&dir, &staging).await?;
        tokio::task::spawn_blocking(move || FileSystemUtils::remove_dir_all(&staging))
            .await
            .map_err(|e| AppError::Io(std::io::Error::other(e)))??;
        Ok(())
    }

    /// 已安装的版本（每次都重新扫描文件系统），按版本降序
    pub fn list_installed(&self) -> AppResult<Vec<String>> {
        Ok(VersionComparer::sort_strings_descending(
            installed_version_dirs(&self.paths)?,
        ))
    }

    /// 设置全局默认版本
    pub fn set_default(&self, version: &str) -> AppResult<()> {
        let version = Version::parse(version)?;
        if !self.paths.is_installed(version.as_str()) {
            return Err(AppError::VersionNotInstalled {
                version: version.as_str().to_string(),
                tier: Some(VersionSource::Global),
            });
        }
        self.config.set_default_version(Some(version.as_str()))
    }

    /// 代理重新生成失败只记录日志
    fn regenerate_shims(&self) {
        if let Err(e) = self.shims.rehash() {
            warn!(error = %e, "⚠️ 代理重新生成失败，可稍后执行 mvnenv rehash");
        }
    }
}
