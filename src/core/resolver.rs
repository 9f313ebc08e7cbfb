use crate::core::constants::{env, layout};
use crate::core::version::Version;
use crate::error::{AppError, AppResult, VersionSource};
use crate::infrastructure::config::ConfigStore;
use crate::utils::{EnvLookup, EnvVarUtils, FileSystemUtils, MvnenvPaths};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 一次解析的结果，每次调用都重新计算
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedVersion {
    pub version: String,
    pub source: VersionSource,
    /// 安装目录，即子进程的 MAVEN_HOME
    pub path: PathBuf,
}

/// 某一层级给出的版本（尚未检查是否已安装）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRequest {
    pub version: String,
    pub source: VersionSource,
    /// 项目标记文件位置（仅 Local 层级）
    pub origin: Option<PathBuf>,
}

/// 按 会话 → 项目标记 → 全局默认 的顺序确定当前版本
#[derive(Debug, Clone)]
pub struct VersionResolver {
    paths: MvnenvPaths,
    config: ConfigStore,
    session: Option<String>,
    cwd: PathBuf,
}

impl VersionResolver {
    pub fn new(
        paths: MvnenvPaths,
        config: ConfigStore,
        session: Option<String>,
        cwd: impl Into<PathBuf>,
    ) -> Self {
        Self {
            paths,
            config,
            session: session
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
            cwd: cwd.into(),
        }
    }

    /// 从环境读取会话覆盖
    pub fn from_env(paths: MvnenvPaths, lookup: &EnvLookup, cwd: impl Into<PathBuf>) -> Self {
        let config = ConfigStore::new(paths.config_file());
        let session = EnvVarUtils::non_empty(lookup, env::SESSION_VERSION);
        Self::new(paths, config, session, cwd)
    }

    pub fn paths(&self) -> &MvnenvPaths {
        &self.paths
    }

    /// 第一个给出非空值的层级；不检查安装状态
    pub fn requested_version(&self) -> AppResult<Option<VersionRequest>> {
        if let Some(version) = &self.session {
            return Ok(Some(VersionRequest {
                version: version.clone(),
                source: VersionSource::Shell,
                origin: None,
            }));
        }

        if let Some((marker, value)) = find_marker(&self.cwd)? {
            match value {
                Some(version) => {
                    return Ok(Some(VersionRequest {
                        version,
                        source: VersionSource::Local,
                        origin: Some(marker),
                    }))
                }
                None => debug!(marker = %marker.display(), "标记文件为空，使用全局默认"),
            }
        }

        Ok(self.config.default_version()?.map(|version| VersionRequest {
            version,
            source: VersionSource::Global,
            origin: None,
        }))
    }

    /// 解析当前生效的版本
    ///
    /// 高层级给出的版本未安装时直接报错，不会回落到低层级。
    pub fn resolve(&self) -> AppResult<ResolvedVersion> {
        let request = self.requested_version()?.ok_or(AppError::NoVersionSet)?;

        if !self.paths.is_installed(&request.version) {
            return Err(AppError::VersionNotInstalled {
                version: request.version,
                tier: Some(request.source),
            });
        }

        let path = self.paths.version_dir(&request.version);
        debug!(version = %request.version, source = %request.source, path = %path.display(), "版本已解析");
        Ok(ResolvedVersion {
            version: request.version,
            source: request.source,
            path,
        })
    }
}

/// 从 `start` 向上查找标记文件
///
/// 找到第一个标记文件即停止；文件内容去除首尾空白后为空时返回 `Some((path, None))`。
pub fn find_marker(start: &Path) -> AppResult<Option<(PathBuf, Option<String>)>> {
    for dir in start.ancestors() {
        let marker = dir.join(layout::MARKER_FILE);
        if !FileSystemUtils::is_regular_file(&marker) {
            continue;
        }
        let content = std::fs::read_to_string(&marker)?;
        let value = content.trim();
        let value = (!value.is_empty()).then(|| value.to_string());
        return Ok(Some((marker, value)));
    }
    Ok(None)
}

/// 在目录中写入项目标记文件（整体覆盖）
pub fn write_marker(dir: &Path, version: &str) -> AppResult<PathBuf> {
    let version = Version::parse(version)?;
    let marker = dir.join(layout::MARKER_FILE);
    FileSystemUtils::atomic_write(&marker, format!("{version}\n").as_bytes())?;
    Ok(marker)
}
