use crate::error::AppResult;
use crate::infrastructure::repository_config::RepositoryType;
use crate::utils::FileSystemUtils;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 发现到的可用版本及其来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub version: String,
    #[serde(rename = "source")]
    pub source_repository: String,
    pub source_type: RepositoryType,
}

/// 单个仓库在某次发现时的快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositorySnapshot {
    pub url: String,
    pub priority: i32,
    pub available: bool,
    pub timestamp: DateTime<Utc>,
}

/// 缓存文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedMetadata {
    pub timestamp: DateTime<Utc>,
    pub versions: Vec<VersionInfo>,
    #[serde(default)]
    pub repositories: BTreeMap<String, RepositorySnapshot>,
}

impl CachedMetadata {
    pub fn new(
        versions: Vec<VersionInfo>,
        repositories: BTreeMap<String, RepositorySnapshot>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            versions,
            repositories,
        }
    }

    /// 未超过 TTL；时间戳位于未来视为过期
    pub fn is_fresh_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        let age = now.signed_duration_since(self.timestamp);
        age >= Duration::zero() && age <= ttl
    }

    /// 查找曾经报告过该版本的仓库
    pub fn source_of(&self, version: &str) -> Option<&VersionInfo> {
        self.versions.iter().find(|info| info.version == version)
    }
}

/// 版本元数据缓存
///
/// 文件损坏或不可读一律视为缓存不存在；写入走临时文件加 rename。
#[derive(Debug, Clone)]
pub struct MetadataCache {
    path: PathBuf,
    ttl: Duration,
}

impl MetadataCache {
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// 缓存是否存在且未过期，从不返回错误
    pub fn is_fresh(&self) -> bool {
        self.read()
            .map(|metadata| metadata.is_fresh_at(Utc::now(), self.ttl))
            .unwrap_or(false)
    }

    /// 读取缓存，不存在或损坏时返回 None
    pub fn load(&self) -> Option<CachedMetadata> {
        self.read()
    }

    fn read(&self) -> Option<CachedMetadata> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!(path = %self.path.display(), error = %e, "读取缓存失败");
                }
                return None;
            }
        };
        match serde_json::from_str(&content) {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "缓存文件已损坏，忽略");
                None
            }
        }
    }

    /// 原子写入缓存
    pub fn save(&self, metadata: &CachedMetadata) -> AppResult<()> {
        let json = serde_json::to_vec_pretty(metadata)?;
        FileSystemUtils::atomic_write(&self.path, &json)?;
        debug!(
            path = %self.path.display(),
            versions = metadata.versions.len(),
            "💾 缓存已保存"
        );
        Ok(())
    }

    /// 删除缓存文件，文件不存在不视为错误
    pub fn invalidate(&self) -> AppResult<()> {
        FileSystemUtils::remove_file(&self.path)?;
        debug!(path = %self.path.display(), "🗑️ 缓存已失效");
        Ok(())
    }
}
