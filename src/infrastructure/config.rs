use crate::core::constants::{cache, network};
use crate::error::{AppError, AppResult};
use crate::utils::FileSystemUtils;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// 配置文件结构（`config.toml`）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// 持久化的默认 Maven 版本
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_version: Option<String>,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub network: NetworkSettings,
}

/// 元数据缓存配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheSettings {
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
        }
    }
}

impl CacheSettings {
    /// 超出可表示范围的 TTL 视为永不过期
    pub fn ttl(&self) -> chrono::Duration {
        i64::try_from(self.ttl_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// 网络配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    #[serde(default = "default_repository_timeout_secs")]
    pub repository_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            repository_timeout_secs: default_repository_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl NetworkSettings {
    pub fn repository_timeout(&self) -> Duration {
        Duration::from_secs(self.repository_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_ttl_hours() -> u64 {
    cache::DEFAULT_TTL_HOURS
}

fn default_repository_timeout_secs() -> u64 {
    network::DEFAULT_REPOSITORY_TIMEOUT_SECS
}

fn default_connect_timeout_secs() -> u64 {
    network::DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_retry_count() -> u32 {
    network::MAX_RETRY_ATTEMPTS
}

fn default_retry_delay_ms() -> u64 {
    network::RETRY_BASE_DELAY_MS
}

/// `config.toml` 的读写入口
///
/// 默认版本的更新直接作用于原始 TOML 表，文档中的其它字段（包括未知字段）保持不变。
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 加载配置，文件不存在时返回默认配置
    pub fn load(&self) -> AppResult<Config> {
        match FileSystemUtils::read_to_string_optional(&self.path)? {
            Some(content) => toml::from_str(&content).map_err(|e| {
                AppError::invalid_config(format!("解析 {} 失败: {e}", self.path.display()))
            }),
            None => Ok(Config::default()),
        }
    }

    /// 当前持久化的默认版本
    pub fn default_version(&self) -> AppResult<Option<String>> {
        Ok(self
            .load()?
            .default_version
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    /// 设置或清除默认版本
    pub fn set_default_version(&self, version: Option<&str>) -> AppResult<()> {
        let mut table = self.load_table()?;
        match version {
            Some(v) => {
                table.insert(
                    "default_version".to_string(),
                    toml::Value::String(v.to_string()),
                );
            }
            None => {
                table.remove("default_version");
            }
        }
        self.save_table(&table)?;
        debug!(version = ?version, "默认版本已更新");
        Ok(())
    }

    /// 仅当默认版本等于给定版本时清除
    pub fn clear_default_if(&self, version: &str) -> AppResult<bool> {
        if self.default_version()?.as_deref() == Some(version) {
            self.set_default_version(None)?;
            return Ok(true);
        }
        Ok(false)
    }

    fn load_table(&self) -> AppResult<toml::Table> {
        match FileSystemUtils::read_to_string_optional(&self.path)? {
            Some(content) => content.parse::<toml::Table>().map_err(|e| {
                AppError::invalid_config(format!("解析 {} 失败: {e}", self.path.display()))
            }),
            None => Ok(toml::Table::new()),
        }
    }

    fn save_table(&self, table: &toml::Table) -> AppResult<()> {
        let content = toml::to_string_pretty(table)
            .map_err(|e| AppError::invalid_config(format!("序列化配置失败: {e}")))?;
        FileSystemUtils::atomic_write(&self.path, content.as_bytes())?;
        Ok(())
    }
}
