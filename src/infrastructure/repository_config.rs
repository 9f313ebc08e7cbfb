use crate::core::constants::repository as defaults;
use crate::error::{AppError, AppResult};
use crate::utils::{EnvLookup, EnvVarUtils, FileSystemUtils, ValidationUtils};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// 仓库类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepositoryType {
    /// Maven 仓库布局（Nexus、Artifactory、Maven Central）
    Nexus,
    /// Apache 归档站点的目录列表
    Archive,
}

impl fmt::Display for RepositoryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryType::Nexus => write!(f, "nexus"),
            RepositoryType::Archive => write!(f, "archive"),
        }
    }
}

/// 认证配置，字段值可以是 `${VAR}` 引用
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    Basic {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
    Bearer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token: Option<String>,
    },
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::Basic { username, password } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &password.as_ref().map(|_| "***"))
                .finish(),
            AuthConfig::Bearer { token } => f
                .debug_struct("Bearer")
                .field("token", &token.as_ref().map(|_| "***"))
                .finish(),
        }
    }
}

impl AuthConfig {
    /// 用环境变量替换字段中的 `${VAR}`
    fn substituted(&self, lookup: &EnvLookup) -> Self {
        let expand = |value: &Option<String>| {
            value
                .as_deref()
                .map(|v| EnvVarUtils::expand_variables(v, lookup))
                .filter(|v| !v.is_empty())
        };
        match self {
            AuthConfig::Basic { username, password } => AuthConfig::Basic {
                username: expand(username),
                password: expand(password),
            },
            AuthConfig::Bearer { token } => AuthConfig::Bearer {
                token: expand(token),
            },
        }
    }
}

/// TLS 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// 额外信任的 CA 证书（PEM 文件路径）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,
    /// 跳过证书校验
    #[serde(default)]
    pub insecure: bool,
}

/// 仓库配置条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub repo_type: RepositoryType,
    pub url: String,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<AuthConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

fn default_enabled() -> bool {
    true
}

impl RepositoryEntry {
    pub fn new(name: &str, repo_type: RepositoryType, url: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            repo_type,
            url: url.to_string(),
            priority,
            enabled: true,
            auth: None,
            tls: None,
        }
    }

    /// 校验名称字符集与 URL 协议
    pub fn validate(&self) -> AppResult<()> {
        ValidationUtils::validate_repository_name(&self.name)?;
        ValidationUtils::validate_repository_url(&self.url)?;
        Ok(())
    }

    /// 内置默认仓库
    pub fn builtin_defaults() -> Vec<RepositoryEntry> {
        vec![
            RepositoryEntry::new(
                defaults::CENTRAL_NAME,
                RepositoryType::Nexus,
                defaults::CENTRAL_URL,
                defaults::CENTRAL_PRIORITY,
            ),
            RepositoryEntry::new(
                defaults::ARCHIVE_NAME,
                RepositoryType::Archive,
                defaults::ARCHIVE_URL,
                defaults::ARCHIVE_PRIORITY,
            ),
        ]
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct RepositoryDocument {
    #[serde(default)]
    repositories: Vec<RepositoryEntry>,
}

/// `repositories.toml` 的读写入口
///
/// 磁盘上保留原始的 `${VAR}` 引用；只有 [`RepositoryConfigStore::load`] 返回替换后的值。
#[derive(Clone)]
pub struct RepositoryConfigStore {
    path: PathBuf,
    env: EnvLookup,
}

impl fmt::Debug for RepositoryConfigStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfigStore")
            .field("path", &self.path)
            .finish()
    }
}

impl RepositoryConfigStore {
    pub fn new(path: impl Into<PathBuf>, env: EnvLookup) -> Self {
        Self {
            path: path.into(),
            env,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 读取原始条目；文件不存在时返回内置默认仓库
    pub fn load_raw(&self) -> AppResult<Vec<RepositoryEntry>> {
        let entries = match FileSystemUtils::read_to_string_optional(&self.path)? {
            Some(content) => {
                let document: RepositoryDocument = toml::from_str(&content).map_err(|e| {
                    AppError::invalid_config(format!("解析 {} 失败: {e}", self.path.display()))
                })?;
                document.repositories
            }
            None => {
                debug!(path = %self.path.display(), "仓库配置不存在，使用内置默认仓库");
                RepositoryEntry::builtin_defaults()
            }
        };

        let mut seen = HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if !seen.insert(entry.name.as_str()) {
                return Err(AppError::invalid_config(format!(
                    "仓库名称 '{}' 重复",
                    entry.name
                )));
            }
        }
        Ok(entries)
    }

    /// 读取条目并替换认证字段中的环境变量引用
    pub fn load(&self) -> AppResult<Vec<RepositoryEntry>> {
        let mut entries = self.load_raw()?;
        for entry in &mut entries {
            if let Some(auth) = &entry.auth {
                entry.auth = Some(auth.substituted(&self.env));
            }
        }
        Ok(entries)
    }

    /// 整体原子重写
    pub fn save_raw(&self, entries: &[RepositoryEntry]) -> AppResult<()> {
        let document = RepositoryDocument {
            repositories: entries.to_vec(),
        };
        let content = toml::to_string_pretty(&document)
            .map_err(|e| AppError::invalid_config(format!("序列化仓库配置失败: {e}")))?;
        FileSystemUtils::atomic_write(&self.path, content.as_bytes())?;
        Ok(())
    }
}
