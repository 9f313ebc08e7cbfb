//! 仓库凭据存储
//!
//! 凭据只保存在系统安全存储中（Linux 上通过 `secret-tool` 访问 libsecret），
//! 永远不会写入 `repositories.toml`。安全存储不可用时写入失败，由调用方提示改用 `${VAR}` 引用。

use crate::core::constants::repository::CREDENTIAL_NAMESPACE;
use crate::error::{AppError, AppResult};
use crate::infrastructure::repository_config::{AuthConfig, RepositoryEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// 仓库凭据
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    pub secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"***")
            .finish()
    }
}

/// 凭据在安全存储中的键
pub fn credential_key(repository: &str) -> String {
    format!("{CREDENTIAL_NAMESPACE}:{repository}")
}

/// 凭据存储能力
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn store(&self, repository: &str, credential: &Credential) -> AppResult<()>;

    async fn retrieve(&self, repository: &str) -> AppResult<Option<Credential>>;

    /// 删除凭据，不存在时不报错
    async fn delete(&self, repository: &str) -> AppResult<()>;

    async fn has(&self, repository: &str) -> AppResult<bool> {
        Ok(self.retrieve(repository).await?.is_some())
    }
}

/// 基于 libsecret `secret-tool` 命令行的实现
#[derive(Debug, Clone)]
pub struct SecretToolStore {
    binary: Option<PathBuf>,
}

impl Default for SecretToolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretToolStore {
    pub fn new() -> Self {
        Self {
            binary: which::which("secret-tool").ok(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.binary.is_some()
    }

    fn binary(&self) -> AppResult<&PathBuf> {
        self.binary.as_ref().ok_or_else(|| AppError::SecureStoreUnavailable {
            reason: "未找到 secret-tool（libsecret-tools）".to_string(),
        })
    }

    fn unavailable(reason: impl Into<String>) -> AppError {
        AppError::SecureStoreUnavailable {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl CredentialStore for SecretToolStore {
    async fn store(&self, repository: &str, credential: &Credential) -> AppResult<()> {
        let binary = self.binary()?;
        let key = credential_key(repository);
        let payload = serde_json::to_string(credential)?;

        let mut child = Command::new(binary)
            .args(["store", "--label", &key, "service", &key])
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Self::unavailable(format!("无法执行 secret-tool: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(payload.as_bytes()).await?;
            stdin.shutdown().await?;
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Self::unavailable(format!("secret-tool store 失败: {}", stderr.trim())));
        }
        debug!(repository, "凭据已写入安全存储");
        Ok(())
    }

    async fn retrieve(&self, repository: &str) -> AppResult<Option<Credential>> {
        let binary = self.binary()?;
        let key = credential_key(repository);

        let output = Command::new(binary)
            .args(["lookup", "service", &key])
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| Self::unavailable(format!("无法执行 secret-tool: {e}")))?;

        // 未找到条目时 secret-tool 以非零码退出且无输出
        if !output.status.success() || output.stdout.is_empty() {
            return Ok(None);
        }

        let raw = String::from_utf8_lossy(&output.stdout);
        match serde_json::from_str::<Credential>(raw.trim()) {
            Ok(credential) => Ok(Some(credential)),
            Err(_) => {
                warn!(repository, "安全存储中的凭据格式无法识别，已忽略");
                Ok(None)
            }
        }
    }

    async fn delete(&self, repository: &str) -> AppResult<()> {
        let binary = self.binary()?;
        let key = credential_key(repository);

        let status = Command::new(binary)
            .args(["clear", "service", &key])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| Self::unavailable(format!("无法执行 secret-tool: {e}")))?;
        debug!(repository, success = status.success(), "清除安全存储中的凭据");
        Ok(())
    }
}

/// 进程内凭据存储，用于测试和无安全存储的环境
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: Mutex<HashMap<String, Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn store(&self, repository: &str, credential: &Credential) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::SecureStoreUnavailable {
                reason: "凭据存储锁已损坏".to_string(),
            })?;
        entries.insert(credential_key(repository), credential.clone());
        Ok(())
    }

    async fn retrieve(&self, repository: &str) -> AppResult<Option<Credential>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| AppError::SecureStoreUnavailable {
                reason: "凭据存储锁已损坏".to_string(),
            })?;
        Ok(entries.get(&credential_key(repository)).cloned())
    }

    async fn delete(&self, repository: &str) -> AppResult<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| AppError::SecureStoreUnavailable {
                reason: "凭据存储锁已损坏".to_string(),
            })?;
        entries.remove(&credential_key(repository));
        Ok(())
    }
}

/// 解析后的请求认证信息
#[derive(Clone, PartialEq, Eq)]
pub enum ResolvedAuth {
    Basic { username: String, password: String },
    Bearer { token: String },
}

impl fmt::Debug for ResolvedAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedAuth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            ResolvedAuth::Bearer { .. } => f.debug_struct("Bearer").field("token", &"***").finish(),
        }
    }
}

/// 为仓库解析认证信息：先查安全存储，再使用配置中已替换的 `${VAR}` 值
pub async fn resolve_auth(
    store: &dyn CredentialStore,
    entry: &RepositoryEntry,
) -> Option<ResolvedAuth> {
    let auth = entry.auth.as_ref()?;

    let stored = match store.retrieve(&entry.name).await {
        Ok(found) => found,
        Err(e) => {
            debug!(repository = %entry.name, error = %e, "安全存储不可用，改用配置中的认证信息");
            None
        }
    };

    match auth {
        AuthConfig::Basic { username, password } => {
            if let Some(credential) = stored {
                return Some(ResolvedAuth::Basic {
                    username: credential.username,
                    password: credential.secret,
                });
            }
            match (username, password) {
                (Some(username), Some(password)) => Some(ResolvedAuth::Basic {
                    username: username.clone(),
                    password: password.clone(),
                }),
                _ => {
                    warn!(repository = %entry.name, "配置了 basic 认证，但没有可用的用户名和密码");
                    None
                }
            }
        }
        AuthConfig::Bearer { token } => {
            if let Some(credential) = stored {
                return Some(ResolvedAuth::Bearer {
                    token: credential.secret,
                });
            }
            match token {
                Some(token) => Some(ResolvedAuth::Bearer {
                    token: token.clone(),
                }),
                None => {
                    warn!(repository = %entry.name, "配置了 bearer 认证，但没有可用的令牌");
                    None
                }
            }
        }
    }
}
