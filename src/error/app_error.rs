use std::fmt;
use std::io;
use thiserror::Error;

/// 版本来源（解析层级）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionSource {
    /// 会话级覆盖（环境变量）
    Shell,
    /// 项目标记文件
    Local,
    /// 持久化的默认版本
    Global,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSource::Shell => write!(f, "shell"),
            VersionSource::Local => write!(f, "local"),
            VersionSource::Global => write!(f, "global"),
        }
    }
}

/// 应用程序错误类型
#[derive(Error, Debug)]
pub enum AppError {
    #[error("无效的版本号 '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Maven {version} 未安装{}", tier_suffix(.tier))]
    VersionNotInstalled {
        version: String,
        tier: Option<VersionSource>,
    },

    #[error("Maven {version} 已经安装")]
    AlreadyInstalled { version: String },

    #[error("未设置 Maven 版本（会话、项目和全局默认均为空）")]
    NoVersionSet,

    #[error("从仓库 '{repository}' 下载失败: {reason}")]
    DownloadFailed { repository: String, reason: String },

    #[error("仓库 '{repository}' 提供的 Maven {version} 校验和不匹配 (期望 {expected}, 实际 {actual})")]
    ChecksumMismatch {
        repository: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("解压 Maven {version} 失败: {reason}")]
    ExtractionFailed { version: String, reason: String },

    #[error("仓库 '{repository}' 认证失败 (HTTP {status})")]
    AuthenticationFailed { repository: String, status: u16 },

    #[error("没有可用的仓库: {detail}")]
    NoRepositoriesAvailable { detail: String },

    #[error("所有仓库均未能提供 Maven {version}: {detail}")]
    VersionNotFound { version: String, detail: String },

    #[error("仓库 '{name}' 已存在")]
    RepositoryExists { name: String },

    #[error("仓库 '{name}' 不存在")]
    RepositoryNotFound { name: String },

    #[error("系统安全存储不可用: {reason}")]
    SecureStoreUnavailable { reason: String },

    #[error("配置无效: {message}")]
    InvalidConfiguration { message: String },

    #[error("未找到请求的资源: {resource}")]
    NotFound { resource: String },

    #[error("已解析到 Maven {version}，但可执行文件 '{command}' 不存在: {path}")]
    ShimTargetMissing {
        command: String,
        version: String,
        path: String,
    },

    #[error("操作已取消: {operation}")]
    Cancelled { operation: String },

    #[error("IO 错误: {0}")]
    Io(#[from] io::Error),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn tier_suffix(tier: &Option<VersionSource>) -> String {
    match tier {
        Some(tier) => format!(" (来源: {tier})"),
        None => String::new(),
    }
}

/// 应用程序 Result 类型
pub type AppResult<T> = Result<T, AppError>;

/// 便捷的错误创建函数
impl AppError {
    pub fn invalid_version(version: &str, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration {
            message: message.into(),
        }
    }

    pub fn download_failed(repository: &str, reason: impl Into<String>) -> Self {
        Self::DownloadFailed {
            repository: repository.to_string(),
            reason: reason.into(),
        }
    }

    pub fn extraction_failed(version: &str, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            version: version.to_string(),
            reason: reason.into(),
        }
    }

    pub fn cancelled(operation: &str) -> Self {
        Self::Cancelled {
            operation: operation.to_string(),
        }
    }

    /// 是否为取消导致的错误
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AppError::Cancelled { .. })
    }

    /// 针对错误给出下一步操作建议
    pub fn suggestions(&self) -> Vec<String> {
        match self {
            AppError::InvalidVersion { .. } => {
                vec!["版本格式应为 X[.Y[.Z]][-qualifier]，例如 3.9.6".to_string()]
            }
            AppError::VersionNotInstalled { version, tier } => {
                let mut hints = vec![format!("先安装该版本: mvnenv install {version}")];
                match tier {
                    Some(VersionSource::Shell) => {
                        hints.push("或清除会话变量 MVNENV_MAVEN_VERSION".to_string())
                    }
                    Some(VersionSource::Local) => {
                        hints.push("或修改项目中的 .maven-version 文件".to_string())
                    }
                    Some(VersionSource::Global) => {
                        hints.push("或重新设置全局版本: mvnenv global <version>".to_string())
                    }
                    None => {}
                }
                hints
            }
            AppError::AlreadyInstalled { version } => {
                vec![format!("如需重新安装: mvnenv install {version} --force")]
            }
            AppError::NoVersionSet => vec![
                "设置全局版本: mvnenv global <version>".to_string(),
                "或在项目目录执行: mvnenv local <version>".to_string(),
            ],
            AppError::AuthenticationFailed { repository, .. } => vec![
                format!("重新配置认证信息: mvnenv credential set {repository}"),
                "或在 repositories.toml 中使用 ${VAR} 引用环境变量".to_string(),
            ],
            AppError::ChecksumMismatch { .. } | AppError::DownloadFailed { .. } => {
                vec!["稍后重试，或调整仓库优先级: mvnenv repo list".to_string()]
            }
            AppError::NoRepositoriesAvailable { .. } => vec![
                "检查网络连接与仓库配置: mvnenv repo list".to_string(),
            ],
            AppError::VersionNotFound { .. } => {
                vec!["查看可用版本: mvnenv list-remote --refresh".to_string()]
            }
            AppError::SecureStoreUnavailable { .. } => vec![
                "在 repositories.toml 的 auth 字段中使用 ${VAR} 引用环境变量代替".to_string(),
            ],
            AppError::ShimTargetMissing { version, .. } => vec![format!(
                "安装可能已损坏，请重新安装: mvnenv install {version} --force"
            )],
            AppError::RepositoryNotFound { .. } => {
                vec!["查看已配置仓库: mvnenv repo list".to_string()]
            }
            _ => Vec::new(),
        }
    }

    /// 为错误添加上下文信息
    pub fn with_context(self, operation: &str) -> crate::error::ContextualError {
        crate::error::ContextualError::new(self, operation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_installed_message_includes_source() {
        let err = AppError::VersionNotInstalled {
            version: "3.9.6".to_string(),
            tier: Some(VersionSource::Local),
        };
        let message = err.to_string();
        assert!(message.contains("3.9.6"));
        assert!(message.contains("local"));
    }

    #[test]
    fn test_not_installed_tier_is_not_an_error_cause() {
        let err = AppError::VersionNotInstalled {
            version: "3.9.6".to_string(),
            tier: Some(VersionSource::Shell),
        };
        assert!(std::error::Error::source(&err).is_none());
        assert!(err
            .suggestions()
            .iter()
            .any(|s| s.contains("MVNENV_MAVEN_VERSION")));
    }

    #[test]
    fn test_suggestions_point_to_next_action() {
        let err = AppError::AuthenticationFailed {
            repository: "corp".to_string(),
            status: 401,
        };
        assert!(err
            .suggestions()
            .iter()
            .any(|s| s.contains("credential set corp")));
    }

    #[test]
    fn test_cancelled_detection() {
        assert!(AppError::cancelled("discover").is_cancelled());
        assert!(!AppError::NoVersionSet.is_cancelled());
    }
}
