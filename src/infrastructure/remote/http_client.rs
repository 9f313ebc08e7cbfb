use crate::core::constants::network::{DEFAULT_REPOSITORY_TIMEOUT_SECS, USER_AGENT};
use crate::error::{AppError, AppResult};
use crate::infrastructure::credentials::ResolvedAuth;
use crate::infrastructure::repository_config::TlsConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;

/// 网络错误类型
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// 401/403，不应使用同一凭据重试
    #[error("认证失败 (HTTP {0})")]
    Unauthorized(u16),

    #[error("资源不存在: {0}")]
    NotFound(String),

    /// 可以重试的错误（超时、连接失败、5xx）
    #[error("{0}")]
    Transient(String),

    /// 不可重试的其它错误
    #[error("{0}")]
    Permanent(String),

    #[error("操作已取消")]
    Cancelled,
}

impl NetworkError {
    /// 从 HTTP 状态码创建错误
    pub fn from_status(status: StatusCode, url: &str) -> Self {
        match status.as_u16() {
            401 | 403 => Self::Unauthorized(status.as_u16()),
            404 | 410 => Self::NotFound(url.to_string()),
            408 | 429 | 500..=599 => Self::Transient(format!("服务器错误 (HTTP {status})")),
            _ => Self::Permanent(format!("HTTP {status}: {url}")),
        }
    }

    /// 按错误性质分类 reqwest 错误
    pub fn from_reqwest(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            let url = error.url().map(|u| u.to_string()).unwrap_or_default();
            return Self::from_status(status, &url);
        }
        if error.is_timeout() {
            Self::Transient(format!("连接超时: {error}"))
        } else if error.is_connect() || error.is_request() || error.is_body() {
            Self::Transient(format!("网络请求失败: {error}"))
        } else {
            Self::Permanent(error.to_string())
        }
    }

    /// 连接已建立但在限定时间内没有任何数据
    pub fn stalled(url: &str, after: Duration) -> Self {
        Self::Transient(format!("{} 秒内没有收到数据: {url}", after.as_secs_f32()))
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, NetworkError::Transient(_))
    }

    /// 转换为带仓库上下文的应用错误
    pub fn into_app_error(self, repository: &str) -> AppError {
        match self {
            NetworkError::Unauthorized(status) => AppError::AuthenticationFailed {
                repository: repository.to_string(),
                status,
            },
            NetworkError::NotFound(resource) => AppError::NotFound { resource },
            NetworkError::Cancelled => AppError::cancelled(&format!("访问仓库 '{repository}'")),
            NetworkError::Transient(reason) | NetworkError::Permanent(reason) => {
                AppError::download_failed(repository, reason)
            }
        }
    }
}

/// HTTP 客户端包装器
///
/// 每次等待响应头或读取响应体都受 `idle_timeout` 限制，停滞的连接按可重试错误处理。
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    idle_timeout: Duration,
}

impl HttpClient {
    /// 创建新的 HTTP 客户端
    pub fn new(connect_timeout: Duration, tls: Option<&TlsConfig>) -> AppResult<Self> {
        let mut builder = Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(USER_AGENT);

        if let Some(tls) = tls {
            if let Some(ca_path) = &tls.ca_cert {
                let pem = std::fs::read(ca_path).map_err(|e| {
                    AppError::invalid_config(format!(
                        "无法读取 CA 证书 {}: {e}",
                        ca_path.display()
                    ))
                })?;
                let certificate = reqwest::Certificate::from_pem(&pem).map_err(|e| {
                    AppError::invalid_config(format!(
                        "无效的 CA 证书 {}: {e}",
                        ca_path.display()
                    ))
                })?;
                builder = builder.add_root_certificate(certificate);
            }
            if tls.insecure {
                builder = builder.danger_accept_invalid_certs(true);
            }
        }

        let client = builder
            .build()
            .map_err(|e| AppError::invalid_config(format!("创建 HTTP 客户端失败: {e}")))?;
        Ok(Self {
            client,
            idle_timeout: Duration::from_secs(DEFAULT_REPOSITORY_TIMEOUT_SECS),
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    fn request(&self, url: &str, auth: Option<&ResolvedAuth>) -> RequestBuilder {
        let request = self.client.get(url);
        match auth {
            Some(ResolvedAuth::Basic { username, password }) => {
                request.basic_auth(username, Some(password))
            }
            Some(ResolvedAuth::Bearer { token }) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET 请求，非 2xx 状态转换为 [`NetworkError`]
    pub async fn get(
        &self,
        url: &str,
        auth: Option<&ResolvedAuth>,
    ) -> Result<Response, NetworkError> {
        let response = tokio::time::timeout(self.idle_timeout, self.request(url, auth).send())
            .await
            .map_err(|_| NetworkError::stalled(url, self.idle_timeout))?
            .map_err(NetworkError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NetworkError::from_status(status, url));
        }
        Ok(response)
    }

    /// GET 请求并返回文本
    pub async fn get_text(
        &self,
        url: &str,
        auth: Option<&ResolvedAuth>,
    ) -> Result<String, NetworkError> {
        let response = self.get(url, auth).await?;
        tokio::time::timeout(self.idle_timeout, response.text())
            .await
            .map_err(|_| NetworkError::stalled(url, self.idle_timeout))?
            .map_err(NetworkError::from_reqwest)
    }
}
