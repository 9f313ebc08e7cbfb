use super::http_client::{HttpClient, NetworkError};
use crate::core::constants::network;
use crate::infrastructure::credentials::ResolvedAuth;
use futures_util::StreamExt;
use sha2::Digest;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// 下载进度回调：(已下载字节, 总字节，未知时为 0)
pub type ProgressCallback = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// 重试策略：首次尝试之后最多重试 `retries` 次，第 n 次重试前等待 `base_delay * 2^n`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: network::MAX_RETRY_ATTEMPTS,
            base_delay: Duration::from_millis(network::RETRY_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(retries: u32, base_delay: Duration) -> Self {
        Self {
            retries,
            base_delay,
        }
    }

    /// 计算第 `retry` 次重试（从 0 开始）前的等待时间
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(retry))
            .min(Duration::from_secs(60))
    }
}

/// 对可重试错误执行指数退避重试；认证失败、404 等永久错误立即返回
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    cancel: &CancellationToken,
    what: &str,
    mut operation: F,
) -> Result<T, NetworkError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, NetworkError>>,
{
    let mut retry = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(NetworkError::Cancelled);
        }

        let result = tokio::select! {
            _ = cancel.cancelled() => return Err(NetworkError::Cancelled),
            result = operation() => result,
        };

        match result {
            Ok(value) => return Ok(value),
            Err(error) if error.is_transient() && retry < policy.retries => {
                let delay = policy.delay_for(retry);
                warn!(
                    target_name = what,
                    attempt = retry + 1,
                    max_attempts = policy.retries + 1,
                    delay_ms = delay.as_millis() as u64,
                    error = %error,
                    "⚠️ 请求出错，稍后重试"
                );
                tokio::select! {
                    _ = cancel.cancelled() => return Err(NetworkError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                retry += 1;
            }
            Err(error) => return Err(error),
        }
    }
}

/// 流式下载到文件；失败或取消时删除未完成的文件
pub async fn download_to_file(
    client: &HttpClient,
    url: &str,
    auth: Option<&ResolvedAuth>,
    file_path: &Path,
    progress: Option<&ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<u64, NetworkError> {
    let result = download_to_file_internal(client, url, auth, file_path, progress, cancel).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(file_path).await;
    }
    result
}

async fn download_to_file_internal(
    client: &HttpClient,
    url: &str,
    auth: Option<&ResolvedAuth>,
    file_path: &Path,
    progress: Option<&ProgressCallback>,
    cancel: &CancellationToken,
) -> Result<u64, NetworkError> {
    let response = client.get(url, auth).await?;
    let total_size = response.content_length().unwrap_or(0);
    let mut downloaded = 0u64;
    let mut stream = response.bytes_stream();

    let mut file = tokio::fs::File::create(file_path)
        .await
        .map_err(|e| NetworkError::Permanent(format!("创建文件失败: {e}")))?;

    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => return Err(NetworkError::Cancelled),
            chunk = tokio::time::timeout(client.idle_timeout(), stream.next()) => {
                chunk.map_err(|_| NetworkError::stalled(url, client.idle_timeout()))?
            }
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk.map_err(NetworkError::from_reqwest)?;
        downloaded += chunk.len() as u64;
        file.write_all(&chunk)
            .await
            .map_err(|e| NetworkError::Permanent(format!("写入文件失败: {e}")))?;
        if let Some(callback) = progress {
            callback(downloaded, total_size);
        }
    }

    file.flush()
        .await
        .map_err(|e| NetworkError::Permanent(format!("刷新文件失败: {e}")))?;

    if total_size > 0 && downloaded != total_size {
        return Err(NetworkError::Transient(format!(
            "下载不完整: {downloaded}/{total_size} 字节"
        )));
    }

    debug!(url, bytes = downloaded, "下载完成");
    Ok(downloaded)
}

/// 计算文件摘要（十六进制小写）
pub async fn file_digest<D: Digest>(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = D::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// 从校验文件内容中取出摘要
///
/// 兼容 `<hash>`、`<hash>  <file>` 以及 `SHA512 (<file>) = <hash>` 三种写法。
pub fn parse_checksum(content: &str, expected_len: usize) -> Option<String> {
    content
        .split(|c: char| c.is_whitespace() || c == '=')
        .map(str::trim)
        .find(|token| token.len() == expected_len && token.chars().all(|c| c.is_ascii_hexdigit()))
        .map(|token| token.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Sha256, Sha512};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tempfile::TempDir;

    #[test]
    fn test_backoff_delays() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0), Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result = with_retry(policy, &CancellationToken::new(), "test", || {
            let n = attempts.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(NetworkError::Transient("flaky".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<(), _> = with_retry(policy, &CancellationToken::new(), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(NetworkError::Transient("down".to_string())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));
        let result: Result<(), _> = with_retry(policy, &CancellationToken::new(), "test", || {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(NetworkError::Unauthorized(401)) }
        })
        .await;
        assert!(matches!(result, Err(NetworkError::Unauthorized(401))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<(), _> =
            with_retry(RetryPolicy::default(), &cancel, "test", || async { Ok(()) }).await;
        assert!(matches!(result, Err(NetworkError::Cancelled)));
    }

    #[tokio::test]
    async fn test_download_reports_progress_and_digest() {
        let mut server = mockito::Server::new_async().await;
        let body = b"maven-distribution-bytes".to_vec();
        let mock = server
            .mock("GET", "/dist.tar.gz")
            .with_status(200)
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("dist.tar.gz");
        let seen = Arc::new(AtomicU32::new(0));
        let seen_clone = seen.clone();
        let progress: ProgressCallback = Arc::new(move |done, _total| {
            seen_clone.store(done as u32, Ordering::SeqCst);
        });
        let client = HttpClient::new(Duration::from_secs(5), None).unwrap();

        let bytes = download_to_file(
            &client,
            &format!("{}/dist.tar.gz", server.url()),
            None,
            &target,
            Some(&progress),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(bytes, body.len() as u64);
        assert_eq!(seen.load(Ordering::SeqCst), body.len() as u32);
        let expected = hex::encode(Sha256::digest(&body));
        assert_eq!(file_digest::<Sha256>(&target).await.unwrap(), expected);
        assert_eq!(file_digest::<Sha512>(&target).await.unwrap().len(), 128);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_failed_download_leaves_no_file() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let target = dir.path().join("missing.tar.gz");
        let client = HttpClient::new(Duration::from_secs(5), None).unwrap();
        let result = download_to_file(
            &client,
            &format!("{}/missing.tar.gz", server.url()),
            None,
            &target,
            None,
            &CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(NetworkError::NotFound(_))));
        assert!(!target.exists());
    }

    #[test]
    fn test_parse_checksum_formats() {
        let hash = "a".repeat(64);
        assert_eq!(parse_checksum(&hash, 64), Some(hash.clone()));
        assert_eq!(
            parse_checksum(&format!("{}  apache-maven-3.9.6-bin.tar.gz\n", hash.to_uppercase()), 64),
            Some(hash.clone())
        );
        let long = "b".repeat(128);
        assert_eq!(
            parse_checksum(&format!("SHA512 (apache-maven.tar.gz) = {long}"), 128),
            Some(long)
        );
        assert_eq!(parse_checksum("not-a-hash", 64), None);
    }
}
