use super::download::{self, file_digest, parse_checksum, ProgressCallback, RetryPolicy};
use super::http_client::{HttpClient, NetworkError};
use super::platform::Platform;
use super::repository::{join_url, Repository, RepositoryContext};
use crate::core::version::Version;
use crate::error::{AppError, AppResult};
use crate::infrastructure::repository_config::{RepositoryEntry, RepositoryType};
use async_trait::async_trait;
use regex::Regex;
use sha2::Sha512;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn listing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"href="(\d+(?:\.\d+){0,2}(?:-[A-Za-z0-9._-]+)?)/""#).unwrap())
}

/// 从目录列表页面抓取形如版本号的子目录
pub fn parse_listing_versions(html: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    listing_pattern()
        .captures_iter(html)
        .map(|caps| caps[1].to_string())
        .filter(|v| Version::parse(v).is_ok())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// Apache 归档站点，作为最后的后备来源，不支持认证
pub struct ArchiveRepository {
    entry: RepositoryEntry,
    client: HttpClient,
    retry: RetryPolicy,
    platform: Platform,
}

impl ArchiveRepository {
    pub fn new(entry: RepositoryEntry, context: &RepositoryContext) -> AppResult<Self> {
        if entry.auth.is_some() {
            warn!(repository = %entry.name, "archive 类型的仓库不支持认证，忽略 auth 配置");
        }
        let client = HttpClient::new(context.network.connect_timeout(), entry.tls.as_ref())?
            .with_idle_timeout(context.network.repository_timeout());
        Ok(Self {
            entry,
            client,
            retry: context.retry_policy(),
            platform: Platform::current(),
        })
    }

    pub fn listing_url(&self) -> String {
        format!("{}/", self.entry.url.trim_end_matches('/'))
    }

    pub fn distribution_url(&self, version: &str) -> String {
        join_url(
            &self.entry.url,
            &format!(
                "{version}/binaries/{}",
                self.platform.distribution_file_name(version)
            ),
        )
    }
}

#[async_trait]
impl Repository for ArchiveRepository {
    fn name(&self) -> &str {
        &self.entry.name
    }

    fn priority(&self) -> i32 {
        self.entry.priority
    }

    fn is_enabled(&self) -> bool {
        self.entry.enabled
    }

    fn kind(&self) -> RepositoryType {
        RepositoryType::Archive
    }

    fn url(&self) -> &str {
        &self.entry.url
    }

    async fn discover_versions(&self, cancel: &CancellationToken) -> AppResult<Vec<String>> {
        let url = self.listing_url();
        let html = download::with_retry(self.retry, cancel, &url, || {
            self.client.get_text(&url, None)
        })
        .await
        .map_err(|e| e.into_app_error(&self.entry.name))?;

        let versions = parse_listing_versions(&html);
        debug!(repository = %self.entry.name, count = versions.len(), "解析目录列表");
        Ok(versions)
    }

    async fn download_distribution(
        &self,
        version: &str,
        dest_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> AppResult<PathBuf> {
        let url = self.distribution_url(version);
        let target = dest_dir.join(self.platform.distribution_file_name(version));

        info!(repository = %self.entry.name, version, url = %url, "📥 开始下载");
        download::with_retry(self.retry, cancel, &url, || {
            download::download_to_file(&self.client, &url, None, &target, progress.as_ref(), cancel)
        })
        .await
        .map_err(|e| e.into_app_error(&self.entry.name))?;

        Ok(target)
    }

    async fn verify_checksum(
        &self,
        path: &Path,
        version: &str,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        let url = format!("{}.sha512", self.distribution_url(version));

        let content = match download::with_retry(self.retry, cancel, &url, || {
            self.client.get_text(&url, None)
        })
        .await
        {
            Ok(content) => content,
            Err(NetworkError::NotFound(_)) => {
                warn!(repository = %self.entry.name, version, "归档站点未提供 SHA-512 校验文件，跳过校验");
                return Ok(false);
            }
            Err(e) => return Err(e.into_app_error(&self.entry.name)),
        };

        let expected = parse_checksum(&content, 128).ok_or_else(|| {
            AppError::download_failed(&self.entry.name, format!("无法解析校验文件 {url}"))
        })?;
        let actual = file_digest::<Sha512>(path).await?;

        if actual != expected {
            return Err(AppError::ChecksumMismatch {
                repository: self.entry.name.clone(),
                version: version.to_string(),
                expected,
                actual,
            });
        }
        debug!(repository = %self.entry.name, version, "✅ SHA-512 校验通过");
        Ok(true)
    }
}
