use super::download::{self, file_digest, parse_checksum, ProgressCallback, RetryPolicy};
use super::http_client::{HttpClient, NetworkError};
use super::platform::Platform;
use super::repository::{join_url, Repository, RepositoryContext};
use crate::core::constants::repository::MAVEN_ARTIFACT_PATH;
use crate::core::version::Version;
use crate::error::{AppError, AppResult};
use crate::infrastructure::credentials::{resolve_auth, CredentialStore, ResolvedAuth};
use crate::infrastructure::repository_config::{RepositoryEntry, RepositoryType};
use async_trait::async_trait;
use regex::Regex;
use sha2::{Sha256, Sha512};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

fn metadata_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"<version>\s*([^<\s]+)\s*</version>").unwrap())
}

/// 从 `maven-metadata.xml` 中提取版本号（去重，保留文档顺序）
pub fn parse_metadata_versions(xml: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    metadata_version_pattern()
        .captures_iter(xml)
        .map(|caps| caps[1].to_string())
        .filter(|v| Version::parse(v).is_ok())
        .filter(|v| seen.insert(v.clone()))
        .collect()
}

/// 仓库发布的校验文件，按优先顺序尝试
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChecksumKind {
    Sha256,
    Sha512,
}

impl ChecksumKind {
    const PREFERENCE: [ChecksumKind; 2] = [ChecksumKind::Sha256, ChecksumKind::Sha512];

    fn extension(self) -> &'static str {
        match self {
            ChecksumKind::Sha256 => "sha256",
            ChecksumKind::Sha512 => "sha512",
        }
    }

    fn hex_len(self) -> usize {
        match self {
            ChecksumKind::Sha256 => 64,
            ChecksumKind::Sha512 => 128,
        }
    }

    async fn digest(self, path: &Path) -> std::io::Result<String> {
        match self {
            ChecksumKind::Sha256 => file_digest::<Sha256>(path).await,
            ChecksumKind::Sha512 => file_digest::<Sha512>(path).await,
        }
    }
}

/// Maven 仓库布局（Nexus、Artifactory、Maven Central）
pub struct NexusRepository {
    entry: RepositoryEntry,
    client: HttpClient,
    credentials: Arc<dyn CredentialStore>,
    auth: OnceCell<Option<ResolvedAuth>>,
    retry: RetryPolicy,
    platform: Platform,
}

impl NexusRepository {
    pub fn new(entry: RepositoryEntry, context: &RepositoryContext) -> AppResult<Self> {
        let client = HttpClient::new(context.network.connect_timeout(), entry.tls.as_ref())?
            .with_idle_timeout(context.network.repository_timeout());
        Ok(Self {
            entry,
            client,
            credentials: context.credentials.clone(),
            auth: OnceCell::new(),
            retry: context.retry_policy(),
            platform: Platform::current(),
        })
    }

    pub fn metadata_url(&self) -> String {
        join_url(
            &self.entry.url,
            &format!("{MAVEN_ARTIFACT_PATH}/maven-metadata.xml"),
        )
    }

    pub fn distribution_url(&self, version: &str) -> String {
        join_url(
            &self.entry.url,
            &format!(
                "{MAVEN_ARTIFACT_PATH}/{version}/{}",
                self.platform.distribution_file_name(version)
            ),
        )
    }

    /// 认证信息只解析一次
    async fn auth(&self) -> Option<&ResolvedAuth> {
        self.auth
            .get_or_init(|| resolve_auth(self.credentials.as_ref(), &self.entry))
            .await
            .as_ref()
    }

    fn map_error(&self, error: NetworkError) -> AppError {
        error.into_app_error(&self.entry.name)
    }

    /// 取第一个存在的校验文件；都不存在时返回 None
    async fn fetch_checksum(
        &self,
        version: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Option<(ChecksumKind, String)>> {
        let auth = self.auth().await;
        for kind in ChecksumKind::PREFERENCE {
            let url = format!("{}.{}", self.distribution_url(version), kind.extension());
            match download::with_retry(self.retry, cancel, &url, || self.client.get_text(&url, auth))
                .await
            {
                Ok(content) => {
                    let expected = parse_checksum(&content, kind.hex_len()).ok_or_else(|| {
                        AppError::download_failed(&self.entry.name, format!("无法解析校验文件 {url}"))
                    })?;
                    return Ok(Some((kind, expected)));
                }
                Err(NetworkError::NotFound(_)) => {
                    debug!(repository = %self.entry.name, version, url = %url, "校验文件不存在");
                }
                Err(e) => return Err(self.map_error(e)),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl Repository for NexusRepository {
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
        RepositoryType::Nexus
    }

    fn url(&self) -> &str {
        &self.entry.url
    }

    async fn discover_versions(&self, cancel: &CancellationToken) -> AppResult<Vec<String>> {
        let url = self.metadata_url();
        let auth = self.auth().await;
        let xml = download::with_retry(self.retry, cancel, &url, || {
            self.client.get_text(&url, auth)
        })
        .await
        .map_err(|e| self.map_error(e))?;

        let versions = parse_metadata_versions(&xml);
        debug!(repository = %self.entry.name, count = versions.len(), "解析 maven-metadata.xml");
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
        let auth = self.auth().await;

        info!(repository = %self.entry.name, version, url = %url, "📥 开始下载");
        download::with_retry(self.retry, cancel, &url, || {
            download::download_to_file(&self.client, &url, auth, &target, progress.as_ref(), cancel)
        })
        .await
        .map_err(|e| self.map_error(e))?;

        Ok(target)
    }

    async fn verify_checksum(
        &self,
        path: &Path,
        version: &str,
        cancel: &CancellationToken,
    ) -> AppResult<bool> {
        let Some((kind, expected)) = self.fetch_checksum(version, cancel).await? else {
            warn!(repository = %self.entry.name, version, "仓库未提供校验文件，跳过校验");
            return Ok(false);
        };
        let actual = kind.digest(path).await?;

        if actual != expected {
            return Err(AppError::ChecksumMismatch {
                repository: self.entry.name.clone(),
                version: version.to_string(),
                expected,
                actual,
            });
        }
        debug!(repository = %self.entry.name, version, checksum = kind.extension(), "✅ 校验通过");
        Ok(true)
    }
}
