//! 测试用的仓库实现与发行包构造工具

use super::download::ProgressCallback;
use super::platform::Platform;
use super::repository::Repository;
use crate::error::{AppError, AppResult};
use crate::infrastructure::repository_config::RepositoryType;
use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 构造一个最小的 Maven 发行包（tar.gz），顶层目录为 `apache-maven-<v>/`
pub fn maven_tarball(version: &str, extra_bins: &[&str]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    let top = format!("apache-maven-{version}");

    let mut append = |path: String, content: &[u8], mode: u32| {
        let mut header = tar::Header::new_gnu();
        header.set_size(content.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append_data(&mut header, path, content).unwrap();
    };

    append(format!("{top}/bin/mvn"), b"#!/bin/sh\necho mvn\n", 0o755);
    append(format!("{top}/bin/mvnDebug"), b"#!/bin/sh\necho debug\n", 0o755);
    append(format!("{top}/bin/m2.conf"), b"main is org.apache.maven.cli.MavenCli\n", 0o644);
    for bin in extra_bins {
        append(format!("{top}/bin/{bin}"), b"#!/bin/sh\n", 0o755);
    }
    append(format!("{top}/conf/settings.xml"), b"<settings/>\n", 0o644);
    append(format!("{top}/README.txt"), b"Apache Maven\n", 0o644);
    drop(append);

    builder.into_inner().unwrap().finish().unwrap()
}

/// 一个 tar.gz，但其中没有 `bin/mvn`
pub fn broken_tarball() -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    let content = b"not maven";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "something-else/README", &content[..])
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ArchiveContent {
    /// 按版本号现场生成合法的发行包
    Generated,
    Fixed(Vec<u8>),
    /// 下载失败
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiscoverBehavior {
    Succeed,
    Fail,
    Hang,
}

/// 可编排行为的仓库
pub struct FakeRepository {
    name: String,
    priority: i32,
    enabled: bool,
    versions: Vec<String>,
    discover: DiscoverBehavior,
    archive: ArchiveContent,
    checksum_ok: bool,
    discover_calls: AtomicUsize,
    download_calls: AtomicUsize,
}

impl FakeRepository {
    pub fn new(name: &str, priority: i32) -> Self {
        Self {
            name: name.to_string(),
            priority,
            enabled: true,
            versions: Vec::new(),
            discover: DiscoverBehavior::Succeed,
            archive: ArchiveContent::Unavailable,
            checksum_ok: true,
            discover_calls: AtomicUsize::new(0),
            download_calls: AtomicUsize::new(0),
        }
    }

    /// 提供这些版本；下载内容默认是合法的发行包
    pub fn with_versions(mut self, versions: &[&str]) -> Self {
        self.versions = versions.iter().map(|v| v.to_string()).collect();
        self.archive = ArchiveContent::Generated;
        self
    }

    /// 固定下载内容
    pub fn with_archive(mut self, archive: Vec<u8>) -> Self {
        self.archive = ArchiveContent::Fixed(archive);
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn failing_discovery(mut self) -> Self {
        self.discover = DiscoverBehavior::Fail;
        self
    }

    pub fn hanging_discovery(mut self) -> Self {
        self.discover = DiscoverBehavior::Hang;
        self
    }

    pub fn failing_download(mut self) -> Self {
        self.archive = ArchiveContent::Unavailable;
        self
    }

    pub fn bad_checksum(mut self) -> Self {
        self.checksum_ok = false;
        self
    }

    pub fn discover_calls(&self) -> usize {
        self.discover_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Repository for FakeRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn kind(&self) -> RepositoryType {
        RepositoryType::Nexus
    }

    fn url(&self) -> &str {
        "https://fake.invalid/maven2"
    }

    async fn discover_versions(&self, cancel: &CancellationToken) -> AppResult<Vec<String>> {
        self.discover_calls.fetch_add(1, Ordering::SeqCst);
        match self.discover {
            DiscoverBehavior::Succeed => Ok(self.versions.clone()),
            DiscoverBehavior::Fail => Err(AppError::download_failed(&self.name, "connection refused")),
            DiscoverBehavior::Hang => {
                tokio::select! {
                    _ = cancel.cancelled() => Err(AppError::cancelled("discover")),
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => Ok(self.versions.clone()),
                }
            }
        }
    }

    async fn download_distribution(
        &self,
        version: &str,
        dest_dir: &Path,
        progress: Option<ProgressCallback>,
        cancel: &CancellationToken,
    ) -> AppResult<PathBuf> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        if cancel.is_cancelled() {
            return Err(AppError::cancelled("download"));
        }
        if !self.versions.iter().any(|v| v == version) {
            return Err(AppError::NotFound {
                resource: format!("{}/{version}", self.name),
            });
        }
        let archive = match &self.archive {
            ArchiveContent::Generated => maven_tarball(version, &[]),
            ArchiveContent::Fixed(archive) => archive.clone(),
            ArchiveContent::Unavailable => return Err(AppError::download_failed(&self.name, "HTTP 502")),
        };

        let target = dest_dir.join(Platform::current().distribution_file_name(version));
        tokio::fs::write(&target, &archive).await?;
        if let Some(callback) = progress {
            callback(archive.len() as u64, archive.len() as u64);
        }
        Ok(target)
    }

    async fn verify_checksum(
        &self,
        _path: &Path,
        version: &str,
        _cancel: &CancellationToken,
    ) -> AppResult<bool> {
        if self.checksum_ok {
            Ok(true)
        } else {
            Err(AppError::ChecksumMismatch {
                repository: self.name.clone(),
                version: version.to_string(),
                expected: "00".to_string(),
                actual: "ff".to_string(),
            })
        }
    }
}
