use crate::core::resolver::ResolvedVersion;
use crate::error::AppResult;
use crate::infrastructure::remote::{ProgressCallback, VersionInfo};
use crate::infrastructure::repository_config::{AuthConfig, RepositoryEntry};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::fmt::Write as _;
use std::sync::Arc;

/// 输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// 下载进度条
pub fn create_progress_bar() -> ProgressBar {
    let pb = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::default_bar().template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {bytes}/{total_bytes} ({eta}) {percent}%",
    ) {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb
}

/// 把进度条适配为下载回调；回退到下一个仓库时会重新设置总长度
pub fn progress_callback(pb: ProgressBar) -> ProgressCallback {
    Arc::new(move |downloaded, total| {
        if total > 0 && pb.length() != Some(total) {
            pb.set_length(total);
        }
        pb.set_position(downloaded);
    })
}

/// 已安装版本列表，当前版本前标记 `*`
pub fn format_installed(
    versions: &[String],
    current: Option<&ResolvedVersion>,
    format: OutputFormat,
) -> AppResult<String> {
    match format {
        OutputFormat::Text => {
            if versions.is_empty() {
                return Ok("尚未安装任何 Maven 版本，使用 mvnenv install <version> 安装\n".to_string());
            }
            let mut output = String::new();
            for version in versions {
                match current {
                    Some(c) if &c.version == version => {
                        let _ = writeln!(output, "* {version} ({})", c.source);
                    }
                    _ => {
                        let _ = writeln!(output, "  {version}");
                    }
                }
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&json!({
            "installed": versions,
            "current": current,
        }))?),
    }
}

/// 可用版本列表
pub fn format_remote(
    versions: &[VersionInfo],
    installed: &[String],
    format: OutputFormat,
) -> AppResult<String> {
    match format {
        OutputFormat::Text => {
            if versions.is_empty() {
                return Ok("没有发现可用版本\n".to_string());
            }
            let mut output = String::new();
            for info in versions {
                let mark = if installed.contains(&info.version) { "✓" } else { " " };
                let _ = writeln!(
                    output,
                    "{mark} {:<16} {}",
                    info.version, info.source_repository
                );
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(serde_json::to_string_pretty(versions)?),
    }
}

pub fn format_current(resolved: &ResolvedVersion, format: OutputFormat) -> AppResult<String> {
    match format {
        OutputFormat::Text => Ok(format!(
            "{} (来源: {}, 路径: {})\n",
            resolved.version,
            resolved.source,
            resolved.path.display()
        )),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(resolved)?),
    }
}

fn auth_label(auth: Option<&AuthConfig>) -> &'static str {
    match auth {
        Some(AuthConfig::Basic { .. }) => "basic",
        Some(AuthConfig::Bearer { .. }) => "bearer",
        None => "none",
    }
}

/// 仓库列表；认证只显示类型
pub fn format_repositories(entries: &[RepositoryEntry], format: OutputFormat) -> AppResult<String> {
    let mut sorted: Vec<&RepositoryEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

    match format {
        OutputFormat::Text => {
            let mut output = String::new();
            for entry in sorted {
                let _ = writeln!(
                    output,
                    "{} {:<20} {:<8} {:>5}  {}  auth={}",
                    if entry.enabled { "●" } else { "○" },
                    entry.name,
                    entry.repo_type.to_string(),
                    entry.priority,
                    entry.url,
                    auth_label(entry.auth.as_ref())
                );
            }
            Ok(output)
        }
        OutputFormat::Json => {
            let items: Vec<_> = sorted
                .into_iter()
                .map(|entry| {
                    json!({
                        "name": entry.name,
                        "type": entry.repo_type,
                        "url": entry.url,
                        "priority": entry.priority,
                        "enabled": entry.enabled,
                        "auth": auth_label(entry.auth.as_ref()),
                    })
                })
                .collect();
            Ok(serde_json::to_string_pretty(&items)?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VersionSource;
    use crate::infrastructure::repository_config::RepositoryType;
    use std::path::PathBuf;

    #[test]
    fn test_installed_marks_current() {
        let current = ResolvedVersion {
            version: "3.9.6".to_string(),
            source: VersionSource::Local,
            path: PathBuf::from("/r/versions/3.9.6"),
        };
        let output = format_installed(
            &["3.9.6".to_string(), "3.8.8".to_string()],
            Some(&current),
            OutputFormat::Text,
        )
        .unwrap();
        assert_eq!(output, "* 3.9.6 (local)\n  3.8.8\n");
    }

    #[test]
    fn test_repositories_hide_secrets() {
        let mut entry = RepositoryEntry::new("corp", RepositoryType::Nexus, "https://n.example.com", 1);
        entry.auth = Some(AuthConfig::Basic {
            username: Some("ci".to_string()),
            password: Some("hunter2".to_string()),
        });
        for format in [OutputFormat::Text, OutputFormat::Json] {
            let output = format_repositories(std::slice::from_ref(&entry), format).unwrap();
            assert!(output.contains("basic"));
            assert!(!output.contains("hunter2"));
        }
    }

    #[test]
    fn test_progress_callback_updates_bar() {
        let pb = ProgressBar::hidden();
        let callback = progress_callback(pb.clone());
        callback(10, 100);
        assert_eq!(pb.length(), Some(100));
        assert_eq!(pb.position(), 10);
    }
}
