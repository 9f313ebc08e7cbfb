use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn repository_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").unwrap())
}

/// 验证工具
pub struct ValidationUtils;

impl ValidationUtils {
    /// 验证仓库名称：只允许可安全用于路径和凭据键的字符
    pub fn validate_repository_name(name: &str) -> AppResult<()> {
        if name.is_empty() {
            return Err(AppError::invalid_config("仓库名称不能为空"));
        }
        if name.len() > 64 {
            return Err(AppError::invalid_config("仓库名称过长（最多 64 个字符）"));
        }
        if name == "." || name == ".." || !repository_name_pattern().is_match(name) {
            return Err(AppError::invalid_config(format!(
                "仓库名称 '{name}' 只能包含字母、数字、'.'、'_' 和 '-'"
            )));
        }
        Ok(())
    }

    /// 验证仓库 URL：必须是 http 或 https
    pub fn validate_repository_url(raw: &str) -> AppResult<url::Url> {
        let parsed = url::Url::parse(raw)
            .map_err(|e| AppError::invalid_config(format!("无效的仓库 URL '{raw}': {e}")))?;
        match parsed.scheme() {
            "http" | "https" => {}
            other => {
                return Err(AppError::invalid_config(format!(
                    "不支持的 URL 协议 '{other}'，仅支持 http/https"
                )))
            }
        }
        if parsed.host_str().is_none() {
            return Err(AppError::invalid_config(format!("仓库 URL '{raw}' 缺少主机名")));
        }
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_name() {
        assert!(ValidationUtils::validate_repository_name("corp-nexus_1.0").is_ok());
        assert!(ValidationUtils::validate_repository_name("").is_err());
        assert!(ValidationUtils::validate_repository_name("..").is_err());
        assert!(ValidationUtils::validate_repository_name("a/b").is_err());
        assert!(ValidationUtils::validate_repository_name("with space").is_err());
    }

    #[test]
    fn test_repository_url() {
        assert!(ValidationUtils::validate_repository_url("https://repo.example.com/maven2").is_ok());
        assert!(ValidationUtils::validate_repository_url("http://localhost:8081").is_ok());
        assert!(ValidationUtils::validate_repository_url("ftp://example.com").is_err());
        assert!(ValidationUtils::validate_repository_url("file:///tmp/repo").is_err());
        assert!(ValidationUtils::validate_repository_url("not a url").is_err());
    }
}
