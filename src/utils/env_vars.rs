use regex::Regex;
use std::collections::HashMap;
use std::env;
use std::sync::{Arc, OnceLock};

/// 环境变量查询函数，便于在测试中注入
pub type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// 环境变量工具
pub struct EnvVarUtils;

impl EnvVarUtils {
    /// 读取真实进程环境
    pub fn process_lookup() -> EnvLookup {
        Arc::new(|name| env::var(name).ok())
    }

    /// 基于固定映射的查询（测试用）
    pub fn map_lookup(values: HashMap<String, String>) -> EnvLookup {
        Arc::new(move |name| values.get(name).cloned())
    }

    /// 展开字符串中的环境变量引用 (${VAR_NAME})，未定义的变量替换为空串
    pub fn expand_variables(input: &str, lookup: &EnvLookup) -> String {
        placeholder_pattern()
            .replace_all(input, |caps: &regex::Captures| {
                lookup(&caps[1]).unwrap_or_default()
            })
            .into_owned()
    }

    /// 是否包含 ${VAR} 引用
    pub fn has_placeholder(input: &str) -> bool {
        placeholder_pattern().is_match(input)
    }

    /// 读取非空的环境变量值
    pub fn non_empty(lookup: &EnvLookup, name: &str) -> Option<String> {
        lookup(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// 解释布尔型开关，空值、"0"、"false" 视为关闭
    pub fn is_truthy(value: Option<&str>) -> bool {
        match value.map(str::trim) {
            None | Some("") => false,
            Some(v) => !(v == "0" || v.eq_ignore_ascii_case("false")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup() -> EnvLookup {
        EnvVarUtils::map_lookup(HashMap::from([
            ("NEXUS_USER".to_string(), "deploy".to_string()),
            ("EMPTY".to_string(), "  ".to_string()),
        ]))
    }

    #[test]
    fn test_expand_variables() {
        let lookup = lookup();
        assert_eq!(
            EnvVarUtils::expand_variables("${NEXUS_USER}", &lookup),
            "deploy"
        );
        assert_eq!(
            EnvVarUtils::expand_variables("u=${NEXUS_USER};p=${MISSING}", &lookup),
            "u=deploy;p="
        );
        assert_eq!(EnvVarUtils::expand_variables("plain", &lookup), "plain");
    }

    #[test]
    fn test_non_empty_trims() {
        let lookup = lookup();
        assert_eq!(EnvVarUtils::non_empty(&lookup, "EMPTY"), None);
        assert_eq!(
            EnvVarUtils::non_empty(&lookup, "NEXUS_USER"),
            Some("deploy".to_string())
        );
    }

    #[test]
    fn test_is_truthy() {
        assert!(!EnvVarUtils::is_truthy(None));
        assert!(!EnvVarUtils::is_truthy(Some("")));
        assert!(!EnvVarUtils::is_truthy(Some("0")));
        assert!(!EnvVarUtils::is_truthy(Some("FALSE")));
        assert!(EnvVarUtils::is_truthy(Some("1")));
        assert!(EnvVarUtils::is_truthy(Some("yes")));
    }
}
