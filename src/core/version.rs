//! Maven 版本号解析与排序
//!
//! 版本格式为 `X[.Y[.Z]][-qualifier]`。排序先比较 (major, minor, patch)，
//! 再比较限定符；没有限定符的正式版排在任何带限定符的预发布版之后（更大）。

use crate::error::{AppError, AppResult};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// 已解析的版本号，解析后不可变
#[derive(Debug, Clone)]
pub struct Version {
    major: u64,
    minor: u64,
    patch: u64,
    qualifier: Option<String>,
    original: String,
}

impl Version {
    /// 解析版本字符串
    pub fn parse(input: &str) -> AppResult<Self> {
        if input.is_empty() {
            return Err(AppError::invalid_version(input, "版本号不能为空"));
        }

        let (numeric, qualifier) = match input.split_once('-') {
            Some((numeric, qualifier)) => (numeric, Some(qualifier)),
            None => (input, None),
        };

        let segments: Vec<&str> = numeric.split('.').collect();
        if segments.len() > 3 {
            return Err(AppError::invalid_version(
                input,
                format!("数字段最多 3 个，实际 {}", segments.len()),
            ));
        }

        let mut parts = [0u64; 3];
        for (i, segment) in segments.iter().enumerate() {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AppError::invalid_version(
                    input,
                    format!("数字段 '{segment}' 不是数字"),
                ));
            }
            parts[i] = segment
                .parse()
                .map_err(|_| AppError::invalid_version(input, format!("数字段 '{segment}' 溢出")))?;
        }

        if let Some(q) = qualifier {
            if q.is_empty() {
                return Err(AppError::invalid_version(input, "限定符不能为空"));
            }
            if !q
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
            {
                return Err(AppError::invalid_version(
                    input,
                    format!("限定符 '{q}' 含有非法字符"),
                ));
            }
        }

        Ok(Self {
            major: parts[0],
            minor: parts[1],
            patch: parts[2],
            qualifier: qualifier.map(str::to_string),
            original: input.to_string(),
        })
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    /// 解析前的原始字符串
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// 是否为预发布版本
    pub fn is_prerelease(&self) -> bool {
        self.qualifier.is_some()
    }

    fn key(&self) -> (u64, u64, u64) {
        (self.major, self.minor, self.patch)
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key()
            .cmp(&other.key())
            .then_with(|| match (&self.qualifier, &other.qualifier) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `original` 不参与相等性，"3.9" 与 "3.9.0" 相等
impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
        self.qualifier.hash(state);
    }
}

impl FromStr for Version {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Version::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

/// 版本比较器
pub struct VersionComparer;

impl VersionComparer {
    /// 比较两个版本字符串
    pub fn compare(a: &str, b: &str) -> AppResult<Ordering> {
        Ok(Version::parse(a)?.cmp(&Version::parse(b)?))
    }

    /// 降序排序；相等的版本保持输入顺序
    pub fn sort_descending(versions: &mut [Version]) {
        versions.sort_by(|a, b| b.cmp(a));
    }

    /// 对字符串列表降序排序，无法解析的版本号被丢弃
    pub fn sort_strings_descending<I, S>(versions: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed: Vec<Version> = versions
            .into_iter()
            .filter_map(|v| Version::parse(v.as_ref()).ok())
            .collect();
        Self::sort_descending(&mut parsed);
        parsed.into_iter().map(|v| v.original).collect()
    }
}


#[cfg(test)]
mod proptest_tests {
    use super::*;
    use proptest::prelude::*;

    fn version_string() -> impl Strategy<Value = String> {
        (
            0u64..20,
            prop::option::of(0u64..20),
            prop::option::of(0u64..20),
            prop::option::of("[a-z]{1,5}(-[0-9]{1,2})?"),
        )
            .prop_map(|(major, minor, patch, qualifier)| {
                let mut s = major.to_string();
                if let Some(minor) = minor {
                    s.push_str(&format!(".{minor}"));
                    if let Some(patch) = patch {
                        s.push_str(&format!(".{patch}"));
                    }
                }
                if let Some(q) = qualifier {
                    s.push('-');
                    s.push_str(&q);
                }
                s
            })
    }

    proptest! {
        /// 比较是反对称的
        #[test]
        fn compare_is_antisymmetric(a in version_string(), b in version_string()) {
            let ab = VersionComparer::compare(&a, &b).unwrap();
            let ba = VersionComparer::compare(&b, &a).unwrap();
            prop_assert_eq!(ab, ba.reverse());
        }

        /// 原始字符串可以无损往返
        #[test]
        fn original_round_trips(a in version_string()) {
            let v = Version::parse(&a).unwrap();
            prop_assert_eq!(v.to_string(), a);
        }

        /// 排序是幂等的
        #[test]
        fn sort_is_idempotent(list in prop::collection::vec(version_string(), 0..12)) {
            let mut once: Vec<Version> = list.iter().map(|v| Version::parse(v).unwrap()).collect();
            VersionComparer::sort_descending(&mut once);
            let mut twice = once.clone();
            VersionComparer::sort_descending(&mut twice);
            let once: Vec<&str> = once.iter().map(|v| v.as_str()).collect();
            let twice: Vec<&str> = twice.iter().map(|v| v.as_str()).collect();
            prop_assert_eq!(once, twice);
        }
    }
}
