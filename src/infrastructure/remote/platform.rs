use std::fmt;

/// 发行包的压缩格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveFormat {
    TarGz,
    Zip,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::TarGz => "tar.gz",
            ArchiveFormat::Zip => "zip",
        }
    }

    /// 根据文件名判断格式
    pub fn from_file_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".tar.gz") || lower.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else if lower.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else {
            None
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// 简单封装的平台信息，统一默认压缩格式的判定。
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Platform {
    pub os: String,
}

impl Platform {
    /// 检测当前运行平台。
    pub fn current() -> Self {
        let os = if cfg!(target_os = "windows") {
            "windows"
        } else if cfg!(target_os = "macos") {
            "macos"
        } else if cfg!(target_os = "linux") {
            "linux"
        } else {
            "unknown"
        };

        Platform { os: os.to_string() }
    }

    /// 针对当前平台返回默认压缩格式。
    pub fn archive_format(&self) -> ArchiveFormat {
        match self.os.as_str() {
            "windows" => ArchiveFormat::Zip,
            _ => ArchiveFormat::TarGz,
        }
    }

    /// Maven 二进制发行包文件名
    pub fn distribution_file_name(&self, version: &str) -> String {
        format!("apache-maven-{version}-bin.{}", self.archive_format())
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.os)
    }
}
