use crate::core::constants::{cache, env, layout};
use crate::error::{AppError, AppResult};
use crate::utils::env_vars::{EnvLookup, EnvVarUtils};
use crate::utils::filesystem::FileSystemUtils;
use std::path::{Path, PathBuf};

/// mvnenv 状态根目录下的固定布局
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MvnenvPaths {
    root: PathBuf,
}

impl MvnenvPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 从环境推导根目录：`$MVNENV_ROOT`，否则 `~/.mvnenv`
    pub fn from_env(lookup: &EnvLookup) -> AppResult<Self> {
        if let Some(root) = EnvVarUtils::non_empty(lookup, env::ROOT) {
            return Ok(Self::new(root));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| AppError::invalid_config("无法确定用户主目录，请设置 MVNENV_ROOT"))?;
        Ok(Self::new(home.join(layout::ROOT_DIR_NAME)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join(layout::VERSIONS_DIR)
    }

    pub fn version_dir(&self, version: &str) -> PathBuf {
        self.versions_dir().join(version)
    }

    /// 已安装版本判定依据：`versions/<v>/bin/mvn`
    pub fn primary_executable(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(layout::PRIMARY_EXECUTABLE)
    }

    /// 版本是否已安装：目录中存在主可执行文件
    ///
    /// 版本号中含有路径分隔符或以点开头时一律视为未安装，避免越出 versions 目录。
    pub fn is_installed(&self, version: &str) -> bool {
        if version.is_empty()
            || version.starts_with('.')
            || version.contains(['/', '\\'])
        {
            return false;
        }
        FileSystemUtils::is_regular_file(&self.primary_executable(version))
    }

    pub fn bin_dir(&self, version: &str) -> PathBuf {
        self.version_dir(version).join(layout::BIN_DIR)
    }

    pub fn shims_dir(&self) -> PathBuf {
        self.root.join(layout::SHIMS_DIR)
    }

    pub fn cache_file(&self) -> PathBuf {
        self.root.join(layout::CACHE_DIR).join(cache::METADATA_FILE)
    }

    pub fn lock_file(&self, version: &str) -> PathBuf {
        self.root
            .join(layout::LOCKS_DIR)
            .join(format!("{version}.lock"))
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(layout::CONFIG_FILE)
    }

    pub fn repositories_file(&self) -> PathBuf {
        self.root.join(layout::REPOSITORIES_FILE)
    }

    pub fn env_script(&self) -> PathBuf {
        self.root.join(layout::ENV_SCRIPT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_is_installed_requires_primary_executable() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = MvnenvPaths::new(dir.path());
        assert!(!paths.is_installed("3.9.6"));

        std::fs::create_dir_all(paths.bin_dir("3.9.6")).unwrap();
        assert!(!paths.is_installed("3.9.6"));

        std::fs::write(paths.primary_executable("3.9.6"), "#!/bin/sh\n").unwrap();
        assert!(paths.is_installed("3.9.6"));
        assert!(!paths.is_installed("../versions/3.9.6"));
        assert!(!paths.is_installed(".staging"));
    }

    #[test]
    fn test_root_from_env_override() {
        let lookup = EnvVarUtils::map_lookup(HashMap::from([(
            "MVNENV_ROOT".to_string(),
            "/opt/mvnenv".to_string(),
        )]));
        let paths = MvnenvPaths::from_env(&lookup).unwrap();
        assert_eq!(paths.root(), Path::new("/opt/mvnenv"));
        assert_eq!(
            paths.primary_executable("3.9.6"),
            PathBuf::from("/opt/mvnenv/versions/3.9.6/bin/mvn")
        );
        assert_eq!(
            paths.lock_file("3.9.6"),
            PathBuf::from("/opt/mvnenv/locks/3.9.6.lock")
        );
        assert_eq!(
            paths.cache_file(),
            PathBuf::from("/opt/mvnenv/cache/metadata.json")
        );
    }
}
