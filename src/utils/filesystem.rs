use fs4::fs_std::FileExt;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// 文件系统工具
pub struct FileSystemUtils;

impl FileSystemUtils {
    /// 安全地创建目录
    pub fn create_dir_all(path: &Path) -> Result<(), io::Error> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    /// 安全地删除文件，文件不存在不视为错误
    pub fn remove_file(path: &Path) -> Result<(), io::Error> {
        match fs::remove_file(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// 安全地删除目录及其内容，目录不存在不视为错误
    pub fn remove_dir_all(path: &Path) -> Result<(), io::Error> {
        match fs::remove_dir_all(path) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// 读取文件内容，如果文件不存在则返回 None
    pub fn read_to_string_optional(path: &Path) -> Result<Option<String>, io::Error> {
        match fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// 同目录临时文件路径，以点开头避免被当作正式条目
    pub fn sibling_temp_path(path: &Path) -> Result<PathBuf, io::Error> {
        let parent = path
            .parent()
            .ok_or_else(|| io::Error::other(format!("{} 没有父目录", path.display())))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(parent.join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4())))
    }

    /// 原子写入：先写同目录临时文件（持有独占锁），再 rename 覆盖目标
    pub fn atomic_write(path: &Path, content: &[u8]) -> Result<(), io::Error> {
        Self::atomic_write_with_mode(path, content, None)
    }

    /// 原子写入并设置 Unix 权限位
    pub fn atomic_write_with_mode(
        path: &Path,
        content: &[u8],
        mode: Option<u32>,
    ) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            Self::create_dir_all(parent)?;
        }
        let tmp_path = Self::sibling_temp_path(path)?;

        let result = (|| {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&tmp_path)?;
            file.lock_exclusive()?;
            file.write_all(content)?;
            file.sync_all()?;
            drop(file);

            #[cfg(unix)]
            if let Some(mode) = mode {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode))?;
            }
            #[cfg(not(unix))]
            let _ = mode;

            fs::rename(&tmp_path, path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    /// 原子复制：复制到同目录临时文件后 rename
    pub fn atomic_copy(src: &Path, dst: &Path, mode: Option<u32>) -> Result<(), io::Error> {
        if let Some(parent) = dst.parent() {
            Self::create_dir_all(parent)?;
        }
        let tmp_path = Self::sibling_temp_path(dst)?;

        let result = (|| {
            fs::copy(src, &tmp_path)?;
            #[cfg(unix)]
            if let Some(mode) = mode {
                use std::os::unix::fs::PermissionsExt;
                fs::set_permissions(&tmp_path, fs::Permissions::from_mode(mode))?;
            }
            #[cfg(not(unix))]
            let _ = mode;
            fs::rename(&tmp_path, dst)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp_path);
        }
        result
    }

    /// 追加内容到文件
    pub fn append_to_string(path: &Path, content: &str) -> Result<(), io::Error> {
        if let Some(parent) = path.parent() {
            Self::create_dir_all(parent)?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?
            .write_all(content.as_bytes())
    }

    /// 是否为常规文件（跟随符号链接）
    pub fn is_regular_file(path: &Path) -> bool {
        fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested").join("config.toml");

        FileSystemUtils::atomic_write(&target, b"first").unwrap();
        FileSystemUtils::atomic_write(&target, b"second").unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(target.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_atomic_copy_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let src = dir.path().join("src");
        let dst = dir.path().join("dst");
        fs::write(&src, b"#!/bin/sh\n").unwrap();

        FileSystemUtils::atomic_copy(&src, &dst, Some(0o755)).unwrap();

        let mode = fs::metadata(&dst).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_remove_missing_is_ok() {
        let dir = TempDir::new().unwrap();
        assert!(FileSystemUtils::remove_file(&dir.path().join("absent")).is_ok());
        assert!(FileSystemUtils::remove_dir_all(&dir.path().join("absent")).is_ok());
    }

    #[test]
    fn test_read_optional() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x");
        assert!(FileSystemUtils::read_to_string_optional(&path)
            .unwrap()
            .is_none());
        fs::write(&path, "v").unwrap();
        assert_eq!(
            FileSystemUtils::read_to_string_optional(&path).unwrap(),
            Some("v".to_string())
        );
    }
}
