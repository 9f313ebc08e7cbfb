use crate::core::constants::shim;
use crate::error::AppResult;
use crate::utils::{FileSystemUtils, MvnenvPaths};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// 为每个被拦截的命令生成一个代理可执行文件
///
/// 代理文件就是 mvnenv 自身可执行文件的副本，运行时按文件名分派。
#[derive(Debug, Clone)]
pub struct ShimGenerator {
    paths: MvnenvPaths,
    source: PathBuf,
}

impl ShimGenerator {
    pub fn new(paths: MvnenvPaths, source: impl Into<PathBuf>) -> Self {
        Self {
            paths,
            source: source.into(),
        }
    }

    /// 以当前进程的可执行文件作为代理源
    pub fn for_current_exe(paths: MvnenvPaths) -> AppResult<Self> {
        Ok(Self::new(paths, std::env::current_exe()?))
    }

    /// 需要代理的命令：核心命令集 + 各已安装版本 `bin/` 中的可执行文件
    pub fn commands(&self) -> AppResult<BTreeSet<String>> {
        let mut commands: BTreeSet<String> =
            shim::CORE_COMMANDS.iter().map(|c| c.to_string()).collect();

        for version in installed_version_dirs(&self.paths)? {
            let bin_dir = self.paths.bin_dir(&version);
            let entries = match fs::read_dir(&bin_dir) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(version, error = %e, "读取 bin 目录失败，跳过");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if let Some(name) = command_name(&path) {
                    commands.insert(name);
                }
            }
        }
        Ok(commands)
    }

    /// 重新生成全部代理文件，并删除不再对应任何命令的旧文件
    pub fn rehash(&self) -> AppResult<Vec<String>> {
        let commands = self.commands()?;
        let shims_dir = self.paths.shims_dir();
        FileSystemUtils::create_dir_all(&shims_dir)?;

        for command in &commands {
            FileSystemUtils::atomic_copy(
                &self.source,
                &shims_dir.join(command),
                Some(shim::EXECUTABLE_MODE),
            )?;
        }

        for entry in fs::read_dir(&shims_dir)?.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') || commands.contains(&name) {
                continue;
            }
            debug!(shim = %name, "删除过期代理");
            FileSystemUtils::remove_file(&entry.path())?;
        }

        info!(count = commands.len(), dir = %shims_dir.display(), "🔗 代理已重新生成");
        Ok(commands.into_iter().collect())
    }
}

/// versions 目录下所有满足安装判定的版本名
pub(crate) fn installed_version_dirs(paths: &MvnenvPaths) -> AppResult<Vec<String>> {
    let entries = match fs::read_dir(paths.versions_dir()) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(entries
        .flatten()
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| paths.is_installed(name))
        .collect())
}

/// 可以作为代理命令的文件名：可执行的普通文件
fn command_name(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if name.starts_with('.') || !FileSystemUtils::is_regular_file(path) {
        return None;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path).ok()?.permissions().mode();
        if mode & 0o111 == 0 {
            return None;
        }
    }
    #[cfg(windows)]
    {
        let lower = name.to_ascii_lowercase();
        if !(lower.ends_with(".cmd") || lower.ends_with(".bat") || lower.ends_with(".exe")) {
            return None;
        }
    }
    Some(name.to_string())
}
