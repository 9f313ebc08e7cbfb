use crate::core::constants::layout;
use crate::infrastructure::remote::ArchiveFormat;
use crate::utils::FileSystemUtils;
use flate2::read::GzDecoder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// 解压发行包到 `dest_dir`（阻塞操作）
pub fn extract_archive(archive: &Path, dest_dir: &Path, format: ArchiveFormat) -> io::Result<()> {
    fs::create_dir_all(dest_dir)?;
    match format {
        ArchiveFormat::TarGz => extract_tar_gz(archive, dest_dir),
        ArchiveFormat::Zip => extract_zip(archive, dest_dir),
    }
}

pub fn extract_tar_gz(tar_path: &Path, dest_dir: &Path) -> io::Result<()> {
    let file = fs::File::open(tar_path)?;
    let mut archive = tar::Archive::new(GzDecoder::new(file));
    archive.set_preserve_permissions(true);
    archive.set_overwrite(true);
    // unpack 会拒绝包含 `..` 或绝对路径的条目
    archive.unpack(dest_dir)
}

pub fn extract_zip(zip_path: &Path, dest_dir: &Path) -> io::Result<()> {
    let file = fs::File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(io::Error::other)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(io::Error::other)?;
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("ZIP 条目路径不安全: {}", entry.name()),
            ));
        };
        let outpath = dest_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&outpath)?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut outfile = fs::File::create(&outpath)?;
        io::copy(&mut entry, &mut outfile)?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&outpath, fs::Permissions::from_mode(mode))?;
        }
    }
    Ok(())
}

/// 在解压目录中定位发行包根目录（含 `bin/mvn` 的目录）
///
/// 发行包通常带有一层 `apache-maven-<v>/` 顶层目录，也兼容直接平铺的情况。
pub fn locate_distribution_root(extract_dir: &Path) -> Option<PathBuf> {
    WalkDir::new(extract_dir)
        .min_depth(0)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .find(|dir| FileSystemUtils::is_regular_file(&dir.join(layout::PRIMARY_EXECUTABLE)))
}
