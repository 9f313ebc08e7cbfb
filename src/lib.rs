// 核心模块
pub mod cli;
pub mod core;
pub mod error;
pub mod infrastructure;
pub mod shim;
pub mod utils;

pub use error::{AppError, AppResult, VersionSource};

pub use crate::core::resolver::{ResolvedVersion, VersionResolver};
pub use crate::core::version::{Version, VersionComparer};
pub use infrastructure::installer::Installer;
pub use infrastructure::remote::{MetadataCache, Repository, RepositoryManager};
pub use shim::{ShimExecutor, ShimGenerator};
