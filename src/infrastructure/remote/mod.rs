pub mod archive;
pub mod cache;
pub mod download;
pub mod http_client;
pub mod nexus;
pub mod platform;
pub mod repository;
pub mod repository_manager;

#[cfg(test)]
pub(crate) mod testing;

pub use archive::ArchiveRepository;
pub use cache::{CachedMetadata, MetadataCache, RepositorySnapshot, VersionInfo};
pub use download::{ProgressCallback, RetryPolicy};
pub use http_client::{HttpClient, NetworkError};
pub use nexus::NexusRepository;
pub use platform::{ArchiveFormat, Platform};
pub use repository::{build_repository, Repository, RepositoryContext};
pub use repository_manager::{DownloadedDistribution, RepositoryManager};
