pub mod constants;
pub mod resolver;
pub mod version;

pub use resolver::{find_marker, write_marker, ResolvedVersion, VersionRequest, VersionResolver};
pub use version::{Version, VersionComparer};
