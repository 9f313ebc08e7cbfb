pub mod extract;
#[allow(clippy::module_inception)]
pub mod installer;
pub mod lock;

pub use installer::{InstallOutcome, InstallState, Installer, UninstallOutcome};
pub use lock::InstallLock;
