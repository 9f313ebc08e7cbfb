pub mod config;
pub mod credentials;
pub mod installer;
pub mod remote;
pub mod repository_config;
pub mod shell;

pub use config::{Config, ConfigStore};
pub use credentials::{CredentialStore, InMemoryCredentialStore, SecretToolStore};
pub use installer::Installer;
pub use remote::RepositoryManager;
pub use repository_config::{RepositoryConfigStore, RepositoryEntry, RepositoryType};
