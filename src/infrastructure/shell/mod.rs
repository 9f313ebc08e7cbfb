pub mod platform;
pub mod registrar;

pub use platform::{detect_shell, export_command, unset_command, ShellType};
pub use registrar::{EnvironmentRegistrar, ProfileRegistrar, RegistrationOutcome};
