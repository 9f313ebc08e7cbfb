pub mod env_vars;
pub mod filesystem;
pub mod logging;
pub mod paths;
pub mod validation;

pub use env_vars::*;
pub use filesystem::*;
pub use paths::*;
pub use validation::*;
