pub mod executor;
pub mod generator;

pub use executor::ShimExecutor;
pub use generator::ShimGenerator;
