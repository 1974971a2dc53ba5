pub mod app_config;
#[cfg(feature = "cli")]
pub mod cli;
pub mod transform;

pub use app_config::AppConfig;
#[cfg(feature = "cli")]
pub use cli::CliArgs;
pub use transform::{TransformStep, TransformationConfig};
