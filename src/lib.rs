pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

pub use app::EtlApp;
pub use config::{AppConfig, TransformStep, TransformationConfig};
pub use core::etl::{EtlEngine, EtlRunSummary};
pub use core::service::{PipelineRequest, PipelineResponse, TransformService};
pub use core::transform::{Enricher, TransformOutput, TransformPipeline};
pub use utils::error::{EtlError, GenerationError, Result};
