pub mod cleaner;
pub mod enricher;
pub mod pipeline;
pub mod response;
pub mod validator;

pub use enricher::{Enricher, Enrichment, ItemFailure};
pub use pipeline::{RunMetrics, StepOutcome, StepReport, TransformOutput, TransformPipeline};
pub use validator::{InvalidItem, ValidationOutcome};
