pub mod etl;
pub mod service;
pub mod transform;

pub use crate::domain::model::{GenerationOptions, PersistedRecord, Record, RecordStatus};
pub use crate::domain::ports::{Extractor, Loader, RecordStore, Storage, TextGenerator};
pub use crate::utils::error::Result;
