use crate::adapters::extract::{ApiExtractor, FileExtractor, RecordExtractor};
use crate::adapters::llm::build_generator;
use crate::adapters::load::{FileLoader, MultiLoader, RecordLoader};
use crate::adapters::store::{JsonFileRecordStore, LocalStorage};
use crate::config::app_config::{AppConfig, LoadConfig, SourceConfig};
use crate::core::etl::{EtlEngine, EtlRunSummary};
use crate::core::transform::{Enricher, TransformOutput, TransformPipeline};
use crate::core::{Extractor, GenerationOptions, Loader, RecordStore};
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::sync::Arc;
use std::time::Duration;

/// 由 AppConfig 組裝出的完整 ETL 執行單元
pub struct EtlApp {
    config: AppConfig,
    engine: EtlEngine,
    extractor: Box<dyn Extractor>,
    loader: Box<dyn Loader>,
}

impl EtlApp {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        config.validate()?;

        let storage = LocalStorage::new(&config.storage.base_path);
        let records: Arc<dyn RecordStore> =
            Arc::new(JsonFileRecordStore::new(&config.storage.records_dir));

        let mut pipeline = TransformPipeline::new();
        if let Some(generation) = &config.generation {
            let generator = build_generator(generation)?;
            pipeline = pipeline.with_enricher(Enricher::new(generator, GenerationOptions::default()));
        }

        let extractor = build_extractor(&config.source, storage.clone(), records.clone());
        let loader = build_loader(&config, storage, records);

        tracing::info!("🧩 Pipeline '{}' assembled", config.pipeline.name);
        Ok(Self {
            config,
            engine: EtlEngine::new(pipeline),
            extractor,
            loader,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<EtlRunSummary> {
        self.engine
            .run(
                self.extractor.as_ref(),
                &self.config.transformations,
                self.loader.as_ref(),
            )
            .await
    }

    /// extract + transform，不寫出
    pub async fn preview(&self) -> Result<TransformOutput> {
        self.engine
            .preview(self.extractor.as_ref(), &self.config.transformations)
            .await
    }
}

fn build_extractor(
    source: &SourceConfig,
    storage: LocalStorage,
    records: Arc<dyn RecordStore>,
) -> Box<dyn Extractor> {
    match source {
        SourceConfig::Api {
            endpoint,
            headers,
            parameters,
            records_path,
            timeout_seconds,
        } => {
            let mut extractor = ApiExtractor::new(endpoint)
                .with_headers(headers.clone())
                .with_query(parameters.clone());
            if let Some(path) = records_path {
                extractor = extractor.with_records_path(path);
            }
            if let Some(seconds) = timeout_seconds {
                extractor = extractor.with_timeout(Duration::from_secs(*seconds));
            }
            Box::new(extractor)
        }
        SourceConfig::File { path, format } => {
            let mut extractor = FileExtractor::new(storage, path);
            if let Some(format) = format {
                extractor = extractor.with_format(*format);
            }
            Box::new(extractor)
        }
        SourceConfig::Record { record_id } => Box::new(RecordExtractor::new(records, record_id)),
    }
}

fn build_loader(
    config: &AppConfig,
    storage: LocalStorage,
    records: Arc<dyn RecordStore>,
) -> Box<dyn Loader> {
    let source_name = config.pipeline.name.clone();

    match &config.load {
        LoadConfig::Record => Box::new(RecordLoader::new(records, source_name)),
        LoadConfig::File {
            path,
            format,
            compress,
        } => {
            let mut file_loader = FileLoader::new(storage, path).with_compression(*compress);
            if let Some(format) = format {
                file_loader = file_loader.with_format(*format);
            }

            if config.options.save_to_db {
                Box::new(MultiLoader::new(vec![
                    Box::new(file_loader),
                    Box::new(RecordLoader::new(records, source_name)),
                ]))
            } else {
                Box::new(file_loader)
            }
        }
    }
}
