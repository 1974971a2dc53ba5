use crate::config::transform::{TransformStep, TransformationConfig};
use crate::core::transform::{RunMetrics, StepReport, TransformOutput, TransformPipeline};
use crate::core::{Extractor, Loader, Record};
use crate::utils::error::Result;
use serde::Serialize;
use std::time::Instant;

/// 一次 extract → transform → load 的執行摘要
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EtlRunSummary {
    pub source: String,
    pub extracted_count: usize,
    pub loaded_count: usize,
    pub location: String,
    pub transformations: StepReport,
    pub failed_steps: Vec<TransformStep>,
    pub metrics: RunMetrics,
    pub duration_ms: u64,
}

pub struct EtlEngine {
    pipeline: TransformPipeline,
}

impl EtlEngine {
    pub fn new(pipeline: TransformPipeline) -> Self {
        Self { pipeline }
    }

    /// 只做 extract 與 transform，不寫出結果
    pub async fn preview(
        &self,
        extractor: &dyn Extractor,
        transforms: &TransformationConfig,
    ) -> Result<TransformOutput> {
        // Extract
        tracing::info!("📥 Extracting data from {}", extractor.source_name());
        let raw_data = extractor.extract().await?;
        tracing::info!("📥 Extracted {} records", record_count(&raw_data));

        // Transform
        tracing::info!(
            "🔄 Transforming data with steps: {:?}",
            transforms.requested_steps()
        );
        let output = self.pipeline.run(&raw_data, transforms).await;
        tracing::info!("🔄 Transformed {} records", record_count(&output.data));

        Ok(output)
    }

    pub async fn run(
        &self,
        extractor: &dyn Extractor,
        transforms: &TransformationConfig,
        loader: &dyn Loader,
    ) -> Result<EtlRunSummary> {
        let started = Instant::now();
        tracing::info!("🚀 Starting ETL process...");

        let extracted = extractor.extract().await?;
        let extracted_count = record_count(&extracted);
        tracing::info!(
            "📥 Extracted {} records from {}",
            extracted_count,
            extractor.source_name()
        );

        let output = self.pipeline.run(&extracted, transforms).await;
        let failed_steps = output.failed_steps();
        if !failed_steps.is_empty() {
            tracing::warn!("⚠️ Steps failed during transform: {:?}", failed_steps);
        }

        // Load
        tracing::info!("📤 Loading data...");
        let location = loader.load(&output.data).await?;
        tracing::info!("📤 Output saved to: {}", location);

        let summary = EtlRunSummary {
            source: extractor.source_name().to_string(),
            extracted_count,
            loaded_count: record_count(&output.data),
            location,
            transformations: output.transformations,
            failed_steps,
            metrics: output.metrics,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        tracing::info!(
            "✅ ETL finished in {} ms ({} → {} records)",
            summary.duration_ms,
            summary.extracted_count,
            summary.loaded_count
        );
        Ok(summary)
    }
}

/// 陣列算元素數，null 算 0，其他值算 1 筆
pub fn record_count(data: &Record) -> usize {
    match data {
        Record::Array(items) => items.len(),
        Record::Null => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::EtlError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    struct StaticExtractor {
        data: Record,
    }

    #[async_trait]
    impl Extractor for StaticExtractor {
        async fn extract(&self) -> Result<Record> {
            Ok(self.data.clone())
        }

        fn source_name(&self) -> &str {
            "static"
        }
    }

    struct BrokenExtractor;

    #[async_trait]
    impl Extractor for BrokenExtractor {
        async fn extract(&self) -> Result<Record> {
            Err(EtlError::ProcessingError {
                message: "source unavailable".to_string(),
            })
        }

        fn source_name(&self) -> &str {
            "broken"
        }
    }

    #[derive(Clone, Default)]
    struct MemoryLoader {
        loaded: Arc<Mutex<Vec<Record>>>,
    }

    #[async_trait]
    impl Loader for MemoryLoader {
        async fn load(&self, data: &Record) -> Result<String> {
            self.loaded.lock().await.push(data.clone());
            Ok("memory://output".to_string())
        }
    }

    #[tokio::test]
    async fn test_run_extracts_transforms_and_loads() {
        let engine = EtlEngine::new(TransformPipeline::new());
        let extractor = StaticExtractor {
            data: json!([{"id": 1, "name": " A ", "note": ""}, {"id": 2, "name": "B"}]),
        };
        let transforms = TransformationConfig::new().with(
            TransformStep::Clean,
            json!({"textFields": ["name"], "textOptions": {"trim": true}}),
        );
        let loader = MemoryLoader::default();

        let summary = engine.run(&extractor, &transforms, &loader).await.unwrap();

        assert_eq!(summary.source, "static");
        assert_eq!(summary.extracted_count, 2);
        assert_eq!(summary.loaded_count, 2);
        assert_eq!(summary.location, "memory://output");
        assert!(summary.failed_steps.is_empty());

        let loaded = loader.loaded.lock().await;
        assert_eq!(loaded[0], json!([{"id": 1, "name": "A"}, {"id": 2, "name": "B"}]));
    }

    #[tokio::test]
    async fn test_transform_step_failure_does_not_fail_run() {
        let engine = EtlEngine::new(TransformPipeline::new());
        let extractor = StaticExtractor {
            data: json!({"id": 1}),
        };
        let transforms =
            TransformationConfig::new().with(TransformStep::Enrich, json!({"instruction": "x"}));
        let loader = MemoryLoader::default();

        let summary = engine.run(&extractor, &transforms, &loader).await.unwrap();

        assert_eq!(summary.failed_steps, vec![TransformStep::Enrich]);
        assert_eq!(loader.loaded.lock().await[0], json!({"id": 1}));
    }

    #[tokio::test]
    async fn test_extract_failure_fails_run_without_loading() {
        let engine = EtlEngine::new(TransformPipeline::new());
        let loader = MemoryLoader::default();

        let result = engine
            .run(&BrokenExtractor, &TransformationConfig::new(), &loader)
            .await;

        assert!(matches!(result, Err(EtlError::ProcessingError { .. })));
        assert!(loader.loaded.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_preview_skips_load() {
        let engine = EtlEngine::new(TransformPipeline::new());
        let extractor = StaticExtractor {
            data: json!([{"a": null}]),
        };
        let transforms = TransformationConfig::new().with(TransformStep::Clean, json!(true));

        let output = engine.preview(&extractor, &transforms).await.unwrap();

        assert_eq!(output.data, json!([{}]));
    }

    #[test]
    fn test_record_count() {
        assert_eq!(record_count(&json!([1, 2, 3])), 3);
        assert_eq!(record_count(&json!({"a": 1})), 1);
        assert_eq!(record_count(&json!(null)), 0);
    }
}
