use crate::config::transform::{
    parse_step_options, CategorizeOptions, CleanOptions, EnrichOptions, SummarizeOptions,
    TransformStep, TransformationConfig, ValidateOptions,
};
use crate::core::transform::cleaner::clean;
use crate::core::transform::enricher::{Enricher, Enrichment};
use crate::core::transform::validator::{validate, ValidationOutcome};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::validate_required_field;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::Instrument;

/// 單一步驟的執行結果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutcome {
    pub applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

impl StepOutcome {
    pub fn applied(details: Map<String, Value>) -> Self {
        Self {
            applied: true,
            error: None,
            details,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            applied: false,
            error: Some(error.into()),
            details: Map::new(),
        }
    }
}

/// 以執行順序排序的步驟報告
pub type StepReport = BTreeMap<TransformStep, StepOutcome>;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTiming {
    pub step: TransformStep,
    pub applied: bool,
    pub duration_ms: u64,
}

/// 單次執行的量測資料，隨結果回傳而非寫入全域狀態
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunMetrics {
    pub steps: Vec<StepTiming>,
    pub generation_failures: usize,
    pub total_duration_ms: u64,
}

impl RunMetrics {
    fn record(&mut self, step: TransformStep, applied: bool, started: Instant) {
        self.steps.push(StepTiming {
            step,
            applied,
            duration_ms: started.elapsed().as_millis() as u64,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformOutput {
    pub data: Value,
    pub transformations: StepReport,
    pub metrics: RunMetrics,
}

impl TransformOutput {
    pub fn outcome(&self, step: TransformStep) -> Option<&StepOutcome> {
        self.transformations.get(&step)
    }

    pub fn failed_steps(&self) -> Vec<TransformStep> {
        self.transformations
            .iter()
            .filter(|(_, outcome)| !outcome.applied)
            .map(|(step, _)| *step)
            .collect()
    }
}

struct StepSuccess {
    data: Value,
    details: Map<String, Value>,
    generation_failures: usize,
}

impl StepSuccess {
    fn plain(data: Value) -> Self {
        Self {
            data,
            details: Map::new(),
            generation_failures: 0,
        }
    }
}

/// 依固定順序執行 clean → validate → enrich → summarize → categorize
///
/// 步驟失敗時沿用該步驟的輸入資料並記錄錯誤，不會中斷後續步驟。
#[derive(Clone, Default)]
pub struct TransformPipeline {
    enricher: Option<Enricher>,
}

impl TransformPipeline {
    pub fn new() -> Self {
        Self { enricher: None }
    }

    pub fn with_enricher(mut self, enricher: Enricher) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub async fn run(&self, source: &Value, config: &TransformationConfig) -> TransformOutput {
        let started = Instant::now();
        let mut data = source.clone();
        let mut transformations = StepReport::new();
        let mut metrics = RunMetrics::default();

        for step in config.requested_steps() {
            let Some(raw_options) = config.get(step) else {
                continue;
            };
            let step_started = Instant::now();
            let span = tracing::info_span!("transform_step", step = %step);

            match self.run_step(step, raw_options, &data).instrument(span).await {
                Ok(success) => {
                    tracing::info!("✅ Step '{}' applied", step);
                    data = success.data;
                    metrics.generation_failures += success.generation_failures;
                    transformations.insert(step, StepOutcome::applied(success.details));
                    metrics.record(step, true, step_started);
                }
                Err(e) => {
                    tracing::warn!("⚠️ Step '{}' failed, keeping previous data: {}", step, e);
                    transformations.insert(step, StepOutcome::failed(e.to_string()));
                    metrics.record(step, false, step_started);
                }
            }
        }

        metrics.total_duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            "🔄 Transform finished: {} steps in {} ms",
            transformations.len(),
            metrics.total_duration_ms
        );

        TransformOutput {
            data,
            transformations,
            metrics,
        }
    }

    async fn run_step(&self, step: TransformStep, raw: &Value, data: &Value) -> Result<StepSuccess> {
        match step {
            TransformStep::Clean => {
                let options: CleanOptions = parse_step_options(step, raw)?;
                Ok(StepSuccess::plain(clean(data, &options)))
            }
            TransformStep::Validate => {
                let options: ValidateOptions = parse_step_options(step, raw)?;
                let schema = validate_required_field("validate.schema", &options.schema)?;
                let outcome = validate(data, schema, options.remove_invalid);
                let details = validation_details(&outcome);
                Ok(StepSuccess {
                    data: outcome.into_data(),
                    details,
                    generation_failures: 0,
                })
            }
            TransformStep::Enrich => {
                let options: EnrichOptions = parse_step_options(step, raw)?;
                let enrichment = self.enricher(step)?.enrich(data, &options).await?;
                Ok(generation_success(enrichment))
            }
            TransformStep::Summarize => {
                let options: SummarizeOptions = parse_step_options(step, raw)?;
                let enrichment = self.enricher(step)?.summarize(data, &options).await?;
                Ok(generation_success(enrichment))
            }
            TransformStep::Categorize => {
                let options: CategorizeOptions = parse_step_options(step, raw)?;
                let enrichment = self.enricher(step)?.categorize(data, &options).await?;
                Ok(generation_success(enrichment))
            }
        }
    }

    fn enricher(&self, step: TransformStep) -> Result<&Enricher> {
        self.enricher.as_ref().ok_or_else(|| EtlError::ConfigError {
            message: format!("Step '{}' requires a text generation service", step),
        })
    }
}

fn validation_details(outcome: &ValidationOutcome) -> Map<String, Value> {
    let mut details = Map::new();
    details.insert("isValid".to_string(), Value::Bool(outcome.is_valid()));

    match outcome {
        ValidationOutcome::Single { errors, .. } => {
            details.insert("errors".to_string(), json!(errors));
        }
        ValidationOutcome::Batch {
            valid_items,
            invalid_items,
            invalid_count,
            ..
        } => {
            details.insert("validCount".to_string(), json!(valid_items.len()));
            details.insert("invalidCount".to_string(), json!(invalid_count));
            let itemized: Vec<Value> = invalid_items
                .iter()
                .map(|invalid| json!({"index": invalid.index, "errors": invalid.errors}))
                .collect();
            details.insert("invalidItems".to_string(), Value::Array(itemized));
        }
    }

    details
}

fn generation_success(enrichment: Enrichment) -> StepSuccess {
    let mut details = Map::new();
    details.insert("failedCount".to_string(), json!(enrichment.failures.len()));
    if !enrichment.failures.is_empty() {
        details.insert("failures".to_string(), json!(enrichment.failures));
    }

    StepSuccess {
        generation_failures: enrichment.failures.len(),
        data: enrichment.data,
        details,
    }
}
