use crate::config::transform::{CategorizeOptions, EnrichOptions, SummarizeOptions};
use crate::core::transform::response::{extract_payload, parse_json, parse_object};
use crate::domain::model::GenerationOptions;
use crate::domain::ports::TextGenerator;
use crate::utils::error::{GenerationError, Result};
use crate::utils::validation::Validate;
use futures::future::join_all;
use serde::Serialize;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const FALLBACK_CATEGORY: &str = "Other";
pub const ENRICHED_TEXT_KEY: &str = "enriched_text";
pub const ENRICHMENT_ERROR_KEY: &str = "enrichment_error";

/// 單筆生成失敗的紀錄，該筆資料保留原值
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub index: usize,
    pub error: String,
}

/// 生成類步驟的結果：資料與逐筆失敗清單
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub data: Value,
    pub failures: Vec<ItemFailure>,
}

impl Enrichment {
    fn unchanged(data: &Value) -> Self {
        Self {
            data: data.clone(),
            failures: Vec::new(),
        }
    }
}

/// 單筆處理結果：record 一定存在（失敗時為原值或後備值），errors 記錄問題
struct Processed {
    record: Map<String, Value>,
    errors: Vec<String>,
}

impl Processed {
    fn ok(record: Map<String, Value>) -> Self {
        Self {
            record,
            errors: Vec::new(),
        }
    }

    fn failed(record: &Map<String, Value>, error: impl ToString) -> Self {
        Self {
            record: record.clone(),
            errors: vec![error.to_string()],
        }
    }
}

/// 透過外部文字生成服務豐富資料
///
/// 陣列資料會切成 `batch_size` 大小的批次：批次內同時發出生成請求，
/// 批次之間依序處理，所以同時進行中的請求不會超過 `batch_size`。
/// 任何生成錯誤都只影響該筆資料。
#[derive(Clone)]
pub struct Enricher {
    generator: Arc<dyn TextGenerator>,
    options: GenerationOptions,
}

impl Enricher {
    pub fn new(generator: Arc<dyn TextGenerator>, options: GenerationOptions) -> Self {
        Self { generator, options }
    }

    pub fn model_name(&self) -> &str {
        self.options
            .model
            .as_deref()
            .unwrap_or_else(|| self.generator.model_name())
    }

    pub async fn enrich(&self, data: &Value, options: &EnrichOptions) -> Result<Enrichment> {
        options.validate()?;
        tracing::info!(
            "🤖 Enriching data with {} (fields: {:?})",
            self.model_name(),
            options.fields
        );

        Ok(self
            .dispatch(data, options.batch_size, |record| self.enrich_record(record, options))
            .await)
    }

    pub async fn summarize(&self, data: &Value, options: &SummarizeOptions) -> Result<Enrichment> {
        options.validate()?;
        tracing::info!(
            "📝 Summarizing fields {:?} longer than {} characters",
            options.text_fields,
            options.max_length
        );

        Ok(self
            .dispatch(data, options.batch_size, |record| self.summarize_record(record, options))
            .await)
    }

    pub async fn categorize(&self, data: &Value, options: &CategorizeOptions) -> Result<Enrichment> {
        options.validate()?;
        tracing::info!(
            "🏷️ Categorizing '{}' into {:?}",
            options.text_field,
            options.categories
        );

        Ok(self
            .dispatch(data, options.batch_size, |record| self.categorize_record(record, options))
            .await)
    }

    /// 依資料形狀分派：物件走單筆、陣列走批次、純量原樣返回
    async fn dispatch<'a, F, Fut>(&self, data: &'a Value, batch_size: usize, process: F) -> Enrichment
    where
        F: Fn(&'a Map<String, Value>) -> Fut,
        Fut: Future<Output = Processed>,
    {
        match data {
            Value::Object(record) => {
                let processed = process(record).await;
                let failures = if processed.errors.is_empty() {
                    Vec::new()
                } else {
                    tracing::warn!("⚠️ Generation failed for record: {}", processed.errors.join("; "));
                    vec![ItemFailure {
                        index: 0,
                        error: processed.errors.join("; "),
                    }]
                };
                Enrichment {
                    data: Value::Object(processed.record),
                    failures,
                }
            }
            Value::Array(items) => self.process_in_batches(items, batch_size, process).await,
            other => {
                tracing::debug!("Skipping generation for non-object data");
                Enrichment::unchanged(other)
            }
        }
    }

    async fn process_in_batches<'a, F, Fut>(
        &self,
        items: &'a [Value],
        batch_size: usize,
        process: F,
    ) -> Enrichment
    where
        F: Fn(&'a Map<String, Value>) -> Fut,
        Fut: Future<Output = Processed>,
    {
        let batch_size = batch_size.max(1);
        let total_batches = items.len().div_ceil(batch_size);
        let mut data = Vec::with_capacity(items.len());
        let mut failures = Vec::new();

        for (batch_index, batch) in items.chunks(batch_size).enumerate() {
            tracing::debug!(
                "📦 Processing batch {}/{} ({} items)",
                batch_index + 1,
                total_batches,
                batch.len()
            );

            let process = &process;
            let pending = batch.iter().map(|item| async move {
                match item {
                    Value::Object(record) => Some(process(record).await),
                    _ => None,
                }
            });
            let results = join_all(pending).await;

            for (position, (item, result)) in batch.iter().zip(results).enumerate() {
                match result {
                    Some(processed) => {
                        if !processed.errors.is_empty() {
                            let index = batch_index * batch_size + position;
                            let error = processed.errors.join("; ");
                            tracing::warn!("⚠️ Generation failed for item {}: {}", index, error);
                            failures.push(ItemFailure { index, error });
                        }
                        data.push(Value::Object(processed.record));
                    }
                    None => data.push(item.clone()),
                }
            }
        }

        tracing::info!(
            "✅ Generation complete: {} items, {} failed",
            data.len(),
            failures.len()
        );

        Enrichment {
            data: Value::Array(data),
            failures,
        }
    }

    async fn generate(&self, prompt: &str) -> std::result::Result<String, GenerationError> {
        let call = self.generator.generate(prompt, &self.options);
        match self.options.timeout_ms {
            Some(ms) => tokio::time::timeout(Duration::from_millis(ms), call)
                .await
                .map_err(|_| GenerationError::Timeout(ms))?,
            None => call.await,
        }
    }

    async fn enrich_record(&self, record: &Map<String, Value>, options: &EnrichOptions) -> Processed {
        let subset: Map<String, Value> = match &options.fields {
            Some(fields) => record
                .iter()
                .filter(|(key, _)| fields.contains(key))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect(),
            None => record.clone(),
        };

        let prompt = build_prompt(&options.instruction, &Value::Object(subset));
        let response = match self.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => return Processed::failed(record, e),
        };

        let mut enriched = record.clone();
        match parse_object(&response) {
            Some(fields) => {
                enriched.extend(fields);
                Processed::ok(enriched)
            }
            None => {
                enriched.insert(ENRICHED_TEXT_KEY.to_string(), Value::String(response));
                enriched.insert(
                    ENRICHMENT_ERROR_KEY.to_string(),
                    Value::String("Response was not a valid JSON object".to_string()),
                );
                Processed {
                    record: enriched,
                    errors: vec!["Response was not a valid JSON object".to_string()],
                }
            }
        }
    }

    async fn summarize_record(
        &self,
        record: &Map<String, Value>,
        options: &SummarizeOptions,
    ) -> Processed {
        let mut summarized = record.clone();
        let mut errors = Vec::new();

        for field in &options.text_fields {
            let Some(Value::String(text)) = record.get(field) else {
                continue;
            };
            // 短文字不呼叫模型
            if text.chars().count() <= options.max_length {
                continue;
            }

            let summary_key = format!("{}_summary", field);
            let instruction = format!(
                "Summarize the \"{}\" text to approximately {} characters. \
                 Respond with a JSON object of the form {{\"{}\": \"<summary>\"}}.",
                field, options.max_length, summary_key
            );
            let mut input = Map::new();
            input.insert(field.clone(), Value::String(text.clone()));

            match self.generate(&build_prompt(&instruction, &Value::Object(input))).await {
                Ok(response) => match parse_object(&response) {
                    Some(parsed) if parsed.contains_key(&summary_key) => summarized.extend(parsed),
                    // 模型換了欄位名稱時，唯一的字串值仍視為摘要
                    Some(parsed) => match lone_string(&parsed).cloned() {
                        Some(summary) => {
                            summarized.insert(summary_key, summary);
                        }
                        None => summarized.extend(parsed),
                    },
                    None => {
                        summarized.insert(
                            summary_key,
                            Value::String(extract_payload(&response).to_string()),
                        );
                    }
                },
                Err(e) => errors.push(format!("{}: {}", field, e)),
            }
        }

        Processed {
            record: summarized,
            errors,
        }
    }

    async fn categorize_record(
        &self,
        record: &Map<String, Value>,
        options: &CategorizeOptions,
    ) -> Processed {
        let mut categorized = record.clone();

        let Some(Value::String(text)) = record.get(&options.text_field) else {
            categorized.insert("category".to_string(), Value::String(FALLBACK_CATEGORY.to_string()));
            return Processed::ok(categorized);
        };

        let prompt = format!(
            "Categorize the following text into exactly one of these categories: {}.\n\
             Respond with only the category name and nothing else.\n\nText:\n{}",
            options.categories.join(", "),
            text
        );

        let response = match self.generate(&prompt).await {
            Ok(response) => response,
            Err(e) => return Processed::failed(record, e),
        };

        let candidate = match parse_json(&response) {
            Ok(Value::Object(mut parsed)) => match parsed.remove("category") {
                Some(Value::String(category)) => category,
                _ => String::new(),
            },
            Ok(Value::String(category)) => category,
            _ => extract_payload(&response).to_string(),
        };
        let candidate = candidate.trim();

        let category = if options.categories.iter().any(|c| c == candidate) {
            candidate.to_string()
        } else {
            tracing::debug!("Model answered '{}', not a known category", candidate);
            FALLBACK_CATEGORY.to_string()
        };
        categorized.insert("category".to_string(), Value::String(category));
        Processed::ok(categorized)
    }
}

/// 只有一個欄位且為字串時回傳該值
fn lone_string(parsed: &Map<String, Value>) -> Option<&Value> {
    let mut values = parsed.values();
    match (values.next(), values.next()) {
        (Some(value @ Value::String(_)), None) => Some(value),
        _ => None,
    }
}

/// 指令與資料組成 prompt
pub fn build_prompt(instruction: &str, data: &Value) -> String {
    let rendered = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
    format!(
        "{}\n\nInput data:\n{}\n\nRespond only with a JSON object containing the new or updated fields.",
        instruction.trim(),
        rendered
    )
}
