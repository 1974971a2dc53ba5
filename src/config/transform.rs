use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_list, validate_non_empty_string, validate_positive_number, Validate,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_SUMMARY_MAX_LENGTH: usize = 100;

/// 轉換步驟，宣告順序即執行順序
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransformStep {
    Clean,
    Validate,
    Enrich,
    Summarize,
    Categorize,
}

impl TransformStep {
    pub const ORDER: [TransformStep; 5] = [
        TransformStep::Clean,
        TransformStep::Validate,
        TransformStep::Enrich,
        TransformStep::Summarize,
        TransformStep::Categorize,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransformStep::Clean => "clean",
            TransformStep::Validate => "validate",
            TransformStep::Enrich => "enrich",
            TransformStep::Summarize => "summarize",
            TransformStep::Categorize => "categorize",
        }
    }
}

impl fmt::Display for TransformStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 每個步驟的設定以原始 JSON 保存，執行到該步驟時才解析，
/// 因此單一步驟的設定錯誤只會讓該步驟失敗。
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransformationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clean: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validate: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrich: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summarize: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categorize: Option<Value>,
}

impl TransformationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, step: TransformStep, options: Value) -> Self {
        *self.slot_mut(step) = Some(options);
        self
    }

    pub fn get(&self, step: TransformStep) -> Option<&Value> {
        match step {
            TransformStep::Clean => self.clean.as_ref(),
            TransformStep::Validate => self.validate.as_ref(),
            TransformStep::Enrich => self.enrich.as_ref(),
            TransformStep::Summarize => self.summarize.as_ref(),
            TransformStep::Categorize => self.categorize.as_ref(),
        }
    }

    fn slot_mut(&mut self, step: TransformStep) -> &mut Option<Value> {
        match step {
            TransformStep::Clean => &mut self.clean,
            TransformStep::Validate => &mut self.validate,
            TransformStep::Enrich => &mut self.enrich,
            TransformStep::Summarize => &mut self.summarize,
            TransformStep::Categorize => &mut self.categorize,
        }
    }

    /// 依固定順序列出有設定的步驟
    pub fn requested_steps(&self) -> Vec<TransformStep> {
        TransformStep::ORDER
            .into_iter()
            .filter(|step| self.get(*step).is_some())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.requested_steps().is_empty()
    }
}

/// 將步驟設定解析為型別化的選項；`true` 視為全部使用預設值
pub fn parse_step_options<T>(step: TransformStep, raw: &Value) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let raw = match raw {
        Value::Bool(true) => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };

    let options: T = serde_json::from_value(raw).map_err(|e| EtlError::ConfigValidationError {
        field: step.as_str().to_string(),
        message: format!("Invalid options: {}", e),
    })?;
    options.validate()?;
    Ok(options)
}

fn default_true() -> bool {
    true
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_summary_max_length() -> usize {
    DEFAULT_SUMMARY_MAX_LENGTH
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateFormat {
    #[default]
    #[serde(rename = "ISO", alias = "iso")]
    Iso,
    #[serde(rename = "YYYY-MM-DD")]
    DateOnly,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    #[serde(default)]
    pub trim: bool,
    #[serde(default)]
    pub lowercase: bool,
    #[serde(default)]
    pub remove_special_chars: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanOptions {
    #[serde(default = "default_true")]
    pub remove_empty: bool,
    #[serde(default)]
    pub date_fields: Vec<String>,
    #[serde(default)]
    pub date_format: DateFormat,
    #[serde(default)]
    pub text_fields: Vec<String>,
    #[serde(default)]
    pub text_options: TextOptions,
}

impl Default for CleanOptions {
    fn default() -> Self {
        Self {
            remove_empty: true,
            date_fields: Vec::new(),
            date_format: DateFormat::Iso,
            text_fields: Vec::new(),
            text_options: TextOptions::default(),
        }
    }
}

impl Validate for CleanOptions {
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl FieldType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 精簡的宣告式 schema；頂層與欄位共用同一結構，可遞迴
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Schema>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateOptions {
    #[serde(default)]
    pub schema: Option<Schema>,
    #[serde(default)]
    pub remove_invalid: bool,
}

impl Validate for ValidateOptions {
    fn validate(&self) -> Result<()> {
        if self.schema.is_none() {
            return Err(EtlError::MissingConfigError {
                field: "validate.schema".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichOptions {
    #[serde(default)]
    pub instruction: String,
    #[serde(default)]
    pub fields: Option<Vec<String>>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl EnrichOptions {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            fields: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }
}

impl Validate for EnrichOptions {
    fn validate(&self) -> Result<()> {
        if self.instruction.trim().is_empty() {
            return Err(EtlError::MissingConfigError {
                field: "enrich.instruction".to_string(),
            });
        }
        validate_positive_number("enrich.batchSize", self.batch_size, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummarizeOptions {
    #[serde(default)]
    pub text_fields: Vec<String>,
    #[serde(default = "default_summary_max_length")]
    pub max_length: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Validate for SummarizeOptions {
    fn validate(&self) -> Result<()> {
        validate_non_empty_list("summarize.textFields", &self.text_fields)?;
        validate_positive_number("summarize.maxLength", self.max_length, 1)?;
        validate_positive_number("summarize.batchSize", self.batch_size, 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorizeOptions {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub text_field: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Validate for CategorizeOptions {
    fn validate(&self) -> Result<()> {
        validate_non_empty_list("categorize.categories", &self.categories)?;
        validate_non_empty_string("categorize.textField", &self.text_field)?;
        validate_positive_number("categorize.batchSize", self.batch_size, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_requested_steps_follow_fixed_order() {
        let config: TransformationConfig = serde_json::from_value(json!({
            "categorize": {"categories": ["A"], "textField": "body"},
            "clean": {},
            "enrich": {"instruction": "add tags"}
        }))
        .unwrap();

        assert_eq!(
            config.requested_steps(),
            vec![
                TransformStep::Clean,
                TransformStep::Enrich,
                TransformStep::Categorize
            ]
        );
    }

    #[test]
    fn test_null_step_is_not_requested() {
        let config: TransformationConfig =
            serde_json::from_value(json!({"clean": null})).unwrap();
        assert!(config.is_empty());
    }

    #[test]
    fn test_clean_options_defaults() {
        let options: CleanOptions = parse_step_options(TransformStep::Clean, &json!({})).unwrap();
        assert!(options.remove_empty);
        assert_eq!(options.date_format, DateFormat::Iso);
        assert!(options.text_fields.is_empty());

        let from_flag: CleanOptions =
            parse_step_options(TransformStep::Clean, &json!(true)).unwrap();
        assert_eq!(from_flag, CleanOptions::default());
    }

    #[test]
    fn test_date_format_names() {
        let options: CleanOptions = parse_step_options(
            TransformStep::Clean,
            &json!({"dateFields": ["created"], "dateFormat": "YYYY-MM-DD"}),
        )
        .unwrap();
        assert_eq!(options.date_format, DateFormat::DateOnly);
    }

    #[test]
    fn test_enrich_requires_instruction() {
        let err = parse_step_options::<EnrichOptions>(TransformStep::Enrich, &json!({"fields": ["a"]}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required configuration: enrich.instruction"
        );

        let err = parse_step_options::<EnrichOptions>(
            TransformStep::Enrich,
            &json!({"instruction": "x", "batchSize": 0}),
        )
        .unwrap_err();
        assert!(err.to_string().contains("enrich.batchSize"));
    }

    #[test]
    fn test_validate_requires_schema() {
        let err = parse_step_options::<ValidateOptions>(TransformStep::Validate, &json!({}))
            .unwrap_err();
        assert_eq!(err.to_string(), "Missing required configuration: validate.schema");
    }

    #[test]
    fn test_malformed_options_are_config_errors() {
        let err = parse_step_options::<CleanOptions>(
            TransformStep::Clean,
            &json!({"dateFields": "created"}),
        )
        .unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { ref field, .. } if field == "clean"));
    }

    #[test]
    fn test_nested_schema_parses() {
        let schema: Schema = serde_json::from_value(json!({
            "required": ["id"],
            "properties": {
                "id": {"type": "number", "minimum": 1},
                "tags": {"type": "array", "items": {"type": "string"}, "maxItems": 3},
                "owner": {"type": "object", "properties": {"email": {"type": "string", "pattern": "@"}}}
            }
        }))
        .unwrap();

        assert_eq!(schema.required, vec!["id".to_string()]);
        let tags = &schema.properties["tags"];
        assert_eq!(tags.field_type, Some(FieldType::Array));
        assert_eq!(tags.items.as_ref().unwrap().field_type, Some(FieldType::String));
        assert_eq!(tags.max_items, Some(3));
        assert!(schema.properties["owner"].properties.contains_key("email"));
    }
}
