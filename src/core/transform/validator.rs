use crate::config::transform::{FieldType, Schema};
use crate::utils::error::{EtlError, Result};
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// 驗證失敗的單筆資料
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidItem {
    pub item: Value,
    pub index: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ValidationOutcome {
    #[serde(rename_all = "camelCase")]
    Single {
        is_valid: bool,
        errors: Vec<String>,
        data: Value,
    },
    #[serde(rename_all = "camelCase")]
    Batch {
        is_valid: bool,
        valid_items: Vec<Value>,
        invalid_items: Vec<InvalidItem>,
        invalid_count: usize,
        data: Value,
    },
}

impl ValidationOutcome {
    pub fn is_valid(&self) -> bool {
        match self {
            ValidationOutcome::Single { is_valid, .. } | ValidationOutcome::Batch { is_valid, .. } => {
                *is_valid
            }
        }
    }

    pub fn data(&self) -> &Value {
        match self {
            ValidationOutcome::Single { data, .. } | ValidationOutcome::Batch { data, .. } => data,
        }
    }

    pub fn into_data(self) -> Value {
        match self {
            ValidationOutcome::Single { data, .. } | ValidationOutcome::Batch { data, .. } => data,
        }
    }

    /// 單筆模式為錯誤訊息數，陣列模式為無效筆數
    pub fn problem_count(&self) -> usize {
        match self {
            ValidationOutcome::Single { errors, .. } => errors.len(),
            ValidationOutcome::Batch { invalid_count, .. } => *invalid_count,
        }
    }
}

/// 依 schema 驗證單筆或陣列資料；不會修改輸入，也不會回傳錯誤
pub fn validate(data: &Value, schema: &Schema, remove_invalid: bool) -> ValidationOutcome {
    match data {
        Value::Array(items) => validate_batch(items, schema, remove_invalid),
        single => match validate_item(single, schema, &mut PatternCache::default()) {
            Ok(errors) => ValidationOutcome::Single {
                is_valid: errors.is_empty(),
                errors,
                data: single.clone(),
            },
            Err(e) => {
                tracing::warn!("⚠️ Validation aborted: {}", e);
                ValidationOutcome::Single {
                    is_valid: false,
                    errors: vec![e.to_string()],
                    data: single.clone(),
                }
            }
        },
    }
}

fn validate_batch(items: &[Value], schema: &Schema, remove_invalid: bool) -> ValidationOutcome {
    let mut valid_items = Vec::new();
    let mut invalid_items = Vec::new();
    let mut patterns = PatternCache::default();

    for (index, item) in items.iter().enumerate() {
        let errors =
            validate_item(item, schema, &mut patterns).unwrap_or_else(|e| vec![e.to_string()]);
        if errors.is_empty() {
            valid_items.push(item.clone());
        } else {
            invalid_items.push(InvalidItem {
                item: item.clone(),
                index,
                errors,
            });
        }
    }

    let invalid_count = invalid_items.len();
    tracing::debug!(
        "🔍 Validated {} items: {} valid, {} invalid",
        items.len(),
        valid_items.len(),
        invalid_count
    );

    let data = if remove_invalid {
        Value::Array(valid_items.clone())
    } else {
        Value::Array(items.to_vec())
    };

    ValidationOutcome::Batch {
        is_valid: invalid_count == 0,
        valid_items,
        invalid_items,
        invalid_count,
        data,
    }
}

/// 一次驗證呼叫內共用的已編譯 pattern
#[derive(Default)]
struct PatternCache {
    compiled: HashMap<String, Regex>,
}

impl PatternCache {
    fn regex(&mut self, pattern: &str) -> std::result::Result<&Regex, regex::Error> {
        if !self.compiled.contains_key(pattern) {
            let regex = Regex::new(pattern)?;
            self.compiled.insert(pattern.to_string(), regex);
        }
        Ok(&self.compiled[pattern])
    }
}

/// 驗證單一物件，回傳錯誤訊息清單；schema 本身有問題（如正規表示式無效）時回傳 Err
fn validate_item(item: &Value, schema: &Schema, patterns: &mut PatternCache) -> Result<Vec<String>> {
    let Value::Object(fields) = item else {
        return Ok(vec![format!("Expected an object, got {}", type_name(item))]);
    };
    validate_object(fields, schema, patterns)
}

fn validate_object(
    fields: &Map<String, Value>,
    schema: &Schema,
    patterns: &mut PatternCache,
) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    for name in &schema.required {
        if !fields.contains_key(name) {
            errors.push(format!("Missing required field: {}", name));
        }
    }

    for (name, field_schema) in &schema.properties {
        // 不存在的欄位只由 required 負責
        if let Some(value) = fields.get(name) {
            errors.extend(validate_field(name, value, field_schema, patterns)?);
        }
    }

    Ok(errors)
}

fn validate_field(
    name: &str,
    value: &Value,
    schema: &Schema,
    patterns: &mut PatternCache,
) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    if let Some(expected) = schema.field_type {
        if !matches_type(value, expected) {
            errors.push(format!(
                "Field '{}' should be of type {}, got {}",
                name,
                expected,
                type_name(value)
            ));
            return Ok(errors);
        }
    }

    if let Some(allowed) = &schema.enum_values {
        if !allowed.iter().any(|candidate| json_equals(candidate, value)) {
            let listed: Vec<String> = allowed.iter().map(Value::to_string).collect();
            errors.push(format!("Field '{}' must be one of: {}", name, listed.join(", ")));
        }
    }

    match value {
        Value::Number(number) => {
            if let Some(n) = number.as_f64() {
                if let Some(minimum) = schema.minimum {
                    if n < minimum {
                        errors.push(format!("Field '{}' must be >= {}", name, minimum));
                    }
                }
                if let Some(maximum) = schema.maximum {
                    if n > maximum {
                        errors.push(format!("Field '{}' must be <= {}", name, maximum));
                    }
                }
            }
        }
        Value::String(text) => {
            let length = text.chars().count();
            if let Some(min_length) = schema.min_length {
                if length < min_length {
                    errors.push(format!(
                        "Field '{}' must be at least {} characters long",
                        name, min_length
                    ));
                }
            }
            if let Some(max_length) = schema.max_length {
                if length > max_length {
                    errors.push(format!(
                        "Field '{}' must be at most {} characters long",
                        name, max_length
                    ));
                }
            }
            if let Some(pattern) = &schema.pattern {
                let regex = patterns.regex(pattern).map_err(|e| EtlError::ValidationError {
                    message: format!("Invalid pattern for field '{}': {}", name, e),
                })?;
                if !regex.is_match(text) {
                    errors.push(format!("Field '{}' does not match pattern {}", name, pattern));
                }
            }
        }
        Value::Object(nested) if schema.field_type == Some(FieldType::Object) => {
            for error in validate_object(nested, schema, patterns)? {
                errors.push(format!("In {}: {}", name, error));
            }
        }
        Value::Array(items) if schema.field_type == Some(FieldType::Array) => {
            errors.extend(validate_array(name, items, schema, patterns)?);
        }
        _ => {}
    }

    Ok(errors)
}

fn validate_array(
    name: &str,
    items: &[Value],
    schema: &Schema,
    patterns: &mut PatternCache,
) -> Result<Vec<String>> {
    let mut errors = Vec::new();

    if let Some(min_items) = schema.min_items {
        if items.len() < min_items {
            errors.push(format!("Field '{}' must have at least {} items", name, min_items));
        }
    }
    if let Some(max_items) = schema.max_items {
        if items.len() > max_items {
            errors.push(format!("Field '{}' must have at most {} items", name, max_items));
        }
    }

    let Some(item_schema) = schema.items.as_deref() else {
        return Ok(errors);
    };

    for (index, item) in items.iter().enumerate() {
        match (item_schema.field_type, item) {
            (Some(FieldType::Object), Value::Object(nested)) => {
                for error in validate_object(nested, item_schema, patterns)? {
                    errors.push(format!("In {}[{}]: {}", name, index, error));
                }
            }
            _ => {
                let element = format!("{}[{}]", name, index);
                errors.extend(validate_field(&element, item, item_schema, patterns)?);
            }
        }
    }

    Ok(errors)
}

/// 數值以大小比較（1 與 1.0 相等），其他型別維持結構比較
fn json_equals(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => a == b,
        },
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| json_equals(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(key, x)| b.get(key).is_some_and(|y| json_equals(x, y)))
        }
        _ => left == right,
    }
}

fn matches_type(value: &Value, expected: FieldType) -> bool {
    match expected {
        FieldType::String => value.is_string(),
        FieldType::Number => value.is_number(),
        FieldType::Boolean => value.is_boolean(),
        FieldType::Array => value.is_array(),
        FieldType::Object => value.is_object(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(value: Value) -> Schema {
        serde_json::from_value(value).unwrap()
    }

    fn errors_of(outcome: &ValidationOutcome) -> Vec<String> {
        match outcome {
            ValidationOutcome::Single { errors, .. } => errors.clone(),
            ValidationOutcome::Batch { .. } => panic!("expected single outcome"),
        }
    }

    #[test]
    fn test_valid_record_has_no_errors() {
        let schema = schema(json!({
            "required": ["id", "name"],
            "properties": {
                "id": {"type": "number", "minimum": 1},
                "name": {"type": "string", "minLength": 1, "maxLength": 20},
                "status": {"type": "string", "enum": ["active", "inactive"]}
            }
        }));
        let record = json!({"id": 7, "name": "Widget", "status": "active"});

        let outcome = validate(&record, &schema, false);

        assert!(outcome.is_valid());
        assert!(errors_of(&outcome).is_empty());
        assert_eq!(outcome.data(), &record);
    }

    #[test]
    fn test_missing_required_field_message() {
        let schema = schema(json!({"required": ["id", "email"]}));
        let outcome = validate(&json!({"id": 1}), &schema, false);

        assert!(!outcome.is_valid());
        assert_eq!(errors_of(&outcome), vec!["Missing required field: email"]);
    }

    #[test]
    fn test_type_mismatch_skips_other_checks() {
        let schema = schema(json!({
            "properties": {"age": {"type": "number", "minimum": 18}}
        }));
        let outcome = validate(&json!({"age": "seventeen"}), &schema, false);

        assert_eq!(
            errors_of(&outcome),
            vec!["Field 'age' should be of type number, got string"]
        );
    }

    #[test]
    fn test_bounds_enum_and_pattern() {
        let schema = schema(json!({
            "properties": {
                "score": {"type": "number", "minimum": 0, "maximum": 10},
                "code": {"type": "string", "pattern": "^[A-Z]{3}$", "maxLength": 3},
                "tier": {"enum": ["gold", "silver"]}
            }
        }));
        let outcome = validate(
            &json!({"score": 11.5, "code": "abcd", "tier": "bronze"}),
            &schema,
            false,
        );

        let errors = errors_of(&outcome);
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&"Field 'score' must be <= 10".to_string()));
        assert!(errors.contains(&"Field 'code' must be at most 3 characters long".to_string()));
        assert!(errors.contains(&"Field 'code' does not match pattern ^[A-Z]{3}$".to_string()));
        assert!(errors.contains(&"Field 'tier' must be one of: \"gold\", \"silver\"".to_string()));
    }

    #[test]
    fn test_absent_fields_skip_property_checks() {
        let schema = schema(json!({
            "properties": {"nickname": {"type": "string", "minLength": 3}}
        }));
        assert!(validate(&json!({"id": 1}), &schema, false).is_valid());
    }

    #[test]
    fn test_nested_object_errors_are_prefixed() {
        let schema = schema(json!({
            "properties": {
                "address": {
                    "type": "object",
                    "required": ["city"],
                    "properties": {"zip": {"type": "string", "minLength": 5}}
                }
            }
        }));
        let outcome = validate(&json!({"address": {"zip": "123"}}), &schema, false);

        assert_eq!(
            errors_of(&outcome),
            vec![
                "In address: Missing required field: city",
                "In address: Field 'zip' must be at least 5 characters long"
            ]
        );
    }

    #[test]
    fn test_array_items_are_validated() {
        let schema = schema(json!({
            "properties": {
                "tags": {"type": "array", "minItems": 1, "maxItems": 2, "items": {"type": "string"}},
                "lines": {
                    "type": "array",
                    "items": {"type": "object", "required": ["sku"], "properties": {"qty": {"type": "number", "minimum": 1}}}
                }
            }
        }));
        let record = json!({
            "tags": ["a", 2, "c"],
            "lines": [{"sku": "X", "qty": 1}, {"qty": 0}]
        });

        let errors = errors_of(&validate(&record, &schema, false));

        assert!(errors.contains(&"Field 'tags' must have at most 2 items".to_string()));
        assert!(errors.contains(&"Field 'tags[1]' should be of type string, got number".to_string()));
        assert!(errors.contains(&"In lines[1]: Missing required field: sku".to_string()));
        assert!(errors.contains(&"In lines[1]: Field 'qty' must be >= 1".to_string()));
        assert_eq!(errors.len(), 4);
    }

    #[test]
    fn test_batch_partitions_and_preserves_order() {
        let schema = schema(json!({"required": ["id", "name"]}));
        let input = json!([{"id": 1, "name": "x"}, {"id": 2}, {"id": 3, "name": "z"}]);

        let outcome = validate(&input, &schema, true);

        match &outcome {
            ValidationOutcome::Batch {
                is_valid,
                valid_items,
                invalid_items,
                invalid_count,
                data,
            } => {
                assert!(!is_valid);
                assert_eq!(*invalid_count, 1);
                assert_eq!(valid_items, &vec![json!({"id": 1, "name": "x"}), json!({"id": 3, "name": "z"})]);
                assert_eq!(
                    invalid_items,
                    &vec![InvalidItem {
                        item: json!({"id": 2}),
                        index: 1,
                        errors: vec!["Missing required field: name".to_string()],
                    }]
                );
                assert_eq!(data, &json!([{"id": 1, "name": "x"}, {"id": 3, "name": "z"}]));
            }
            ValidationOutcome::Single { .. } => panic!("expected batch outcome"),
        }
    }

    #[test]
    fn test_batch_without_removal_returns_original() {
        let schema = schema(json!({"required": ["id"]}));
        let input = json!([{"id": 1}, {}, "oops"]);

        let outcome = validate(&input, &schema, false);

        assert_eq!(outcome.problem_count(), 2);
        assert_eq!(outcome.data(), &input);
    }

    #[test]
    fn test_invalid_pattern_is_reported_not_raised() {
        let schema = schema(json!({"properties": {"code": {"type": "string", "pattern": "(unclosed"}}}));
        let outcome = validate(&json!({"code": "abc"}), &schema, false);

        assert!(!outcome.is_valid());
        let errors = errors_of(&outcome);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].starts_with("Validation error: Invalid pattern for field 'code'"));
    }

    #[test]
    fn test_enum_matches_numbers_by_value() {
        let schema = schema(json!({
            "properties": {
                "level": {"type": "number", "enum": [1, 2]},
                "point": {"enum": [[0, 1.5], {"x": 2}]}
            }
        }));
        let record: Value = serde_json::from_str(r#"{"level": 1.0, "point": [0.0, 1.5]}"#).unwrap();
        assert!(validate(&record, &schema, false).is_valid());

        let nested: Value = serde_json::from_str(r#"{"level": 2, "point": {"x": 2.0}}"#).unwrap();
        assert!(validate(&nested, &schema, false).is_valid());

        let outcome = validate(&json!({"level": 1.5}), &schema, false);
        assert_eq!(errors_of(&outcome), vec!["Field 'level' must be one of: 1, 2"]);
    }

    #[test]
    fn test_pattern_is_applied_to_every_item_of_a_batch() {
        let schema = schema(json!({"properties": {"sku": {"type": "string", "pattern": "^SKU-\\d+$"}}}));
        let input = json!([{"sku": "SKU-1"}, {"sku": "bad"}, {"sku": "SKU-22"}, {"sku": "SKU-"}]);

        let outcome = validate(&input, &schema, true);

        assert_eq!(outcome.problem_count(), 2);
        assert_eq!(outcome.data(), &json!([{"sku": "SKU-1"}, {"sku": "SKU-22"}]));
    }

    #[test]
    fn test_non_object_item() {
        let schema = schema(json!({"required": ["id"]}));
        let outcome = validate(&json!(42), &schema, false);
        assert_eq!(errors_of(&outcome), vec!["Expected an object, got number"]);
    }

    #[test]
    fn test_validation_serializes_camel_case() {
        let schema = schema(json!({"required": ["id"]}));
        let outcome = validate(&json!([{"id": 1}, {}]), &schema, true);
        let serialized = serde_json::to_value(&outcome).unwrap();

        assert_eq!(serialized["isValid"], false);
        assert_eq!(serialized["invalidCount"], 1);
        assert_eq!(serialized["invalidItems"][0]["index"], 1);
        assert_eq!(serialized["validItems"], json!([{"id": 1}]));
    }
}
