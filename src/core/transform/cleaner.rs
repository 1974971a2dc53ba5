use crate::config::transform::{CleanOptions, DateFormat, TextOptions};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

const DATETIME_LAYOUTS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_LAYOUTS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

fn special_chars() -> &'static Regex {
    static SPECIAL_CHARS: OnceLock<Regex> = OnceLock::new();
    SPECIAL_CHARS.get_or_init(|| Regex::new(r"[^\w\s]").expect("special character pattern is valid"))
}

/// 清理資料：移除空值 → 日期標準化 → 文字清理，輸入不會被修改
pub fn clean(data: &Value, options: &CleanOptions) -> Value {
    let mut cleaned = if options.remove_empty {
        remove_empty(data.clone())
    } else {
        data.clone()
    };

    if !options.date_fields.is_empty() {
        normalize_dates(&mut cleaned, &options.date_fields, options.date_format);
    }

    let text = &options.text_options;
    if !options.text_fields.is_empty() && (text.trim || text.lowercase || text.remove_special_chars) {
        clean_text_fields(&mut cleaned, &options.text_fields, text);
        // 文字清理可能產生空字串，再掃一次以維持冪等
        if options.remove_empty {
            cleaned = remove_empty(cleaned);
        }
    }

    cleaned
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// 先遞迴處理子結構，再移除本層的 null 與空字串；空容器保留
pub fn remove_empty(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(key, child)| (key, remove_empty(child)))
                .filter(|(_, child)| !is_empty_value(child))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(remove_empty)
                .filter(|item| !item.is_null())
                .collect(),
        ),
        other => other,
    }
}

pub fn normalize_dates(value: &mut Value, fields: &[String], format: DateFormat) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if !child.is_null() && fields.iter().any(|f| f == key) {
                    if let Some(parsed) = parse_date(child) {
                        *child = Value::String(format_date(&parsed, format));
                        continue;
                    }
                    tracing::trace!("Field '{}' is not a recognizable date, left unchanged", key);
                }
                normalize_dates(child, fields, format);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                normalize_dates(item, fields, format);
            }
        }
        _ => {}
    }
}

/// 字串依常見格式解析，無時區者視為 UTC；數字視為 epoch 毫秒
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => {
            let millis = n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?;
            DateTime::from_timestamp_millis(millis)
        }
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for layout in DATETIME_LAYOUTS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, layout) {
            return Some(naive.and_utc());
        }
    }

    DATE_LAYOUTS.iter().find_map(|layout| {
        NaiveDate::parse_from_str(s, layout)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

pub fn format_date(date: &DateTime<Utc>, format: DateFormat) -> String {
    match format {
        DateFormat::Iso => date.to_rfc3339_opts(SecondsFormat::Millis, true),
        DateFormat::DateOnly => date.format("%Y-%m-%d").to_string(),
    }
}

pub fn clean_text_fields(value: &mut Value, fields: &[String], options: &TextOptions) {
    match value {
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                if let Value::String(text) = child {
                    if fields.iter().any(|f| f == key) {
                        *text = clean_text(text, options);
                    }
                    continue;
                }
                clean_text_fields(child, fields, options);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                clean_text_fields(item, fields, options);
            }
        }
        _ => {}
    }
}

pub fn clean_text(text: &str, options: &TextOptions) -> String {
    let mut result = if options.trim {
        text.trim().to_string()
    } else {
        text.to_string()
    };

    if options.lowercase {
        result = result.to_lowercase();
    }

    if options.remove_special_chars {
        result = special_chars().replace_all(&result, "").into_owned();
        // 移除符號後可能留下首尾空白
        if options.trim {
            result = result.trim().to_string();
        }
    }

    result
}
