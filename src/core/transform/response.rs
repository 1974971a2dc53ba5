use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

fn fenced_block() -> &'static Regex {
    static FENCED: OnceLock<Regex> = OnceLock::new();
    FENCED.get_or_init(|| {
        Regex::new(r"```(?:json|JSON)?[ \t]*\r?\n?([\s\S]*?)```").expect("fenced block pattern is valid")
    })
}

/// 取出回應中的程式碼區塊內容，沒有區塊就用整段文字
pub fn extract_payload(text: &str) -> &str {
    fenced_block()
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| text.trim())
}

pub fn parse_json(text: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(extract_payload(text))
}

/// 只接受 JSON 物件；其他型別視為無法解析
pub fn parse_object(text: &str) -> Option<serde_json::Map<String, Value>> {
    match parse_json(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
