use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 管道中流動的資料單位：任意巢狀的 JSON 值
pub type Record = serde_json::Value;

/// 呼叫文字生成服務時的參數，未設定者使用 client 預設值
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Pending,
    Processed,
    Failed,
}

/// 持久化的管道執行紀錄
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedRecord {
    #[serde(default)]
    pub id: Option<String>,
    pub raw: Record,
    #[serde(default)]
    pub transformed: Option<Record>,
    pub status: RecordStatus,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PersistedRecord {
    pub fn new(raw: Record) -> Self {
        let now = Utc::now();
        Self {
            id: None,
            raw,
            transformed: None,
            status: RecordStatus::Pending,
            metadata: serde_json::Map::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_transformed(mut self, transformed: Record) -> Self {
        self.transformed = Some(transformed);
        self.status = RecordStatus::Processed;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_status(mut self, status: RecordStatus) -> Self {
        self.status = status;
        self.updated_at = Utc::now();
        self
    }

    pub fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}
