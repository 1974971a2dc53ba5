use crate::config::app_config::FileFormat;
use crate::domain::model::Record;
use crate::domain::ports::{Extractor, RecordStore, Storage};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// 從 HTTP API 取得 JSON 資料
pub struct ApiExtractor {
    endpoint: String,
    headers: HashMap<String, String>,
    query: HashMap<String, String>,
    records_path: Option<String>,
    timeout: Duration,
    client: Client,
}

impl ApiExtractor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            headers: HashMap::new(),
            query: HashMap::new(),
            records_path: None,
            timeout: Duration::from_secs(30),
            client: Client::new(),
        }
    }

    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_query(mut self, query: HashMap<String, String>) -> Self {
        self.query = query;
        self
    }

    /// 以點號路徑指定回應中的資料位置，例如 `data.items`
    pub fn with_records_path(mut self, path: impl Into<String>) -> Self {
        self.records_path = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Extractor for ApiExtractor {
    async fn extract(&self) -> Result<Record> {
        tracing::debug!("Making API request to: {}", self.endpoint);

        let mut request = self.client.get(&self.endpoint).timeout(self.timeout);
        for (key, value) in &self.headers {
            request = request.header(key, value);
        }
        if !self.query.is_empty() {
            request = request.query(&self.query);
        }

        let response = request.send().await?;
        tracing::debug!("API response status: {}", response.status());
        let body: Value = response.error_for_status()?.json().await?;

        match &self.records_path {
            Some(path) => select_path(body, path),
            None => Ok(body),
        }
    }

    fn source_name(&self) -> &str {
        &self.endpoint
    }
}

fn select_path(body: Value, path: &str) -> Result<Value> {
    let mut current = body;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            Value::Object(mut map) => map.remove(segment),
            Value::Array(mut items) => segment
                .parse::<usize>()
                .ok()
                .filter(|index| *index < items.len())
                .map(|index| items.swap_remove(index)),
            _ => None,
        }
        .ok_or_else(|| EtlError::ProcessingError {
            message: format!("Response has no data at '{}'", path),
        })?;
    }
    Ok(current)
}

/// 透過 Storage 讀取 JSON 或 CSV 檔
pub struct FileExtractor<S: Storage> {
    storage: S,
    path: String,
    format: FileFormat,
}

impl<S: Storage> FileExtractor<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self {
            storage,
            path,
            format,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }
}

#[async_trait]
impl<S: Storage> Extractor for FileExtractor<S> {
    async fn extract(&self) -> Result<Record> {
        tracing::debug!("Reading {:?} file: {}", self.format, self.path);
        let bytes = self.storage.read_file(&self.path).await?;

        match self.format {
            FileFormat::Json => Ok(serde_json::from_slice(&bytes)?),
            FileFormat::Csv => parse_csv(&bytes),
        }
    }

    fn source_name(&self) -> &str {
        &self.path
    }
}

/// CSV 每列轉成字串欄位的物件
pub fn parse_csv(bytes: &[u8]) -> Result<Record> {
    let mut reader = csv::Reader::from_reader(bytes);
    let headers = reader.headers()?.clone();

    let mut rows = Vec::new();
    for row in reader.records() {
        let row = row?;
        let object: Map<String, Value> = headers
            .iter()
            .zip(row.iter())
            .map(|(key, value)| (key.to_string(), Value::String(value.to_string())))
            .collect();
        rows.push(Value::Object(object));
    }

    Ok(Value::Array(rows))
}

/// 以既有紀錄的原始資料作為來源
pub struct RecordExtractor {
    store: Arc<dyn RecordStore>,
    record_id: String,
}

impl RecordExtractor {
    pub fn new(store: Arc<dyn RecordStore>, record_id: impl Into<String>) -> Self {
        Self {
            store,
            record_id: record_id.into(),
        }
    }
}

#[async_trait]
impl Extractor for RecordExtractor {
    async fn extract(&self) -> Result<Record> {
        self.store
            .find_by_id(&self.record_id)
            .await?
            .map(|record| record.raw)
            .ok_or_else(|| EtlError::NotFound {
                resource: format!("record {}", self.record_id),
            })
    }

    fn source_name(&self) -> &str {
        &self.record_id
    }
}
