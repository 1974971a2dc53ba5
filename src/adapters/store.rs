use crate::domain::model::PersistedRecord;
use crate::domain::ports::{RecordStore, Storage};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// 以本機目錄為根的檔案存取
#[derive(Debug, Clone)]
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for LocalStorage {
    async fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let full_path = self.base_path.join(path);
        let data = tokio::fs::read(full_path).await?;
        Ok(data)
    }

    async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
        let full_path = self.base_path.join(path);

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(full_path, data).await?;
        Ok(())
    }
}

fn assign_id(record: &mut PersistedRecord) -> String {
    let id = record
        .id
        .clone()
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    record.id = Some(id.clone());
    record.updated_at = Utc::now();
    id
}

/// 每筆紀錄一個 `<id>.json` 檔
#[derive(Debug, Clone)]
pub struct JsonFileRecordStore {
    dir: PathBuf,
}

impl JsonFileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn record_path(&self, id: &str) -> Result<PathBuf> {
        let safe = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(EtlError::ValidationError {
                message: format!("Invalid record id: {}", id),
            });
        }
        Ok(self.dir.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl RecordStore for JsonFileRecordStore {
    async fn save(&self, mut record: PersistedRecord) -> Result<String> {
        let id = assign_id(&mut record);
        let path = self.record_path(&id)?;

        tokio::fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_vec_pretty(&record)?;
        tokio::fs::write(&path, json).await?;

        tracing::debug!("Saved record {} to {}", id, path.display());
        Ok(id)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PersistedRecord>> {
        let path = match self.record_path(id) {
            Ok(path) => path,
            Err(_) => return Ok(None),
        };

        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<Mutex<HashMap<String, PersistedRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn save(&self, mut record: PersistedRecord) -> Result<String> {
        let id = assign_id(&mut record);
        self.records.lock().await.insert(id.clone(), record);
        Ok(id)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<PersistedRecord>> {
        Ok(self.records.lock().await.get(id).cloned())
    }
}
