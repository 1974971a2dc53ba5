use crate::config::app_config::FileFormat;
use crate::domain::model::{PersistedRecord, Record};
use crate::domain::ports::{Loader, RecordStore, Storage};
use crate::utils::error::{EtlError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use zip::write::{FileOptions, ZipWriter};

/// 將結果寫成 JSON 或 CSV 檔，可選擇打包成 ZIP
pub struct FileLoader<S: Storage> {
    storage: S,
    path: String,
    format: FileFormat,
    compress: bool,
}

impl<S: Storage> FileLoader<S> {
    pub fn new(storage: S, path: impl Into<String>) -> Self {
        let path = path.into();
        let format = FileFormat::from_path(&path);
        Self {
            storage,
            path,
            format,
            compress: false,
        }
    }

    pub fn with_format(mut self, format: FileFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    fn render(&self, data: &Record) -> Result<Vec<u8>> {
        match self.format {
            FileFormat::Json => Ok(serde_json::to_vec_pretty(data)?),
            FileFormat::Csv => to_csv(data),
        }
    }
}

#[async_trait]
impl<S: Storage> Loader for FileLoader<S> {
    async fn load(&self, data: &Record) -> Result<String> {
        let content = self.render(data)?;

        if !self.compress {
            tracing::debug!("Writing {} bytes to {}", content.len(), self.path);
            self.storage.write_file(&self.path, &content).await?;
            return Ok(self.path.clone());
        }

        let entry_name = Path::new(&self.path)
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("output")
            .to_string();
        let zip_path = format!("{}.zip", self.path);

        let zip_data = {
            let mut zip = ZipWriter::new(std::io::Cursor::new(Vec::new()));
            zip.start_file::<_, ()>(entry_name, FileOptions::default())?;
            zip.write_all(&content)?;
            zip.finish()?.into_inner()
        };

        tracing::debug!("Writing ZIP file ({} bytes) to {}", zip_data.len(), zip_path);
        self.storage.write_file(&zip_path, &zip_data).await?;
        Ok(zip_path)
    }
}

/// 物件陣列轉 CSV；欄位為所有物件鍵的聯集
pub fn to_csv(data: &Record) -> Result<Vec<u8>> {
    let rows: Vec<&Map<String, Value>> = match data {
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::Object(map) => Ok(map),
                other => Err(EtlError::ProcessingError {
                    message: format!("CSV output requires objects, got {}", other),
                }),
            })
            .collect::<Result<_>>()?,
        Value::Object(map) => vec![map],
        other => {
            return Err(EtlError::ProcessingError {
                message: format!("CSV output requires objects, got {}", other),
            })
        }
    };

    let mut headers: Vec<&str> = Vec::new();
    for row in &rows {
        for key in row.keys() {
            if !headers.contains(&key.as_str()) {
                headers.push(key.as_str());
            }
        }
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(&headers)?;
    for row in rows {
        let cells: Vec<String> = headers
            .iter()
            .map(|key| match row.get(*key) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            })
            .collect();
        writer.write_record(&cells)?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::ProcessingError {
            message: format!("Failed to finish CSV output: {}", e),
        })
}

/// 將結果保存為一筆持久化紀錄
pub struct RecordLoader {
    store: Arc<dyn RecordStore>,
    source: String,
}

impl RecordLoader {
    pub fn new(store: Arc<dyn RecordStore>, source: impl Into<String>) -> Self {
        Self {
            store,
            source: source.into(),
        }
    }
}

#[async_trait]
impl Loader for RecordLoader {
    async fn load(&self, data: &Record) -> Result<String> {
        let record = PersistedRecord::new(data.clone())
            .with_transformed(data.clone())
            .with_metadata("source", Value::String(self.source.clone()));
        let id = self.store.save(record).await?;
        Ok(format!("record:{}", id))
    }
}

/// 依序寫入多個輸出，回傳以逗號分隔的位置
pub struct MultiLoader {
    loaders: Vec<Box<dyn Loader>>,
}

impl MultiLoader {
    pub fn new(loaders: Vec<Box<dyn Loader>>) -> Self {
        Self { loaders }
    }
}

#[async_trait]
impl Loader for MultiLoader {
    async fn load(&self, data: &Record) -> Result<String> {
        let mut locations = Vec::with_capacity(self.loaders.len());
        for loader in &self.loaders {
            locations.push(loader.load(data).await?);
        }
        Ok(locations.join(", "))
    }
}
