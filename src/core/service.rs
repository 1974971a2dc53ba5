use crate::config::transform::TransformationConfig;
use crate::core::transform::{StepReport, TransformOutput, TransformPipeline};
use crate::core::{PersistedRecord, Record, RecordStatus, RecordStore};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default)]
    pub save_to_db: bool,
}

/// 一次轉換請求：內嵌資料或既有紀錄 id 擇一
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(default)]
    pub transformations: TransformationConfig,
    #[serde(default)]
    pub options: RequestOptions,
}

impl PipelineRequest {
    pub fn with_data(data: Record, transformations: TransformationConfig) -> Self {
        Self {
            data: Some(data),
            transformations,
            ..Default::default()
        }
    }

    pub fn with_record_id(record_id: impl Into<String>, transformations: TransformationConfig) -> Self {
        Self {
            record_id: Some(record_id.into()),
            transformations,
            ..Default::default()
        }
    }

    pub fn save_to_db(mut self, save: bool) -> Self {
        self.options.save_to_db = save;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub message: String,
    pub status: u16,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSuccess {
    pub success: bool,
    pub data: Record,
    pub transformations: StepReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineFailure {
    pub success: bool,
    pub error: ErrorBody,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PipelineResponse {
    Success(PipelineSuccess),
    Failure(PipelineFailure),
}

impl PipelineResponse {
    pub fn failure(error: &EtlError) -> Self {
        PipelineResponse::Failure(PipelineFailure {
            success: false,
            error: ErrorBody {
                message: error.to_string(),
                status: error.status_code(),
                timestamp: Utc::now(),
            },
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, PipelineResponse::Success(_))
    }

    pub fn status(&self) -> u16 {
        match self {
            PipelineResponse::Success(_) => 200,
            PipelineResponse::Failure(failure) => failure.error.status,
        }
    }
}

/// 對外的轉換服務：解析請求資料、執行管道、選擇性保存結果
#[derive(Clone)]
pub struct TransformService {
    pipeline: TransformPipeline,
    store: Option<Arc<dyn RecordStore>>,
}

impl TransformService {
    pub fn new(pipeline: TransformPipeline) -> Self {
        Self {
            pipeline,
            store: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub async fn handle(&self, request: PipelineRequest) -> PipelineResponse {
        let source = match self.resolve_data(&request).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("❌ Rejected pipeline request: {}", e);
                return PipelineResponse::failure(&e);
            }
        };

        let output = self.pipeline.run(&source, &request.transformations).await;

        let mut record_id = None;
        let mut warning = None;
        if request.options.save_to_db {
            match self.persist(&request, source, &output).await {
                Ok(id) => record_id = Some(id),
                Err(e) => {
                    tracing::warn!("⚠️ Transform succeeded but the result was not saved: {}", e);
                    warning = Some(format!("Result was not saved: {}", e));
                }
            }
        }

        PipelineResponse::Success(PipelineSuccess {
            success: true,
            data: output.data,
            transformations: output.transformations,
            record_id,
            warning,
        })
    }

    async fn resolve_data(&self, request: &PipelineRequest) -> Result<Record> {
        if let Some(data) = request.data.as_ref().filter(|data| !data.is_null()) {
            return Ok(data.clone());
        }

        let Some(record_id) = request.record_id.as_deref() else {
            return Err(EtlError::ValidationError {
                message: "Either data or recordId must be provided".to_string(),
            });
        };

        let store = self.store()?;
        tracing::debug!("Loading source data from record {}", record_id);
        match store.find_by_id(record_id).await? {
            Some(record) => Ok(record.raw),
            None => Err(EtlError::NotFound {
                resource: format!("record {}", record_id),
            }),
        }
    }

    async fn persist(
        &self,
        request: &PipelineRequest,
        raw: Record,
        output: &TransformOutput,
    ) -> Result<String> {
        let store = self.store()?;
        let mut record = PersistedRecord::new(raw)
            .with_transformed(output.data.clone())
            .with_metadata("transformations", serde_json::to_value(&output.transformations)?);
        let failed_steps = output.failed_steps();
        if !failed_steps.is_empty() {
            record = record
                .with_status(RecordStatus::Failed)
                .with_metadata("failedSteps", serde_json::to_value(&failed_steps)?);
        }
        if let Some(source_id) = &request.record_id {
            record = record.with_metadata("sourceRecordId", Value::String(source_id.clone()));
        }

        let id = store.save(record).await?;
        tracing::info!("💾 Saved pipeline result as record {}", id);
        Ok(id)
    }

    fn store(&self) -> Result<&Arc<dyn RecordStore>> {
        self.store.as_ref().ok_or_else(|| EtlError::ConfigError {
            message: "No record store configured".to_string(),
        })
    }
}
