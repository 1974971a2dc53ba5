use crate::domain::model::{GenerationOptions, PersistedRecord, Record};
use crate::utils::error::{GenerationError, Result};
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// 文字生成能力：prompt 進、文字出，可能失敗或逾時
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GenerationError>;

    fn model_name(&self) -> &str;
}

/// 管道紀錄的持久化能力
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: PersistedRecord) -> Result<String>;
    async fn find_by_id(&self, id: &str) -> Result<Option<PersistedRecord>>;
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self) -> Result<Record>;

    fn source_name(&self) -> &str;
}

#[async_trait]
pub trait Loader: Send + Sync {
    /// 寫入資料並回傳輸出位置
    async fn load(&self, data: &Record) -> Result<String>;
}
