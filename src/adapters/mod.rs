// 對外部系統的具體實作：HTTP/檔案來源、輸出、文字生成服務、紀錄儲存

pub mod extract;
pub mod llm;
pub mod load;
pub mod store;

pub use extract::{ApiExtractor, FileExtractor, RecordExtractor};
pub use llm::{build_generator, OllamaClient, OpenAiClient};
pub use load::{FileLoader, MultiLoader, RecordLoader};
pub use store::{InMemoryRecordStore, JsonFileRecordStore, LocalStorage};
