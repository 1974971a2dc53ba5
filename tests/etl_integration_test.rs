use ai_etl::adapters::llm::OllamaClient;
use ai_etl::adapters::store::JsonFileRecordStore;
use ai_etl::domain::model::{GenerationOptions, PersistedRecord};
use ai_etl::domain::ports::RecordStore;
use ai_etl::{
    AppConfig, EtlApp, Enricher, PipelineRequest, PipelineResponse, TransformPipeline,
    TransformService, TransformStep, TransformationConfig,
};
use httpmock::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_end_to_end_api_to_csv_with_enrichment() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start();
    let source_mock = server.mock(|when, then| {
        when.method(GET).path("/articles");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(json!({"data": [
                {"id": 1, "title": "  GPU prices fall ", "note": ""},
                {"id": 2, "title": "Sleep and health", "note": null}
            ]}));
    });
    let generation_mock = server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .json_body(json!({"response": "```json\n{\"language\": \"en\"}\n```", "done": true}));
    });

    let config_toml = format!(
        r#"
[pipeline]
name = "articles"

[generation]
provider = "ollama"
endpoint = "{endpoint}"
model = "llama3"

[source]
type = "api"
endpoint = "{endpoint}/articles"
records_path = "data"

[transformations.clean]
textFields = ["title"]
textOptions = {{ trim = true }}

[transformations.enrich]
instruction = "Detect the language of the title"
fields = ["title"]

[load]
type = "file"
path = "output/articles.csv"

[storage]
base_path = "{base}"
"#,
        endpoint = server.base_url(),
        base = temp_dir.path().display()
    );

    let app = EtlApp::from_config(AppConfig::from_toml_str(&config_toml).unwrap()).unwrap();
    let summary = app.run().await.unwrap();

    source_mock.assert();
    generation_mock.assert_hits(2);
    assert_eq!(summary.extracted_count, 2);
    assert_eq!(summary.loaded_count, 2);
    assert!(summary.failed_steps.is_empty());

    let csv = std::fs::read_to_string(temp_dir.path().join("output/articles.csv")).unwrap();
    assert_eq!(
        csv,
        "id,language,title\n1,en,GPU prices fall\n2,en,Sleep and health\n"
    );
}

#[tokio::test]
async fn test_generation_outage_keeps_records_and_reports_failures() {
    let temp_dir = TempDir::new().unwrap();
    std::fs::write(
        temp_dir.path().join("posts.json"),
        r#"[{"body": "Rust 2024 edition released"}, {"body": "Marathon training tips"}]"#,
    )
    .unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(503).body("model loading");
    });

    let config_toml = format!(
        r#"
[pipeline]
name = "posts"

[generation]
provider = "ollama"
endpoint = "{endpoint}"
model = "llama3"

[source]
type = "file"
path = "posts.json"

[transformations.categorize]
categories = ["Tech", "Sport"]
textField = "body"

[load]
type = "file"
path = "posts.out.json"

[storage]
base_path = "{base}"
"#,
        endpoint = server.base_url(),
        base = temp_dir.path().display()
    );

    let app = EtlApp::from_config(AppConfig::from_toml_str(&config_toml).unwrap()).unwrap();
    let summary = app.run().await.unwrap();

    let report = &summary.transformations[&TransformStep::Categorize];
    assert!(report.applied);
    assert_eq!(report.details["failedCount"], 2);

    let written: Value =
        serde_json::from_slice(&std::fs::read(temp_dir.path().join("posts.out.json")).unwrap()).unwrap();
    assert_eq!(
        written,
        json!([{"body": "Rust 2024 edition released"}, {"body": "Marathon training tips"}])
    );
}

#[tokio::test]
async fn test_service_transforms_stored_record_and_saves_result() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileRecordStore::new(temp_dir.path()));
    let source_id = store
        .save(PersistedRecord::new(json!({"review": "Battery lasts two days", "stars": ""})))
        .await
        .unwrap();

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/generate");
        then.status(200)
            .json_body(json!({"response": "{\"sentiment\": \"positive\"}"}));
    });

    let generator = Arc::new(OllamaClient::new(server.base_url(), "llama3"));
    let pipeline = TransformPipeline::new()
        .with_enricher(Enricher::new(generator, GenerationOptions::default()));
    let service = TransformService::new(pipeline).with_store(store.clone());

    let transformations: TransformationConfig = serde_json::from_value(json!({
        "clean": true,
        "enrich": {"instruction": "Classify the sentiment"}
    }))
    .unwrap();
    let response = service
        .handle(PipelineRequest::with_record_id(source_id, transformations).save_to_db(true))
        .await;

    let PipelineResponse::Success(success) = response else {
        panic!("expected a successful response");
    };
    assert_eq!(
        success.data,
        json!({"review": "Battery lasts two days", "sentiment": "positive"})
    );

    let saved = store
        .find_by_id(&success.record_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(saved.transformed, Some(success.data));
    assert_eq!(saved.metadata["transformations"]["enrich"]["failedCount"], 0);
}

#[tokio::test]
async fn test_service_unknown_record_is_404() {
    let temp_dir = TempDir::new().unwrap();
    let service = TransformService::new(TransformPipeline::new())
        .with_store(Arc::new(JsonFileRecordStore::new(temp_dir.path())));

    let response = service
        .handle(PipelineRequest::with_record_id("0000", TransformationConfig::new()))
        .await;

    assert_eq!(response.status(), 404);
    let body = serde_json::to_value(&response).unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["status"], 404);
}
