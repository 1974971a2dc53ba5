use crate::config::transform::{TransformStep, TransformationConfig};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_non_empty_string, validate_path, validate_positive_number, validate_range,
    validate_url, Validate,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub pipeline: PipelineInfo,
    #[serde(default)]
    pub generation: Option<GenerationConfig>,
    pub source: SourceConfig,
    #[serde(default)]
    pub transformations: TransformationConfig,
    pub load: LoadConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub options: RunOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationProvider {
    OpenAi,
    Ollama,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub provider: GenerationProvider,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    #[default]
    Json,
    Csv,
}

impl FileFormat {
    /// 依副檔名判斷，無法判斷時視為 JSON
    pub fn from_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("csv") => FileFormat::Csv,
            _ => FileFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Api {
        endpoint: String,
        #[serde(default)]
        headers: HashMap<String, String>,
        #[serde(default)]
        parameters: HashMap<String, String>,
        records_path: Option<String>,
        timeout_seconds: Option<u64>,
    },
    File {
        path: String,
        format: Option<FileFormat>,
    },
    Record {
        record_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LoadConfig {
    File {
        path: String,
        format: Option<FileFormat>,
        #[serde(default)]
        compress: bool,
    },
    Record,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_records_dir")]
    pub records_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_path: default_base_path(),
            records_dir: default_records_dir(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunOptions {
    #[serde(default)]
    pub save_to_db: bool,
}

fn default_base_path() -> String {
    ".".to_string()
}

fn default_records_dir() -> String {
    "./records".to_string()
}

impl AppConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 需要文字生成服務的步驟
    pub fn generation_steps(&self) -> Vec<TransformStep> {
        self.transformations
            .requested_steps()
            .into_iter()
            .filter(|step| {
                matches!(
                    step,
                    TransformStep::Enrich | TransformStep::Summarize | TransformStep::Categorize
                )
            })
            .collect()
    }
}

/// 替換環境變數 (例如 ${API_KEY})，未設定的變數保留原樣
pub fn substitute_env_vars(content: &str) -> Result<String> {
    let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| EtlError::ConfigError {
        message: format!("Invalid substitution pattern: {}", e),
    })?;

    let result = re.replace_all(content, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
    });

    Ok(result.into_owned())
}

impl Validate for GenerationConfig {
    fn validate(&self) -> Result<()> {
        validate_url("generation.endpoint", &self.endpoint)?;
        validate_non_empty_string("generation.model", &self.model)?;
        if let Some(temperature) = self.temperature {
            validate_range("generation.temperature", temperature, 0.0, 2.0)?;
        }
        if let Some(timeout) = self.timeout_seconds {
            validate_positive_number("generation.timeout_seconds", timeout as usize, 1)?;
        }
        Ok(())
    }
}

impl Validate for SourceConfig {
    fn validate(&self) -> Result<()> {
        match self {
            SourceConfig::Api { endpoint, .. } => validate_url("source.endpoint", endpoint),
            SourceConfig::File { path, .. } => validate_path("source.path", path),
            SourceConfig::Record { record_id } => {
                validate_non_empty_string("source.record_id", record_id)
            }
        }
    }
}

impl Validate for LoadConfig {
    fn validate(&self) -> Result<()> {
        match self {
            LoadConfig::File { path, .. } => validate_path("load.path", path),
            LoadConfig::Record => Ok(()),
        }
    }
}

impl Validate for AppConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string("pipeline.name", &self.pipeline.name)?;
        self.source.validate()?;
        self.load.validate()?;
        validate_path("storage.base_path", &self.storage.base_path)?;

        match &self.generation {
            Some(generation) => generation.validate()?,
            None => {
                let steps = self.generation_steps();
                if let Some(step) = steps.first() {
                    return Err(EtlError::ConfigValidationError {
                        field: "generation".to_string(),
                        message: format!("Step '{}' needs a [generation] section", step),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const BASIC: &str = r#"
[pipeline]
name = "articles"

[source]
type = "api"
endpoint = "https://api.example.com/articles"
records_path = "data"

[source.headers]
Accept = "application/json"

[transformations.clean]
removeEmpty = true
textFields = ["title"]
textOptions = { trim = true }

[transformations.validate]
removeInvalid = true
schema = { required = ["title"] }

[load]
type = "file"
path = "out/articles.csv"
compress = true
"#;

    #[test]
    fn test_parse_basic_config() {
        let config = AppConfig::from_toml_str(BASIC).unwrap();

        assert_eq!(config.pipeline.name, "articles");
        assert!(matches!(
            &config.source,
            SourceConfig::Api { endpoint, headers, records_path, .. }
                if endpoint == "https://api.example.com/articles"
                    && headers["Accept"] == "application/json"
                    && records_path.as_deref() == Some("data")
        ));
        assert_eq!(
            config.transformations.requested_steps(),
            vec![TransformStep::Clean, TransformStep::Validate]
        );
        assert_eq!(
            config.load,
            LoadConfig::File {
                path: "out/articles.csv".to_string(),
                format: None,
                compress: true
            }
        );
        assert_eq!(config.storage, StorageConfig::default());
        assert!(!config.options.save_to_db);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("AI_ETL_TEST_API_KEY", "sk-from-env");

        let content = r#"
[pipeline]
name = "env"

[generation]
provider = "openai"
endpoint = "https://api.openai.com/v1"
api_key = "${AI_ETL_TEST_API_KEY}"
model = "gpt-4o-mini"

[source]
type = "record"
record_id = "abc"

[load]
type = "record"
"#;

        let config = AppConfig::from_toml_str(content).unwrap();
        let generation = config.generation.unwrap();
        assert_eq!(generation.provider, GenerationProvider::OpenAi);
        assert_eq!(generation.api_key.as_deref(), Some("sk-from-env"));

        std::env::remove_var("AI_ETL_TEST_API_KEY");
    }

    #[test]
    fn test_unset_variables_are_kept() {
        let result = substitute_env_vars("key = \"${AI_ETL_DEFINITELY_UNSET}\"").unwrap();
        assert_eq!(result, "key = \"${AI_ETL_DEFINITELY_UNSET}\"");
    }

    #[test]
    fn test_generation_steps_require_generation_section() {
        let content = r#"
[pipeline]
name = "needs-llm"

[source]
type = "file"
path = "input.json"

[transformations.categorize]
categories = ["Tech"]
textField = "body"

[load]
type = "file"
path = "out.json"
"#;

        let config = AppConfig::from_toml_str(content).unwrap();
        assert_eq!(config.generation_steps(), vec![TransformStep::Categorize]);

        let error = config.validate().unwrap_err();
        assert!(matches!(error, EtlError::ConfigValidationError { ref field, .. } if field == "generation"));
    }

    #[test]
    fn test_invalid_values_fail_validation() {
        let bad_url = BASIC.replace("https://api.example.com/articles", "invalid-url");
        let config = AppConfig::from_toml_str(&bad_url).unwrap();
        assert!(config.validate().is_err());

        let bad_temperature = r#"
[pipeline]
name = "t"

[generation]
provider = "ollama"
endpoint = "http://localhost:11434"
model = "llama3"
temperature = 3.5

[source]
type = "file"
path = "in.json"

[load]
type = "record"
"#;
        let config = AppConfig::from_toml_str(bad_temperature).unwrap();
        assert!(matches!(
            config.validate(),
            Err(EtlError::InvalidConfigValueError { ref field, .. }) if field == "generation.temperature"
        ));
    }

    #[test]
    fn test_unknown_source_type_is_parse_error() {
        let content = BASIC.replace("type = \"api\"", "type = \"ftp\"");
        let result = AppConfig::from_toml_str(&content);

        assert!(matches!(result, Err(EtlError::ConfigValidationError { ref field, .. }) if field == "toml_parsing"));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(BASIC.as_bytes()).unwrap();

        let config = AppConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.pipeline.name, "articles");
    }

    #[test]
    fn test_example_config_is_valid() {
        let config = AppConfig::from_toml_str(include_str!("../../ai-etl.example.toml")).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(
            config.generation_steps(),
            vec![TransformStep::Summarize, TransformStep::Categorize]
        );
    }

    #[test]
    fn test_file_format_from_path() {
        assert_eq!(FileFormat::from_path("data/people.CSV"), FileFormat::Csv);
        assert_eq!(FileFormat::from_path("data/people.json"), FileFormat::Json);
        assert_eq!(FileFormat::from_path("noext"), FileFormat::Json);
    }
}
