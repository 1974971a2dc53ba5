use thiserror::Error;

/// 文字生成服務的錯誤，一律在單筆記錄層級被攔截
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GenerationError {
    #[error("Failed to connect to generation service: {0}")]
    Connection(String),

    #[error("Generation request timed out after {0} ms")]
    Timeout(u64),

    #[error("Generation service returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rate limited by generation service")]
    RateLimited,

    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::Connection(_) | GenerationError::Timeout(_) | GenerationError::RateLimited
        )
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Generation error: {0}")]
    GenerationError(#[from] GenerationError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Transformation '{stage}' failed: {details}")]
    TransformationError { stage: String, details: String },

    #[error("Not found: {resource}")]
    NotFound { resource: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::ApiError(_) | EtlError::GenerationError(_) => ErrorCategory::Network,
            EtlError::ZipError(_) | EtlError::IoError(_) | EtlError::NotFound { .. } => {
                ErrorCategory::Storage
            }
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::TransformationError { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            EtlError::ValidationError { .. } => ErrorSeverity::Low,
            EtlError::ApiError(_) | EtlError::GenerationError(_) => ErrorSeverity::Medium,
            EtlError::IoError(_) | EtlError::ZipError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    /// 對應到 HTTP 狀態碼，供回應結構使用
    pub fn status_code(&self) -> u16 {
        match self {
            EtlError::NotFound { .. } => 404,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::ValidationError { .. } => 400,
            EtlError::ApiError(_) | EtlError::GenerationError(_) => 502,
            _ => 500,
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::MissingConfigError { field } => {
                format!("Configuration is missing the required field '{}'", field)
            }
            EtlError::InvalidConfigValueError { field, reason, .. } => {
                format!("Configuration field '{}' is invalid: {}", field, reason)
            }
            EtlError::ApiError(e) if e.is_timeout() => {
                "The data source did not respond in time".to_string()
            }
            EtlError::GenerationError(e) => format!("The text generation service failed: {}", e),
            EtlError::NotFound { resource } => format!("Could not find {}", resource),
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the pipeline configuration file and environment variables",
            ErrorCategory::Network => "Check network connectivity and the service endpoint, then retry",
            ErrorCategory::Data => "Inspect the input data and the transformation options",
            ErrorCategory::Storage => "Check that the storage path exists and is writable",
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_error_display() {
        let err = GenerationError::Timeout(1500);
        assert_eq!(err.to_string(), "Generation request timed out after 1500 ms");

        let err = GenerationError::Http {
            status: 503,
            body: "overloaded".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Generation service returned HTTP 503: overloaded"
        );
    }

    #[test]
    fn test_generation_error_retryable() {
        assert!(GenerationError::Timeout(10).is_retryable());
        assert!(GenerationError::RateLimited.is_retryable());
        assert!(!GenerationError::InvalidResponse("bad".to_string()).is_retryable());
    }

    #[test]
    fn test_status_codes() {
        let missing = EtlError::MissingConfigError {
            field: "instruction".to_string(),
        };
        assert_eq!(missing.status_code(), 400);
        assert_eq!(missing.category(), ErrorCategory::Configuration);

        let not_found = EtlError::NotFound {
            resource: "record abc".to_string(),
        };
        assert_eq!(not_found.status_code(), 404);

        let generation: EtlError = GenerationError::Connection("refused".to_string()).into();
        assert_eq!(generation.status_code(), 502);
        assert_eq!(generation.severity(), ErrorSeverity::Medium);
    }
}
