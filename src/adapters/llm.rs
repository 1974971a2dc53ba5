use crate::config::app_config::{GenerationConfig, GenerationProvider};
use crate::domain::model::GenerationOptions;
use crate::domain::ports::TextGenerator;
use crate::utils::error::{GenerationError, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// 秒數轉毫秒，極大值維持在 u64 上限
fn timeout_ms(timeout_seconds: Option<u64>) -> u64 {
    timeout_seconds
        .map(|seconds| seconds.saturating_mul(1000))
        .unwrap_or(DEFAULT_TIMEOUT_MS)
}

/// 依設定建立對應的文字生成 client
pub fn build_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>> {
    let timeout_ms = timeout_ms(config.timeout_seconds);

    let generator: Arc<dyn TextGenerator> = match config.provider {
        GenerationProvider::OpenAi => {
            let mut client = OpenAiClient::new(&config.endpoint, &config.model).with_timeout_ms(timeout_ms);
            if let Some(key) = &config.api_key {
                client = client.with_api_key(key);
            }
            client.temperature = config.temperature;
            client.max_tokens = config.max_tokens;
            Arc::new(client)
        }
        GenerationProvider::Ollama => {
            let mut client = OllamaClient::new(&config.endpoint, &config.model).with_timeout_ms(timeout_ms);
            client.temperature = config.temperature;
            client.max_tokens = config.max_tokens;
            Arc::new(client)
        }
    };

    tracing::info!(
        "🤖 Text generation via {:?} at {} (model {})",
        config.provider,
        config.endpoint,
        generator.model_name()
    );
    Ok(generator)
}

/// 送出請求並把傳輸層錯誤轉成 GenerationError
async fn send(request: RequestBuilder, timeout_ms: u64) -> std::result::Result<Response, GenerationError> {
    let response = request
        .timeout(Duration::from_millis(timeout_ms))
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout(timeout_ms)
            } else {
                GenerationError::Connection(e.to_string())
            }
        })?;

    let status = response.status();
    if status.as_u16() == 429 {
        return Err(GenerationError::RateLimited);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GenerationError::Http {
            status: status.as_u16(),
            body,
        });
    }

    Ok(response)
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> std::result::Result<T, GenerationError> {
    response
        .json()
        .await
        .map_err(|e| GenerationError::InvalidResponse(e.to_string()))
}

/// OpenAI 相容的 chat completions client
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    timeout_ms: u64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_key: None,
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            client: Client::new(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.endpoint);
        let body = ChatRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: options.temperature.or(self.temperature),
            max_tokens: options.max_tokens.or(self.max_tokens),
        };

        tracing::debug!("Sending chat completion request to {}", url);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = send(request, options.timeout_ms.unwrap_or(self.timeout_ms)).await?;
        let reply: ChatResponse = decode(response).await?;

        reply
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| GenerationError::InvalidResponse("response contained no message content".to_string()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Ollama `/api/generate` client
#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    timeout_ms: u64,
    client: Client,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "OllamaOptions::is_empty")]
    options: OllamaOptions,
}

#[derive(Debug, Default, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

impl OllamaOptions {
    fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.num_predict.is_none()
    }
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
    #[serde(default)]
    total_duration: Option<u64>,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            client: Client::new(),
        }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

#[async_trait]
impl TextGenerator for OllamaClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> std::result::Result<String, GenerationError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = OllamaRequest {
            model: options.model.as_deref().unwrap_or(&self.model),
            prompt,
            stream: false,
            options: OllamaOptions {
                temperature: options.temperature.or(self.temperature),
                num_predict: options.max_tokens.or(self.max_tokens),
            },
        };

        tracing::debug!("Sending request to Ollama: {}", url);
        let response = send(self.client.post(&url).json(&body), options.timeout_ms.unwrap_or(self.timeout_ms)).await?;
        let reply: OllamaResponse = decode(response).await?;

        if let Some(duration) = reply.total_duration {
            tracing::debug!("Ollama completion took {} ms", duration / 1_000_000);
        }
        Ok(reply.response)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
