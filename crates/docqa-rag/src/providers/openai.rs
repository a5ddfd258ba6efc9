//! OpenAI providers for embeddings and chat completions

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::config::{EmbeddingConfig, LlmConfig, ModelConfig, ProviderKind};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::CompletionProvider;
use super::retry::{AttemptError, RetryPolicy};

/// Shared HTTP plumbing for the OpenAI API
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("OpenAI API key must not be empty".to_string()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.resolved_base_url(ProviderKind::OpenAi),
            api_key,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn health_check(&self) -> Result<bool> {
        match self
            .client
            .get(self.url("models"))
            .bearer_auth(&self.api_key)
            .send()
            .await
        {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}

// OpenAI API request/response types

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    dimensions: Option<usize>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Status plus the API's error message, if the body carries one
async fn describe_failure(response: reqwest::Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    format!("HTTP {}: {}", status, detail)
}

/// Embeddings via `POST /embeddings`
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
    dimensions: usize,
    retry: RetryPolicy,
}

impl OpenAiEmbedder {
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::from_client(
            OpenAiClient::new(llm)?,
            embeddings,
            RetryPolicy::new(llm.max_retries),
        ))
    }

    pub fn from_client(client: OpenAiClient, embeddings: &EmbeddingConfig, retry: RetryPolicy) -> Self {
        Self {
            client,
            model: embeddings.model.clone(),
            dimensions: embeddings.dimensions,
            retry,
        }
    }

    /// text-embedding-3 models accept a requested output size
    fn request_dimensions(&self) -> Option<usize> {
        self.model
            .starts_with("text-embedding-3")
            .then_some(self.dimensions)
    }

    async fn request_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, AttemptError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
            dimensions: self.request_dimensions(),
        };

        let response = self
            .client
            .client
            .post(self.client.url("embeddings"))
            .bearer_auth(&self.client.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "openai", error = %e, "embedding request failed");
                AttemptError::from_request(&e, Error::embedding(format!("request failed: {}", e)))
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = describe_failure(response).await;
            error!(provider = "openai", "embedding API error: {}", detail);
            return Err(AttemptError::from_status(status, Error::embedding(detail)));
        }

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AttemptError::Permanent(Error::embedding(format!("failed to parse response: {}", e)))
        })?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| Error::embedding("API returned empty response"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "openai",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        self.retry
            .run("OpenAI embedding request", move || self.request_batch(texts))
            .await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Chat completions via `POST /chat/completions`
pub struct OpenAiCompletion {
    client: OpenAiClient,
}

impl OpenAiCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: OpenAiClient::new(config)?,
        })
    }

    pub fn from_client(client: OpenAiClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionProvider for OpenAiCompletion {
    async fn complete(&self, prompt: &str, model: &ModelConfig) -> Result<String> {
        debug!(
            provider = "openai",
            model = %model.model_name,
            prompt_len = prompt.len(),
            "requesting completion"
        );

        let body = ChatRequest {
            model: &model.model_name,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: model.temperature,
        };

        let response = self
            .client
            .client
            .post(self.client.url("chat/completions"))
            .bearer_auth(&self.client.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = "openai", error = %e, "completion request failed");
                Error::synthesis(format!("request failed: {}", e))
            })?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            error!(provider = "openai", "completion API error: {}", detail);
            return Err(Error::synthesis(detail));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::synthesis(format!("failed to parse response: {}", e)))?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| Error::synthesis("API returned no completion text"))
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .client
            .get(self.client.url("models"))
            .bearer_auth(&self.client.api_key)
            .send()
            .await
            .map_err(|e| Error::synthesis(format!("listing models failed: {}", e)))?;

        if !response.status().is_success() {
            let detail = describe_failure(response).await;
            error!(provider = "openai", "model listing error: {}", detail);
            return Err(Error::synthesis(detail));
        }

        let parsed: ModelList = response
            .json()
            .await
            .map_err(|e| Error::synthesis(format!("failed to parse model list: {}", e)))?;

        let mut models: Vec<String> = parsed.data.into_iter().map(|m| m.id).collect();
        models.sort();
        Ok(models)
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "openai"
    }
}
