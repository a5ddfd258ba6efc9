//! Ollama providers for embeddings and completions
//!
//! Both share one `OllamaClient`; only embedding requests are retried.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::config::{EmbeddingConfig, LlmConfig, ModelConfig, ProviderKind};
use crate::error::{Error, Result};

use super::embedding::EmbeddingProvider;
use super::llm::CompletionProvider;
use super::retry::{AttemptError, RetryPolicy};

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<TagEntry>,
}

#[derive(Deserialize)]
struct TagEntry {
    name: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embedding: Vec<f32>,
}

impl OllamaClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.resolved_base_url(ProviderKind::Ollama),
            retry: RetryPolicy::new(config.max_retries),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Check if Ollama is available
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    /// Locally installed models
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::synthesis(format!("listing models failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::synthesis(format!("HTTP {}", response.status())));
        }

        let parsed: TagsResponse = response
            .json()
            .await
            .map_err(|e| Error::synthesis(format!("failed to parse model list: {}", e)))?;

        let mut models: Vec<String> = parsed.models.into_iter().map(|m| m.name).collect();
        models.sort();
        Ok(models)
    }

    /// Generate an embedding with retry
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embeddings", self.base_url);
        let url = url.as_str();
        let client = &self.client;

        self.retry
            .run("Ollama embedding request", move || async move {
                let response = client
                    .post(url)
                    .json(&EmbedRequest { model, prompt: text })
                    .send()
                    .await
                    .map_err(|e| {
                        AttemptError::from_request(&e, Error::embedding(format!("request failed: {}", e)))
                    })?;

                let status = response.status();
                if !status.is_success() {
                    return Err(AttemptError::from_status(
                        status,
                        Error::embedding(format!("HTTP {}", status)),
                    ));
                }

                let parsed: EmbedResponse = response.json().await.map_err(|e| {
                    AttemptError::Permanent(Error::embedding(format!("failed to parse response: {}", e)))
                })?;

                if parsed.embedding.is_empty() {
                    return Err(AttemptError::Permanent(Error::embedding(format!(
                        "model '{}' returned an empty vector",
                        model
                    ))));
                }
                Ok(parsed.embedding)
            })
            .await
    }

    /// Single non-streaming generation; not retried
    pub async fn generate(&self, prompt: &str, model: &ModelConfig) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let request = GenerateRequest {
            model: &model.model_name,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: model.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::synthesis(format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::synthesis(format!("HTTP {}", response.status())));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::synthesis(format!("failed to parse response: {}", e)))?;

        Ok(parsed.response)
    }
}

/// Ollama embedding provider using nomic-embed-text or similar models
pub struct OllamaEmbedder {
    client: Arc<OllamaClient>,
    dimensions: usize,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(llm: &LlmConfig, embeddings: &EmbeddingConfig) -> Result<Self> {
        Ok(Self::from_client(Arc::new(OllamaClient::new(llm)?), embeddings))
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>, embeddings: &EmbeddingConfig) -> Self {
        Self {
            client,
            dimensions: embeddings.dimensions,
            model: embeddings.model.clone(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.client.embed(&self.model, text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        // The embeddings endpoint takes one prompt per request
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.client.embed(&self.model, text).await?);
        }
        Ok(embeddings)
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
        "ollama"
    }
}

/// Ollama completion provider
pub struct OllamaCompletion {
    client: Arc<OllamaClient>,
}

impl OllamaCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: Arc::new(OllamaClient::new(config)?),
        })
    }

    /// Create from existing OllamaClient
    pub fn from_client(client: Arc<OllamaClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CompletionProvider for OllamaCompletion {
    async fn complete(&self, prompt: &str, model: &ModelConfig) -> Result<String> {
        self.client.generate(prompt, model).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        self.client.list_models().await
    }

    async fn health_check(&self) -> Result<bool> {
        self.client.health_check().await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unreachable() -> LlmConfig {
        LlmConfig {
            provider: ProviderKind::Ollama,
            base_url: Some("http://127.0.0.1:9".to_string()),
            max_retries: 1,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn test_generate_request_disables_streaming() {
        let request = GenerateRequest {
            model: "llama3",
            prompt: "hello",
            stream: false,
            options: GenerateOptions { temperature: 0.3 },
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["stream"], false);
        assert!((value["options"]["temperature"].as_f64().unwrap() - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_tags_response_shape() {
        let parsed: TagsResponse = serde_json::from_str(
            r#"{"models":[{"name":"llama3.2:3b","size":2019393189},{"name":"nomic-embed-text:latest"}]}"#,
        )
        .unwrap();
        let names: Vec<&str> = parsed.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["llama3.2:3b", "nomic-embed-text:latest"]);
    }

    #[tokio::test]
    async fn test_health_check_reports_unavailable() {
        let client = OllamaClient::new(&unreachable()).unwrap();
        assert!(!client.health_check().await.unwrap());
    }

    #[tokio::test]
    async fn test_failures_map_to_stage_errors() {
        let client = Arc::new(
            OllamaClient::new(&unreachable())
                .unwrap()
                .with_retry(RetryPolicy::new(1).with_base_delay(Duration::from_millis(1))),
        );

        let embedder = OllamaEmbedder::from_client(Arc::clone(&client), &EmbeddingConfig::default());
        assert!(matches!(embedder.embed("x").await, Err(Error::Embedding(_))));

        let completion = OllamaCompletion::from_client(client);
        let err = completion.complete("x", &ModelConfig::default()).await.unwrap_err();
        assert!(matches!(err, Error::Synthesis(_)));
    }
}
