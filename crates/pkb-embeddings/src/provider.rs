//! Provider abstraction: `{remote, local}` behind one capability set
//! (§9 "dynamic dispatch on embedding provider"). `remote` is a `reqwest`
//! client against an OpenAI-compatible endpoint; `local` wraps an `ollama-rs`
//! client. See DESIGN.md Open Question 1 for why these two concrete backends
//! were chosen.

use async_trait::async_trait;
use ollama_rs::{generation::embeddings::request::GenerateEmbeddingsRequest, Ollama};
use pkb_errors::PkbError;

use crate::dimension::dimension_for;

#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn generate_one(&self, text: &str) -> Result<Vec<f32>, PkbError>;
    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PkbError>;
    fn dimension(&self) -> i32;
    fn model(&self) -> &str;
}

pub struct RemoteProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dimension: i32,
}

impl RemoteProvider {
    pub fn new(api_key: Option<String>, base_url: Option<String>, model: String) -> Result<Self, PkbError> {
        let api_key = api_key
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .ok_or_else(|| PkbError::Config("no api_key resolved for remote embedding provider".into()))?;
        let dimension = dimension_for(&model, true);
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            api_key,
            model,
            dimension,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteProvider {
    async fn generate_one(&self, text: &str) -> Result<Vec<f32>, PkbError> {
        Ok(self.generate_batch(std::slice::from_ref(&text.to_string())).await?.remove(0))
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PkbError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({ "model": self.model, "input": texts });

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .timeout(std::time::Duration::from_secs(30))
            .send()
            .await
            .map_err(|error| PkbError::Provider(error.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(PkbError::Provider(format!("{status}: {message}")));
        }

        let parsed: OpenAiEmbeddingResponse = response
            .json()
            .await
            .map_err(|error| PkbError::Provider(error.to_string()))?;

        Ok(parsed.data.into_iter().map(|item| item.embedding).collect())
    }

    fn dimension(&self) -> i32 {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(serde::Deserialize)]
struct OpenAiEmbeddingResponse {
    data: Vec<OpenAiEmbeddingItem>,
}

#[derive(serde::Deserialize)]
struct OpenAiEmbeddingItem {
    embedding: Vec<f32>,
}

pub struct LocalProvider {
    client: Ollama,
    model: String,
    dimension: i32,
}

impl LocalProvider {
    pub fn new(model: String) -> Self {
        let dimension = dimension_for(&model, false);
        Self {
            client: Ollama::default(),
            model,
            dimension,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for LocalProvider {
    async fn generate_one(&self, text: &str) -> Result<Vec<f32>, PkbError> {
        let request = GenerateEmbeddingsRequest::new(self.model.clone(), text.to_string().into());
        let response = self
            .client
            .generate_embeddings(request)
            .await
            .map_err(|error| PkbError::ModelLoad(error.to_string()))?;

        let mut vector = response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| PkbError::Provider("local model returned no embeddings".into()))?;

        l2_normalize(&mut vector)?;
        Ok(vector)
    }

    async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PkbError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.generate_one(text).await?);
        }
        Ok(out)
    }

    fn dimension(&self) -> i32 {
        self.dimension
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn l2_normalize(values: &mut [f32]) -> Result<(), PkbError> {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return Err(PkbError::Provider(
            "embedding vector norm must be finite and non-zero".into(),
        ));
    }
    for value in values {
        *value /= norm;
    }
    Ok(())
}
