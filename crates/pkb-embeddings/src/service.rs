//! `EmbeddingService` (§4.1): the public contract consumed by the parser,
//! indexer, and search layers. Wraps one [`EmbeddingProvider`] and enforces
//! the single-batch-inference mutex required by §5 for the local provider.

use std::sync::Arc;

use pkb_errors::PkbError;
use tokio::sync::Mutex;

use crate::clean::clean;
use crate::provider::EmbeddingProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Remote,
    Local,
}

pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    kind: ProviderKind,
    inference_lock: Mutex<()>,
}

impl EmbeddingService {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, kind: ProviderKind) -> Self {
        Self {
            provider,
            kind,
            inference_lock: Mutex::new(()),
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.kind
    }

    pub fn model(&self) -> &str {
        self.provider.model()
    }

    pub fn dimension(&self) -> i32 {
        self.provider.dimension()
    }

    fn zero_vector(&self) -> Vec<f32> {
        vec![0.0; self.provider.dimension().max(0) as usize]
    }

    pub async fn generate(&self, text: &str, apply_clean: bool) -> Result<Vec<f32>, PkbError> {
        let prepared = if apply_clean { clean(text) } else { text.to_string() };
        if prepared.trim().is_empty() {
            return Ok(self.zero_vector());
        }

        let _permit = self.inference_lock.lock().await;
        self.provider.generate_one(&prepared).await
    }

    /// Preserves index correspondence with `texts`: empty entries yield zero
    /// vectors without a provider call; only non-empty entries are sent.
    pub async fn generate_batch(
        &self,
        texts: &[String],
        apply_clean: bool,
    ) -> Result<Vec<Vec<f32>>, PkbError> {
        let prepared: Vec<String> = texts
            .iter()
            .map(|t| if apply_clean { clean(t) } else { t.clone() })
            .collect();

        let non_empty: Vec<(usize, String)> = prepared
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.trim().is_empty())
            .map(|(i, t)| (i, t.clone()))
            .collect();

        let mut results = vec![self.zero_vector(); texts.len()];
        if non_empty.is_empty() {
            return Ok(results);
        }

        let batch_texts: Vec<String> = non_empty.iter().map(|(_, t)| t.clone()).collect();

        let generated = {
            let _permit = self.inference_lock.lock().await;
            self.provider.generate_batch(&batch_texts).await?
        };

        for ((original_index, _), vector) in non_empty.into_iter().zip(generated.into_iter()) {
            results[original_index] = vector;
        }

        Ok(results)
    }

    pub fn close(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct StubProvider {
        dim: i32,
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for StubProvider {
        async fn generate_one(&self, text: &str) -> Result<Vec<f32>, PkbError> {
            self.calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![text.len() as f32; self.dim as usize])
        }

        async fn generate_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, PkbError> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.generate_one(text).await?);
            }
            Ok(out)
        }

        fn dimension(&self) -> i32 {
            self.dim
        }

        fn model(&self) -> &str {
            "stub"
        }
    }

    #[tokio::test]
    async fn given_empty_text_when_generated_then_zero_vector_without_provider_call() {
        let provider = Arc::new(StubProvider {
            dim: 4,
            calls: Default::default(),
        });
        let service = EmbeddingService::new(provider.clone(), ProviderKind::Local);
        let vector = service.generate("", true).await.unwrap();
        assert_eq!(vector, vec![0.0; 4]);
        assert_eq!(provider.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn given_mixed_batch_when_generated_then_index_correspondence_preserved() {
        let provider = Arc::new(StubProvider {
            dim: 2,
            calls: Default::default(),
        });
        let service = EmbeddingService::new(provider, ProviderKind::Local);
        let texts = vec!["".to_string(), "hello".to_string(), "".to_string()];
        let results = service.generate_batch(&texts, false).await.unwrap();
        assert_eq!(results[0], vec![0.0, 0.0]);
        assert_eq!(results[2], vec![0.0, 0.0]);
        assert_ne!(results[1], vec![0.0, 0.0]);
    }
}
