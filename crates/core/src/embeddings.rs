use crate::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT: usize = 128;

pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| SearchError::Embedding("embedder returned no vector".to_string()))
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        (**self).embed_batch(texts).await
    }
}

/// Hashes character trigrams into a fixed-width, L2-normalized vector.
/// Deterministic and offline; good enough for lexical-ish recall.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Client for any OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAiEmbedder {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut request = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .json(&json!({
                "model": self.model,
                "input": texts,
            }));

        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "embeddings".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: EmbeddingResponse = response.json().await?;
        order_embeddings(parsed, texts.len(), self.dimensions)
    }
}

fn order_embeddings(
    mut parsed: EmbeddingResponse,
    expected: usize,
    dimensions: usize,
) -> Result<Vec<Vec<f32>>, SearchError> {
    if parsed.data.len() != expected {
        return Err(SearchError::Embedding(format!(
            "expected {expected} embeddings, got {}",
            parsed.data.len()
        )));
    }

    parsed.data.sort_by_key(|item| item.index);
    parsed
        .data
        .into_iter()
        .map(|item| {
            if item.embedding.len() != dimensions {
                return Err(SearchError::Embedding(format!(
                    "embedding dimension {} != {}",
                    item.embedding.len(),
                    dimensions
                )));
            }
            Ok(item.embedding)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedder_is_deterministic() {
        let embedder = CharacterNgramEmbedder::default();
        let first = embedder.embed_text("Inbox mail.example.com Work");
        let second = embedder.embed_text("Inbox mail.example.com Work");
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn batch_outputs_one_vector_per_text() {
        let embedder = CharacterNgramEmbedder { dimensions: 32 };
        let texts = vec!["abc".to_string(), String::new()];
        let vectors = embedder.embed_batch(&texts).await.expect("embedding");
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|vector| vector.len() == 32));
        assert!(vectors[1].iter().all(|value| *value == 0.0));
    }

    #[test]
    fn remote_embeddings_are_reordered_by_index() {
        let response: EmbeddingResponse = serde_json::from_value(json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]}
            ]
        }))
        .expect("valid payload");

        let vectors = order_embeddings(response, 2, 2).expect("ordered");
        assert_eq!(vectors[0], vec![1.0, 0.0]);
        assert_eq!(vectors[1], vec![0.0, 1.0]);
    }

    #[test]
    fn remote_embeddings_with_wrong_width_are_rejected() {
        let response: EmbeddingResponse = serde_json::from_value(json!({
            "data": [{"index": 0, "embedding": [1.0, 0.0, 0.0]}]
        }))
        .expect("valid payload");

        assert!(order_embeddings(response, 1, 2).is_err());
    }
}
