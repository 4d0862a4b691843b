// src/embedding.rs
//! Text embeddings for semantic demand matching.
//!
//! A failed or unusable embedding is represented explicitly as
//! [`Embedding::Absent`]; callers must never compare against it.

use crate::config::EmbeddingConfig;
use crate::metrics::EMBEDDING_ABSENT;
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub enum Embedding {
    Present(Vec<f32>),
    Absent,
}

impl Embedding {
    pub fn is_present(&self) -> bool {
        matches!(self, Embedding::Present(_))
    }
}

/// Remote (or fake) embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>>;
    fn dimensions(&self) -> usize;
    fn name(&self) -> &'static str;
}

pub type DynEmbedder = Arc<dyn Embedder>;

/// Always fails; used when no provider/key is configured.
#[derive(Debug, Clone)]
pub struct DisabledEmbedder {
    pub dimensions: usize,
}

#[async_trait]
impl Embedder for DisabledEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        bail!("embeddings disabled")
    }
    fn dimensions(&self) -> usize {
        self.dimensions
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
}

/// Gemini `embedContent` endpoint.
pub struct GeminiEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(cfg: &EmbeddingConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("coral-investigator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            dimensions: cfg.dimensions,
        })
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        #[derive(Serialize)]
        struct Part<'a> {
            text: &'a str,
        }
        #[derive(Serialize)]
        struct Content<'a> {
            parts: Vec<Part<'a>>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req<'a> {
            model: String,
            content: Content<'a>,
            task_type: &'a str,
        }
        #[derive(Deserialize)]
        struct Resp {
            embedding: Values,
        }
        #[derive(Deserialize)]
        struct Values {
            values: Vec<f32>,
        }

        let url = format!("{}/v1beta/models/{}:embedContent", self.base_url, self.model);
        let req = Req {
            model: format!("models/{}", self.model),
            content: Content {
                parts: vec![Part { text }],
            },
            task_type: "SEMANTIC_SIMILARITY",
        };
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&req)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("embedding request failed with status {}", status.as_u16());
        }
        let body: Resp = resp.json().await?;
        Ok(body.embedding.values)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Build the configured embedder. Missing keys or "disabled" yield a
/// [`DisabledEmbedder`]; unknown providers are a config error.
pub fn build_embedder(cfg: &EmbeddingConfig) -> anyhow::Result<DynEmbedder> {
    match cfg.provider.as_str() {
        "disabled" | "none" | "" => Ok(Arc::new(DisabledEmbedder {
            dimensions: cfg.dimensions,
        })),
        "gemini" => match cfg.resolved_api_key() {
            Some(key) => Ok(Arc::new(GeminiEmbedder::new(cfg, key)?)),
            None => {
                warn!(target: "embedding", "GEMINI_API_KEY not set, semantic matching disabled");
                Ok(Arc::new(DisabledEmbedder {
                    dimensions: cfg.dimensions,
                }))
            }
        },
        other => Err(anyhow!("unsupported embedding provider: {other}")),
    }
}

/// Cosine similarity; None for mismatched lengths or zero norms.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() || a.is_empty() {
        return None;
    }
    let (mut dot, mut na, mut nb) = (0f64, 0f64, 0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 || !dot.is_finite() {
        return None;
    }
    Some((dot / (na.sqrt() * nb.sqrt())) as f32)
}

/// Wraps an [`Embedder`] with truncation and validation. Never fails.
#[derive(Clone)]
pub struct EmbeddingService {
    embedder: DynEmbedder,
    max_chars: usize,
}

impl EmbeddingService {
    pub fn new(embedder: DynEmbedder, max_chars: usize) -> Self {
        Self { embedder, max_chars }
    }

    pub async fn embed(&self, text: &str) -> Embedding {
        let text = text.trim();
        if text.is_empty() {
            counter!(EMBEDDING_ABSENT, "reason" => "empty").increment(1);
            return Embedding::Absent;
        }
        let truncated: String = text.chars().take(self.max_chars).collect();

        match self.embedder.embed(&truncated).await {
            Ok(v) if v.len() != self.embedder.dimensions() => {
                warn!(
                    target: "embedding",
                    provider = self.embedder.name(),
                    got = v.len(),
                    want = self.embedder.dimensions(),
                    "embedding has wrong dimensionality"
                );
                counter!(EMBEDDING_ABSENT, "reason" => "dimensions").increment(1);
                Embedding::Absent
            }
            Ok(v) if v.iter().any(|x| !x.is_finite()) || v.iter().all(|x| *x == 0.0) => {
                warn!(target: "embedding", provider = self.embedder.name(), "embedding is degenerate");
                counter!(EMBEDDING_ABSENT, "reason" => "degenerate").increment(1);
                Embedding::Absent
            }
            Ok(v) => {
                debug!(target: "embedding", provider = self.embedder.name(), dims = v.len(), "embedded");
                Embedding::Present(v)
            }
            Err(e) => {
                warn!(target: "embedding", provider = self.embedder.name(), error = %e, "embedding failed");
                counter!(EMBEDDING_ABSENT, "reason" => "error").increment(1);
                Embedding::Absent
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Fixed {
        out: Vec<f32>,
        seen: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl Embedder for Fixed {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.seen.lock().unwrap().push(text.chars().count());
            Ok(self.out.clone())
        }
        fn dimensions(&self) -> usize {
            3
        }
        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[tokio::test]
    async fn truncates_input_and_validates_output() {
        let e = Arc::new(Fixed {
            out: vec![0.1, 0.2, 0.3],
            seen: Mutex::new(vec![]),
        });
        let svc = EmbeddingService::new(e.clone(), 10);
        let got = svc.embed(&"x".repeat(50)).await;
        assert!(got.is_present());
        assert_eq!(*e.seen.lock().unwrap(), vec![10]);
    }

    #[tokio::test]
    async fn zero_or_wrong_size_vectors_are_absent() {
        let zero = EmbeddingService::new(
            Arc::new(Fixed {
                out: vec![0.0; 3],
                seen: Mutex::new(vec![]),
            }),
            100,
        );
        assert_eq!(zero.embed("texto").await, Embedding::Absent);

        let short = EmbeddingService::new(
            Arc::new(Fixed {
                out: vec![1.0],
                seen: Mutex::new(vec![]),
            }),
            100,
        );
        assert_eq!(short.embed("texto").await, Embedding::Absent);
    }

    #[tokio::test]
    async fn disabled_is_absent() {
        let svc = EmbeddingService::new(Arc::new(DisabledEmbedder { dimensions: 768 }), 2000);
        assert_eq!(svc.embed("qualquer coisa").await, Embedding::Absent);
        assert_eq!(svc.embed("   ").await, Embedding::Absent);
    }

    #[test]
    fn cosine_basics() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), None);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 0.0]), None);
    }
}
