// src/similarity.rs
//! Semantic matching of a new report against active demands, with a
//! distance filter for street-level issues.

use crate::config::SimilarityConfig;
use crate::embedding::{cosine_similarity, Embedding, EmbeddingService};
use crate::error::StoreError;
use crate::geo::{proximity, GeoOutcome, Location};
use crate::metrics::{EMBEDDING_ABSENT, SIMILARITY_MATCHES};
use crate::scope::ScopeLevel;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

pub const ACTIVE_STATUS: &str = "active";

/// Nearest-neighbour query against the demand index.
#[derive(Debug, Clone)]
pub struct DemandQuery {
    pub vector: Vec<f32>,
    pub theme: String,
    pub scope: ScopeLevel,
    pub threshold: f32,
    pub limit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarDemand {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub theme: String,
    pub scope_level: ScopeLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    pub supporters_count: i32,
    pub created_at: DateTime<Utc>,
    pub similarity: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

/// Active demands ordered by descending similarity, at or above the threshold,
/// same theme and scope. Demands without a usable embedding never match.
#[async_trait]
pub trait DemandIndex: Send + Sync {
    async fn nearest(&self, query: &DemandQuery) -> Result<Vec<SimilarDemand>, StoreError>;
}

/// A demand as held by [`MemoryDemandIndex`].
#[derive(Debug, Clone)]
pub struct StoredDemand {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub theme: String,
    pub scope_level: ScopeLevel,
    pub location: Option<Location>,
    pub status: String,
    pub supporters_count: i32,
    pub created_at: DateTime<Utc>,
    pub embedding: Option<Vec<f32>>,
}

impl StoredDemand {
    pub fn active(title: &str, theme: &str, scope_level: ScopeLevel, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            description: String::new(),
            theme: theme.to_string(),
            scope_level,
            location: None,
            status: ACTIVE_STATUS.to_string(),
            supporters_count: 1,
            created_at: Utc::now(),
            embedding: Some(embedding),
        }
    }

    pub fn with_location(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }
}

#[derive(Debug, Default)]
pub struct MemoryDemandIndex {
    demands: RwLock<Vec<StoredDemand>>,
}

impl MemoryDemandIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, demand: StoredDemand) {
        self.demands
            .write()
            .unwrap_or_else(|p| p.into_inner())
            .push(demand);
    }
}

#[async_trait]
impl DemandIndex for MemoryDemandIndex {
    async fn nearest(&self, q: &DemandQuery) -> Result<Vec<SimilarDemand>, StoreError> {
        let demands = self.demands.read().unwrap_or_else(|p| p.into_inner());
        let mut out: Vec<SimilarDemand> = demands
            .iter()
            .filter(|d| d.status == ACTIVE_STATUS && d.theme == q.theme && d.scope_level == q.scope)
            .filter_map(|d| {
                let sim = cosine_similarity(d.embedding.as_deref()?, &q.vector)?;
                (sim >= q.threshold).then(|| SimilarDemand {
                    id: d.id,
                    title: d.title.clone(),
                    description: d.description.clone(),
                    theme: d.theme.clone(),
                    scope_level: d.scope_level,
                    location: d.location.clone(),
                    supporters_count: d.supporters_count,
                    created_at: d.created_at,
                    similarity: sim,
                    distance_km: None,
                })
            })
            .collect();
        out.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        out.truncate(q.limit);
        Ok(out)
    }
}

/// Inputs for one similarity lookup.
#[derive(Debug, Clone, Copy)]
pub struct SimilarityRequest<'a> {
    pub text: &'a str,
    pub theme: Option<&'a str>,
    pub scope: ScopeLevel,
    pub location: Option<&'a Location>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SimilarityOutcome {
    pub matches: Vec<SimilarDemand>,
    pub embedding_available: bool,
    /// Local-scope candidates dropped by the distance filter.
    pub dropped_by_distance: usize,
}

pub struct SimilarityMatcher {
    embeddings: EmbeddingService,
    index: Arc<dyn DemandIndex>,
    cfg: SimilarityConfig,
}

impl SimilarityMatcher {
    pub fn new(embeddings: EmbeddingService, index: Arc<dyn DemandIndex>, cfg: SimilarityConfig) -> Self {
        Self {
            embeddings,
            index,
            cfg,
        }
    }

    pub async fn find_similar(&self, req: SimilarityRequest<'_>) -> SimilarityOutcome {
        let Some(theme) = req.theme.map(str::trim).filter(|t| !t.is_empty()) else {
            debug!(target: "similarity", "no theme, skipping similarity");
            return SimilarityOutcome::default();
        };

        let limit = Duration::from_millis(self.cfg.query_timeout_ms);
        let vector = match tokio::time::timeout(limit, self.embeddings.embed(req.text)).await {
            Ok(Embedding::Present(v)) => v,
            Ok(Embedding::Absent) => return SimilarityOutcome::default(),
            Err(_) => {
                warn!(target: "similarity", timeout_ms = self.cfg.query_timeout_ms, "embedding timed out");
                counter!(EMBEDDING_ABSENT, "reason" => "timeout").increment(1);
                return SimilarityOutcome::default();
            }
        };

        let local = req.scope == ScopeLevel::Local;
        let fetch_limit = if local {
            self.cfg.max_results * self.cfg.local_candidate_factor
        } else {
            self.cfg.max_results
        };
        let query = DemandQuery {
            vector,
            theme: theme.to_string(),
            scope: req.scope,
            threshold: self.cfg.threshold,
            limit: fetch_limit,
        };

        let candidates = match tokio::time::timeout(limit, self.index.nearest(&query)).await {
            Ok(Ok(c)) => c,
            Ok(Err(e)) => {
                warn!(target: "similarity", error = %e, "demand index query failed");
                return SimilarityOutcome {
                    embedding_available: true,
                    ..SimilarityOutcome::default()
                };
            }
            Err(_) => {
                warn!(target: "similarity", timeout_ms = self.cfg.query_timeout_ms, "demand index query timed out");
                return SimilarityOutcome {
                    embedding_available: true,
                    ..SimilarityOutcome::default()
                };
            }
        };

        let mut dropped = 0usize;
        let mut matches = Vec::with_capacity(self.cfg.max_results);
        for mut cand in candidates {
            // threshold re-checked regardless of what the index promised
            if !(cand.similarity.is_finite() && cand.similarity >= self.cfg.threshold) {
                continue;
            }
            if local {
                let outcome = proximity(req.location, cand.location.as_ref(), self.cfg.geo_radius_km);
                if !self.cfg.indeterminate.admits(outcome) {
                    dropped += 1;
                    continue;
                }
                if let GeoOutcome::Within { distance_km } = outcome {
                    cand.distance_km = Some(distance_km);
                }
            }
            matches.push(cand);
            if matches.len() >= self.cfg.max_results {
                break;
            }
        }

        counter!(SIMILARITY_MATCHES).increment(matches.len() as u64);
        debug!(target: "similarity", matches = matches.len(), dropped, scope = %req.scope, "similarity done");
        SimilarityOutcome {
            matches,
            embedding_available: true,
            dropped_by_distance: dropped,
        }
    }
}
