// src/config.rs
//! Investigation configuration: one TOML document with a section per stage.
//! Every section has defaults, so an empty file (or no file) is a valid config.

use crate::geo::IndeterminatePolicy;
use crate::sources::SourceKind;
use anyhow::Context;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "config/investigation.toml";
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.75;
pub const DEFAULT_GEO_RADIUS_KM: f64 = 2.0;

pub const ENV_CONFIG_PATH: &str = "INVESTIGATION_CONFIG_PATH";
pub const ENV_SIMILARITY_THRESHOLD: &str = "INVESTIGATION_SIMILARITY_THRESHOLD";
pub const ENV_GEO_RADIUS_KM: &str = "INVESTIGATION_GEO_RADIUS_KM";
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct InvestigationConfig {
    pub keywords: KeywordsConfig,
    pub themes: ThemesConfig,
    pub sources: SourcesConfig,
    pub aggregator: AggregatorConfig,
    pub ranking: RankingConfig,
    pub similarity: SimilarityConfig,
    pub embedding: EmbeddingConfig,
    pub knowledge: KnowledgeConfig,
    pub advisor: AdvisorConfig,
    pub cache: CacheConfig,
    pub database: DatabaseConfig,
}

// ---------- keywords / themes ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeywordsConfig {
    /// Below this many cleaned keywords, terms are pulled from the report text.
    pub min_terms: usize,
    /// At most this many terms are taken from the report text.
    pub max_text_terms: usize,
    /// Text tokens with this many characters or fewer are ignored.
    pub min_text_token_chars: usize,
    /// Added to the built-in stop-word list.
    pub extra_stop_words: Vec<String>,
}

impl Default for KeywordsConfig {
    fn default() -> Self {
        Self {
            min_terms: 2,
            max_text_terms: 2,
            min_text_token_chars: 4,
            extra_stop_words: Vec::new(),
        }
    }
}

/// Extends the built-in theme vocabulary.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ThemesConfig {
    pub specific: Vec<String>,
    /// keyword -> canonical theme id
    pub synonyms: HashMap<String, String>,
}

// ---------- sources ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    /// How many years back (besides the current one) year-windowed sources look.
    pub year_window: u32,
    pub request_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub user_agent: String,
    pub chamber: ChamberConfig,
    pub senate: SenateConfig,
    pub cross_index: CrossIndexConfig,
    pub gazette: GazetteConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            year_window: 2,
            request_timeout_ms: 8_000,
            connect_timeout_ms: 3_000,
            user_agent: concat!("coral-investigator/", env!("CARGO_PKG_VERSION")).to_string(),
            chamber: ChamberConfig::default(),
            senate: SenateConfig::default(),
            cross_index: CrossIndexConfig::default(),
            gazette: GazetteConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChamberConfig {
    pub enabled: bool,
    pub base_url: String,
    /// Proposal type codes requested from the chamber (`siglaTipo`).
    pub proposal_types: Vec<String>,
    /// Canonical theme id -> chamber theme code (`codTema`).
    pub theme_codes: HashMap<String, u32>,
    /// Shown chamber items whose latest procedural step is looked up.
    pub status_lookups: usize,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        let theme_codes = [
            ("saude", 56),
            ("educacao", 46),
            ("transporte", 64),
            ("seguranca", 57),
            ("meio_ambiente", 48),
            ("habitacao", 52),
            ("cultura", 44),
            ("assistencia_social", 43),
            ("zeladoria", 54),
            ("consumidor", 45),
            ("trabalho", 62),
            ("direitos_humanos", 40),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self {
            enabled: true,
            base_url: "https://dadosabertos.camara.leg.br/api/v2".into(),
            proposal_types: vec!["PL".into(), "PEC".into(), "PLP".into()],
            theme_codes,
            status_lookups: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SenateConfig {
    pub enabled: bool,
    pub base_url: String,
    pub max_keywords: usize,
}

impl Default for SenateConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://legis.senado.leg.br/dadosabertos".into(),
            max_keywords: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrossIndexConfig {
    pub enabled: bool,
    pub base_url: String,
    pub max_keywords: usize,
}

impl Default for CrossIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.lexml.gov.br".into(),
            max_keywords: 3,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GazetteConfig {
    pub enabled: bool,
}

// ---------- aggregation / ranking ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Fallback strategies run while fewer than this many unique items are found.
    pub result_floor: usize,
    pub per_source_limit: usize,
    /// Hard ceiling per source call, on top of the HTTP client timeout.
    pub call_timeout_ms: u64,
    pub national_sources: Vec<SourceKind>,
    pub regional_sources: Vec<SourceKind>,
    /// Target of the last fallback strategy.
    pub broadest_source: SourceKind,
    /// Keywords kept by the last fallback strategy.
    pub broadest_keywords: usize,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            result_floor: 3,
            per_source_limit: 5,
            call_timeout_ms: 10_000,
            national_sources: vec![SourceKind::CrossIndex, SourceKind::Chamber, SourceKind::Senate],
            regional_sources: vec![SourceKind::CrossIndex],
            broadest_source: SourceKind::CrossIndex,
            broadest_keywords: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingWeights {
    pub title_hit: i32,
    pub summary_occurrence: i32,
    pub breadth_hit: i32,
    pub current_year: i32,
    pub previous_year: i32,
    pub primary_source: i32,
    pub has_summary: i32,
}

impl Default for RankingWeights {
    fn default() -> Self {
        Self {
            title_hit: 3,
            summary_occurrence: 1,
            breadth_hit: 2,
            current_year: 2,
            previous_year: 1,
            primary_source: 1,
            has_summary: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub weights: RankingWeights,
    pub min_score: i32,
    pub min_summary_chars: usize,
    pub top_k: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            weights: RankingWeights::default(),
            min_score: 3,
            min_summary_chars: 20,
            top_k: 3,
        }
    }
}

// ---------- similarity / embeddings ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    pub threshold: f32,
    pub max_results: usize,
    pub geo_radius_km: f64,
    /// Local-scope candidates whose distance cannot be computed.
    pub indeterminate: IndeterminatePolicy,
    /// Local-scope over-fetch factor, applied before the distance filter.
    pub local_candidate_factor: usize,
    /// Ceiling for the embedding call and for the index query, each.
    pub query_timeout_ms: u64,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_SIMILARITY_THRESHOLD,
            max_results: 3,
            geo_radius_km: DEFAULT_GEO_RADIUS_KM,
            indeterminate: IndeterminatePolicy::Exclude,
            local_candidate_factor: 3,
            query_timeout_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "gemini" | "disabled" (case-insensitive)
    pub provider: String,
    pub model: String,
    pub dimensions: usize,
    pub base_url: String,
    /// "ENV" means: read from GEMINI_API_KEY.
    pub api_key: String,
    pub max_input_chars: usize,
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "text-embedding-004".into(),
            dimensions: 768,
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: "ENV".into(),
            max_input_chars: 2_000,
            timeout_ms: 10_000,
        }
    }
}

impl EmbeddingConfig {
    /// Resolved key, or None when unset. A missing key disables embeddings.
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(&self.api_key)
    }
}

// "ENV" reads GEMINI_API_KEY; blank means unset
fn resolve_api_key(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let key = if raw.eq_ignore_ascii_case("env") {
        std::env::var(ENV_GEMINI_API_KEY).ok()?
    } else {
        raw.to_string()
    };
    let key = key.trim().to_string();
    (!key.is_empty()).then_some(key)
}

/// Generative model asked for rights already in force.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    /// "gemini" | "disabled" (case-insensitive)
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// "ENV" means: read from GEMINI_API_KEY.
    pub api_key: String,
    pub timeout_ms: u64,
    pub max_laws: usize,
    pub temperature: f32,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".into(),
            model: "gemini-2.0-flash-lite".into(),
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: "ENV".into(),
            timeout_ms: 8_000,
            max_laws: 3,
            temperature: 0.2,
        }
    }
}

impl AdvisorConfig {
    pub fn resolved_api_key(&self) -> Option<String> {
        resolve_api_key(&self.api_key)
    }
}

// ---------- knowledge / database ----------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    /// Keep the built-in rights and programs alongside configured ones.
    pub include_builtin: bool,
    pub min_keyword_hits: usize,
    pub rights: Vec<crate::knowledge::KnownRight>,
    pub programs: Vec<crate::knowledge::GovernmentProgram>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            include_builtin: true,
            min_keyword_hits: 2,
            rights: Vec::new(),
            programs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// A batch upsert still running after this is abandoned (and rolled back).
    pub write_timeout_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { write_timeout_ms: 5_000 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Overridden by DATABASE_URL when set.
    pub url: Option<String>,
    pub max_connections: u32,
    /// Create tables/extension on startup (idempotent).
    pub ensure_schema: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 5,
            ensure_schema: false,
        }
    }
}

// ---------- loading ----------

// parse optional float env and clamp to <0.0..=1.0>
fn parse_threshold_env(raw: Option<String>) -> Option<f32> {
    raw.and_then(|s| s.trim().parse::<f32>().ok())
        .filter(|v| v.is_finite())
        .map(|v| v.clamp(0.0, 1.0))
}

fn parse_radius_env(raw: Option<String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && *v > 0.0)
}

impl InvestigationConfig {
    /// Load using INVESTIGATION_CONFIG_PATH or "config/investigation.toml".
    /// A missing default file yields defaults; a missing explicit path is an error.
    pub fn load() -> anyhow::Result<Self> {
        let explicit = std::env::var(ENV_CONFIG_PATH).ok().map(PathBuf::from);
        let mut cfg = match explicit {
            Some(path) => Self::read_file(&path)?,
            None => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    Self::read_file(&path)?
                } else {
                    info!(target: "investigation", path = %path.display(), "no investigation config found, using defaults");
                    Self::default()
                }
            }
        };
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Load from an explicit path, then apply env overrides.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let mut cfg = Self::read_file(path)?;
        cfg.apply_env_overrides();
        cfg.sanitize();
        Ok(cfg)
    }

    /// Parse a TOML string. No env overrides.
    pub fn from_toml_str(toml_str: &str) -> anyhow::Result<Self> {
        let mut cfg: InvestigationConfig = toml::from_str(toml_str)?;
        cfg.sanitize();
        Ok(cfg)
    }

    fn read_file(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading investigation config from {}", path.display()))?;
        let cfg: InvestigationConfig = toml::from_str(&content)
            .with_context(|| format!("parsing investigation config {}", path.display()))?;
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(t) = parse_threshold_env(std::env::var(ENV_SIMILARITY_THRESHOLD).ok()) {
            self.similarity.threshold = t;
        }
        if let Some(r) = parse_radius_env(std::env::var(ENV_GEO_RADIUS_KM).ok()) {
            self.similarity.geo_radius_km = r;
        }
        if let Ok(url) = std::env::var(ENV_DATABASE_URL) {
            if !url.trim().is_empty() {
                self.database.url = Some(url);
            }
        }
    }

    fn sanitize(&mut self) {
        let sim = &mut self.similarity;
        if !sim.threshold.is_finite() {
            warn!(target: "investigation", "similarity threshold is not finite, using default");
            sim.threshold = DEFAULT_SIMILARITY_THRESHOLD;
        }
        sim.threshold = sim.threshold.clamp(0.0, 1.0);
        if !(sim.geo_radius_km.is_finite() && sim.geo_radius_km > 0.0) {
            sim.geo_radius_km = DEFAULT_GEO_RADIUS_KM;
        }
        sim.local_candidate_factor = sim.local_candidate_factor.max(1);

        sim.query_timeout_ms = sim.query_timeout_ms.max(1);

        self.embedding.provider = self.embedding.provider.trim().to_lowercase();
        self.advisor.provider = self.advisor.provider.trim().to_lowercase();
        if !self.advisor.temperature.is_finite() {
            self.advisor.temperature = AdvisorConfig::default().temperature;
        }
        self.cache.write_timeout_ms = self.cache.write_timeout_ms.max(1);
        self.ranking.top_k = self.ranking.top_k.max(1);
        self.aggregator.per_source_limit = self.aggregator.per_source_limit.max(1);
        self.aggregator.broadest_keywords = self.aggregator.broadest_keywords.max(1);
        self.knowledge.min_keyword_hits = self.knowledge.min_keyword_hits.max(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_env_parsing_clamps() {
        assert_eq!(parse_threshold_env(Some("0.8".into())), Some(0.8));
        assert_eq!(parse_threshold_env(Some("7".into())), Some(1.0));
        assert_eq!(parse_threshold_env(Some("-1".into())), Some(0.0));
        assert_eq!(parse_threshold_env(Some("NaN".into())), None);
        assert_eq!(parse_threshold_env(Some("abc".into())), None);
        assert_eq!(parse_threshold_env(None), None);
    }

    #[test]
    fn radius_env_rejects_non_positive() {
        assert_eq!(parse_radius_env(Some("3.5".into())), Some(3.5));
        assert_eq!(parse_radius_env(Some("0".into())), None);
        assert_eq!(parse_radius_env(Some("-2".into())), None);
    }

    #[test]
    fn empty_document_is_all_defaults() {
        let cfg = InvestigationConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.similarity.threshold, 0.75);
        assert_eq!(cfg.similarity.max_results, 3);
        assert_eq!(cfg.aggregator.result_floor, 3);
        assert_eq!(cfg.ranking.top_k, 3);
        assert_eq!(cfg.keywords.min_terms, 2);
        assert_eq!(cfg.similarity.query_timeout_ms, 5_000);
        assert_eq!(cfg.cache.write_timeout_ms, 5_000);
        assert_eq!(cfg.advisor.model, "gemini-2.0-flash-lite");
        assert_eq!(cfg.sources.chamber.status_lookups, 3);
        assert!(!cfg.sources.gazette.enabled);
        assert_eq!(
            cfg.aggregator.national_sources,
            vec![SourceKind::CrossIndex, SourceKind::Chamber, SourceKind::Senate]
        );
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = InvestigationConfig::from_toml_str(
            r#"
            [similarity]
            threshold = 1.7
            indeterminate = "include"

            [aggregator]
            regional_sources = ["cross_index", "gazette"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.similarity.threshold, 1.0);
        assert_eq!(cfg.similarity.indeterminate, IndeterminatePolicy::Include);
        assert_eq!(cfg.similarity.geo_radius_km, 2.0);
        assert_eq!(
            cfg.aggregator.regional_sources,
            vec![SourceKind::CrossIndex, SourceKind::Gazette]
        );
        assert_eq!(cfg.aggregator.per_source_limit, 5);
    }
}
