// src/investigation.rs
//! The investigation pipeline: expand keywords, search legislation, similar
//! demands and rights in force concurrently, rank, cache, and pick a scenario.

use crate::advisor::{build_advisor, AdvisorRequest, DynLawAdvisor, RightsFinder, RightsOrigin};
use crate::aggregator::{AggregateRequest, MultiSourceAggregator, SourceOutcome, Strategy};
use crate::cache::{ItemStore, LegislativeItemCache};
use crate::config::InvestigationConfig;
use crate::embedding::{build_embedder, DynEmbedder, EmbeddingService};
use crate::geo::Location;
use crate::keywords::KeywordExpander;
use crate::knowledge::{GovernmentProgram, KnowledgeBase};
use crate::metrics::{ensure_metrics_described, INVESTIGATION_RUNS, SCENARIO_SELECTED};
use crate::ranking::{EmptyPolicy, QualityFilter, RankedItem, RelevanceRanker};
use crate::scenario::{self, LawRecord, Scenario, ScenarioSelection};
use crate::scope::ScopeLevel;
use crate::similarity::{DemandIndex, SimilarDemand, SimilarityMatcher, SimilarityRequest};
use crate::sources::{build_sources, ItemType, LegislativeSource, NormalizedItem};
use crate::telemetry::{anon_hash, truncate_vec};
use chrono::Datelike;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Coarse classification produced upstream of the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl Classification {
    pub fn new<S: Into<String>>(theme: Option<&str>, keywords: impl IntoIterator<Item = S>) -> Self {
        Self {
            theme: theme.map(str::to_string),
            keywords: keywords.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    /// Anonymized id of the report text.
    pub report_id: String,
    pub expanded_keywords: Vec<String>,
    pub detected_theme: Option<String>,
    pub scope: ScopeLevel,
    pub sources: Vec<SourceOutcome>,
    pub strategies: Vec<Strategy>,
    pub duplicates_dropped: usize,
    /// Proposals were shown despite failing the quality gate.
    pub proposals_fallback: bool,
    pub embedding_available: bool,
    pub rights_origin: RightsOrigin,
    pub cached: bool,
    /// Every queried source failed.
    pub degraded: bool,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvestigationResult {
    pub scenario: Scenario,
    pub laws: Vec<LawRecord>,
    pub programs: Vec<GovernmentProgram>,
    pub proposals: Vec<RankedItem>,
    pub similar_demands: Vec<SimilarDemand>,
    pub selection: ScenarioSelection,
    pub diagnostics: Diagnostics,
}

/// External collaborators, injected.
pub struct Dependencies {
    pub sources: Vec<Arc<dyn LegislativeSource>>,
    pub embedder: DynEmbedder,
    pub advisor: DynLawAdvisor,
    pub demands: Arc<dyn DemandIndex>,
    pub items: Arc<dyn ItemStore>,
}

impl Dependencies {
    /// HTTP adapters, the configured embedder and advisor around the given stores.
    pub fn from_config(
        cfg: &InvestigationConfig,
        demands: Arc<dyn DemandIndex>,
        items: Arc<dyn ItemStore>,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            sources: build_sources(&cfg.sources)?,
            embedder: build_embedder(&cfg.embedding)?,
            advisor: build_advisor(&cfg.advisor)?,
            demands,
            items,
        })
    }
}

pub struct Investigator {
    expander: KeywordExpander,
    aggregator: MultiSourceAggregator,
    ranker: RelevanceRanker,
    quality: QualityFilter,
    cache: LegislativeItemCache,
    similarity: SimilarityMatcher,
    rights: RightsFinder,
    knowledge: KnowledgeBase,
}

impl Investigator {
    pub fn new(cfg: &InvestigationConfig, deps: Dependencies) -> Self {
        let embeddings = EmbeddingService::new(deps.embedder, cfg.embedding.max_input_chars);
        Self {
            expander: KeywordExpander::new(&cfg.keywords, &cfg.themes),
            aggregator: MultiSourceAggregator::new(
                deps.sources,
                cfg.aggregator.clone(),
                cfg.sources.year_window,
            ),
            ranker: RelevanceRanker::new(cfg.ranking.weights.clone()),
            quality: QualityFilter::from(&cfg.ranking),
            cache: LegislativeItemCache::new(deps.items)
                .with_write_timeout(Duration::from_millis(cfg.cache.write_timeout_ms)),
            similarity: SimilarityMatcher::new(embeddings, deps.demands, cfg.similarity.clone()),
            rights: RightsFinder::new(deps.advisor, Duration::from_millis(cfg.advisor.timeout_ms)),
            knowledge: KnowledgeBase::from_config(&cfg.knowledge),
        }
    }

    /// Run one investigation. Never fails: every branch degrades to empty.
    pub async fn investigate(
        &self,
        user_text: &str,
        classification: &Classification,
        scope: ScopeLevel,
        location: Option<&Location>,
    ) -> InvestigationResult {
        ensure_metrics_described();
        counter!(INVESTIGATION_RUNS).increment(1);
        let t0 = Instant::now();
        let report_id = anon_hash(user_text);

        let expanded = self.expander.expand(
            &classification.keywords,
            classification.theme.as_deref(),
            Some(user_text),
        );
        let keywords = &expanded.keywords;
        let theme = expanded.theme.as_deref();
        info!(
            target: "investigation",
            %report_id,
            %scope,
            keywords = ?truncate_vec(keywords, 5),
            theme = ?theme,
            "investigation started"
        );

        let (aggregated, similar, (rights, rights_origin)) = tokio::join!(
            self.aggregator.collect(AggregateRequest {
                keywords,
                theme,
                scope,
                location,
            }),
            self.similarity.find_similar(SimilarityRequest {
                text: user_text,
                theme,
                scope,
                location,
            }),
            self.rights.find(
                AdvisorRequest {
                    text: user_text,
                    theme,
                    location,
                },
                &self.knowledge,
                keywords,
            )
        );

        // enacted norms vs. everything still in progress
        let current_year = chrono::Utc::now().year();
        let (law_items, proposal_items): (Vec<NormalizedItem>, Vec<NormalizedItem>) = aggregated
            .items
            .iter()
            .cloned()
            .partition(|it| it.item_type == ItemType::Law);
        let indexed_laws = self.quality.apply(
            self.ranker.rank(law_items, keywords, current_year),
            EmptyPolicy::Strict,
        );
        let proposals = self.quality.apply(
            self.ranker.rank(proposal_items, keywords, current_year),
            EmptyPolicy::NeverEmpty,
        );
        debug!(
            target: "ranking",
            %report_id,
            laws = indexed_laws.items.len(),
            proposals = proposals.items.len(),
            fallback = proposals.used_fallback,
            "ranked"
        );

        let law_count = indexed_laws.items.len();
        let mut shown = indexed_laws.items;
        shown.extend(proposals.items);
        self.aggregator.enrich(shown.iter_mut().map(|r| &mut r.item)).await;
        let cached = self.cache.persist(&mut shown).await;
        let proposal_list = shown.split_off(law_count);

        let mut laws: Vec<LawRecord> = rights.into_iter().map(LawRecord::Known).collect();
        laws.extend(shown.into_iter().map(LawRecord::Indexed));
        let programs = self.knowledge.match_programs(theme, user_text, keywords);

        let selection = scenario::package(&laws, &programs, &proposal_list, &similar.matches);
        counter!(SCENARIO_SELECTED, "scenario" => selection.scenario.as_str()).increment(1);

        let degraded = aggregated.all_failed();
        if degraded {
            warn!(target: "investigation", %report_id, "all legislative sources failed");
        }
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        info!(
            target: "investigation",
            %report_id,
            scenario = selection.scenario.as_str(),
            laws = laws.len(),
            programs = programs.len(),
            proposals = proposal_list.len(),
            similar = similar.matches.len(),
            degraded,
            elapsed_ms,
            "investigation done"
        );

        InvestigationResult {
            scenario: selection.scenario,
            laws,
            programs,
            proposals: proposal_list,
            similar_demands: similar.matches,
            diagnostics: Diagnostics {
                report_id,
                expanded_keywords: expanded.keywords.clone(),
                detected_theme: expanded.theme.clone(),
                scope,
                sources: aggregated.outcomes,
                strategies: aggregated.strategies,
                duplicates_dropped: aggregated.duplicates_dropped,
                proposals_fallback: proposals.used_fallback,
                embedding_available: similar.embedding_available,
                rights_origin,
                cached,
                degraded,
                elapsed_ms,
            },
            selection,
        }
    }

    /// Log that `user_id` viewed a cached legislative item. Failures are logged only.
    pub async fn register_view(&self, user_id: Uuid, item_id: Uuid) {
        match self.cache.record_view(user_id, item_id).await {
            Ok(()) => debug!(target: "cache", %item_id, "view recorded"),
            Err(e) => warn!(target: "cache", %item_id, error = %e, "view not recorded"),
        }
    }
}
