// src/aggregator.rs
//! Fan-out over legislative sources with per-scope plans and an ordered
//! cascade of progressively broader strategies.
//!
//! Each strategy is pure data: given the base keywords/theme and the scope
//! plan it yields the query parameters and target sources. The aggregator
//! runs strategies in order until the merged, de-duplicated result set
//! reaches the floor. Later strategies only ever add items.

use crate::config::AggregatorConfig;
use crate::geo::Location;
use crate::metrics::{
    ensure_metrics_described, FALLBACK_STEPS, SOURCE_CALLS, SOURCE_CALL_MS, SOURCE_ERRORS,
    SOURCE_ITEMS,
};
use crate::scope::ScopeLevel;
use crate::sources::{
    dedup_in_place, Jurisdiction, LegislativeSource, NormalizedItem, SourceKind, SourceQuery,
};
use futures::future::join_all;
use metrics::{counter, histogram};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Strategy {
    /// Keywords and theme as expanded, all sources of the scope plan.
    AsRequested,
    /// Same keywords, theme filter removed.
    DropTheme,
    /// Only the first `keywords` keywords, no theme, broadest source only.
    TopKeywordsBroadest { keywords: usize },
}

/// Concrete parameters a strategy resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyPlan {
    pub keywords: Vec<String>,
    pub theme: Option<String>,
    pub targets: Vec<SourceKind>,
}

impl Strategy {
    pub fn plan(
        &self,
        keywords: &[String],
        theme: Option<&str>,
        scope_sources: &[SourceKind],
        broadest: SourceKind,
    ) -> StrategyPlan {
        match *self {
            Strategy::AsRequested => StrategyPlan {
                keywords: keywords.to_vec(),
                theme: theme.map(str::to_string),
                targets: scope_sources.to_vec(),
            },
            Strategy::DropTheme => StrategyPlan {
                keywords: keywords.to_vec(),
                theme: None,
                targets: scope_sources.to_vec(),
            },
            Strategy::TopKeywordsBroadest { keywords: n } => StrategyPlan {
                keywords: keywords.iter().take(n).cloned().collect(),
                theme: None,
                targets: vec![broadest],
            },
        }
    }
}

/// Ordered strategies for a scope. Only national scope falls back.
pub fn cascade(scope: ScopeLevel, cfg: &AggregatorConfig) -> Vec<Strategy> {
    match scope {
        ScopeLevel::Local => Vec::new(),
        ScopeLevel::Regional => vec![Strategy::AsRequested],
        ScopeLevel::National => vec![
            Strategy::AsRequested,
            Strategy::DropTheme,
            Strategy::TopKeywordsBroadest {
                keywords: cfg.broadest_keywords,
            },
        ],
    }
}

pub fn scope_sources(scope: ScopeLevel, cfg: &AggregatorConfig) -> &[SourceKind] {
    match scope {
        ScopeLevel::Local => &[],
        ScopeLevel::Regional => &cfg.regional_sources,
        ScopeLevel::National => &cfg.national_sources,
    }
}

/// Sub-national filter for regional scope: city when known, else state.
pub fn jurisdiction_for(scope: ScopeLevel, location: Option<&Location>) -> Option<Jurisdiction> {
    if scope != ScopeLevel::Regional {
        return None;
    }
    let loc = location?;
    let nonempty = |s: &Option<String>| s.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    match (nonempty(&loc.city), nonempty(&loc.state)) {
        (Some(city), state) => Some(Jurisdiction::Municipal { city, state }),
        (None, Some(state)) => Some(Jurisdiction::State { state }),
        (None, None) => None,
    }
}

#[derive(Debug, Clone, Copy)]
pub struct AggregateRequest<'a> {
    pub keywords: &'a [String],
    pub theme: Option<&'a str>,
    pub scope: ScopeLevel,
    pub location: Option<&'a Location>,
}

/// One source call, for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SourceOutcome {
    pub source: SourceKind,
    #[serde(flatten)]
    pub strategy: Strategy,
    pub items: usize,
    pub elapsed_ms: u64,
    /// true for timeouts, transport/status errors and malformed payloads.
    pub failed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Aggregated {
    pub items: Vec<NormalizedItem>,
    pub outcomes: Vec<SourceOutcome>,
    pub strategies: Vec<Strategy>,
    pub duplicates_dropped: usize,
}

impl Aggregated {
    /// Every source call failed (as opposed to answering with nothing).
    pub fn all_failed(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(|o| o.failed)
    }
}

pub struct MultiSourceAggregator {
    sources: Vec<Arc<dyn LegislativeSource>>,
    cfg: AggregatorConfig,
    year_window: u32,
}

impl MultiSourceAggregator {
    pub fn new(sources: Vec<Arc<dyn LegislativeSource>>, cfg: AggregatorConfig, year_window: u32) -> Self {
        Self {
            sources,
            cfg,
            year_window,
        }
    }

    fn source(&self, kind: SourceKind) -> Option<&Arc<dyn LegislativeSource>> {
        self.sources.iter().find(|s| s.kind() == kind)
    }

    fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.cfg.call_timeout_ms)
    }

    // leaves adapters time to hand back partial results before the hard ceiling
    fn adapter_budget(&self) -> Duration {
        self.call_timeout() * 4 / 5
    }

    pub async fn collect(&self, req: AggregateRequest<'_>) -> Aggregated {
        ensure_metrics_described();
        let mut out = Aggregated::default();
        let plan_sources = scope_sources(req.scope, &self.cfg);
        let jurisdiction = jurisdiction_for(req.scope, req.location);
        let mut already_run: Vec<StrategyPlan> = Vec::new();

        for (step, strategy) in cascade(req.scope, &self.cfg).into_iter().enumerate() {
            if step > 0 && out.items.len() >= self.cfg.result_floor {
                break;
            }
            let plan = strategy.plan(
                req.keywords,
                req.theme,
                plan_sources,
                self.cfg.broadest_source,
            );
            if plan.keywords.is_empty() || plan.targets.is_empty() || already_run.contains(&plan) {
                debug!(target: "aggregator", ?strategy, "strategy skipped");
                continue;
            }
            if step > 0 {
                counter!(FALLBACK_STEPS).increment(1);
                info!(target: "aggregator", ?strategy, have = out.items.len(), floor = self.cfg.result_floor, "broadening search");
            }

            let query = SourceQuery {
                keywords: plan.keywords.clone(),
                theme: plan.theme.clone(),
                year_window: self.year_window,
                limit: self.cfg.per_source_limit,
                jurisdiction: jurisdiction.clone(),
                budget: Some(self.adapter_budget()),
            };
            let calls = plan
                .targets
                .iter()
                .filter_map(|k| {
                    let found = self.source(*k);
                    if found.is_none() {
                        debug!(target: "aggregator", source = k.as_str(), "no adapter registered, skipped");
                    }
                    found
                })
                .map(|s| self.call(s.as_ref(), &query, strategy));
            for (outcome, mut items) in join_all(calls).await {
                out.outcomes.push(outcome);
                out.items.append(&mut items);
            }
            out.duplicates_dropped += dedup_in_place(&mut out.items);
            out.strategies.push(strategy);
            already_run.push(plan);
        }

        debug!(
            target: "aggregator",
            items = out.items.len(),
            calls = out.outcomes.len(),
            dupes = out.duplicates_dropped,
            "aggregation done"
        );
        out
    }

    /// Hand each item back to the adapter it came from for details, one
    /// time-boxed call per source. Items of unknown sources are left alone.
    pub async fn enrich<'a>(&self, items: impl IntoIterator<Item = &'a mut NormalizedItem>) {
        let mut groups: Vec<(SourceKind, Vec<&'a mut NormalizedItem>)> = Vec::new();
        for it in items {
            match groups.iter_mut().find(|(k, _)| *k == it.source) {
                Some((_, group)) => group.push(it),
                None => groups.push((it.source, vec![it])),
            }
        }
        let limit = self.call_timeout();
        let calls = groups.into_iter().filter_map(|(kind, mut group)| {
            let source = self.source(kind)?;
            Some(async move {
                if tokio::time::timeout(limit, source.enrich(group.as_mut_slice())).await.is_err() {
                    warn!(target: "aggregator", source = kind.as_str(), items = group.len(), "enrichment timed out");
                }
            })
        });
        join_all(calls).await;
    }

    /// One isolated, time-boxed source call.
    async fn call(
        &self,
        source: &dyn LegislativeSource,
        query: &SourceQuery,
        strategy: Strategy,
    ) -> (SourceOutcome, Vec<NormalizedItem>) {
        let kind = source.kind();
        let t0 = Instant::now();
        counter!(SOURCE_CALLS, "source" => kind.as_str()).increment(1);

        let res = tokio::time::timeout(self.call_timeout(), source.fetch(query))
            .await
            .unwrap_or(Err(crate::error::SourceError::Timeout));
        let elapsed_ms = t0.elapsed().as_millis() as u64;
        histogram!(SOURCE_CALL_MS, "source" => kind.as_str()).record(elapsed_ms as f64);

        let mut outcome = SourceOutcome {
            source: kind,
            strategy,
            items: 0,
            elapsed_ms,
            failed: false,
            error: None,
        };
        match res {
            Ok(items) => {
                outcome.items = items.len();
                counter!(SOURCE_ITEMS, "source" => kind.as_str()).increment(items.len() as u64);
                (outcome, items)
            }
            Err(e) => {
                if e.is_failure() {
                    warn!(target: "aggregator", source = kind.as_str(), kind = e.kind(), error = %e, "source failed");
                    counter!(SOURCE_ERRORS, "source" => kind.as_str()).increment(1);
                } else {
                    debug!(target: "aggregator", source = kind.as_str(), kind = e.kind(), "source returned nothing");
                }
                outcome.failed = e.is_failure();
                outcome.error = Some(e.kind().to_string());
                (outcome, Vec::new())
            }
        }
    }
}
