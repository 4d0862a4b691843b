// src/ranking.rs
//! Additive relevance scoring over normalized items, plus the quality gate
//! applied before anything is shown to a citizen.

use crate::config::{RankingConfig, RankingWeights};
use crate::keywords::fold;
use crate::sources::NormalizedItem;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    #[serde(flatten)]
    pub item: NormalizedItem,
    pub score: i32,
    /// Keywords found in title or summary.
    pub matched: Vec<String>,
    /// Row id in the item cache, once persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_id: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct RelevanceRanker {
    weights: RankingWeights,
}

impl Default for RelevanceRanker {
    fn default() -> Self {
        Self::new(RankingWeights::default())
    }
}

impl RelevanceRanker {
    pub fn new(weights: RankingWeights) -> Self {
        Self { weights }
    }

    /// Score one item; returns (score, matched keywords).
    pub fn score(&self, item: &NormalizedItem, keywords: &[String], current_year: i32) -> (i32, Vec<String>) {
        let w = &self.weights;
        let title = fold(item.title.as_deref().unwrap_or_default());
        let summary = fold(item.summary.as_deref().unwrap_or_default());

        let mut score = 0i32;
        let mut matched = Vec::new();
        for kw in keywords {
            let k = fold(kw.trim());
            if k.is_empty() {
                continue;
            }
            let in_title = title.contains(&k);
            let occurrences = summary.matches(k.as_str()).count() as i32;
            if in_title {
                score += w.title_hit;
            }
            score += w.summary_occurrence * occurrences;
            if in_title || occurrences > 0 {
                score += w.breadth_hit;
                matched.push(kw.clone());
            }
        }

        match item.year {
            Some(y) if y == current_year => score += w.current_year,
            Some(y) if y == current_year - 1 => score += w.previous_year,
            _ => {}
        }
        if item.source.is_primary_legislature() {
            score += w.primary_source;
        }
        if !summary.trim().is_empty() {
            score += w.has_summary;
        }
        (score, matched)
    }

    /// Score and sort descending. Ties: adapter hint, then newer year.
    pub fn rank(&self, items: Vec<NormalizedItem>, keywords: &[String], current_year: i32) -> Vec<RankedItem> {
        let mut ranked: Vec<RankedItem> = items
            .into_iter()
            .map(|item| {
                let (score, matched) = self.score(&item, keywords, current_year);
                RankedItem {
                    item,
                    score,
                    matched,
                    cache_id: None,
                }
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then(b.item.local_score.cmp(&a.item.local_score))
                .then(b.item.year.unwrap_or(i32::MIN).cmp(&a.item.year.unwrap_or(i32::MIN)))
        });
        ranked
    }
}

/// What to do when nothing passes the quality gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmptyPolicy {
    /// Return nothing.
    Strict,
    /// Return the top-ranked items anyway.
    NeverEmpty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filtered {
    pub items: Vec<RankedItem>,
    /// Items were kept only because of `EmptyPolicy::NeverEmpty`.
    pub used_fallback: bool,
}

#[derive(Debug, Clone)]
pub struct QualityFilter {
    pub min_score: i32,
    pub min_summary_chars: usize,
    pub top_k: usize,
}

impl Default for QualityFilter {
    fn default() -> Self {
        Self::from(&RankingConfig::default())
    }
}

impl From<&RankingConfig> for QualityFilter {
    fn from(cfg: &RankingConfig) -> Self {
        Self {
            min_score: cfg.min_score,
            min_summary_chars: cfg.min_summary_chars,
            top_k: cfg.top_k,
        }
    }
}

impl QualityFilter {
    pub fn passes(&self, r: &RankedItem) -> bool {
        let title_ok = r
            .item
            .title
            .as_deref()
            .map(|t| !t.trim().is_empty())
            .unwrap_or(false);
        let summary_ok = r
            .item
            .summary
            .as_deref()
            .map(|s| s.trim().chars().count() >= self.min_summary_chars)
            .unwrap_or(false);
        title_ok && summary_ok && r.score >= self.min_score
    }

    /// Keep passing items (already ranked), capped at `top_k`.
    pub fn apply(&self, ranked: Vec<RankedItem>, policy: EmptyPolicy) -> Filtered {
        let passing: Vec<RankedItem> = ranked.iter().filter(|r| self.passes(r)).take(self.top_k).cloned().collect();
        if !passing.is_empty() || policy == EmptyPolicy::Strict {
            return Filtered {
                items: passing,
                used_fallback: false,
            };
        }
        let used_fallback = !ranked.is_empty();
        Filtered {
            items: ranked.into_iter().take(self.top_k).collect(),
            used_fallback,
        }
    }
}
