// src/metrics.rs
//! Metric names used across the engine. The library only emits through the
//! `metrics` facade; installing a recorder/exporter is up to the host.

use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;

pub const INVESTIGATION_RUNS: &str = "investigation_runs_total";
pub const SOURCE_CALLS: &str = "source_calls_total";
pub const SOURCE_ERRORS: &str = "source_errors_total";
pub const SOURCE_ITEMS: &str = "source_items_total";
pub const SOURCE_CALL_MS: &str = "source_call_ms";
pub const SOURCE_PARSE_MS: &str = "source_parse_ms";
pub const FALLBACK_STEPS: &str = "aggregator_fallback_steps_total";
pub const CACHE_UPSERTS: &str = "cache_upserts_total";
pub const CACHE_ERRORS: &str = "cache_errors_total";
pub const SIMILARITY_MATCHES: &str = "similarity_matches_total";
pub const EMBEDDING_ABSENT: &str = "embedding_absent_total";
pub const SCENARIO_SELECTED: &str = "scenario_selected_total";
pub const ADVISOR_CALLS: &str = "advisor_calls_total";

/// One-time metrics registration (so series carry descriptions once a recorder exists).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(INVESTIGATION_RUNS, "Investigations executed.");
        describe_counter!(SOURCE_CALLS, "Legislative source calls issued.");
        describe_counter!(
            SOURCE_ERRORS,
            "Legislative source calls that failed (timeout, status, malformed)."
        );
        describe_counter!(SOURCE_ITEMS, "Normalized items returned by sources.");
        describe_histogram!(SOURCE_CALL_MS, "Source call latency in milliseconds.");
        describe_histogram!(SOURCE_PARSE_MS, "Adapter fetch+parse time in milliseconds.");
        describe_counter!(
            FALLBACK_STEPS,
            "Broader query strategies applied after the first pass."
        );
        describe_counter!(CACHE_UPSERTS, "Legislative items upserted into the cache.");
        describe_counter!(CACHE_ERRORS, "Cache batches rolled back.");
        describe_counter!(SIMILARITY_MATCHES, "Similar demands returned.");
        describe_counter!(
            EMBEDDING_ABSENT,
            "Reports for which no embedding could be produced."
        );
        describe_counter!(SCENARIO_SELECTED, "Scenarios selected, by scenario.");
        describe_counter!(ADVISOR_CALLS, "Law advisor calls, by outcome.");
    });
}
