// tests/aggregator_cascade.rs
mod common;

use common::{bill, dyn_sources, kws, Reply, StubSource};
use coral_investigator::aggregator::{AggregateRequest, MultiSourceAggregator, Strategy};
use coral_investigator::config::AggregatorConfig;
use coral_investigator::geo::Location;
use coral_investigator::sources::{Jurisdiction, LegislativeSource, SourceKind};
use coral_investigator::ScopeLevel;
use std::sync::Arc;
use std::time::Duration;

fn aggregator(sources: Vec<Arc<dyn LegislativeSource>>) -> MultiSourceAggregator {
    MultiSourceAggregator::new(sources, AggregatorConfig::default(), 2)
}

fn item(source: SourceKind, id: &str, number: &str) -> coral_investigator::sources::NormalizedItem {
    bill(source, id, number, 2025, "Dispõe sobre buraco e calçada em vias urbanas")
}

#[tokio::test]
async fn floor_reached_on_first_pass_stops_cascade() {
    let chamber = StubSource::new(
        SourceKind::Chamber,
        vec![Reply::Items(vec![
            item(SourceKind::Chamber, "1", "1"),
            item(SourceKind::Chamber, "2", "2"),
            item(SourceKind::Chamber, "3", "3"),
        ])],
    );
    let senate = StubSource::new(SourceKind::Senate, vec![Reply::Empty]);
    let cross = StubSource::new(SourceKind::CrossIndex, vec![Reply::Empty]);
    let agg = aggregator(dyn_sources(&[&chamber, &senate, &cross]));

    let keywords = kws(&["buraco", "calçada"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::National,
            location: None,
        })
        .await;

    assert_eq!(out.items.len(), 3);
    assert_eq!(out.strategies, vec![Strategy::AsRequested]);
    assert_eq!(chamber.calls(), 1);
    assert_eq!(senate.calls(), 1);
    assert_eq!(cross.calls(), 1);
    assert_eq!(out.outcomes.len(), 3);
    assert!(!out.all_failed());
}

#[tokio::test]
async fn cascade_broadens_until_floor() {
    let chamber = StubSource::new(
        SourceKind::Chamber,
        vec![Reply::Items(vec![item(SourceKind::Chamber, "1", "1")]), Reply::Empty],
    );
    let senate = StubSource::new(SourceKind::Senate, vec![Reply::Empty]);
    let cross = StubSource::new(
        SourceKind::CrossIndex,
        vec![
            Reply::Empty,
            Reply::Empty,
            Reply::Items(vec![
                item(SourceKind::CrossIndex, "b", "20"),
                item(SourceKind::CrossIndex, "c", "30"),
            ]),
        ],
    );
    let agg = aggregator(dyn_sources(&[&chamber, &senate, &cross]));

    let keywords = kws(&["buraco", "calçada", "asfalto"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::National,
            location: None,
        })
        .await;

    assert_eq!(
        out.strategies,
        vec![
            Strategy::AsRequested,
            Strategy::DropTheme,
            Strategy::TopKeywordsBroadest { keywords: 2 }
        ]
    );
    assert_eq!(out.items.len(), 3);

    // step 1 carries the theme, step 2 drops it, step 3 hits only the index
    assert_eq!(cross.query(0).theme.as_deref(), Some("zeladoria"));
    assert_eq!(cross.query(1).theme, None);
    assert_eq!(cross.query(2).keywords, kws(&["buraco", "calçada"]));
    assert_eq!(cross.query(2).theme, None);
    assert_eq!(chamber.calls(), 2);
    assert_eq!(senate.calls(), 2);
    assert_eq!(cross.calls(), 3);

    // items from the first pass are kept
    assert_eq!(out.items[0].external_id, "camara:1");
}

#[tokio::test]
async fn identical_fallback_plan_is_skipped_without_theme() {
    let chamber = StubSource::new(SourceKind::Chamber, vec![Reply::Empty]);
    let senate = StubSource::new(SourceKind::Senate, vec![Reply::Empty]);
    let cross = StubSource::new(SourceKind::CrossIndex, vec![Reply::Empty]);
    let agg = aggregator(dyn_sources(&[&chamber, &senate, &cross]));

    let keywords = kws(&["barulho", "festa", "madrugada"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: None,
            scope: ScopeLevel::National,
            location: None,
        })
        .await;

    assert_eq!(
        out.strategies,
        vec![Strategy::AsRequested, Strategy::TopKeywordsBroadest { keywords: 2 }]
    );
    assert_eq!(chamber.calls(), 1);
    assert_eq!(cross.calls(), 2);
    assert!(out.items.is_empty());
    // empty answers are not failures
    assert!(!out.all_failed());
}

#[tokio::test]
async fn duplicates_across_sources_are_dropped() {
    let chamber = StubSource::new(
        SourceKind::Chamber,
        vec![Reply::Items(vec![item(SourceKind::Chamber, "9001", "0012")])],
    );
    let cross = StubSource::new(
        SourceKind::CrossIndex,
        vec![Reply::Items(vec![
            item(SourceKind::CrossIndex, "urn:x", "12"),
            item(SourceKind::CrossIndex, "urn:y", "13"),
            item(SourceKind::CrossIndex, "urn:z", "14"),
        ])],
    );
    let agg = aggregator(dyn_sources(&[&cross, &chamber]));

    let keywords = kws(&["buraco", "calçada"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::National,
            location: None,
        })
        .await;

    assert_eq!(out.duplicates_dropped, 1);
    assert_eq!(out.items.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn failing_sources_are_isolated() {
    let chamber = StubSource::new(SourceKind::Chamber, vec![Reply::Status(503)]);
    let senate = StubSource::new(SourceKind::Senate, vec![Reply::Hang(Duration::from_secs(60))]);
    let cross = StubSource::new(
        SourceKind::CrossIndex,
        vec![Reply::Items(vec![
            item(SourceKind::CrossIndex, "a", "1"),
            item(SourceKind::CrossIndex, "b", "2"),
            item(SourceKind::CrossIndex, "c", "3"),
        ])],
    );
    let cfg = AggregatorConfig {
        call_timeout_ms: 100,
        ..AggregatorConfig::default()
    };
    let agg = MultiSourceAggregator::new(dyn_sources(&[&chamber, &senate, &cross]), cfg, 2);

    let keywords = kws(&["buraco", "calçada"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::National,
            location: None,
        })
        .await;

    assert_eq!(out.items.len(), 3);
    let by = |k: SourceKind| out.outcomes.iter().find(|o| o.source == k).unwrap();
    assert!(by(SourceKind::Chamber).failed);
    assert_eq!(by(SourceKind::Chamber).error.as_deref(), Some("status"));
    assert!(by(SourceKind::Senate).failed);
    assert_eq!(by(SourceKind::Senate).error.as_deref(), Some("timeout"));
    assert!(!by(SourceKind::CrossIndex).failed);
    assert!(!out.all_failed());
}

#[tokio::test]
async fn all_sources_failing_is_degraded() {
    let chamber = StubSource::new(SourceKind::Chamber, vec![Reply::Status(500)]);
    let senate = StubSource::new(SourceKind::Senate, vec![Reply::Status(502)]);
    let cross = StubSource::new(SourceKind::CrossIndex, vec![Reply::Status(503)]);
    let agg = aggregator(dyn_sources(&[&chamber, &senate, &cross]));

    let keywords = kws(&["buraco", "calçada"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::National,
            location: None,
        })
        .await;

    assert!(out.items.is_empty());
    assert!(out.all_failed());
}

#[tokio::test]
async fn local_scope_queries_nothing() {
    let cross = StubSource::new(SourceKind::CrossIndex, vec![Reply::Empty]);
    let agg = aggregator(dyn_sources(&[&cross]));
    let keywords = kws(&["buraco"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::Local,
            location: Some(&Location::at(-23.55, -46.63)),
        })
        .await;
    assert_eq!(cross.calls(), 0);
    assert!(out.outcomes.is_empty());
    assert!(!out.all_failed());
}

#[tokio::test]
async fn regional_scope_narrows_cross_index_by_city() {
    let chamber = StubSource::new(SourceKind::Chamber, vec![Reply::Empty]);
    let cross = StubSource::new(SourceKind::CrossIndex, vec![Reply::Empty]);
    let agg = aggregator(dyn_sources(&[&chamber, &cross]));

    let loc = Location {
        city: Some("Campinas".into()),
        state: Some("SP".into()),
        ..Location::default()
    };
    let keywords = kws(&["buraco", "calçada"]);
    let out = agg
        .collect(AggregateRequest {
            keywords: &keywords,
            theme: Some("zeladoria"),
            scope: ScopeLevel::Regional,
            location: Some(&loc),
        })
        .await;

    assert_eq!(chamber.calls(), 0);
    assert_eq!(cross.calls(), 1);
    assert_eq!(out.strategies, vec![Strategy::AsRequested]);
    assert_eq!(
        cross.query(0).jurisdiction,
        Some(Jurisdiction::Municipal {
            city: "Campinas".into(),
            state: Some("SP".into())
        })
    );
}
