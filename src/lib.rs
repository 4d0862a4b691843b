// src/lib.rs
// Public library surface for the probe binary and integration tests.

pub mod config;
pub mod error;
pub mod metrics;
pub mod telemetry;

// Input handling
pub mod geo;
pub mod keywords;
pub mod scope;

// Legislative search: adapters, fan-out, scoring
pub mod aggregator;
pub mod ranking;
pub mod sources;

// Semantic matching against existing demands
pub mod embedding;
pub mod similarity;

// Persistence
pub mod cache;
pub mod storage;

// Decision layer
pub mod advisor;
pub mod investigation;
pub mod knowledge;
pub mod scenario;

// ---- Re-exports for stable public API ----
pub use crate::config::InvestigationConfig;
pub use crate::error::{SourceError, StoreError};
pub use crate::geo::{Coordinates, Location};
pub use crate::investigation::{
    Classification, Dependencies, Diagnostics, InvestigationResult, Investigator,
};
pub use crate::scenario::{Scenario, ScenarioSelection};
pub use crate::scope::ScopeLevel;
