// src/cache.rs
//! Local cache of legislative items shown to citizens, plus interaction logging.

use crate::error::StoreError;
use crate::metrics::{CACHE_ERRORS, CACHE_UPSERTS};
use crate::ranking::RankedItem;
use crate::sources::{ItemType, NormalizedItem, SourceKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};
use uuid::Uuid;

/// Row shape of the item cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegislativeItem {
    pub external_id: String,
    pub source: SourceKind,
    pub item_type: ItemType,
    pub type_code: String,
    pub number: Option<String>,
    pub year: Option<i32>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub full_text_excerpt: Option<String>,
    pub status: Option<String>,
    pub url: Option<String>,
    pub raw_payload: serde_json::Value,
    pub keywords: Vec<String>,
}

impl From<&NormalizedItem> for LegislativeItem {
    fn from(n: &NormalizedItem) -> Self {
        Self {
            external_id: n.external_id.clone(),
            source: n.source,
            item_type: n.item_type,
            type_code: n.type_code.clone(),
            number: n.number.clone(),
            year: n.year,
            title: n.title.clone(),
            summary: n.summary.clone(),
            full_text_excerpt: n.full_text_excerpt.clone(),
            status: n.status.clone(),
            url: n.url.clone(),
            raw_payload: n.raw_payload.clone(),
            keywords: n.keywords.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    View,
}

impl InteractionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionKind::View => "view",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Interaction {
    pub user_id: Uuid,
    pub item_id: Uuid,
    pub kind: InteractionKind,
    pub at: DateTime<Utc>,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert-or-update by `external_id`, all or nothing. Returns row ids in input order.
    async fn upsert_batch(&self, items: &[LegislativeItem]) -> Result<Vec<Uuid>, StoreError>;

    async fn record_interaction(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), StoreError>;
}

/// In-process store. One lock per batch keeps batches atomic.
#[derive(Debug, Default)]
pub struct MemoryItemStore {
    rows: Mutex<HashMap<String, (Uuid, LegislativeItem, DateTime<Utc>)>>,
    interactions: Mutex<Vec<Interaction>>,
    fail_writes: std::sync::atomic::AtomicBool,
}

impl MemoryItemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent writes fail (exercises rollback paths).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes
            .store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap_or_else(|p| p.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, external_id: &str) -> Option<(Uuid, LegislativeItem)> {
        self.rows
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .get(external_id)
            .map(|(id, item, _)| (*id, item.clone()))
    }

    pub fn interactions(&self) -> Vec<Interaction> {
        self.interactions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .clone()
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Other("store is read-only".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for MemoryItemStore {
    async fn upsert_batch(&self, items: &[LegislativeItem]) -> Result<Vec<Uuid>, StoreError> {
        self.check_writable()?;
        let mut rows = self.rows.lock().unwrap_or_else(|p| p.into_inner());
        let now = Utc::now();
        let mut ids = Vec::with_capacity(items.len());
        for item in items {
            let id = match rows.get(&item.external_id) {
                Some((id, _, _)) => *id,
                None => Uuid::new_v4(),
            };
            rows.insert(item.external_id.clone(), (id, item.clone(), now));
            ids.push(id);
        }
        Ok(ids)
    }

    async fn record_interaction(
        &self,
        user_id: Uuid,
        item_id: Uuid,
        kind: InteractionKind,
    ) -> Result<(), StoreError> {
        self.check_writable()?;
        let known = self
            .rows
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .values()
            .any(|(id, _, _)| *id == item_id);
        if !known {
            return Err(StoreError::NotFound(format!("legislative item {item_id}")));
        }
        self.interactions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(Interaction {
                user_id,
                item_id,
                kind,
                at: Utc::now(),
            });
        Ok(())
    }
}

/// Persists items that are about to be shown. Failures are logged, never raised.
#[derive(Clone)]
pub struct LegislativeItemCache {
    store: Arc<dyn ItemStore>,
    write_timeout: Duration,
}

impl LegislativeItemCache {
    pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    pub fn new(store: Arc<dyn ItemStore>) -> Self {
        Self {
            store,
            write_timeout: Self::DEFAULT_WRITE_TIMEOUT,
        }
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Upsert `ranked` and fill in their `cache_id`. On failure the batch is
    /// rolled back by the store and items keep `cache_id = None`.
    pub async fn persist(&self, ranked: &mut [RankedItem]) -> bool {
        if ranked.is_empty() {
            return true;
        }
        let rows: Vec<LegislativeItem> = ranked.iter().map(|r| LegislativeItem::from(&r.item)).collect();
        // an abandoned batch is dropped uncommitted
        let res = tokio::time::timeout(self.write_timeout, self.store.upsert_batch(&rows))
            .await
            .unwrap_or_else(|_| {
                Err(StoreError::Other(format!(
                    "batch upsert timed out after {} ms",
                    self.write_timeout.as_millis()
                )))
            });
        match res {
            Ok(ids) => {
                for (r, id) in ranked.iter_mut().zip(ids) {
                    r.cache_id = Some(id);
                }
                counter!(CACHE_UPSERTS).increment(rows.len() as u64);
                debug!(target: "cache", count = rows.len(), "items cached");
                true
            }
            Err(e) => {
                error!(target: "cache", error = %e, count = rows.len(), "item cache batch failed, rolled back");
                counter!(CACHE_ERRORS).increment(1);
                false
            }
        }
    }

    pub async fn record_view(&self, user_id: Uuid, item_id: Uuid) -> Result<(), StoreError> {
        self.store
            .record_interaction(user_id, item_id, InteractionKind::View)
            .await
    }
}
