// tests/common/mod.rs
// Shared stubs for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use coral_investigator::advisor::{AdvisorRequest, LawAdvisor};
use coral_investigator::cache::{InteractionKind, ItemStore, LegislativeItem};
use coral_investigator::embedding::Embedder;
use coral_investigator::error::{SourceError, StoreError};
use coral_investigator::knowledge::KnownRight;
use coral_investigator::similarity::{DemandIndex, DemandQuery, SimilarDemand};
use coral_investigator::sources::{
    ItemType, LegislativeSource, NormalizedItem, SourceKind, SourceQuery,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// What a stub source answers.
#[derive(Clone)]
pub enum Reply {
    Items(Vec<NormalizedItem>),
    Empty,
    Status(u16),
    Hang(Duration),
}

/// Scripted source: answers by call index (last reply repeats), records queries.
pub struct StubSource {
    kind: SourceKind,
    replies: Vec<Reply>,
    /// Status written by `enrich`, when set.
    status: Option<String>,
    pub queries: Mutex<Vec<SourceQuery>>,
    pub enriched: Mutex<Vec<String>>,
}

impl StubSource {
    pub fn new(kind: SourceKind, replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            kind,
            replies,
            status: None,
            queries: Mutex::new(Vec::new()),
            enriched: Mutex::new(Vec::new()),
        })
    }

    pub fn with_status(kind: SourceKind, replies: Vec<Reply>, status: &str) -> Arc<Self> {
        Arc::new(Self {
            kind,
            replies,
            status: Some(status.to_string()),
            queries: Mutex::new(Vec::new()),
            enriched: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    pub fn query(&self, i: usize) -> SourceQuery {
        self.queries.lock().unwrap()[i].clone()
    }
}

#[async_trait]
impl LegislativeSource for StubSource {
    fn kind(&self) -> SourceKind {
        self.kind
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<NormalizedItem>, SourceError> {
        let idx = {
            let mut q = self.queries.lock().unwrap();
            q.push(query.clone());
            q.len() - 1
        };
        let reply = self
            .replies
            .get(idx)
            .or_else(|| self.replies.last())
            .cloned()
            .unwrap_or(Reply::Empty);
        match reply {
            Reply::Items(items) if items.is_empty() => Err(SourceError::NoResults),
            Reply::Items(items) => Ok(items),
            Reply::Empty => Err(SourceError::NoResults),
            Reply::Status(code) => Err(SourceError::Status(code)),
            Reply::Hang(d) => {
                tokio::time::sleep(d).await;
                Ok(Vec::new())
            }
        }
    }

    async fn enrich(&self, items: &mut [&mut NormalizedItem]) {
        let mut seen = self.enriched.lock().unwrap();
        for it in items.iter_mut() {
            seen.push(it.external_id.clone());
            if let Some(status) = &self.status {
                it.status = Some(status.clone());
            }
        }
    }
}

/// Demand index whose queries never complete.
pub struct HangingDemandIndex;

#[async_trait]
impl DemandIndex for HangingDemandIndex {
    async fn nearest(&self, _query: &DemandQuery) -> Result<Vec<SimilarDemand>, StoreError> {
        std::future::pending().await
    }
}

/// Item store whose writes never complete.
pub struct HangingItemStore;

#[async_trait]
impl ItemStore for HangingItemStore {
    async fn upsert_batch(&self, _items: &[LegislativeItem]) -> Result<Vec<Uuid>, StoreError> {
        std::future::pending().await
    }

    async fn record_interaction(
        &self,
        _user_id: Uuid,
        _item_id: Uuid,
        _kind: InteractionKind,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}

/// What a stub advisor answers.
#[derive(Clone)]
pub enum AdvisorReply {
    Rights(Vec<KnownRight>),
    Fail,
    Hang,
}

pub struct StubAdvisor {
    reply: AdvisorReply,
    pub calls: Mutex<usize>,
}

impl StubAdvisor {
    pub fn new(reply: AdvisorReply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            calls: Mutex::new(0),
        })
    }
}

#[async_trait]
impl LawAdvisor for StubAdvisor {
    async fn existing_rights(&self, _req: &AdvisorRequest<'_>) -> anyhow::Result<Vec<KnownRight>> {
        *self.calls.lock().unwrap() += 1;
        match self.reply.clone() {
            AdvisorReply::Rights(r) => Ok(r),
            AdvisorReply::Fail => anyhow::bail!("quota exceeded"),
            AdvisorReply::Hang => std::future::pending().await,
        }
    }
    fn name(&self) -> &'static str {
        "stub"
    }
}

/// A right as an advisor would report it.
pub fn advised_right(name: &str, article: &str) -> KnownRight {
    KnownRight {
        id: "advisor_1".into(),
        name: name.into(),
        article: article.into(),
        scope: "federal".into(),
        simple_explanation: "Explicação simples.".into(),
        how_to_use: "Como usar.".into(),
        where_to_complain: "Procon".into(),
        keywords: Vec::new(),
    }
}

/// Embedder returning a fixed vector.
pub struct FixedEmbedder(pub Vec<f32>);

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(self.0.clone())
    }
    fn dimensions(&self) -> usize {
        self.0.len()
    }
    fn name(&self) -> &'static str {
        "fixed"
    }
}

/// Embedder that always errors.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("provider unavailable")
    }
    fn dimensions(&self) -> usize {
        3
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

/// Embedder whose calls never complete.
pub struct HangingEmbedder;

#[async_trait]
impl Embedder for HangingEmbedder {
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        std::future::pending().await
    }
    fn dimensions(&self) -> usize {
        3
    }
    fn name(&self) -> &'static str {
        "hanging"
    }
}

pub fn kws(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// A bill with a summary, from `source`.
pub fn bill(source: SourceKind, id: &str, number: &str, year: i32, summary: &str) -> NormalizedItem {
    NormalizedItem {
        external_id: format!("{}:{id}", source.id_prefix()),
        source,
        item_type: ItemType::Bill,
        type_code: "PL".into(),
        number: Some(number.into()),
        year: Some(year),
        title: Some(format!("PL {number}/{year}")),
        summary: Some(summary.into()),
        full_text_excerpt: None,
        status: None,
        url: None,
        raw_payload: serde_json::Value::Null,
        keywords: Vec::new(),
        local_score: 0,
    }
}

/// An enacted law with a summary.
pub fn law(source: SourceKind, id: &str, number: &str, year: i32, summary: &str) -> NormalizedItem {
    NormalizedItem {
        item_type: ItemType::Law,
        type_code: "LEI".into(),
        title: Some(format!("Lei {number}/{year}")),
        ..bill(source, id, number, year, summary)
    }
}

/// Upcast stubs for the aggregator / investigator.
pub fn dyn_sources(stubs: &[&Arc<StubSource>]) -> Vec<Arc<dyn LegislativeSource>> {
    stubs
        .iter()
        .map(|s| (*s).clone() as Arc<dyn LegislativeSource>)
        .collect()
}
