// src/sources/gazette.rs
//! Official gazettes. There is no usable search upstream yet, so this adapter
//! answers with an empty list. It exists so scope plans can name it.

use super::{LegislativeSource, NormalizedItem, SourceKind, SourceQuery};
use crate::error::SourceError;
use async_trait::async_trait;

#[derive(Debug, Default)]
pub struct GazetteSource;

impl GazetteSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LegislativeSource for GazetteSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Gazette
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<NormalizedItem>, SourceError> {
        tracing::debug!(target: "sources", source = "gazette", keywords = query.keywords.len(), "gazette search is a no-op");
        Ok(Vec::new())
    }
}
