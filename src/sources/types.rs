// src/sources/types.rs
use crate::error::SourceError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which upstream a normalized item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Lower house open-data API (JSON).
    Chamber,
    /// Upper house open-data API (XML).
    Senate,
    /// Cross-jurisdiction legal index (SRU/XML), federal + state + municipal.
    CrossIndex,
    /// Official gazettes. Placeholder.
    Gazette,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Chamber => "chamber",
            SourceKind::Senate => "senate",
            SourceKind::CrossIndex => "cross_index",
            SourceKind::Gazette => "gazette",
        }
    }

    /// Prefix of `NormalizedItem::external_id`.
    pub fn id_prefix(self) -> &'static str {
        match self {
            SourceKind::Chamber => "camara",
            SourceKind::Senate => "senado",
            SourceKind::CrossIndex => "lexml",
            SourceKind::Gazette => "diario",
        }
    }

    /// Federal legislative houses, favoured by ranking.
    pub fn is_primary_legislature(self) -> bool {
        matches!(self, SourceKind::Chamber | SourceKind::Senate)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Ordinary/complementary bill, decree bill, provisional measure.
    Bill,
    /// Constitutional amendment proposal.
    Amendment,
    /// Enacted norm (law, decree, resolution...).
    Law,
    Other,
}

impl ItemType {
    /// Map an upstream type code ("PL", "PEC", "LEI", "lei.complementar", ...).
    pub fn from_code(code: &str) -> Self {
        let c = code.trim().to_ascii_uppercase().replace(['.', '_', '-'], " ");
        let c = c.trim();
        match c {
            "PEC" => ItemType::Amendment,
            "PL" | "PLS" | "PLP" | "PLC" | "PLN" | "PDL" | "PDC" | "PDS" | "PLV" | "MPV" | "MP" => {
                ItemType::Bill
            }
            _ if c.starts_with("PROJETO") || c.starts_with("MEDIDA PROVISORIA") => ItemType::Bill,
            _ if c.starts_with("PROPOSTA EMENDA") => ItemType::Amendment,
            _ if c.starts_with("LEI")
                || c.starts_with("DECRETO")
                || c.starts_with("RESOLUCAO")
                || c.starts_with("PORTARIA")
                || c.starts_with("CONSTITUICAO")
                || c.starts_with("EMENDA CONSTITUCIONAL") =>
            {
                ItemType::Law
            }
            _ => ItemType::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ItemType::Bill => "bill",
            ItemType::Amendment => "amendment",
            ItemType::Law => "law",
            ItemType::Other => "other",
        }
    }
}

/// Optional sub-national filter for the cross-jurisdiction index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum Jurisdiction {
    State { state: String },
    Municipal { city: String, state: Option<String> },
}

/// What every adapter is asked for.
#[derive(Debug, Clone, Default)]
pub struct SourceQuery {
    pub keywords: Vec<String>,
    pub theme: Option<String>,
    /// Extra years before the current one (year-windowed sources only).
    pub year_window: u32,
    pub limit: usize,
    pub jurisdiction: Option<Jurisdiction>,
    /// Multi-request adapters stop here and return what they have.
    pub budget: Option<Duration>,
}

/// A legislative document in the common shape every adapter produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedItem {
    /// "<prefix>:<upstream id>", unique across sources.
    pub external_id: String,
    pub source: SourceKind,
    pub item_type: ItemType,
    /// Upstream type code as given ("PL", "PEC", "LEI"...).
    pub type_code: String,
    pub number: Option<String>,
    pub year: Option<i32>,
    pub title: Option<String>,
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_text_excerpt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub url: Option<String>,
    #[serde(default)]
    pub raw_payload: serde_json::Value,
    /// Query keywords this item was retrieved with.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Adapter-local relevance hint (keyword hits on the summary).
    #[serde(default)]
    pub local_score: u32,
}

impl NormalizedItem {
    /// Human designation like "PL 123/2024".
    pub fn designation(&self) -> String {
        designation(&self.type_code, self.number.as_deref(), self.year)
    }
}

pub fn designation(type_code: &str, number: Option<&str>, year: Option<i32>) -> String {
    match (number, year) {
        (Some(n), Some(y)) => format!("{type_code} {n}/{y}"),
        (Some(n), None) => format!("{type_code} {n}"),
        (None, Some(y)) => format!("{type_code} ({y})"),
        (None, None) => type_code.to_string(),
    }
}

#[async_trait::async_trait]
pub trait LegislativeSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Query the upstream. Errors say why nothing came back.
    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<NormalizedItem>, SourceError>;

    /// Fill in details (e.g. status) for items of this source that are about
    /// to be shown. Best effort: anything not found is left as is.
    async fn enrich(&self, _items: &mut [&mut NormalizedItem]) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_map_to_categories() {
        assert_eq!(ItemType::from_code("PL"), ItemType::Bill);
        assert_eq!(ItemType::from_code("plp"), ItemType::Bill);
        assert_eq!(ItemType::from_code("PEC"), ItemType::Amendment);
        assert_eq!(ItemType::from_code("lei.complementar"), ItemType::Law);
        assert_eq!(ItemType::from_code("LEI"), ItemType::Law);
        assert_eq!(ItemType::from_code("projeto.lei"), ItemType::Bill);
        assert_eq!(ItemType::from_code("REQ"), ItemType::Other);
    }

    #[test]
    fn designation_formats() {
        assert_eq!(designation("PL", Some("123"), Some(2024)), "PL 123/2024");
        assert_eq!(designation("LEI", None, Some(1990)), "LEI (1990)");
    }
}
