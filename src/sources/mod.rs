// src/sources/mod.rs
//! Legislative source adapters and the helpers they share.

pub mod chamber;
pub mod gazette;
pub mod lexml;
pub mod senate;
pub mod types;

pub use types::{
    designation, ItemType, Jurisdiction, LegislativeSource, NormalizedItem, SourceKind, SourceQuery,
};

use crate::config::SourcesConfig;
use crate::keywords::fold;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Cap applied to normalized summaries/titles.
pub const MAX_TEXT_CHARS: usize = 1500;

/// Normalize upstream text: decode entities, strip tags, ASCII quotes,
/// collapse whitespace, cap length.
pub fn normalize_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: once_cell::sync::OnceCell<regex::Regex> = once_cell::sync::OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }

    out
}

/// `normalize_text`, mapping empty results to None.
pub fn normalize_opt(s: Option<&str>) -> Option<String> {
    s.map(normalize_text).filter(|t| !t.is_empty())
}

/// How many of `keywords` occur in `text` (accent/case-insensitive containment).
pub fn keyword_hits(text: &str, keywords: &[String]) -> u32 {
    let hay = fold(text);
    keywords
        .iter()
        .map(|k| fold(k.trim()))
        .filter(|k| !k.is_empty() && hay.contains(k.as_str()))
        .count() as u32
}

fn strip_leading_zeros(n: &str) -> String {
    let digits: String = n.chars().filter(|c| c.is_alphanumeric()).collect();
    let trimmed = digits.trim_start_matches('0');
    if trimmed.is_empty() && !digits.is_empty() {
        "0".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Identity of a document across sources: type + number + year when all are
/// known, otherwise the source-qualified external id.
pub fn dedup_key(item: &NormalizedItem) -> String {
    match (item.number.as_deref(), item.year) {
        (Some(n), Some(y)) if !n.trim().is_empty() => format!(
            "{}|{}|{}",
            fold(item.type_code.trim()).replace(['.', ' '], ""),
            strip_leading_zeros(n).to_lowercase(),
            y
        ),
        _ => fold(&item.external_id),
    }
}

/// Drop later duplicates, keeping the first occurrence. Returns the number dropped.
pub fn dedup_in_place(items: &mut Vec<NormalizedItem>) -> usize {
    let before = items.len();
    let mut seen = HashSet::new();
    items.retain(|it| seen.insert(dedup_key(it)));
    before - items.len()
}

/// Shared HTTP client for all adapters.
pub fn http_client(cfg: &SourcesConfig) -> anyhow::Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(cfg.user_agent.clone())
        .timeout(Duration::from_millis(cfg.request_timeout_ms))
        .connect_timeout(Duration::from_millis(cfg.connect_timeout_ms))
        .build()?;
    Ok(client)
}

/// Build every enabled HTTP adapter from config.
pub fn build_sources(cfg: &SourcesConfig) -> anyhow::Result<Vec<Arc<dyn LegislativeSource>>> {
    let http = http_client(cfg)?;
    let mut out: Vec<Arc<dyn LegislativeSource>> = Vec::new();
    if cfg.chamber.enabled {
        out.push(Arc::new(chamber::ChamberSource::new(http.clone(), cfg.chamber.clone())));
    }
    if cfg.senate.enabled {
        out.push(Arc::new(senate::SenateSource::new(http.clone(), cfg.senate.clone())));
    }
    if cfg.cross_index.enabled {
        out.push(Arc::new(lexml::CrossIndexSource::new(http, cfg.cross_index.clone())));
    }
    if cfg.gazette.enabled {
        out.push(Arc::new(gazette::GazetteSource::new()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(source: SourceKind, id: &str, code: &str, n: Option<&str>, y: Option<i32>) -> NormalizedItem {
        NormalizedItem {
            external_id: format!("{}:{id}", source.id_prefix()),
            source,
            item_type: ItemType::from_code(code),
            type_code: code.into(),
            number: n.map(str::to_string),
            year: y,
            title: None,
            summary: None,
            full_text_excerpt: None,
            status: None,
            url: None,
            raw_payload: serde_json::Value::Null,
            keywords: vec![],
            local_score: 0,
        }
    }

    #[test]
    fn normalize_text_strips_markup_and_ws() {
        let s = "  Dispõe&nbsp;sobre <b>calçadas</b>\n\n acessíveis.  ";
        assert_eq!(normalize_text(s), "Dispõe sobre calçadas acessíveis.");
    }

    #[test]
    fn keyword_hits_ignore_accents_and_case() {
        let kws = vec!["calçada".to_string(), "buraco".into(), "ônibus".into()];
        assert_eq!(keyword_hits("Reparo de CALCADAS e buracos", &kws), 2);
        assert_eq!(keyword_hits("", &kws), 0);
    }

    #[test]
    fn dedup_across_sources_by_designation() {
        let mut v = vec![
            item(SourceKind::CrossIndex, "urn1", "PL", Some("0123"), Some(2024)),
            item(SourceKind::Chamber, "999", "pl", Some("123"), Some(2024)),
            item(SourceKind::Senate, "777", "PL", Some("123"), Some(2023)),
            item(SourceKind::Senate, "x", "PL", None, None),
            item(SourceKind::Senate, "x", "PL", None, None),
        ];
        let dropped = dedup_in_place(&mut v);
        assert_eq!(dropped, 2);
        assert_eq!(v.len(), 3);
        // first occurrence wins
        assert_eq!(v[0].source, SourceKind::CrossIndex);
    }
}
