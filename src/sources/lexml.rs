// src/sources/lexml.rs
//! Cross-jurisdiction legal index, queried over SRU with a CQL expression.
//! Responses are Dublin Core records keyed by a URN such as
//! `urn:lex:br:federal:lei:1990-09-11;8078`.

use super::{
    designation, normalize_opt, ItemType, Jurisdiction, LegislativeSource, NormalizedItem,
    SourceKind, SourceQuery,
};
use crate::config::CrossIndexConfig;
use crate::error::SourceError;
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Serialize;

/// Fields of one SRU record we care about.
#[derive(Debug, Default, Clone, Serialize)]
struct DcRecord {
    urn: String,
    title: String,
    description: String,
    date: String,
    document_type: String,
    locality: String,
    authority: String,
}

impl DcRecord {
    fn push_text(&mut self, field: &str, text: &str) {
        let slot = match field {
            "urn" => &mut self.urn,
            "title" => &mut self.title,
            "description" => &mut self.description,
            "date" => &mut self.date,
            "tipoDocumento" => &mut self.document_type,
            "localidade" => &mut self.locality,
            "autoridade" => &mut self.authority,
            _ => return,
        };
        slot.push_str(text);
    }
}

/// Pieces encoded in a LexML URN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrnParts {
    pub type_code: String,
    pub year: Option<i32>,
    pub number: Option<String>,
}

/// `urn:lex:<place>:<authority>:<type>[;<abbrev>]:<date>;<number>[;...]`
pub fn parse_urn(urn: &str) -> Option<UrnParts> {
    let parts: Vec<&str> = urn.trim().split(':').collect();
    if parts.len() < 6 || !parts[0].eq_ignore_ascii_case("urn") || !parts[1].eq_ignore_ascii_case("lex") {
        return None;
    }
    let mut kind = parts[4].split(';');
    let main = kind.next().unwrap_or_default();
    let type_code = match kind.next().filter(|s| !s.is_empty()) {
        Some(abbrev) => abbrev.to_ascii_uppercase(),
        None => main.replace('.', " ").to_ascii_uppercase(),
    };

    let mut tail = parts[5].split(';');
    let date = tail.next().unwrap_or_default();
    let year = date
        .get(0..4)
        .filter(|y| y.chars().all(|c| c.is_ascii_digit()))
        .and_then(|y| y.parse().ok());
    let number = tail
        .next()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string);

    Some(UrnParts {
        type_code,
        year,
        number,
    })
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn parse_records(xml: &str) -> Result<(Vec<DcRecord>, Option<String>), SourceError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut records = Vec::new();
    let mut current: Option<DcRecord> = None;
    let mut field: Option<String> = None;
    let mut in_diagnostic = false;
    let mut diagnostic: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.local_name().as_ref());
                match name.as_str() {
                    "record" => current = Some(DcRecord::default()),
                    "diagnostic" => in_diagnostic = true,
                    _ => {}
                }
                field = Some(name);
            }
            Ok(Event::End(e)) => {
                let name = local_name(e.local_name().as_ref());
                match name.as_str() {
                    "record" => {
                        if let Some(rec) = current.take() {
                            records.push(rec);
                        }
                    }
                    "diagnostic" => in_diagnostic = false,
                    _ => {}
                }
                field = None;
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| SourceError::Malformed(format!("lexml text: {e}")))?;
                if let (Some(rec), Some(f)) = (current.as_mut(), field.as_deref()) {
                    rec.push_text(f, &text);
                } else if in_diagnostic && field.as_deref() == Some("message") {
                    diagnostic = Some(text.into_owned());
                }
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c).into_owned();
                if let (Some(rec), Some(f)) = (current.as_mut(), field.as_deref()) {
                    rec.push_text(f, &text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(SourceError::Malformed(format!(
                    "lexml xml at {}: {e}",
                    reader.buffer_position()
                )))
            }
            _ => {}
        }
    }
    Ok((records, diagnostic))
}

/// Parse an SRU searchRetrieve response. Records without a URN are skipped.
pub fn parse_sru(xml: &str, keywords: &[String]) -> Result<Vec<NormalizedItem>, SourceError> {
    let (records, diagnostic) = parse_records(xml)?;
    if records.is_empty() {
        if let Some(msg) = diagnostic {
            return Err(SourceError::Malformed(format!("sru diagnostic: {msg}")));
        }
    }

    let mut out = Vec::with_capacity(records.len());
    for rec in records {
        let urn = rec.urn.trim().to_string();
        let Some(parts) = parse_urn(&urn) else {
            continue;
        };
        let year = parts.year.or_else(|| {
            rec.date
                .trim()
                .get(0..4)
                .and_then(|y| y.parse::<i32>().ok())
        });
        let mut item_type = ItemType::from_code(&parts.type_code);
        if item_type == ItemType::Other {
            item_type = ItemType::from_code(&rec.document_type);
        }
        let summary = normalize_opt(Some(&rec.description));
        let title = normalize_opt(Some(&rec.title))
            .or_else(|| Some(designation(&parts.type_code, parts.number.as_deref(), year)));
        let local_score = [title.as_deref(), summary.as_deref()]
            .iter()
            .flatten()
            .map(|t| super::keyword_hits(t, keywords))
            .max()
            .unwrap_or(0);
        let status = normalize_opt(Some(&rec.authority));
        let raw_payload = serde_json::to_value(&rec).unwrap_or(serde_json::Value::Null);

        out.push(NormalizedItem {
            external_id: format!("{}:{urn}", SourceKind::CrossIndex.id_prefix()),
            source: SourceKind::CrossIndex,
            item_type,
            type_code: parts.type_code,
            number: parts.number,
            year,
            title,
            summary,
            full_text_excerpt: None,
            status,
            url: Some(format!("https://www.lexml.gov.br/urn/{urn}")),
            raw_payload,
            keywords: keywords.to_vec(),
            local_score,
        });
    }
    Ok(out)
}

fn cql_term(s: &str) -> String {
    s.chars().filter(|c| *c != '"' && *c != '\\').collect::<String>().trim().to_string()
}

/// AND-joined CQL over the first `max` keywords, optionally narrowed by locality.
pub fn build_cql(keywords: &[String], max: usize, jurisdiction: Option<&Jurisdiction>) -> String {
    let mut clauses: Vec<String> = keywords
        .iter()
        .map(|k| cql_term(k))
        .filter(|k| !k.is_empty())
        .take(max)
        .map(|k| format!("(dc.title any \"{k}\" or dc.description any \"{k}\")"))
        .collect();
    match jurisdiction {
        Some(Jurisdiction::State { state }) => {
            clauses.push(format!("localidade any \"{}\"", cql_term(state)));
        }
        Some(Jurisdiction::Municipal { city, .. }) => {
            clauses.push(format!("localidade any \"{}\"", cql_term(city)));
        }
        None => {}
    }
    clauses.join(" and ")
}

pub struct CrossIndexSource {
    http: reqwest::Client,
    cfg: CrossIndexConfig,
}

impl CrossIndexSource {
    pub fn new(http: reqwest::Client, cfg: CrossIndexConfig) -> Self {
        Self { http, cfg }
    }
}

#[async_trait]
impl LegislativeSource for CrossIndexSource {
    fn kind(&self) -> SourceKind {
        SourceKind::CrossIndex
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<NormalizedItem>, SourceError> {
        if query.keywords.iter().all(|k| cql_term(k).is_empty()) {
            return Err(SourceError::NoResults);
        }
        let cql = build_cql(&query.keywords, self.cfg.max_keywords, query.jurisdiction.as_ref());

        let t0 = std::time::Instant::now();
        let url = format!("{}/busca/SRU", self.cfg.base_url.trim_end_matches('/'));
        let resp = self
            .http
            .get(&url)
            .query(&[
                ("operation", "searchRetrieve".to_string()),
                ("version", "1.1".to_string()),
                ("query", cql),
                ("startRecord", "1".to_string()),
                ("maximumRecords", query.limit.to_string()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = resp.text().await?;
        let mut items = parse_sru(&body, &query.keywords)?;
        histogram!(crate::metrics::SOURCE_PARSE_MS, "source" => "cross_index")
            .record(t0.elapsed().as_millis() as f64);

        if items.is_empty() {
            return Err(SourceError::NoResults);
        }
        items.truncate(query.limit);
        Ok(items)
    }
}
