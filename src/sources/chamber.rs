// src/sources/chamber.rs
//! Lower-house open-data API (JSON). The upstream keyword filter is loose, so
//! results are re-checked against the keywords locally.

use super::{keyword_hits, normalize_opt, ItemType, LegislativeSource, NormalizedItem, SourceKind, SourceQuery};
use crate::config::ChamberConfig;
use crate::error::SourceError;
use async_trait::async_trait;
use chrono::Datelike;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Status of a proposal with no recorded procedural step yet.
pub const STATUS_IN_PROGRESS: &str = "Em tramitação";
/// Status when the lookup failed.
pub const STATUS_UNKNOWN: &str = "Desconhecido";

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    dados: Vec<Proposal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Proposal {
    id: i64,
    #[serde(default)]
    uri: Option<String>,
    #[serde(default)]
    sigla_tipo: Option<String>,
    #[serde(default)]
    numero: Option<i64>,
    #[serde(default)]
    ano: Option<i32>,
    #[serde(default)]
    ementa: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StepsResponse {
    #[serde(default)]
    dados: Vec<Step>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Step {
    #[serde(default)]
    descricao_tramitacao: Option<String>,
}

pub struct ChamberSource {
    http: reqwest::Client,
    cfg: ChamberConfig,
}

impl ChamberSource {
    pub fn new(http: reqwest::Client, cfg: ChamberConfig) -> Self {
        Self { http, cfg }
    }

    fn theme_code(&self, theme: Option<&str>) -> Option<u32> {
        theme.and_then(|t| self.cfg.theme_codes.get(t).copied())
    }

    async fn fetch_page(
        &self,
        query: &SourceQuery,
        year: i32,
        theme_code: Option<u32>,
    ) -> Result<Vec<Proposal>, SourceError> {
        let url = format!("{}/proposicoes", self.cfg.base_url.trim_end_matches('/'));
        let mut params: Vec<(&str, String)> = vec![
            ("siglaTipo", self.cfg.proposal_types.join(",")),
            ("ano", year.to_string()),
            ("itens", (query.limit * 3).to_string()),
            ("ordem", "DESC".into()),
            ("ordenarPor", "id".into()),
        ];
        if !query.keywords.is_empty() {
            params.push(("keywords", query.keywords.join(" ")));
        }
        if let Some(code) = theme_code {
            params.push(("codTema", code.to_string()));
        }

        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&params)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body: ListResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(body.dados)
    }

    /// Latest procedural step of one proposal, None when it has none.
    async fn latest_step(&self, id: &str) -> Result<Option<String>, SourceError> {
        let url = format!(
            "{}/proposicoes/{}/tramitacoes",
            self.cfg.base_url.trim_end_matches('/'),
            id
        );
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(&[("ordem", "DESC"), ("ordenarPor", "dataHora"), ("itens", "1")])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body: StepsResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;
        Ok(body
            .dados
            .into_iter()
            .next()
            .and_then(|s| normalize_opt(s.descricao_tramitacao.as_deref())))
    }

    fn normalize(&self, p: Proposal, query: &SourceQuery, hits: u32) -> NormalizedItem {
        let type_code = p.sigla_tipo.clone().unwrap_or_else(|| "PL".into());
        let number = p.numero.map(|n| n.to_string());
        let raw_payload = serde_json::to_value(&p).unwrap_or(serde_json::Value::Null);
        NormalizedItem {
            external_id: format!("{}:{}", SourceKind::Chamber.id_prefix(), p.id),
            source: SourceKind::Chamber,
            item_type: ItemType::from_code(&type_code),
            title: Some(super::designation(&type_code, number.as_deref(), p.ano)),
            type_code,
            number,
            year: p.ano,
            summary: normalize_opt(p.ementa.as_deref()),
            full_text_excerpt: None,
            status: None,
            url: Some(format!(
                "https://www.camara.leg.br/proposicoesWeb/fichadetramitacao?idProposicao={}",
                p.id
            )),
            raw_payload,
            keywords: query.keywords.clone(),
            local_score: hits,
        }
    }
}

#[async_trait]
impl LegislativeSource for ChamberSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Chamber
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<NormalizedItem>, SourceError> {
        let t0 = std::time::Instant::now();
        let deadline = query.budget.map(|b| tokio::time::Instant::now() + b);
        let current = chrono::Utc::now().year();
        let years: Vec<i32> = (0..=query.year_window as i32).map(|d| current - d).collect();

        // theme-filtered pass first (when the theme has a code), then unfiltered
        let mut passes = Vec::with_capacity(2);
        if let Some(code) = self.theme_code(query.theme.as_deref()) {
            passes.push(Some(code));
        }
        passes.push(None);

        let mut out: Vec<NormalizedItem> = Vec::new();
        let mut seen: HashSet<i64> = HashSet::new();
        let mut any_ok = false;
        let mut exhausted = false;
        let mut last_err = None;

        for theme_code in passes {
            // year pages of one pass go out together
            let mut pending: FuturesUnordered<_> = years
                .iter()
                .map(move |&year| async move { (year, self.fetch_page(query, year, theme_code).await) })
                .collect();
            let mut pages: Vec<(i32, Vec<Proposal>)> = Vec::with_capacity(years.len());
            loop {
                let next = match deadline {
                    Some(d) => match tokio::time::timeout_at(d, pending.next()).await {
                        Ok(next) => next,
                        Err(_) => {
                            exhausted = true;
                            None
                        }
                    },
                    None => pending.next().await,
                };
                let Some((year, res)) = next else { break };
                match res {
                    Ok(page) => {
                        any_ok = true;
                        pages.push((year, page));
                    }
                    Err(e) => {
                        warn!(target: "sources", source = "chamber", year, kind = e.kind(), error = %e, "page failed");
                        last_err = Some(e);
                    }
                }
            }

            // newest year first, upstream (newest-first) order within a page
            pages.sort_by(|a, b| b.0.cmp(&a.0));
            for p in pages.into_iter().flat_map(|(_, page)| page) {
                let text = p.ementa.as_deref().unwrap_or_default();
                let hits = keyword_hits(text, &query.keywords);
                if !query.keywords.is_empty() && hits == 0 {
                    continue;
                }
                if seen.insert(p.id) {
                    out.push(self.normalize(p, query, hits));
                }
            }
            debug!(target: "sources", source = "chamber", ?theme_code, found = out.len(), "pass done");

            if exhausted {
                warn!(target: "sources", source = "chamber", found = out.len(), "time budget exhausted, keeping what was found");
                break;
            }
            if out.len() >= query.limit {
                break;
            }
        }

        histogram!(crate::metrics::SOURCE_PARSE_MS, "source" => "chamber").record(t0.elapsed().as_millis() as f64);

        if !any_ok {
            return Err(if exhausted {
                SourceError::Timeout
            } else {
                last_err.unwrap_or(SourceError::NoResults)
            });
        }
        if out.is_empty() {
            return Err(SourceError::NoResults);
        }
        // stable: keeps newest-first order among equal hit counts
        out.sort_by(|a, b| b.local_score.cmp(&a.local_score));
        out.truncate(query.limit);
        Ok(out)
    }

    async fn enrich(&self, items: &mut [&mut NormalizedItem]) {
        let prefix = format!("{}:", SourceKind::Chamber.id_prefix());
        let mut targets: Vec<&mut &mut NormalizedItem> = items
            .iter_mut()
            .filter(|it| it.source == SourceKind::Chamber && it.status.is_none())
            .take(self.cfg.status_lookups)
            .collect();
        if targets.is_empty() {
            return;
        }
        let ids: Vec<Option<String>> = targets
            .iter()
            .map(|it| it.external_id.strip_prefix(prefix.as_str()).map(str::to_string))
            .collect();
        let steps = join_all(ids.iter().map(|id| async move {
            match id {
                Some(id) => self.latest_step(id).await,
                None => Err(SourceError::Malformed("not a chamber id".into())),
            }
        }))
        .await;

        for (item, step) in targets.iter_mut().zip(steps) {
            let status = match step {
                Ok(Some(desc)) => desc,
                Ok(None) => STATUS_IN_PROGRESS.to_string(),
                Err(e) => {
                    debug!(target: "sources", source = "chamber", id = %item.external_id, kind = e.kind(), "status lookup failed");
                    STATUS_UNKNOWN.to_string()
                }
            };
            item.status = Some(status);
        }
    }
}
