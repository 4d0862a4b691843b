// src/sources/senate.rs
use super::{designation, normalize_opt, ItemType, LegislativeSource, NormalizedItem, SourceKind, SourceQuery};
use crate::config::SenateConfig;
use crate::error::SourceError;
use async_trait::async_trait;
use metrics::histogram;
use quick_xml::de::from_str;
use serde::{Deserialize, Serialize};

// PesquisaBasicaMateria > Materias > Materia*
#[derive(Debug, Deserialize)]
struct PesquisaBasicaMateria {
    #[serde(rename = "Materias", default)]
    materias: Option<Materias>,
}

#[derive(Debug, Deserialize)]
struct Materias {
    #[serde(rename = "Materia", default)]
    materia: Vec<Materia>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Materia {
    #[serde(rename = "IdentificacaoMateria")]
    identificacao: Identificacao,
    #[serde(rename = "DadosBasicosMateria", default)]
    dados: Option<DadosBasicos>,
    #[serde(rename = "SituacaoAtual", default)]
    situacao: Option<Situacao>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Identificacao {
    #[serde(rename = "CodigoMateria")]
    codigo: String,
    #[serde(rename = "SiglaSubtipoMateria", default)]
    sigla: Option<String>,
    #[serde(rename = "NumeroMateria", default)]
    numero: Option<String>,
    #[serde(rename = "AnoMateria", default)]
    ano: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DadosBasicos {
    #[serde(rename = "EmentaMateria", default)]
    ementa: Option<String>,
    #[serde(rename = "IndexacaoMateria", default)]
    indexacao: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Situacao {
    #[serde(rename = "DescricaoSituacao", default)]
    descricao: Option<String>,
}

/// Parse a basic-search response into normalized items (upstream order).
pub fn parse_search_xml(xml: &str, keywords: &[String]) -> Result<Vec<NormalizedItem>, SourceError> {
    let doc: PesquisaBasicaMateria =
        from_str(xml).map_err(|e| SourceError::Malformed(format!("senate xml: {e}")))?;
    let materias = doc.materias.map(|m| m.materia).unwrap_or_default();

    let mut out = Vec::with_capacity(materias.len());
    for m in materias {
        let codigo = m.identificacao.codigo.trim().to_string();
        if codigo.is_empty() {
            continue;
        }
        let type_code = m
            .identificacao
            .sigla
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("PL")
            .to_string();
        let number = m
            .identificacao
            .numero
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let year = m
            .identificacao
            .ano
            .as_deref()
            .and_then(|a| a.trim().parse::<i32>().ok());
        let summary = normalize_opt(m.dados.as_ref().and_then(|d| d.ementa.as_deref()));
        let excerpt = normalize_opt(m.dados.as_ref().and_then(|d| d.indexacao.as_deref()));
        let status = normalize_opt(m.situacao.as_ref().and_then(|s| s.descricao.as_deref()));
        let local_score = summary
            .as_deref()
            .map(|s| super::keyword_hits(s, keywords))
            .unwrap_or(0);
        let raw_payload = serde_json::to_value(&m).unwrap_or(serde_json::Value::Null);

        out.push(NormalizedItem {
            external_id: format!("{}:{}", SourceKind::Senate.id_prefix(), codigo),
            source: SourceKind::Senate,
            item_type: ItemType::from_code(&type_code),
            title: Some(designation(&type_code, number.as_deref(), year)),
            type_code,
            number,
            year,
            summary,
            full_text_excerpt: excerpt,
            status,
            url: Some(format!(
                "https://www25.senado.leg.br/web/atividade/materias/-/materia/{codigo}"
            )),
            raw_payload,
            keywords: keywords.to_vec(),
            local_score,
        });
    }
    Ok(out)
}

pub struct SenateSource {
    http: reqwest::Client,
    cfg: SenateConfig,
}

impl SenateSource {
    pub fn new(http: reqwest::Client, cfg: SenateConfig) -> Self {
        Self { http, cfg }
    }
}

#[async_trait]
impl LegislativeSource for SenateSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Senate
    }

    async fn fetch(&self, query: &SourceQuery) -> Result<Vec<NormalizedItem>, SourceError> {
        let terms: Vec<&str> = query
            .keywords
            .iter()
            .map(|s| s.as_str())
            .take(self.cfg.max_keywords)
            .collect();
        if terms.is_empty() {
            return Err(SourceError::NoResults);
        }

        let t0 = std::time::Instant::now();
        let url = format!(
            "{}/materia/pesquisa/lista",
            self.cfg.base_url.trim_end_matches('/')
        );
        let resp = self
            .http
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/xml")
            .query(&[("palavraChave", terms.join(" "))])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }
        let body = resp.text().await?;

        let mut items = parse_search_xml(&body, &query.keywords)?;
        histogram!(crate::metrics::SOURCE_PARSE_MS, "source" => "senate")
            .record(t0.elapsed().as_millis() as f64);
        if items.is_empty() {
            return Err(SourceError::NoResults);
        }
        // most recent first; undated last
        items.sort_by(|a, b| b.year.unwrap_or(i32::MIN).cmp(&a.year.unwrap_or(i32::MIN)));
        items.truncate(query.limit);
        Ok(items)
    }
}
