// src/advisor.rs
//! Rights already in force for a report, as suggested by a generative model.
//! The curated knowledge base answers whenever the model cannot.

use crate::config::AdvisorConfig;
use crate::geo::Location;
use crate::knowledge::{KnowledgeBase, KnownRight};
use crate::metrics::ADVISOR_CALLS;
use anyhow::{anyhow, bail, Context};
use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What the advisor gets to see about a report.
#[derive(Debug, Clone, Copy)]
pub struct AdvisorRequest<'a> {
    pub text: &'a str,
    pub theme: Option<&'a str>,
    pub location: Option<&'a Location>,
}

#[async_trait]
pub trait LawAdvisor: Send + Sync {
    /// Rights in force that cover the report; empty when none apply.
    async fn existing_rights(&self, req: &AdvisorRequest<'_>) -> anyhow::Result<Vec<KnownRight>>;

    fn name(&self) -> &'static str;

    fn is_enabled(&self) -> bool {
        true
    }
}

pub type DynLawAdvisor = Arc<dyn LawAdvisor>;

/// No model configured; only the curated base is consulted.
#[derive(Debug, Clone, Default)]
pub struct DisabledAdvisor;

#[async_trait]
impl LawAdvisor for DisabledAdvisor {
    async fn existing_rights(&self, _req: &AdvisorRequest<'_>) -> anyhow::Result<Vec<KnownRight>> {
        Ok(Vec::new())
    }
    fn name(&self) -> &'static str {
        "disabled"
    }
    fn is_enabled(&self) -> bool {
        false
    }
}

// ---------- model answer ----------

#[derive(Debug, Deserialize)]
struct Answer {
    #[serde(default)]
    found: bool,
    #[serde(default)]
    laws: Vec<AdvisedLaw>,
}

#[derive(Debug, Deserialize)]
struct AdvisedLaw {
    #[serde(default)]
    name: String,
    #[serde(default)]
    article: String,
    #[serde(default)]
    scope: String,
    #[serde(default)]
    simple_explanation: String,
    #[serde(default)]
    how_to_use: String,
    #[serde(default)]
    where_to_complain: String,
}

/// Parse the model's JSON answer, tolerating a fenced code block around it.
/// Entries without a name or article are dropped.
pub fn parse_answer(raw: &str, max_laws: usize) -> anyhow::Result<Vec<KnownRight>> {
    let body = raw.trim();
    let body = body
        .strip_prefix("```json")
        .or_else(|| body.strip_prefix("```"))
        .map(|b| b.trim_end().trim_end_matches("```"))
        .unwrap_or(body)
        .trim();
    let answer: Answer = serde_json::from_str(body).context("advisor answer is not the expected JSON")?;
    if !answer.found {
        return Ok(Vec::new());
    }
    let rights = answer
        .laws
        .into_iter()
        .filter(|l| !l.name.trim().is_empty() && !l.article.trim().is_empty())
        .take(max_laws)
        .enumerate()
        .map(|(i, l)| {
            let scope = l.scope.trim().to_lowercase();
            KnownRight {
                id: format!("advisor_{}", i + 1),
                name: l.name.trim().to_string(),
                article: l.article.trim().to_string(),
                scope: if scope.is_empty() { "federal".into() } else { scope },
                simple_explanation: l.simple_explanation.trim().to_string(),
                how_to_use: l.how_to_use.trim().to_string(),
                where_to_complain: l.where_to_complain.trim().to_string(),
                keywords: Vec::new(),
            }
        })
        .collect();
    Ok(rights)
}

/// Instructions plus the report. The answer format matches [`parse_answer`].
pub fn build_prompt(req: &AdvisorRequest<'_>) -> String {
    let city = req
        .location
        .and_then(|l| l.city.as_deref())
        .unwrap_or("não informada");
    let state = req
        .location
        .and_then(|l| l.state.as_deref())
        .unwrap_or("não informado");
    let theme = req.theme.unwrap_or("não classificado");
    format!(
        r#"Você é um assistente jurídico que conhece a legislação brasileira em vigor.

Relato do cidadão:
"{text}"

Tema: {theme}
Localização: {city}, {state}

Diga se JÁ EXISTE norma vigente (Constituição, códigos federais, leis estaduais ou municipais da localização) que garanta o direito em questão ou proíba a prática relatada. Cite apenas normas de que tenha certeza; na dúvida, responda que não encontrou.

Responda SOMENTE com JSON neste formato:
{{"found": true, "laws": [{{"name": "nome da norma", "article": "artigo e inciso", "scope": "federal|estadual|municipal", "simple_explanation": "o que a norma garante, em linguagem simples", "how_to_use": "como o cidadão usa isso na prática", "where_to_complain": "onde reclamar"}}]}}

Sem norma aplicável: {{"found": false, "laws": []}}"#,
        text = req.text.trim(),
    )
}

/// Gemini `generateContent` endpoint.
pub struct GeminiLawAdvisor {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_laws: usize,
}

impl GeminiLawAdvisor {
    pub fn new(cfg: &AdvisorConfig, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("coral-investigator/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            api_key,
            temperature: cfg.temperature,
            max_laws: cfg.max_laws,
        })
    }
}

#[async_trait]
impl LawAdvisor for GeminiLawAdvisor {
    async fn existing_rights(&self, req: &AdvisorRequest<'_>) -> anyhow::Result<Vec<KnownRight>> {
        #[derive(Serialize)]
        struct Part {
            text: String,
        }
        #[derive(Serialize)]
        struct Content {
            role: &'static str,
            parts: Vec<Part>,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct GenerationConfig {
            temperature: f32,
            top_p: f32,
            top_k: u32,
            max_output_tokens: u32,
            response_mime_type: &'static str,
        }
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Req {
            contents: Vec<Content>,
            generation_config: GenerationConfig,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            candidates: Vec<Candidate>,
        }
        #[derive(Deserialize)]
        struct Candidate {
            content: CandidateContent,
        }
        #[derive(Deserialize)]
        struct CandidateContent {
            #[serde(default)]
            parts: Vec<CandidatePart>,
        }
        #[derive(Deserialize)]
        struct CandidatePart {
            #[serde(default)]
            text: String,
        }

        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model);
        let body = Req {
            contents: vec![Content {
                role: "user",
                parts: vec![Part {
                    text: build_prompt(req),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                top_p: 0.8,
                top_k: 40,
                max_output_tokens: 2048,
                response_mime_type: "application/json",
            },
        };
        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            bail!("advisor request failed with status {}", status.as_u16());
        }
        let resp: Resp = resp.json().await?;
        let text: String = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("advisor returned no candidates"))?
            .content
            .parts
            .into_iter()
            .map(|p| p.text)
            .collect();
        parse_answer(&text, self.max_laws)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Build the configured advisor. Missing keys or "disabled" yield a
/// [`DisabledAdvisor`]; unknown providers are a config error.
pub fn build_advisor(cfg: &AdvisorConfig) -> anyhow::Result<DynLawAdvisor> {
    match cfg.provider.as_str() {
        "disabled" | "none" | "" => Ok(Arc::new(DisabledAdvisor)),
        "gemini" => match cfg.resolved_api_key() {
            Some(key) => Ok(Arc::new(GeminiLawAdvisor::new(cfg, key)?)),
            None => {
                warn!(target: "advisor", "GEMINI_API_KEY not set, using curated rights only");
                Ok(Arc::new(DisabledAdvisor))
            }
        },
        other => Err(anyhow!("unsupported advisor provider: {other}")),
    }
}

/// Where the reported rights came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RightsOrigin {
    Advisor,
    Curated,
    None,
}

/// Asks the advisor first, time-boxed; falls back to the curated base on
/// error, timeout or an empty answer.
pub struct RightsFinder {
    advisor: DynLawAdvisor,
    timeout: Duration,
}

impl RightsFinder {
    pub fn new(advisor: DynLawAdvisor, timeout: Duration) -> Self {
        Self { advisor, timeout }
    }

    pub async fn find(
        &self,
        req: AdvisorRequest<'_>,
        knowledge: &KnowledgeBase,
        keywords: &[String],
    ) -> (Vec<KnownRight>, RightsOrigin) {
        if self.advisor.is_enabled() {
            let provider = self.advisor.name();
            match tokio::time::timeout(self.timeout, self.advisor.existing_rights(&req)).await {
                Ok(Ok(rights)) if !rights.is_empty() => {
                    counter!(ADVISOR_CALLS, "outcome" => "found").increment(1);
                    info!(target: "advisor", provider, rights = rights.len(), "rights from advisor");
                    return (rights, RightsOrigin::Advisor);
                }
                Ok(Ok(_)) => {
                    counter!(ADVISOR_CALLS, "outcome" => "empty").increment(1);
                    debug!(target: "advisor", provider, "advisor found nothing");
                }
                Ok(Err(e)) => {
                    counter!(ADVISOR_CALLS, "outcome" => "error").increment(1);
                    warn!(target: "advisor", provider, error = %e, "advisor failed, using curated rights");
                }
                Err(_) => {
                    counter!(ADVISOR_CALLS, "outcome" => "timeout").increment(1);
                    warn!(target: "advisor", provider, timeout_ms = self.timeout.as_millis() as u64, "advisor timed out, using curated rights");
                }
            }
        }
        let curated = knowledge.match_rights(req.text, keywords);
        let origin = if curated.is_empty() {
            RightsOrigin::None
        } else {
            RightsOrigin::Curated
        };
        (curated, origin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fenced_answer_is_parsed() {
        let raw = r#"```json
{"found": true, "laws": [
  {"name": "Código de Defesa do Consumidor", "article": "Art. 39, IX", "scope": "Federal",
   "simple_explanation": "Venda casada é proibida.", "how_to_use": "Exija entrar.", "where_to_complain": "Procon"},
  {"name": "", "article": "Art. 1"}
]}
```"#;
        let rights = parse_answer(raw, 3).unwrap();
        assert_eq!(rights.len(), 1);
        assert_eq!(rights[0].id, "advisor_1");
        assert_eq!(rights[0].scope, "federal");
        assert!(rights[0].keywords.is_empty());
    }

    #[test]
    fn not_found_and_garbage() {
        assert!(parse_answer(r#"{"found": false, "laws": []}"#, 3).unwrap().is_empty());
        assert!(parse_answer("NAO_ENCONTRADO", 3).is_err());
    }

    #[test]
    fn answer_is_capped() {
        let law = r#"{"name": "Lei X", "article": "Art. 1"}"#;
        let raw = format!(r#"{{"found": true, "laws": [{law}, {law}, {law}, {law}]}}"#);
        assert_eq!(parse_answer(&raw, 2).unwrap().len(), 2);
    }

    #[test]
    fn prompt_carries_context() {
        let loc = Location {
            city: Some("Recife".into()),
            state: Some("PE".into()),
            ..Location::default()
        };
        let p = build_prompt(&AdvisorRequest {
            text: "  Cobraram taxa de serviço obrigatória  ",
            theme: Some("consumidor"),
            location: Some(&loc),
        });
        assert!(p.contains("\"Cobraram taxa de serviço obrigatória\""));
        assert!(p.contains("Tema: consumidor"));
        assert!(p.contains("Recife, PE"));
    }
}
