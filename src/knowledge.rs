// src/knowledge.rs
//! Curated knowledge: rights already guaranteed by law, and government
//! programs that already serve a need. Matching is keyword-based and local.

use crate::config::KnowledgeConfig;
use crate::keywords::{fold, word_regex};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A right guaranteed by an existing norm, with practical guidance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnownRight {
    pub id: String,
    pub name: String,
    pub article: String,
    /// "federal" | "estadual" | "municipal"
    pub scope: String,
    pub simple_explanation: String,
    pub how_to_use: String,
    pub where_to_complain: String,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernmentProgram {
    pub id: String,
    pub name: String,
    pub description: String,
    pub how_to_access: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Canonical theme ids the program serves; empty = any theme.
    #[serde(default)]
    pub themes: Vec<String>,
    pub keywords: Vec<String>,
}

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

/// Built-in rights.
pub fn default_rights() -> Vec<KnownRight> {
    vec![
        KnownRight {
            id: "cinema_lanche".into(),
            name: "Código de Defesa do Consumidor (Lei 8.078/1990)".into(),
            article: "Art. 39, inciso IX".into(),
            scope: "federal".into(),
            simple_explanation: "O estabelecimento não pode obrigar você a comprar produtos dele como condição para usar o serviço. Você pode entrar com seu próprio lanche.".into(),
            how_to_use: "Exija a entrada com o lanche próprio. Se negarem, peça o nome do responsável, registre fotos e reclame no Procon.".into(),
            where_to_complain: "Procon, Reclame Aqui ou Juizado Especial Cível".into(),
            keywords: strings(&["cinema", "lanche", "comida", "entrada", "pipoca", "refrigerante"]),
        },
        KnownRight {
            id: "taxa_servico".into(),
            name: "Código de Defesa do Consumidor (Lei 8.078/1990)".into(),
            article: "Art. 39, inciso I".into(),
            scope: "federal".into(),
            simple_explanation: "A taxa de serviço de 10% não é obrigatória. O estabelecimento pode sugerir, mas você pode recusar.".into(),
            how_to_use: "Peça para retirar a taxa da conta. Se houver cobrança forçada, denuncie ao Procon.".into(),
            where_to_complain: "Procon, Reclame Aqui ou Ministério Público".into(),
            keywords: strings(&["gorjeta", "taxa", "serviço", "10%", "obrigatória", "restaurante"]),
        },
        KnownRight {
            id: "falta_medico_ubs".into(),
            name: "Constituição Federal (1988)".into(),
            article: "Art. 196".into(),
            scope: "federal".into(),
            simple_explanation: "A saúde é direito de todos e dever do Estado. O poder público é obrigado a oferecer atendimento médico gratuito.".into(),
            how_to_use: "Registre reclamação na ouvidoria da Secretaria Municipal de Saúde. Sem solução, procure a Defensoria Pública.".into(),
            where_to_complain: "Ouvidoria do SUS (136), Ministério Público, Defensoria Pública, Conselho Municipal de Saúde".into(),
            keywords: strings(&["médico", "ubs", "posto", "saúde", "sus", "atendimento"]),
        },
    ]
}

/// Built-in programs.
pub fn default_programs() -> Vec<GovernmentProgram> {
    vec![
        GovernmentProgram {
            id: "farmacia_popular".into(),
            name: "Farmácia Popular".into(),
            description: "Medicamentos gratuitos ou com desconto para hipertensão, diabetes, asma e outros.".into(),
            how_to_access: "Leve receita médica válida, documento com foto e CPF a uma farmácia credenciada.".into(),
            url: Some("https://www.gov.br/saude/pt-br/composicao/sectics/farmacia-popular".into()),
            themes: strings(&["saude"]),
            keywords: strings(&["remédio", "remédios", "medicamento", "medicamentos", "farmácia", "receita"]),
        },
        GovernmentProgram {
            id: "tarifa_social_energia".into(),
            name: "Tarifa Social de Energia Elétrica".into(),
            description: "Desconto na conta de luz para famílias de baixa renda inscritas no CadÚnico.".into(),
            how_to_access: "Com inscrição no CadÚnico, peça o benefício à distribuidora de energia.".into(),
            url: Some("https://www.gov.br/mme/pt-br/assuntos/energia-eletrica/tarifa-social".into()),
            themes: strings(&["assistencia_social", "consumidor"]),
            keywords: strings(&["conta de luz", "energia", "tarifa", "desconto", "baixa renda"]),
        },
    ]
}

fn words(s: &str) -> Vec<String> {
    let folded = fold(s);
    word_regex()
        .find_iter(&folded)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn contains_phrase(haystack: &[String], phrase: &[String]) -> bool {
    !phrase.is_empty() && haystack.windows(phrase.len()).any(|w| w == phrase)
}

#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    rights: Vec<KnownRight>,
    programs: Vec<GovernmentProgram>,
    min_hits: usize,
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::from_config(&KnowledgeConfig::default())
    }
}

impl KnowledgeBase {
    pub fn from_config(cfg: &KnowledgeConfig) -> Self {
        let (mut rights, mut programs) = if cfg.include_builtin {
            (default_rights(), default_programs())
        } else {
            (Vec::new(), Vec::new())
        };
        // configured entries replace built-ins with the same id
        for r in &cfg.rights {
            rights.retain(|x| x.id != r.id);
            rights.push(r.clone());
        }
        for p in &cfg.programs {
            programs.retain(|x| x.id != p.id);
            programs.push(p.clone());
        }
        Self {
            rights,
            programs,
            min_hits: cfg.min_keyword_hits.max(1),
        }
    }

    /// Entry keywords present in the text (as whole words, multi-word
    /// entries as a contiguous phrase) or among the report keywords.
    fn hits(entry: &[String], text: &str, keywords: &[String]) -> usize {
        let text = words(text);
        let kws: Vec<Vec<String>> = keywords.iter().map(|k| words(k)).collect();
        entry
            .iter()
            .map(|e| words(e))
            .filter(|e| !e.is_empty() && (contains_phrase(&text, e) || kws.iter().any(|k| k == e)))
            .count()
    }

    /// Rights with enough keyword hits, best first.
    pub fn match_rights(&self, text: &str, keywords: &[String]) -> Vec<KnownRight> {
        let mut scored: Vec<(usize, &KnownRight)> = self
            .rights
            .iter()
            .map(|r| (Self::hits(&r.keywords, text, keywords), r))
            .filter(|(h, _)| *h >= self.min_hits)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        debug!(target: "investigation", matched = scored.len(), "rights lookup");
        scored.into_iter().map(|(_, r)| r.clone()).collect()
    }

    /// Programs serving `theme` (or any theme) with enough keyword hits, best first.
    pub fn match_programs(&self, theme: Option<&str>, text: &str, keywords: &[String]) -> Vec<GovernmentProgram> {
        let mut scored: Vec<(usize, &GovernmentProgram)> = self
            .programs
            .iter()
            .filter(|p| match theme {
                Some(t) if !p.themes.is_empty() => p.themes.iter().any(|x| x == t),
                _ => true,
            })
            .map(|p| (Self::hits(&p.keywords, text, keywords), p))
            .filter(|(h, _)| *h >= self.min_hits)
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        debug!(target: "investigation", matched = scored.len(), "programs lookup");
        scored.into_iter().map(|(_, p)| p.clone()).collect()
    }
}
