// src/keywords.rs
//! Keyword cleaning/expansion and canonical theme detection.
//!
//! The classifier upstream hands us a handful of raw keywords and a free-form
//! theme hint. Legislative search engines do poorly with filler words and
//! with overly narrow queries, so the list is cleaned, padded from the report
//! text when too short, and mapped onto a closed set of theme ids.

use crate::config::{KeywordsConfig, ThemesConfig};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

const STOP_WORDS: &[&str] = &[
    // articles, prepositions, conjunctions
    "a", "o", "as", "os", "um", "uma", "uns", "umas", "de", "da", "do", "das", "dos", "em",
    "no", "na", "nos", "nas", "ao", "aos", "por", "pelo", "pela", "pelos", "pelas", "para",
    "pra", "com", "sem", "sobre", "entre", "ate", "apos", "e", "ou", "mas", "que", "se",
    "como", "quando", "onde", "porque", "nao", "sim", "ja", "mais", "menos", "muito", "muita",
    "muitos", "muitas", "pouco", "todo", "toda", "todos", "todas",
    // pronouns / demonstratives
    "eu", "ele", "ela", "nos", "eles", "elas", "meu", "minha", "nosso", "nossa", "seu", "sua",
    "isso", "isto", "esse", "essa", "este", "esta", "aquele", "aquela", "aqui", "ali", "la",
    // common verbs
    "ser", "estar", "ter", "tem", "tinha", "fazer", "faz", "fica", "ficar", "existe", "existem",
    "ha", "quero", "queremos", "gostaria", "precisa", "preciso", "precisamos", "deve",
    "devem", "deveria", "pode", "podem", "poderia", "vai", "vao", "esta", "estao", "foi",
    // domain filler
    "lei", "leis", "projeto", "projetos", "pl", "pls", "proposta", "propostas", "legislacao",
    "norma", "normas", "problema", "problemas", "coisa", "coisas", "gente", "pessoal",
];

const SPECIFIC_THEMES: &[&str] = &[
    "saude",
    "educacao",
    "transporte",
    "seguranca",
    "meio_ambiente",
    "habitacao",
    "cultura",
    "assistencia_social",
    "zeladoria",
    "consumidor",
    "trabalho",
    "direitos_humanos",
];

// keyword (accent-folded) -> canonical theme
const THEME_SYNONYMS: &[(&str, &str)] = &[
    ("hospital", "saude"),
    ("ubs", "saude"),
    ("medico", "saude"),
    ("medicos", "saude"),
    ("remedio", "saude"),
    ("remedios", "saude"),
    ("medicamento", "saude"),
    ("sus", "saude"),
    ("vacina", "saude"),
    ("dengue", "saude"),
    ("escola", "educacao"),
    ("escolas", "educacao"),
    ("creche", "educacao"),
    ("professor", "educacao"),
    ("professores", "educacao"),
    ("ensino", "educacao"),
    ("merenda", "educacao"),
    ("onibus", "transporte"),
    ("metro", "transporte"),
    ("transito", "transporte"),
    ("mobilidade", "transporte"),
    ("tarifa", "transporte"),
    ("ciclovia", "transporte"),
    ("policia", "seguranca"),
    ("policiamento", "seguranca"),
    ("assalto", "seguranca"),
    ("assaltos", "seguranca"),
    ("violencia", "seguranca"),
    ("crime", "seguranca"),
    ("roubo", "seguranca"),
    ("lixo", "zeladoria"),
    ("buraco", "zeladoria"),
    ("buracos", "zeladoria"),
    ("calcada", "zeladoria"),
    ("calcadas", "zeladoria"),
    ("iluminacao", "zeladoria"),
    ("poste", "zeladoria"),
    ("asfalto", "zeladoria"),
    ("pavimentacao", "zeladoria"),
    ("entulho", "zeladoria"),
    ("esgoto", "zeladoria"),
    ("desmatamento", "meio_ambiente"),
    ("poluicao", "meio_ambiente"),
    ("queimada", "meio_ambiente"),
    ("queimadas", "meio_ambiente"),
    ("arvore", "meio_ambiente"),
    ("arvores", "meio_ambiente"),
    ("reciclagem", "meio_ambiente"),
    ("moradia", "habitacao"),
    ("aluguel", "habitacao"),
    ("despejo", "habitacao"),
    ("procon", "consumidor"),
    ("cobranca", "consumidor"),
    ("reembolso", "consumidor"),
    ("emprego", "trabalho"),
    ("desemprego", "trabalho"),
    ("salario", "trabalho"),
    ("teatro", "cultura"),
    ("biblioteca", "cultura"),
];

/// Lowercase + strip Portuguese diacritics. Used for every comparison here.
pub fn fold(s: &str) -> String {
    s.chars()
        .flat_map(|c| c.to_lowercase())
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ñ' => 'n',
            other => other,
        })
        .collect()
}

pub(crate) fn word_regex() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r"(?u)\b\w+\b").expect("word regex"))
}

/// Output of [`KeywordExpander::expand`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedKeywords {
    pub keywords: Vec<String>,
    pub theme: Option<String>,
}

#[derive(Debug, Clone)]
pub struct KeywordExpander {
    cfg: KeywordsConfig,
    stop_words: HashSet<String>,
    specific: HashSet<String>,
    synonyms: HashMap<String, String>,
}

impl Default for KeywordExpander {
    fn default() -> Self {
        Self::new(&KeywordsConfig::default(), &ThemesConfig::default())
    }
}

impl KeywordExpander {
    pub fn new(cfg: &KeywordsConfig, themes: &ThemesConfig) -> Self {
        let stop_words = STOP_WORDS
            .iter()
            .map(|s| s.to_string())
            .chain(cfg.extra_stop_words.iter().map(|s| fold(s.trim())))
            .collect();
        let specific = SPECIFIC_THEMES
            .iter()
            .map(|s| s.to_string())
            .chain(themes.specific.iter().map(|s| fold(s.trim())))
            .collect();
        let mut synonyms: HashMap<String, String> = THEME_SYNONYMS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (k, v) in &themes.synonyms {
            synonyms.insert(fold(k.trim()), fold(v.trim()));
        }
        Self {
            cfg: cfg.clone(),
            stop_words,
            specific,
            synonyms,
        }
    }

    fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(&fold(word))
    }

    /// Trim/lowercase, drop empties, dedup (first occurrence wins).
    fn tidy(raw: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for kw in raw {
            let kw = kw
                .trim()
                .trim_matches(|c: char| c.is_ascii_punctuation())
                .trim()
                .to_lowercase();
            if kw.is_empty() {
                continue;
            }
            if seen.insert(fold(&kw)) {
                out.push(kw);
            }
        }
        out
    }

    /// Drop stop words. Falls back to the tidied list if nothing would survive.
    pub fn clean(&self, raw: &[String]) -> Vec<String> {
        let tidy = Self::tidy(raw);
        let cleaned: Vec<String> = tidy
            .iter()
            .filter(|kw| !self.is_stop_word(kw))
            .cloned()
            .collect();
        if cleaned.is_empty() {
            tidy
        } else {
            cleaned
        }
    }

    /// Most frequent qualifying words of `text`, ties broken by first appearance.
    fn terms_from_text(&self, text: &str, exclude: &HashSet<String>, max: usize) -> Vec<String> {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        for (pos, m) in word_regex().find_iter(text).enumerate() {
            let word = m.as_str().to_lowercase();
            if word.chars().count() <= self.cfg.min_text_token_chars
                || word.chars().all(|c| c.is_ascii_digit())
                || self.is_stop_word(&word)
                || exclude.contains(&fold(&word))
            {
                continue;
            }
            counts.entry(word).or_insert((0, pos)).0 += 1;
        }
        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
        ranked.into_iter().take(max).map(|(w, _)| w).collect()
    }

    /// Canonical theme: a specific hint wins, then the first keyword with a
    /// synonym entry, then the raw hint (or none).
    pub fn detect_theme(&self, hint: Option<&str>, keywords: &[String]) -> Option<String> {
        let hint = hint.map(str::trim).filter(|h| !h.is_empty());
        if let Some(h) = hint {
            let folded = fold(h).replace([' ', '-'], "_");
            if self.specific.contains(&folded) {
                return Some(folded);
            }
        }
        for kw in keywords {
            if let Some(theme) = self.synonyms.get(&fold(kw)) {
                return Some(theme.clone());
            }
            // multi-word keywords: look at each word
            for w in word_regex().find_iter(kw) {
                if let Some(theme) = self.synonyms.get(&fold(w.as_str())) {
                    return Some(theme.clone());
                }
            }
        }
        hint.map(str::to_string)
    }

    pub fn expand(
        &self,
        raw_keywords: &[String],
        theme_hint: Option<&str>,
        text: Option<&str>,
    ) -> ExpandedKeywords {
        let mut keywords = self.clean(raw_keywords);

        if keywords.len() < self.cfg.min_terms {
            if let Some(text) = text {
                let exclude: HashSet<String> = keywords.iter().map(|k| fold(k)).collect();
                keywords.extend(self.terms_from_text(text, &exclude, self.cfg.max_text_terms));
            }
        }

        let theme = self.detect_theme(theme_hint, &keywords);
        ExpandedKeywords { keywords, theme }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kws(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn stop_words_are_removed_and_case_folded_dedup() {
        let ex = KeywordExpander::default();
        let out = ex.clean(&kws(&["Lei", "buraco", "de", "Buraco", "calçada"]));
        assert_eq!(out, kws(&["buraco", "calçada"]));
    }

    #[test]
    fn all_stop_words_reverts_to_original() {
        let ex = KeywordExpander::default();
        let out = ex.clean(&kws(&["Lei", "projeto"]));
        assert_eq!(out, kws(&["lei", "projeto"]));
    }

    #[test]
    fn short_lists_are_padded_from_text() {
        let ex = KeywordExpander::default();
        let out = ex.expand(
            &kws(&["ônibus"]),
            None,
            Some("O ônibus da linha 42 atrasa todo dia, atrasa muito e a lotação é enorme"),
        );
        assert_eq!(out.keywords.len(), 3);
        assert_eq!(out.keywords[0], "ônibus");
        // most frequent qualifying word first
        assert_eq!(out.keywords[1], "atrasa");
        // ties broken by first appearance; "lotação"/"enorme" are left out
        assert_eq!(out.keywords[2], "linha");
        assert_eq!(out.theme.as_deref(), Some("transporte"));
    }

    #[test]
    fn enough_keywords_skip_text() {
        let ex = KeywordExpander::default();
        let out = ex.expand(&kws(&["escola", "merenda"]), Some("geral"), Some("texto extenso qualquer"));
        assert_eq!(out.keywords, kws(&["escola", "merenda"]));
        assert_eq!(out.theme.as_deref(), Some("educacao"));
    }

    #[test]
    fn theme_priority() {
        let ex = KeywordExpander::default();
        // specific hint wins over keyword synonyms
        assert_eq!(
            ex.detect_theme(Some("Saúde"), &kws(&["escola"])).as_deref(),
            Some("saude")
        );
        // unknown hint, no synonyms: hint is kept
        assert_eq!(
            ex.detect_theme(Some("outros"), &kws(&["xyz"])).as_deref(),
            Some("outros")
        );
        assert_eq!(ex.detect_theme(None, &kws(&["xyz"])), None);
        // multi-word keyword
        assert_eq!(
            ex.detect_theme(None, &kws(&["iluminação pública"])).as_deref(),
            Some("zeladoria")
        );
    }

    #[test]
    fn configured_synonyms_extend_builtins() {
        let mut themes = ThemesConfig::default();
        themes.synonyms.insert("Feira".into(), "consumidor".into());
        let ex = KeywordExpander::new(&KeywordsConfig::default(), &themes);
        assert_eq!(ex.detect_theme(None, &kws(&["feira"])).as_deref(), Some("consumidor"));
    }
}
