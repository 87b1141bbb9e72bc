//! Lexical relevance scoring between external signals and market text
//!
//! Intentionally a cheap heuristic: keyword coverage, word-set overlap and
//! capitalized-entity overlap, each clipped to its weight before summing.
//! False positives/negatives are expected and bounded only by the caller's
//! confidence threshold.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\w{4,}\b").unwrap());
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").unwrap());
static HASHTAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\w+)").unwrap());
static MENTION_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\w+)").unwrap());

static NEWS_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(Trump|Biden|Harris|election|president|Bitcoin|BTC|crypto|Ethereum|ETH|Fed|inflation|rate|economy|recession|AI|GPT|OpenAI|Google|Microsoft|war|conflict|Ukraine|Russia|China|COVID|pandemic|vaccine)\b",
    )
    .unwrap()
});

static SOCIAL_KEYWORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(tariff|trade|China|Mexico|border|Fed|inflation|economy|recession|NATO|Ukraine|Russia|war|crypto|Bitcoin|regulation)\b",
    )
    .unwrap()
});

const KEYWORD_WEIGHT: f64 = 0.4;
const OVERLAP_WEIGHT: f64 = 0.3;
const ENTITY_WEIGHT: f64 = 0.3;

/// Word-overlap denominator: ten shared long words saturate the sub-score
const OVERLAP_SATURATION: f64 = 10.0;

/// Stateless relevance scorer; the boost table is the only configuration
pub struct RelevanceMatcher {
    account_boosts: HashMap<String, f64>,
}

impl RelevanceMatcher {
    pub fn new(account_boosts: HashMap<String, f64>) -> Self {
        Self { account_boosts }
    }

    /// Score topical relatedness in [0, 1] between a signal and a market.
    ///
    /// `signal_text` is the original-case text (entity extraction needs
    /// capitalization); matching against `market_text` is case-insensitive.
    /// `account` applies the influential-account boost for attributed
    /// signals, still capped at 1.0 total.
    pub fn score(
        &self,
        signal_text: &str,
        keywords: &[String],
        market_text: &str,
        account: Option<&str>,
    ) -> f64 {
        let market_lower = market_text.to_lowercase();
        let signal_lower = signal_text.to_lowercase();
        let mut score = 0.0;

        // Keyword coverage
        if !keywords.is_empty() {
            let matches = keywords
                .iter()
                .filter(|k| market_lower.contains(&k.to_lowercase()))
                .count();
            score += (matches as f64 / keywords.len() as f64).min(1.0) * KEYWORD_WEIGHT;
        }

        // Word-set overlap (tokens of length >= 4)
        let signal_words = tokenize(&signal_lower);
        let market_words = tokenize(&market_lower);
        if !signal_words.is_empty() && !market_words.is_empty() {
            let overlap = signal_words.intersection(&market_words).count();
            score += (overlap as f64 / OVERLAP_SATURATION).min(1.0) * OVERLAP_WEIGHT;
        }

        // Entity overlap
        let entities = extract_entities(signal_text);
        if !entities.is_empty() {
            let matches = entities
                .iter()
                .filter(|e| market_lower.contains(&e.to_lowercase()))
                .count();
            score += (matches as f64 / entities.len() as f64).min(1.0) * ENTITY_WEIGHT;
        }

        // Influential-account boost
        if let Some(handle) = account {
            if let Some(boost) = self.account_boosts.get(&handle.to_lowercase()) {
                score += boost;
            }
        }

        score.min(1.0)
    }
}

/// Distinct lowercase tokens of length >= 4
pub fn tokenize(text: &str) -> HashSet<String> {
    WORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

/// Capitalized single- or multi-word sequences (people, organizations)
pub fn extract_entities(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    ENTITY_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

/// Market-relevant keywords from a news headline
pub fn extract_news_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    NEWS_KEYWORD_RE
        .find_iter(text)
        .map(|m| m.as_str().to_string())
        .filter(|k| seen.insert(k.to_lowercase()))
        .collect()
}

/// Keywords from a social post: hashtags, mentions and the pattern table,
/// all lowercased for case-insensitive matching downstream
pub fn extract_social_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for captures in HASHTAG_RE.captures_iter(text) {
        let tag = captures[1].to_lowercase();
        if seen.insert(tag.clone()) {
            keywords.push(tag);
        }
    }
    for captures in MENTION_RE.captures_iter(text) {
        let handle = captures[1].to_lowercase();
        if seen.insert(handle.clone()) {
            keywords.push(handle);
        }
    }
    for found in SOCIAL_KEYWORD_RE.find_iter(text) {
        let word = found.as_str().to_lowercase();
        if seen.insert(word.clone()) {
            keywords.push(word);
        }
    }
    keywords
}
