// src/matching/name.rs - Organisation name normalization and tokenization
use once_cell::sync::Lazy;
use std::collections::HashSet;

pub const MIN_TOKEN_LENGTH: usize = 2;

// Tokens too common among sponsor names to be useful for blocking
pub const STOPWORDS: [&str; 48] = [
    // Articles, conjunctions, and prepositions
    "a", "an", "the", "and", "or", "for", "in", "on", "at", "by", "to", "with", "from", "of",
    "de", "la", "le", "du", "des", "der", "und", "y",
    // Business and institutional terms with little discriminative value
    "inc", "corp", "llc", "ltd", "co", "company", "group", "holdings", "international",
    "global", "national", "pharmaceuticals", "pharmaceutical", "pharma", "pharms",
    "university", "hospital", "institute", "center", "centre", "foundation", "research",
    "medical", "clinical", "health", "sciences",
];

static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

// Legal-form suffixes stripped from the end of a name, repeatedly
const LEGAL_SUFFIXES: [&str; 24] = [
    " incorporated", " inc", " corporation", " corp", " limited liability company", " llc",
    " limited", " ltd", " company", " co", " lp", " llp", " plc", " gmbh", " ag", " sa",
    " sas", " sarl", " bv", " nv", " spa", " pty", " kk", " ab",
];

/// Lowercases, spells out `&`, drops punctuation and trailing legal forms.
///
/// "VERTEX PHARMS INC" and "Vertex Pharms." both normalize to "vertex pharms".
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.to_lowercase().replace('&', " and ");
    for (pattern, replacement) in [("/", " "), ("-", " "), (".", ""), ("'", ""), (",", " ")] {
        normalized = normalized.replace(pattern, replacement);
    }
    normalized = normalized
        .chars()
        .map(|c| if c.is_alphanumeric() || c.is_whitespace() { c } else { ' ' })
        .collect();
    normalized = normalized.split_whitespace().collect::<Vec<_>>().join(" ");

    if let Some(stripped) = normalized.strip_prefix("the ") {
        normalized = stripped.to_string();
    }

    loop {
        let before = normalized.len();
        for suffix in LEGAL_SUFFIXES {
            if normalized.len() > suffix.len() && normalized.ends_with(suffix) {
                normalized.truncate(normalized.len() - suffix.len());
            }
        }
        if normalized.len() == before {
            break;
        }
    }
    normalized.trim().to_string()
}

/// Informative tokens of an already normalized name.
pub fn tokenize_name(normalized_name: &str) -> HashSet<String> {
    normalized_name
        .split_whitespace()
        .filter(|token| token.chars().count() >= MIN_TOKEN_LENGTH)
        .filter(|token| !STOPWORD_SET.contains(token))
        .map(str::to_string)
        .collect()
}

/// All whitespace-separated tokens, stopwords included. Used for overlap
/// features where the stopword filter would leave nothing to compare.
pub fn all_tokens(normalized_name: &str) -> HashSet<&str> {
    normalized_name.split_whitespace().collect()
}

pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let left = all_tokens(a);
    let right = all_tokens(b);
    if left.is_empty() && right.is_empty() {
        return 1.0;
    }
    let intersection = left.intersection(&right).count();
    let union = left.union(&right).count();
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}
