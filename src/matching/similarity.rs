// src/matching/similarity.rs
use serde::{Deserialize, Serialize};
use strsim::{jaro, jaro_winkler, normalized_levenshtein};

/// String similarity used for location clustering. Every variant compares
/// lowercased input and returns a score in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Jaro,
    JaroWinkler,
    NormalizedLevenshtein,
}

impl SimilarityMetric {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "jaro" => Some(Self::Jaro),
            "jaro_winkler" | "jarowinkler" => Some(Self::JaroWinkler),
            "normalized_levenshtein" | "levenshtein" => Some(Self::NormalizedLevenshtein),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jaro => "jaro",
            Self::JaroWinkler => "jaro_winkler",
            Self::NormalizedLevenshtein => "normalized_levenshtein",
        }
    }

    pub fn similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let a = a.to_lowercase();
        let b = b.to_lowercase();
        match self {
            Self::Jaro => jaro(&a, &b),
            Self::JaroWinkler => jaro_winkler(&a, &b),
            Self::NormalizedLevenshtein => normalized_levenshtein(&a, &b),
        }
    }

    /// `1 - similarity`, clamped to `[0, 1]`.
    pub fn distance(&self, a: &str, b: &str) -> f64 {
        (1.0 - self.similarity(a, b)).clamp(0.0, 1.0)
    }
}
