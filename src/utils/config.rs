// src/utils/config.rs
use log::{info, warn};
use std::env;
use std::path::PathBuf;

use crate::clustering::hierarchical::DISTANCE_THRESHOLD;
use crate::matching::similarity::SimilarityMetric;

pub const DEFAULT_LOCATION_CORPUS_PATH: &str = "data/location_training.txt";
pub const DEFAULT_REFERENCE_DATA_PATH: &str = "data/countries.json";
pub const DEFAULT_ORG_TRAINING_FILE: &str = "data/organisation_training.json";
pub const DEFAULT_ORG_MATCH_THRESHOLD: f64 = 0.75;
pub const DEFAULT_ORG_TRAINING_EPOCHS: usize = 20;
pub const DEFAULT_ORG_SAMPLE_SIZE: usize = 10_000;

/// Tunables for both canonicalization modes.
#[derive(Debug, Clone)]
pub struct CanonicalizationConfig {
    /// Append-only training corpus for location names
    pub location_corpus_path: PathBuf,
    /// Reference country table (JSON)
    pub reference_data_path: PathBuf,
    pub similarity_metric: SimilarityMetric,
    /// Dendrogram cut height for location clustering
    pub distance_threshold: f64,
    /// Minimum pairwise match probability for organisation names
    pub org_match_threshold: f64,
    /// Labeled organisation pairs; missing file means the prior model is used
    pub org_training_file: Option<PathBuf>,
    pub org_training_epochs: usize,
    pub org_sample_size: usize,
    pub progress_enabled: bool,
}

impl Default for CanonicalizationConfig {
    fn default() -> Self {
        Self {
            location_corpus_path: PathBuf::from(DEFAULT_LOCATION_CORPUS_PATH),
            reference_data_path: PathBuf::from(DEFAULT_REFERENCE_DATA_PATH),
            similarity_metric: SimilarityMetric::default(),
            distance_threshold: DISTANCE_THRESHOLD,
            org_match_threshold: DEFAULT_ORG_MATCH_THRESHOLD,
            org_training_file: Some(PathBuf::from(DEFAULT_ORG_TRAINING_FILE)),
            org_training_epochs: DEFAULT_ORG_TRAINING_EPOCHS,
            org_sample_size: DEFAULT_ORG_SAMPLE_SIZE,
            progress_enabled: true,
        }
    }
}

impl CanonicalizationConfig {
    /// Create configuration from environment variables, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let similarity_metric = match env::var("SIMILARITY_METRIC") {
            Ok(raw) => SimilarityMetric::parse(&raw).unwrap_or_else(|| {
                warn!(
                    "Unknown SIMILARITY_METRIC '{}', using {}",
                    raw,
                    defaults.similarity_metric.as_str()
                );
                defaults.similarity_metric
            }),
            Err(_) => defaults.similarity_metric,
        };

        let org_training_file = match env::var("ORG_TRAINING_FILE") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(PathBuf::from(raw)),
            Err(_) => defaults.org_training_file.clone(),
        };

        Self {
            location_corpus_path: env::var("LOCATION_CORPUS_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.location_corpus_path),
            reference_data_path: env::var("REFERENCE_DATA_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.reference_data_path),
            similarity_metric,
            distance_threshold: parse_unit_interval("DISTANCE_THRESHOLD", defaults.distance_threshold),
            org_match_threshold: parse_unit_interval(
                "ORG_MATCH_THRESHOLD",
                defaults.org_match_threshold,
            ),
            org_training_file,
            org_training_epochs: env::var("ORG_TRAINING_EPOCHS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.org_training_epochs),
            org_sample_size: env::var("ORG_SAMPLE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.org_sample_size),
            progress_enabled: env::var("PROGRESS_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
        }
    }

    pub fn log_config(&self) {
        info!("Canonicalization configuration:");
        info!("   Location corpus: {}", self.location_corpus_path.display());
        info!("   Reference data: {}", self.reference_data_path.display());
        info!(
            "   Similarity metric: {}, distance threshold: {:.3}",
            self.similarity_metric.as_str(),
            self.distance_threshold
        );
        info!(
            "   Organisation match threshold: {:.2}, training file: {}",
            self.org_match_threshold,
            self.org_training_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<none>".to_string())
        );
    }
}

fn parse_unit_interval(var: &str, default: f64) -> f64 {
    match env::var(var).ok().and_then(|s| s.parse::<f64>().ok()) {
        Some(value) if (0.0..=1.0).contains(&value) => value,
        Some(value) => {
            warn!("{}={} is outside [0, 1], using {}", var, value, default);
            default
        }
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: [&str; 9] = [
        "LOCATION_CORPUS_PATH",
        "REFERENCE_DATA_PATH",
        "SIMILARITY_METRIC",
        "DISTANCE_THRESHOLD",
        "ORG_MATCH_THRESHOLD",
        "ORG_TRAINING_FILE",
        "ORG_TRAINING_EPOCHS",
        "ORG_SAMPLE_SIZE",
        "PROGRESS_ENABLED",
    ];

    fn clear_vars() {
        for var in VARS {
            env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_when_unset() {
        clear_vars();
        let config = CanonicalizationConfig::from_env();
        assert_eq!(config.similarity_metric, SimilarityMetric::Jaro);
        assert_eq!(config.distance_threshold, DISTANCE_THRESHOLD);
        assert_eq!(config.org_match_threshold, 0.75);
        assert_eq!(
            config.location_corpus_path,
            PathBuf::from(DEFAULT_LOCATION_CORPUS_PATH)
        );
        assert!(config.progress_enabled);
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        clear_vars();
        env::set_var("SIMILARITY_METRIC", "jaro_winkler");
        env::set_var("DISTANCE_THRESHOLD", "0.2");
        env::set_var("ORG_TRAINING_FILE", "");
        env::set_var("ORG_TRAINING_EPOCHS", "3");
        env::set_var("PROGRESS_ENABLED", "false");

        let config = CanonicalizationConfig::from_env();
        assert_eq!(config.similarity_metric, SimilarityMetric::JaroWinkler);
        assert_eq!(config.distance_threshold, 0.2);
        assert!(config.org_training_file.is_none());
        assert_eq!(config.org_training_epochs, 3);
        assert!(!config.progress_enabled);

        clear_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_values_fall_back() {
        clear_vars();
        env::set_var("SIMILARITY_METRIC", "soundex");
        env::set_var("ORG_MATCH_THRESHOLD", "1.5");
        env::set_var("DISTANCE_THRESHOLD", "abc");

        let config = CanonicalizationConfig::from_env();
        assert_eq!(config.similarity_metric, SimilarityMetric::Jaro);
        assert_eq!(config.org_match_threshold, DEFAULT_ORG_MATCH_THRESHOLD);
        assert_eq!(config.distance_threshold, DISTANCE_THRESHOLD);

        clear_vars();
    }
}
