// src/matching/org_model.rs - Pairwise match probability for organisation names
use anyhow::{Context, Result};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use strsim::{jaro_winkler, normalized_levenshtein};

use super::name::{normalize_name, token_jaccard};

pub const FEATURE_VECTOR_SIZE: usize = 4;
const PRIOR_WEIGHTS: [f64; FEATURE_VECTOR_SIZE] = [3.5, 3.5, 2.0, 2.0];
const PRIOR_BIAS: f64 = -7.5;
const LEARNING_RATE: f64 = 0.05;
const TRAINING_SEED: u64 = 42;

/// One side of a labeled pair. Only the `name` field takes part in matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub name: String,
}

/// Labeled pairs in the dedupe training-file layout.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingData {
    #[serde(rename = "match", default)]
    pub matches: Vec<[TrainingRecord; 2]>,
    #[serde(default)]
    pub distinct: Vec<[TrainingRecord; 2]>,
}

impl TrainingData {
    pub fn len(&self) -> usize {
        self.matches.len() + self.distinct.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Similarity features of two raw names, computed on their normalized forms.
pub fn pair_features(a: &str, b: &str) -> [f64; FEATURE_VECTOR_SIZE] {
    let left = normalize_name(a);
    let right = normalize_name(b);
    normalized_pair_features(&left, &right)
}

pub fn normalized_pair_features(left: &str, right: &str) -> [f64; FEATURE_VECTOR_SIZE] {
    let exact = if !left.is_empty() && left == right { 1.0 } else { 0.0 };
    [
        jaro_winkler(left, right),
        normalized_levenshtein(left, right),
        token_jaccard(left, right),
        exact,
    ]
}

/// Online logistic regression over [`pair_features`]. Starts from a prior
/// that already separates near-identical names from unrelated ones, so an
/// untrained model is usable.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PairMatchModel {
    // FEATURE_VECTOR_SIZE weights followed by the bias.
    weights: Vec<f64>,
    learning_rate: f64,
    trials: usize,
}

impl Default for PairMatchModel {
    fn default() -> Self {
        Self::with_prior()
    }
}

impl PairMatchModel {
    pub fn with_prior() -> Self {
        let mut weights = PRIOR_WEIGHTS.to_vec();
        weights.push(PRIOR_BIAS);
        Self {
            weights,
            learning_rate: LEARNING_RATE,
            trials: 0,
        }
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn trials(&self) -> usize {
        self.trials
    }

    fn predict_features(&self, features: &[f64]) -> f64 {
        let features_with_bias = features.iter().chain(std::iter::once(&1.0));
        let logit: f64 = self
            .weights
            .iter()
            .zip(features_with_bias)
            .map(|(w, f)| w * f)
            .sum();
        1.0 / (1.0 + (-logit).exp())
    }

    /// Probability that two raw names refer to the same organisation.
    pub fn predict(&self, a: &str, b: &str) -> f64 {
        self.predict_features(&pair_features(a, b))
    }

    /// Same as [`predict`](Self::predict) for names normalized by the caller.
    pub fn predict_normalized(&self, left: &str, right: &str) -> f64 {
        self.predict_features(&normalized_pair_features(left, right))
    }

    fn update(&mut self, features: &[f64], label: f64) {
        let prediction = self.predict_features(features);
        let error = label - prediction;
        for (i, feature_val) in features.iter().enumerate() {
            self.weights[i] += self.learning_rate * error * feature_val;
        }
        let bias_index = self.weights.len() - 1;
        self.weights[bias_index] += self.learning_rate * error;
        self.trials += 1;
    }

    /// Refines the weights with labeled pairs. At most `sample_size` pairs are
    /// used; the sample and the per-epoch order come from a fixed seed, so the
    /// same file always yields the same model.
    pub fn train(&mut self, data: &TrainingData, epochs: usize, sample_size: usize) {
        let mut examples: Vec<([f64; FEATURE_VECTOR_SIZE], f64)> = data
            .matches
            .iter()
            .map(|[a, b]| (pair_features(&a.name, &b.name), 1.0))
            .chain(
                data.distinct
                    .iter()
                    .map(|[a, b]| (pair_features(&a.name, &b.name), 0.0)),
            )
            .collect();

        let mut rng = StdRng::seed_from_u64(TRAINING_SEED);
        examples.shuffle(&mut rng);
        if examples.len() > sample_size {
            debug!(
                "Sampling {} of {} labeled pairs",
                sample_size,
                examples.len()
            );
            examples.truncate(sample_size);
        }

        for _ in 0..epochs {
            examples.shuffle(&mut rng);
            for (features, label) in &examples {
                self.update(features, *label);
            }
        }
        info!(
            "Trained organisation pair model on {} pairs over {} epochs (weights: {:?})",
            examples.len(),
            epochs,
            self.weights
        );
    }

    /// Loads labeled pairs from `path` and trains on them. A missing path or
    /// file leaves the prior in place; a malformed file is an error.
    pub async fn load(
        path: Option<&Path>,
        epochs: usize,
        sample_size: usize,
    ) -> Result<Self> {
        let mut model = Self::with_prior();
        let Some(path) = path else {
            info!("No organisation training file configured, using prior weights");
            return Ok(model);
        };
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            warn!(
                "Organisation training file {} not found, using prior weights",
                path.display()
            );
            return Ok(model);
        }
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read training file {}", path.display()))?;
        let data: TrainingData = serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse training file {}", path.display()))?;
        info!(
            "Loaded {} match and {} distinct pairs from {}",
            data.matches.len(),
            data.distinct.len(),
            path.display()
        );
        if !data.is_empty() {
            model.train(&data, epochs, sample_size);
        }
        Ok(model)
    }
}
