// src/canonical/location.rs - Rebuild-on-miss canonicalization of location names
use anyhow::Result;
use log::{debug, info};
use tokio::sync::Mutex;

use super::corpus::TrainingCorpus;
use super::reference::ReferenceData;
use super::store::CanonicalStore;
use crate::utils::config::CanonicalizationConfig;

/// Owns the training corpus and the cached partition built from it.
///
/// A lookup that misses appends the variant to the corpus, rebuilds the
/// partition once and looks up again. If the variant still has no canonical
/// form the trimmed input is returned. The store lock is held for the whole
/// sequence, so concurrent misses in one process rebuild one after another.
pub struct LocationCanonicalizer {
    corpus: TrainingCorpus,
    store: Mutex<CanonicalStore>,
}

impl LocationCanonicalizer {
    pub fn new(corpus: TrainingCorpus, store: CanonicalStore) -> Self {
        Self {
            corpus,
            store: Mutex::new(store),
        }
    }

    /// Loads the reference table and seeds an empty corpus with its canonical
    /// names. Short forms and official names are left out of the seed; they
    /// enter the corpus when they are first looked up.
    pub async fn from_config(config: &CanonicalizationConfig) -> Result<Self> {
        let reference = ReferenceData::from_path(&config.reference_data_path).await?;
        let corpus = TrainingCorpus::new(&config.location_corpus_path);
        corpus.seed_if_empty(reference.canonical_names()).await?;
        let store = CanonicalStore::new(
            reference,
            config.similarity_metric,
            config.distance_threshold,
        );
        Ok(Self::new(corpus, store))
    }

    pub fn corpus(&self) -> &TrainingCorpus {
        &self.corpus
    }

    /// Number of partition rebuilds performed so far.
    pub async fn rebuilds(&self) -> u64 {
        self.store.lock().await.generation()
    }

    /// Canonical name for `raw`. Empty input yields `None`.
    pub async fn canonical_location_name(&self, raw: Option<&str>) -> Result<Option<String>> {
        let variant = match raw.map(|r| r.replace(['\r', '\n'], " ")) {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => return Ok(None),
        };

        let mut store = self.store.lock().await;
        if !store.is_valid() {
            let corpus = self.corpus.read_all().await?;
            store.rebuild(&corpus);
        }
        if let Some(canonical) = store.lookup(&variant) {
            debug!("[LOCATION] '{}' -> '{}'", variant, canonical);
            return Ok(Some(canonical.to_string()));
        }

        info!("[LOCATION] '{}' not in training corpus, retraining", variant);
        self.corpus.append(&variant).await?;
        store.invalidate();
        let corpus = self.corpus.read_all().await?;
        store.rebuild(&corpus);

        match store.lookup(&variant) {
            Some(canonical) => {
                info!("[LOCATION] '{}' -> '{}' after retraining", variant, canonical);
                Ok(Some(canonical.to_string()))
            }
            None => {
                debug!("[LOCATION] '{}' still unmapped, using it as canonical", variant);
                Ok(Some(variant))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::reference::ReferenceEntity;
    use crate::clustering::hierarchical::DISTANCE_THRESHOLD;
    use crate::matching::similarity::SimilarityMetric;
    use tempfile::TempDir;

    fn reference() -> ReferenceData {
        ReferenceData::new(vec![
            ReferenceEntity {
                name: "Thailand".to_string(),
                official_name: Some("Kingdom of Thailand".to_string()),
                short_forms: vec!["TH".to_string(), "THA".to_string()],
            },
            ReferenceEntity {
                name: "Taiwan".to_string(),
                official_name: None,
                short_forms: vec!["TW".to_string(), "TWN".to_string()],
            },
            ReferenceEntity {
                name: "Brazil".to_string(),
                official_name: None,
                short_forms: vec!["BR".to_string(), "BRA".to_string()],
            },
        ])
    }

    async fn canonicalizer(dir: &TempDir) -> LocationCanonicalizer {
        let reference = reference();
        let corpus = TrainingCorpus::new(dir.path().join("location_training.txt"));
        corpus.seed_if_empty(reference.canonical_names()).await.unwrap();
        let store = CanonicalStore::new(reference, SimilarityMetric::Jaro, DISTANCE_THRESHOLD);
        LocationCanonicalizer::new(corpus, store)
    }

    #[tokio::test]
    async fn test_known_name_hits_without_retraining() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        assert_eq!(
            canon.canonical_location_name(Some(" Brazil ")).await.unwrap(),
            Some("Brazil".to_string())
        );
        assert_eq!(canon.rebuilds().await, 1);
        assert_eq!(canon.corpus().read_all().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_misspelling_resolves_after_one_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        assert_eq!(
            canon.canonical_location_name(Some("Thailandd")).await.unwrap(),
            Some("Thailand".to_string())
        );
        // Initial build plus the retrain.
        assert_eq!(canon.rebuilds().await, 2);
    }

    #[tokio::test]
    async fn test_miss_then_hit_converges() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        let first = canon.canonical_location_name(Some("Thailandd")).await.unwrap();
        let size_after_miss = canon.corpus().read_all().await.unwrap().len();
        let rebuilds_after_miss = canon.rebuilds().await;

        let second = canon.canonical_location_name(Some("Thailandd")).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(canon.corpus().read_all().await.unwrap().len(), size_after_miss);
        assert_eq!(canon.rebuilds().await, rebuilds_after_miss);
    }

    #[tokio::test]
    async fn test_short_form_maps_to_reference_name() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        assert_eq!(
            canon.canonical_location_name(Some("THA")).await.unwrap(),
            Some("Thailand".to_string())
        );
    }

    #[tokio::test]
    async fn test_misspelling_still_resolves_once_short_form_is_known() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        let before = canon.canonical_location_name(Some("Thailandd")).await.unwrap();
        assert_eq!(before, Some("Thailand".to_string()));
        assert_eq!(
            canon.canonical_location_name(Some("TH")).await.unwrap(),
            Some("Thailand".to_string())
        );
        assert_eq!(canon.canonical_location_name(Some("Thailandd")).await.unwrap(), before);
        assert_eq!(
            canon.canonical_location_name(Some("Thailnd")).await.unwrap(),
            Some("Thailand".to_string())
        );
    }

    #[tokio::test]
    async fn test_unmatched_name_is_its_own_canonical() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        assert_eq!(
            canon.canonical_location_name(Some("  Atlantis\n")).await.unwrap(),
            Some("Atlantis".to_string())
        );
        assert!(canon
            .corpus()
            .read_all()
            .await
            .unwrap()
            .contains(&"Atlantis".to_string()));
    }

    #[tokio::test]
    async fn test_empty_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let canon = canonicalizer(&dir).await;
        assert_eq!(canon.canonical_location_name(None).await.unwrap(), None);
        assert_eq!(canon.canonical_location_name(Some("  ")).await.unwrap(), None);
        assert_eq!(canon.rebuilds().await, 0);
    }

    #[tokio::test]
    async fn test_corpus_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        {
            let canon = canonicalizer(&dir).await;
            canon.canonical_location_name(Some("Thailandd")).await.unwrap();
        }
        let canon = canonicalizer(&dir).await;
        assert_eq!(
            canon.canonical_location_name(Some("Thailandd")).await.unwrap(),
            Some("Thailand".to_string())
        );
        assert_eq!(canon.rebuilds().await, 1);
    }

    #[tokio::test]
    async fn test_shipped_country_table() {
        let dir = tempfile::tempdir().unwrap();
        let config = CanonicalizationConfig {
            location_corpus_path: dir.path().join("location_training.txt"),
            reference_data_path: std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
                .join("data")
                .join("countries.json"),
            ..Default::default()
        };
        let canon = LocationCanonicalizer::from_config(&config).await.unwrap();
        for (raw, expected) in [
            ("Thailandd", "Thailand"),
            ("USA", "United States"),
            ("Federal Republic of Nigeria", "Nigeria"),
            ("Niger", "Niger"),
        ] {
            assert_eq!(
                canon.canonical_location_name(Some(raw)).await.unwrap(),
                Some(expected.to_string()),
                "{}",
                raw
            );
        }
    }
}
