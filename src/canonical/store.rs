// src/canonical/store.rs
use log::debug;
use std::collections::HashMap;

use crate::canonical::reference::ReferenceData;
use crate::clustering::build_canonical_mappings;
use crate::matching::similarity::SimilarityMetric;
use crate::models::CanonicalMapping;

/// Cached partition of the training corpus for rebuild-on-miss lookups.
///
/// The store starts invalid. [`rebuild`](Self::rebuild) replaces the whole
/// partition; there is no incremental update.
#[derive(Debug)]
pub struct CanonicalStore {
    reference: ReferenceData,
    metric: SimilarityMetric,
    threshold: f64,
    mappings: Option<Vec<CanonicalMapping>>,
    index: HashMap<String, usize>,
    generation: u64,
}

impl CanonicalStore {
    pub fn new(reference: ReferenceData, metric: SimilarityMetric, threshold: f64) -> Self {
        Self {
            reference,
            metric,
            threshold,
            mappings: None,
            index: HashMap::new(),
            generation: 0,
        }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Number of rebuilds so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_valid(&self) -> bool {
        self.mappings.is_some()
    }

    /// Drops the cached partition. The next lookup misses.
    pub fn invalidate(&mut self) {
        self.mappings = None;
        self.index.clear();
    }

    /// Recomputes the partition from the full corpus.
    pub fn rebuild<S: AsRef<str>>(&mut self, corpus: &[S]) {
        let mappings =
            build_canonical_mappings(corpus, &self.reference, self.metric, self.threshold);
        let mut index = HashMap::new();
        for (idx, mapping) in mappings.iter().enumerate() {
            for variant in &mapping.variations {
                index.insert(variant.clone(), idx);
            }
        }
        debug!(
            "Canonical store rebuilt: {} mappings, {} variants",
            mappings.len(),
            index.len()
        );
        self.mappings = Some(mappings);
        self.index = index;
        self.generation += 1;
    }

    /// Canonical form of `variant`, if the cached partition contains it.
    pub fn lookup(&self, variant: &str) -> Option<&str> {
        let mappings = self.mappings.as_ref()?;
        let idx = *self.index.get(variant)?;
        mappings.get(idx).map(|m| m.canonical.as_str())
    }

    pub fn mappings(&self) -> &[CanonicalMapping] {
        self.mappings.as_deref().unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::reference::ReferenceEntity;
    use crate::clustering::hierarchical::DISTANCE_THRESHOLD;

    fn store() -> CanonicalStore {
        let reference = ReferenceData::new(vec![ReferenceEntity {
            name: "Thailand".to_string(),
            official_name: None,
            short_forms: vec!["TH".to_string(), "THA".to_string()],
        }]);
        CanonicalStore::new(reference, SimilarityMetric::Jaro, DISTANCE_THRESHOLD)
    }

    #[test]
    fn test_lookup_requires_rebuild() {
        let mut store = store();
        assert!(!store.is_valid());
        assert_eq!(store.lookup("Thailand"), None);

        store.rebuild(&["Thailand", "THA"]);
        assert!(store.is_valid());
        assert_eq!(store.generation(), 1);
        assert_eq!(store.lookup("THA"), Some("Thailand"));
        assert_eq!(store.lookup("Thailandd"), None);
        assert_eq!(store.mappings().len(), 1);
    }

    #[test]
    fn test_invalidate_clears_partition() {
        let mut store = store();
        store.rebuild(&["Thailand"]);
        store.invalidate();
        assert_eq!(store.lookup("Thailand"), None);
        assert!(store.mappings().is_empty());
    }

    #[test]
    fn test_rebuild_is_deterministic() {
        let mut store = store();
        store.rebuild(&["Thailand", "THA", "Thailandd", "Atlantis"]);
        let first = store.mappings().to_vec();
        store.invalidate();
        store.rebuild(&["Thailand", "THA", "Thailandd", "Atlantis"]);
        assert_eq!(store.mappings(), first.as_slice());
        assert_eq!(store.generation(), 2);
    }
}
