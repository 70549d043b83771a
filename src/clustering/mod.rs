// src/clustering/mod.rs
pub mod canonical_selector;
pub mod constraints;
pub mod distance_matrix;
pub mod hierarchical;
pub mod organisation_clusters;

use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::time::Instant;

use crate::canonical::reference::ReferenceData;
use crate::matching::similarity::SimilarityMetric;
use crate::models::CanonicalMapping;

use self::canonical_selector::select_canonical;
use self::distance_matrix::build_distance_matrix;
use self::hierarchical::complete_linkage;

/// Clusters corpus variants into canonical mappings.
///
/// Duplicates are dropped keeping the first occurrence. Clustering runs over
/// the variants in sorted order, so the partition depends only on the set of
/// variants and `threshold`; first-seen order only breaks canonical ties.
/// Fewer than two distinct variants skip clustering and yield singletons.
pub fn build_canonical_mappings<S: AsRef<str>>(
    corpus: &[S],
    reference: &ReferenceData,
    metric: SimilarityMetric,
    threshold: f64,
) -> Vec<CanonicalMapping> {
    let start = Instant::now();

    let mut seen = HashSet::new();
    let first_seen: Vec<String> = corpus
        .iter()
        .map(|v| v.as_ref().to_string())
        .filter(|v| seen.insert(v.clone()))
        .collect();
    let rank: HashMap<&str, usize> = first_seen
        .iter()
        .enumerate()
        .map(|(idx, v)| (v.as_str(), idx))
        .collect();

    let mut sorted = first_seen.clone();
    sorted.sort();

    let groups: Vec<Vec<usize>> = if sorted.len() < 2 {
        (0..sorted.len()).map(|idx| vec![idx]).collect()
    } else {
        let matrix = build_distance_matrix(&sorted, reference, metric);
        complete_linkage(&matrix).clusters(threshold)
    };

    let mut mappings: Vec<CanonicalMapping> = groups
        .into_iter()
        .filter_map(|group| {
            let mut members: Vec<&str> = group.iter().map(|&idx| sorted[idx].as_str()).collect();
            members.sort_by_key(|m| rank.get(m).copied().unwrap_or(usize::MAX));
            let canonical = select_canonical(&members, reference)?;
            Some(CanonicalMapping::new(
                canonical,
                members.into_iter().map(str::to_string).collect(),
            ))
        })
        .collect();
    mappings.sort_by(|a, b| a.canonical.cmp(&b.canonical));

    debug!(
        "Clustered {} variants ({} metric, threshold {:.3})",
        first_seen.len(),
        metric.as_str(),
        threshold
    );
    info!(
        "[LOCATION] Built {} canonical mappings from {} variants in {:.2?}",
        mappings.len(),
        first_seen.len(),
        start.elapsed()
    );
    mappings
}
