// src/clustering/distance_matrix.rs
use super::constraints::{classify, Constraint};
use crate::canonical::reference::ReferenceData;
use crate::matching::similarity::SimilarityMetric;

/// Distance assigned to cannot-link pairs. Above any sensible cut height.
pub const MAX_DISTANCE: f64 = 0.9;
/// Distance assigned to must-link pairs.
pub const MIN_DISTANCE: f64 = 0.0;
/// Floor for every unconstrained pair, so must-link merges always come first.
pub const MIN_UNCONSTRAINED_DISTANCE: f64 = 1e-6;

/// Upper triangle of a symmetric distance matrix, stored row by row without
/// the diagonal.
#[derive(Debug, Clone, PartialEq)]
pub struct CondensedDistanceMatrix {
    n: usize,
    values: Vec<f64>,
}

impl CondensedDistanceMatrix {
    pub fn from_fn<F>(n: usize, mut distance: F) -> Self
    where
        F: FnMut(usize, usize) -> f64,
    {
        let mut values = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                values.push(distance(i, j));
            }
        }
        Self { n, values }
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    fn index(&self, i: usize, j: usize) -> usize {
        let (i, j) = if i < j { (i, j) } else { (j, i) };
        self.n * i - i * (i + 1) / 2 + (j - i - 1)
    }

    /// Distance between items `i` and `j`; zero on the diagonal.
    pub fn get(&self, i: usize, j: usize) -> f64 {
        if i == j {
            0.0
        } else {
            self.values[self.index(i, j)]
        }
    }
}

/// Builds constrained distances between corpus variants: cannot-link pairs
/// get [`MAX_DISTANCE`], must-link pairs [`MIN_DISTANCE`], everything else
/// the metric distance floored at [`MIN_UNCONSTRAINED_DISTANCE`].
///
/// A variant that is a known name of a reference entity stands in for the
/// whole entity: its distance to a free variant is the distance from that
/// variant to the entity's nearest known name, and two known names of
/// different entities are kept apart like cannot-link pairs. Short forms
/// therefore never veto a misspelling joining their entity's cluster.
pub fn build_distance_matrix(
    variants: &[String],
    reference: &ReferenceData,
    metric: SimilarityMetric,
) -> CondensedDistanceMatrix {
    CondensedDistanceMatrix::from_fn(variants.len(), |i, j| {
        pair_distance(reference, metric, &variants[i], &variants[j])
    })
}

fn pair_distance(reference: &ReferenceData, metric: SimilarityMetric, a: &str, b: &str) -> f64 {
    match classify(reference, a, b) {
        Constraint::CannotLink => MAX_DISTANCE,
        Constraint::MustLink => MIN_DISTANCE,
        Constraint::None => {
            let distance = match (
                reference.entity_for_known_name(a),
                reference.entity_for_known_name(b),
            ) {
                (Some(left), Some(right)) if left != right => MAX_DISTANCE,
                (Some(entity), None) => distance_to_entity(reference, metric, entity, b),
                (None, Some(entity)) => distance_to_entity(reference, metric, entity, a),
                _ => metric.distance(a, b),
            };
            distance.max(MIN_UNCONSTRAINED_DISTANCE)
        }
    }
}

fn distance_to_entity(
    reference: &ReferenceData,
    metric: SimilarityMetric,
    entity: usize,
    variant: &str,
) -> f64 {
    reference
        .entities()
        .get(entity)
        .map(|e| {
            e.known_names()
                .map(|name| metric.distance(name, variant))
                .fold(1.0, f64::min)
        })
        .unwrap_or(1.0)
}
