// src/clustering/constraints.rs
use crate::canonical::reference::ReferenceData;

/// Pairwise constraint between two corpus variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constraint {
    /// Two full names of different reference entities.
    CannotLink,
    /// Two different spellings known for the same reference entity.
    MustLink,
    None,
}

/// Classifies a pair of variants against the reference data. Cannot-link is
/// checked first; the two rules never both hold because the first requires
/// different entities and the second the same one.
pub fn classify(reference: &ReferenceData, a: &str, b: &str) -> Constraint {
    if cannot_link(reference, a, b) {
        Constraint::CannotLink
    } else if must_link(reference, a, b) {
        Constraint::MustLink
    } else {
        Constraint::None
    }
}

pub fn cannot_link(reference: &ReferenceData, a: &str, b: &str) -> bool {
    match (
        reference.entity_for_full_name(a),
        reference.entity_for_full_name(b),
    ) {
        (Some(left), Some(right)) => left != right,
        _ => false,
    }
}

pub fn must_link(reference: &ReferenceData, a: &str, b: &str) -> bool {
    if a == b {
        return false;
    }
    match (
        reference.entity_for_known_name(a),
        reference.entity_for_known_name(b),
    ) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}
