// src/clustering/canonical_selector.rs
use log::warn;
use std::collections::BTreeSet;

use crate::canonical::reference::ReferenceData;

/// Longest member by character count. `members` must be in first-seen order;
/// the earliest member wins ties.
pub fn longest_member<'a, S: AsRef<str>>(members: &'a [S]) -> Option<&'a str> {
    let mut best: Option<&str> = None;
    for member in members {
        let member = member.as_ref();
        match best {
            Some(current) if current.chars().count() >= member.chars().count() => {}
            _ => best = Some(member),
        }
    }
    best
}

/// Picks the canonical form of one cluster.
///
/// A cluster naming exactly one reference entity (by canonical or official
/// name) resolves to that entity's canonical name. Clusters naming several
/// entities indicate inconsistent data; they are logged and fall back to the
/// longest member, as do clusters without any reference name.
pub fn select_canonical<S: AsRef<str>>(members: &[S], reference: &ReferenceData) -> Option<String> {
    let entities: BTreeSet<usize> = members
        .iter()
        .filter_map(|m| reference.entity_for_full_name(m.as_ref()))
        .collect();

    if entities.len() == 1 {
        if let Some(name) = entities
            .iter()
            .next()
            .and_then(|idx| reference.canonical_name(*idx))
        {
            return Some(name.to_string());
        }
    } else if entities.len() > 1 {
        let names: Vec<&str> = entities
            .iter()
            .filter_map(|idx| reference.canonical_name(*idx))
            .collect();
        warn!(
            "[LOCATION] Cluster of {} variants spans {} reference entities ({}); using longest member",
            members.len(),
            names.len(),
            names.join(", ")
        );
    }

    longest_member(members).map(str::to_string)
}
