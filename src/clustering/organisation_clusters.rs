// src/clustering/organisation_clusters.rs - Batch clustering of organisation names
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};
use petgraph::algo::connected_components;
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::Bfs;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::time::Instant;

use super::canonical_selector::longest_member;
use super::distance_matrix::CondensedDistanceMatrix;
use super::hierarchical::complete_linkage;
use crate::matching::name::{normalize_name, tokenize_name};
use crate::matching::org_model::PairMatchModel;
use crate::models::core::{get_str, Collection, Record};
use crate::models::CanonicalMapping;
use crate::storage::{iter_rows, Warehouse, WriteOp};
use crate::utils::config::CanonicalizationConfig;

const READ_BUFSIZE: usize = 1000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganisationClusterStats {
    pub names: usize,
    pub candidate_pairs: usize,
    pub matched_pairs: usize,
    pub components: usize,
    pub clusters: usize,
    pub clustered_names: usize,
}

fn progress_bar(len: u64, enabled: bool) -> Option<ProgressBar> {
    if !enabled {
        return None;
    }
    let pb = ProgressBar::new(len);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    Some(pb)
}

/// Pairs of name indices worth scoring: names sharing an informative token
/// or normalizing to the same string.
fn candidate_pairs(normalized: &[String]) -> BTreeSet<(usize, usize)> {
    let mut blocks: HashMap<String, Vec<usize>> = HashMap::new();
    for (idx, name) in normalized.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        blocks.entry(format!("={}", name)).or_default().push(idx);
        for token in tokenize_name(name) {
            blocks.entry(token).or_default().push(idx);
        }
    }

    let mut pairs = BTreeSet::new();
    for members in blocks.values() {
        for (pos, &i) in members.iter().enumerate() {
            for &j in &members[pos + 1..] {
                pairs.insert((i.min(j), i.max(j)));
            }
        }
    }
    pairs
}

/// Groups organisation names that the pair model scores at or above
/// `threshold`. Only clusters with at least two distinct names are returned;
/// each is named after its longest member, earliest name first on ties.
pub fn cluster_organisation_names<S: AsRef<str>>(
    names: &[S],
    model: &PairMatchModel,
    threshold: f64,
    show_progress: bool,
) -> (Vec<CanonicalMapping>, OrganisationClusterStats) {
    let mut seen = HashSet::new();
    let names: Vec<String> = names
        .iter()
        .map(|n| n.as_ref().trim().to_string())
        .filter(|n| !n.is_empty() && seen.insert(n.clone()))
        .collect();
    let normalized: Vec<String> = names.iter().map(|n| normalize_name(n)).collect();

    let mut stats = OrganisationClusterStats {
        names: names.len(),
        ..Default::default()
    };

    let pairs = candidate_pairs(&normalized);
    stats.candidate_pairs = pairs.len();
    debug!(
        "[ORG_CLUSTERS] {} candidate pairs from {} names",
        pairs.len(),
        names.len()
    );

    let mut graph: UnGraph<usize, f64> = UnGraph::with_capacity(names.len(), pairs.len());
    let nodes: Vec<NodeIndex> = (0..names.len()).map(|idx| graph.add_node(idx)).collect();

    let pb = progress_bar(pairs.len() as u64, show_progress);
    if let Some(pb) = &pb {
        pb.set_message("Scoring candidate pairs...");
    }
    for &(i, j) in &pairs {
        let p = model.predict_normalized(&normalized[i], &normalized[j]);
        if p >= threshold {
            graph.add_edge(nodes[i], nodes[j], p);
            stats.matched_pairs += 1;
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }
    if let Some(pb) = &pb {
        pb.finish_with_message(format!("{} matched pairs", stats.matched_pairs));
    }

    stats.components = connected_components(&graph);
    info!(
        "[ORG_CLUSTERS] Match graph has {} nodes, {} edges and {} components",
        graph.node_count(),
        graph.edge_count(),
        stats.components
    );

    let cut_height = 1.0 - threshold;
    let mut visited = vec![false; graph.node_count()];
    let mut mappings = Vec::new();
    for start in graph.node_indices() {
        if visited[start.index()] || graph.neighbors(start).next().is_none() {
            continue;
        }
        let mut component = Vec::new();
        let mut bfs = Bfs::new(&graph, start);
        while let Some(node) = bfs.next(&graph) {
            visited[node.index()] = true;
            component.push(graph[node]);
        }
        component.sort_unstable();

        // A chain of matches is not enough: every pair inside a final
        // cluster has to clear the threshold.
        let matrix = CondensedDistanceMatrix::from_fn(component.len(), |a, b| {
            1.0 - model.predict_normalized(&normalized[component[a]], &normalized[component[b]])
        });
        for group in complete_linkage(&matrix).clusters(cut_height) {
            if group.len() < 2 {
                continue;
            }
            let members: Vec<String> = group
                .iter()
                .map(|&pos| names[component[pos]].clone())
                .collect();
            if let Some(canonical) = longest_member(&members).map(str::to_string) {
                stats.clustered_names += members.len();
                mappings.push(CanonicalMapping::new(canonical, members));
            }
        }
    }
    stats.clusters = mappings.len();
    (mappings, stats)
}

/// Rebuilds the persisted organisation clusters from every name in the
/// `organisations` collection. The old clusters are deleted and the new ones
/// inserted in a single transaction, so readers never see a partial store.
pub async fn update_organisation_clusters(
    warehouse: &dyn Warehouse,
    config: &CanonicalizationConfig,
) -> Result<OrganisationClusterStats> {
    let start = Instant::now();
    info!("[ORG_CLUSTERS] Reading organisation names...");
    let rows = iter_rows(warehouse, Collection::Organisations, &Record::new(), READ_BUFSIZE)
        .await
        .context("Failed to read organisations")?;
    let names: Vec<&str> = rows.iter().filter_map(|row| get_str(row, "name")).collect();
    if names.len() < rows.len() {
        warn!(
            "[ORG_CLUSTERS] {} organisation rows have no name",
            rows.len() - names.len()
        );
    }

    let model = PairMatchModel::load(
        config.org_training_file.as_deref(),
        config.org_training_epochs,
        config.org_sample_size,
    )
    .await?;

    let (mappings, stats) = cluster_organisation_names(
        &names,
        &model,
        config.org_match_threshold,
        config.progress_enabled,
    );

    let mut ops = Vec::with_capacity(mappings.len() + 1);
    ops.push(WriteOp::Delete {
        collection: Collection::OrganisationClusters,
        filter: Record::new(),
    });
    ops.extend(mappings.iter().map(|mapping| WriteOp::Insert {
        collection: Collection::OrganisationClusters,
        record: mapping.to_record(),
    }));
    warehouse
        .transaction(ops)
        .await
        .context("Failed to replace organisation clusters")?;

    info!(
        "[ORG_CLUSTERS] Stored {} clusters covering {} of {} names in {:.2?}",
        stats.clusters,
        stats.clustered_names,
        stats.names,
        start.elapsed()
    );
    Ok(stats)
}
