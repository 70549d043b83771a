// src/clustering/hierarchical.rs
use super::distance_matrix::CondensedDistanceMatrix;

/// Default cut height for the location dendrogram.
pub const DISTANCE_THRESHOLD: f64 = 0.15;

/// One agglomeration step. The merged cluster keeps slot `left`, which is
/// always the lower of the two slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    pub distance: f64,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Dendrogram {
    leaves: usize,
    merges: Vec<Merge>,
}

impl Dendrogram {
    pub fn leaves(&self) -> usize {
        self.leaves
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    /// Flat cluster label for every leaf, keeping merges at or below
    /// `threshold`. Labels are numbered by first leaf, starting at 0.
    pub fn cut(&self, threshold: f64) -> Vec<usize> {
        let mut parent: Vec<usize> = (0..self.leaves).collect();
        for merge in self.merges.iter().filter(|m| m.distance <= threshold) {
            let a = find_root(&mut parent, merge.left);
            let b = find_root(&mut parent, merge.right);
            if a != b {
                parent[a.max(b)] = a.min(b);
            }
        }

        let mut labels = vec![0; self.leaves];
        let mut label_of_root = vec![usize::MAX; self.leaves];
        let mut next_label = 0;
        for leaf in 0..self.leaves {
            let root = find_root(&mut parent, leaf);
            if label_of_root[root] == usize::MAX {
                label_of_root[root] = next_label;
                next_label += 1;
            }
            labels[leaf] = label_of_root[root];
        }
        labels
    }

    /// Leaf indices grouped by [`cut`](Self::cut) label, in label order.
    pub fn clusters(&self, threshold: f64) -> Vec<Vec<usize>> {
        let labels = self.cut(threshold);
        let count = labels.iter().copied().max().map_or(0, |max| max + 1);
        let mut groups = vec![Vec::new(); count];
        for (leaf, label) in labels.into_iter().enumerate() {
            groups[label].push(leaf);
        }
        groups
    }
}

fn find_root(parent: &mut [usize], mut node: usize) -> usize {
    while parent[node] != node {
        parent[node] = parent[parent[node]];
        node = parent[node];
    }
    node
}

/// Agglomerative clustering where the distance between two clusters is the
/// largest distance between their members. The closest pair is merged first;
/// ties go to the lowest slot pair, so the result depends only on the input
/// order of the matrix.
pub fn complete_linkage(matrix: &CondensedDistanceMatrix) -> Dendrogram {
    let n = matrix.len();
    if n < 2 {
        return Dendrogram {
            leaves: n,
            merges: Vec::new(),
        };
    }

    let mut dist: Vec<Vec<f64>> = (0..n)
        .map(|i| (0..n).map(|j| matrix.get(i, j)).collect())
        .collect();
    let mut sizes = vec![1usize; n];
    let mut active = vec![true; n];
    let mut merges = Vec::with_capacity(n - 1);

    for _ in 0..(n - 1) {
        let Some((i, j, distance)) = find_closest_pair(&dist, &active) else {
            break;
        };

        for k in 0..n {
            if k == i || k == j || !active[k] {
                continue;
            }
            let d = dist[i][k].max(dist[j][k]);
            dist[i][k] = d;
            dist[k][i] = d;
        }
        active[j] = false;
        sizes[i] += sizes[j];

        merges.push(Merge {
            left: i,
            right: j,
            distance,
            size: sizes[i],
        });
    }

    Dendrogram { leaves: n, merges }
}

fn find_closest_pair(dist: &[Vec<f64>], active: &[bool]) -> Option<(usize, usize, f64)> {
    let mut best: Option<(usize, usize, f64)> = None;
    for i in 0..dist.len() {
        if !active[i] {
            continue;
        }
        for j in (i + 1)..dist.len() {
            if !active[j] {
                continue;
            }
            let d = dist[i][j];
            if best.map_or(true, |(_, _, best_d)| d < best_d) {
                best = Some((i, j, d));
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matrix(values: &[&[f64]]) -> CondensedDistanceMatrix {
        CondensedDistanceMatrix::from_fn(values.len(), |i, j| values[i][j])
    }

    #[test]
    fn test_degenerate_inputs_are_singletons() {
        let empty = complete_linkage(&CondensedDistanceMatrix::from_fn(0, |_, _| 0.0));
        assert!(empty.cut(DISTANCE_THRESHOLD).is_empty());
        let one = complete_linkage(&CondensedDistanceMatrix::from_fn(1, |_, _| 0.0));
        assert_eq!(one.cut(DISTANCE_THRESHOLD), vec![0]);
    }

    #[test]
    fn test_complete_linkage_uses_farthest_member() {
        // a-b close, b-c close, a-c far: single linkage would chain all three.
        let m = matrix(&[
            &[0.0, 0.05, 0.5],
            &[0.05, 0.0, 0.1],
            &[0.5, 0.1, 0.0],
        ]);
        let dendrogram = complete_linkage(&m);
        assert_eq!(dendrogram.merges()[0], Merge { left: 0, right: 1, distance: 0.05, size: 2 });
        assert_eq!(dendrogram.merges()[1].distance, 0.5);
        assert_eq!(dendrogram.cut(0.15), vec![0, 0, 1]);
        assert_eq!(dendrogram.cut(0.5), vec![0, 0, 0]);
    }

    #[test]
    fn test_ties_break_on_lowest_slots() {
        let m = matrix(&[
            &[0.0, 0.1, 0.1],
            &[0.1, 0.0, 0.1],
            &[0.1, 0.1, 0.0],
        ]);
        let dendrogram = complete_linkage(&m);
        assert_eq!(dendrogram.merges()[0].left, 0);
        assert_eq!(dendrogram.merges()[0].right, 1);
        assert_eq!(dendrogram.merges()[1].left, 0);
        assert_eq!(dendrogram.merges()[1].right, 2);
    }

    #[test]
    fn test_clusters_partition_every_leaf_once() {
        let m = matrix(&[
            &[0.0, 0.9, 0.02, 0.7],
            &[0.9, 0.0, 0.8, 0.12],
            &[0.02, 0.8, 0.0, 0.6],
            &[0.7, 0.12, 0.6, 0.0],
        ]);
        let groups = complete_linkage(&m).clusters(DISTANCE_THRESHOLD);
        assert_eq!(groups, vec![vec![0, 2], vec![1, 3]]);
        let mut seen: Vec<usize> = groups.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3]);
    }
}
