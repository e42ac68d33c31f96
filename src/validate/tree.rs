//! CART decision tree for the validation forest
//!
//! Greedy Gini-impurity splitting over a random feature subset per node,
//! recorded with per-feature impurity-decrease totals for importances.

use rand::rngs::StdRng;
use rand::seq::index;

/// Minimum rows required to attempt a split
pub(super) const MIN_SAMPLES_SPLIT: usize = 2;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        class: usize,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub(super) struct DecisionTree {
    nodes: Vec<Node>,
    /// Impurity decrease accumulated per feature while growing
    pub(super) importances: Vec<f64>,
}

pub(super) struct TreeParams {
    pub n_classes: usize,
    pub max_depth: Option<usize>,
    /// Features examined per split (sqrt of the feature count)
    pub n_split_features: usize,
}

impl DecisionTree {
    /// Grow a tree on the rows named by `sample` (a bootstrap draw).
    pub(super) fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        sample: &[usize],
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> Self {
        let n_features = x.first().map(|r| r.len()).unwrap_or(0);
        let mut tree = Self {
            nodes: Vec::new(),
            importances: vec![0.0; n_features],
        };
        tree.grow(x, y, sample.to_vec(), params, sample.len(), 0, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[Vec<f64>],
        y: &[usize],
        rows: Vec<usize>,
        params: &TreeParams,
        n_total: usize,
        depth: usize,
        rng: &mut StdRng,
    ) -> usize {
        let counts = class_counts(y, &rows, params.n_classes);
        let node_gini = gini_impurity(&counts, rows.len());

        let depth_capped = params.max_depth.is_some_and(|d| depth >= d);
        if rows.len() < MIN_SAMPLES_SPLIT || node_gini == 0.0 || depth_capped {
            return self.push_leaf(&counts);
        }

        let n_features = self.importances.len();
        let candidates = index::sample(rng, n_features, params.n_split_features.min(n_features));

        let mut best: Option<(f64, usize, f64)> = None; // (gain, feature, threshold)
        for feature in candidates.iter() {
            if let Some((threshold, gain)) =
                best_split_for_feature(x, y, &rows, feature, params.n_classes, node_gini)
            {
                let better = match best {
                    Some((best_gain, _, _)) => gain > best_gain,
                    None => gain > 0.0,
                };
                if better {
                    best = Some((gain, feature, threshold));
                }
            }
        }

        let Some((gain, feature, threshold)) = best else {
            return self.push_leaf(&counts);
        };

        // Importance: impurity decrease weighted by the node's sample share
        self.importances[feature] += gain * rows.len() as f64 / n_total as f64;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&i| x[i][feature] <= threshold);

        let node_idx = self.nodes.len();
        self.nodes.push(Node::Split {
            feature,
            threshold,
            left: 0,
            right: 0,
        });
        let left = self.grow(x, y, left_rows, params, n_total, depth + 1, rng);
        let right = self.grow(x, y, right_rows, params, n_total, depth + 1, rng);
        if let Node::Split {
            left: l, right: r, ..
        } = &mut self.nodes[node_idx]
        {
            *l = left;
            *r = right;
        }
        node_idx
    }

    fn push_leaf(&mut self, counts: &[usize]) -> usize {
        // Majority class; ties go to the lowest class index
        let mut best = 0usize;
        let mut best_count = 0usize;
        for (c, &count) in counts.iter().enumerate() {
            if count > best_count {
                best_count = count;
                best = c;
            }
        }
        self.nodes.push(Node::Leaf { class: best });
        self.nodes.len() - 1
    }

    pub(super) fn predict(&self, row: &[f64]) -> usize {
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { class } => return *class,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Gini impurity of a class-count vector: 1 - sum(p^2).
fn gini_impurity(counts: &[usize], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / t;
            p * p
        })
        .sum::<f64>()
}

fn class_counts(y: &[usize], rows: &[usize], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &i in rows {
        counts[y[i]] += 1;
    }
    counts
}

/// Best threshold on one feature by Gini reduction.
///
/// Rows are sorted by the feature value; every midpoint between distinct
/// consecutive values is a candidate split. The first threshold reaching the
/// best gain wins, keeping the search deterministic.
fn best_split_for_feature(
    x: &[Vec<f64>],
    y: &[usize],
    rows: &[usize],
    feature: usize,
    n_classes: usize,
    parent_gini: f64,
) -> Option<(f64, f64)> {
    let n = rows.len();
    if n < 2 {
        return None;
    }

    let mut pairs: Vec<(f64, usize)> = rows.iter().map(|&i| (x[i][feature], y[i])).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut left_counts = vec![0usize; n_classes];
    let mut right_counts = class_counts_of(&pairs, n_classes);

    let mut best_gain = 0.0;
    let mut best_threshold = None;
    for i in 0..n - 1 {
        let (value, class) = pairs[i];
        left_counts[class] += 1;
        right_counts[class] -= 1;

        // No valid split point between equal values
        if value == pairs[i + 1].0 {
            continue;
        }

        let left_n = i + 1;
        let right_n = n - left_n;
        let weighted = (left_n as f64 * gini_impurity(&left_counts, left_n)
            + right_n as f64 * gini_impurity(&right_counts, right_n))
            / n as f64;
        let gain = parent_gini - weighted;
        if gain > best_gain {
            best_gain = gain;
            best_threshold = Some((value + pairs[i + 1].0) / 2.0);
        }
    }

    best_threshold.map(|t| (t, best_gain))
}

fn class_counts_of(pairs: &[(f64, usize)], n_classes: usize) -> Vec<usize> {
    let mut counts = vec![0usize; n_classes];
    for &(_, class) in pairs {
        counts[class] += 1;
    }
    counts
}
