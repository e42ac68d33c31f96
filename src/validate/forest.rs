//! Ensemble-of-decision-trees classifier
//!
//! Bootstrap-sampled CART trees with sqrt-feature subsampling per split.
//! Each tree derives its own seed from the base seed, so parallel training
//! is reproducible regardless of scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

use super::tree::{DecisionTree, TreeParams};
use crate::error::{PhenoError, PhenoResult};

/// Default number of trees in the ensemble
pub const DEFAULT_TREES: usize = 100;

/// Configuration for the random forest.
#[derive(Debug, Clone)]
pub struct ForestConfig {
    /// Number of trees
    pub n_trees: usize,
    /// Depth cap per tree; `None` grows to purity
    pub max_depth: Option<usize>,
    /// Base seed for bootstrap and feature sampling
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            max_depth: None,
            seed: 42,
        }
    }
}

/// Trained ensemble with normalized feature importances.
#[derive(Debug, Clone)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    n_classes: usize,
    importances: Vec<f64>,
}

impl RandomForest {
    /// Train on row-major features with class labels in `0..n_classes`.
    pub fn fit(
        x: &[Vec<f64>],
        y: &[usize],
        n_classes: usize,
        config: &ForestConfig,
    ) -> PhenoResult<Self> {
        if config.n_trees == 0 {
            return Err(PhenoError::Configuration(
                "at least one tree is required".to_string(),
            ));
        }
        if x.is_empty() {
            return Err(PhenoError::Data("no training rows".to_string()));
        }
        if x.len() != y.len() {
            return Err(PhenoError::Schema(format!(
                "feature row count {} does not match label count {}",
                x.len(),
                y.len()
            )));
        }

        let n = x.len();
        let n_features = x[0].len();
        let params = TreeParams {
            n_classes,
            max_depth: config.max_depth,
            n_split_features: ((n_features as f64).sqrt().floor() as usize).max(1),
        };

        let trees: Vec<DecisionTree> = (0..config.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(t as u64));
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                DecisionTree::fit(x, y, &sample, &params, &mut rng)
            })
            .collect();

        // Mean decrease in impurity: normalize per tree, average, renormalize
        let mut importances = vec![0.0f64; n_features];
        for tree in &trees {
            let total: f64 = tree.importances.iter().sum();
            if total > 0.0 {
                for (acc, &v) in importances.iter_mut().zip(&tree.importances) {
                    *acc += v / total;
                }
            }
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for v in &mut importances {
                *v /= total;
            }
        }

        Ok(Self {
            trees,
            n_classes,
            importances,
        })
    }

    /// Majority vote over the trees; ties go to the lowest class index.
    pub fn predict(&self, row: &[f64]) -> usize {
        let mut votes = vec![0usize; self.n_classes];
        for tree in &self.trees {
            votes[tree.predict(row)] += 1;
        }
        let mut best = 0usize;
        let mut best_votes = 0usize;
        for (c, &v) in votes.iter().enumerate() {
            if v > best_votes {
                best_votes = v;
                best = c;
            }
        }
        best
    }

    /// Non-negative importance weights, one per feature, summing to 1.
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }
}
