//! Unsupervised phenotype grouping
//!
//! Two interchangeable strategies behind one `fit_predict` contract: hard
//! centroid partitioning with random restarts, and soft Gaussian-mixture
//! partitioning fit by expectation-maximization. The strategy is chosen once
//! at construction from a configuration name and never changed.

mod gmm;
mod kmeans;

use faer::Mat;
use serde::Serialize;

use crate::error::{PhenoError, PhenoResult};

/// Default restart count for the hard strategy
pub const DEFAULT_RESTARTS: usize = 10;
/// Iteration cap for both strategies; hitting it keeps the last state
pub const DEFAULT_MAX_ITER: usize = 300;
/// Convergence tolerance on the mean log-likelihood for the soft strategy
pub const DEFAULT_TOLERANCE: f64 = 1e-3;

/// Closed set of clustering strategies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClusterMethod {
    /// Centroid-based hard partitioning with random restarts
    HardPartition {
        n_clusters: usize,
        n_init: usize,
        max_iter: usize,
    },
    /// Gaussian-mixture soft partitioning fit by expectation-maximization
    SoftPartition {
        n_clusters: usize,
        tolerance: f64,
        max_iter: usize,
    },
}

impl ClusterMethod {
    /// Build a method from its configuration name.
    pub fn from_name(name: &str, n_clusters: usize) -> PhenoResult<Self> {
        match name.to_lowercase().as_str() {
            "kmeans" => Ok(Self::HardPartition {
                n_clusters,
                n_init: DEFAULT_RESTARTS,
                max_iter: DEFAULT_MAX_ITER,
            }),
            "gmm" => Ok(Self::SoftPartition {
                n_clusters,
                tolerance: DEFAULT_TOLERANCE,
                max_iter: DEFAULT_MAX_ITER,
            }),
            other => Err(PhenoError::Configuration(format!(
                "Unsupported method '{}'. Use 'kmeans' or 'gmm'.",
                other
            ))),
        }
    }

    fn n_clusters(&self) -> usize {
        match self {
            ClusterMethod::HardPartition { n_clusters, .. } => *n_clusters,
            ClusterMethod::SoftPartition { n_clusters, .. } => *n_clusters,
        }
    }
}

/// One group label per row; the soft strategy also carries per-row posterior
/// probabilities over the groups.
#[derive(Debug, Clone)]
pub struct GroupAssignment {
    /// Group index per row, in `0..k`
    pub labels: Vec<usize>,
    /// Posterior membership probabilities per row (soft strategy only)
    pub posteriors: Option<Vec<Vec<f64>>>,
}

/// Clustering engine over preprocessed feature rows.
#[derive(Debug, Clone)]
pub struct ClusterEngine {
    method: ClusterMethod,
    seed: u64,
}

impl ClusterEngine {
    /// The seed drives every stochastic step so runs are reproducible.
    pub fn new(method: ClusterMethod, seed: u64) -> Self {
        Self { method, seed }
    }

    /// Partition the rows of `x` into groups.
    pub fn fit_predict(&self, x: &Mat<f64>) -> PhenoResult<GroupAssignment> {
        let k = self.method.n_clusters();
        if k < 2 {
            return Err(PhenoError::Configuration(format!(
                "at least 2 clusters are required, got {}",
                k
            )));
        }
        if x.nrows() <= k {
            return Err(PhenoError::Data(format!(
                "cannot split {} rows into {} groups",
                x.nrows(),
                k
            )));
        }
        match self.method {
            ClusterMethod::HardPartition {
                n_clusters,
                n_init,
                max_iter,
            } => kmeans::fit_predict(x, n_clusters, n_init, max_iter, self.seed),
            ClusterMethod::SoftPartition {
                n_clusters,
                tolerance,
                max_iter,
            } => gmm::fit_predict(x, n_clusters, tolerance, max_iter, self.seed),
        }
    }
}

/// Per-group mean vector in the transformed space, for interpretation.
#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    /// Group index
    pub group: usize,
    /// Number of member rows
    pub size: usize,
    /// Mean feature vector of the members
    pub centroid: Vec<f64>,
}

/// Compute the mean vector and size of every non-empty group.
pub fn group_summaries(x: &Mat<f64>, labels: &[usize]) -> PhenoResult<Vec<GroupSummary>> {
    if labels.len() != x.nrows() {
        return Err(PhenoError::Schema(format!(
            "label count {} does not match row count {}",
            labels.len(),
            x.nrows()
        )));
    }
    let p = x.ncols();
    let n_groups = labels.iter().max().map(|&m| m + 1).unwrap_or(0);
    let mut sums = vec![vec![0.0f64; p]; n_groups];
    let mut sizes = vec![0usize; n_groups];
    for (i, &g) in labels.iter().enumerate() {
        sizes[g] += 1;
        for j in 0..p {
            sums[g][j] += x[(i, j)];
        }
    }
    Ok(sums
        .into_iter()
        .zip(sizes)
        .enumerate()
        .filter(|(_, (_, size))| *size > 0)
        .map(|(group, (sum, size))| GroupSummary {
            group,
            size,
            centroid: sum.into_iter().map(|s| s / size as f64).collect(),
        })
        .collect())
}

/// Copy row `i` of a matrix into a vector.
fn row_vec(x: &Mat<f64>, i: usize) -> Vec<f64> {
    (0..x.ncols()).map(|j| x[(i, j)]).collect()
}

/// Squared Euclidean distance from row `i` of `x` to a point.
fn dist2_to(x: &Mat<f64>, i: usize, point: &[f64]) -> f64 {
    point
        .iter()
        .enumerate()
        .map(|(j, &c)| {
            let d = x[(i, j)] - c;
            d * d
        })
        .sum()
}
