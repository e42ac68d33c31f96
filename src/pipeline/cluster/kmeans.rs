//! Centroid-based hard partitioning
//!
//! Lloyd iterations from several seeded random initializations; the restart
//! with the lowest total within-cluster squared distance wins.

use std::cmp::Ordering;

use faer::Mat;
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use rayon::prelude::*;

use super::{dist2_to, row_vec, GroupAssignment};
use crate::error::{PhenoError, PhenoResult};

struct RunResult {
    labels: Vec<usize>,
    inertia: f64,
}

pub(super) fn fit_predict(
    x: &Mat<f64>,
    k: usize,
    n_init: usize,
    max_iter: usize,
    seed: u64,
) -> PhenoResult<GroupAssignment> {
    if n_init == 0 {
        return Err(PhenoError::Configuration(
            "at least one restart is required".to_string(),
        ));
    }

    // Restarts are independent; the winner is decided by (inertia, restart
    // index) so the parallel schedule cannot change the outcome
    let best = (0..n_init)
        .into_par_iter()
        .map(|restart| {
            (
                single_run(x, k, max_iter, seed.wrapping_add(restart as u64)),
                restart,
            )
        })
        .min_by(|(a, ra), (b, rb)| {
            a.inertia
                .partial_cmp(&b.inertia)
                .unwrap_or(Ordering::Equal)
                .then(ra.cmp(rb))
        })
        .map(|(run, _)| run)
        .ok_or_else(|| PhenoError::Configuration("at least one restart is required".to_string()))?;

    Ok(GroupAssignment {
        labels: best.labels,
        posteriors: None,
    })
}

fn single_run(x: &Mat<f64>, k: usize, max_iter: usize, seed: u64) -> RunResult {
    let n = x.nrows();
    let p = x.ncols();
    let mut rng = StdRng::seed_from_u64(seed);

    // Start from k distinct rows
    let mut centroids: Vec<Vec<f64>> = index::sample(&mut rng, n, k)
        .iter()
        .map(|i| row_vec(x, i))
        .collect();
    let mut labels: Vec<usize> = (0..n).map(|i| nearest_centroid(x, i, &centroids)).collect();

    for _ in 0..max_iter {
        // Recompute each centroid as the mean of its assigned rows
        let mut sums = vec![vec![0.0f64; p]; k];
        let mut counts = vec![0usize; k];
        for (i, &c) in labels.iter().enumerate() {
            counts[c] += 1;
            for j in 0..p {
                sums[c][j] += x[(i, j)];
            }
        }
        for c in 0..k {
            if counts[c] == 0 {
                // Re-seed an emptied cluster from the row farthest from its
                // current centroid
                centroids[c] = row_vec(x, farthest_row(x, &labels, &centroids));
            } else {
                for j in 0..p {
                    centroids[c][j] = sums[c][j] / counts[c] as f64;
                }
            }
        }

        let new_labels: Vec<usize> = (0..n).map(|i| nearest_centroid(x, i, &centroids)).collect();
        let converged = new_labels == labels;
        labels = new_labels;
        if converged {
            break;
        }
    }

    let inertia = labels
        .iter()
        .enumerate()
        .map(|(i, &c)| dist2_to(x, i, &centroids[c]))
        .sum();
    RunResult { labels, inertia }
}

/// Nearest centroid index; equal distances go to the lowest index.
fn nearest_centroid(x: &Mat<f64>, i: usize, centroids: &[Vec<f64>]) -> usize {
    let mut best = 0usize;
    let mut best_d = f64::INFINITY;
    for (c, centroid) in centroids.iter().enumerate() {
        let d = dist2_to(x, i, centroid);
        if d < best_d {
            best_d = d;
            best = c;
        }
    }
    best
}

/// Row with the largest distance to its assigned centroid; the lowest row
/// index wins ties.
fn farthest_row(x: &Mat<f64>, labels: &[usize], centroids: &[Vec<f64>]) -> usize {
    let mut best = 0usize;
    let mut best_d = -1.0;
    for (i, &c) in labels.iter().enumerate() {
        let d = dist2_to(x, i, &centroids[c]);
        if d > best_d {
            best_d = d;
            best = i;
        }
    }
    best
}
