//! Gaussian-mixture soft partitioning via expectation-maximization
//!
//! Full-covariance components; responsibilities are computed in log space
//! with log-sum-exp, and covariance eigenvalues are floored so degenerate
//! components stay well defined. Hitting the iteration cap keeps the last
//! computed state rather than failing.

use faer::{prelude::*, Mat, Side};
use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;

use super::{row_vec, GroupAssignment};
use crate::error::PhenoResult;

/// Floor applied to covariance eigenvalues and diagonals
const COVARIANCE_FLOOR: f64 = 1e-6;

const LN_2PI: f64 = 1.8378770664093453;

pub(super) fn fit_predict(
    x: &Mat<f64>,
    k: usize,
    tolerance: f64,
    max_iter: usize,
    seed: u64,
) -> PhenoResult<GroupAssignment> {
    let n = x.nrows();
    let p = x.ncols();
    let mut rng = StdRng::seed_from_u64(seed);

    // Means from k distinct rows, a shared diagonal covariance from the
    // global column variances, uniform weights
    let mut means: Vec<Vec<f64>> = index::sample(&mut rng, n, k)
        .iter()
        .map(|i| row_vec(x, i))
        .collect();
    let global_var = column_variances(x);
    let mut covariances: Vec<Mat<f64>> = (0..k)
        .map(|_| {
            Mat::from_fn(p, p, |a, b| {
                if a == b {
                    global_var[a].max(COVARIANCE_FLOOR)
                } else {
                    0.0
                }
            })
        })
        .collect();
    let mut weights = vec![1.0 / k as f64; k];

    let mut prev_ll = f64::NEG_INFINITY;
    for _ in 0..max_iter {
        let (responsibilities, ll) = expectation(x, &means, &covariances, &weights);

        // M step
        for c in 0..k {
            let nk: f64 = (0..n).map(|i| responsibilities[(i, c)]).sum::<f64>().max(1e-12);
            weights[c] = nk / n as f64;
            for (j, mean_j) in means[c].iter_mut().enumerate() {
                *mean_j = (0..n)
                    .map(|i| responsibilities[(i, c)] * x[(i, j)])
                    .sum::<f64>()
                    / nk;
            }
            let mut cov = Mat::<f64>::zeros(p, p);
            for i in 0..n {
                let r = responsibilities[(i, c)];
                if r == 0.0 {
                    continue;
                }
                for a in 0..p {
                    let da = x[(i, a)] - means[c][a];
                    for b in a..p {
                        cov[(a, b)] += r * da * (x[(i, b)] - means[c][b]);
                    }
                }
            }
            for a in 0..p {
                for b in a..p {
                    let v = cov[(a, b)] / nk;
                    cov[(a, b)] = v;
                    cov[(b, a)] = v;
                }
                cov[(a, a)] += COVARIANCE_FLOOR;
            }
            covariances[c] = cov;
        }

        if (ll - prev_ll).abs() < tolerance {
            prev_ll = ll;
            break;
        }
        prev_ll = ll;
    }

    // Final posteriors under the final parameters; hard labels by highest
    // posterior, equal posteriors to the lowest component index
    let (responsibilities, _) = expectation(x, &means, &covariances, &weights);
    let mut labels = Vec::with_capacity(n);
    let mut posteriors = Vec::with_capacity(n);
    for i in 0..n {
        let row: Vec<f64> = (0..k).map(|c| responsibilities[(i, c)]).collect();
        let mut best = 0usize;
        let mut best_p = -1.0;
        for (c, &pr) in row.iter().enumerate() {
            if pr > best_p {
                best_p = pr;
                best = c;
            }
        }
        labels.push(best);
        posteriors.push(row);
    }

    Ok(GroupAssignment {
        labels,
        posteriors: Some(posteriors),
    })
}

/// E step: posterior responsibilities and the mean log-likelihood.
fn expectation(
    x: &Mat<f64>,
    means: &[Vec<f64>],
    covariances: &[Mat<f64>],
    weights: &[f64],
) -> (Mat<f64>, f64) {
    let n = x.nrows();
    let k = means.len();
    let precisions: Vec<Precision> = covariances.iter().map(precision_of).collect();

    let mut responsibilities = Mat::<f64>::zeros(n, k);
    let mut ll_sum = 0.0;
    for i in 0..n {
        let log_prob: Vec<f64> = (0..k)
            .map(|c| weights[c].ln() + log_density(x, i, &means[c], &precisions[c]))
            .collect();
        let max = log_prob.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lse = max + log_prob.iter().map(|lp| (lp - max).exp()).sum::<f64>().ln();
        ll_sum += lse;
        for c in 0..k {
            responsibilities[(i, c)] = (log_prob[c] - lse).exp();
        }
    }
    (responsibilities, ll_sum / n as f64)
}

struct Precision {
    inverse: Mat<f64>,
    log_det: f64,
}

/// Inverse and log-determinant of a covariance matrix through its
/// eigendecomposition, flooring eigenvalues against degeneracy.
fn precision_of(covariance: &Mat<f64>) -> Precision {
    let p = covariance.nrows();
    let evd = covariance.selfadjoint_eigendecomposition(Side::Lower);
    let u: Mat<f64> = evd.u().to_owned();
    let cu = covariance * &u;
    let lambda: Vec<f64> = (0..p)
        .map(|j| {
            (0..p)
                .map(|i| u[(i, j)] * cu[(i, j)])
                .sum::<f64>()
                .max(COVARIANCE_FLOOR)
        })
        .collect();
    let log_det = lambda.iter().map(|l| l.ln()).sum();
    let inverse = Mat::from_fn(p, p, |a, b| {
        (0..p).map(|j| u[(a, j)] * u[(b, j)] / lambda[j]).sum()
    });
    Precision { inverse, log_det }
}

fn log_density(x: &Mat<f64>, i: usize, mean: &[f64], precision: &Precision) -> f64 {
    let p = mean.len();
    let d: Vec<f64> = (0..p).map(|j| x[(i, j)] - mean[j]).collect();
    let mut quad = 0.0;
    for a in 0..p {
        for b in 0..p {
            quad += d[a] * precision.inverse[(a, b)] * d[b];
        }
    }
    -0.5 * (p as f64 * LN_2PI + precision.log_det + quad)
}

/// Per-column population variance.
fn column_variances(x: &Mat<f64>) -> Vec<f64> {
    let n = x.nrows();
    (0..x.ncols())
        .map(|j| {
            let mean = (0..n).map(|i| x[(i, j)]).sum::<f64>() / n as f64;
            (0..n)
                .map(|i| {
                    let d = x[(i, j)] - mean;
                    d * d
                })
                .sum::<f64>()
                / n as f64
        })
        .collect()
}
