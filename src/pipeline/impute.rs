//! K-nearest-neighbour imputation for sparse lab panels
//!
//! Missing cells are estimated from the most similar patients. Similarity is
//! measured only over the columns both patients actually share, scaled so
//! rows with different missingness patterns remain comparable.

use std::cmp::Ordering;

use faer::Mat;
use rayon::prelude::*;

use crate::error::{PhenoError, PhenoResult};

/// Default neighbour count
pub const DEFAULT_NEIGHBOURS: usize = 5;

/// Reference data captured at fit time; never mutated afterwards.
#[derive(Debug, Clone)]
struct FittedImputer {
    reference: Mat<f64>,
    column_means: Vec<f64>,
}

/// Neighbour-based imputer with a fit-once / transform-many lifecycle.
#[derive(Debug, Clone)]
pub struct KnnImputer {
    k: usize,
    fitted: Option<FittedImputer>,
}

impl Default for KnnImputer {
    fn default() -> Self {
        Self::new(DEFAULT_NEIGHBOURS)
    }
}

impl KnnImputer {
    /// Create an imputer using the `k` most similar rows per missing cell.
    pub fn new(k: usize) -> Self {
        Self { k, fitted: None }
    }

    /// Fit on `x` and return a fully dense copy of it.
    pub fn fit_transform(&mut self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        if self.k == 0 {
            return Err(PhenoError::Configuration(
                "neighbour count k must be at least 1".to_string(),
            ));
        }
        if self.k >= x.nrows() {
            return Err(PhenoError::Configuration(format!(
                "neighbour count k={} must be less than the number of rows ({})",
                self.k,
                x.nrows()
            )));
        }
        self.fitted = Some(FittedImputer {
            reference: x.clone(),
            column_means: column_means(x),
        });
        self.transform(x)
    }

    /// Impute `x` against the fitted reference rows.
    pub fn transform(&self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PhenoError::NotFitted {
            component: "KnnImputer",
            operation: "transform",
        })?;
        if x.ncols() != fitted.reference.ncols() {
            return Err(PhenoError::Schema(format!(
                "expected {} columns, got {}",
                fitted.reference.ncols(),
                x.ncols()
            )));
        }

        // Rows are independent, so impute them in parallel
        let rows: Vec<Vec<f64>> = (0..x.nrows())
            .into_par_iter()
            .map(|i| impute_row(x, i, fitted, self.k))
            .collect();

        let mut out = Mat::<f64>::zeros(x.nrows(), x.ncols());
        for (i, row) in rows.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                out[(i, j)] = v;
            }
        }
        Ok(out)
    }

    /// Whether `fit_transform` has completed.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn impute_row(x: &Mat<f64>, i: usize, fitted: &FittedImputer, k: usize) -> Vec<f64> {
    let n_cols = x.ncols();
    let mut row: Vec<f64> = (0..n_cols).map(|j| x[(i, j)]).collect();
    if row.iter().all(|v| !v.is_nan()) {
        return row;
    }

    // Distance to every reference row over the shared columns; rows sharing
    // nothing with the target are not usable as neighbours
    let mut neighbours: Vec<(f64, usize)> = Vec::new();
    for r in 0..fitted.reference.nrows() {
        if let Some(d) = partial_distance(&row, &fitted.reference, r) {
            neighbours.push((d, r));
        }
    }
    // Equal distances break on row index for determinism
    neighbours.sort_by(|a, b| {
        a.0.partial_cmp(&b.0)
            .unwrap_or(Ordering::Equal)
            .then(a.1.cmp(&b.1))
    });

    for (j, cell) in row.iter_mut().enumerate() {
        if !cell.is_nan() {
            continue;
        }
        // The k nearest neighbours that actually observed this column
        let mut sum = 0.0;
        let mut count = 0usize;
        for &(_, r) in &neighbours {
            let v = fitted.reference[(r, j)];
            if v.is_nan() {
                continue;
            }
            sum += v;
            count += 1;
            if count == k {
                break;
            }
        }
        // No usable neighbour observed the column: fall back to its global mean
        *cell = if count > 0 {
            sum / count as f64
        } else {
            fitted.column_means[j]
        };
    }
    row
}

/// Euclidean distance over the columns present in both rows, scaled by
/// `sqrt(n_total / n_shared)` to stay comparable across missingness patterns.
fn partial_distance(row: &[f64], reference: &Mat<f64>, r: usize) -> Option<f64> {
    let n_cols = row.len();
    let mut sum_sq = 0.0;
    let mut shared = 0usize;
    for (j, &a) in row.iter().enumerate() {
        let b = reference[(r, j)];
        if a.is_nan() || b.is_nan() {
            continue;
        }
        let d = a - b;
        sum_sq += d * d;
        shared += 1;
    }
    if shared == 0 {
        return None;
    }
    Some((sum_sq * n_cols as f64 / shared as f64).sqrt())
}

/// Per-column mean over observed values; all-missing columns stay NaN.
fn column_means(x: &Mat<f64>) -> Vec<f64> {
    (0..x.ncols())
        .map(|j| {
            let mut sum = 0.0;
            let mut n = 0usize;
            for i in 0..x.nrows() {
                let v = x[(i, j)];
                if !v.is_nan() {
                    sum += v;
                    n += 1;
                }
            }
            if n > 0 {
                sum / n as f64
            } else {
                f64::NAN
            }
        })
        .collect()
}
