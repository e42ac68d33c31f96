//! Principal-axis projection
//!
//! Variance-preserving linear reduction: the fit finds the directions of
//! maximal variance in the transformed matrix and retains the minimal number
//! of axes whose cumulative explained-variance fraction meets the configured
//! threshold. The basis is fixed at fit time and replayed on new rows.

use std::cmp::Ordering;

use faer::{prelude::*, Mat, Side};

use crate::error::{PhenoError, PhenoResult};

/// Projection basis captured at fit time.
#[derive(Debug, Clone)]
struct FittedPca {
    mean: Vec<f64>,
    /// n_features x n_retained; columns are orthonormal principal axes
    components: Mat<f64>,
    /// Explained-variance fraction of each retained axis, descending
    explained_variance_ratio: Vec<f64>,
}

/// PCA reducer keeping a requested cumulative-variance fraction.
#[derive(Debug, Clone)]
pub struct PcaReducer {
    variance_threshold: f64,
    fitted: Option<FittedPca>,
}

impl PcaReducer {
    /// Create a reducer retaining `variance_threshold` of the total variance.
    pub fn new(variance_threshold: f64) -> PhenoResult<Self> {
        if !(variance_threshold > 0.0 && variance_threshold <= 1.0) {
            return Err(PhenoError::Configuration(format!(
                "variance threshold must be in (0, 1], got {}",
                variance_threshold
            )));
        }
        Ok(Self {
            variance_threshold,
            fitted: None,
        })
    }

    /// Fit the principal axes on `x` and project it.
    pub fn fit_transform(&mut self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        let n = x.nrows();
        let p = x.ncols();
        if n < 2 {
            return Err(PhenoError::Data(
                "at least two rows are required to fit a projection".to_string(),
            ));
        }

        let mean: Vec<f64> = (0..p)
            .map(|j| (0..n).map(|i| x[(i, j)]).sum::<f64>() / n as f64)
            .collect();
        let centered = Mat::from_fn(n, p, |i, j| x[(i, j)] - mean[j]);
        let gram = centered.transpose() * &centered;
        let cov = Mat::from_fn(p, p, |i, j| gram[(i, j)] / (n - 1) as f64);

        let evd = cov.selfadjoint_eigendecomposition(Side::Lower);
        let u: Mat<f64> = evd.u().to_owned();
        // Eigenvalues as Rayleigh quotients of the (orthonormal) eigenvectors
        let cu = &cov * &u;
        let mut axes: Vec<(f64, usize)> = (0..p)
            .map(|j| {
                let lambda: f64 = (0..p).map(|i| u[(i, j)] * cu[(i, j)]).sum();
                (lambda.max(0.0), j)
            })
            .collect();
        // Descending variance; equal variances keep the lower column index first
        axes.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(Ordering::Equal)
                .then(a.1.cmp(&b.1))
        });

        let total: f64 = axes.iter().map(|(l, _)| l).sum();
        if total <= 0.0 {
            return Err(PhenoError::Data(
                "matrix has zero total variance".to_string(),
            ));
        }

        // Minimal prefix of axes meeting the threshold
        let mut retained = 0usize;
        let mut cumulative = 0.0;
        for (lambda, _) in &axes {
            retained += 1;
            cumulative += lambda / total;
            if cumulative >= self.variance_threshold - 1e-12 {
                break;
            }
        }

        let mut components = Mat::<f64>::zeros(p, retained);
        for (out_j, (_, src_j)) in axes.iter().take(retained).enumerate() {
            // Fix the sign so each axis's largest-magnitude loading is positive
            let mut max_abs = 0.0;
            let mut sign = 1.0;
            for i in 0..p {
                let v = u[(i, *src_j)];
                if v.abs() > max_abs {
                    max_abs = v.abs();
                    sign = if v < 0.0 { -1.0 } else { 1.0 };
                }
            }
            for i in 0..p {
                components[(i, out_j)] = sign * u[(i, *src_j)];
            }
        }

        let explained_variance_ratio: Vec<f64> = axes
            .iter()
            .take(retained)
            .map(|(lambda, _)| lambda / total)
            .collect();

        self.fitted = Some(FittedPca {
            mean,
            components,
            explained_variance_ratio,
        });
        self.transform(x)
    }

    /// Project `x` through the fixed basis.
    pub fn transform(&self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PhenoError::NotFitted {
            component: "PcaReducer",
            operation: "transform",
        })?;
        if x.ncols() != fitted.mean.len() {
            return Err(PhenoError::Schema(format!(
                "expected {} columns, got {}",
                fitted.mean.len(),
                x.ncols()
            )));
        }
        let centered = Mat::from_fn(x.nrows(), x.ncols(), |i, j| x[(i, j)] - fitted.mean[j]);
        Ok(&centered * &fitted.components)
    }

    /// Number of retained axes, once fit.
    pub fn n_components(&self) -> Option<usize> {
        self.fitted.as_ref().map(|f| f.components.ncols())
    }

    /// Explained-variance fraction per retained axis, once fit.
    pub fn explained_variance_ratio(&self) -> Option<&[f64]> {
        self.fitted
            .as_ref()
            .map(|f| f.explained_variance_ratio.as_slice())
    }

    /// Whether `fit_transform` has completed.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}
