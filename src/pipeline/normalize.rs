//! Distribution normalization via empirical quantiles
//!
//! Maps each feature's skewed marginal distribution onto a canonical target
//! (standard normal or uniform) through its empirical CDF, so that Euclidean
//! distances are meaningful across features of wildly different scale and
//! skew. The fitted quantile map is monotonic and invertible.

use std::str::FromStr;

use faer::Mat;
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

use crate::error::{PhenoError, PhenoResult};

/// Quantiles are clipped this far away from 0 and 1 before the inverse CDF,
/// so a normal target never produces infinities.
const BOUNDS_EPS: f64 = 1e-7;

/// Canonical target distribution for transformed features.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetDistribution {
    /// Standard normal output (mean 0, standard deviation 1)
    #[default]
    Normal,
    /// Uniform output on [0, 1]
    Uniform,
}

impl std::fmt::Display for TargetDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetDistribution::Normal => write!(f, "normal"),
            TargetDistribution::Uniform => write!(f, "uniform"),
        }
    }
}

impl FromStr for TargetDistribution {
    type Err = PhenoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(TargetDistribution::Normal),
            "uniform" => Ok(TargetDistribution::Uniform),
            other => Err(PhenoError::Configuration(format!(
                "Unknown target distribution: '{}'. Use 'normal' or 'uniform'.",
                other
            ))),
        }
    }
}

/// Sorted reference values per feature, captured at fit time.
#[derive(Debug, Clone)]
struct FittedNormalizer {
    references: Vec<Vec<f64>>,
}

/// Per-feature empirical-quantile normalizer.
#[derive(Debug, Clone, Default)]
pub struct QuantileNormalizer {
    target: TargetDistribution,
    fitted: Option<FittedNormalizer>,
}

impl QuantileNormalizer {
    pub fn new(target: TargetDistribution) -> Self {
        Self {
            target,
            fitted: None,
        }
    }

    /// Fit the per-feature quantile maps on `x` and transform it.
    pub fn fit_transform(&mut self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        if x.nrows() == 0 {
            return Err(PhenoError::Data(
                "cannot fit a normalizer on an empty matrix".to_string(),
            ));
        }
        // Per-feature fits are independent
        let references: Vec<Vec<f64>> = (0..x.ncols())
            .into_par_iter()
            .map(|j| {
                let mut values: Vec<f64> =
                    (0..x.nrows()).map(|i| x[(i, j)]).filter(|v| !v.is_nan()).collect();
                values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
                values
            })
            .collect();
        self.fitted = Some(FittedNormalizer { references });
        self.transform(x)
    }

    /// Map `x` through the fitted quantile maps to the target distribution.
    pub fn transform(&self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PhenoError::NotFitted {
            component: "QuantileNormalizer",
            operation: "transform",
        })?;
        if x.ncols() != fitted.references.len() {
            return Err(PhenoError::Schema(format!(
                "expected {} columns, got {}",
                fitted.references.len(),
                x.ncols()
            )));
        }

        let target = self.target;
        let columns: Vec<Vec<f64>> = (0..x.ncols())
            .into_par_iter()
            .map(|j| {
                let reference = &fitted.references[j];
                (0..x.nrows())
                    .map(|i| {
                        let v = x[(i, j)];
                        if v.is_nan() || reference.is_empty() {
                            return f64::NAN;
                        }
                        let q = empirical_quantile(reference, v)
                            .clamp(BOUNDS_EPS, 1.0 - BOUNDS_EPS);
                        to_target(q, target)
                    })
                    .collect()
            })
            .collect();

        Ok(columns_to_mat(&columns, x.nrows()))
    }

    /// Map canonical values back to the original feature scale.
    pub fn inverse_transform(&self, x: &Mat<f64>) -> PhenoResult<Mat<f64>> {
        let fitted = self.fitted.as_ref().ok_or(PhenoError::NotFitted {
            component: "QuantileNormalizer",
            operation: "inverse_transform",
        })?;
        if x.ncols() != fitted.references.len() {
            return Err(PhenoError::Schema(format!(
                "expected {} columns, got {}",
                fitted.references.len(),
                x.ncols()
            )));
        }

        let target = self.target;
        let columns: Vec<Vec<f64>> = (0..x.ncols())
            .into_par_iter()
            .map(|j| {
                let reference = &fitted.references[j];
                (0..x.nrows())
                    .map(|i| {
                        let v = x[(i, j)];
                        if v.is_nan() || reference.is_empty() {
                            return f64::NAN;
                        }
                        inverse_quantile(reference, from_target(v, target))
                    })
                    .collect()
            })
            .collect();

        Ok(columns_to_mat(&columns, x.nrows()))
    }

    /// Whether `fit_transform` has completed.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }
}

fn columns_to_mat(columns: &[Vec<f64>], n_rows: usize) -> Mat<f64> {
    let mut out = Mat::<f64>::zeros(n_rows, columns.len());
    for (j, col) in columns.iter().enumerate() {
        for (i, &v) in col.iter().enumerate() {
            out[(i, j)] = v;
        }
    }
    out
}

fn to_target(q: f64, target: TargetDistribution) -> f64 {
    match target {
        TargetDistribution::Uniform => q,
        TargetDistribution::Normal => Normal::standard().inverse_cdf(q),
    }
}

fn from_target(v: f64, target: TargetDistribution) -> f64 {
    match target {
        TargetDistribution::Uniform => v.clamp(0.0, 1.0),
        TargetDistribution::Normal => Normal::standard().cdf(v),
    }
}

/// Empirical quantile of `x` in a sorted reference column.
///
/// Duplicate observed values take their average rank; values between two
/// order statistics interpolate linearly; values outside the observed range
/// clamp to the nearest extreme quantile.
fn empirical_quantile(reference: &[f64], x: f64) -> f64 {
    let n = reference.len();
    if n == 1 {
        return 0.5;
    }
    let lo = reference.partition_point(|&v| v < x);
    let hi = reference.partition_point(|&v| v <= x);
    if hi == 0 {
        return 0.0;
    }
    if lo == n {
        return 1.0;
    }
    if lo < hi {
        // Observed value: midpoint of its first and last rank
        return (lo + hi - 1) as f64 / 2.0 / (n - 1) as f64;
    }
    // Strictly between two observed values
    let left = reference[lo - 1];
    let right = reference[lo];
    let q_left = rank_quantile(reference, left);
    let q_right = rank_quantile(reference, right);
    q_left + (q_right - q_left) * (x - left) / (right - left)
}

/// Average-rank quantile of a value known to be present in the reference.
fn rank_quantile(reference: &[f64], value: f64) -> f64 {
    let n = reference.len();
    let lo = reference.partition_point(|&v| v < value);
    let hi = reference.partition_point(|&v| v <= value);
    (lo + hi - 1) as f64 / 2.0 / (n - 1) as f64
}

/// Value at quantile `q` of the sorted reference, by linear interpolation
/// between order statistics.
fn inverse_quantile(reference: &[f64], q: f64) -> f64 {
    let n = reference.len();
    if n == 1 {
        return reference[0];
    }
    let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    reference[lo] + (reference[hi] - reference[lo]) * frac
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quantile_of_observed_values() {
        let reference = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert!((empirical_quantile(&reference, 1.0) - 0.0).abs() < 1e-12);
        assert!((empirical_quantile(&reference, 3.0) - 0.5).abs() < 1e-12);
        assert!((empirical_quantile(&reference, 5.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicates_take_average_rank() {
        let reference = [1.0, 2.0, 2.0, 3.0];
        // 2.0 occupies ranks 1 and 2; average rank 1.5 of 3
        assert!((empirical_quantile(&reference, 2.0) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_interpolation_between_order_statistics() {
        let reference = [0.0, 10.0];
        assert!((empirical_quantile(&reference, 5.0) - 0.5).abs() < 1e-12);
        assert!((empirical_quantile(&reference, 2.5) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let reference = [1.0, 2.0, 3.0];
        assert_eq!(empirical_quantile(&reference, -10.0), 0.0);
        assert_eq!(empirical_quantile(&reference, 10.0), 1.0);
    }

    #[test]
    fn test_target_name_parsing() {
        assert_eq!(
            "NORMAL".parse::<TargetDistribution>().unwrap(),
            TargetDistribution::Normal
        );
        assert!("cauchy".parse::<TargetDistribution>().is_err());
    }
}
