//! One-way analysis of variance across phenotype groups
//!
//! Tests, per feature, whether the group means differ more than expected by
//! chance. Features the data cannot support are skipped rather than failing
//! the whole batch.

use std::collections::BTreeMap;

use anyhow::Result;
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};

use crate::error::PhenoError;
use crate::frame::column_to_string_vec;

/// F-statistic and p-value for one feature.
#[derive(Debug, Clone, Serialize)]
pub struct AnovaResult {
    pub feature: String,
    pub f_statistic: f64,
    pub p_value: f64,
}

/// Run a one-way ANOVA for each feature across the groups in `group_col`.
///
/// Features absent from the frame, constant everywhere, or observed in fewer
/// than two non-empty groups are skipped. Results sort ascending by p-value.
pub fn anova_by_group(
    df: &DataFrame,
    group_col: &str,
    features: &[&str],
) -> Result<Vec<AnovaResult>> {
    let label_col = df
        .column(group_col)
        .map_err(|_| PhenoError::Schema(format!("Group column '{}' not found", group_col)))?;
    let groups = column_to_string_vec(label_col)?;

    // Features are independent tests
    let mut results: Vec<AnovaResult> = features
        .par_iter()
        .filter_map(|&feature| {
            let col = df.column(feature).ok()?;
            let values = col.cast(&DataType::Float64).ok()?;
            let values = values.f64().ok()?;

            let mut buckets: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
            for (v, g) in values.into_iter().zip(groups.iter()) {
                if let (Some(v), Some(g)) = (v, g) {
                    if !v.is_nan() {
                        buckets.entry(g.as_str()).or_default().push(v);
                    }
                }
            }
            let observed: Vec<Vec<f64>> =
                buckets.into_values().filter(|b| !b.is_empty()).collect();
            if observed.len() < 2 {
                return None;
            }
            let (f_statistic, p_value) = one_way_f(&observed)?;
            Some(AnovaResult {
                feature: feature.to_string(),
                f_statistic,
                p_value,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        a.p_value
            .partial_cmp(&b.p_value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(results)
}

/// One-way F-statistic and p-value over non-empty groups.
///
/// Zero within-group variance with distinct group means yields an infinite
/// statistic and a zero p-value; a fully constant feature yields `None`.
fn one_way_f(groups: &[Vec<f64>]) -> Option<(f64, f64)> {
    let k = groups.len();
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if n <= k {
        return None;
    }

    let grand_mean: f64 = groups.iter().flatten().sum::<f64>() / n as f64;
    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for group in groups {
        let mean: f64 = group.iter().sum::<f64>() / group.len() as f64;
        let dev = mean - grand_mean;
        ss_between += group.len() as f64 * dev * dev;
        ss_within += group.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>();
    }

    let df1 = (k - 1) as f64;
    let df2 = (n - k) as f64;
    let ms_between = ss_between / df1;
    let ms_within = ss_within / df2;

    if ms_within <= f64::EPSILON {
        if ms_between <= f64::EPSILON {
            return None;
        }
        return Some((f64::INFINITY, 0.0));
    }

    let f = ms_between / ms_within;
    let dist = FisherSnedecor::new(df1, df2).ok()?;
    Some((f, 1.0 - dist.cdf(f)))
}
