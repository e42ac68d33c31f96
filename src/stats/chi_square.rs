//! Chi-square test of independence between groups and a categorical outcome

use std::collections::BTreeSet;

use anyhow::Result;
use polars::prelude::DataFrame;
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::error::PhenoError;
use crate::frame::column_to_string_vec;

/// Independence-test output for a group-versus-outcome contingency table.
#[derive(Debug, Clone, Serialize)]
pub struct ChiSquareResult {
    pub statistic: f64,
    pub p_value: f64,
    /// Degrees of freedom: (rows - 1) * (cols - 1)
    pub dof: usize,
    /// Group labels, one per contingency row
    pub row_labels: Vec<String>,
    /// Outcome levels, one per contingency column
    pub col_labels: Vec<String>,
    /// Observed counts, row-major
    pub observed: Vec<Vec<u64>>,
    /// Expected frequencies under independence, row-major
    pub expected: Vec<Vec<f64>>,
}

/// Test independence between `group_col` and a categorical `target_col`.
///
/// Rows with a null in either column are dropped. A Yates continuity
/// correction is applied on 2x2 tables.
pub fn chi_square(df: &DataFrame, group_col: &str, target_col: &str) -> Result<ChiSquareResult> {
    let groups = column_to_string_vec(
        df.column(group_col)
            .map_err(|_| PhenoError::Schema(format!("Group column '{}' not found", group_col)))?,
    )?;
    let targets = column_to_string_vec(
        df.column(target_col)
            .map_err(|_| PhenoError::Schema(format!("Target column '{}' not found", target_col)))?,
    )?;

    let pairs: Vec<(&str, &str)> = groups
        .iter()
        .zip(targets.iter())
        .filter_map(|(g, t)| match (g, t) {
            (Some(g), Some(t)) => Some((g.as_str(), t.as_str())),
            _ => None,
        })
        .collect();

    let row_labels: Vec<String> = pairs
        .iter()
        .map(|(g, _)| g.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let col_labels: Vec<String> = pairs
        .iter()
        .map(|(_, t)| t.to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let n_rows = row_labels.len();
    let n_cols = col_labels.len();
    if n_rows < 2 || n_cols < 2 {
        return Err(PhenoError::Data(format!(
            "contingency table needs at least two non-empty groups and two outcome levels, got {}x{}",
            n_rows, n_cols
        ))
        .into());
    }

    let mut observed = vec![vec![0u64; n_cols]; n_rows];
    for (g, t) in &pairs {
        let r = row_labels.iter().position(|l| l == g).unwrap_or(0);
        let c = col_labels.iter().position(|l| l == t).unwrap_or(0);
        observed[r][c] += 1;
    }

    let row_totals: Vec<f64> = observed
        .iter()
        .map(|r| r.iter().sum::<u64>() as f64)
        .collect();
    let col_totals: Vec<f64> = (0..n_cols)
        .map(|c| observed.iter().map(|r| r[c] as f64).sum())
        .collect();
    let grand_total: f64 = row_totals.iter().sum();

    let expected: Vec<Vec<f64>> = (0..n_rows)
        .map(|r| {
            (0..n_cols)
                .map(|c| row_totals[r] * col_totals[c] / grand_total)
                .collect()
        })
        .collect();

    // Yates continuity correction on 2x2 tables
    let correction = if n_rows == 2 && n_cols == 2 { 0.5 } else { 0.0 };
    let mut statistic = 0.0;
    for r in 0..n_rows {
        for c in 0..n_cols {
            let e = expected[r][c];
            if e <= 0.0 {
                continue;
            }
            let dev = ((observed[r][c] as f64 - e).abs() - correction).max(0.0);
            statistic += dev * dev / e;
        }
    }

    let dof = (n_rows - 1) * (n_cols - 1);
    let dist = ChiSquared::new(dof as f64)
        .map_err(|e| PhenoError::Data(format!("invalid degrees of freedom: {}", e)))?;
    let p_value = 1.0 - dist.cdf(statistic);

    Ok(ChiSquareResult {
        statistic,
        p_value,
        dof,
        row_labels,
        col_labels,
        observed,
        expected,
    })
}
