//! Dense-matrix boundary between polars DataFrames and the numeric core.
//!
//! The algorithms operate on dense `faer::Mat<f64>` matrices; column names
//! are carried alongside and re-attached only here, at the edges.

use anyhow::{Context, Result};
use faer::Mat;
use polars::prelude::*;

/// Patients (rows) x lab features (columns) as a dense numeric matrix.
///
/// Missing cells are `NaN`. Column names are kept so transformed output can
/// be rebuilt with the input's schema.
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature column names, in matrix column order
    pub names: Vec<String>,
    /// Dense values; `NaN` marks a missing cell
    pub values: Mat<f64>,
}

impl FeatureMatrix {
    /// Extract the numeric columns of a DataFrame as a dense Float64 matrix.
    ///
    /// Non-numeric columns and any named in `exclude` are skipped; nulls
    /// become `NaN`.
    pub fn from_dataframe(df: &DataFrame, exclude: &[&str]) -> Result<Self> {
        let names: Vec<String> = df
            .get_columns()
            .iter()
            .filter(|col| {
                col.dtype().is_primitive_numeric() && !exclude.contains(&col.name().as_str())
            })
            .map(|col| col.name().to_string())
            .collect();

        if names.is_empty() {
            anyhow::bail!("No numeric feature columns found in the frame");
        }

        let n_rows = df.height();
        let mut values = Mat::<f64>::zeros(n_rows, names.len());
        for (j, name) in names.iter().enumerate() {
            let col = df
                .column(name)?
                .cast(&DataType::Float64)
                .with_context(|| format!("Failed to cast column '{}' to Float64", name))?;
            for (i, v) in col.f64()?.into_iter().enumerate() {
                values[(i, j)] = v.unwrap_or(f64::NAN);
            }
        }

        Ok(Self { names, values })
    }

    /// Number of rows (patients).
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    /// Number of feature columns.
    pub fn n_cols(&self) -> usize {
        self.values.ncols()
    }

    /// Copy row `i` into a contiguous vector.
    pub fn row(&self, i: usize) -> Vec<f64> {
        (0..self.n_cols()).map(|j| self.values[(i, j)]).collect()
    }

    /// Copy the matrix into row-major vectors.
    pub fn to_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_rows()).map(|i| self.row(i)).collect()
    }

    /// Rebuild a DataFrame carrying the stored column names.
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.names.len());
        for (j, name) in self.names.iter().enumerate() {
            let vals: Vec<f64> = (0..self.n_rows()).map(|i| self.values[(i, j)]).collect();
            columns.push(Series::new(name.as_str().into(), vals).into());
        }
        DataFrame::new(columns).context("Failed to assemble feature DataFrame")
    }
}

/// Wrap a projection matrix in a DataFrame with generated `PC1..PCk` names.
pub fn projection_frame(projected: &Mat<f64>) -> Result<DataFrame> {
    let mut columns: Vec<Column> = Vec::with_capacity(projected.ncols());
    for j in 0..projected.ncols() {
        let vals: Vec<f64> = (0..projected.nrows()).map(|i| projected[(i, j)]).collect();
        columns.push(Series::new(format!("PC{}", j + 1).as_str().into(), vals).into());
    }
    DataFrame::new(columns).context("Failed to assemble projection DataFrame")
}

/// Attach group labels to a copy of `df`, aligned by row order.
pub fn attach_groups(df: &DataFrame, column_name: &str, labels: &[usize]) -> Result<DataFrame> {
    if labels.len() != df.height() {
        anyhow::bail!(
            "Label count {} does not match row count {}",
            labels.len(),
            df.height()
        );
    }
    let labels: Vec<u32> = labels.iter().map(|&l| l as u32).collect();
    let mut out = df.clone();
    out.with_column(Series::new(column_name.into(), labels))
        .with_context(|| format!("Failed to attach group column '{}'", column_name))?;
    Ok(out)
}

/// Convert a column to per-row `Option<String>` values for group/outcome keys.
///
/// Numeric dtypes render without a fractional suffix where possible so group
/// labels like `0` and `0.0` compare equal across frames.
pub fn column_to_string_vec(col: &Column) -> Result<Vec<Option<String>>> {
    let values: Vec<Option<String>> = match col.dtype() {
        DataType::String => col
            .str()?
            .into_iter()
            .map(|v| v.map(|s| s.to_string()))
            .collect(),
        DataType::Boolean => col
            .bool()?
            .into_iter()
            .map(|v| v.map(|b| b.to_string()))
            .collect(),
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
            let cast = col.cast(&DataType::Int64)?;
            cast.i64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
            let cast = col.cast(&DataType::UInt64)?;
            cast.u64()?
                .into_iter()
                .map(|v| v.map(|n| n.to_string()))
                .collect()
        }
        DataType::Float32 | DataType::Float64 => {
            let cast = col.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|v| {
                    v.map(|n| {
                        if n.fract() == 0.0 && n.is_finite() {
                            format!("{}", n as i64)
                        } else {
                            format!("{}", n)
                        }
                    })
                })
                .collect()
        }
        _ => {
            let cast = col.cast(&DataType::String)?;
            cast.str()?
                .into_iter()
                .map(|v| v.map(|s| s.to_string()))
                .collect()
        }
    };
    Ok(values)
}
