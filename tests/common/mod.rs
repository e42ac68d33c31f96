//! Shared test fixtures

#![allow(dead_code)]

use faer::Mat;
use polars::prelude::*;
use rand::distributions::Distribution;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;

/// A lab panel with skewed columns of very different scales and a fraction of
/// missing cells, as a dense matrix with NaN for missing.
pub fn sparse_lab_matrix(
    n_rows: usize,
    n_cols: usize,
    missing_fraction: f64,
    seed: u64,
) -> Mat<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::standard();
    Mat::from_fn(n_rows, n_cols, |_, j| {
        if rng.gen::<f64>() < missing_fraction {
            f64::NAN
        } else {
            let z: f64 = normal.sample(&mut rng);
            // Column scale grows rapidly and odd columns are exponentiated,
            // giving heavy right skew
            let scale = 10f64.powi(j as i32);
            if j % 2 == 1 {
                z.exp() * scale
            } else {
                z * scale + 5.0 * scale
            }
        }
    })
}

/// Two well-separated Gaussian blobs; returns the matrix and the true
/// blob membership per row.
pub fn two_blob_matrix(n_per_blob: usize, separation: f64, seed: u64) -> (Mat<f64>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::standard();
    let n = n_per_blob * 2;
    let truth: Vec<usize> = (0..n).map(|i| usize::from(i >= n_per_blob)).collect();
    let x = Mat::from_fn(n, 2, |i, _| {
        let offset = if i < n_per_blob { 0.0 } else { separation };
        let z: f64 = normal.sample(&mut rng);
        z + offset
    });
    (x, truth)
}

/// Fraction of rows on which two 2-group labelings agree, up to permutation.
pub fn label_agreement(labels: &[usize], truth: &[usize]) -> f64 {
    let matches = labels
        .iter()
        .zip(truth)
        .filter(|(a, b)| a == b)
        .count();
    let n = labels.len();
    matches.max(n - matches) as f64 / n as f64
}

/// A cohort frame with two latent phenotypes: two informative labs, one pure
/// noise lab, plus metadata columns. Returns the frame and the true group of
/// each patient.
pub fn synthetic_cohort(n_per_group: usize, seed: u64) -> (DataFrame, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let normal = Normal::standard();
    let n = n_per_group * 2;
    let truth: Vec<usize> = (0..n).map(|i| usize::from(i >= n_per_group)).collect();

    let crp: Vec<f64> = truth
        .iter()
        .map(|&g| {
            let z: f64 = normal.sample(&mut rng);
            z + if g == 1 { 8.0 } else { 0.0 }
        })
        .collect();
    let ferritin: Vec<f64> = truth
        .iter()
        .map(|&g| {
            let z: f64 = normal.sample(&mut rng);
            z * 50.0 + if g == 1 { 900.0 } else { 300.0 }
        })
        .collect();
    let sodium: Vec<f64> = (0..n)
        .map(|_| {
            let z: f64 = normal.sample(&mut rng);
            140.0 + z * 3.0
        })
        .collect();
    let rsv: Vec<&str> = truth
        .iter()
        .map(|&g| {
            if g == 1 && rng.gen::<f64>() < 0.6 {
                "Detected"
            } else {
                "Negative"
            }
        })
        .collect();
    let outcome: Vec<&str> = truth
        .iter()
        .map(|&g| {
            if g == 1 && rng.gen::<f64>() < 0.7 {
                "severe"
            } else {
                "mild"
            }
        })
        .collect();

    let df = df! {
        "CRP" => crp,
        "Ferritin" => ferritin,
        "Sodium" => sodium,
        "RSV" => rsv,
        "Outcome" => outcome,
    }
    .unwrap();
    (df, truth)
}

/// Punch missing cells into numeric columns of a frame.
pub fn with_missing(df: &DataFrame, columns: &[&str], fraction: f64, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut out = df.clone();
    for &name in columns {
        let values: Vec<Option<f64>> = out
            .column(name)
            .unwrap()
            .cast(&DataType::Float64)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| {
                if rng.gen::<f64>() < fraction {
                    None
                } else {
                    v
                }
            })
            .collect();
        out.with_column(Series::new(name.into(), values)).unwrap();
    }
    out
}
