//! Unit tests for neighbour-based imputation

use faer::Mat;
use phenolab::error::PhenoError;
use phenolab::pipeline::KnnImputer;

#[path = "common/mod.rs"]
mod common;

fn count_missing(x: &Mat<f64>) -> usize {
    let mut count = 0;
    for i in 0..x.nrows() {
        for j in 0..x.ncols() {
            if x[(i, j)].is_nan() {
                count += 1;
            }
        }
    }
    count
}

#[test]
fn test_dense_output_for_sparse_panel() {
    // 100x8 panel with 15% missing, k=5
    let x = common::sparse_lab_matrix(100, 8, 0.15, 11);
    assert!(count_missing(&x) > 0, "fixture should contain missing cells");

    let mut imputer = KnnImputer::new(5);
    let dense = imputer.fit_transform(&x).unwrap();

    assert_eq!(dense.nrows(), 100);
    assert_eq!(dense.ncols(), 8);
    assert_eq!(count_missing(&dense), 0);
}

#[test]
fn test_observed_cells_are_untouched() {
    let x = common::sparse_lab_matrix(60, 4, 0.2, 3);
    let mut imputer = KnnImputer::new(5);
    let dense = imputer.fit_transform(&x).unwrap();
    for i in 0..x.nrows() {
        for j in 0..x.ncols() {
            if !x[(i, j)].is_nan() {
                assert_eq!(dense[(i, j)], x[(i, j)]);
            }
        }
    }
}

#[test]
fn test_transform_replay_is_deterministic() {
    let x = common::sparse_lab_matrix(80, 6, 0.1, 7);
    let mut imputer = KnnImputer::new(5);
    imputer.fit_transform(&x).unwrap();

    let new_rows = common::sparse_lab_matrix(20, 6, 0.1, 8);
    let a = imputer.transform(&new_rows).unwrap();
    let b = imputer.transform(&new_rows).unwrap();
    for i in 0..a.nrows() {
        for j in 0..a.ncols() {
            assert_eq!(a[(i, j)].to_bits(), b[(i, j)].to_bits());
        }
    }
}

#[test]
fn test_column_mean_fallback_when_no_donor_available() {
    // Fit rows: the last column is observed only in rows that share no other
    // column with the query row below
    let fit = Mat::from_fn(4, 3, |i, j| match (i, j) {
        // Rows 0 and 1 observe only the last column
        (0, 2) => 10.0,
        (1, 2) => 20.0,
        (0, _) | (1, _) => f64::NAN,
        // Rows 2 and 3 observe only the first two columns
        (_, 2) => f64::NAN,
        (i, j) => (i * 3 + j) as f64,
    });
    let mut imputer = KnnImputer::new(2);
    imputer.fit_transform(&fit).unwrap();

    // The query shares columns only with rows 2 and 3, neither of which
    // observed the last column, so its global mean applies
    let query = Mat::from_fn(1, 3, |_, j| if j == 2 { f64::NAN } else { 1.0 });
    let dense = imputer.transform(&query).unwrap();
    assert!((dense[(0, 2)] - 15.0).abs() < 1e-12);
}

#[test]
fn test_neighbour_count_must_be_below_row_count() {
    let x = common::sparse_lab_matrix(5, 3, 0.1, 1);
    let mut imputer = KnnImputer::new(5);
    assert!(matches!(
        imputer.fit_transform(&x),
        Err(PhenoError::Configuration(_))
    ));
}

#[test]
fn test_transform_before_fit_is_rejected() {
    let x = common::sparse_lab_matrix(10, 3, 0.1, 1);
    let imputer = KnnImputer::new(3);
    assert!(matches!(
        imputer.transform(&x),
        Err(PhenoError::NotFitted { .. })
    ));
}
