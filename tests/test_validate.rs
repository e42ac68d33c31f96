//! Tests for supervised phenotype validation

use phenolab::error::PhenoError;
use phenolab::frame::attach_groups;
use phenolab::validate::{PhenotypeValidator, ValidatorConfig};
use polars::prelude::*;

#[path = "common/mod.rs"]
mod common;

fn cohort_with_groups(n_per_group: usize, seed: u64) -> DataFrame {
    let (df, truth) = common::synthetic_cohort(n_per_group, seed);
    attach_groups(&df, "Cluster", &truth).unwrap()
}

#[test]
fn test_separable_groups_validate_with_high_accuracy() {
    let df = cohort_with_groups(50, 7);
    let mut validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    let report = validator.train("Cluster", &[]).unwrap();

    assert!(report.accuracy >= 0.8, "accuracy {}", report.accuracy);
    assert_eq!(report.per_class.len(), 2);
    for class in &report.per_class {
        assert!(class.support > 0);
    }
}

#[test]
fn test_derived_column_exclusion_prevents_leakage() {
    // A phenotype label derived one-to-one from the cluster index, with
    // nothing but noise features left once both are excluded
    let (truth, noise): (Vec<u32>, Vec<f64>) = {
        use rand::{rngs::StdRng, Rng, SeedableRng};
        let mut rng = StdRng::seed_from_u64(3);
        (0..200)
            .map(|i| (u32::from(i >= 100), rng.gen::<f64>()))
            .unzip()
    };
    let phenotype: Vec<u32> = truth.iter().map(|&g| g + 10).collect();
    let df = df! {
        "Noise" => noise,
        "Phenotype" => phenotype,
        "Cluster" => truth,
    }
    .unwrap();

    let mut validator = PhenotypeValidator::new(df.clone(), ValidatorConfig::default());
    let leaked = validator.train("Cluster", &[]).unwrap();
    assert!(leaked.accuracy >= 0.9, "leaked accuracy {}", leaked.accuracy);

    let mut validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    let honest = validator.train("Cluster", &["Phenotype"]).unwrap();
    assert!(honest.accuracy < 0.8, "honest accuracy {}", honest.accuracy);
}

#[test]
fn test_missing_group_column_is_rejected() {
    let (df, _) = common::synthetic_cohort(10, 1);
    let mut validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    let err = validator.train("Cluster", &[]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PhenoError>(),
        Some(PhenoError::Schema(_))
    ));
}

#[test]
fn test_importance_before_training_is_rejected() {
    let (df, _) = common::synthetic_cohort(10, 1);
    let validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    assert!(matches!(
        validator.feature_importance(5),
        Err(PhenoError::NotFitted { .. })
    ));
}

#[test]
fn test_importances_rank_informative_features_first() {
    let df = cohort_with_groups(50, 11);
    let mut validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    validator.train("Cluster", &[]).unwrap();

    let ranked = validator.feature_importance(10).unwrap();
    // CRP, Ferritin, Sodium are the numeric features; the label column and
    // non-numeric columns never appear
    assert_eq!(ranked.len(), 3);
    assert!(ranked.iter().all(|f| f.feature != "Cluster"));
    assert!(ranked.iter().all(|f| f.importance >= 0.0));
    let total: f64 = ranked.iter().map(|f| f.importance).sum();
    assert!((total - 1.0).abs() < 1e-9, "importances sum to {total}");
    for pair in ranked.windows(2) {
        assert!(pair[0].importance >= pair[1].importance);
    }
    // The pure-noise lab cannot outrank both informative labs
    assert_ne!(ranked[0].feature, "Sodium");

    let top = validator.feature_importance(1).unwrap();
    assert_eq!(top.len(), 1);
}

#[test]
fn test_association_rates_for_text_indicator() {
    let df = cohort_with_groups(100, 23);
    let mut validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    validator.train("Cluster", &[]).unwrap();

    let rates = validator.check_association("Cluster", &["RSV", "NoSuchColumn"]).unwrap();
    // Absent columns are skipped, one entry per present indicator per group
    assert_eq!(rates.len(), 2);
    for rate in &rates {
        assert_eq!(rate.indicator, "RSV");
        assert_eq!(rate.total, 100);
        assert!((rate.percentage - 100.0 * rate.positive as f64 / 100.0).abs() < 1e-9);
    }
    let group0 = rates.iter().find(|r| r.group == "0").unwrap();
    let group1 = rates.iter().find(|r| r.group == "1").unwrap();
    // Detection is seeded into group 1 only
    assert_eq!(group0.positive, 0);
    assert!(group1.percentage > 30.0);
}

#[test]
fn test_association_rates_for_numeric_indicator() {
    let df = df! {
        "Flu" => [1.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        "Cluster" => [0u32, 0, 0, 1, 1, 1],
    }
    .unwrap();
    let validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    let rates = validator.check_association("Cluster", &["Flu"]).unwrap();

    let group0 = rates.iter().find(|r| r.group == "0").unwrap();
    assert_eq!(group0.positive, 2);
    assert_eq!(group0.total, 3);
    assert!((group0.percentage - 200.0 / 3.0).abs() < 1e-9);
    let group1 = rates.iter().find(|r| r.group == "1").unwrap();
    assert_eq!(group1.positive, 0);
}

#[test]
fn test_singleton_group_cannot_be_split() {
    let df = df! {
        "CRP" => [1.0, 2.0, 3.0, 4.0, 5.0],
        "Cluster" => [0u32, 0, 0, 0, 1],
    }
    .unwrap();
    let mut validator = PhenotypeValidator::new(df, ValidatorConfig::default());
    let err = validator.train("Cluster", &[]).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PhenoError>(),
        Some(PhenoError::Data(_))
    ));
}
