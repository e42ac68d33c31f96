//! End-to-end flow: preprocess, cluster, validate, test, export

use phenolab::frame::{attach_groups, FeatureMatrix};
use phenolab::pipeline::{
    ClinicalPreprocessor, ClusterEngine, ClusterMethod, PreprocessorConfig, TargetDistribution,
};
use phenolab::report::{export_results_json, AnalysisExport, ExportMetadata};
use phenolab::stats::{anova_by_group, chi_square};
use phenolab::validate::{PhenotypeValidator, ValidatorConfig};

#[path = "common/mod.rs"]
mod common;

#[test]
fn test_full_analysis_flow() {
    let (df, truth) = common::synthetic_cohort(60, 31);
    let df = common::with_missing(&df, &["CRP", "Ferritin", "Sodium"], 0.1, 32);

    // Preprocess: impute, normalize, project
    let mut preprocessor = ClinicalPreprocessor::new(PreprocessorConfig {
        n_neighbours: 5,
        target_distribution: TargetDistribution::Normal,
        pca_variance: Some(0.9),
    })
    .unwrap();
    let (processed, projection) = preprocessor.fit_transform(&df).unwrap();

    assert_eq!(processed.height(), 120);
    assert_eq!(processed.get_column_names(), &["CRP", "Ferritin", "Sodium"]);
    let projection = projection.unwrap();
    assert_eq!(projection.height(), 120);
    assert_eq!(projection.get_column_names()[0].as_str(), "PC1");

    let features = FeatureMatrix::from_dataframe(&processed, &[]).unwrap();
    for i in 0..features.n_rows() {
        for j in 0..features.n_cols() {
            assert!(features.values[(i, j)].is_finite());
        }
    }

    // Cluster the normalized features
    let method = ClusterMethod::from_name("kmeans", 2).unwrap();
    let assignment = ClusterEngine::new(method, 42)
        .fit_predict(&features.values)
        .unwrap();
    assert!(common::label_agreement(&assignment.labels, &truth) >= 0.9);

    // Validate the groups on the original (unprocessed) features
    let labelled = attach_groups(&df, "Cluster", &assignment.labels).unwrap();
    let mut validator = PhenotypeValidator::new(labelled.clone(), ValidatorConfig::default());
    let report = validator.train("Cluster", &[]).unwrap();
    assert!(report.accuracy >= 0.8, "accuracy {}", report.accuracy);

    // Group differences
    let anova = anova_by_group(&labelled, "Cluster", &["CRP", "Ferritin", "Sodium"]).unwrap();
    assert_eq!(anova.len(), 3);
    assert_ne!(anova[0].feature, "Sodium");

    let outcome_test = chi_square(&labelled, "Cluster", "Outcome").unwrap();
    assert_eq!(outcome_test.dof, 1);

    // Bundle and export
    let mut export = AnalysisExport::new(ExportMetadata::new("kmeans", 2));
    export.validation = Some(report);
    export.feature_importance = validator.feature_importance(10).unwrap();
    export.group_summaries =
        phenolab::pipeline::group_summaries(&features.values, &assignment.labels).unwrap();
    export.positive_rates = validator.check_association("Cluster", &["RSV"]).unwrap();
    export.anova = anova;
    export.chi_square = Some(outcome_test);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("analysis.json");
    export_results_json(&export, &path).unwrap();

    let parsed: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(parsed["metadata"]["clustering_method"], "kmeans");
    assert_eq!(parsed["metadata"]["n_clusters"], 2);
    assert!(parsed["validation"]["accuracy"].is_number());
    assert_eq!(parsed["group_summaries"].as_array().unwrap().len(), 2);
    assert_eq!(parsed["anova"].as_array().unwrap().len(), 3);
    assert!(parsed["chi_square"]["p_value"].is_number());
    assert!(!parsed["feature_importance"].as_array().unwrap().is_empty());
}

#[test]
fn test_fitted_pipeline_replays_identically() {
    let (df, _) = common::synthetic_cohort(40, 17);
    let df = common::with_missing(&df, &["CRP", "Ferritin"], 0.1, 18);

    let mut preprocessor = ClinicalPreprocessor::new(PreprocessorConfig {
        n_neighbours: 5,
        target_distribution: TargetDistribution::Normal,
        pca_variance: Some(0.95),
    })
    .unwrap();
    let (fitted, fitted_proj) = preprocessor.fit_transform(&df).unwrap();
    let (replayed, replayed_proj) = preprocessor.transform(&df).unwrap();

    let a = FeatureMatrix::from_dataframe(&fitted, &[]).unwrap();
    let b = FeatureMatrix::from_dataframe(&replayed, &[]).unwrap();
    for i in 0..a.n_rows() {
        for j in 0..a.n_cols() {
            assert_eq!(a.values[(i, j)].to_bits(), b.values[(i, j)].to_bits());
        }
    }
    assert_eq!(
        fitted_proj.unwrap().get_column_names(),
        replayed_proj.unwrap().get_column_names()
    );
}

#[test]
fn test_unfit_pipeline_rejects_transform() {
    let (df, _) = common::synthetic_cohort(10, 1);
    let preprocessor = ClinicalPreprocessor::new(PreprocessorConfig::default()).unwrap();
    assert!(preprocessor.transform(&df).is_err());
}
