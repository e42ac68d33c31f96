//! Supervised validation of clustered phenotypes
//!
//! Trains an ensemble classifier to predict group membership from the
//! clinical features, quantifying how separable the discovered groups are
//! and which features drive the separation. The group-label column and any
//! caller-named columns derived from it are removed from the feature set
//! before training (leakage guard).

mod forest;
mod metrics;
mod tree;

use std::collections::BTreeSet;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::Serialize;

pub use forest::{ForestConfig, RandomForest, DEFAULT_TREES};
pub use metrics::{classification_report, ClassMetrics, ValidationReport};

use crate::error::{PhenoError, PhenoResult};
use crate::frame::{column_to_string_vec, FeatureMatrix};
use polars::prelude::DataFrame;

/// Free-text markers counted as a positive case, matched case-insensitively
/// as substrings.
const POSITIVE_MARKERS: [&str; 3] = ["detected", "positive", "yes"];

/// Configuration for the validator.
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Trees in the ensemble
    pub n_trees: usize,
    /// Fraction of rows held out for evaluation
    pub test_fraction: f64,
    /// Seed for the stratified split and the forest
    pub seed: u64,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            n_trees: DEFAULT_TREES,
            test_fraction: 0.2,
            seed: 42,
        }
    }
}

/// One feature's importance weight from the trained model.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Percentage of positive cases for one indicator column within one group.
#[derive(Debug, Clone, Serialize)]
pub struct GroupPositiveRate {
    pub group: String,
    pub indicator: String,
    pub positive: usize,
    pub total: usize,
    pub percentage: f64,
}

/// Validates clustered phenotypes with a supervised classifier.
pub struct PhenotypeValidator {
    df: DataFrame,
    config: ValidatorConfig,
    model: Option<RandomForest>,
    feature_names: Vec<String>,
}

impl PhenotypeValidator {
    pub fn new(df: DataFrame, config: ValidatorConfig) -> Self {
        Self {
            df,
            config,
            model: None,
            feature_names: Vec::new(),
        }
    }

    /// Train the classifier to predict `group_col` from the numeric features.
    ///
    /// `exclude` names columns that are deterministic functions of the group
    /// label; they are removed along with `group_col` itself. Remaining nulls
    /// are zero-filled - a deliberate, simple fallback distinct from the
    /// pipeline's KNN imputer, so validation never reads fitted preprocessing
    /// state. Rows are split 80/20 (by `test_fraction`), stratified so each
    /// group keeps its proportion in both partitions.
    pub fn train(&mut self, group_col: &str, exclude: &[&str]) -> Result<ValidationReport> {
        let label_col = self
            .df
            .column(group_col)
            .map_err(|_| PhenoError::Schema(format!("Group column '{}' not found", group_col)))?;
        let labels = column_to_string_vec(label_col)?;
        if labels.iter().any(|l| l.is_none()) {
            return Err(PhenoError::Data(format!(
                "Group column '{}' contains null labels",
                group_col
            ))
            .into());
        }
        let labels: Vec<String> = labels.into_iter().flatten().collect();

        // Leakage guard: the label column and its derived columns never enter
        // the feature set
        let mut skip: Vec<&str> = vec![group_col];
        skip.extend_from_slice(exclude);
        let matrix = FeatureMatrix::from_dataframe(&self.df, &skip)?;

        // Zero-fill remaining missing cells
        let x: Vec<Vec<f64>> = matrix
            .to_rows()
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|v| if v.is_nan() { 0.0 } else { v })
                    .collect()
            })
            .collect();

        let classes: Vec<String> = labels
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let y: Vec<usize> = labels
            .iter()
            .map(|l| classes.iter().position(|c| c == l).unwrap_or(0))
            .collect();

        let (train_idx, test_idx) = stratified_split(
            &y,
            classes.len(),
            self.config.test_fraction,
            self.config.seed,
        )?;

        let x_train: Vec<Vec<f64>> = train_idx.iter().map(|&i| x[i].clone()).collect();
        let y_train: Vec<usize> = train_idx.iter().map(|&i| y[i]).collect();

        let forest = RandomForest::fit(
            &x_train,
            &y_train,
            classes.len(),
            &ForestConfig {
                n_trees: self.config.n_trees,
                max_depth: None,
                seed: self.config.seed,
            },
        )?;

        let y_test: Vec<usize> = test_idx.iter().map(|&i| y[i]).collect();
        let predicted: Vec<usize> = test_idx.iter().map(|&i| forest.predict(&x[i])).collect();
        let report = classification_report(&y_test, &predicted, &classes);

        self.feature_names = matrix.names;
        self.model = Some(forest);
        Ok(report)
    }

    /// The `top_n` highest-weighted features from the trained model.
    pub fn feature_importance(&self, top_n: usize) -> PhenoResult<Vec<FeatureImportance>> {
        let model = self.model.as_ref().ok_or(PhenoError::NotFitted {
            component: "PhenotypeValidator",
            operation: "feature_importance",
        })?;
        let importances = model.feature_importances();
        if importances.len() != self.feature_names.len() {
            return Err(PhenoError::Schema(format!(
                "feature name count {} does not match importance count {}",
                self.feature_names.len(),
                importances.len()
            )));
        }
        let mut ranked: Vec<FeatureImportance> = self
            .feature_names
            .iter()
            .zip(importances)
            .map(|(feature, &importance)| FeatureImportance {
                feature: feature.clone(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked.truncate(top_n);
        Ok(ranked)
    }

    /// Percentage of positive cases per group for each indicator column.
    ///
    /// Supports numeric 0/1 encodings and free-text results containing a
    /// positive marker ("detected", "positive", "yes"). Columns absent from
    /// the frame are skipped.
    pub fn check_association(
        &self,
        group_col: &str,
        categorical_cols: &[&str],
    ) -> Result<Vec<GroupPositiveRate>> {
        let label_col = self
            .df
            .column(group_col)
            .map_err(|_| PhenoError::Schema(format!("Group column '{}' not found", group_col)))?;
        let groups = column_to_string_vec(label_col)?;
        let group_names: BTreeSet<String> = groups.iter().flatten().cloned().collect();

        let mut results = Vec::new();
        for &indicator in categorical_cols {
            let Ok(col) = self.df.column(indicator) else {
                continue;
            };
            let positives = positive_mask(col)?;

            for group in &group_names {
                let mut positive = 0usize;
                let mut total = 0usize;
                for (g, p) in groups.iter().zip(&positives) {
                    if g.as_deref() != Some(group.as_str()) {
                        continue;
                    }
                    if let Some(is_positive) = p {
                        total += 1;
                        if *is_positive {
                            positive += 1;
                        }
                    }
                }
                let percentage = if total > 0 {
                    positive as f64 / total as f64 * 100.0
                } else {
                    0.0
                };
                results.push(GroupPositiveRate {
                    group: group.clone(),
                    indicator: indicator.to_string(),
                    positive,
                    total,
                    percentage,
                });
            }
        }
        Ok(results)
    }
}

/// Per-row positivity of an indicator column; `None` marks a null cell.
fn positive_mask(col: &polars::prelude::Column) -> Result<Vec<Option<bool>>> {
    use polars::prelude::DataType;

    if col.dtype().is_primitive_numeric() {
        let cast = col.cast(&DataType::Float64)?;
        Ok(cast
            .f64()?
            .into_iter()
            .map(|v| v.map(|x| (x - 1.0).abs() < 1e-9))
            .collect())
    } else {
        let values = column_to_string_vec(col)?;
        Ok(values
            .into_iter()
            .map(|v| {
                v.map(|s| {
                    let lower = s.to_lowercase();
                    POSITIVE_MARKERS.iter().any(|m| lower.contains(m))
                })
            })
            .collect())
    }
}

/// Stratified train/test split preserving each class's proportion.
///
/// Every class contributes at least one row to each partition; index order in
/// the returned partitions is ascending so downstream work is deterministic.
fn stratified_split(
    y: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> PhenoResult<(Vec<usize>, Vec<usize>)> {
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(PhenoError::Configuration(format!(
            "test fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();
    for c in 0..n_classes {
        let mut members: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, &label)| label == c)
            .map(|(i, _)| i)
            .collect();
        if members.len() < 2 {
            return Err(PhenoError::Data(format!(
                "a group has only {} row(s); at least 2 are required for a stratified split",
                members.len()
            )));
        }
        members.shuffle(&mut rng);
        let n_test = ((members.len() as f64 * test_fraction).round() as usize)
            .clamp(1, members.len() - 1);
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }
    train.sort_unstable();
    test.sort_unstable();
    Ok((train, test))
}
