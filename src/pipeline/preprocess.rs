//! End-to-end preprocessing for clinical lab panels
//!
//! Chains KNN imputation, quantile normalization, and an optional
//! principal-axis projection with a strict fit-once / replay-many lifecycle:
//! `fit_transform` on the reference cohort, `transform` on any later rows
//! using the same fitted state.

use anyhow::{Context, Result};
use polars::prelude::DataFrame;

use crate::frame::{projection_frame, FeatureMatrix};
use crate::pipeline::{KnnImputer, PcaReducer, QuantileNormalizer, TargetDistribution};

/// Configuration for the preprocessing chain.
#[derive(Debug, Clone)]
pub struct PreprocessorConfig {
    /// Neighbour count for imputation
    pub n_neighbours: usize,
    /// Canonical output distribution per feature
    pub target_distribution: TargetDistribution,
    /// Cumulative variance to retain, e.g. `Some(0.95)`; `None` skips PCA
    pub pca_variance: Option<f64>,
}

impl Default for PreprocessorConfig {
    fn default() -> Self {
        Self {
            n_neighbours: crate::pipeline::impute::DEFAULT_NEIGHBOURS,
            target_distribution: TargetDistribution::Normal,
            pca_variance: None,
        }
    }
}

/// Fit-once preprocessing pipeline over the numeric columns of a frame.
pub struct ClinicalPreprocessor {
    imputer: KnnImputer,
    normalizer: QuantileNormalizer,
    reducer: Option<PcaReducer>,
    feature_names: Vec<String>,
}

impl ClinicalPreprocessor {
    pub fn new(config: PreprocessorConfig) -> Result<Self> {
        let reducer = config
            .pca_variance
            .map(PcaReducer::new)
            .transpose()
            .context("Invalid PCA variance threshold")?;
        Ok(Self {
            imputer: KnnImputer::new(config.n_neighbours),
            normalizer: QuantileNormalizer::new(config.target_distribution),
            reducer,
            feature_names: Vec::new(),
        })
    }

    /// Fit every step on `df` and return the dense transformed features plus
    /// the optional projection (columns `PC1..PCk`).
    ///
    /// The output frame has the same row count and feature column names as
    /// the input, with every missing cell filled.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<(DataFrame, Option<DataFrame>)> {
        let matrix = FeatureMatrix::from_dataframe(df, &[])?;
        let imputed = self.imputer.fit_transform(&matrix.values)?;
        let transformed = self.normalizer.fit_transform(&imputed)?;

        let projection = match self.reducer.as_mut() {
            Some(reducer) => Some(projection_frame(&reducer.fit_transform(&transformed)?)?),
            None => None,
        };

        self.feature_names = matrix.names.clone();
        let out = FeatureMatrix {
            names: matrix.names,
            values: transformed,
        }
        .to_dataframe()?;
        Ok((out, projection))
    }

    /// Replay the fitted pipeline on new rows.
    pub fn transform(&self, df: &DataFrame) -> Result<(DataFrame, Option<DataFrame>)> {
        let matrix = FeatureMatrix::from_dataframe(df, &[])?;
        // An unfit pipeline is rejected below with a not-fitted error
        if !self.feature_names.is_empty() && matrix.names != self.feature_names {
            anyhow::bail!(
                "Feature columns do not match the fitted pipeline (expected {:?})",
                self.feature_names
            );
        }
        let imputed = self.imputer.transform(&matrix.values)?;
        let transformed = self.normalizer.transform(&imputed)?;

        let projection = match self.reducer.as_ref() {
            Some(reducer) => Some(projection_frame(&reducer.transform(&transformed)?)?),
            None => None,
        };

        let out = FeatureMatrix {
            names: matrix.names,
            values: transformed,
        }
        .to_dataframe()?;
        Ok((out, projection))
    }

    /// The fitted reducer, when PCA is enabled.
    pub fn reducer(&self) -> Option<&PcaReducer> {
        self.reducer.as_ref()
    }
}
