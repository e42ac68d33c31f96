//! JSON export of validation and association results
//!
//! Bundles the numeric outputs downstream collaborators (plotting, notebook
//! summaries) consume, together with metadata identifying the run.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use crate::pipeline::cluster::GroupSummary;
use crate::stats::{AnovaResult, ChiSquareResult};
use crate::validate::{FeatureImportance, GroupPositiveRate, ValidationReport};

/// Metadata about the analysis run
#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    /// Timestamp of the analysis (ISO 8601 format)
    pub timestamp: String,
    /// Phenolab version
    pub phenolab_version: String,
    /// Clustering method name
    pub clustering_method: String,
    /// Number of groups requested
    pub n_clusters: usize,
}

impl ExportMetadata {
    pub fn new(clustering_method: &str, n_clusters: usize) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            phenolab_version: env!("CARGO_PKG_VERSION").to_string(),
            clustering_method: clustering_method.to_string(),
            n_clusters,
        }
    }
}

/// Complete analysis export: validation, importances, group summaries, and
/// association tests.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisExport {
    pub metadata: ExportMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub feature_importance: Vec<FeatureImportance>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub group_summaries: Vec<GroupSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub positive_rates: Vec<GroupPositiveRate>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub anova: Vec<AnovaResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chi_square: Option<ChiSquareResult>,
}

impl AnalysisExport {
    pub fn new(metadata: ExportMetadata) -> Self {
        Self {
            metadata,
            validation: None,
            feature_importance: Vec::new(),
            group_summaries: Vec::new(),
            positive_rates: Vec::new(),
            anova: Vec::new(),
            chi_square: None,
        }
    }
}

/// Write the analysis results as pretty-printed JSON.
pub fn export_results_json(export: &AnalysisExport, output_path: &Path) -> Result<()> {
    let json =
        serde_json::to_string_pretty(export).context("Failed to serialize analysis results")?;
    std::fs::write(output_path, json)
        .with_context(|| format!("Failed to write results to {}", output_path.display()))?;
    Ok(())
}
