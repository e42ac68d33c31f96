//! Result reporting and export

mod export;

pub use export::{export_results_json, AnalysisExport, ExportMetadata};
