//! Error types for the phenotyping core.
//!
//! The taxonomy separates rejected configuration, lifecycle misuse
//! (transform before fit), broken schema/shape invariants, and data that
//! cannot support the requested computation. Configuration and lifecycle
//! errors always surface immediately; batch statistical routines recover
//! from per-feature data problems by skipping the feature instead.

use thiserror::Error;

/// Errors surfaced by the preprocessing, clustering, and validation core.
#[derive(Debug, Error)]
pub enum PhenoError {
    /// A configuration value was rejected before any computation started,
    /// e.g. an unsupported clustering method name or a neighbour count
    /// exceeding the available rows.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A stateful component was asked to transform before being fit.
    #[error("{component} must be fit before calling {operation}()")]
    NotFitted {
        /// Component that rejected the call
        component: &'static str,
        /// Operation that was attempted
        operation: &'static str,
    },

    /// A required column is absent from the frame, or an internal shape
    /// invariant (e.g. feature/importance length agreement) was violated.
    #[error("schema error: {0}")]
    Schema(String),

    /// The data cannot support the requested computation, e.g. clustering
    /// fewer rows than requested groups.
    #[error("data error: {0}")]
    Data(String),
}

/// Shorthand result type for the numeric core.
pub type PhenoResult<T> = Result<T, PhenoError>;
