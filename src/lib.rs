//! Phenolab: clinical phenotype discovery core
//!
//! A library for turning a cohort's sparse, skewed lab measurements into a
//! clean comparable representation, partitioning patients into latent
//! phenotype groups, and statistically validating whether those groups are
//! clinically meaningful.

pub mod error;
pub mod frame;
pub mod pipeline;
pub mod report;
pub mod stats;
pub mod validate;
