//! Pipeline module - preprocessing and clustering steps

pub mod cluster;
pub mod impute;
pub mod normalize;
pub mod preprocess;
pub mod reduce;

pub use cluster::*;
pub use impute::*;
pub use normalize::*;
pub use preprocess::*;
pub use reduce::*;
