//! Statistical association tests between group membership and outcomes

mod anova;
mod chi_square;

pub use anova::{anova_by_group, AnovaResult};
pub use chi_square::{chi_square, ChiSquareResult};
