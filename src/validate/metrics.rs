//! Held-out classification metrics

use serde::Serialize;

/// Precision/recall/F1 for one class.
#[derive(Debug, Clone, Serialize)]
pub struct ClassMetrics {
    pub class: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of held-out rows with this true class
    pub support: usize,
}

/// Held-out accuracy plus a per-class summary.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub accuracy: f64,
    pub per_class: Vec<ClassMetrics>,
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{:>12}  {:>9}  {:>9}  {:>9}  {:>8}",
            "class", "precision", "recall", "f1", "support"
        )?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:>12}  {:>9.3}  {:>9.3}  {:>9.3}  {:>8}",
                m.class, m.precision, m.recall, m.f1, m.support
            )?;
        }
        write!(f, "\naccuracy: {:.3}", self.accuracy)
    }
}

/// Build a report from held-out true/predicted class indices.
pub fn classification_report(
    actual: &[usize],
    predicted: &[usize],
    classes: &[String],
) -> ValidationReport {
    let n = actual.len();
    let correct = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a == p)
        .count();
    let accuracy = if n > 0 { correct as f64 / n as f64 } else { 0.0 };

    let per_class = classes
        .iter()
        .enumerate()
        .map(|(c, name)| {
            let tp = actual
                .iter()
                .zip(predicted)
                .filter(|&(&a, &p)| a == c && p == c)
                .count() as f64;
            let predicted_c = predicted.iter().filter(|&&p| p == c).count() as f64;
            let support = actual.iter().filter(|&&a| a == c).count();
            let precision = if predicted_c > 0.0 { tp / predicted_c } else { 0.0 };
            let recall = if support > 0 { tp / support as f64 } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                class: name.clone(),
                precision,
                recall,
                f1,
                support,
            }
        })
        .collect();

    ValidationReport {
        accuracy,
        per_class,
    }
}
