//! Binary classification metrics for the evaluation report.

use std::fmt;

use serde::Serialize;

/// `matrix[t][p]` counts rows with true label `t` predicted as `p`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrix {
    pub matrix: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    pub fn from_predictions(y_true: &[i32], y_pred: &[i32]) -> Self {
        let mut matrix = [[0usize; 2]; 2];
        for (&t, &p) in y_true.iter().zip(y_pred) {
            matrix[usize::from(t == 1)][usize::from(p == 1)] += 1;
        }
        Self { matrix }
    }

    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.matrix[0][0] + self.matrix[1][1]) as f64 / total as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class precision/recall/F1 with macro and weighted averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub macro_avg: ClassMetrics,
    pub weighted_avg: ClassMetrics,
    pub accuracy: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl ClassificationReport {
    /// `names[0]` labels class 0 and `names[1]` class 1.
    pub fn from_confusion(cm: &ConfusionMatrix, names: [&str; 2]) -> Self {
        let m = cm.matrix;
        let classes: Vec<ClassMetrics> = (0..2)
            .map(|c| {
                let tp = m[c][c];
                let predicted = m[0][c] + m[1][c];
                let support = m[c][0] + m[c][1];
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    label: names[c].to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let total: usize = classes.iter().map(|c| c.support).sum();
        let average = |label: &str, weight: &dyn Fn(&ClassMetrics) -> f64| {
            let norm: f64 = classes.iter().map(weight).sum();
            let mean = |field: fn(&ClassMetrics) -> f64| {
                if norm == 0.0 {
                    0.0
                } else {
                    classes.iter().map(|c| field(c) * weight(c)).sum::<f64>() / norm
                }
            };
            ClassMetrics {
                label: label.to_string(),
                precision: mean(|c| c.precision),
                recall: mean(|c| c.recall),
                f1: mean(|c| c.f1),
                support: total,
            }
        };

        let macro_avg = average("macro avg", &|_| 1.0);
        let weighted_avg = average("weighted avg", &|c| c.support as f64);
        Self {
            classes,
            macro_avg,
            weighted_avg,
            accuracy: cm.accuracy(),
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>12} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for row in self.classes.iter().chain([&self.macro_avg, &self.weighted_avg]) {
            writeln!(
                f,
                "{:>12} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                row.label, row.precision, row.recall, row.f1, row.support
            )?;
        }
        write!(f, "\n{:>12} {:>32.4}", "accuracy", self.accuracy)
    }
}

/// Area under the ROC curve via the rank-sum statistic; tied scores share
/// their average rank. Undefined (single-class) input yields `None`.
pub fn roc_auc(y_true: &[i32], scores: &[f32]) -> Option<f64> {
    let mut order: Vec<usize> = (0..scores.len().min(y_true.len())).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0f64; order.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + end + 1) as f64 / 2.0;
        for &row in &order[start..end] {
            ranks[row] = avg_rank;
        }
        start = end;
    }

    let positives = order.iter().filter(|&&r| y_true[r] == 1).count();
    let negatives = order.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }
    let rank_sum: f64 = order
        .iter()
        .filter(|&&r| y_true[r] == 1)
        .map(|&r| ranks[r])
        .sum();
    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn confusion_counts() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        assert_eq!(cm.matrix, [[1, 1], [1, 2]]);
        assert_abs_diff_eq!(cm.accuracy(), 0.6);
    }

    #[test]
    fn report_matches_hand_computation() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 1, 1, 1], &[0, 1, 1, 1, 0]);
        let report = ClassificationReport::from_confusion(&cm, ["Graduado", "Desistente"]);

        let graduado = &report.classes[0];
        assert_eq!(graduado.support, 2);
        assert_abs_diff_eq!(graduado.precision, 0.5);
        assert_abs_diff_eq!(graduado.recall, 0.5);

        let desistente = &report.classes[1];
        assert_abs_diff_eq!(desistente.precision, 2.0 / 3.0);
        assert_abs_diff_eq!(desistente.recall, 2.0 / 3.0);
        assert_abs_diff_eq!(report.macro_avg.recall, (0.5 + 2.0 / 3.0) / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(report.weighted_avg.recall, 0.6, epsilon = 1e-12);
        assert!(report.to_string().contains("Desistente"));
    }

    #[test]
    fn auc_of_perfect_and_reversed_scores() {
        let y = [0, 0, 1, 1];
        assert_abs_diff_eq!(roc_auc(&y, &[0.1, 0.2, 0.8, 0.9]).unwrap(), 1.0);
        assert_abs_diff_eq!(roc_auc(&y, &[0.9, 0.8, 0.2, 0.1]).unwrap(), 0.0);
    }

    #[test]
    fn auc_with_ties_and_single_class() {
        assert_abs_diff_eq!(roc_auc(&[0, 1], &[0.5, 0.5]).unwrap(), 0.5);
        assert_abs_diff_eq!(
            roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap(),
            0.75
        );
        assert_eq!(roc_auc(&[1, 1], &[0.2, 0.3]), None);
    }
}
