//! Multi-label evaluation metrics.
//!
//! Metrics operate on flattened probability/target buffers laid out row-major
//! as `[num_samples * num_classes]`, the shape the evaluation loop collects
//! from the model. Provides element-wise binary accuracy at a fixed threshold
//! and per-class ROC AUC with a macro average, computed with the rank-sum
//! (Mann-Whitney) statistic so no explicit curve sweep is needed.

use std::cmp::Ordering;

/// Aggregated evaluation results for one dataset pass
#[derive(Debug, Clone)]
pub struct EvalMetrics {
    /// Mean multi-head binary cross-entropy loss
    pub loss: f64,
    /// Element-wise binary accuracy at threshold 0.5
    pub accuracy: f64,
    /// Macro-averaged ROC AUC over classes with both label values present
    pub macro_auc: Option<f64>,
    /// Per-class ROC AUC; `None` for degenerate classes
    pub per_class_auc: Vec<Option<f64>>,
    /// Number of samples evaluated
    pub num_samples: usize,
}

impl EvalMetrics {
    /// Compute metrics from flattened probabilities and binary targets
    pub fn from_predictions(
        probabilities: &[f32],
        targets: &[f32],
        num_classes: usize,
        loss: f64,
    ) -> Self {
        debug_assert_eq!(probabilities.len(), targets.len());

        let per_class_auc = per_class_auc(probabilities, targets, num_classes);
        let macro_auc = macro_average(&per_class_auc);
        let num_samples = if num_classes > 0 {
            probabilities.len() / num_classes
        } else {
            0
        };

        Self {
            loss,
            accuracy: element_accuracy(probabilities, targets, 0.5),
            macro_auc,
            per_class_auc,
            num_samples,
        }
    }
}

/// Element-wise binary accuracy: the fraction of (sample, class) cells whose
/// thresholded probability matches the target.
pub fn element_accuracy(probabilities: &[f32], targets: &[f32], threshold: f32) -> f64 {
    if probabilities.is_empty() {
        return 0.0;
    }

    let correct = probabilities
        .iter()
        .zip(targets)
        .filter(|(p, t)| (**p >= threshold) == (**t >= 0.5))
        .count();

    correct as f64 / probabilities.len() as f64
}

/// ROC AUC for one binary class via the rank-sum statistic.
///
/// Ties in the scores receive averaged ranks. Returns `None` when the class
/// has no positive or no negative sample, in which case the curve is
/// undefined.
pub fn roc_auc(scores: &[f32], labels: &[f32]) -> Option<f64> {
    let n = scores.len();
    let num_pos = labels.iter().filter(|&&l| l >= 0.5).count();
    let num_neg = n - num_pos;

    if num_pos == 0 || num_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| {
        scores[a]
            .partial_cmp(&scores[b])
            .unwrap_or(Ordering::Equal)
    });

    // Average ranks across tied scores
    let mut ranks = vec![0.0f64; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            ranks[order[k]] = avg_rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = labels
        .iter()
        .zip(&ranks)
        .filter(|(l, _)| **l >= 0.5)
        .map(|(_, r)| *r)
        .sum();

    let num_pos = num_pos as f64;
    let num_neg = num_neg as f64;
    Some((pos_rank_sum - num_pos * (num_pos + 1.0) / 2.0) / (num_pos * num_neg))
}

/// Per-class ROC AUC over a row-major `[num_samples * num_classes]` buffer
pub fn per_class_auc(
    probabilities: &[f32],
    targets: &[f32],
    num_classes: usize,
) -> Vec<Option<f64>> {
    if num_classes == 0 {
        return Vec::new();
    }

    let num_samples = probabilities.len() / num_classes;

    (0..num_classes)
        .map(|class| {
            let scores: Vec<f32> = (0..num_samples)
                .map(|row| probabilities[row * num_classes + class])
                .collect();
            let labels: Vec<f32> = (0..num_samples)
                .map(|row| targets[row * num_classes + class])
                .collect();
            roc_auc(&scores, &labels)
        })
        .collect()
}

/// Macro average over the defined per-class values
pub fn macro_average(per_class: &[Option<f64>]) -> Option<f64> {
    let defined: Vec<f64> = per_class.iter().filter_map(|v| *v).collect();

    if defined.is_empty() {
        None
    } else {
        Some(defined.iter().sum::<f64>() / defined.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_accuracy() {
        let probs = [0.9, 0.2, 0.6, 0.4];
        let targets = [1.0, 0.0, 0.0, 0.0];

        // 0.9->1 ok, 0.2->0 ok, 0.6->1 wrong, 0.4->0 ok
        assert!((element_accuracy(&probs, &targets, 0.5) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_element_accuracy_empty() {
        assert_eq!(element_accuracy(&[], &[], 0.5), 0.0);
    }

    #[test]
    fn test_roc_auc_perfect_ranking() {
        let scores = [0.1, 0.2, 0.8, 0.9];
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&scores, &labels), Some(1.0));
    }

    #[test]
    fn test_roc_auc_inverted_ranking() {
        let scores = [0.9, 0.8, 0.2, 0.1];
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&scores, &labels), Some(0.0));
    }

    #[test]
    fn test_roc_auc_ties_give_half_credit() {
        // All scores equal: AUC must be exactly 0.5
        let scores = [0.5, 0.5, 0.5, 0.5];
        let labels = [1.0, 0.0, 1.0, 0.0];
        let auc = roc_auc(&scores, &labels).unwrap();
        assert!((auc - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_roc_auc_degenerate() {
        assert_eq!(roc_auc(&[0.3, 0.7], &[1.0, 1.0]), None);
        assert_eq!(roc_auc(&[0.3, 0.7], &[0.0, 0.0]), None);
    }

    #[test]
    fn test_roc_auc_partial() {
        // One inversion among 1 pos * 3 neg pairs -> 2/3... check concretely:
        // pos score 0.6 beats negs 0.1 and 0.2, loses to 0.8 -> AUC = 2/3
        let scores = [0.1, 0.2, 0.8, 0.6];
        let labels = [0.0, 0.0, 0.0, 1.0];
        let auc = roc_auc(&scores, &labels).unwrap();
        assert!((auc - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_per_class_and_macro() {
        // Two samples, two classes. Class 0 perfectly ranked, class 1 all
        // positive (undefined).
        let probs = [0.9, 0.8, 0.1, 0.7];
        let targets = [1.0, 1.0, 0.0, 1.0];

        let per_class = per_class_auc(&probs, &targets, 2);
        assert_eq!(per_class.len(), 2);
        assert_eq!(per_class[0], Some(1.0));
        assert_eq!(per_class[1], None);

        assert_eq!(macro_average(&per_class), Some(1.0));
        assert_eq!(macro_average(&[None, None]), None);
    }

    #[test]
    fn test_eval_metrics_from_predictions() {
        let probs = [0.9, 0.1, 0.2, 0.8];
        let targets = [1.0, 0.0, 0.0, 1.0];

        let metrics = EvalMetrics::from_predictions(&probs, &targets, 2, 0.25);

        assert_eq!(metrics.num_samples, 2);
        assert_eq!(metrics.loss, 0.25);
        assert!((metrics.accuracy - 1.0).abs() < 1e-9);
        assert_eq!(metrics.per_class_auc.len(), 2);
    }
}
