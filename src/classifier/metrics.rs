//! Held-out evaluation metrics
//!
//! ROC-AUC uses the rank-sum formulation with tied scores sharing their
//! average rank. It is `None` when the labels contain a single class.
//! Precision and recall are 0.0, not undefined, when their denominator is
//! empty.

use serde::{Deserialize, Serialize};

/// Probability at or above which a row is predicted to churn.
pub const DECISION_THRESHOLD: f64 = 0.5;

/// Classification quality on the held-out split
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    pub roc_auc: Option<f64>,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

/// Score positive-class probabilities against labels.
pub fn evaluate(labels: &[bool], probabilities: &[f64]) -> Scores {
    let mut tp = 0usize;
    let mut fp = 0usize;
    let mut tn = 0usize;
    let mut fn_ = 0usize;

    for (&label, &p) in labels.iter().zip(probabilities) {
        let predicted = p >= DECISION_THRESHOLD;
        match (predicted, label) {
            (true, true) => tp += 1,
            (true, false) => fp += 1,
            (false, false) => tn += 1,
            (false, true) => fn_ += 1,
        }
    }

    let total = tp + fp + tn + fn_;
    Scores {
        roc_auc: roc_auc(labels, probabilities),
        accuracy: ratio(tp + tn, total),
        precision: ratio(tp, tp + fp),
        recall: ratio(tp, tp + fn_),
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Area under the ROC curve, `None` if either class is absent.
pub fn roc_auc(labels: &[bool], scores: &[f64]) -> Option<f64> {
    let n = labels.len().min(scores.len());
    let positives = labels[..n].iter().filter(|l| **l).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // 1-based ranks, ties get the mean of the ranks they span.
    let mut ranks = vec![0.0; n];
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &k in &order[i..=j] {
            ranks[k] = avg_rank;
        }
        i = j + 1;
    }

    let positive_rank_sum: f64 = (0..n).filter(|&k| labels[k]).map(|k| ranks[k]).sum();
    let p = positives as f64;
    let auc = (positive_rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64);
    Some(auc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_perfect_and_inverted_ranking() {
        let labels = [false, false, true, true];
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_ties_count_half() {
        let labels = [false, true];
        assert_eq!(roc_auc(&labels, &[0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn test_auc_matches_pairwise_definition() {
        let labels = [true, false, true, false, false, true];
        let scores = [0.7, 0.3, 0.4, 0.5, 0.1, 0.9];
        // Pairs (pos, neg) where pos > neg: 0.7>{.3,.5,.1}=3, 0.4>{.3,.1}=2, 0.9>all=3
        let expected = 8.0 / 9.0;
        assert!((roc_auc(&labels, &scores).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_auc_undefined() {
        assert_eq!(roc_auc(&[true, true], &[0.2, 0.9]), None);
    }

    #[test]
    fn test_precision_recall_zero_when_nothing_predicted() {
        let scores = evaluate(&[true, false, false], &[0.1, 0.2, 0.3]);
        assert_eq!(scores.precision, 0.0);
        assert_eq!(scores.recall, 0.0);
        assert!((scores.accuracy - 2.0 / 3.0).abs() < 1e-12);
    }
}
