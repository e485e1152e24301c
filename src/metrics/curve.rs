use std::collections::HashSet;

use rayon::prelude::*;

/// Mislabeled-sample detection curve.
///
/// `ranking` is a permutation of example indices sorted by descending
/// self-influence; `noisy_indexes` is the ground-truth set of corrupted
/// examples. Position i holds the cumulative count of true-noisy
/// examples among the first i+1 ranked indices, normalized by the total
/// noisy count when it is nonzero. With an empty noisy set the raw
/// all-zero cumulative sequence is returned unnormalized.
pub fn compute_curve(ranking: &[usize], noisy_indexes: &[usize]) -> Vec<f64> {
    let noisy: HashSet<usize> = noisy_indexes.iter().copied().collect();
    let mut found = 0u64;
    let mut curve = Vec::with_capacity(ranking.len());
    for idx in ranking {
        if noisy.contains(idx) {
            found += 1;
        }
        curve.push(found as f64);
    }
    let last = found as f64;
    if last != 0.0 {
        for v in curve.iter_mut() {
            *v /= last;
        }
    }
    curve
}

/// ROC summary of a detection curve: the mean of its values.
pub fn compute_roc(curve: &[f64]) -> f64 {
    if curve.is_empty() {
        return 0.0;
    }
    curve.iter().sum::<f64>() / curve.len() as f64
}

/// Elementwise mean over equal-length curves.
pub fn mean_curve(curves: &[Vec<f64>]) -> Vec<f64> {
    if curves.is_empty() {
        return Vec::new();
    }
    let n = curves[0].len();
    (0..n)
        .into_par_iter()
        .map(|i| curves.iter().map(|c| c[i]).sum::<f64>() / curves.len() as f64)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_shape_invariants() {
        let ranking: Vec<usize> = vec![4, 2, 0, 3, 1, 5];
        let noisy = vec![2, 5];
        let curve = compute_curve(&ranking, &noisy);
        assert_eq!(curve.len(), ranking.len());
        assert!(curve.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*curve.last().unwrap(), 1.0);
    }

    #[test]
    fn empty_noisy_set_leaves_the_zero_curve() {
        let ranking: Vec<usize> = (0..8).collect();
        let curve = compute_curve(&ranking, &[]);
        assert_eq!(curve, vec![0.0; 8]);
        assert_eq!(compute_roc(&curve), 0.0);
    }

    #[test]
    fn all_noisy_ranked_first_saturates_early() {
        let noisy = vec![0, 1, 2];
        let ranking: Vec<usize> = vec![0, 1, 2, 3, 4, 5, 6, 7];
        let curve = compute_curve(&ranking, &noisy);
        assert_eq!(curve[2], 1.0);
        assert!(curve[3..].iter().all(|&v| v == 1.0));
        assert!(curve[0] < 1.0);
    }

    #[test]
    fn all_noisy_ranked_last_stays_flat() {
        let noisy = vec![5, 6, 7];
        let ranking: Vec<usize> = vec![0, 1, 2, 3, 4, 5, 6, 7];
        let curve = compute_curve(&ranking, &noisy);
        assert!(curve[..5].iter().all(|&v| v == 0.0));
        assert_eq!(*curve.last().unwrap(), 1.0);
    }

    #[test]
    fn roc_is_the_curve_mean() {
        let curve = vec![0.0, 0.5, 1.0, 1.0];
        assert!((compute_roc(&curve) - 0.625).abs() < 1e-12);
        assert_eq!(compute_roc(&[]), 0.0);
    }

    #[test]
    fn mean_of_mean_curve_equals_mean_of_individual_rocs() {
        let curves = vec![
            vec![0.0, 0.25, 0.5, 1.0],
            vec![0.5, 0.5, 0.75, 1.0],
            vec![0.0, 0.0, 0.0, 0.0],
        ];
        let mean = mean_curve(&curves);
        let roc_of_mean = compute_roc(&mean);
        let mean_of_rocs =
            curves.iter().map(|c| compute_roc(c)).sum::<f64>() / curves.len() as f64;
        assert!((roc_of_mean - mean_of_rocs).abs() < 1e-12);
    }

    #[test]
    fn mean_curve_is_elementwise() {
        let curves = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        assert_eq!(mean_curve(&curves), vec![0.5, 0.5]);
        assert!(mean_curve(&[]).is_empty());
    }
}
