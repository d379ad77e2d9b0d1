//! Small numeric helpers shared by the factor models.

use ndarray::{Array1, Array2, ArrayView1};
use std::cmp::Ordering;

/// Descending by score, ties broken by lower index. NaN sorts last.
fn rank_order(scores: &ArrayView1<f32>, a: usize, b: usize) -> Ordering {
    let key = |i: usize| {
        let s = scores[i];
        if s.is_nan() {
            f32::NEG_INFINITY
        } else {
            s
        }
    };
    key(b).total_cmp(&key(a)).then_with(|| a.cmp(&b))
}

/// Indices of the `k` highest scores, best first.
///
/// Partial selection (quickselect) over the candidate set, then a full sort of the
/// selected prefix only. Indices rejected by `keep` never enter the selection.
pub fn top_k_indices<F>(scores: ArrayView1<f32>, k: usize, keep: F) -> Vec<usize>
where
    F: Fn(usize) -> bool,
{
    let mut candidates: Vec<usize> = (0..scores.len()).filter(|&i| keep(i)).collect();
    let k = k.min(candidates.len());
    if k == 0 {
        return Vec::new();
    }

    if k < candidates.len() {
        candidates.select_nth_unstable_by(k - 1, |&a, &b| rank_order(&scores, a, b));
        candidates.truncate(k);
    }
    candidates.sort_unstable_by(|&a, &b| rank_order(&scores, a, b));
    candidates
}

/// Solve `A x = b` for symmetric positive definite `A` via Cholesky (`A = L Lᵀ`).
///
/// Returns `None` when `A` is not square, dimensions disagree, or `A` is not positive
/// definite.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|j| l[[i, j]] * y[j]).sum();
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = ((i + 1)..n).map(|j| l[[j, i]] * x[j]).sum();
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_top_k_orders_descending() {
        let scores = array![0.1f32, 0.9, 0.5, 0.7, 0.3];
        assert_eq!(top_k_indices(scores.view(), 3, |_| true), vec![1, 3, 2]);
    }

    #[test]
    fn test_top_k_respects_filter_and_size() {
        let scores = array![0.1f32, 0.9, 0.5, 0.7];
        assert_eq!(top_k_indices(scores.view(), 10, |i| i != 1), vec![3, 2, 0]);
        assert!(top_k_indices(scores.view(), 0, |_| true).is_empty());
    }

    #[test]
    fn test_top_k_ties_and_nan() {
        let scores = array![0.5f32, f32::NAN, 0.5, 0.8];
        assert_eq!(top_k_indices(scores.view(), 4, |_| true), vec![3, 0, 2, 1]);
    }

    #[test]
    fn test_cholesky_solve() {
        // A = [[4, 2], [2, 3]], b = [2, 1] → x = [0.5, 0]
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();

        assert!((x[0] - 0.5).abs() < 1e-9);
        assert!(x[1].abs() < 1e-9);
    }

    #[test]
    fn test_cholesky_rejects_non_positive_definite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        let b = array![1.0, 1.0];
        assert!(cholesky_solve(&a, &b).is_none());

        let wrong_dim = array![1.0];
        assert!(cholesky_solve(&array![[1.0, 0.0], [0.0, 1.0]], &wrong_dim).is_none());
    }
}
