//! Class-weighted classification losses.

use crate::core::{Error, Result};
use ndarray::Array2;

/// Loss value together with its gradient w.r.t. the logits.
#[derive(Clone, Debug)]
pub struct LossOutput {
    pub value: f32,
    pub grad: Array2<f32>,
}

/// A classification loss over per-node logits.
pub trait LossFunction: Send + Sync {
    /// Scalar loss.
    fn loss(&self, logits: &Array2<f32>, labels: &[usize]) -> Result<f32>;

    /// Scalar loss and `dL/dlogits`.
    fn loss_and_grad(&self, logits: &Array2<f32>, labels: &[usize]) -> Result<LossOutput>;
}

/// "Balanced" class weights: `n / (n_present_classes * count_c)`.
///
/// Classes absent from `labels` get weight 0.
pub fn balanced_class_weights(labels: &[usize], num_classes: usize) -> Vec<f32> {
    let mut counts = vec![0usize; num_classes];
    for &y in labels {
        if y < num_classes {
            counts[y] += 1;
        }
    }
    let present = counts.iter().filter(|&&c| c > 0).count();
    let n = labels.len() as f32;
    counts
        .iter()
        .map(|&c| {
            if c == 0 {
                0.0
            } else {
                n / (present as f32 * c as f32)
            }
        })
        .collect()
}

/// Cross entropy with per-class weights and weighted-mean reduction.
#[derive(Clone, Debug)]
pub struct WeightedCrossEntropy {
    weights: Vec<f32>,
}

impl WeightedCrossEntropy {
    /// Create a loss with explicit class weights.
    pub fn new(weights: Vec<f32>) -> Self {
        Self { weights }
    }

    /// Create a loss weighted inversely to the class frequencies of `labels`.
    pub fn balanced(labels: &[usize], num_classes: usize) -> Self {
        Self::new(balanced_class_weights(labels, num_classes))
    }

    /// Uniform weights.
    pub fn unweighted(num_classes: usize) -> Self {
        Self::new(vec![1.0; num_classes])
    }

    /// Class weights.
    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    fn check(&self, logits: &Array2<f32>, labels: &[usize]) -> Result<()> {
        if logits.nrows() != labels.len() {
            return Err(Error::DataIntegrity(format!(
                "{} logit rows for {} labels",
                logits.nrows(),
                labels.len()
            )));
        }
        if logits.ncols() != self.weights.len() {
            return Err(Error::DataIntegrity(format!(
                "{} logit columns for {} class weights",
                logits.ncols(),
                self.weights.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&y| y >= self.weights.len()) {
            return Err(Error::DataIntegrity(format!("label {} has no class weight", bad)));
        }
        Ok(())
    }

    /// Per-row `(weight, -log p_y, softmax)`; softmax only when `with_probs`.
    fn rows(
        &self,
        logits: &Array2<f32>,
        labels: &[usize],
        with_probs: bool,
    ) -> (f32, f32, Option<Array2<f32>>) {
        let mut weighted_nll = 0.0f32;
        let mut total_weight = 0.0f32;
        let mut probs = with_probs.then(|| Array2::<f32>::zeros(logits.raw_dim()));

        for (i, row) in logits.outer_iter().enumerate() {
            let max = row.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let sum_exp: f32 = row.iter().map(|&v| (v - max).exp()).sum();
            let log_sum = max + sum_exp.ln();
            let y = labels[i];
            let w = self.weights[y];

            weighted_nll += w * (log_sum - row[y]);
            total_weight += w;

            if let Some(p) = probs.as_mut() {
                for (dst, &v) in p.row_mut(i).iter_mut().zip(row.iter()) {
                    *dst = (v - log_sum).exp();
                }
            }
        }
        (weighted_nll, total_weight, probs)
    }
}

impl LossFunction for WeightedCrossEntropy {
    fn loss(&self, logits: &Array2<f32>, labels: &[usize]) -> Result<f32> {
        self.check(logits, labels)?;
        let (nll, total_weight, _) = self.rows(logits, labels, false);
        Ok(if total_weight > 0.0 { nll / total_weight } else { 0.0 })
    }

    fn loss_and_grad(&self, logits: &Array2<f32>, labels: &[usize]) -> Result<LossOutput> {
        self.check(logits, labels)?;
        let (nll, total_weight, probs) = self.rows(logits, labels, true);
        let mut grad = probs.unwrap_or_else(|| Array2::zeros(logits.raw_dim()));
        if total_weight <= 0.0 {
            grad.fill(0.0);
            return Ok(LossOutput { value: 0.0, grad });
        }

        for (i, mut row) in grad.outer_iter_mut().enumerate() {
            let y = labels[i];
            row[y] -= 1.0;
            row *= self.weights[y] / total_weight;
        }
        Ok(LossOutput {
            value: nll / total_weight,
            grad,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_balanced_weights_favor_minority() {
        let labels = [0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
        let weights = balanced_class_weights(&labels, 2);
        assert!((weights[0] - 10.0 / 18.0).abs() < 1e-6);
        assert!((weights[1] - 5.0).abs() < 1e-6);
        assert!(weights[1] > weights[0]);
    }

    #[test]
    fn test_absent_class_gets_zero_weight() {
        let weights = balanced_class_weights(&[0, 0, 2], 4);
        assert_eq!(weights[1], 0.0);
        assert_eq!(weights[3], 0.0);
        assert!((weights[0] - 0.75).abs() < 1e-6);
        assert!((weights[2] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn test_uniform_logits_loss() {
        let loss = WeightedCrossEntropy::unweighted(4);
        let logits = Array2::zeros((3, 4));
        let value = loss.loss(&logits, &[0, 1, 3]).unwrap();
        assert!((value - 4.0f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn test_weighted_mean_reduction() {
        // With one sample per class, weights only rescale the mean.
        let logits = array![[2.0, 0.0], [0.0, 2.0]];
        let plain = WeightedCrossEntropy::unweighted(2).loss(&logits, &[0, 0]).unwrap();
        let weighted = WeightedCrossEntropy::new(vec![3.0, 1.0])
            .loss(&logits, &[0, 0])
            .unwrap();
        assert!((plain - weighted).abs() < 1e-6);
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let loss = WeightedCrossEntropy::new(vec![0.5, 2.0, 1.0]);
        let logits = array![[0.2, -0.4, 1.1], [1.5, 0.3, -0.7]];
        let labels = [1, 0];
        let out = loss.loss_and_grad(&logits, &labels).unwrap();

        let eps = 1e-3;
        for i in 0..2 {
            for j in 0..3 {
                let mut plus = logits.clone();
                plus[[i, j]] += eps;
                let mut minus = logits.clone();
                minus[[i, j]] -= eps;
                let numeric = (loss.loss(&plus, &labels).unwrap()
                    - loss.loss(&minus, &labels).unwrap())
                    / (2.0 * eps);
                assert!((numeric - out.grad[[i, j]]).abs() < 1e-3);
            }
        }
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let loss = WeightedCrossEntropy::unweighted(2);
        assert!(loss.loss(&Array2::zeros((2, 2)), &[0]).is_err());
        assert!(loss.loss(&Array2::zeros((1, 3)), &[0]).is_err());
        assert!(loss.loss(&Array2::zeros((1, 2)), &[5]).is_err());
    }

    #[test]
    fn test_large_logits_stay_finite() {
        let loss = WeightedCrossEntropy::unweighted(2);
        let out = loss
            .loss_and_grad(&array![[1000.0, -1000.0]], &[1])
            .unwrap();
        assert!(out.value.is_finite());
        assert!(out.grad.iter().all(|g| g.is_finite()));
    }
}
