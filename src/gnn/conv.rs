//! Deep propagation block with initial-residual and identity mapping.
//!
//! For layer `l` (1-based):
//! - `s = (1 - alpha) · A·h + alpha · h0`
//! - `z = (1 - beta_l) · s + beta_l · s·W`, with `beta_l = ln(theta / l + 1)`
//!
//! `alpha` re-injects the initial representation at every step; `beta_l`
//! shrinks the learned transform as depth grows.

use crate::gnn::adjacency::NormalizedAdjacency;
use ndarray::Array2;

/// Identity-mapping strength for a layer.
pub fn layer_beta(theta: f32, layer: usize) -> f32 {
    (theta / layer as f32 + 1.0).ln()
}

/// Activations a block keeps for its backward pass.
#[derive(Clone, Debug)]
pub struct BlockCache {
    /// Dropout mask applied to the block input
    pub mask: Option<Array2<f32>>,
    /// Blended propagation `s`
    pub mixed: Array2<f32>,
    /// Pre-activation output `z`
    pub pre_activation: Array2<f32>,
}

/// Gradients produced by a block's backward pass.
#[derive(Clone, Debug)]
pub struct BlockGrads {
    /// Gradient of the block weight
    pub weight: Array2<f32>,
    /// Gradient of the (dropped-out) block input
    pub input: Array2<f32>,
    /// Gradient flowing into the initial representation
    pub initial: Array2<f32>,
}

/// One propagation block bound to its weight.
#[derive(Clone, Copy, Debug)]
pub struct PropagationBlock<'a> {
    weight: &'a Array2<f32>,
    alpha: f32,
    beta: f32,
}

impl<'a> PropagationBlock<'a> {
    /// Bind a weight to layer `layer` (1-based).
    pub fn new(weight: &'a Array2<f32>, alpha: f32, theta: f32, layer: usize) -> Self {
        Self {
            weight,
            alpha,
            beta: layer_beta(theta, layer),
        }
    }

    /// Identity-mapping strength of this block.
    pub fn beta(&self) -> f32 {
        self.beta
    }

    /// Forward pass; returns `(s, z)`.
    pub fn forward(
        &self,
        adj: &NormalizedAdjacency,
        h: &Array2<f32>,
        h0: &Array2<f32>,
    ) -> (Array2<f32>, Array2<f32>) {
        let mut mixed = adj.propagate(h);
        mixed *= 1.0 - self.alpha;
        mixed.scaled_add(self.alpha, h0);

        let mut z = mixed.dot(self.weight);
        z *= self.beta;
        z.scaled_add(1.0 - self.beta, &mixed);
        (mixed, z)
    }

    /// Backward pass given `dL/dz`.
    pub fn backward(
        &self,
        adj: &NormalizedAdjacency,
        mixed: &Array2<f32>,
        dz: &Array2<f32>,
    ) -> BlockGrads {
        let mut weight = mixed.t().dot(dz);
        weight *= self.beta;

        let mut ds = dz.dot(&self.weight.t());
        ds *= self.beta;
        ds.scaled_add(1.0 - self.beta, dz);

        let initial = &ds * self.alpha;
        ds *= 1.0 - self.alpha;
        let input = adj.propagate_transpose(&ds);

        BlockGrads {
            weight,
            input,
            initial,
        }
    }
}
