//! Symmetric-normalized adjacency with self loops.
//!
//! Row `u` holds `u` itself plus its out-neighbors, weighted by
//! `1 / sqrt(deg(u) * deg(v))` where `deg` counts the self loop.

use crate::dataset::Graph;
use ndarray::Array2;

/// Sparse propagation operator in compressed-row form.
#[derive(Clone, Debug)]
pub struct NormalizedAdjacency {
    offsets: Vec<usize>,
    cols: Vec<usize>,
    weights: Vec<f32>,
}

impl NormalizedAdjacency {
    /// Build the operator for a graph.
    pub fn from_graph(graph: &Graph) -> Self {
        let n = graph.num_nodes();
        let mut offsets = Vec::with_capacity(n + 1);
        let mut cols = Vec::with_capacity(graph.num_edges() + n);
        offsets.push(0);
        for u in 0..n {
            cols.push(u);
            cols.extend(graph.neighbors(u).iter().copied().filter(|&v| v != u));
            offsets.push(cols.len());
        }

        let degree: Vec<f32> = offsets.windows(2).map(|w| (w[1] - w[0]) as f32).collect();
        let mut weights = Vec::with_capacity(cols.len());
        for u in 0..n {
            for &v in &cols[offsets[u]..offsets[u + 1]] {
                weights.push(1.0 / (degree[u] * degree[v]).sqrt());
            }
        }

        Self {
            offsets,
            cols,
            weights,
        }
    }

    /// Number of rows.
    pub fn num_nodes(&self) -> usize {
        self.offsets.len() - 1
    }

    /// Number of stored entries (edges plus self loops).
    pub fn nnz(&self) -> usize {
        self.cols.len()
    }

    /// Compute `A · h`.
    pub fn propagate(&self, h: &Array2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros(h.raw_dim());
        for u in 0..self.num_nodes() {
            let mut row = out.row_mut(u);
            for k in self.offsets[u]..self.offsets[u + 1] {
                row.scaled_add(self.weights[k], &h.row(self.cols[k]));
            }
        }
        out
    }

    /// Compute `Aᵀ · g`, the adjoint used by the backward pass.
    pub fn propagate_transpose(&self, g: &Array2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros(g.raw_dim());
        for u in 0..self.num_nodes() {
            let src = g.row(u);
            for k in self.offsets[u]..self.offsets[u + 1] {
                out.row_mut(self.cols[k]).scaled_add(self.weights[k], &src);
            }
        }
        out
    }
}
