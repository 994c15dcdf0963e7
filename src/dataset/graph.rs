//! Attributed graph of flow nodes.
//!
//! Adjacency is stored compressed by source node: `neighbors(u)` is the
//! out-neighbor list of `u`, i.e. the nodes `u` aggregates from.

use crate::core::{Error, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where a node came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeOrigin {
    /// Built from the record at this index
    Record(usize),
    /// Synthesized from a minority-class parent node
    Synthetic { parent: usize },
}

/// A node-classification graph for a single split.
#[derive(Clone, Debug, PartialEq)]
pub struct Graph {
    /// Node feature matrix (N x F)
    pub features: Array2<f32>,
    /// Class index per node
    pub labels: Vec<usize>,
    /// Node provenance
    pub origins: Vec<NodeOrigin>,
    /// Size of the label space
    pub num_classes: usize,
    offsets: Vec<usize>,
    targets: Vec<usize>,
}

impl Graph {
    /// Create a graph from features, labels and directed `(node, neighbor)` edges.
    pub fn new(
        features: Array2<f32>,
        labels: Vec<usize>,
        edges: Vec<(usize, usize)>,
        num_classes: usize,
    ) -> Result<Self> {
        let origins = (0..labels.len()).map(NodeOrigin::Record).collect();
        Self::with_origins(features, labels, edges, origins, num_classes)
    }

    /// Create a graph with explicit node provenance.
    pub fn with_origins(
        features: Array2<f32>,
        labels: Vec<usize>,
        mut edges: Vec<(usize, usize)>,
        origins: Vec<NodeOrigin>,
        num_classes: usize,
    ) -> Result<Self> {
        let n = features.nrows();
        if labels.len() != n || origins.len() != n {
            return Err(Error::DataIntegrity(format!(
                "{} feature rows, {} labels, {} origins",
                n,
                labels.len(),
                origins.len()
            )));
        }
        if let Some(&bad) = labels.iter().find(|&&y| y >= num_classes) {
            return Err(Error::DataIntegrity(format!(
                "label {} outside label space of {} classes",
                bad, num_classes
            )));
        }
        if let Some(&(u, v)) = edges.iter().find(|&&(u, v)| u >= n || v >= n) {
            return Err(Error::DataIntegrity(format!(
                "edge ({}, {}) references a node outside 0..{}",
                u, v, n
            )));
        }

        edges.sort_unstable();
        edges.dedup();

        let mut offsets = vec![0usize; n + 1];
        for &(u, _) in &edges {
            offsets[u + 1] += 1;
        }
        for i in 0..n {
            offsets[i + 1] += offsets[i];
        }
        let targets = edges.into_iter().map(|(_, v)| v).collect();

        Ok(Self {
            features,
            labels,
            origins,
            num_classes,
            offsets,
            targets,
        })
    }

    /// Number of nodes.
    pub fn num_nodes(&self) -> usize {
        self.labels.len()
    }

    /// Number of directed edges.
    pub fn num_edges(&self) -> usize {
        self.targets.len()
    }

    /// Feature width.
    pub fn feature_width(&self) -> usize {
        self.features.ncols()
    }

    /// Out-neighbors of a node.
    pub fn neighbors(&self, node: usize) -> &[usize] {
        &self.targets[self.offsets[node]..self.offsets[node + 1]]
    }

    /// Out-degree of a node.
    pub fn out_degree(&self, node: usize) -> usize {
        self.offsets[node + 1] - self.offsets[node]
    }

    /// Largest out-degree over all nodes.
    pub fn max_out_degree(&self) -> usize {
        (0..self.num_nodes())
            .map(|u| self.out_degree(u))
            .max()
            .unwrap_or(0)
    }

    /// Iterate directed edges as `(node, neighbor)` pairs.
    pub fn edges(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.num_nodes()).flat_map(move |u| self.neighbors(u).iter().map(move |&v| (u, v)))
    }

    /// Node count per class.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.num_classes];
        for &y in &self.labels {
            counts[y] += 1;
        }
        counts
    }

    /// Number of synthetic nodes.
    pub fn synthetic_count(&self) -> usize {
        self.origins
            .iter()
            .filter(|o| matches!(o, NodeOrigin::Synthetic { .. }))
            .count()
    }

    /// Node-induced subgraph over `nodes`; local node `i` is `nodes[i]`.
    ///
    /// Edges with an endpoint outside `nodes` are dropped.
    pub fn induced_subgraph(&self, nodes: &[usize]) -> Result<Graph> {
        let local: HashMap<usize, usize> =
            nodes.iter().enumerate().map(|(i, &u)| (u, i)).collect();

        let mut edges = Vec::new();
        for (i, &u) in nodes.iter().enumerate() {
            for v in self.neighbors(u) {
                if let Some(&j) = local.get(v) {
                    edges.push((i, j));
                }
            }
        }

        Graph::with_origins(
            self.features.select(Axis(0), nodes),
            nodes.iter().map(|&u| self.labels[u]).collect(),
            edges,
            nodes.iter().map(|&u| self.origins[u]).collect(),
            self.num_classes,
        )
    }
}

impl std::fmt::Display for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Graph(x=[{}, {}], edge_index=[2, {}], y=[{}], classes={})",
            self.num_nodes(),
            self.feature_width(),
            self.num_edges(),
            self.num_nodes(),
            self.num_classes
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn create_test_graph() -> Graph {
        let features = array![[0.0, 1.0], [1.0, 0.0], [1.0, 1.0], [0.5, 0.5]];
        Graph::new(
            features,
            vec![0, 1, 0, 1],
            vec![(0, 1), (1, 0), (1, 2), (2, 3), (3, 0), (1, 2)],
            2,
        )
        .unwrap()
    }

    #[test]
    fn test_graph_creation() {
        let graph = create_test_graph();
        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_edges(), 5); // duplicate (1, 2) collapsed
        assert_eq!(graph.feature_width(), 2);
        assert_eq!(graph.neighbors(1), &[0, 2]);
        assert_eq!(graph.max_out_degree(), 2);
        assert_eq!(graph.class_counts(), vec![2, 2]);
    }

    #[test]
    fn test_graph_rejects_bad_label() {
        let err = Graph::new(array![[1.0], [2.0]], vec![0, 3], vec![], 2).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_graph_rejects_dangling_edge() {
        let err = Graph::new(array![[1.0], [2.0]], vec![0, 1], vec![(0, 5)], 2).unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_induced_subgraph_drops_crossing_edges() {
        let graph = create_test_graph();
        let sub = graph.induced_subgraph(&[1, 2]).unwrap();
        assert_eq!(sub.num_nodes(), 2);
        assert_eq!(sub.labels, vec![1, 0]);
        // Only 1 -> 2 survives, as local 0 -> 1.
        assert_eq!(sub.edges().collect::<Vec<_>>(), vec![(0, 1)]);
        assert_eq!(sub.origins, vec![NodeOrigin::Record(1), NodeOrigin::Record(2)]);
    }

    #[test]
    fn test_display() {
        let graph = create_test_graph();
        assert_eq!(
            graph.to_string(),
            "Graph(x=[4, 2], edge_index=[2, 5], y=[4], classes=2)"
        );
    }
}
