//! Random node partitioning for mini-batch traversal.
//!
//! Each traversal splits the node set into `num_parts` near-equal groups and
//! yields the node-induced subgraph of each group. Edges crossing groups are
//! dropped.

use crate::core::{Error, Result};
use crate::dataset::Graph;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// One mini-batch: an induced subgraph plus the parent ids of its nodes.
#[derive(Clone, Debug)]
pub struct Subgraph {
    /// Parent node id of each local node
    pub node_ids: Vec<usize>,
    /// The induced subgraph
    pub graph: Graph,
}

/// Restartable loader over random node partitions of a graph.
pub struct RandomNodeLoader {
    graph: Graph,
    num_parts: usize,
    shuffle: bool,
    rng: StdRng,
}

impl RandomNodeLoader {
    /// Create a loader. A fresh permutation is drawn per traversal when `shuffle` is set.
    pub fn new(graph: Graph, num_parts: usize, shuffle: bool, seed: u64) -> Result<Self> {
        if num_parts == 0 {
            return Err(Error::InvalidConfig("num_parts must be at least 1".to_string()));
        }
        if graph.num_nodes() == 0 {
            return Err(Error::EmptyDataset("cannot partition an empty graph".to_string()));
        }
        Ok(Self {
            graph,
            num_parts,
            shuffle,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// The underlying graph.
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Requested number of parts.
    pub fn num_parts(&self) -> usize {
        self.num_parts
    }

    /// Number of non-empty parts a traversal yields.
    pub fn effective_parts(&self) -> usize {
        self.num_parts.min(self.graph.num_nodes())
    }

    /// Start a traversal.
    pub fn iter(&mut self) -> PartitionIter<'_> {
        let mut order: Vec<usize> = (0..self.graph.num_nodes()).collect();
        if self.shuffle {
            order.shuffle(&mut self.rng);
        }
        PartitionIter {
            graph: &self.graph,
            order,
            parts: self.effective_parts(),
            part: 0,
            cursor: 0,
        }
    }
}

/// Lazy iterator over the parts of one traversal.
pub struct PartitionIter<'a> {
    graph: &'a Graph,
    order: Vec<usize>,
    parts: usize,
    part: usize,
    cursor: usize,
}

impl PartitionIter<'_> {
    fn part_len(&self, part: usize) -> usize {
        let n = self.order.len();
        n / self.parts + usize::from(part < n % self.parts)
    }
}

impl Iterator for PartitionIter<'_> {
    type Item = Result<Subgraph>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.part >= self.parts {
            return None;
        }
        let len = self.part_len(self.part);
        let node_ids = self.order[self.cursor..self.cursor + len].to_vec();
        self.cursor += len;
        self.part += 1;

        Some(
            self.graph
                .induced_subgraph(&node_ids)
                .map(|graph| Subgraph { node_ids, graph }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.parts - self.part;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PartitionIter<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn create_ring(n: usize) -> Graph {
        let features = Array2::from_shape_fn((n, 3), |(i, j)| (i + j) as f32);
        let labels = (0..n).map(|i| i % 2).collect();
        let edges = (0..n)
            .flat_map(|i| [(i, (i + 1) % n), ((i + 1) % n, i)])
            .collect();
        Graph::new(features, labels, edges, 2).unwrap()
    }

    fn collect_parts(loader: &mut RandomNodeLoader) -> Vec<Subgraph> {
        loader.iter().collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_partition_is_exact() {
        for (n, parts) in [(100, 64), (10, 3), (7, 7), (5, 1), (129, 64)] {
            let mut loader = RandomNodeLoader::new(create_ring(n), parts, true, 9).unwrap();
            let subgraphs = collect_parts(&mut loader);
            assert_eq!(subgraphs.len(), parts.min(n));

            let mut seen: Vec<usize> = subgraphs.iter().flat_map(|s| s.node_ids.clone()).collect();
            seen.sort_unstable();
            assert_eq!(seen, (0..n).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_parts_are_balanced() {
        let mut loader = RandomNodeLoader::new(create_ring(130), 64, false, 0).unwrap();
        let sizes: Vec<usize> = collect_parts(&mut loader)
            .iter()
            .map(|s| s.graph.num_nodes())
            .collect();
        assert_eq!(sizes.iter().sum::<usize>(), 130);
        assert!(sizes.iter().all(|&s| s == 2 || s == 3));
    }

    #[test]
    fn test_more_parts_than_nodes() {
        let mut loader = RandomNodeLoader::new(create_ring(5), 64, true, 1).unwrap();
        let subgraphs = collect_parts(&mut loader);
        assert_eq!(subgraphs.len(), 5);
        assert!(subgraphs.iter().all(|s| s.graph.num_nodes() == 1));
    }

    #[test]
    fn test_single_part_is_whole_graph() {
        let graph = create_ring(12);
        let mut loader = RandomNodeLoader::new(graph.clone(), 1, false, 0).unwrap();
        let subgraphs = collect_parts(&mut loader);
        assert_eq!(subgraphs.len(), 1);
        assert_eq!(subgraphs[0].graph, graph);
    }

    #[test]
    fn test_subgraph_features_follow_node_ids() {
        let graph = create_ring(20);
        let mut loader = RandomNodeLoader::new(graph.clone(), 4, true, 5).unwrap();
        for sub in collect_parts(&mut loader) {
            for (local, &global) in sub.node_ids.iter().enumerate() {
                assert_eq!(sub.graph.features.row(local), graph.features.row(global));
                assert_eq!(sub.graph.labels[local], graph.labels[global]);
            }
            for (u, v) in sub.graph.edges() {
                assert!(graph.neighbors(sub.node_ids[u]).contains(&sub.node_ids[v]));
            }
        }
    }

    #[test]
    fn test_shuffle_redraws_on_restart() {
        let mut loader = RandomNodeLoader::new(create_ring(200), 4, true, 3).unwrap();
        let first: Vec<usize> = collect_parts(&mut loader)[0].node_ids.clone();
        let second: Vec<usize> = collect_parts(&mut loader)[0].node_ids.clone();
        assert_ne!(first, second);
    }

    #[test]
    fn test_stable_without_shuffle() {
        let mut loader = RandomNodeLoader::new(create_ring(50), 4, false, 3).unwrap();
        let first: Vec<Vec<usize>> = collect_parts(&mut loader)
            .into_iter()
            .map(|s| s.node_ids)
            .collect();
        let second: Vec<Vec<usize>> = collect_parts(&mut loader)
            .into_iter()
            .map(|s| s.node_ids)
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(matches!(
            RandomNodeLoader::new(create_ring(4), 0, true, 0),
            Err(Error::InvalidConfig(_))
        ));
        let empty = Graph::new(Array2::zeros((0, 2)), vec![], vec![], 2).unwrap();
        assert!(matches!(
            RandomNodeLoader::new(empty, 4, true, 0),
            Err(Error::EmptyDataset(_))
        ));
    }
}
