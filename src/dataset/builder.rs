//! Graph dataset builder.
//!
//! Turns flow records into one graph per split. Two flows are neighbors when
//! they share a host address (as source or destination).

use crate::core::{Error, Result, SplitRole};
use crate::dataset::augmentation::{AugmentationConfig, MinorityAugmenter, NodeTable};
use crate::dataset::graph::{Graph, NodeOrigin};
use crate::dataset::record::{ClassMapping, FlowRecord};
use crate::dataset::sampling::NeighborSampler;
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use tracing::{debug, info, warn};

const AUGMENTATION_SALT: u64 = 0x4155_4755_4d45_4e54;

/// Below `DIRECT_DRAW_FACTOR * (bound + 1)` bucket entries the candidate list
/// is small enough to materialize.
const DIRECT_DRAW_FACTOR: usize = 4;

/// Configuration for the graph builder.
#[derive(Clone, Debug, PartialEq)]
pub struct BuilderConfig {
    /// Seed for neighbor sampling and augmentation
    pub seed: u64,
    /// Augmentation settings (used for the train split only)
    pub augmentation: AugmentationConfig,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            augmentation: AugmentationConfig::default(),
        }
    }
}

/// Shape every split must agree on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphSchema {
    pub feature_width: usize,
    pub num_classes: usize,
}

/// Builds schema-compatible graphs for the train, val and test splits.
pub struct GraphBuilder {
    config: BuilderConfig,
    mapping: ClassMapping,
    schema: Option<GraphSchema>,
}

impl GraphBuilder {
    /// Create a new builder over a label space.
    pub fn new(mapping: ClassMapping, config: BuilderConfig) -> Self {
        Self {
            config,
            mapping,
            schema: None,
        }
    }

    /// Pin the schema up front instead of taking it from the first split.
    pub fn with_schema(mut self, schema: GraphSchema) -> Self {
        self.schema = Some(schema);
        self
    }

    /// Schema fixed by the first successful build, if any.
    pub fn schema(&self) -> Option<GraphSchema> {
        self.schema
    }

    /// Class mapping used to resolve labels.
    pub fn mapping(&self) -> &ClassMapping {
        &self.mapping
    }

    /// Build the graph of one split.
    ///
    /// `augmentation` only takes effect for [`SplitRole::Train`].
    pub fn build(
        &mut self,
        records: &[FlowRecord],
        role: SplitRole,
        neighbor_bound: usize,
        augmentation: bool,
    ) -> Result<Graph> {
        let first = records
            .first()
            .ok_or_else(|| Error::EmptyDataset(format!("{} split has no records", role)))?;

        let feature_width = first.features.len();
        if feature_width == 0 {
            return Err(Error::DataIntegrity(format!(
                "{} records carry no features",
                role
            )));
        }
        let schema = GraphSchema {
            feature_width,
            num_classes: self.mapping.num_classes(),
        };
        self.check_schema(schema, role)?;

        let mut table = NodeTable::default();
        for (i, record) in records.iter().enumerate() {
            if record.features.len() != feature_width {
                return Err(Error::DataIntegrity(format!(
                    "{} record {} has {} features, expected {}",
                    role,
                    i,
                    record.features.len(),
                    feature_width
                )));
            }
            table.labels.push(self.mapping.class_of(&record.label)?);
            table.features.push(record.features.clone());
            table.origins.push(NodeOrigin::Record(i));
        }

        let sampler = NeighborSampler::new(neighbor_bound);
        let mut rng = StdRng::seed_from_u64(self.config.seed ^ role.seed_salt());
        let (neighbors, examined) = sample_neighbors(records, &sampler, &mut rng);
        debug!(split = %role, examined, "Neighbor candidates examined");
        table.neighbors = neighbors;

        if augmentation {
            if role == SplitRole::Train {
                self.config.augmentation.validate()?;
                let mut aug_rng = StdRng::seed_from_u64(
                    self.config.seed ^ role.seed_salt() ^ AUGMENTATION_SALT,
                );
                let summary = MinorityAugmenter::new(self.config.augmentation.clone())
                    .augment(&mut table, schema.num_classes, &sampler, &mut aug_rng);
                info!(
                    split = %role,
                    added = summary.total_added(),
                    "Minority-class augmentation applied"
                );
            } else {
                warn!(split = %role, "Augmentation requested for a non-train split; ignored");
            }
        }

        let graph = freeze(table, schema)?;
        info!(
            split = %role,
            nodes = graph.num_nodes(),
            edges = graph.num_edges(),
            max_degree = graph.max_out_degree(),
            "Built split graph"
        );
        Ok(graph)
    }

    fn check_schema(&mut self, schema: GraphSchema, role: SplitRole) -> Result<()> {
        match self.schema {
            Some(expected) if expected != schema => Err(Error::DataIntegrity(format!(
                "{} split has {} features / {} classes, expected {} / {}",
                role,
                schema.feature_width,
                schema.num_classes,
                expected.feature_width,
                expected.num_classes
            ))),
            Some(_) => Ok(()),
            None => {
                self.schema = Some(schema);
                Ok(())
            }
        }
    }
}

/// Neighbor set of every record, plus the number of bucket entries examined.
fn sample_neighbors<R: Rng + ?Sized>(
    records: &[FlowRecord],
    sampler: &NeighborSampler,
    rng: &mut R,
) -> (Vec<Vec<usize>>, usize) {
    let index = HostIndex::new(records);
    let mut examined = 0;
    let neighbors = (0..records.len())
        .map(|i| {
            let (chosen, work) = index.neighbors(i, sampler, &mut *rng);
            examined += work;
            chosen
        })
        .collect();
    (neighbors, examined)
}

/// Records grouped by host address. Buckets are sorted and duplicate-free.
struct HostIndex<'a> {
    records: &'a [FlowRecord],
    by_host: HashMap<&'a str, Vec<usize>>,
}

impl<'a> HostIndex<'a> {
    fn new(records: &'a [FlowRecord]) -> Self {
        let mut by_host: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            by_host.entry(record.src_addr.as_str()).or_default().push(i);
            if record.dst_addr != record.src_addr {
                by_host.entry(record.dst_addr.as_str()).or_default().push(i);
            }
        }
        Self { records, by_host }
    }

    fn bucket(&self, host: &str) -> &[usize] {
        self.by_host.get(host).map_or(&[][..], Vec::as_slice)
    }

    /// Source and destination buckets of record `i`.
    fn buckets(&self, i: usize) -> (&[usize], &[usize]) {
        let record = &self.records[i];
        let src = self.bucket(&record.src_addr);
        if record.dst_addr == record.src_addr {
            (src, &[][..])
        } else {
            (src, self.bucket(&record.dst_addr))
        }
    }

    /// Every other record sharing a host with record `i`, sorted.
    fn candidates(&self, i: usize) -> Vec<usize> {
        let (src, dst) = self.buckets(i);
        let mut candidates: Vec<usize> =
            src.iter().chain(dst).copied().filter(|&j| j != i).collect();
        candidates.sort_unstable();
        candidates.dedup();
        candidates
    }

    /// Neighbor set of record `i` and the bucket entries it cost.
    ///
    /// Large bounded neighborhoods are drawn straight from the buckets. A draw
    /// over the concatenated buckets counts only when it lands on the first
    /// occurrence of a record, so every distinct candidate is equally likely.
    fn neighbors<R: Rng + ?Sized>(
        &self,
        i: usize,
        sampler: &NeighborSampler,
        rng: &mut R,
    ) -> (Vec<usize>, usize) {
        let (src, dst) = self.buckets(i);
        let total = src.len() + dst.len();
        let bound = sampler.bound();
        if !sampler.is_bounded() || total <= DIRECT_DRAW_FACTOR * (bound + 1) {
            return (sampler.sample(&self.candidates(i), rng), total);
        }

        // The larger bucket alone holds more than 2 * bound other records.
        let mut chosen = Vec::with_capacity(bound);
        let mut draws = 0;
        while chosen.len() < bound {
            draws += 1;
            let pos = rng.gen_range(0..total);
            let j = if pos < src.len() {
                src[pos]
            } else {
                let j = dst[pos - src.len()];
                if src.binary_search(&j).is_ok() {
                    continue;
                }
                j
            };
            if j != i && !chosen.contains(&j) {
                chosen.push(j);
            }
        }
        chosen.sort_unstable();
        (chosen, draws)
    }
}

fn freeze(table: NodeTable, schema: GraphSchema) -> Result<Graph> {
    let n = table.len();
    let flat: Vec<f32> = table.features.into_iter().flatten().collect();
    let features = Array2::from_shape_vec((n, schema.feature_width), flat)
        .map_err(|e| Error::DataIntegrity(e.to_string()))?;
    let edges = table
        .neighbors
        .iter()
        .enumerate()
        .flat_map(|(u, neigh)| neigh.iter().map(move |&v| (u, v)))
        .collect();
    Graph::with_origins(features, table.labels, edges, table.origins, schema.num_classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::record::LabelMode;

    fn create_records(n: usize, width: usize) -> Vec<FlowRecord> {
        (0..n)
            .map(|i| {
                let label = match i % 10 {
                    0 => "Exploits",
                    1 => "Worms",
                    _ => "Normal",
                };
                FlowRecord::new(
                    &format!("10.0.0.{}", i % 3),
                    &format!("192.168.1.{}", i % 4),
                    (0..width).map(|j| (i * width + j) as f32 / 100.0).collect(),
                    label,
                )
            })
            .collect()
    }

    fn create_builder() -> GraphBuilder {
        GraphBuilder::new(
            ClassMapping::unsw_nb15(LabelMode::Multiclass),
            BuilderConfig::default(),
        )
    }

    #[test]
    fn test_build_shared_endpoint_edges() {
        let records = vec![
            FlowRecord::new("a", "b", vec![1.0], "Normal"),
            FlowRecord::new("b", "c", vec![2.0], "Normal"),
            FlowRecord::new("d", "e", vec![3.0], "Worms"),
        ];
        let graph = create_builder()
            .build(&records, SplitRole::Train, 0, false)
            .unwrap();
        assert_eq!(graph.neighbors(0), &[1]);
        assert_eq!(graph.neighbors(1), &[0]);
        assert!(graph.neighbors(2).is_empty());
        assert_eq!(graph.labels, vec![0, 0, 9]);
    }

    #[test]
    fn test_neighbor_bound_caps_out_degree() {
        let records = create_records(200, 4);
        let mut builder = create_builder();
        let unbounded = builder.build(&records, SplitRole::Val, 0, false).unwrap();
        assert!(unbounded.max_out_degree() > 5);

        for k in [1, 3, 5] {
            let graph = builder.build(&records, SplitRole::Val, k, false).unwrap();
            assert!(graph.max_out_degree() <= k);
            assert_eq!(graph.num_nodes(), 200);
        }
    }

    #[test]
    fn test_build_is_reproducible() {
        let records = create_records(100, 3);
        let a = create_builder()
            .build(&records, SplitRole::Train, 4, true)
            .unwrap();
        let b = create_builder()
            .build(&records, SplitRole::Train, 4, true)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_augmentation_only_on_train() {
        let records = create_records(120, 3);
        let mut builder = create_builder();

        let train_plain = builder.build(&records, SplitRole::Train, 3, false).unwrap();
        let train_aug = builder.build(&records, SplitRole::Train, 3, true).unwrap();
        assert!(train_aug.num_nodes() > train_plain.num_nodes());
        assert!(train_aug.synthetic_count() > 0);
        assert!(train_aug.max_out_degree() <= 3);

        for role in [SplitRole::Val, SplitRole::Test] {
            let plain = builder.build(&records, role, 3, false).unwrap();
            let flagged = builder.build(&records, role, 3, true).unwrap();
            assert_eq!(plain, flagged);
            assert_eq!(flagged.synthetic_count(), 0);
        }
    }

    #[test]
    fn test_augmentation_never_removes_majority() {
        let records = create_records(120, 3);
        let mut builder = create_builder();
        let plain = builder.build(&records, SplitRole::Train, 0, false).unwrap();
        let aug = builder.build(&records, SplitRole::Train, 0, true).unwrap();
        let before = plain.class_counts();
        let after = aug.class_counts();
        assert_eq!(before[0], after[0]);
        assert!(after.iter().zip(before.iter()).all(|(a, b)| a >= b));
    }

    #[test]
    fn test_schema_mismatch_across_splits() {
        let mut builder = create_builder();
        builder
            .build(&create_records(10, 4), SplitRole::Train, 0, false)
            .unwrap();
        let err = builder
            .build(&create_records(10, 5), SplitRole::Test, 0, false)
            .unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_ragged_records_rejected() {
        let records = vec![
            FlowRecord::new("a", "b", vec![1.0, 2.0], "Normal"),
            FlowRecord::new("a", "c", vec![1.0], "Normal"),
        ];
        let err = create_builder()
            .build(&records, SplitRole::Train, 0, false)
            .unwrap_err();
        assert!(matches!(err, Error::DataIntegrity(_)));
    }

    #[test]
    fn test_bounded_sampling_work_is_linear() {
        let n = 3000;
        let records: Vec<FlowRecord> = (0..n)
            .map(|i| {
                FlowRecord::new(
                    &format!("10.{}.{}.1", i / 250, i % 250),
                    "149.171.126.6",
                    vec![i as f32],
                    "Normal",
                )
            })
            .collect();
        let mut rng = StdRng::seed_from_u64(42);
        let (neighbors, examined) =
            sample_neighbors(&records, &NeighborSampler::new(2), &mut rng);

        assert_eq!(neighbors.len(), n);
        for (i, neigh) in neighbors.iter().enumerate() {
            assert_eq!(neigh.len(), 2);
            assert!(!neigh.contains(&i));
            assert!(neigh[0] < neigh[1]);
        }
        assert!(examined < 10 * n, "examined {} entries", examined);
    }

    #[test]
    fn test_direct_draw_covers_both_buckets() {
        // record 0 shares its source with 1..=20 and its destination with 21..=40
        let mut records = vec![FlowRecord::new("a", "b", vec![0.0], "Normal")];
        for i in 1..=20 {
            records.push(FlowRecord::new("a", &format!("x{}", i), vec![i as f32], "Normal"));
        }
        for i in 21..=40 {
            records.push(FlowRecord::new(&format!("y{}", i), "b", vec![i as f32], "Normal"));
        }
        let index = HostIndex::new(&records);
        assert_eq!(index.candidates(0), (1..=40).collect::<Vec<_>>());

        let sampler = NeighborSampler::new(3);
        let mut rng = StdRng::seed_from_u64(7);
        let mut seen_src = false;
        let mut seen_dst = false;
        for _ in 0..200 {
            let (chosen, _) = index.neighbors(0, &sampler, &mut rng);
            assert_eq!(chosen.len(), 3);
            assert!(chosen.iter().all(|&j| (1..=40).contains(&j)));
            seen_src |= chosen.iter().any(|&j| j <= 20);
            seen_dst |= chosen.iter().any(|&j| j > 20);
        }
        assert!(seen_src && seen_dst);
    }

    #[test]
    fn test_empty_split_rejected() {
        let err = create_builder()
            .build(&[], SplitRole::Val, 0, false)
            .unwrap_err();
        assert!(matches!(err, Error::EmptyDataset(_)));
    }
}
