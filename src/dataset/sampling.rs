//! Bounded-degree neighbor sampling.

use rand::seq::index;
use rand::Rng;

/// Truncates neighbor sets to at most `bound` entries.
///
/// A bound of zero keeps every neighbor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NeighborSampler {
    bound: usize,
}

impl NeighborSampler {
    /// Create a sampler with the given per-node bound.
    pub fn new(bound: usize) -> Self {
        Self { bound }
    }

    /// The configured bound (0 = unbounded).
    pub fn bound(&self) -> usize {
        self.bound
    }

    /// Whether truncation is active.
    pub fn is_bounded(&self) -> bool {
        self.bound > 0
    }

    /// Sample a neighbor set, uniformly without replacement when it exceeds the bound.
    ///
    /// The result is sorted so edge order only depends on the RNG stream.
    pub fn sample<R: Rng + ?Sized>(&self, candidates: &[usize], rng: &mut R) -> Vec<usize> {
        let mut chosen: Vec<usize> = if self.is_bounded() && candidates.len() > self.bound {
            index::sample(rng, candidates.len(), self.bound)
                .into_iter()
                .map(|i| candidates[i])
                .collect()
        } else {
            candidates.to_vec()
        };
        chosen.sort_unstable();
        chosen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_unbounded_keeps_everything() {
        let sampler = NeighborSampler::new(0);
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(sampler.sample(&[4, 1, 3], &mut rng), vec![1, 3, 4]);
    }

    #[test]
    fn test_bounded_truncates() {
        let sampler = NeighborSampler::new(3);
        let mut rng = StdRng::seed_from_u64(7);
        let candidates: Vec<usize> = (0..20).collect();
        let chosen = sampler.sample(&candidates, &mut rng);
        assert_eq!(chosen.len(), 3);
        assert!(chosen.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_sampling_is_deterministic_per_seed() {
        let sampler = NeighborSampler::new(5);
        let candidates: Vec<usize> = (100..200).collect();
        let a = sampler.sample(&candidates, &mut StdRng::seed_from_u64(42));
        let b = sampler.sample(&candidates, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_small_set_untouched_when_bounded() {
        let sampler = NeighborSampler::new(10);
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampler.sample(&[2, 9], &mut rng), vec![2, 9]);
    }
}
