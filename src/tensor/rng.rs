/*!
Reproducible sampling: rather than holding one mutable RNG whose output depends on call order,
every sample reseeds a fresh [`ChaCha8Rng`] from `(seed, step_index)`, so the same step can be
resampled byte-identically regardless of how many other samples preceded it in the process.
*/

use rand::distributions::{Distribution, Uniform};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use statrs::distribution::Normal;

/// A deterministic sampling context bound to one base seed.
#[derive(Debug, Clone, Copy)]
pub struct DeterministicRng {
    seed: u64,
}

impl DeterministicRng {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    fn rng_for(&self, step_index: u64) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.seed ^ step_index.wrapping_mul(0x9E3779B97F4A7C15))
    }

    /// Normal sample for `step_index`, drawn from [`statrs::distribution::Normal`] over a
    /// freshly seeded [`ChaCha8Rng`]. A non-positive `std_dev` degenerates to the mean, since
    /// `Normal::new` rejects it.
    pub fn normal(&self, step_index: u64, mean: f32, std_dev: f32) -> f32 {
        if std_dev <= 0. {
            return mean;
        }
        let mut rng = self.rng_for(step_index);
        let dist = Normal::new(mean as f64, std_dev as f64).expect("validated std_dev > 0 above");
        dist.sample(&mut rng) as f32
    }

    /// Uniform sample in `[low, high)` for `step_index`.
    pub fn uniform(&self, step_index: u64, low: f32, high: f32) -> f32 {
        let mut rng = self.rng_for(step_index);
        Uniform::new(low, high).sample(&mut rng)
    }

    /// Sample a categorical class index from a probability vector that sums to ~1.
    pub fn categorical(&self, step_index: u64, probabilities: &[f32]) -> usize {
        let mut rng = self.rng_for(step_index);
        let draw: f32 = rng.gen_range(0.0..1.0);
        let mut cumulative = 0.;
        for (idx, p) in probabilities.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return idx;
            }
        }
        probabilities.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_and_step_reproduce_identical_samples() {
        let rng = DeterministicRng::new(1234);
        let a = rng.normal(7, 0., 1.);
        let b = rng.normal(7, 0., 1.);
        assert_eq!(a, b);
    }

    #[test]
    fn call_order_does_not_affect_a_given_step() {
        let rng = DeterministicRng::new(1234);
        let first_call = rng.normal(3, 0., 1.);
        let _ = rng.normal(9, 0., 1.);
        let second_call = rng.normal(3, 0., 1.);
        assert_eq!(first_call, second_call);
    }

    #[test]
    fn categorical_respects_cumulative_distribution() {
        let rng = DeterministicRng::new(42);
        let idx = rng.categorical(0, &[0., 1., 0.]);
        assert_eq!(idx, 1);
    }
}
