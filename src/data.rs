use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Deterministic input generator seeded for reproducible benchmarks.
pub struct InputGenerator {
    rng: StdRng,
}

impl InputGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// `count` values uniform in `[min, max]`.
    pub fn u32_range(&mut self, count: usize, min: u32, max: u32) -> Vec<u32> {
        (0..count).map(|_| self.rng.gen_range(min..=max)).collect()
    }

    pub fn i32_any(&mut self, count: usize) -> Vec<i32> {
        (0..count).map(|_| self.rng.gen::<i32>()).collect()
    }

    /// `count` values uniform in `[0, 1)`.
    pub fn f32_unit(&mut self, count: usize) -> Vec<f32> {
        (0..count).map(|_| self.rng.gen::<f32>()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_data() {
        let a = InputGenerator::new(239).i32_any(64);
        let b = InputGenerator::new(239).i32_any(64);
        assert_eq!(a, b);
        assert_ne!(a, InputGenerator::new(240).i32_any(64));
    }

    #[test]
    fn test_ranges() {
        let mut gen = InputGenerator::new(1);
        assert!(gen.u32_range(1000, 3, 7).iter().all(|v| (3..=7).contains(v)));
        assert!(gen.f32_unit(1000).iter().all(|v| (0.0..1.0).contains(v)));
    }
}
