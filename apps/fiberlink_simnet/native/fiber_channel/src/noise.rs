//! Seedable Gaussian sample generator
//!
//! Uses Box-Muller transform for Gaussian samples. Shared by the fiber
//! noise and the transmitter's exploration perturbation.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::f64::consts::PI;

/// Standard-normal generator with a private ChaCha stream
#[derive(Debug, Clone)]
pub struct NoiseGenerator {
    /// Internal RNG
    rng: ChaCha8Rng,

    /// Cached second sample from Box-Muller
    cached: Option<f64>,
}

impl NoiseGenerator {
    /// Derive a generator from a parent stream
    pub fn new(seed_rng: &mut ChaCha8Rng) -> Self {
        let seed: u64 = seed_rng.gen();
        Self::from_seed(seed)
    }

    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            cached: None,
        }
    }

    /// Seed from OS entropy
    pub fn from_entropy() -> Self {
        Self {
            rng: ChaCha8Rng::from_entropy(),
            cached: None,
        }
    }

    /// Next N(0, 1) sample
    pub fn next_standard(&mut self) -> f64 {
        if let Some(cached) = self.cached.take() {
            return cached;
        }

        let u1: f64 = self.rng.gen();
        let u2: f64 = self.rng.gen();

        // Avoid log(0)
        let u1 = u1.max(1e-300);

        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        self.cached = Some(r * theta.sin());
        r * theta.cos()
    }

    /// Next N(0, std_dev²) sample
    #[inline]
    pub fn next_sample(&mut self, std_dev: f64) -> f64 {
        self.next_standard() * std_dev
    }

    /// Add N(0, std_dev²) to every element of `values`
    pub fn perturb<'a, I>(&mut self, values: I, std_dev: f64)
    where
        I: IntoIterator<Item = &'a mut f64>,
    {
        if std_dev == 0.0 {
            return;
        }
        for v in values {
            *v += self.next_sample(std_dev);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_statistics() {
        let mut noise = NoiseGenerator::from_seed(42);

        let n = 10000;
        let samples: Vec<f64> = (0..n).map(|_| noise.next_sample(1.0)).collect();

        let mean: f64 = samples.iter().sum::<f64>() / n as f64;
        assert!(mean.abs() < 0.1, "Mean {} should be close to 0", mean);

        let variance: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
        assert!((variance - 1.0).abs() < 0.1, "Variance {} should be close to 1", variance);
    }

    #[test]
    fn test_noise_deterministic() {
        let mut rng1 = ChaCha8Rng::seed_from_u64(42);
        let mut rng2 = ChaCha8Rng::seed_from_u64(42);

        let mut noise1 = NoiseGenerator::new(&mut rng1);
        let mut noise2 = NoiseGenerator::new(&mut rng2);

        for _ in 0..100 {
            assert_eq!(noise1.next_sample(0.5), noise2.next_sample(0.5));
        }
    }

    #[test]
    fn test_noise_is_gaussian() {
        let mut noise = NoiseGenerator::from_seed(7);

        let num_samples = 100000usize;
        let samples: Vec<f64> = (0..num_samples).map(|_| noise.next_standard()).collect();

        let mean: f64 = samples.iter().sum::<f64>() / num_samples as f64;
        let std: f64 = (samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>()
            / num_samples as f64)
            .sqrt();

        let within_1sigma = samples.iter().filter(|&x| (x - mean).abs() < std).count() as f64
            / num_samples as f64;
        let within_2sigma = samples.iter().filter(|&x| (x - mean).abs() < 2.0 * std).count()
            as f64
            / num_samples as f64;

        assert!((within_1sigma - 0.683).abs() < 0.02, "1σ coverage {}", within_1sigma);
        assert!((within_2sigma - 0.954).abs() < 0.01, "2σ coverage {}", within_2sigma);
    }

    #[test]
    fn test_std_dev_scaling() {
        for &std_dev in &[0.01, 0.5, 3.0] {
            let mut noise = NoiseGenerator::from_seed(42);
            let n = 50000usize;
            let samples: Vec<f64> = (0..n).map(|_| noise.next_sample(std_dev)).collect();
            let mean: f64 = samples.iter().sum::<f64>() / n as f64;
            let variance: f64 = samples.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n as f64;
            let expected = std_dev * std_dev;
            assert!(
                (variance - expected).abs() / expected < 0.1,
                "For std={}, measured variance={}",
                std_dev,
                variance
            );
        }
    }

    #[test]
    fn test_perturb_zero_std_is_identity() {
        let mut noise = NoiseGenerator::from_seed(1);
        let mut values = vec![1.0, -2.0, 3.5];
        noise.perturb(values.iter_mut(), 0.0);
        assert_eq!(values, vec![1.0, -2.0, 3.5]);
    }

    #[test]
    fn test_noise_numerical_stability() {
        let mut noise = NoiseGenerator::from_seed(42);
        let bad = (0..1_000_000usize)
            .map(|_| noise.next_standard())
            .filter(|s| !s.is_finite())
            .count();
        assert_eq!(bad, 0, "Found {} non-finite values", bad);
    }
}
