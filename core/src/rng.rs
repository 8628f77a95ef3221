//! Deterministic random number generation.
//!
//! RULE: Nothing in the agent core may call any platform RNG.
//! All randomness flows through SeededRng instances derived either
//! from the configured training seed or from a stable text hash.
//!
//! Each consumer gets its own stream, seeded deterministically
//! from (master_seed XOR stream_index). This means:
//!   - Adding a new stream never changes existing streams.
//!   - Model training and embeddings are reproducible in isolation.

use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

/// A named, deterministic RNG for a single consumer.
pub struct SeededRng {
    pub name: &'static str,
    inner: Pcg64Mcg,
}

impl SeededRng {
    /// Create a stream RNG from the master seed and a stable
    /// stream index. The index must never change once assigned.
    pub fn new(master_seed: u64, stream_index: u64) -> Self {
        let derived_seed = master_seed ^ (stream_index.wrapping_mul(0x9e37_79b9_7f4a_7c15));
        Self {
            name: "unnamed",
            inner: Pcg64Mcg::seed_from_u64(derived_seed),
        }
    }

    /// Create an RNG seeded from text. Same text, same stream.
    pub fn from_text(text: &str) -> Self {
        Self {
            name: "text",
            inner: Pcg64Mcg::seed_from_u64(stable_hash(text)),
        }
    }

    pub fn for_stream(master_seed: u64, stream: RngStream) -> Self {
        Self::new(master_seed, stream as u64).with_name(stream.name())
    }

    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Roll a float in [0.0, 1.0).
    pub fn next_f64(&mut self) -> f64 {
        use rand::RngCore;
        let bits = self.inner.next_u64();
        (bits >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Draw a raw u64 (full range).
    pub fn next_u64(&mut self) -> u64 {
        use rand::RngCore;
        self.inner.next_u64()
    }

    /// Standard normal sample scaled to N(mean, std) via Box-Muller.
    pub fn normal(&mut self, mean: f64, std: f64) -> f64 {
        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std * z
    }

    /// Exponential sample with the given mean.
    pub fn exponential(&mut self, mean: f64) -> f64 {
        let u = self.next_f64().max(1e-12);
        -mean * u.ln()
    }

    /// Poisson sample (Knuth). Only used for small lambdas.
    pub fn poisson(&mut self, lambda: f64) -> u32 {
        let limit = (-lambda).exp();
        let mut k = 0u32;
        let mut p = 1.0;
        loop {
            p *= self.next_f64();
            if p <= limit {
                return k;
            }
            k += 1;
        }
    }

    /// Beta(2, 2) sample: the median of three uniforms.
    pub fn beta_2_2(&mut self) -> f64 {
        let mut draws = [self.next_f64(), self.next_f64(), self.next_f64()];
        draws.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        draws[1]
    }
}

/// 64-bit FNV-1a. Stable across processes and platforms, unlike
/// `std::collections::hash_map::DefaultHasher`.
pub fn stable_hash(text: &str) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    text.bytes()
        .fold(OFFSET, |hash, b| (hash ^ b as u64).wrapping_mul(PRIME))
}

/// Stable stream assignments.
/// NEVER reorder or remove entries. Reordering changes every stream's seed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u64)]
pub enum RngStream {
    Training = 0,
    // Append new streams here.
}

impl RngStream {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Training => "training",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let mut a = SeededRng::for_stream(42, RngStream::Training);
        let mut b = SeededRng::for_stream(42, RngStream::Training);
        for _ in 0..32 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn streams_are_independent() {
        let mut a = SeededRng::for_stream(42, RngStream::Training);
        let mut b = SeededRng::new(42, 1);
        assert_ne!(a.next_u64(), b.next_u64());
        assert_eq!(a.name, "training");
    }

    #[test]
    fn text_hash_is_stable() {
        assert_eq!(stable_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(stable_hash("enterprise"), stable_hash("enterprise"));
        assert_ne!(stable_hash("enterprise"), stable_hash("smb"));
    }

    #[test]
    fn samplers_stay_in_range() {
        let mut rng = SeededRng::for_stream(7, RngStream::Training);
        for _ in 0..1_000 {
            let b = rng.beta_2_2();
            assert!((0.0..1.0).contains(&b));
            assert!(rng.exponential(5.0) >= 0.0);
            assert!(rng.next_f64() < 1.0);
        }
        let mean = (0..5_000).map(|_| rng.poisson(2.0) as f64).sum::<f64>() / 5_000.0;
        assert!((mean - 2.0).abs() < 0.2, "poisson mean drifted: {mean}");
    }
}
