//! Deterministic RNG streams for synthesized values.
//!
//! Each `(symbol, price, stream)` triple maps to its own seeded `StdRng`.
//! Seeds are derived with BLAKE3 so the same inputs always yield the same
//! synthetic indicators and target/stop jitter, independent of call order.

use rand::rngs::StdRng;
use rand::SeedableRng;

/// Source of per-analysis RNG streams.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedSource {
    master_seed: u64,
}

impl SeedSource {
    pub fn new(master_seed: u64) -> Self {
        Self { master_seed }
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }

    /// Derive a sub-seed for a symbol at a given price and named stream.
    pub fn sub_seed(&self, symbol: &str, price: f64, stream: &str) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.master_seed.to_le_bytes());
        hasher.update(symbol.as_bytes());
        hasher.update(&price.to_bits().to_le_bytes());
        hasher.update(stream.as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }

    pub fn rng_for(&self, symbol: &str, price: f64, stream: &str) -> StdRng {
        StdRng::seed_from_u64(self.sub_seed(symbol, price, stream))
    }
}
