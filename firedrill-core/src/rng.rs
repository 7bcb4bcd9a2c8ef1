//! Deterministic random number generation with explicit state.
//!
//! Every random choice in simulate mode and in the resampling estimators is
//! drawn from a [`DrillRng`] whose state is threaded through the call, never
//! from process-global state. Parallel probe execution pre-assigns one
//! independent stream per (configuration, item) pair, so completion order
//! cannot perturb the draws and a fixed seed reproduces telemetry
//! bit-for-bit.

/// SplitMix64 generator. Small, fast, and good enough for telemetry shaping
/// and Monte Carlo resampling; not a cryptographic source.
#[derive(Debug, Clone)]
pub struct DrillRng {
    state: u64,
}

impl DrillRng {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Derive an independent stream for a named sub-purpose.
    ///
    /// Mixing the label through FNV-1a keeps streams order-stable: the
    /// stream for ("cfg-a", "item-3") is the same no matter which probes ran
    /// before it.
    pub fn stream(seed: u64, labels: &[&str]) -> Self {
        let mut hash = 0xcbf2_9ce4_8422_2325_u64; // FNV-1a offset basis
        for label in labels {
            for byte in label.as_bytes() {
                hash ^= u64::from(*byte);
                hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
            }
            // Separator so ["ab", "c"] and ["a", "bc"] diverge.
            hash ^= 0x1f;
            hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
        }
        Self::new(seed ^ hash)
    }

    /// Next raw 64-bit value (SplitMix64 mix function).
    pub fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9e37_79b9_7f4a_7c15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        z ^ (z >> 31)
    }

    /// Uniform f64 in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        // 53 mantissa bits.
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Uniform f64 in [lo, hi).
    pub fn next_range(&mut self, lo: f64, hi: f64) -> f64 {
        lo + (hi - lo) * self.next_f64()
    }

    /// Uniform u32 in [0, bound). Returns 0 for bound 0.
    pub fn next_below(&mut self, bound: u32) -> u32 {
        if bound == 0 {
            return 0;
        }
        (self.next_u64() % u64::from(bound)) as u32
    }

    /// Unit-exponential draw via inverse CDF.
    ///
    /// `next_f64` is in [0, 1), so `1 - u` is in (0, 1] and the log is
    /// always finite.
    pub fn next_exponential(&mut self) -> f64 {
        -(1.0 - self.next_f64()).ln()
    }

    /// Bernoulli trial with success probability `p`.
    pub fn next_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}
