//! Seeded pseudo-random decisions for scenario runs.
//!
//! A small multiplicative generator keeps the harness off platform entropy:
//! one seed, one decision stream, on every platform. A failing scenario is
//! replayed by passing the same seed again.

#![allow(clippy::missing_const_for_fn)]

/// Deterministic generator behind every simulated decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Create a generator from a seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Next raw value.
    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state
    }

    /// Next value in `[0, upper_exclusive)`. A zero bound yields zero.
    #[must_use]
    pub fn next_bounded(&mut self, upper_exclusive: u64) -> u64 {
        if upper_exclusive == 0 {
            return 0;
        }
        self.next_u64() % upper_exclusive
    }

    /// Bernoulli trial with an integer percentage. Zero never hits and
    /// anything from one hundred up always does.
    #[must_use]
    pub fn hit_rate_percent(&mut self, percent: u8) -> bool {
        if percent == 0 {
            return false;
        }
        if percent >= 100 {
            return true;
        }
        self.next_bounded(100) < u64::from(percent)
    }

    /// A uniformly chosen index into a collection of `len` elements, or
    /// `None` when there is nothing to choose from.
    #[must_use]
    pub fn pick_index(&mut self, len: usize) -> Option<usize> {
        if len == 0 {
            return None;
        }
        let bound = u64::try_from(len).unwrap_or(u64::MAX);
        usize::try_from(self.next_bounded(bound)).ok()
    }
}
