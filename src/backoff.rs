//! Fibonacci timeout schedule.
//!
//! Attempt `n` (0-based) gets `base * fib[n + 2]`, so with the default
//! one-second base the first attempts wait 1, 2, 3, 5, 8 ... seconds. The
//! sequence grows by roughly the golden ratio instead of doubling.

use std::time::Duration;

/// Smallest accepted retry budget.
pub const MIN_RETRIES: u32 = 1;

/// Largest accepted retry budget. Attempt 17 reads `fib[19]`, the last
/// table entry; its timeout is 4181 s with the default base.
pub const MAX_RETRIES_LIMIT: u32 = 18;

const TABLE_LEN: usize = 20;

const DEFAULT_BASE_MS: u64 = 1_000;

static FIB: [u64; TABLE_LEN] = fibonacci();

const fn fibonacci() -> [u64; TABLE_LEN] {
    let mut table = [0u64; TABLE_LEN];
    table[1] = 1;
    let mut i = 2;
    while i < TABLE_LEN {
        table[i] = table[i - 1] + table[i - 2];
        i += 1;
    }
    table
}

/// Timeout for the given 0-based attempt with the default one-second base.
///
/// For attempts 0, 1, 2, 3 this returns 1000, 2000, 3000, 5000 ms.
///
/// # Panics
///
/// Panics if `attempt >= MAX_RETRIES_LIMIT`.
pub fn next_timeout(attempt: u32) -> Duration {
    TimeoutSchedule::default().timeout_for(attempt)
}

/// Per-attempt timeout schedule scaled by a base unit.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimeoutSchedule {
    base: Duration,
}

impl TimeoutSchedule {
    pub fn new(base: Duration) -> Self {
        Self { base }
    }

    pub fn from_millis(base_ms: u64) -> Self {
        Self::new(Duration::from_millis(base_ms))
    }

    pub fn base(&self) -> Duration {
        self.base
    }

    /// Timeout for the given 0-based attempt.
    ///
    /// # Panics
    ///
    /// Panics if `attempt >= MAX_RETRIES_LIMIT`. The engine never asks for
    /// more attempts than a validated retry budget allows.
    pub fn timeout_for(&self, attempt: u32) -> Duration {
        assert!(
            attempt < MAX_RETRIES_LIMIT,
            "attempt index {attempt} is outside the timeout table"
        );
        let factor = FIB[attempt as usize + 2];
        self.base.saturating_mul(factor as u32)
    }
}

impl Default for TimeoutSchedule {
    fn default() -> Self {
        Self::from_millis(DEFAULT_BASE_MS)
    }
}
