//! Environment abstraction for deterministic testing.
//!
//! Decouples the session layer from system resources (time, randomness).
//! Production code uses [`SystemEnv`]; tests and the simulation harness
//! supply seeded or fixed environments so correlation keys and session
//! timestamps are reproducible.

use std::{future::Future, time::Duration};

/// Abstract environment providing time, randomness, and sleeping.
///
/// # Invariants
///
/// - `now()` never goes backwards
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Instant type used by this environment.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Sleep for `duration`.
    ///
    /// Used for request and connect deadlines. Must honour the runtime's
    /// clock so paused-time and simulated tests stay deterministic.
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;

    /// Fill `buffer` with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Seconds since the Unix epoch.
    fn wall_clock_secs(&self) -> u64;

    /// Generate a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }
}

/// Production environment using system time and the OS RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. Correlation key prefixes come from here and a
/// client without working entropy cannot keep them unpredictable.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemEnv;

impl SystemEnv {
    /// Create a new system environment.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Environment for SystemEnv {
    type Instant = tokio::time::Instant;

    fn now(&self) -> Self::Instant {
        tokio::time::Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer).expect("invariant: OS RNG failure is unrecoverable");
    }

    #[allow(clippy::expect_used)]
    fn wall_clock_secs(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("invariant: system clock is after Unix epoch (1970-01-01)")
            .as_secs()
    }
}
