//! Seeded environment for simulation.

use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use consultoria_client::Environment;
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

/// Wall clock reading at simulation start (2023-11-14T22:13:20Z).
pub const SIM_EPOCH_SECS: u64 = 1_700_000_000;

/// [`Environment`] with seeded randomness and tokio's clock.
///
/// Under turmoil or a paused tokio runtime the clock is virtual, so two runs
/// with the same seed produce the same correlation keys and timestamps.
/// Clones share one RNG stream.
#[derive(Clone)]
pub struct SimEnv {
    rng: Arc<Mutex<ChaCha8Rng>>,
    started: Instant,
}

impl SimEnv {
    /// Environment seeded with zero.
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Environment seeded with `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self { rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))), started: Instant::now() }
    }
}

impl Default for SimEnv {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment for SimEnv {
    type Instant = Instant;

    fn now(&self) -> Self::Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner).fill_bytes(buffer);
    }

    fn wall_clock_secs(&self) -> u64 {
        SIM_EPOCH_SECS + self.started.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_stream() {
        let a = SimEnv::with_seed(7);
        let b = SimEnv::with_seed(7);

        assert_eq!(a.random_u64(), b.random_u64());
        assert_ne!(a.random_u64(), SimEnv::with_seed(8).random_u64());
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_follows_virtual_time() {
        let env = SimEnv::new();
        assert_eq!(env.wall_clock_secs(), SIM_EPOCH_SECS);

        env.sleep(Duration::from_secs(90)).await;
        assert_eq!(env.wall_clock_secs(), SIM_EPOCH_SECS + 90);
    }
}
