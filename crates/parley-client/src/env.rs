//! Environment abstraction for deterministic testing.
//!
//! Decouples pipeline logic from system resources (wall clock, randomness).
//! Tests drive a manual clock and fixed entropy; production uses
//! [`SystemEnv`].

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Abstract environment providing time and randomness.
///
/// # Safety
///
/// Implementations MUST guarantee:
///
/// - `now_millis()` never goes backwards within one process
/// - `random_bytes()` uses cryptographically secure entropy in production
pub trait Environment: Clone + Send + Sync + 'static {
    /// Wall-clock time in milliseconds since the Unix epoch.
    ///
    /// Used to timestamp optimistic entries before the remote store assigns
    /// the authoritative creation time.
    fn now_millis(&self) -> u64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// 32 random bytes, e.g. as a seed for a fresh user key.
    fn random_seed(&self) -> [u8; 32] {
        let mut seed = [0u8; 32];
        self.random_bytes(&mut seed);
        seed
    }
}

/// Production environment using system time and cryptographic RNG.
///
/// # Panics
///
/// Panics if the OS RNG fails. A client without functioning randomness
/// cannot generate keys safely, and continuing would be worse than stopping.
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
    #[allow(clippy::disallowed_methods)]
    fn now_millis(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_millis() as u64)
    }

    #[allow(clippy::expect_used)]
    fn random_bytes(&self, buffer: &mut [u8]) {
        getrandom::fill(buffer)
            .expect("invariant: OS RNG failure is unrecoverable - keys cannot be generated");
    }
}

/// Deterministic environment with a manually advanced clock.
///
/// Randomness is a counter-driven byte stream seeded at construction, so two
/// environments with the same seed produce the same bytes. Clones share the
/// clock and the stream.
#[derive(Debug, Clone)]
pub struct ManualEnv {
    clock: Arc<AtomicU64>,
    stream: Arc<AtomicU64>,
}

impl ManualEnv {
    /// Start the clock at `start_millis` with the given randomness seed.
    pub fn new(start_millis: u64, seed: u64) -> Self {
        Self { clock: Arc::new(AtomicU64::new(start_millis)), stream: Arc::new(AtomicU64::new(seed)) }
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        self.clock.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Environment for ManualEnv {
    fn now_millis(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    fn random_bytes(&self, buffer: &mut [u8]) {
        for byte in buffer {
            let n = self.stream.fetch_add(1, Ordering::SeqCst);
            *byte = (n.wrapping_mul(6_364_136_223_846_793_005) >> 56) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_env_is_reproducible() {
        let a = ManualEnv::new(10, 42);
        let b = ManualEnv::new(10, 42);
        assert_eq!(a.random_seed(), b.random_seed());

        a.advance(5);
        assert_eq!(a.now_millis(), 15);
        assert_eq!(a.clone().now_millis(), 15);
    }

    #[test]
    fn system_env_clock_is_after_2020() {
        assert!(SystemEnv::new().now_millis() > 1_577_836_800_000);
    }

    #[test]
    fn system_env_random_bytes_are_random() {
        let env = SystemEnv::new();

        let mut bytes1 = [0u8; 32];
        let mut bytes2 = [0u8; 32];

        env.random_bytes(&mut bytes1);
        env.random_bytes(&mut bytes2);

        // Extremely unlikely to be equal if random
        assert_ne!(bytes1, bytes2, "Random bytes should differ");
    }
}
