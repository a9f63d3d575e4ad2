//! In-kernel randomness.
//!
//! The population shares a single `u32` seed. At the start of a
//! generation each worker loads it, mixes in its own index and then draws
//! from a private xorshift32 stream. When the worker finishes it stores
//! its final state back into the shared seed. Concurrent stores race and
//! the last writer wins; the stream quality across workers comes from the
//! index mixing, not from the shared update.

use std::sync::atomic::{AtomicU32, Ordering};

const GOLDEN_GAMMA: u32 = 0x9e37_79b9;
const ZERO_STATE_REPLACEMENT: u32 = 0x6d2b_79f5;

/// 32-bit finalizer (lowbias32).
pub fn mix32(value: u32) -> u32 {
    let mut x = value;
    x ^= x >> 16;
    x = x.wrapping_mul(0x7feb_352d);
    x ^= x >> 15;
    x = x.wrapping_mul(0x846c_a68b);
    x ^= x >> 16;
    x
}

/// Per-worker xorshift32 stream derived from the shared seed.
#[derive(Debug, Clone)]
pub struct WorkerRng {
    state: u32,
}

impl WorkerRng {
    pub fn new(shared_seed: u32, worker: u32) -> Self {
        let state = mix32(shared_seed ^ worker.wrapping_mul(GOLDEN_GAMMA));
        Self {
            state: if state == 0 {
                ZERO_STATE_REPLACEMENT
            } else {
                state
            },
        }
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }

    /// Uniform integer in `0..n`. `n` must be non-zero.
    pub fn below(&mut self, n: u32) -> u32 {
        self.next_u32() % n
    }

    /// Uniform float in `[0, 1)` with 24 bits of precision.
    pub fn next_f32(&mut self) -> f32 {
        (self.next_u32() >> 8) as f32 * (1.0 / 16_777_216.0)
    }

    /// Returns `true` with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }

    /// Current state, written back to the shared seed.
    pub fn state(&self) -> u32 {
        self.state
    }
}

/// The shared seed as seen by host-side workers.
///
/// Accesses are relaxed atomic loads and stores, matching the kernel's
/// `atomicLoad`/`atomicStore`: there is no read-modify-write, so
/// concurrent workers may overwrite each other's state.
#[derive(Debug)]
pub struct SharedSeed(AtomicU32);

impl SharedSeed {
    pub fn new(seed: u32) -> Self {
        Self(AtomicU32::new(seed))
    }

    pub fn load(&self) -> u32 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn store(&self, state: u32) {
        self.0.store(state, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workers_get_distinct_streams() {
        let mut a = WorkerRng::new(12345, 0);
        let mut b = WorkerRng::new(12345, 1);
        let xs: Vec<u32> = (0..8).map(|_| a.next_u32()).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.next_u32()).collect();
        assert_ne!(xs, ys);
    }

    #[test]
    fn test_same_inputs_same_stream() {
        let mut a = WorkerRng::new(7, 3);
        let mut b = WorkerRng::new(7, 3);
        for _ in 0..100 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn test_state_never_zero() {
        for seed in 0..1000u32 {
            let mut rng = WorkerRng::new(seed, seed.wrapping_mul(31));
            for _ in 0..10 {
                assert_ne!(rng.next_u32(), 0);
            }
        }
    }

    #[test]
    fn test_next_f32_range() {
        let mut rng = WorkerRng::new(99, 0);
        for _ in 0..10_000 {
            let u = rng.next_f32();
            assert!((0.0..1.0).contains(&u), "out of range: {u}");
        }
    }

    #[test]
    fn test_chance_extremes() {
        let mut rng = WorkerRng::new(1, 1);
        for _ in 0..1000 {
            assert!(!rng.chance(0.0));
            assert!(rng.chance(1.0));
        }
    }

    #[test]
    fn test_chance_frequency() {
        let mut rng = WorkerRng::new(2024, 5);
        let hits = (0..20_000).filter(|_| rng.chance(0.25)).count();
        assert!(
            (4000..6000).contains(&hits),
            "expected about 5000 hits, got {hits}"
        );
    }

    #[test]
    fn test_below_covers_range() {
        let mut rng = WorkerRng::new(42, 0);
        let mut counts = [0u32; 5];
        for _ in 0..10_000 {
            counts[rng.below(5) as usize] += 1;
        }
        for &c in &counts {
            assert!(c > 1500, "expected roughly uniform, got {counts:?}");
        }
    }

    #[test]
    fn test_shared_seed_last_store_wins() {
        let seed = SharedSeed::new(1);
        seed.store(5);
        seed.store(9);
        assert_eq!(seed.load(), 9);
    }
}
