use std::sync::{Mutex, OnceLock, PoisonError};

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use tracing::warn;

use crate::clock::{Clock, SystemClock};
use crate::id::{OpId, COUNTER_MAX, TIMESTAMP_MASK};

/// Mutable minting state.
struct GeneratorState {
    /// Millisecond tick of the last minted id.
    last_ms: Option<u64>,
    /// Counter value used for the last minted id.
    counter: u16,
    rng: Box<dyn RngCore + Send>,
}

/// Mints time-ordered [`OpId`]s.
///
/// # Minting rules
///
/// - **Tick**: `tick = max(clock, last_tick)`, so a clock that moves
///   backwards keeps minting on the last seen tick.
/// - **Counter**: reset to `0` when the tick advanced, incremented when it
///   did not.
/// - **Exhaustion**: when the counter is already at its 12-bit maximum the
///   generator moves to `last_tick + 1` and resets the counter.
/// - **Guarantee**: ids returned by one generator are strictly increasing.
///
/// Safe for concurrent use across threads via an internal [`Mutex`].
pub struct IdGenerator {
    clock: Box<dyn Clock>,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// Generator backed by the system clock and an entropy-seeded CSPRNG.
    pub fn new() -> Self {
        Self::with_sources(SystemClock, StdRng::from_entropy())
    }

    /// Generator with explicit clock and randomness sources.
    pub fn with_sources(clock: impl Clock + 'static, rng: impl RngCore + Send + 'static) -> Self {
        Self {
            clock: Box::new(clock),
            state: Mutex::new(GeneratorState {
                last_ms: None,
                counter: 0,
                rng: Box::new(rng),
            }),
        }
    }

    /// Mint a new id, strictly greater than every id this generator has
    /// returned before.
    pub fn mint(&self) -> OpId {
        let now = self.clock.now_ms() & TIMESTAMP_MASK;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let (tick, counter) = match state.last_ms {
            Some(last) if now <= last => {
                if state.counter < COUNTER_MAX {
                    (last, state.counter + 1)
                } else {
                    warn!(tick = last, "id counter exhausted; borrowing next millisecond");
                    (last + 1, 0)
                }
            }
            _ => (now, 0),
        };

        state.last_ms = Some(tick);
        state.counter = counter;
        let random = state.rng.next_u64();

        OpId::from_parts(tick, counter, random)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<IdGenerator> = OnceLock::new();

/// The process-wide generator.
pub fn global() -> &'static IdGenerator {
    GLOBAL.get_or_init(IdGenerator::new)
}

/// Mint an id from the process-wide generator.
pub fn mint() -> OpId {
    global().mint()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;

    fn make_generator(ms: u64, seed: u64) -> (Arc<ManualClock>, IdGenerator) {
        let clock = Arc::new(ManualClock::new(ms));
        let generator = IdGenerator::with_sources(clock.clone(), StdRng::seed_from_u64(seed));
        (clock, generator)
    }

    #[test]
    fn minted_ids_are_version_7() {
        let id = mint();
        assert_eq!(id.version(), 7);
        assert_eq!(id.as_uuid().get_variant(), uuid::Variant::RFC4122);
    }

    #[test]
    fn sequential_mints_strictly_increase() {
        let ids: Vec<OpId> = (0..10_000).map(|_| mint()).collect();
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{:?} !< {:?}", pair[0], pair[1]);
            assert!(pair[0].urn() < pair[1].urn());
        }
    }

    #[test]
    fn full_counter_range_within_one_millisecond() {
        let (_clock, generator) = make_generator(1_694_166_297_494, 1);
        let ids: Vec<OpId> = (0..4096).map(|_| generator.mint()).collect();
        assert!(ids.iter().all(|id| id.timestamp_ms() == 1_694_166_297_494));
        assert_eq!(ids[0].counter(), 0);
        assert_eq!(ids[4095].counter(), COUNTER_MAX);
        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1]);
        }
    }

    #[test]
    fn counter_exhaustion_borrows_next_millisecond() {
        let (_clock, generator) = make_generator(1000, 2);
        let ids: Vec<OpId> = (0..4097).map(|_| generator.mint()).collect();
        let last = ids[4096];
        assert_eq!(last.timestamp_ms(), 1001);
        assert_eq!(last.counter(), 0);
        assert!(ids[4095] < last);
    }

    #[test]
    fn counter_resets_when_clock_advances() {
        let (clock, generator) = make_generator(1000, 3);
        generator.mint();
        let second = generator.mint();
        assert_eq!(second.counter(), 1);
        clock.advance(1);
        let third = generator.mint();
        assert_eq!(third.timestamp_ms(), 1001);
        assert_eq!(third.counter(), 0);
        assert!(second < third);
    }

    #[test]
    fn clock_regression_keeps_order() {
        let (clock, generator) = make_generator(5000, 4);
        let before = generator.mint();
        clock.set(4000);
        let after = generator.mint();
        assert_eq!(after.timestamp_ms(), 5000);
        assert_eq!(after.counter(), 1);
        assert!(before < after);
    }

    #[test]
    fn injected_sources_are_reproducible() {
        let (_c1, g1) = make_generator(1234, 99);
        let (_c2, g2) = make_generator(1234, 99);
        for _ in 0..16 {
            assert_eq!(g1.mint(), g2.mint());
        }
    }

    #[test]
    fn independent_generators_do_not_collide() {
        let (_c1, g1) = make_generator(1234, 1);
        let (_c2, g2) = make_generator(1234, 2);
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(g1.mint()));
            assert!(seen.insert(g2.mint()));
        }
    }

    #[test]
    fn concurrent_minting_stays_unique_and_ordered_per_thread() {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                std::thread::spawn(|| {
                    let ids: Vec<OpId> = (0..500).map(|_| mint()).collect();
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    ids
                })
            })
            .collect();
        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id));
            }
        }
        assert_eq!(all.len(), 2000);
    }
}
