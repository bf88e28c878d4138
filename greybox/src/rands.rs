//! Randomness for the mutators and the scheduler.
//!
//! Everything draws from a single [`Rand`], so a run is reproducible from its seed.
use core::{fmt::Debug, ops::RangeInclusive};

use crate::current_nanos;

/// The generator the fuzzer uses unless told otherwise. Fast, not cryptographic.
pub type StdRand = RomuDuoJrRand;

/// Golden-ratio increment of the seed expansion stream
const SEED_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

/// One step of a SplitMix64 stream; used to spread a single `u64` seed over a wider state.
#[derive(Debug, Clone, Copy)]
struct SeedStream(u64);

impl SeedStream {
    fn next_word(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(SEED_GAMMA);
        let mut word = self.0;
        word = (word ^ (word >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
        word = (word ^ (word >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
        word ^ (word >> 31)
    }
}

/// Maps a uniform word onto `0..span` with one widening multiply.
#[inline]
fn scale_to(word: u64, span: u64) -> u64 {
    ((u128::from(word) * u128::from(span)) >> 64) as u64
}

/// A seedable source of random decisions.
pub trait Rand: Debug {
    /// Restarts the stream from `seed`
    fn reseed(&mut self, seed: u64);

    /// The next raw 64 bit word
    fn next_u64(&mut self) -> u64;

    /// A float in `[0, 1)`, built from the top 53 bits of a word
    #[inline]
    fn unit(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// `true` with probability `p`
    #[inline]
    fn chance(&mut self, p: f64) -> bool {
        self.unit() < p
    }

    /// A position in a collection of `len` elements; `len` must not be 0
    #[inline]
    fn index(&mut self, len: usize) -> usize {
        debug_assert!(len > 0, "index into an empty collection");
        scale_to(self.next_u64(), len as u64) as usize
    }

    /// A value in the inclusive `range`
    #[inline]
    fn in_range(&mut self, range: RangeInclusive<u64>) -> u64 {
        let (low, high) = range.into_inner();
        debug_assert!(low <= high);
        match (high - low).checked_add(1) {
            Some(span) => low + scale_to(self.next_u64(), span),
            None => self.next_u64(),
        }
    }
}

/// Romu DuoJr, see <https://romu-random.org/>.
///
/// Two words of state, a multiply and a rotate per step.
#[derive(Copy, Clone, Debug)]
pub struct RomuDuoJrRand {
    x: u64,
    y: u64,
}

impl RomuDuoJrRand {
    /// A generator whose stream is fully determined by `seed`
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        let mut rand = Self { x: 0, y: 0 };
        rand.reseed(seed);
        rand
    }

    /// A generator seeded from the clock
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(current_nanos())
    }
}

impl Default for RomuDuoJrRand {
    fn default() -> Self {
        Self::new()
    }
}

impl Rand for RomuDuoJrRand {
    fn reseed(&mut self, seed: u64) {
        let mut stream = SeedStream(seed);
        self.x = stream.next_word();
        self.y = stream.next_word();
    }

    #[inline]
    fn next_u64(&mut self) -> u64 {
        let out = self.x;
        self.x = self.y.wrapping_mul(0xd383_3e80_4f4c_574b);
        self.y = self.y.wrapping_sub(out).rotate_left(27);
        out
    }
}

#[cfg(test)]
mod tests {
    use crate::rands::{Rand, StdRand};

    #[test]
    fn test_bounds() {
        let mut rand = StdRand::with_seed(0);
        for _ in 0..1000 {
            assert!(rand.index(100) < 100);
            assert!((11..=20).contains(&rand.in_range(11..=20)));
            assert!((0.0..1.0).contains(&rand.unit()));
        }
        assert_eq!(rand.index(1), 0);
        assert_eq!(rand.in_range(10..=10), 10);
        let _ = rand.in_range(0..=u64::MAX);
    }

    #[test]
    fn test_reseed_replays_stream() {
        let mut a = StdRand::with_seed(1337);
        let first: Vec<u64> = (0..32).map(|_| a.next_u64()).collect();
        let mut b = StdRand::with_seed(1);
        b.reseed(1337);
        let second: Vec<u64> = (0..32).map(|_| b.next_u64()).collect();
        assert_eq!(first, second);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_clock_seed_differs() {
        let mut fixed = StdRand::with_seed(0);
        let mut clock = StdRand::new();
        assert_ne!(clock.next_u64(), fixed.next_u64());
    }

    #[test]
    fn test_chance_extremes() {
        let mut rand = StdRand::with_seed(5);
        for _ in 0..100 {
            assert!(!rand.chance(0.0));
            assert!(rand.chance(1.0));
        }
    }

    #[test]
    fn test_index_covers_all_slots() {
        let mut rand = StdRand::with_seed(9);
        let mut seen = [false; 8];
        for _ in 0..500 {
            seen[rand.index(8)] = true;
        }
        assert!(seen.iter().all(|s| *s));
    }
}
