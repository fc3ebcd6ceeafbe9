//! Random number streams.
//!
//! A training call resolves one base seed (the configured one, or a single
//! draw from the OS). Every `(location, group)` pair then gets its own
//! stream derived from it, so results do not depend on chunking or on the
//! order in which rayon runs the groups.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Builds a seeded or OS-sourced RNG.
pub(crate) fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_os_rng(),
    }
}

/// The configured seed, or a fresh one from the OS.
pub(crate) fn base_seed(seed: Option<u64>) -> u64 {
    match seed {
        Some(s) => s,
        None => make_rng(None).random(),
    }
}

/// Stream of the global location `loc` and group `group`.
pub(crate) fn stream_rng(base: u64, loc: usize, group: usize) -> StdRng {
    let key = ((loc as u64) << 20) ^ (group as u64 + 1);
    StdRng::seed_from_u64(base ^ key.wrapping_mul(GOLDEN))
}
