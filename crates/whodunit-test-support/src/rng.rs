//! Jitter-free `DeterministicRng` for tests.

use whodunit_core::rng::DeterministicRng;

/// Always returns the lower bound, so retry delays carry no jitter.
#[derive(Debug)]
pub struct MockRng;

impl DeterministicRng for MockRng {
    fn next_u32_range(&mut self, min: u32, _max: u32) -> u32 {
        min
    }
}
