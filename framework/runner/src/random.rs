use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Chooses uniformly among a number of outcomes.
pub trait Pick: Send {
    /// Returns an index in `0..outcomes`. `outcomes` is never zero.
    fn pick(&mut self, outcomes: usize) -> usize;
}

/// A [Pick] backed by a real random number generator.
#[derive(Debug)]
pub struct RngPicker(StdRng);

impl RngPicker {
    pub fn from_entropy() -> Self {
        Self(StdRng::from_entropy())
    }

    /// The same seed always produces the same sequence of picks.
    pub fn seeded(seed: u64) -> Self {
        Self(StdRng::seed_from_u64(seed))
    }
}

impl Pick for RngPicker {
    fn pick(&mut self, outcomes: usize) -> usize {
        self.0.gen_range(0..outcomes)
    }
}

/// A [Pick] that replays a fixed sequence of picks.
///
/// Each pick is reduced modulo the number of outcomes. Once the script runs out every pick is 0.
#[derive(Debug, Clone, Default)]
pub struct ScriptedPicker(VecDeque<usize>);

impl ScriptedPicker {
    pub fn new(picks: impl IntoIterator<Item = usize>) -> Self {
        Self(picks.into_iter().collect())
    }

    pub fn remaining(&self) -> usize {
        self.0.len()
    }
}

impl Pick for ScriptedPicker {
    fn pick(&mut self, outcomes: usize) -> usize {
        self.0.pop_front().unwrap_or_default() % outcomes
    }
}
