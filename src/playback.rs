//! Shuffled draw order over the story pool.
//!
//! The queue is a deck: every pool index once, uniformly shuffled, drawn from
//! the back. Draws can exclude sources already on screen; excluded cards are
//! set aside and returned to the *front* of the deck, so they come up again
//! only after everything else has been dealt.
//!
//! The deck holds bare indices, so it must be [`reset`](PlaybackQueue::reset)
//! whenever the pool is rebuilt. Indices that have gone out of range since
//! are discarded on draw rather than returned.

use std::collections::VecDeque;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::trace;

use crate::source::Story;

pub struct PlaybackQueue {
    deck: VecDeque<usize>,
    rng: StdRng,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic shuffles, for tests and reproducible runs.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            deck: VecDeque::new(),
            rng,
        }
    }

    pub fn len(&self) -> usize {
        self.deck.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deck.is_empty()
    }

    /// Refill with `0..pool_len` in random order.
    pub fn reset(&mut self, pool_len: usize) {
        let mut order: Vec<usize> = (0..pool_len).collect();
        order.shuffle(&mut self.rng);
        self.deck = order.into();
    }

    /// Draw the next pool index whose source is not in `forbidden`.
    ///
    /// When every remaining card is forbidden, the first one set aside is
    /// returned anyway. An exhausted deck is reshuffled once; an empty pool
    /// yields `0`.
    pub fn next(&mut self, pool: &[Story], forbidden: &[usize]) -> usize {
        let mut set_aside: Vec<usize> = Vec::new();
        let mut reshuffled = false;

        let chosen = loop {
            match self.deck.pop_back() {
                Some(index) => {
                    let Some(story) = pool.get(index) else {
                        trace!(index, "stale index dropped");
                        continue;
                    };
                    if forbidden.contains(&story.source) {
                        set_aside.push(index);
                    } else {
                        break index;
                    }
                }
                None if !set_aside.is_empty() => break set_aside.remove(0),
                None if !reshuffled => {
                    reshuffled = true;
                    self.reset(pool.len());
                }
                None => break 0,
            }
        };

        // Set-aside cards go back to the front, keeping their draw order.
        for index in set_aside.into_iter().rev() {
            self.deck.push_front(index);
        }
        chosen
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
