//! Seeded piece generators and the upcoming-piece queue
//!
//! Both players receive the same 64-bit seed from the relay, so the sender
//! and the opponent's puppet copy deal the exact same sequence.

use crate::tetromino::TetrominoType;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Which generator a ruleset deals from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Randomizer {
    /// Shuffled bags of all seven pieces
    SevenBag,
    /// Uniform roll, rerolled once if it repeats the previous piece
    Classic,
}

/// A seeded piece generator
#[derive(Debug, Clone)]
pub struct Generator {
    rng: ChaCha8Rng,
    kind: Randomizer,
    bag: Vec<TetrominoType>,
    last: Option<TetrominoType>,
}

impl Generator {
    pub fn new(kind: Randomizer, seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            kind,
            bag: Vec::with_capacity(7),
            last: None,
        }
    }

    pub fn next_piece(&mut self) -> TetrominoType {
        let piece = match self.kind {
            Randomizer::SevenBag => {
                if self.bag.is_empty() {
                    self.refill();
                }
                // refill() always leaves 7 pieces behind
                self.bag.pop().unwrap_or(TetrominoType::I)
            }
            Randomizer::Classic => {
                let all = TetrominoType::all();
                let first = all[self.rng.gen_range(0..all.len())];
                if Some(first) == self.last {
                    all[self.rng.gen_range(0..all.len())]
                } else {
                    first
                }
            }
        };
        self.last = Some(piece);
        piece
    }

    /// Refill with a new shuffled bag
    fn refill(&mut self) {
        self.bag.extend(TetrominoType::all());
        self.bag.shuffle(&mut self.rng);
    }
}

/// Fixed-size queue of upcoming pieces that never runs dry
#[derive(Debug, Clone)]
pub struct TetrominoQueue {
    queue: VecDeque<TetrominoType>,
    generator: Generator,
}

impl TetrominoQueue {
    pub fn new(size: usize, mut generator: Generator) -> Self {
        let size = size.max(1);
        let queue = (0..size).map(|_| generator.next_piece()).collect();
        Self { queue, generator }
    }

    /// Take the next piece and refill the tail
    pub fn get_next(&mut self) -> TetrominoType {
        let next = self.generator.next_piece();
        self.queue.push_back(next);
        self.queue.pop_front().unwrap_or(next)
    }

    /// Upcoming pieces, front first
    pub fn preview(&self) -> impl Iterator<Item = TetrominoType> + '_ {
        self.queue.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}
