//! Per-tick gravity and lock delay
//!
//! Gravity is measured in cells per tick and accumulated fractionally. A
//! piece that rests on the stack counts lock-delay frames instead of
//! falling; when the count reaches the (possibly shortened) delay the piece
//! is locked.

use crate::grid::Grid;
use crate::piece::Piece;

/// Highest level the gravity curve goes up to
pub const MAX_LEVEL: u32 = 20;
/// Simulation rate the gravity curve is expressed against
pub const TICKS_PER_SECOND: f64 = 60.0;

/// Gravity of a level in cells per tick
///
/// Follows the guideline curve: `(0.8 - (level - 1) * 0.007)^(level - 1)`
/// seconds per row.
pub fn gravity_for_level(level: u32) -> f32 {
    let level = level.clamp(1, MAX_LEVEL) as f64;
    let seconds_per_row = (0.8 - ((level - 1.0) * 0.007)).powf(level - 1.0);
    (1.0 / (seconds_per_row * TICKS_PER_SECOND)) as f32
}

#[derive(Debug, Clone)]
pub struct Gravity {
    level: u32,
    base_gravity: f32,
    applied_gravity: f32,
    lock_delay_frames: u32,
    applied_lock_delay: u32,
    soft_drop_multiplier: f32,
    soft_drop_lock_divisor: u32,
    accumulator: f32,
    frames_rested: u32,
    locked: bool,
    /// Cells per tick a hard drop applies; anything taller than the grid works
    hard_drop_gravity: f32,
}

impl Gravity {
    pub fn new(
        level: u32,
        lock_delay_frames: u32,
        soft_drop_multiplier: f32,
        soft_drop_lock_divisor: u32,
    ) -> Self {
        let level = level.clamp(1, MAX_LEVEL);
        let base_gravity = gravity_for_level(level);
        Self {
            level,
            base_gravity,
            applied_gravity: base_gravity,
            lock_delay_frames,
            applied_lock_delay: lock_delay_frames,
            soft_drop_multiplier,
            soft_drop_lock_divisor: soft_drop_lock_divisor.max(1),
            accumulator: 0.0,
            frames_rested: 0,
            locked: false,
            hard_drop_gravity: 64.0,
        }
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    /// Raise the level. Levels never go down and stop at `MAX_LEVEL`.
    pub fn set_level(&mut self, level: u32) {
        let level = level.min(MAX_LEVEL);
        if level > self.level {
            self.level = level;
            self.base_gravity = gravity_for_level(level);
            self.applied_gravity = self.base_gravity;
        }
    }

    pub fn base_gravity(&self) -> f32 {
        self.base_gravity
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn frames_rested(&self) -> u32 {
        self.frames_rested
    }

    /// Reset for a freshly spawned piece, which always gets a full window
    pub fn set_falling_piece(&mut self, grid: &Grid) {
        self.accumulator = 0.0;
        self.frames_rested = 0;
        self.locked = false;
        self.hard_drop_gravity = grid.rows() as f32;
    }

    /// Faster fall and shorter lock delay for the current tick only
    pub fn soft_drop(&mut self) {
        self.applied_gravity = self.base_gravity * self.soft_drop_multiplier;
        self.applied_lock_delay = self.lock_delay_frames / self.soft_drop_lock_divisor;
    }

    /// Fall the full board height and lock without delay, this tick only
    pub fn hard_drop(&mut self) {
        self.applied_gravity = self.hard_drop_gravity;
        self.applied_lock_delay = 0;
    }

    /// Advance one tick. Returns true once the piece is locked.
    pub fn tick(&mut self, grid: &Grid, piece: &mut Piece) -> bool {
        if self.locked {
            return true;
        }

        let mut resting = piece.is_resting(grid);
        if resting {
            self.frames_rested += 1;
        } else {
            self.frames_rested = 0;
            self.accumulator += self.applied_gravity;
            while self.accumulator >= 1.0 && !resting {
                piece.y += 1;
                self.accumulator -= 1.0;
                resting = piece.is_resting(grid);
            }
            if resting {
                self.accumulator = 0.0;
            }
        }

        self.locked = resting && self.frames_rested >= self.applied_lock_delay;

        self.applied_gravity = self.base_gravity;
        self.applied_lock_delay = self.lock_delay_frames;
        self.locked
    }
}
