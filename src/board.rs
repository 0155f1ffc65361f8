//! A player's board: grid, falling piece, queue and hold slot
//!
//! The same type backs both sides of a match. A local board is driven by
//! its own input and gravity and reports what happened as `BoardEvent`s. A
//! puppet board has no physics; it only follows the state the opponent
//! reports over the network.

use crate::bag::{Generator, TetrominoQueue};
use crate::garbage::{GarbageQueue, attack_for_lines, random_hole};
use crate::gravity::{Gravity, MAX_LEVEL};
use crate::grid::Grid;
use crate::input::{Input, InputHandler, InputSink};
use crate::piece::Piece;
use crate::ruleset::Ruleset;
use crate::tetromino::{Rotation, TetrominoType};
use std::sync::Arc;
use tracing::{debug, info};

/// Timing a local board plays with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handling {
    pub das_frames: u32,
    pub arr_frames: u32,
    pub lock_delay_frames: u32,
    pub soft_drop_multiplier: f32,
    pub soft_drop_lock_divisor: u32,
    pub start_level: u32,
}

impl Default for Handling {
    fn default() -> Self {
        Self {
            das_frames: 10,
            arr_frames: 2,
            lock_delay_frames: 30,
            soft_drop_multiplier: 20.0,
            soft_drop_lock_divisor: 2,
            start_level: 1,
        }
    }
}

/// Something the opponent needs to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardEvent {
    /// The falling piece after this tick
    PieceUpdate {
        x: i32,
        y: i32,
        rotation: Rotation,
        locked: bool,
    },
    Hold,
    /// Garbage to send after a multi-line clear
    Attack { rows: usize, empty_column: usize },
    ToppedOut,
}

#[derive(Debug, Clone)]
enum Driver {
    Local {
        input: InputHandler,
        gravity: Gravity,
    },
    Puppet {
        locked: bool,
    },
}

#[derive(Debug)]
pub struct Board {
    grid: Grid,
    falling: Piece,
    queue: TetrominoQueue,
    hold: Option<TetrominoType>,
    hold_locked: bool,
    ruleset: Ruleset,
    garbage: Arc<GarbageQueue>,
    lines: usize,
    start_level: u32,
    level: u32,
    alive: bool,
    driver: Driver,
    events: Vec<BoardEvent>,
}

impl Board {
    /// A board simulated on this machine
    pub fn local(ruleset: Ruleset, seed: u64, handling: Handling) -> Self {
        let driver = Driver::Local {
            input: InputHandler::new(handling.das_frames, handling.arr_frames),
            gravity: Gravity::new(
                handling.start_level,
                handling.lock_delay_frames,
                handling.soft_drop_multiplier,
                handling.soft_drop_lock_divisor,
            ),
        };
        Self::with_driver(ruleset, seed, handling.start_level, driver)
    }

    /// A mirror of the opponent's board
    pub fn puppet(ruleset: Ruleset, seed: u64, start_level: u32) -> Self {
        Self::with_driver(ruleset, seed, start_level, Driver::Puppet { locked: false })
    }

    fn with_driver(ruleset: Ruleset, seed: u64, start_level: u32, driver: Driver) -> Self {
        let grid = Grid::standard();
        let mut queue = TetrominoQueue::new(
            ruleset.preview,
            Generator::new(ruleset.randomizer, seed),
        );
        let first = queue.get_next();
        let start_level = start_level.clamp(1, MAX_LEVEL);
        let mut board = Self {
            falling: Piece::spawn(first, &grid),
            grid,
            queue,
            hold: None,
            hold_locked: false,
            ruleset,
            garbage: Arc::new(GarbageQueue::new()),
            lines: 0,
            start_level,
            level: start_level,
            alive: true,
            driver,
            events: Vec::new(),
        };
        board.spawn(first);
        board
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn falling(&self) -> &Piece {
        &self.falling
    }

    /// Where the falling piece would land
    pub fn ghost(&self) -> Piece {
        self.falling
            .shifted(0, self.grid.distance_to_floor(&self.falling))
    }

    /// Upcoming pieces the ruleset lets the player see
    pub fn preview(&self) -> impl Iterator<Item = TetrominoType> + '_ {
        self.queue.preview().take(self.ruleset.preview)
    }

    pub fn hold_piece(&self) -> Option<TetrominoType> {
        self.hold
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    /// Handle the network thread pushes incoming garbage into
    pub fn garbage_queue(&self) -> Arc<GarbageQueue> {
        Arc::clone(&self.garbage)
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn is_puppet(&self) -> bool {
        matches!(self.driver, Driver::Puppet { .. })
    }

    pub fn is_falling_tetromino_locked(&self) -> bool {
        match &self.driver {
            Driver::Local { gravity, .. } => gravity.is_locked(),
            Driver::Puppet { locked } => *locked,
        }
    }

    pub fn press(&mut self, key: Input) {
        if let Driver::Local { input, .. } = &mut self.driver {
            input.press(key);
        }
    }

    pub fn release(&mut self, key: Input) {
        if let Driver::Local { input, .. } = &mut self.driver {
            input.release(key);
        }
    }

    /// Advance one tick and hand back what happened
    pub fn update(&mut self) -> Vec<BoardEvent> {
        if self.alive {
            if self.is_puppet() {
                self.settle_puppet();
            } else {
                self.update_local();
            }
        }
        std::mem::take(&mut self.events)
    }

    fn update_local(&mut self) {
        let Driver::Local { input, gravity } = &mut self.driver else {
            return;
        };
        let outcome = input.tick(&mut self.falling, &self.grid, gravity, &self.ruleset);
        if outcome.hold_requested && !self.hold_locked {
            self.swap_hold();
            if !self.alive {
                return;
            }
            self.events.push(BoardEvent::Hold);
        }

        let Driver::Local { gravity, .. } = &mut self.driver else {
            return;
        };
        let locked = gravity.tick(&self.grid, &mut self.falling);

        let overflow = self
            .garbage
            .apply_pending(&mut self.grid, &mut self.falling, locked);
        self.events.push(BoardEvent::PieceUpdate {
            x: self.falling.x,
            y: self.falling.y,
            rotation: self.falling.rotation,
            locked,
        });
        if overflow || (!locked && self.grid.has_collision(&self.falling)) {
            self.top_out("garbage");
            return;
        }

        if locked {
            self.lock_falling();
        }
    }

    /// Apply garbage the opponent has reported, then the lock it reported.
    /// The reported position already accounts for that garbage, so the piece
    /// is only lifted here if it would otherwise be buried. Tops out under
    /// the same conditions as the opponent's own board.
    fn settle_puppet(&mut self) {
        let overflow = self
            .garbage
            .apply_pending(&mut self.grid, &mut self.falling, false);
        let locked = self.is_falling_tetromino_locked();
        if overflow || (!locked && self.grid.has_collision(&self.falling)) {
            self.top_out("garbage");
            return;
        }
        if locked {
            self.lock_falling();
        }
    }

    /// Follow the opponent's falling piece. A lock still waiting from the
    /// previous report is carried out first, so no lock is ever skipped.
    pub fn set_falling_state(&mut self, x: i32, y: i32, rotation: Rotation, locked: bool) {
        if !self.alive {
            return;
        }
        if self.is_falling_tetromino_locked() {
            self.settle_puppet();
            if !self.alive {
                return;
            }
        }
        self.falling.x = x;
        self.falling.y = y;
        self.falling.rotation = rotation;
        if let Driver::Puppet { locked: pending } = &mut self.driver {
            *pending = locked;
        }
    }

    /// Mirror a hold the opponent made
    pub fn puppet_hold(&mut self) {
        if self.alive {
            self.swap_hold();
        }
    }

    fn swap_hold(&mut self) {
        let current = self.falling.kind;
        let next = match self.hold.replace(current) {
            Some(held) => held,
            None => self.queue.get_next(),
        };
        self.hold_locked = true;
        self.spawn(next);
    }

    fn lock_falling(&mut self) {
        let piece = self.falling;
        if piece.cells().iter().any(|&(_, row)| row < 0) {
            self.top_out("lock out");
            return;
        }

        let cleared = self.grid.lock_and_clear_lines(&piece);
        if cleared > 0 {
            self.lines += cleared;
            let level = (self.start_level + (self.lines / 10) as u32).min(MAX_LEVEL);
            if level > self.level {
                self.level = level;
                debug!(level, "level up");
            }
        }

        if let Driver::Local { gravity, .. } = &mut self.driver {
            gravity.set_level(self.level);
            let rows = attack_for_lines(cleared);
            if rows > 0 {
                self.events.push(BoardEvent::Attack {
                    rows,
                    empty_column: random_hole(self.grid.columns()),
                });
            }
        }

        self.hold_locked = false;
        let next = self.queue.get_next();
        self.spawn(next);
    }

    fn spawn(&mut self, kind: TetrominoType) {
        self.falling = Piece::spawn(kind, &self.grid);
        match &mut self.driver {
            Driver::Local { gravity, .. } => gravity.set_falling_piece(&self.grid),
            Driver::Puppet { locked } => *locked = false,
        }
        if self.grid.has_collision(&self.falling) {
            self.top_out("block out");
        }
    }

    fn top_out(&mut self, reason: &str) {
        if !self.alive {
            return;
        }
        self.alive = false;
        if self.is_puppet() {
            debug!(reason, "puppet topped out");
        } else {
            info!(reason, lines = self.lines, "topped out");
            self.events.push(BoardEvent::ToppedOut);
        }
    }
}

impl InputSink for Board {
    fn press(&mut self, input: Input) {
        Board::press(self, input);
    }

    fn release(&mut self, input: Input) {
        Board::release(self, input);
    }
}
