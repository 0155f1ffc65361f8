//! Input handling with DAS (Delayed Auto Shift) and ARR (Auto Repeat Rate)
//!
//! Every input keeps a frame counter: `-1` released, `0` pressed this tick,
//! `n > 0` held for `n` ticks. Timing is counted in simulation ticks, so a
//! board behaves the same no matter how often the terminal reports keys.

use crate::gravity::Gravity;
use crate::grid::Grid;
use crate::piece::Piece;
use crate::ruleset::Ruleset;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};

const RELEASED: i32 = -1;
const PRESSED: i32 = 0;

/// Inputs a board understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Input {
    Left,
    Right,
    SoftDrop,
    HardDrop,
    RotateLeft,
    RotateRight,
    Flip,
    Hold,
}

impl Input {
    pub const ALL: [Input; 8] = [
        Input::Left,
        Input::Right,
        Input::SoftDrop,
        Input::HardDrop,
        Input::RotateLeft,
        Input::RotateRight,
        Input::Flip,
        Input::Hold,
    ];

    fn index(self) -> usize {
        self as usize
    }
}

/// Anything key presses can be fed into
pub trait InputSink {
    fn press(&mut self, input: Input);
    fn release(&mut self, input: Input);
}

/// What an input tick asks the board to do beyond moving the piece
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputOutcome {
    pub hard_dropped: bool,
    pub hold_requested: bool,
}

/// Frame-counted DAS/ARR state for one board
#[derive(Debug, Clone)]
pub struct InputHandler {
    counters: [i32; Input::ALL.len()],
    das_frames: i32,
    arr_frames: i32,
}

impl InputHandler {
    pub fn new(das_frames: u32, arr_frames: u32) -> Self {
        Self {
            counters: [RELEASED; Input::ALL.len()],
            das_frames: das_frames.min(i32::MAX as u32) as i32,
            arr_frames: arr_frames.min(i32::MAX as u32) as i32,
        }
    }

    /// Register a press. Repeated presses of a held input are ignored.
    pub fn press(&mut self, input: Input) {
        let counter = &mut self.counters[input.index()];
        if *counter == RELEASED {
            *counter = PRESSED;
        }
    }

    pub fn release(&mut self, input: Input) {
        self.counters[input.index()] = RELEASED;
    }

    /// Release every input
    pub fn clear(&mut self) {
        self.counters = [RELEASED; Input::ALL.len()];
    }

    pub fn is_held(&self, input: Input) -> bool {
        self.counter(input) >= 0
    }

    pub fn counter(&self, input: Input) -> i32 {
        self.counters[input.index()]
    }

    /// Apply one tick of input to the falling piece
    pub fn tick(
        &mut self,
        piece: &mut Piece,
        grid: &Grid,
        gravity: &mut Gravity,
        ruleset: &Ruleset,
    ) -> InputOutcome {
        let mut outcome = InputOutcome::default();

        if self.take_edge(Input::HardDrop) && ruleset.hard_drop {
            gravity.hard_drop();
            outcome.hard_dropped = true;
            return outcome;
        }

        if self.take_edge(Input::RotateRight) {
            ruleset.rotation.rotate_right(piece, grid);
        }
        if self.take_edge(Input::RotateLeft) {
            ruleset.rotation.rotate_left(piece, grid);
        }
        if self.take_edge(Input::Flip) && ruleset.flip {
            ruleset.rotation.flip(piece, grid);
        }
        if self.take_edge(Input::Hold) {
            outcome.hold_requested = ruleset.hold;
        }

        self.shift(piece, grid);

        if self.is_held(Input::SoftDrop) {
            gravity.soft_drop();
            self.advance(Input::SoftDrop);
        }

        outcome
    }

    /// True on the tick an edge-triggered input was pressed, which also
    /// marks it consumed until released
    fn take_edge(&mut self, input: Input) -> bool {
        let counter = &mut self.counters[input.index()];
        if *counter == PRESSED {
            *counter = 1;
            return true;
        }
        false
    }

    fn advance(&mut self, input: Input) {
        let counter = &mut self.counters[input.index()];
        if *counter >= 0 {
            *counter = counter.saturating_add(1);
        }
    }

    /// Horizontal movement. Only the most recently pressed direction moves,
    /// and left wins when both were pressed on the same tick.
    fn shift(&mut self, piece: &mut Piece, grid: &Grid) {
        let left = self.counter(Input::Left);
        let right = self.counter(Input::Right);
        let active = match (left >= 0, right >= 0) {
            (true, true) if right < left => Some((right, 1)),
            (true, _) => Some((left, -1)),
            (false, true) => Some((right, 1)),
            (false, false) => None,
        };

        if let Some((held, dx)) = active {
            if held == PRESSED {
                piece.try_shift(grid, dx, 0);
            } else if held >= self.das_frames {
                if self.arr_frames == 0 {
                    while piece.try_shift(grid, dx, 0) {}
                } else if (held - self.das_frames) % self.arr_frames == 0 {
                    piece.try_shift(grid, dx, 0);
                }
            }
        }

        self.advance(Input::Left);
        self.advance(Input::Right);
    }
}

impl InputSink for InputHandler {
    fn press(&mut self, input: Input) {
        InputHandler::press(self, input);
    }

    fn release(&mut self, input: Input) {
        InputHandler::release(self, input);
    }
}

/// Time after which a key is considered released if no repeat was received,
/// for terminals that never report key releases
const KEY_TIMEOUT: Duration = Duration::from_millis(550);

/// Something the terminal front end does with a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Game(Input),
    Quit,
}

/// Key bindings - supports multiple keys per input
#[derive(Debug, Clone)]
pub struct KeyBindings {
    pub move_left: Vec<KeyCode>,
    pub move_right: Vec<KeyCode>,
    pub soft_drop: Vec<KeyCode>,
    pub hard_drop: Vec<KeyCode>,
    pub rotate_cw: Vec<KeyCode>,
    pub rotate_ccw: Vec<KeyCode>,
    pub flip: Vec<KeyCode>,
    pub hold: Vec<KeyCode>,
    pub quit: Vec<KeyCode>,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            move_left: vec![KeyCode::Left],
            move_right: vec![KeyCode::Right],
            soft_drop: vec![KeyCode::Down],
            hard_drop: vec![KeyCode::Char(' ')],
            rotate_cw: vec![KeyCode::Up, KeyCode::Char('x')],
            rotate_ccw: vec![KeyCode::Char('z')],
            flip: vec![KeyCode::Char('a')],
            hold: vec![KeyCode::Char('c')],
            quit: vec![KeyCode::Char('q'), KeyCode::Esc],
        }
    }
}

impl KeyBindings {
    pub fn lookup(&self, code: KeyCode) -> Option<KeyAction> {
        let code = normalize_key(code);
        let table = [
            (&self.move_left, Input::Left),
            (&self.move_right, Input::Right),
            (&self.soft_drop, Input::SoftDrop),
            (&self.hard_drop, Input::HardDrop),
            (&self.rotate_cw, Input::RotateRight),
            (&self.rotate_ccw, Input::RotateLeft),
            (&self.flip, Input::Flip),
            (&self.hold, Input::Hold),
        ];
        if let Some((_, input)) = table.iter().find(|(keys, _)| keys.contains(&code)) {
            return Some(KeyAction::Game(*input));
        }
        self.quit.contains(&code).then_some(KeyAction::Quit)
    }
}

/// Turns terminal key events into press/release calls
///
/// Terminals with the keyboard enhancement protocol report releases. Others
/// only repeat presses, so a key that stops repeating for `KEY_TIMEOUT` is
/// released on its behalf.
#[derive(Debug)]
pub struct KeyTracker {
    bindings: KeyBindings,
    last_seen: [Option<Instant>; Input::ALL.len()],
    reports_release: bool,
}

impl KeyTracker {
    pub fn new(bindings: KeyBindings) -> Self {
        Self {
            bindings,
            last_seen: [None; Input::ALL.len()],
            reports_release: false,
        }
    }

    /// Feed one key event, returns `KeyAction::Quit` when the player wants out
    pub fn handle<S: InputSink>(&mut self, key: KeyEvent, sink: &mut S) -> Option<KeyAction> {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            return Some(KeyAction::Quit);
        }
        let action = self.bindings.lookup(key.code)?;
        let KeyAction::Game(input) = action else {
            return (key.kind == KeyEventKind::Press).then_some(action);
        };

        match key.kind {
            KeyEventKind::Press | KeyEventKind::Repeat => {
                sink.press(input);
                self.last_seen[input.index()] = Some(Instant::now());
            }
            KeyEventKind::Release => {
                self.reports_release = true;
                sink.release(input);
                self.last_seen[input.index()] = None;
            }
        }
        None
    }

    /// Release keys that stopped repeating
    pub fn expire<S: InputSink>(&mut self, now: Instant, sink: &mut S) {
        if self.reports_release {
            return;
        }
        for input in Input::ALL {
            let slot = &mut self.last_seen[input.index()];
            if slot.is_some_and(|seen| now.duration_since(seen) > KEY_TIMEOUT) {
                *slot = None;
                sink.release(input);
            }
        }
    }
}

/// Normalize key codes for consistent handling
fn normalize_key(code: KeyCode) -> KeyCode {
    match code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::{Rotation, TetrominoType};

    fn setup(das: u32, arr: u32) -> (InputHandler, Piece, Grid, Gravity, Ruleset) {
        let grid = Grid::standard();
        let piece = Piece::new(TetrominoType::T, 3, 10);
        let mut gravity = Gravity::new(1, 30, 20.0, 2);
        gravity.set_falling_piece(&grid);
        (InputHandler::new(das, arr), piece, grid, gravity, Ruleset::modern())
    }

    #[test]
    fn test_press_moves_once_then_waits_for_das() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(10, 2);
        input.press(Input::Right);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 4);
        for _ in 1..10 {
            input.tick(&mut piece, &grid, &mut gravity, &rules);
        }
        assert_eq!(piece.x, 4);
        // Counter reaches DAS on the 11th tick
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 5);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 5);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 6);
    }

    #[test]
    fn test_zero_arr_slides_to_wall() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(3, 0);
        input.press(Input::Left);
        for _ in 0..4 {
            input.tick(&mut piece, &grid, &mut gravity, &rules);
        }
        assert_eq!(piece.x, 0);
    }

    #[test]
    fn test_most_recent_direction_wins() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(10, 2);
        input.press(Input::Left);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 2);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        input.press(Input::Right);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 3);
        // Left keeps counting while right is active
        assert_eq!(input.counter(Input::Left), 3);
        assert_eq!(input.counter(Input::Right), 1);
    }

    #[test]
    fn test_left_wins_simultaneous_press() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(10, 2);
        input.press(Input::Right);
        input.press(Input::Left);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 2);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.x, 2);
    }

    #[test]
    fn test_rotation_is_edge_triggered() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(10, 2);
        input.press(Input::RotateRight);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.rotation, Rotation::East);
        input.press(Input::RotateRight);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.rotation, Rotation::East);
        input.release(Input::RotateRight);
        input.press(Input::RotateRight);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(piece.rotation, Rotation::South);
    }

    #[test]
    fn test_hard_drop_returns_early() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(10, 2);
        input.press(Input::HardDrop);
        input.press(Input::Left);
        let outcome = input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert!(outcome.hard_dropped);
        assert_eq!(piece.x, 3);
        assert!(gravity.tick(&grid, &mut piece));
        assert_eq!(grid.distance_to_floor(&piece), 0);
        // Left was not consumed and moves on the next tick
        assert_eq!(input.counter(Input::Left), 0);
    }

    #[test]
    fn test_nes_ignores_hard_drop_flip_and_hold() {
        let (mut input, mut piece, grid, mut gravity, _) = setup(10, 2);
        let rules = Ruleset::nes();
        input.press(Input::HardDrop);
        input.press(Input::Flip);
        input.press(Input::Hold);
        let outcome = input.tick(&mut piece, &grid, &mut gravity, &rules);
        assert_eq!(outcome, InputOutcome::default());
        assert_eq!(piece.rotation, Rotation::North);
    }

    #[test]
    fn test_soft_drop_is_continuous() {
        let (mut input, mut piece, grid, _, rules) = setup(10, 2);
        let mut gravity = Gravity::new(1, 30, 30.0, 2);
        gravity.set_falling_piece(&grid);
        input.press(Input::SoftDrop);
        let start = piece.y;
        for _ in 0..9 {
            input.tick(&mut piece, &grid, &mut gravity, &rules);
            gravity.tick(&grid, &mut piece);
        }
        // 30x of 1/60 per tick is a row every other tick
        assert_eq!(piece.y, start + 4);
        input.release(Input::SoftDrop);
        input.tick(&mut piece, &grid, &mut gravity, &rules);
        gravity.tick(&grid, &mut piece);
        assert_eq!(piece.y, start + 4);
    }

    #[test]
    fn test_hold_requested_once() {
        let (mut input, mut piece, grid, mut gravity, rules) = setup(10, 2);
        input.press(Input::Hold);
        assert!(input.tick(&mut piece, &grid, &mut gravity, &rules).hold_requested);
        assert!(!input.tick(&mut piece, &grid, &mut gravity, &rules).hold_requested);
    }

    #[test]
    fn test_key_tracker_maps_and_times_out() {
        let mut handler = InputHandler::new(10, 2);
        let mut tracker = KeyTracker::new(KeyBindings::default());
        let press = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(tracker.handle(press, &mut handler), None);
        assert!(handler.is_held(Input::Left));

        tracker.expire(Instant::now(), &mut handler);
        assert!(handler.is_held(Input::Left));
        tracker.expire(Instant::now() + Duration::from_secs(1), &mut handler);
        assert!(!handler.is_held(Input::Left));

        let quit = KeyEvent::new(KeyCode::Char('Q'), KeyModifiers::SHIFT);
        assert_eq!(tracker.handle(quit, &mut handler), Some(KeyAction::Quit));
    }
}
