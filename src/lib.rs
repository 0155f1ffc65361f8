//! VERSUS TETRS - two-player Tetris over a byte relay
//!
//! Each client simulates its own board and streams the falling piece every
//! tick. The opponent's board is a puppet that only follows those reports.

pub mod bag;
pub mod board;
pub mod error;
pub mod garbage;
pub mod gravity;
pub mod grid;
pub mod input;
pub mod matchmaking;
pub mod piece;
pub mod protocol;
pub mod relay;
pub mod rotation;
pub mod ruleset;
pub mod session;
pub mod settings;
pub mod tetromino;
pub mod ui;
