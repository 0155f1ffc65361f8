//! Falling piece value type
//!
//! A `Piece` owns no board reference. It is `Copy`, so every speculative
//! move is made on a copy, tested against the grid, then committed.

use crate::grid::Grid;
use crate::tetromino::{Rotation, TetrominoType};

/// A tetromino placed on (or above) the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    /// The type of tetromino
    pub kind: TetrominoType,
    /// Current rotation state
    pub rotation: Rotation,
    /// Column of the bounding box's left edge
    pub x: i32,
    /// Row of the bounding box's top edge, row 0 is the top of the grid
    pub y: i32,
}

impl Piece {
    pub fn new(kind: TetrominoType, x: i32, y: i32) -> Self {
        Self {
            kind,
            rotation: Rotation::North,
            x,
            y,
        }
    }

    /// Create a piece at the spawn position of a grid
    ///
    /// Pieces spawn horizontally centered with their lowest cells in the
    /// last hidden row.
    pub fn spawn(kind: TetrominoType, grid: &Grid) -> Self {
        let x = (grid.columns() as i32 - 4) / 2;
        let y = grid.spawn_rows() as i32 - 2;
        Self::new(kind, x, y)
    }

    /// Absolute `(col, row)` of all 4 cells
    pub fn cells(&self) -> [(i32, i32); 4] {
        self.kind
            .shape(self.rotation)
            .map(|(dx, dy)| (self.x + dx, self.y + dy))
    }

    /// Smallest row offset inside the bounding box
    pub fn top_offset(&self) -> i32 {
        self.kind
            .shape(self.rotation)
            .iter()
            .map(|&(_, dy)| dy)
            .min()
            .unwrap_or(0)
    }

    /// A copy translated by `(dx, dy)`
    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..*self
        }
    }

    /// A copy in another rotation state, same box position
    pub fn rotated_to(&self, rotation: Rotation) -> Self {
        Self { rotation, ..*self }
    }

    /// Try to translate the piece, returns true if successful
    pub fn try_shift(&mut self, grid: &Grid, dx: i32, dy: i32) -> bool {
        let moved = self.shifted(dx, dy);
        if grid.has_collision(&moved) {
            return false;
        }
        *self = moved;
        true
    }

    /// Whether one more step down would collide
    pub fn is_resting(&self, grid: &Grid) -> bool {
        grid.has_collision(&self.shifted(0, 1))
    }
}
