//! Rotation systems: NES, SRS and SRS+
//!
//! SRS defines the wall kicks attempted when rotating a piece. If a rotation
//! would cause collision, these offsets are tried in order. Tables are
//! written in the conventional up-positive form and the row component is
//! negated on use, since grid rows grow downward.

use crate::grid::Grid;
use crate::piece::Piece;
use crate::tetromino::{Rotation, RotationDirection, TetrominoType};
use serde::{Deserialize, Serialize};

type Kicks = [(i32, i32); 5];

/// The rotation rule-set a board plays with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationSystem {
    Nes,
    Srs,
    SrsPlus,
}

impl RotationSystem {
    pub fn rotate_right(&self, piece: &mut Piece, grid: &Grid) -> bool {
        self.rotate(piece, grid, RotationDirection::Clockwise)
    }

    pub fn rotate_left(&self, piece: &mut Piece, grid: &Grid) -> bool {
        self.rotate(piece, grid, RotationDirection::CounterClockwise)
    }

    pub fn flip(&self, piece: &mut Piece, grid: &Grid) -> bool {
        self.rotate(piece, grid, RotationDirection::Half)
    }

    /// Rotate in place if some kicked position is free, otherwise leave the
    /// piece untouched. Returns true on success.
    pub fn rotate(&self, piece: &mut Piece, grid: &Grid, direction: RotationDirection) -> bool {
        let target = direction.apply(piece.rotation);
        let candidate = match self {
            RotationSystem::Nes => nes_rotation(piece, grid, direction, target),
            RotationSystem::Srs | RotationSystem::SrsPlus => {
                let kicks = self.kicks(piece.kind, piece.rotation, direction);
                let rotated = piece.rotated_to(target);
                kicks
                    .iter()
                    .map(|&(dx, dy)| rotated.shifted(dx, -dy))
                    .find(|kicked| !grid.has_collision(kicked))
            }
        };

        match candidate {
            Some(kicked) => {
                *piece = kicked;
                true
            }
            None => false,
        }
    }

    /// Offsets to try, in order, for one rotation attempt
    pub fn kicks(
        &self,
        kind: TetrominoType,
        from: Rotation,
        direction: RotationDirection,
    ) -> Vec<(i32, i32)> {
        match (self, kind, direction) {
            (RotationSystem::Nes, _, _) => vec![(0, 0)],
            (_, TetrominoType::O, _) => vec![(0, 0)],
            (_, _, RotationDirection::Half) => flip_kicks(from).to_vec(),
            (RotationSystem::SrsPlus, TetrominoType::I, _) => {
                srs_plus_i_kicks(from, direction).to_vec()
            }
            (_, TetrominoType::I, _) => srs_i_kicks(from, direction).to_vec(),
            _ => jlstz_kicks(from, direction).to_vec(),
        }
    }

    pub fn supports_flip(&self) -> bool {
        !matches!(self, RotationSystem::Nes)
    }
}

/// NES has no kicks. I, S and Z only have two visual states, so entering a
/// state applies a fixed shift that keeps them in the same place as the
/// state opposite to it.
fn nes_rotation(
    piece: &Piece,
    grid: &Grid,
    direction: RotationDirection,
    target: Rotation,
) -> Option<Piece> {
    if matches!(direction, RotationDirection::Half) {
        return None;
    }
    let (fx, fy) = nes_state_offset(piece.kind, piece.rotation);
    let (tx, ty) = nes_state_offset(piece.kind, target);
    let rotated = piece.rotated_to(target).shifted(tx - fx, ty - fy);
    (!grid.has_collision(&rotated)).then_some(rotated)
}

fn nes_state_offset(kind: TetrominoType, rotation: Rotation) -> (i32, i32) {
    match (kind, rotation) {
        (TetrominoType::I | TetrominoType::S | TetrominoType::Z, Rotation::South) => (0, -1),
        (TetrominoType::I | TetrominoType::S | TetrominoType::Z, Rotation::West) => (1, 0),
        _ => (0, 0),
    }
}

/// Wall kicks for J, L, S, T, Z pieces
fn jlstz_kicks(from: Rotation, direction: RotationDirection) -> Kicks {
    use Rotation::*;
    use RotationDirection::*;

    match (from, direction) {
        // 0→R
        (North, Clockwise) => [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
        // R→0
        (East, CounterClockwise) => [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
        // R→2
        (East, Clockwise) => [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],
        // 2→R
        (South, CounterClockwise) => [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)],
        // 2→L
        (South, Clockwise) => [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
        // L→2
        (West, CounterClockwise) => [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
        // L→0
        (West, Clockwise) => [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],
        // 0→L
        (North, CounterClockwise) => [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],
        (_, Half) => [(0, 0); 5],
    }
}

/// Wall kicks for the I piece
fn srs_i_kicks(from: Rotation, direction: RotationDirection) -> Kicks {
    use Rotation::*;
    use RotationDirection::*;

    match (from, direction) {
        (North, Clockwise) => [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
        (East, CounterClockwise) => [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        (East, Clockwise) => [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        (South, CounterClockwise) => [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        (South, Clockwise) => [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        (West, CounterClockwise) => [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)],
        (West, Clockwise) => [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        (North, CounterClockwise) => [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        (_, Half) => [(0, 0); 5],
    }
}

/// Revised I kicks of SRS+, symmetric between left and right
fn srs_plus_i_kicks(from: Rotation, direction: RotationDirection) -> Kicks {
    use Rotation::*;
    use RotationDirection::*;

    match (from, direction) {
        (North, Clockwise) => [(0, 0), (1, 0), (-2, 0), (-2, -1), (1, 2)],
        (East, CounterClockwise) => [(0, 0), (-1, 0), (2, 0), (-1, -2), (2, 1)],
        (East, Clockwise) => [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)],
        (South, CounterClockwise) => [(0, 0), (-2, 0), (1, 0), (-2, 1), (1, -2)],
        (South, Clockwise) => [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)],
        (West, CounterClockwise) => [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        (West, Clockwise) => [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)],
        (North, CounterClockwise) => [(0, 0), (-1, 0), (2, 0), (2, -1), (-1, 2)],
        (_, Half) => [(0, 0); 5],
    }
}

/// 180° kicks, shared by every piece but O
fn flip_kicks(from: Rotation) -> [(i32, i32); 6] {
    match from {
        Rotation::North => [(0, 0), (0, 1), (1, 1), (-1, 1), (1, 0), (-1, 0)],
        Rotation::East => [(0, 0), (1, 0), (1, 2), (1, 1), (0, 2), (0, 1)],
        Rotation::South => [(0, 0), (0, -1), (-1, -1), (1, -1), (-1, 0), (1, 0)],
        Rotation::West => [(0, 0), (-1, 0), (-1, 2), (-1, 1), (0, 2), (0, 1)],
    }
}
