//! Tetromino definitions and shapes
//!
//! All 7 standard tetrominoes with their four rotation states laid out in
//! SRS bounding boxes. Offsets are `(col, row)` inside the box, row grows
//! downward to match the grid.

use ratatui::style::Color;

/// Cell offsets of one rotation state
pub type Shape = [(i32, i32); 4];

/// The 7 tetromino types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TetrominoType {
    I, // Cyan - long bar
    O, // Yellow - square
    T, // Purple - T-shape
    S, // Green - S-shape
    Z, // Red - Z-shape
    J, // Blue - J-shape
    L, // Orange - L-shape
}

impl TetrominoType {
    /// Get the color for this tetromino
    pub fn color(&self) -> Color {
        match self {
            TetrominoType::I => Color::Cyan,
            TetrominoType::O => Color::Yellow,
            TetrominoType::T => Color::Magenta,
            TetrominoType::S => Color::Green,
            TetrominoType::Z => Color::Red,
            TetrominoType::J => Color::Blue,
            TetrominoType::L => Color::Rgb(255, 165, 0), // Orange
        }
    }

    /// Get all tetromino types for bag randomization
    pub fn all() -> [TetrominoType; 7] {
        [
            TetrominoType::I,
            TetrominoType::O,
            TetrominoType::T,
            TetrominoType::S,
            TetrominoType::Z,
            TetrominoType::J,
            TetrominoType::L,
        ]
    }

    /// Get the shape offsets for this tetromino at a given rotation
    pub fn shape(&self, rotation: Rotation) -> Shape {
        use Rotation::*;
        match self {
            // ....   ..I.   ....   .I..
            // IIII   ..I.   ....   .I..
            // ....   ..I.   IIII   .I..
            // ....   ..I.   ....   .I..
            TetrominoType::I => match rotation {
                North => [(0, 1), (1, 1), (2, 1), (3, 1)],
                East => [(2, 0), (2, 1), (2, 2), (2, 3)],
                South => [(0, 2), (1, 2), (2, 2), (3, 2)],
                West => [(1, 0), (1, 1), (1, 2), (1, 3)],
            },
            TetrominoType::O => [(1, 0), (2, 0), (1, 1), (2, 1)],
            TetrominoType::T => match rotation {
                North => [(1, 0), (0, 1), (1, 1), (2, 1)],
                East => [(1, 0), (1, 1), (2, 1), (1, 2)],
                South => [(0, 1), (1, 1), (2, 1), (1, 2)],
                West => [(1, 0), (0, 1), (1, 1), (1, 2)],
            },
            // North: .SS.   East: .S..   South: ....   West: S...
            //        SS..         .SS.          .SS.         SS..
            //                     ..S.          SS..         .S..
            TetrominoType::S => match rotation {
                North => [(1, 0), (2, 0), (0, 1), (1, 1)],
                East => [(1, 0), (1, 1), (2, 1), (2, 2)],
                South => [(1, 1), (2, 1), (0, 2), (1, 2)],
                West => [(0, 0), (0, 1), (1, 1), (1, 2)],
            },
            TetrominoType::Z => match rotation {
                North => [(0, 0), (1, 0), (1, 1), (2, 1)],
                East => [(2, 0), (1, 1), (2, 1), (1, 2)],
                South => [(0, 1), (1, 1), (1, 2), (2, 2)],
                West => [(1, 0), (0, 1), (1, 1), (0, 2)],
            },
            TetrominoType::J => match rotation {
                North => [(0, 0), (0, 1), (1, 1), (2, 1)],
                East => [(1, 0), (2, 0), (1, 1), (1, 2)],
                South => [(0, 1), (1, 1), (2, 1), (2, 2)],
                West => [(1, 0), (1, 1), (0, 2), (1, 2)],
            },
            TetrominoType::L => match rotation {
                North => [(2, 0), (0, 1), (1, 1), (2, 1)],
                East => [(1, 0), (1, 1), (1, 2), (2, 2)],
                South => [(0, 1), (1, 1), (2, 1), (0, 2)],
                West => [(0, 0), (1, 0), (1, 1), (1, 2)],
            },
        }
    }
}

/// Rotation states (using SRS naming convention)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Rotation {
    #[default]
    North, // Spawn state
    East,  // Clockwise from North
    South, // 180 from North
    West,  // Counter-clockwise from North
}

impl Rotation {
    /// Rotate clockwise: North → East → South → West → North
    pub fn cw(&self) -> Rotation {
        match self {
            Rotation::North => Rotation::East,
            Rotation::East => Rotation::South,
            Rotation::South => Rotation::West,
            Rotation::West => Rotation::North,
        }
    }

    /// Rotate counter-clockwise: North → West → South → East → North
    pub fn ccw(&self) -> Rotation {
        match self {
            Rotation::North => Rotation::West,
            Rotation::West => Rotation::South,
            Rotation::South => Rotation::East,
            Rotation::East => Rotation::North,
        }
    }

    pub fn flipped(&self) -> Rotation {
        self.cw().cw()
    }

    /// Wire/table index: North = 0 through West = 3
    pub fn index(&self) -> usize {
        match self {
            Rotation::North => 0,
            Rotation::East => 1,
            Rotation::South => 2,
            Rotation::West => 3,
        }
    }

    pub fn from_index(index: i8) -> Option<Rotation> {
        match index {
            0 => Some(Rotation::North),
            1 => Some(Rotation::East),
            2 => Some(Rotation::South),
            3 => Some(Rotation::West),
            _ => None,
        }
    }
}

/// Direction for rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationDirection {
    Clockwise,
    CounterClockwise,
    Half,
}

impl RotationDirection {
    pub fn apply(&self, rotation: Rotation) -> Rotation {
        match self {
            RotationDirection::Clockwise => rotation.cw(),
            RotationDirection::CounterClockwise => rotation.ccw(),
            RotationDirection::Half => rotation.flipped(),
        }
    }
}
