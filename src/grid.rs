//! Playfield representation and collision detection

use crate::piece::Piece;
use ratatui::style::Color;

/// Standard Tetris board dimensions
pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 20;
/// Hidden rows above the visible board for spawning
pub const SPAWN_ROWS: usize = 4;

/// Color used for every garbage cell
pub const GARBAGE_COLOR: Color = Color::DarkGray;

/// A cell on the board - either empty or filled with a color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Filled(Color),
}

impl Cell {
    pub fn is_empty(&self) -> bool {
        matches!(self, Cell::Empty)
    }

    pub fn is_filled(&self) -> bool {
        matches!(self, Cell::Filled(_))
    }
}

/// The playfield: `spawn_rows` hidden rows on top of the visible area.
/// Row 0 is the top row and rows grow downward.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    columns: usize,
    spawn_rows: usize,
    rows: usize,
    /// Row-major cells (`row * columns + col`)
    cells: Vec<Cell>,
}

impl Default for Grid {
    fn default() -> Self {
        Self::standard()
    }
}

impl Grid {
    pub fn new(columns: usize, visible_rows: usize, spawn_rows: usize) -> Self {
        let rows = visible_rows + spawn_rows;
        Self {
            columns,
            spawn_rows,
            rows,
            cells: vec![Cell::Empty; columns * rows],
        }
    }

    /// 10 x 20 visible, with the hidden spawn rows on top
    pub fn standard() -> Self {
        Self::new(BOARD_WIDTH, BOARD_HEIGHT, SPAWN_ROWS)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Total rows, hidden spawn rows included
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn spawn_rows(&self) -> usize {
        self.spawn_rows
    }

    pub fn visible_rows(&self) -> usize {
        self.rows - self.spawn_rows
    }

    fn index(&self, col: i32, row: i32) -> Option<usize> {
        if col < 0 || row < 0 || col as usize >= self.columns || row as usize >= self.rows {
            return None;
        }
        Some(row as usize * self.columns + col as usize)
    }

    /// Get the cell at `(col, row)`, `None` if out of bounds
    pub fn get(&self, col: i32, row: i32) -> Option<Cell> {
        self.index(col, row).map(|i| self.cells[i])
    }

    /// Set a cell, returns false if out of bounds
    pub fn set(&mut self, col: i32, row: i32, cell: Cell) -> bool {
        match self.index(col, row) {
            Some(i) => {
                self.cells[i] = cell;
                true
            }
            None => false,
        }
    }

    pub fn is_cell_filled(&self, col: i32, row: i32) -> bool {
        self.get(col, row).is_some_and(|cell| cell.is_filled())
    }

    pub fn cell_color(&self, col: i32, row: i32) -> Option<Color> {
        match self.get(col, row)? {
            Cell::Filled(color) => Some(color),
            Cell::Empty => None,
        }
    }

    /// True if any cell of the piece is left/right/below the grid or
    /// overlaps a filled cell. Cells above the grid never collide.
    pub fn has_collision(&self, piece: &Piece) -> bool {
        piece.cells().iter().any(|&(col, row)| {
            if col < 0 || col as usize >= self.columns || row >= self.rows as i32 {
                return true;
            }
            row >= 0 && self.is_cell_filled(col, row)
        })
    }

    /// Number of steps the piece can still move down
    pub fn distance_to_floor(&self, piece: &Piece) -> i32 {
        let mut probe = *piece;
        let mut distance = 0;
        while distance <= self.rows as i32 {
            probe.y += 1;
            if self.has_collision(&probe) {
                break;
            }
            distance += 1;
        }
        distance
    }

    /// Write the piece into the grid and clear any row it completed.
    /// Returns the number of lines cleared.
    pub fn lock_and_clear_lines(&mut self, piece: &Piece) -> usize {
        let color = piece.kind.color();
        let mut touched: Vec<usize> = Vec::with_capacity(4);
        for (col, row) in piece.cells() {
            if self.set(col, row, Cell::Filled(color)) && !touched.contains(&(row as usize)) {
                touched.push(row as usize);
            }
        }

        let full: Vec<usize> = touched
            .into_iter()
            .filter(|&row| self.is_line_full(row))
            .collect();
        if full.is_empty() {
            return 0;
        }

        // Compact from the bottom, skipping the cleared rows
        let mut write_row = self.rows;
        for read_row in (0..self.rows).rev() {
            if full.contains(&read_row) {
                continue;
            }
            write_row -= 1;
            if write_row != read_row {
                self.copy_row(read_row, write_row);
            }
        }
        for row in 0..write_row {
            self.fill_row(row, Cell::Empty);
        }

        full.len()
    }

    /// Push `row_count` garbage rows in from the bottom, leaving
    /// `empty_column` open. Returns true if any filled cell was pushed off
    /// the top.
    pub fn add_garbage(&mut self, row_count: usize, empty_column: usize) -> bool {
        let row_count = row_count.min(self.rows);
        if row_count == 0 {
            return false;
        }

        let overflow = (0..row_count).any(|row| self.row_has_blocks(row));

        for row in 0..self.rows - row_count {
            self.copy_row(row + row_count, row);
        }
        for row in self.rows - row_count..self.rows {
            self.fill_row(row, Cell::Filled(GARBAGE_COLOR));
            if empty_column < self.columns {
                self.cells[row * self.columns + empty_column] = Cell::Empty;
            }
        }

        overflow
    }

    /// Check if the board is completely empty
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(|cell| cell.is_empty())
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_filled()).count()
    }

    /// Iterate rows top to bottom
    pub fn rows_iter(&self) -> impl Iterator<Item = &[Cell]> {
        self.cells.chunks(self.columns)
    }

    fn row(&self, row: usize) -> &[Cell] {
        &self.cells[row * self.columns..(row + 1) * self.columns]
    }

    fn is_line_full(&self, row: usize) -> bool {
        self.row(row).iter().all(|cell| cell.is_filled())
    }

    fn row_has_blocks(&self, row: usize) -> bool {
        self.row(row).iter().any(|cell| cell.is_filled())
    }

    fn copy_row(&mut self, from: usize, to: usize) {
        let width = self.columns;
        self.cells
            .copy_within(from * width..(from + 1) * width, to * width);
    }

    fn fill_row(&mut self, row: usize, cell: Cell) {
        let width = self.columns;
        self.cells[row * width..(row + 1) * width].fill(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tetromino::{Rotation, TetrominoType};
    use proptest::prelude::*;

    fn fill_row_except(grid: &mut Grid, row: i32, hole: i32) {
        for col in 0..grid.columns() as i32 {
            if col != hole {
                grid.set(col, row, Cell::Filled(Color::Red));
            }
        }
    }

    #[test]
    fn test_new_board_is_empty() {
        let grid = Grid::standard();
        assert!(grid.is_empty());
        assert_eq!(grid.rows(), BOARD_HEIGHT + SPAWN_ROWS);
        assert_eq!(grid.visible_rows(), BOARD_HEIGHT);
    }

    #[test]
    fn test_out_of_bounds() {
        let grid = Grid::standard();
        assert_eq!(grid.get(-1, 0), None);
        assert_eq!(grid.get(0, -1), None);
        assert_eq!(grid.get(0, grid.rows() as i32), None);
        assert_eq!(grid.get(BOARD_WIDTH as i32, 0), None);
    }

    #[test]
    fn test_color_iff_filled() {
        let mut grid = Grid::standard();
        grid.set(2, 7, Cell::Filled(Color::Blue));
        assert!(grid.is_cell_filled(2, 7));
        assert_eq!(grid.cell_color(2, 7), Some(Color::Blue));
        assert!(!grid.is_cell_filled(3, 7));
        assert_eq!(grid.cell_color(3, 7), None);
    }

    #[test]
    fn test_collision_bounds() {
        let grid = Grid::standard();
        let bottom = grid.rows() as i32;
        // Above the grid is never a collision
        assert!(!grid.has_collision(&Piece::new(TetrominoType::O, 3, -2)));
        assert!(grid.has_collision(&Piece::new(TetrominoType::O, -2, 5)));
        assert!(grid.has_collision(&Piece::new(TetrominoType::O, 8, 5)));
        assert!(grid.has_collision(&Piece::new(TetrominoType::O, 3, bottom - 1)));
        assert!(!grid.has_collision(&Piece::new(TetrominoType::O, 3, bottom - 2)));
    }

    #[test]
    fn test_distance_to_floor() {
        let mut grid = Grid::standard();
        let piece = Piece::new(TetrominoType::O, 3, 0);
        assert_eq!(grid.distance_to_floor(&piece), grid.rows() as i32 - 2);
        grid.set(4, 10, Cell::Filled(Color::Red));
        assert_eq!(grid.distance_to_floor(&piece), 8);
    }

    #[test]
    fn test_clear_single_line_shifts_rows_down() {
        let mut grid = Grid::standard();
        let bottom = grid.rows() as i32 - 1;
        fill_row_except(&mut grid, bottom, 0);
        grid.set(5, bottom - 1, Cell::Filled(Color::Green));

        // Vertical I in column 0 completes the bottom row
        let piece = Piece {
            kind: TetrominoType::I,
            rotation: Rotation::West,
            x: -1,
            y: bottom - 3,
        };
        assert!(!grid.has_collision(&piece));
        assert_eq!(grid.lock_and_clear_lines(&piece), 1);
        assert_eq!(grid.cell_color(5, bottom), Some(Color::Green));
        assert!(grid.is_cell_filled(0, bottom));
        assert!(grid.is_cell_filled(0, bottom - 1));
        assert!(grid.is_cell_filled(0, bottom - 2));
        assert!(!grid.is_cell_filled(0, bottom - 3));
        assert_eq!(grid.filled_count(), 4);
    }

    #[test]
    fn test_tetris_clear() {
        let mut grid = Grid::standard();
        let bottom = grid.rows() as i32 - 1;
        for row in bottom - 3..=bottom {
            fill_row_except(&mut grid, row, 9);
        }
        let piece = Piece {
            kind: TetrominoType::I,
            rotation: Rotation::East,
            x: 7,
            y: bottom - 3,
        };
        assert_eq!(grid.lock_and_clear_lines(&piece), 4);
        assert!(grid.is_empty());
    }

    #[test]
    fn test_garbage_shifts_up_and_leaves_hole() {
        let mut grid = Grid::standard();
        let bottom = grid.rows() as i32 - 1;
        grid.set(1, bottom, Cell::Filled(Color::Red));

        assert!(!grid.add_garbage(2, 3));
        assert_eq!(grid.cell_color(1, bottom - 2), Some(Color::Red));
        for row in [bottom - 1, bottom] {
            for col in 0..BOARD_WIDTH as i32 {
                assert_eq!(grid.is_cell_filled(col, row), col != 3);
            }
            assert_eq!(grid.cell_color(0, row), Some(GARBAGE_COLOR));
        }
    }

    #[test]
    fn test_garbage_overflow_reports_discarded_blocks() {
        let mut grid = Grid::standard();
        grid.set(0, 1, Cell::Filled(Color::Red));
        assert!(!grid.add_garbage(1, 0));
        // The block is now on row 0 and gets pushed off
        assert!(grid.add_garbage(1, 0));
        assert!(!grid.add_garbage(0, 0));
    }

    #[test]
    fn test_garbage_row_then_filling_piece_clears_it() {
        let mut grid = Grid::standard();
        let bottom = grid.rows() as i32 - 1;
        grid.add_garbage(1, 4);
        let piece = Piece {
            kind: TetrominoType::I,
            rotation: Rotation::East,
            x: 2,
            y: bottom - 3,
        };
        assert!(!grid.has_collision(&piece));
        assert_eq!(grid.lock_and_clear_lines(&piece), 1);
        assert!(!grid.is_cell_filled(0, bottom));
        assert_eq!(grid.filled_count(), 3);
    }

    fn arb_grid() -> impl Strategy<Value = Grid> {
        prop::collection::vec(any::<bool>(), BOARD_WIDTH * 12).prop_map(|bits| {
            let mut grid = Grid::standard();
            let first = grid.rows() - 12;
            for (i, filled) in bits.into_iter().enumerate() {
                if filled {
                    let row = first + i / BOARD_WIDTH;
                    grid.set((i % BOARD_WIDTH) as i32, row as i32, Cell::Filled(Color::Red));
                }
            }
            grid
        })
    }

    fn arb_piece() -> impl Strategy<Value = Piece> {
        (0usize..7, 0i8..4, -2i32..10, 0i32..22).prop_map(|(kind, rot, x, y)| Piece {
            kind: TetrominoType::all()[kind],
            rotation: Rotation::from_index(rot).unwrap(),
            x,
            y,
        })
    }

    proptest! {
        #[test]
        fn collision_is_translation_consistent(
            bits in prop::collection::vec(any::<bool>(), 6 * 6),
            piece in arb_piece(),
            dx in 0i32..3,
            dy in 0i32..3,
        ) {
            // Blocks live in a 6x6 window so the shifted copy stays on the grid
            let mut grid = Grid::standard();
            let mut shifted_grid = Grid::standard();
            for (i, filled) in bits.iter().enumerate() {
                if *filled {
                    let (col, row) = ((i % 6) as i32 + 1, (i / 6) as i32 + 10);
                    grid.set(col, row, Cell::Filled(Color::Red));
                    shifted_grid.set(col + dx, row + dy, Cell::Filled(Color::Red));
                }
            }
            let piece = Piece { x: piece.x.clamp(0, 3), y: piece.y.clamp(8, 12), ..piece };
            prop_assert_eq!(
                grid.has_collision(&piece),
                shifted_grid.has_collision(&piece.shifted(dx, dy))
            );
        }

        #[test]
        fn line_clear_removes_whole_rows(grid in arb_grid(), piece in arb_piece()) {
            let mut grid = grid;
            prop_assume!(!grid.has_collision(&piece));
            prop_assume!(piece.cells().iter().all(|&(_, row)| row >= 0));
            let before = grid.filled_count() + 4;
            let cleared = grid.lock_and_clear_lines(&piece);
            prop_assert!(cleared <= 4);
            prop_assert_eq!(grid.filled_count(), before - cleared * BOARD_WIDTH);
        }

        #[test]
        fn garbage_overflows_exactly_when_discarded_rows_had_blocks(
            grid in arb_grid(),
            first in 0usize..24,
            hole in 0usize..BOARD_WIDTH,
        ) {
            let mut grid = grid;
            let total = grid.rows();
            let had_blocks = !grid.is_empty();
            let mut overflow = grid.add_garbage(first, hole);
            overflow |= grid.add_garbage(total - first, hole);
            prop_assert_eq!(overflow, had_blocks);
        }
    }
}
