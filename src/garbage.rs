//! Incoming garbage, shared between the network thread and the tick loop

use crate::grid::Grid;
use crate::piece::Piece;
use rand::Rng;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One queued attack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attack {
    pub rows: usize,
    pub empty_column: usize,
}

/// Garbage rows sent to the opponent for a lock that cleared `lines`
pub fn attack_for_lines(lines: usize) -> usize {
    match lines {
        2 => 1,
        3 => 2,
        4 => 4,
        _ => 0,
    }
}

/// Pick the hole column of an outgoing attack
pub fn random_hole(columns: usize) -> usize {
    rand::thread_rng().gen_range(0..columns.max(1))
}

/// FIFO of attacks waiting to be pushed into a grid
///
/// Row counts and hole columns travel together as one entry, so the two can
/// never get out of step, and draining takes the whole queue under a single
/// lock.
#[derive(Debug, Default)]
pub struct GarbageQueue {
    pending: Mutex<VecDeque<Attack>>,
}

impl GarbageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<Attack>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue an attack; safe to call from any thread
    pub fn add_garbage(&self, rows: usize, empty_column: usize) {
        if rows == 0 {
            return;
        }
        self.lock().push_back(Attack { rows, empty_column });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Total rows waiting
    pub fn pending_rows(&self) -> usize {
        self.lock().iter().map(|attack| attack.rows).sum()
    }

    /// Push every queued attack into the grid. Returns true if any of them
    /// overflowed the top.
    ///
    /// A piece still falling is lifted just enough not to be buried, never
    /// past the top row. A piece that already locked this tick rides up with
    /// the stack it rests on.
    pub fn apply_pending(&self, grid: &mut Grid, piece: &mut Piece, is_locked: bool) -> bool {
        let pending: Vec<Attack> = self.lock().drain(..).collect();

        let mut overflow = false;
        for Attack { rows, empty_column } in pending {
            let lift = rows as i32;
            if is_locked {
                piece.y -= lift;
            } else {
                let distance = grid.distance_to_floor(piece);
                if lift > distance {
                    let headroom = (piece.y + piece.top_offset()).max(0);
                    piece.y -= (lift - distance).min(headroom);
                }
            }
            overflow |= grid.add_garbage(rows, empty_column);
        }
        overflow
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Cell;
    use crate::tetromino::TetrominoType;
    use ratatui::style::Color;
    use std::sync::Arc;

    #[test]
    fn test_attack_table() {
        assert_eq!(
            (0..=4).map(attack_for_lines).collect::<Vec<_>>(),
            vec![0, 0, 1, 2, 4]
        );
    }

    #[test]
    fn test_random_hole_in_range() {
        for _ in 0..100 {
            assert!(random_hole(10) < 10);
        }
    }

    #[test]
    fn test_empty_queue_is_a_no_op() {
        let queue = GarbageQueue::new();
        let mut grid = Grid::standard();
        let mut piece = Piece::spawn(TetrominoType::T, &grid);
        let before = (grid.clone(), piece);
        assert!(!queue.apply_pending(&mut grid, &mut piece, false));
        assert_eq!((grid, piece), before);
    }

    #[test]
    fn test_pending_is_drained_in_order() {
        let queue = GarbageQueue::new();
        queue.add_garbage(1, 0);
        queue.add_garbage(2, 5);
        queue.add_garbage(0, 3);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pending_rows(), 3);

        let mut grid = Grid::standard();
        let mut piece = Piece::spawn(TetrominoType::T, &grid);
        assert!(!queue.apply_pending(&mut grid, &mut piece, false));
        assert!(queue.is_empty());

        let bottom = grid.rows() as i32 - 1;
        // The later attack ends up at the bottom
        assert!(!grid.is_cell_filled(5, bottom));
        assert!(!grid.is_cell_filled(5, bottom - 1));
        assert!(!grid.is_cell_filled(0, bottom - 2));
        assert!(grid.is_cell_filled(0, bottom));
    }

    #[test]
    fn test_falling_piece_is_lifted_out_of_garbage() {
        let queue = GarbageQueue::new();
        let mut grid = Grid::standard();
        let bottom = grid.rows() as i32;
        let mut piece = Piece::new(TetrominoType::O, 3, bottom - 3);
        assert_eq!(grid.distance_to_floor(&piece), 1);

        queue.add_garbage(3, 0);
        assert!(!queue.apply_pending(&mut grid, &mut piece, false));
        assert_eq!(piece.y, bottom - 5);
        assert!(!grid.has_collision(&piece));
        assert!(piece.is_resting(&grid));
    }

    #[test]
    fn test_lift_stops_at_top_row() {
        let queue = GarbageQueue::new();
        let mut grid = Grid::standard();
        let mut piece = Piece::new(TetrominoType::O, 3, 0);
        // Column 0 reaches the top, column 4 stops just under the piece
        for row in 0..grid.rows() as i32 {
            grid.set(0, row, Cell::Filled(Color::Red));
            if row >= 2 {
                grid.set(4, row, Cell::Filled(Color::Red));
            }
        }
        queue.add_garbage(2, 9);
        assert!(queue.apply_pending(&mut grid, &mut piece, false));
        assert_eq!(piece.y + piece.top_offset(), 0);
    }

    #[test]
    fn test_locked_piece_rides_with_stack() {
        let queue = GarbageQueue::new();
        let mut grid = Grid::standard();
        let bottom = grid.rows() as i32;
        let mut piece = Piece::new(TetrominoType::O, 3, bottom - 2);
        queue.add_garbage(2, 0);
        assert!(!queue.apply_pending(&mut grid, &mut piece, true));
        assert_eq!(piece.y, bottom - 4);
        assert!(piece.is_resting(&grid));
    }

    #[test]
    fn test_concurrent_producers() {
        let queue = Arc::new(GarbageQueue::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        queue.add_garbage(1, 2);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(queue.len(), 400);
    }
}
