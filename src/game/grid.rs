use super::constants::{GRID_HEIGHT, GRID_WIDTH};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cell {
  pub x: i32,
  pub y: i32,
}

impl Cell {
  pub fn offset(self, dx: i32, dy: i32) -> Cell {
    Cell {
      x: self.x + dx,
      y: self.y + dy,
    }
  }
}

pub fn within_bounds(cell: Cell) -> bool {
  cell.x >= 0 && cell.x < GRID_WIDTH && cell.y >= 0 && cell.y < GRID_HEIGHT
}

pub fn cell_count() -> usize {
  (GRID_WIDTH * GRID_HEIGHT) as usize
}

/// Picks a cell uniformly from the in-bounds cells not present in `occupied`.
/// Returns `None` when every cell is taken.
pub fn random_free_cell(occupied: &HashSet<Cell>) -> Option<Cell> {
  let free: Vec<Cell> = (0..GRID_WIDTH)
    .flat_map(|x| (0..GRID_HEIGHT).map(move |y| Cell { x, y }))
    .filter(|cell| !occupied.contains(cell))
    .collect();
  if free.is_empty() {
    return None;
  }
  let mut rng = rand::thread_rng();
  Some(free[rng.gen_range(0..free.len())])
}
