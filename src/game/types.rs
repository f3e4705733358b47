use super::grid::Cell;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
  Up,
  Down,
  Left,
  Right,
}

impl Direction {
  pub fn delta(self) -> (i32, i32) {
    match self {
      Direction::Up => (0, -1),
      Direction::Down => (0, 1),
      Direction::Left => (-1, 0),
      Direction::Right => (1, 0),
    }
  }

  pub fn opposite(self) -> Direction {
    match self {
      Direction::Up => Direction::Down,
      Direction::Down => Direction::Up,
      Direction::Left => Direction::Right,
      Direction::Right => Direction::Left,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Player,
  Admin,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Food {
  pub cell: Cell,
  pub color: String,
}

#[derive(Debug, Clone)]
pub struct Player {
  pub id: String,
  pub name: String,
  pub color: String,
  pub role: Role,
  pub snake: Vec<Cell>,
  pub direction: Option<Direction>,
  pub score: i64,
  pub alive: bool,
  pub respawn_at: Option<i64>,
}

impl Player {
  pub fn snapshot(&self) -> PlayerSnapshot {
    PlayerSnapshot {
      id: self.id.clone(),
      name: self.name.clone(),
      color: self.color.clone(),
      role: self.role,
      snake: self.snake.clone(),
      score: self.score,
      alive: self.alive,
    }
  }
}

/// The client-facing view of a player. Transport handles live in the
/// session table, never here.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerSnapshot {
  pub id: String,
  pub name: String,
  pub color: String,
  pub role: Role,
  pub snake: Vec<Cell>,
  pub score: i64,
  pub alive: bool,
}
