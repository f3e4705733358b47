pub const GRID_WIDTH: i32 = 35;
pub const GRID_HEIGHT: i32 = 35;

pub const INITIAL_FOOD_COUNT: usize = 5;
pub const FOOD_REWARD: i64 = 10;
pub const DEATH_PENALTY: i64 = 5;

pub const DEFAULT_TICK_MS: u64 = 100;
pub const MIN_TICK_MS: u64 = 50;
pub const MAX_TICK_MS: u64 = 200;

pub const RESPAWN_DELAY_MS: i64 = 3000;
pub const RESPAWN_RETRY_MS: i64 = 500;

pub const MAX_PLAYERS: usize = 32;
pub const MAX_PLAYER_NAME_LENGTH: usize = 20;

pub const FOOD_COLOR: &str = "#f00";

pub const COLOR_POOL: [&str; 9] = [
  "#0f0",
  "#00f",
  "#ff0",
  "#0ff",
  "#f0f",
  "#ff8800",
  "#8800ff",
  "#00ff88",
  "#ff0088",
];
