use crate::game::types::{Direction, Food, PlayerSnapshot, Role};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
  Join {
    name: Option<String>,
    credential: Option<String>,
  },
  Direction {
    value: Direction,
  },
  Start,
  TogglePause,
  SetSpeed {
    ms: u64,
  },
  Reset,
  Kick {
    target_id: String,
  },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
  Joined {
    self_id: String,
    role: Role,
    players: Vec<PlayerSnapshot>,
    food: Vec<Food>,
    started: bool,
    paused: bool,
    tick_ms: u64,
  },
  PlayerJoined {
    player: PlayerSnapshot,
  },
  PlayerLeft {
    id: String,
  },
  GameStarted,
  GamePaused {
    paused: bool,
  },
  SpeedChanged {
    ms: u64,
  },
  State {
    players: Vec<PlayerSnapshot>,
    food: Vec<Food>,
    started: bool,
    paused: bool,
  },
  PlayerDied {
    id: String,
  },
  Respawned,
  Kicked {
    reason: String,
  },
  Error {
    message: String,
  },
}

/// Unknown or malformed messages are dropped, never fatal to the connection.
pub fn decode_client_message(text: &str) -> Option<ClientMessage> {
  match serde_json::from_str(text) {
    Ok(message) => Some(message),
    Err(error) => {
      tracing::debug!(%error, "ignoring unparseable client message");
      None
    }
  }
}

pub fn encode_server_message(message: &ServerMessage) -> Option<String> {
  match serde_json::to_string(message) {
    Ok(payload) => Some(payload),
    Err(error) => {
      tracing::error!(%error, "failed to encode server message");
      None
    }
  }
}
