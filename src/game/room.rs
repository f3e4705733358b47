use super::constants::{
  COLOR_POOL, DEFAULT_TICK_MS, MAX_PLAYERS, MAX_PLAYER_NAME_LENGTH, MAX_TICK_MS, MIN_TICK_MS,
  RESPAWN_RETRY_MS,
};
use super::engine;
use super::grid;
use super::types::{Direction, Food, Player, PlayerSnapshot, Role};
use crate::protocol::{self, ClientMessage, ServerMessage};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::{Mutex, Notify};
use uuid::Uuid;

/// The single game session this process hosts. All state mutation, whether
/// from an inbound command or from the tick loop, happens under one lock,
/// so a command is either fully visible to a tick or not at all.
#[derive(Debug)]
pub struct Room {
  state: Mutex<RoomState>,
  running: AtomicBool,
  speed_changed: Notify,
}

#[derive(Debug)]
struct SessionEntry {
  sender: UnboundedSender<String>,
  player_id: Option<String>,
}

#[derive(Debug)]
struct RoomState {
  sessions: HashMap<String, SessionEntry>,
  players: HashMap<String, Player>,
  food: Vec<Food>,
  started: bool,
  paused: bool,
  tick_ms: u64,
  joined_count: usize,
  admin_token: Option<String>,
}

impl Room {
  pub fn new(admin_token: Option<String>) -> Self {
    Self {
      state: Mutex::new(RoomState::new(admin_token)),
      running: AtomicBool::new(false),
      speed_changed: Notify::new(),
    }
  }

  pub async fn add_session(&self, sender: UnboundedSender<String>) -> String {
    let session_id = Uuid::new_v4().to_string();
    let mut state = self.state.lock().await;
    state.sessions.insert(
      session_id.clone(),
      SessionEntry {
        sender,
        player_id: None,
      },
    );
    session_id
  }

  pub async fn remove_session(&self, session_id: &str) {
    let mut state = self.state.lock().await;
    state.disconnect_session(session_id);
  }

  pub async fn handle_text_message(self: &Arc<Self>, session_id: &str, text: &str) {
    let Some(message) = protocol::decode_client_message(text) else { return };
    self.handle_client_message(session_id, message).await;
  }

  async fn handle_client_message(self: &Arc<Self>, session_id: &str, message: ClientMessage) {
    let mut state = self.state.lock().await;
    match message {
      ClientMessage::Join { name, credential } => {
        state.handle_join(session_id, name, credential);
        let joined = state
          .sessions
          .get(session_id)
          .is_some_and(|session| session.player_id.is_some());
        drop(state);
        if joined {
          self.ensure_loop();
        }
      }
      ClientMessage::Direction { value } => state.handle_direction(session_id, value),
      ClientMessage::Start => state.handle_start(session_id),
      ClientMessage::TogglePause => state.handle_toggle_pause(session_id),
      ClientMessage::SetSpeed { ms } => {
        state.handle_set_speed(session_id, ms);
        drop(state);
        // Wake the tick loop out of its in-flight sleep so the new period
        // takes effect immediately.
        self.speed_changed.notify_waiters();
      }
      ClientMessage::Reset => state.handle_reset(session_id),
      ClientMessage::Kick { target_id } => state.handle_kick(session_id, &target_id),
    }
  }

  /// Starts the tick loop if it is not already running. The `running` flag
  /// is only cleared while the state lock is held and the player set is
  /// empty, so at most one loop task exists at any time. The loop re-reads
  /// `tick_ms` every iteration, which is how `set_speed` swaps the period
  /// without ever having two timers alive.
  fn ensure_loop(self: &Arc<Self>) {
    if self
      .running
      .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
      .is_err()
    {
      return;
    }

    let room = Arc::clone(self);
    tokio::spawn(async move {
      loop {
        let delay = {
          let state = room.state.lock().await;
          if state.players.is_empty() {
            room.running.store(false, Ordering::SeqCst);
            tracing::info!("tick loop stopped, no players left");
            break;
          }
          std::time::Duration::from_millis(state.tick_ms)
        };
        tokio::select! {
          _ = tokio::time::sleep(delay) => {
            let mut state = room.state.lock().await;
            state.tick();
          }
          // A speed change restarts the wait with the new period.
          _ = room.speed_changed.notified() => {}
        }
      }
    });
  }
}

impl RoomState {
  fn new(admin_token: Option<String>) -> Self {
    Self {
      sessions: HashMap::new(),
      players: HashMap::new(),
      food: Vec::new(),
      started: false,
      paused: false,
      tick_ms: DEFAULT_TICK_MS,
      joined_count: 0,
      admin_token,
    }
  }

  fn now_millis() -> i64 {
    let now = SystemTime::now()
      .duration_since(UNIX_EPOCH)
      .unwrap_or_default();
    now.as_millis() as i64
  }

  fn tick(&mut self) {
    if self.players.is_empty() {
      return;
    }
    let now = Self::now_millis();
    self.auto_respawn(now);
    if !self.started || self.paused {
      return;
    }

    let events = engine::advance(&mut self.players, &mut self.food, now);
    for id in &events.deaths {
      tracing::debug!(player_id = %id, "player died");
      self.broadcast(&ServerMessage::PlayerDied { id: id.clone() }, None);
    }
    self.broadcast_snapshot();
  }

  fn auto_respawn(&mut self, now: i64) {
    let due: Vec<String> = self
      .players
      .iter()
      .filter_map(|(id, player)| {
        if player.alive {
          return None;
        }
        match player.respawn_at {
          Some(respawn_at) if now >= respawn_at => Some(id.clone()),
          _ => None,
        }
      })
      .collect();

    for id in due {
      self.respawn_player(&id);
    }
  }

  fn respawn_player(&mut self, player_id: &str) {
    if self.place_snake(player_id) {
      tracing::debug!(player_id, "player respawned");
      self.send_to_player(player_id, &ServerMessage::Respawned);
    }
  }

  /// Puts the player back on the board as a fresh single-segment snake.
  /// When the grid has no free cell left the respawn deadline is pushed
  /// back instead, the failure stays local to this player.
  fn place_snake(&mut self, player_id: &str) -> bool {
    let occupied = engine::occupied_cells(&self.players, &self.food);
    let Some(cell) = grid::random_free_cell(&occupied) else {
      tracing::warn!(player_id, "no free cell for respawn, retrying later");
      if let Some(player) = self.players.get_mut(player_id) {
        player.respawn_at = Some(Self::now_millis() + RESPAWN_RETRY_MS);
      }
      return false;
    };
    let Some(player) = self.players.get_mut(player_id) else { return false };
    player.snake = vec![cell];
    player.direction = None;
    player.alive = true;
    player.respawn_at = None;
    true
  }

  fn disconnect_session(&mut self, session_id: &str) {
    let Some(entry) = self.sessions.remove(session_id) else { return };
    let Some(player_id) = entry.player_id else { return };
    if self.players.remove(&player_id).is_some() {
      tracing::info!(player_id = %player_id, "player left");
      self.broadcast(&ServerMessage::PlayerLeft { id: player_id }, None);
    }
    if self.players.is_empty() {
      self.started = false;
      self.paused = false;
      self.joined_count = 0;
      tracing::info!("game stopped, no players left");
    }
  }

  fn handle_join(&mut self, session_id: &str, name: Option<String>, credential: Option<String>) {
    // A kicked or disconnected socket may still deliver frames; without a
    // live session entry there is nothing to attach a player to.
    let Some(session) = self.sessions.get(session_id) else { return };
    if session.player_id.is_some() {
      self.send_error(session_id, "already joined");
      return;
    }
    if self.players.len() >= MAX_PLAYERS {
      self.send_error(session_id, "server is full");
      return;
    }

    let raw_name = name.unwrap_or_else(|| "Player".to_string());
    let name = sanitize_player_name(&raw_name, "Player");
    if self.players.values().any(|player| player.name == name) {
      self.send_error(session_id, "name already taken");
      return;
    }

    let role = match self.resolve_role(credential) {
      Ok(role) => role,
      Err(message) => {
        self.send_error(session_id, &message);
        return;
      }
    };

    let occupied = engine::occupied_cells(&self.players, &self.food);
    let Some(cell) = grid::random_free_cell(&occupied) else {
      tracing::warn!("no free cell to spawn a new player");
      self.send_error(session_id, "no room to spawn");
      return;
    };

    let id = Uuid::new_v4().to_string();
    let color = COLOR_POOL[self.joined_count % COLOR_POOL.len()].to_string();
    self.joined_count += 1;

    let player = Player {
      id: id.clone(),
      name,
      color,
      role,
      snake: vec![cell],
      direction: None,
      score: 0,
      alive: true,
      respawn_at: None,
    };
    let snapshot = player.snapshot();
    self.players.insert(id.clone(), player);
    if let Some(session) = self.sessions.get_mut(session_id) {
      session.player_id = Some(id.clone());
    }
    tracing::info!(player_id = %id, name = %snapshot.name, role = ?role, "player joined");

    self.send_to(
      session_id,
      &ServerMessage::Joined {
        self_id: id.clone(),
        role,
        players: self.player_snapshots(),
        food: self.food.clone(),
        started: self.started,
        paused: self.paused,
        tick_ms: self.tick_ms,
      },
    );
    self.broadcast(&ServerMessage::PlayerJoined { player: snapshot }, Some(&id));
  }

  fn resolve_role(&self, credential: Option<String>) -> Result<Role, String> {
    let Some(token) = &self.admin_token else { return Ok(Role::Player) };
    let Some(credential) = credential else { return Ok(Role::Player) };
    if credential != *token {
      return Err("invalid credential".to_string());
    }
    let admin_present = self.players.values().any(|player| player.role == Role::Admin);
    if admin_present {
      return Err("admin seat is already taken".to_string());
    }
    Ok(Role::Admin)
  }

  fn handle_direction(&mut self, session_id: &str, value: Direction) {
    let Some(player_id) = self.session_player_id(session_id) else { return };
    let Some(player) = self.players.get_mut(&player_id) else { return };
    // 180-degree reversals are silently dropped, the previous vector stays.
    if player.direction == Some(value.opposite()) {
      return;
    }
    player.direction = Some(value);
  }

  fn handle_start(&mut self, session_id: &str) {
    let Some(player_id) = self.authorize(session_id) else { return };
    if self.started {
      return;
    }
    self.started = true;
    self.paused = false;
    self.food.clear();
    engine::ensure_food(&self.players, &mut self.food);
    tracing::info!(player_id = %player_id, "game started");
    self.broadcast(&ServerMessage::GameStarted, None);
  }

  fn handle_toggle_pause(&mut self, session_id: &str) {
    let Some(player_id) = self.authorize(session_id) else { return };
    self.paused = !self.paused;
    tracing::info!(player_id = %player_id, paused = self.paused, "pause toggled");
    self.broadcast(&ServerMessage::GamePaused { paused: self.paused }, None);
  }

  fn handle_set_speed(&mut self, session_id: &str, ms: u64) {
    let Some(player_id) = self.session_player_id(session_id) else { return };
    let ms = ms.clamp(MIN_TICK_MS, MAX_TICK_MS);
    self.tick_ms = ms;
    tracing::info!(player_id = %player_id, ms, "tick interval changed");
    self.broadcast(&ServerMessage::SpeedChanged { ms }, None);
  }

  fn handle_reset(&mut self, session_id: &str) {
    let Some(player_id) = self.authorize(session_id) else { return };
    self.started = false;
    self.paused = false;
    self.food.clear();

    let mut ids: Vec<String> = self.players.keys().cloned().collect();
    ids.sort();
    for id in &ids {
      if let Some(player) = self.players.get_mut(id) {
        player.snake.clear();
        player.score = 0;
        player.alive = false;
      }
    }
    for id in &ids {
      self.place_snake(id);
    }
    engine::ensure_food(&self.players, &mut self.food);
    tracing::info!(player_id = %player_id, "game reset");
    self.broadcast_snapshot();
  }

  fn handle_kick(&mut self, session_id: &str, target_id: &str) {
    let Some(caller_id) = self.session_player_id(session_id) else { return };
    let caller_is_admin = self
      .players
      .get(&caller_id)
      .is_some_and(|player| player.role == Role::Admin);
    if !caller_is_admin {
      self.send_error(session_id, "admin privileges required");
      return;
    }

    let target_session = self
      .sessions
      .iter()
      .find(|(_, session)| session.player_id.as_deref() == Some(target_id))
      .map(|(id, _)| id.clone());
    let Some(target_session) = target_session else {
      self.send_error(session_id, "no such player");
      return;
    };

    self.send_to(
      &target_session,
      &ServerMessage::Kicked {
        reason: "kicked by admin".to_string(),
      },
    );
    tracing::info!(target_id, caller_id = %caller_id, "player kicked");
    self.disconnect_session(&target_session);
  }

  /// Lifecycle commands are admin-only when a token is configured and open
  /// to every joined player otherwise. Rejections reply with an error
  /// message and leave the state untouched.
  fn authorize(&mut self, session_id: &str) -> Option<String> {
    let player_id = self.session_player_id(session_id)?;
    if self.admin_token.is_none() {
      return Some(player_id);
    }
    let is_admin = self
      .players
      .get(&player_id)
      .is_some_and(|player| player.role == Role::Admin);
    if is_admin {
      Some(player_id)
    } else {
      self.send_error(session_id, "admin privileges required");
      None
    }
  }

  fn session_player_id(&self, session_id: &str) -> Option<String> {
    self
      .sessions
      .get(session_id)
      .and_then(|session| session.player_id.clone())
  }

  fn player_snapshots(&self) -> Vec<PlayerSnapshot> {
    let mut snapshots: Vec<PlayerSnapshot> =
      self.players.values().map(Player::snapshot).collect();
    snapshots.sort_by(|a, b| a.id.cmp(&b.id));
    snapshots
  }

  fn broadcast_snapshot(&mut self) {
    let message = ServerMessage::State {
      players: self.player_snapshots(),
      food: self.food.clone(),
      started: self.started,
      paused: self.paused,
    };
    self.broadcast(&message, None);
  }

  /// Serializes once and fans out. A failed send only drops that one
  /// session, the rest of the fleet still gets the payload.
  fn broadcast(&mut self, message: &ServerMessage, exclude_player: Option<&str>) {
    let Some(payload) = protocol::encode_server_message(message) else { return };
    let mut stale = Vec::new();
    for (session_id, session) in &self.sessions {
      // Fan-out goes to joined players only; a connected-but-unjoined
      // session hears nothing until its own join reply.
      let Some(player_id) = session.player_id.as_deref() else { continue };
      if exclude_player == Some(player_id) {
        continue;
      }
      if session.sender.send(payload.clone()).is_err() {
        stale.push(session_id.clone());
      }
    }
    for session_id in stale {
      tracing::warn!(session_id = %session_id, "dropping unreachable session");
      self.disconnect_session(&session_id);
    }
  }

  fn send_to(&mut self, session_id: &str, message: &ServerMessage) {
    let Some(payload) = protocol::encode_server_message(message) else { return };
    let failed = match self.sessions.get(session_id) {
      Some(session) => session.sender.send(payload).is_err(),
      None => false,
    };
    if failed {
      tracing::warn!(session_id, "dropping unreachable session");
      self.disconnect_session(session_id);
    }
  }

  fn send_to_player(&mut self, player_id: &str, message: &ServerMessage) {
    let session_id = self
      .sessions
      .iter()
      .find(|(_, session)| session.player_id.as_deref() == Some(player_id))
      .map(|(id, _)| id.clone());
    if let Some(session_id) = session_id {
      self.send_to(&session_id, message);
    }
  }

  fn send_error(&mut self, session_id: &str, message: &str) {
    self.send_to(
      session_id,
      &ServerMessage::Error {
        message: message.to_string(),
      },
    );
  }
}

fn sanitize_player_name(name: &str, fallback: &str) -> String {
  let cleaned = name.split_whitespace().collect::<Vec<_>>().join(" ");
  if cleaned.is_empty() {
    return fallback.to_string();
  }
  cleaned.chars().take(MAX_PLAYER_NAME_LENGTH).collect()
}
