use super::constants::{DEATH_PENALTY, FOOD_COLOR, FOOD_REWARD, INITIAL_FOOD_COUNT, RESPAWN_DELAY_MS};
use super::grid::{self, Cell};
use super::types::{Food, Player};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct TickEvents {
  pub deaths: Vec<String>,
}

/// Advances every living, moving snake by one step and resolves the outcome
/// in fixed order: wall, self, other snake, food. Collision checks run
/// against the bodies as they stood when the tick began, so the result does
/// not depend on which player happens to move first within the tick.
pub fn advance(
  players: &mut HashMap<String, Player>,
  food: &mut Vec<Food>,
  now: i64,
) -> TickEvents {
  let mut events = TickEvents::default();

  let mut ids: Vec<String> = players.keys().cloned().collect();
  ids.sort();

  let start_bodies: HashMap<String, Vec<Cell>> = players
    .iter()
    .filter(|(_, player)| player.alive)
    .map(|(id, player)| (id.clone(), player.snake.clone()))
    .collect();

  for id in &ids {
    let (direction, head) = match players.get(id) {
      Some(player) if player.alive => {
        match (player.direction, player.snake.first().copied()) {
          (Some(direction), Some(head)) => (direction, head),
          _ => continue,
        }
      }
      _ => continue,
    };

    let (dx, dy) = direction.delta();
    let new_head = head.offset(dx, dy);

    let lethal = !grid::within_bounds(new_head)
      || start_bodies
        .get(id)
        .is_some_and(|body| body.contains(&new_head))
      || start_bodies
        .iter()
        .any(|(other_id, body)| other_id != id && body.contains(&new_head));

    let eaten = if lethal {
      None
    } else {
      food.iter().position(|item| item.cell == new_head)
    };

    {
      let Some(player) = players.get_mut(id) else { continue };
      if lethal {
        player.alive = false;
        player.direction = None;
        player.score = (player.score - DEATH_PENALTY).max(0);
        player.respawn_at = Some(now + RESPAWN_DELAY_MS);
        events.deaths.push(id.clone());
        continue;
      }

      player.snake.insert(0, new_head);
      match eaten {
        Some(index) => {
          food.remove(index);
          player.score += FOOD_REWARD;
        }
        None => {
          player.snake.pop();
        }
      }
    }

    if eaten.is_some() {
      spawn_food(players, food);
    }
  }

  events
}

/// Every cell a living snake or a food item currently covers.
pub fn occupied_cells(players: &HashMap<String, Player>, food: &[Food]) -> HashSet<Cell> {
  players
    .values()
    .filter(|player| player.alive)
    .flat_map(|player| player.snake.iter().copied())
    .chain(food.iter().map(|item| item.cell))
    .collect()
}

pub fn spawn_food(players: &HashMap<String, Player>, food: &mut Vec<Food>) {
  let occupied = occupied_cells(players, food);
  match grid::random_free_cell(&occupied) {
    Some(cell) => food.push(Food {
      cell,
      color: FOOD_COLOR.to_string(),
    }),
    None => tracing::warn!("no free cell left for food"),
  }
}

/// Tops the food pool back up to its target size.
pub fn ensure_food(players: &HashMap<String, Player>, food: &mut Vec<Food>) {
  while food.len() < INITIAL_FOOD_COUNT {
    let before = food.len();
    spawn_food(players, food);
    if food.len() == before {
      break;
    }
  }
}
