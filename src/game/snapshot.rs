//! Snapshot building for network transmission

use std::collections::HashMap;

use crate::ws::protocol::ServerMsg;

use super::{PlayerId, Position, World};

/// A consistent copy of the world, taken once per broadcast
#[derive(Debug, Clone)]
pub struct Snapshot {
    snake: Vec<Position>,
    fruits: HashMap<PlayerId, Position>,
    score: u32,
    game_over: bool,
    grid_width: i32,
    grid_height: i32,
}

impl Snapshot {
    pub fn capture(world: &World) -> Self {
        let grid = world.grid();
        Self {
            snake: world.snake().copied().collect(),
            fruits: world.fruits().clone(),
            score: world.score(),
            game_over: world.is_terminal(),
            grid_width: grid.width(),
            grid_height: grid.height(),
        }
    }

    /// Build the `game_state` message for one viewer.
    /// Fruit players get their own id echoed back.
    pub fn to_message(&self, viewer: Option<PlayerId>) -> ServerMsg {
        ServerMsg::GameState {
            snake: self.snake.clone(),
            fruits: self.fruits.clone(),
            score: self.score,
            game_over: self.game_over,
            grid_width: self.grid_width,
            grid_height: self.grid_height,
            your_player_id: viewer,
        }
    }
}
