//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::game::{PlayerId, Position};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Role declaration: steer the snake
    Host,

    /// Role declaration: control one fruit
    FruitPlayer,

    /// Host: buffer the next heading ("UP", "DOWN", "LEFT" or "RIGHT")
    Direction { direction: String },

    /// Host: restart the game
    Reset,

    /// Fruit player: move own fruit to a tile
    Move { x: i32, y: i32 },
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Host registration accepted
    HostRegistered { status: String },

    /// Fruit player registration accepted
    PlayerRegistered {
        player_id: PlayerId,
        grid_width: i32,
        grid_height: i32,
    },

    /// Protocol error; the connection is closed after this
    Error { message: String },

    /// Full world snapshot
    GameState {
        /// Head first
        snake: Vec<Position>,
        fruits: HashMap<PlayerId, Position>,
        score: u32,
        game_over: bool,
        grid_width: i32,
        grid_height: i32,
        /// Only present in snapshots sent to fruit players
        #[serde(default, skip_serializing_if = "Option::is_none")]
        your_player_id: Option<PlayerId>,
    },

    /// The game ended on this tick
    GameOver { score: u32 },
}
