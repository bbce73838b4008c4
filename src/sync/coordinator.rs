//! Synchronization layer: owns the world and the sessions, routes intents,
//! broadcasts snapshots.

use futures::{Stream, StreamExt};
use parking_lot::Mutex;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::error::Category;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::game::{PlayerId, Position, Snapshot, TickResult, World};
use crate::session::{Outbox, RegistrationError, Session, SessionRegistry};
use crate::util::rate_limit::{InputRateLimiter, INPUT_RATE_LIMIT};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Synchronization behaviour knobs
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Broadcast after every fruit `move`, even rejected ones
    pub broadcast_rejected_moves: bool,
    /// Inbound messages per second per session, 0 = unlimited
    pub input_rate_limit: u32,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            broadcast_rejected_moves: true,
            input_rate_limit: INPUT_RATE_LIMIT,
        }
    }
}

/// Failure to admit a new connection. Reported to the client, then it is closed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Invalid client type. Use \"host\" or \"fruit_player\"")]
    InvalidClientType,

    #[error("Invalid message: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Snapshot of coordinator health for monitoring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorStatus {
    pub host_connected: bool,
    pub fruit_players: usize,
    pub snake_length: usize,
    pub score: u32,
    pub game_over: bool,
}

struct Shared {
    world: World,
    sessions: SessionRegistry,
}

impl Shared {
    /// Send the current state to everyone and drop sessions that could not take it
    fn broadcast_state(&mut self) {
        let snapshot = Snapshot::capture(&self.world);
        let failed = self
            .sessions
            .broadcast(|session| snapshot.to_message(session.player_id()));
        self.drop_sessions(failed);
    }

    fn broadcast(&mut self, msg: ServerMsg) {
        let failed = self.sessions.broadcast(|_| msg.clone());
        self.drop_sessions(failed);
    }

    fn drop_sessions(&mut self, failed: Vec<Session>) {
        for session in failed {
            info!(?session, "Send failed, dropping session");
            self.remove(session);
        }
    }

    fn remove(&mut self, session: Session) -> bool {
        let removed = self.sessions.unregister(session);
        if let Some(id) = session.player_id() {
            self.world.remove_fruit_player(&id);
        }
        removed
    }
}

/// The single authority over the shared world.
///
/// Every state change and every broadcast happens under one lock, so a
/// broadcast always reflects fully applied operations.
pub struct Coordinator {
    shared: Mutex<Shared>,
    settings: SyncSettings,
}

impl Coordinator {
    pub fn new(world: World, settings: SyncSettings) -> Self {
        Self {
            shared: Mutex::new(Shared {
                world,
                sessions: SessionRegistry::new(),
            }),
            settings,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let seed = config.rng_seed.unwrap_or_else(rand::random);
        let world = World::new(config.grid, ChaCha8Rng::seed_from_u64(seed));
        let settings = SyncSettings {
            broadcast_rejected_moves: config.broadcast_rejected_moves,
            input_rate_limit: config.input_rate_limit,
        };
        Self::new(world, settings)
    }

    /// Drive one connection from its first message to its last.
    ///
    /// `inbound` yields text frames and ends when the peer disconnects;
    /// `outbox` feeds the connection's writer. The first frame must declare
    /// the role. The session is always unregistered on return.
    pub async fn serve_session<S>(&self, mut inbound: S, outbox: Outbox)
    where
        S: Stream<Item = String> + Unpin,
    {
        let Some(first) = inbound.next().await else {
            debug!("Connection closed before declaring a role");
            return;
        };

        let session = match self.admit(&first, &outbox) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "Refusing connection");
                let _ = outbox.try_send(ServerMsg::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        // The registry now holds the only sender: unregistering closes the writer
        drop(outbox);
        let limiter = InputRateLimiter::new(self.settings.input_rate_limit);

        while let Some(text) = inbound.next().await {
            if !limiter.check() {
                warn!(?session, "Rate limited input message");
                continue;
            }

            match serde_json::from_str::<ClientMsg>(&text) {
                Ok(msg) => {
                    if !self.dispatch(session, msg) {
                        debug!(?session, "Session no longer registered");
                        break;
                    }
                }
                Err(e) => {
                    warn!(?session, error = %e, "Failed to parse client message");
                }
            }
        }

        self.disconnect(session);
    }

    /// Register a connection from its role declaration
    fn admit(&self, first: &str, outbox: &Outbox) -> Result<Session, ProtocolError> {
        let msg = serde_json::from_str::<ClientMsg>(first).map_err(|e| match e.classify() {
            Category::Syntax | Category::Eof | Category::Io => ProtocolError::Malformed(e),
            Category::Data => ProtocolError::InvalidClientType,
        })?;

        let mut shared = self.shared.lock();
        match msg {
            ClientMsg::Host => {
                let session = shared.sessions.register_host(outbox.clone())?;
                shared.sessions.send(
                    session,
                    ServerMsg::HostRegistered {
                        status: "success".to_string(),
                    },
                );
                info!("Host registered");
                shared.broadcast_state();
                Ok(session)
            }
            ClientMsg::FruitPlayer => {
                let id = shared.sessions.register_fruit_player(outbox.clone());
                shared.world.add_fruit_player(id);
                let grid = shared.world.grid();
                let session = Session::Fruit(id);
                shared.sessions.send(
                    session,
                    ServerMsg::PlayerRegistered {
                        player_id: id,
                        grid_width: grid.width(),
                        grid_height: grid.height(),
                    },
                );
                info!(
                    player_id = %id,
                    fruit_players = shared.sessions.fruit_player_count(),
                    "Fruit player registered"
                );
                shared.broadcast_state();
                Ok(session)
            }
            _ => Err(ProtocolError::InvalidClientType),
        }
    }

    /// Apply one intent. Returns false once the session has been dropped.
    fn dispatch(&self, session: Session, msg: ClientMsg) -> bool {
        let mut shared = self.shared.lock();
        if !shared.sessions.is_registered(session) {
            return false;
        }

        match (session, msg) {
            (Session::Host(_), ClientMsg::Direction { direction }) => {
                if !shared.world.set_direction(&direction) {
                    debug!(%direction, "Direction change rejected");
                }
            }
            (Session::Host(_), ClientMsg::Reset) => {
                shared.world.reset();
                info!("Game reset by host");
                shared.broadcast_state();
            }
            (Session::Fruit(id), ClientMsg::Move { x, y }) => {
                let accepted = shared.world.update_fruit_position(&id, x, y);
                if !accepted {
                    debug!(player_id = %id, x, y, "Fruit move rejected");
                }
                if accepted || self.settings.broadcast_rejected_moves {
                    shared.broadcast_state();
                }
            }
            (session, msg) => {
                debug!(?session, ?msg, "Ignoring message not meant for this role");
            }
        }

        shared.sessions.is_registered(session)
    }

    /// Remove a session and, for fruit players, its fruit. Idempotent.
    pub fn disconnect(&self, session: Session) {
        let mut shared = self.shared.lock();
        if shared.remove(session) {
            match session {
                Session::Host(_) => info!("Host disconnected"),
                Session::Fruit(id) => info!(player_id = %id, "Fruit player disconnected"),
            }
        }
    }

    /// One simulation step plus broadcast. Returns `None` when no host is
    /// connected, in which case nothing happens.
    pub fn step(&self) -> Option<TickResult> {
        let mut shared = self.shared.lock();
        if !shared.sessions.has_host() {
            return None;
        }

        let result = shared.world.tick();
        shared.broadcast_state();

        if result.game_over {
            let score = shared.world.score();
            info!(score, "Game over");
            shared.broadcast(ServerMsg::GameOver { score });
        }

        Some(result)
    }

    pub fn status(&self) -> CoordinatorStatus {
        let shared = self.shared.lock();
        CoordinatorStatus {
            host_connected: shared.sessions.has_host(),
            fruit_players: shared.sessions.fruit_player_count(),
            snake_length: shared.world.snake_len(),
            score: shared.world.score(),
            game_over: shared.world.is_terminal(),
        }
    }

    /// Read the world under the lock
    #[cfg(test)]
    pub fn with_world<R>(&self, f: impl FnOnce(&World) -> R) -> R {
        f(&self.shared.lock().world)
    }

    #[cfg(test)]
    pub fn fruit_of(&self, id: &PlayerId) -> Option<Position> {
        self.with_world(|world| world.fruit(id))
    }
}
