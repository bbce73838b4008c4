//! Connected sessions: the single host and any number of fruit players

use std::collections::HashMap;

use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;
use uuid::Uuid;

use crate::game::PlayerId;
use crate::ws::protocol::ServerMsg;

/// Outbound queue of a session, drained by its transport writer
pub type Outbox = mpsc::Sender<ServerMsg>;

/// Per-connection sequence number, used to tell host connections apart
pub type ConnId = u64;

/// Handle identifying a registered session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Session {
    Host(ConnId),
    Fruit(PlayerId),
}

impl Session {
    /// Fruit player id, if this is a fruit session
    pub fn player_id(&self) -> Option<PlayerId> {
        match self {
            Session::Host(_) => None,
            Session::Fruit(id) => Some(*id),
        }
    }
}

/// Result of handing a message to a session's outbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    /// Outbox full, the client stopped keeping up; the session must be removed
    Full,
    /// Receiver gone; the session must be removed
    Closed,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("Host already registered")]
    HostAlreadyRegistered,
}

struct HostPeer {
    conn: ConnId,
    outbox: Outbox,
}

/// Registry of live sessions. Holds no game logic.
#[derive(Default)]
pub struct SessionRegistry {
    host: Option<HostPeer>,
    fruits: HashMap<PlayerId, Outbox>,
    next_conn: ConnId,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the host slot. A second host is refused and the current one kept.
    pub fn register_host(&mut self, outbox: Outbox) -> Result<Session, RegistrationError> {
        if self.host.is_some() {
            return Err(RegistrationError::HostAlreadyRegistered);
        }
        self.next_conn += 1;
        let conn = self.next_conn;
        self.host = Some(HostPeer { conn, outbox });
        Ok(Session::Host(conn))
    }

    /// Add a fruit player under a fresh id
    pub fn register_fruit_player(&mut self, outbox: Outbox) -> PlayerId {
        let mut id = Uuid::new_v4();
        while self.fruits.contains_key(&id) {
            id = Uuid::new_v4();
        }
        self.fruits.insert(id, outbox);
        id
    }

    /// Remove a session. Returns false if it was already gone.
    pub fn unregister(&mut self, session: Session) -> bool {
        match session {
            Session::Host(_) => {
                // A stale handle must not evict a newer host
                let current = self.is_registered(session);
                if current {
                    self.host = None;
                }
                current
            }
            Session::Fruit(id) => self.fruits.remove(&id).is_some(),
        }
    }

    pub fn is_registered(&self, session: Session) -> bool {
        match session {
            Session::Host(conn) => self.host.as_ref().is_some_and(|h| h.conn == conn),
            Session::Fruit(id) => self.fruits.contains_key(&id),
        }
    }

    pub fn has_host(&self) -> bool {
        self.host.is_some()
    }

    pub fn fruit_player_count(&self) -> usize {
        self.fruits.len()
    }

    /// Queue a message for one session
    pub fn send(&self, session: Session, msg: ServerMsg) -> Delivery {
        let outbox = match session {
            Session::Host(conn) => self
                .host
                .as_ref()
                .filter(|h| h.conn == conn)
                .map(|h| &h.outbox),
            Session::Fruit(id) => self.fruits.get(&id),
        };
        match outbox {
            Some(outbox) => deliver(outbox, msg),
            None => Delivery::Closed,
        }
    }

    /// Queue a message for every session, built per recipient.
    /// Returns the sessions that could not take it.
    /// A message is never silently dropped for a session that stays registered.
    pub fn broadcast<F>(&self, mut build: F) -> Vec<Session>
    where
        F: FnMut(Session) -> ServerMsg,
    {
        let host = self.host.as_ref().map(|h| (Session::Host(h.conn), &h.outbox));
        let fruits = self
            .fruits
            .iter()
            .map(|(id, outbox)| (Session::Fruit(*id), outbox));

        let mut failed = Vec::new();
        for (session, outbox) in host.into_iter().chain(fruits) {
            match deliver(outbox, build(session)) {
                Delivery::Sent => {}
                Delivery::Full => {
                    warn!(?session, "Client outbox full");
                    failed.push(session);
                }
                Delivery::Closed => failed.push(session),
            }
        }
        failed
    }
}

fn deliver(outbox: &Outbox, msg: ServerMsg) -> Delivery {
    match outbox.try_send(msg) {
        Ok(()) => Delivery::Sent,
        Err(TrySendError::Full(_)) => Delivery::Full,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}
