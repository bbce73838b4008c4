//! Session tracking

pub mod registry;

pub use registry::{Outbox, RegistrationError, Session, SessionRegistry};
