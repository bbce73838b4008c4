//! Synchronization layer: session routing, broadcast and the tick driver

pub mod coordinator;
pub mod ticker;

pub use coordinator::{Coordinator, SyncSettings};
