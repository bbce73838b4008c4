//! Game simulation modules

pub mod grid;
pub mod simulation;
pub mod snapshot;
pub mod world;

pub use grid::{Direction, Grid, GridError, Position};
pub use simulation::TickResult;
pub use snapshot::Snapshot;
pub use world::{PlayerId, World};
