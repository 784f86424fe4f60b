//! mm-testkit
//!
//! Deterministic platform simulation and fixtures for scenario tests and
//! the daemon's built-in simulator. Nothing here talks to a real platform.

mod sim_platform;
mod world;

pub use sim_platform::{MoveRecord, SimPlatform};
pub use world::{SeedMatch, SeededMatch, World};
