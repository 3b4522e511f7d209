//! Scenario loading for the fuel-cycle simulation.
//!
//! Reads recipe, prototype, and deployment files from a directory and turns
//! them into a [`Scenario`] ready to deploy into a
//! [`Simulation`](fuelcycle_core::sim::Simulation).

pub mod loader;
pub mod schema;

pub use loader::{load_scenario, DataLoadError, Scenario};
