//! Fuelcycle Core -- batch-fueled reactor facilities for fuel-cycle
//! simulation.
//!
//! A reactor requests fresh fuel assemblies from a market exchange, holds
//! them in a core for a fixed operating cycle, transmutes and discharges a
//! batch at cycle end, refuels, and offers its spent fuel back to the
//! exchange. Material is tracked as owned [`batch::Batch`] values that move
//! between bounded [`buffer::FuelBuffer`]s; every buffer operation preserves
//! the batches it is handed.
//!
//! # Four-Phase Timestep
//!
//! Each call to [`sim::Simulation::step`] advances every facility through:
//!
//! 1. **Pre-exchange** -- cycle-end transmutation, discharge, load, and due
//!    recipe/preference overrides.
//! 2. **Offers** -- fresh-fuel requests, then spent-fuel bids against the
//!    combined demand.
//! 3. **Trades** -- the [`exchange::Exchange`] resolves the round; bidders
//!    deliver and requesters accept.
//! 4. **Post-exchange** -- cycle bookkeeping and output recording.
//!
//! # Key Types
//!
//! - [`reactor::Reactor`] -- The batch-fueled reactor archetype.
//! - [`facility::Facility`] -- Phase hooks every archetype implements.
//! - [`archetype::ArchetypeRegistry`] -- Name → constructor registry.
//! - [`fuel_path::AssemblyTracker`] -- Which fuel path each held batch
//!   arrived on.
//! - [`schedule::OverrideSchedule`] -- Timed recipe and preference changes.
//! - [`event::Event`] -- Typed event stream collected by an
//!   [`event::EventSink`].
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for quantities.

pub mod archetype;
pub mod batch;
pub mod buffer;
pub mod config;
pub mod event;
pub mod exchange;
pub mod facility;
pub mod fixed;
pub mod fuel_path;
pub mod id;
pub mod reactor;
pub mod recipe;
pub mod schedule;
pub mod sim;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
