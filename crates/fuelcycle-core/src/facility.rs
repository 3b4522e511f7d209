//! The facility trait every archetype implements, and the context passed to
//! its phase hooks.
//!
//! A host drives each facility through four phases per timestep:
//! `pre_exchange` → (`requests`, `bids`) → (`deliver`, `accept`) →
//! `post_exchange`. Default implementations are no-ops so archetypes only
//! override the phases they take part in.

use crate::batch::Batch;
use crate::buffer::BufferError;
use crate::config::ConfigError;
use crate::event::{EventSink, TimeSeriesSink};
use crate::exchange::{BidGroup, DemandBook, RequestGroup, Trade};
use crate::fixed::Ticks;
use crate::fuel_path::TrackerError;
use crate::id::FacilityId;
use crate::recipe::{CompositionError, CompositionService};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Awarded trades the facility cannot honour. Each signals that the exchange
/// broke its side of the contract.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("{offered} batches offered but only {free} assembly slots are free")]
    Overfilled { offered: usize, free: usize },
    #[error("{requested} trades for '{commodity}' but only {available} spent batches")]
    Exhausted {
        commodity: String,
        requested: usize,
        available: usize,
    },
    #[error("trade addressed to {expected} routed to {actual}")]
    Misrouted {
        expected: FacilityId,
        actual: FacilityId,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum FacilityError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Buffer(#[from] BufferError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Composition(#[from] CompositionError),
    #[error(transparent)]
    Trade(#[from] TradeError),
}

// ---------------------------------------------------------------------------
// PhaseContext
// ---------------------------------------------------------------------------

/// Simulation services available to a facility during one phase.
pub struct PhaseContext<'a> {
    /// The current timestep.
    pub tick: Ticks,
    pub recipes: &'a dyn CompositionService,
    pub events: &'a mut dyn EventSink,
    pub series: &'a mut dyn TimeSeriesSink,
}

// ---------------------------------------------------------------------------
// Facility trait
// ---------------------------------------------------------------------------

pub trait Facility: std::fmt::Debug {
    fn id(&self) -> FacilityId;

    /// Name of the prototype this facility was built from.
    fn prototype(&self) -> &str;

    /// Runs before offers are collected.
    fn pre_exchange(&mut self, ctx: &mut PhaseContext<'_>) -> Result<(), FacilityError> {
        let _ = ctx;
        Ok(())
    }

    /// Material this facility wants this timestep.
    fn requests(&mut self, ctx: &mut PhaseContext<'_>) -> Result<Vec<RequestGroup>, FacilityError> {
        let _ = ctx;
        Ok(Vec::new())
    }

    /// Offers against everyone's outstanding demand.
    fn bids(&self, demand: &DemandBook) -> Result<Vec<BidGroup>, FacilityError> {
        let _ = demand;
        Ok(Vec::new())
    }

    /// Check that [`deliver`](Facility::deliver) can honour `trades`
    /// without changing any state. A facility with nothing to sell rejects
    /// every award.
    fn check_deliver(&self, trades: &[Trade]) -> Result<(), FacilityError> {
        match trades.first() {
            None => Ok(()),
            Some(t) => Err(TradeError::Exhausted {
                commodity: t.commodity().to_string(),
                requested: trades.len(),
                available: 0,
            }
            .into()),
        }
    }

    /// Hand over material for trades this facility won as bidder.
    fn deliver(&mut self, trades: &[Trade]) -> Result<Vec<(Trade, Batch)>, FacilityError> {
        self.check_deliver(trades)?;
        Ok(Vec::new())
    }

    /// Check that [`accept`](Facility::accept) can take material for
    /// `trades` without changing any state. A facility that never requests
    /// rejects every award.
    fn check_accept(&self, trades: &[Trade]) -> Result<(), FacilityError> {
        if trades.is_empty() {
            Ok(())
        } else {
            Err(TradeError::Overfilled {
                offered: trades.len(),
                free: 0,
            }
            .into())
        }
    }

    /// Take ownership of material for trades this facility won as requester.
    fn accept(
        &mut self,
        ctx: &mut PhaseContext<'_>,
        responses: Vec<(Trade, Batch)>,
    ) -> Result<(), FacilityError> {
        let _ = ctx;
        let trades: Vec<Trade> = responses.into_iter().map(|(t, _)| t).collect();
        self.check_accept(&trades)
    }

    /// Runs after this timestep's trades are applied.
    fn post_exchange(&mut self, ctx: &mut PhaseContext<'_>) -> Result<(), FacilityError> {
        let _ = ctx;
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any;

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
