//! Batch-fueled reactor archetype.
//!
//! A reactor holds assemblies in three buffers (core, fresh, spent) and runs
//! a fixed operating cycle followed by a refuelling window. At cycle end the
//! oldest `n_assem_batch` core assemblies are transmuted to their spent
//! recipe, discharged into spent storage, and replaced from fresh stock.
//! Fresh assemblies are requested from the exchange and spent ones are bid
//! back out.
//!
//! # Timestep phases
//!
//! 1. [`pre_exchange`](Facility::pre_exchange): transmute, discharge, load,
//!    apply due overrides.
//! 2. [`requests`](Facility::requests) / [`bids`](Facility::bids): offers.
//! 3. [`deliver`](Facility::deliver) / [`accept`](Facility::accept): trades.
//! 4. [`post_exchange`](Facility::post_exchange): cycle bookkeeping and
//!    output recording.
//!
//! Discharging before the exchange frees spent room and core slots that the
//! same exchange round can refill.

mod bids;
mod cycle;
mod requests;
mod trades;

pub use cycle::{CyclePhase, CycleState};

use crate::batch::Batch;
use crate::buffer::FuelBuffers;
use crate::config::{ConfigError, ReactorConfig};
use crate::exchange::{BidGroup, DemandBook, RequestGroup, Trade};
use crate::facility::{Facility, FacilityError, PhaseContext};
use crate::fixed::{Fixed64, Quantity};
use crate::fuel_path::AssemblyTracker;
use crate::id::{FacilityId, RequestId};
use crate::schedule::OverrideSchedule;
use tracing::{info, warn};

pub(crate) const LOG_TARGET: &str = "fuelcycle.reactor";

#[derive(Debug)]
pub struct Reactor {
    id: FacilityId,
    config: ReactorConfig,
    assem_size: Quantity,
    power_cap: Fixed64,
    buffers: FuelBuffers,
    tracker: AssemblyTracker,
    schedule: OverrideSchedule,
    cycle: CycleState,
    next_request: u64,
}

impl Reactor {
    /// Bring a reactor into the simulation. All configuration checks happen
    /// here, before the first timestep.
    pub fn enter(id: FacilityId, config: ReactorConfig) -> Result<Self, ConfigError> {
        config.check_capacities()?;
        let paths = config.fuel_paths()?;
        let schedule = config.schedule()?;

        for commodity in schedule.unmatched_commodities(&paths) {
            warn!(
                target: LOG_TARGET,
                facility = id.0,
                prototype = %config.prototype,
                commodity,
                "override names a commodity no fuel path accepts; it will be ignored"
            );
        }

        info!(
            target: LOG_TARGET,
            facility = id.0,
            prototype = %config.prototype,
            n_assem_core = config.n_assem_core,
            fuel_paths = paths.len(),
            "reactor entered"
        );

        Ok(Self {
            id,
            assem_size: config.assem_size(),
            power_cap: config.power_cap(),
            buffers: FuelBuffers::new(
                config.n_assem_core,
                config.n_assem_fresh,
                config.n_assem_spent,
            ),
            tracker: AssemblyTracker::new(paths),
            schedule,
            cycle: CycleState::new(config.cycle_time, config.refuel_time),
            next_request: 0,
            config,
        })
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    pub fn buffers(&self) -> &FuelBuffers {
        &self.buffers
    }

    pub fn tracker(&self) -> &AssemblyTracker {
        &self.tracker
    }

    pub fn cycle(&self) -> &CycleState {
        &self.cycle
    }

    pub fn phase(&self) -> CyclePhase {
        self.cycle.phase()
    }

    /// Direct access to the cycle clock, for driving tests to a given step.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn cycle_mut(&mut self) -> &mut CycleState {
        &mut self.cycle
    }

    fn next_request_id(&mut self) -> RequestId {
        let id = RequestId {
            requester: self.id,
            seq: self.next_request,
        };
        self.next_request += 1;
        id
    }
}

impl Facility for Reactor {
    fn id(&self) -> FacilityId {
        self.id
    }

    fn prototype(&self) -> &str {
        &self.config.prototype
    }

    fn pre_exchange(&mut self, ctx: &mut PhaseContext<'_>) -> Result<(), FacilityError> {
        self.tick_cycle(ctx)
    }

    fn requests(&mut self, ctx: &mut PhaseContext<'_>) -> Result<Vec<RequestGroup>, FacilityError> {
        self.build_requests(ctx)
    }

    fn bids(&self, demand: &DemandBook) -> Result<Vec<BidGroup>, FacilityError> {
        self.build_bids(demand)
    }

    fn check_deliver(&self, trades: &[Trade]) -> Result<(), FacilityError> {
        self.check_spent_trades(trades)
    }

    fn deliver(&mut self, trades: &[Trade]) -> Result<Vec<(Trade, Batch)>, FacilityError> {
        self.deliver_spent(trades)
    }

    fn check_accept(&self, trades: &[Trade]) -> Result<(), FacilityError> {
        self.check_fresh_trades(trades)
    }

    fn accept(
        &mut self,
        ctx: &mut PhaseContext<'_>,
        responses: Vec<(Trade, Batch)>,
    ) -> Result<(), FacilityError> {
        self.accept_fresh(ctx, responses)
    }

    fn post_exchange(&mut self, ctx: &mut PhaseContext<'_>) -> Result<(), FacilityError> {
        self.tock_cycle(ctx);
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

#[cfg(test)]
impl Reactor {
    /// Place a batch straight into spent storage as if it had arrived on the
    /// path accepting `in_commodity`.
    fn stock_spent(&mut self, batch: Batch, in_commodity: &str) -> crate::id::BatchId {
        let id = batch.id();
        self.tracker.index(id, in_commodity).unwrap();
        self.buffers.spent.push(batch).unwrap();
        id
    }
}
