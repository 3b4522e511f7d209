//! Host loop driving facilities through the exchange.
//!
//! Each call to [`Simulation::step`] advances one timestep through four
//! phases:
//!
//! 1. **Pre-exchange**: every facility runs [`Facility::pre_exchange`].
//! 2. **Offers**: requests are collected from every facility, then bids
//!    against the combined demand.
//! 3. **Trades**: the [`Exchange`] resolves the round. Every award is
//!    checked against its bidder and requester first; then bidders deliver
//!    and requesters accept. Trades won by bidders outside the simulation
//!    are filled through [`Exchange::supply`], and material bound for
//!    requesters outside it goes to [`Exchange::absorb`].
//! 4. **Post-exchange**: every facility runs [`Facility::post_exchange`],
//!    then the tick counter advances.

use crate::archetype::ArchetypeRegistry;
use crate::batch::Batch;
use crate::config::ArchetypeConfig;
use crate::event::{EventLog, OutputSeries};
use crate::exchange::{DemandBook, Exchange, Round, Trade};
use crate::facility::{Facility, FacilityError, PhaseContext};
use crate::fixed::Ticks;
use crate::id::FacilityId;
use crate::recipe::RecipeBook;
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

const LOG_TARGET: &str = "fuelcycle.sim";

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// The phase a facility hook was running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    PreExchange,
    Requests,
    Bids,
    Deliver,
    Accept,
    PostExchange,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::PreExchange => "pre-exchange",
            Phase::Requests => "requests",
            Phase::Bids => "bids",
            Phase::Deliver => "deliver",
            Phase::Accept => "accept",
            Phase::PostExchange => "post-exchange",
        })
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{facility} failed during {phase} at tick {tick}: {source}")]
pub struct SimError {
    pub facility: FacilityId,
    pub phase: Phase,
    pub tick: Ticks,
    #[source]
    pub source: FacilityError,
}

/// Counts from one [`Simulation::step`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepReport {
    pub tick: Ticks,
    pub requests: usize,
    pub bids: usize,
    pub trades: usize,
    /// Batches that changed hands.
    pub transferred: usize,
}

// ---------------------------------------------------------------------------
// Simulation
// ---------------------------------------------------------------------------

pub struct Simulation<X: Exchange> {
    tick: Ticks,
    recipes: RecipeBook,
    facilities: Vec<Box<dyn Facility>>,
    exchange: X,
    events: EventLog,
    series: OutputSeries,
    next_id: u32,
}

fn context<'a>(
    tick: Ticks,
    recipes: &'a RecipeBook,
    events: &'a mut EventLog,
    series: &'a mut OutputSeries,
) -> PhaseContext<'a> {
    PhaseContext {
        tick,
        recipes,
        events,
        series,
    }
}

impl<X: Exchange> Simulation<X> {
    pub fn new(recipes: RecipeBook, exchange: X) -> Self {
        Self {
            tick: 0,
            recipes,
            facilities: Vec::new(),
            exchange,
            events: EventLog::default(),
            series: OutputSeries::new(),
            next_id: 0,
        }
    }

    /// Keep at most `capacity` events in memory.
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.events = EventLog::new(capacity);
        self
    }

    pub fn tick(&self) -> Ticks {
        self.tick
    }

    pub fn recipes(&self) -> &RecipeBook {
        &self.recipes
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn series(&self) -> &OutputSeries {
        &self.series
    }

    pub fn exchange(&self) -> &X {
        &self.exchange
    }

    pub fn exchange_mut(&mut self) -> &mut X {
        &mut self.exchange
    }

    /// Reserve the next facility id.
    pub fn next_facility_id(&mut self) -> FacilityId {
        let id = FacilityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Add a facility built elsewhere. Its id should come from
    /// [`next_facility_id`](Self::next_facility_id).
    pub fn add(&mut self, facility: Box<dyn Facility>) -> FacilityId {
        let id = facility.id();
        debug!(target: LOG_TARGET, facility = id.0, prototype = facility.prototype(), tick = self.tick, "facility added");
        self.facilities.push(facility);
        id
    }

    /// Build a facility from a prototype and add it.
    pub fn build(&mut self, registry: &ArchetypeRegistry, config: &ArchetypeConfig) -> Result<FacilityId, FacilityError> {
        let id = self.next_facility_id();
        let facility = registry.build(id, config)?;
        Ok(self.add(facility))
    }

    pub fn facilities(&self) -> impl Iterator<Item = &dyn Facility> + '_ {
        self.facilities.iter().map(|f| f.as_ref())
    }

    pub fn facility(&self, id: FacilityId) -> Option<&dyn Facility> {
        self.facilities.iter().find(|f| f.id() == id).map(|f| f.as_ref())
    }

    /// Borrow a facility as its concrete type.
    pub fn facility_as<T: 'static>(&self, id: FacilityId) -> Option<&T> {
        self.facility(id)?.as_any().downcast_ref::<T>()
    }

    pub fn run(&mut self, steps: u64) -> Result<(), SimError> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }

    /// Advance one timestep.
    pub fn step(&mut self) -> Result<StepReport, SimError> {
        let tick = self.tick;
        let fail = |facility: FacilityId, phase: Phase| {
            move |source: FacilityError| SimError {
                facility,
                phase,
                tick,
                source,
            }
        };

        // Phase 1: pre-exchange.
        for f in &mut self.facilities {
            let mut ctx = context(tick, &self.recipes, &mut self.events, &mut self.series);
            f.pre_exchange(&mut ctx).map_err(fail(f.id(), Phase::PreExchange))?;
        }

        // Phase 2: offers.
        let mut round = Round {
            tick,
            ..Round::default()
        };
        for f in &mut self.facilities {
            let mut ctx = context(tick, &self.recipes, &mut self.events, &mut self.series);
            let groups = f.requests(&mut ctx).map_err(fail(f.id(), Phase::Requests))?;
            round.requests.extend(groups);
        }
        let demand = DemandBook::from_groups(&round.requests);
        for f in &self.facilities {
            let groups = f.bids(&demand).map_err(fail(f.id(), Phase::Bids))?;
            round.bids.extend(groups);
        }

        // Phase 3: trades.
        let trades = self.exchange.resolve(&round);
        let trade_count = trades.len();

        let mut by_bidder: BTreeMap<FacilityId, Vec<Trade>> = BTreeMap::new();
        let mut by_requester: BTreeMap<FacilityId, Vec<Trade>> = BTreeMap::new();
        for trade in trades {
            by_requester
                .entry(trade.request.requester())
                .or_default()
                .push(trade.clone());
            by_bidder.entry(trade.bid.bidder).or_default().push(trade);
        }

        // Every award is checked before any facility gives up material.
        for (bidder, trades) in &by_bidder {
            if let Some(f) = self.facility(*bidder) {
                f.check_deliver(trades).map_err(fail(*bidder, Phase::Deliver))?;
            }
        }
        for (requester, trades) in &by_requester {
            if let Some(f) = self.facility(*requester) {
                f.check_accept(trades).map_err(fail(*requester, Phase::Accept))?;
            }
        }

        let mut inbound: BTreeMap<FacilityId, Vec<(Trade, Batch)>> = BTreeMap::new();
        let mut outbound = 0;
        for (bidder, trades) in by_bidder {
            let delivered = match self.facilities.iter_mut().find(|f| f.id() == bidder) {
                Some(f) => f.deliver(&trades),
                None => Ok(trades
                    .into_iter()
                    .filter_map(|t| {
                        let batch = self.exchange.supply(&t)?;
                        Some((t, batch))
                    })
                    .collect()),
            };
            let delivered = match delivered {
                Ok(delivered) => delivered,
                Err(source) => {
                    for (trade, batch) in inbound.into_values().flatten() {
                        self.exchange.absorb(&trade, batch);
                    }
                    return Err(fail(bidder, Phase::Deliver)(source));
                }
            };
            for (trade, batch) in delivered {
                let requester = trade.request.requester();
                if self.facilities.iter().any(|f| f.id() == requester) {
                    inbound.entry(requester).or_default().push((trade, batch));
                } else {
                    self.exchange.absorb(&trade, batch);
                    outbound += 1;
                }
            }
        }
        if outbound > 0 {
            debug!(
                target: LOG_TARGET,
                batches = outbound,
                tick,
                "batches left the simulation through the exchange"
            );
        }

        let mut transferred = outbound;
        let mut inbound = inbound.into_iter();
        while let Some((requester, responses)) = inbound.next() {
            let Some(f) = self.facilities.iter_mut().find(|f| f.id() == requester) else {
                for (trade, batch) in responses {
                    self.exchange.absorb(&trade, batch);
                }
                continue;
            };
            transferred += responses.len();
            let mut ctx = context(tick, &self.recipes, &mut self.events, &mut self.series);
            if let Err(source) = f.accept(&mut ctx, responses) {
                for (trade, batch) in inbound.by_ref().flat_map(|(_, r)| r) {
                    self.exchange.absorb(&trade, batch);
                }
                return Err(fail(requester, Phase::Accept)(source));
            }
        }

        // Phase 4: post-exchange.
        for f in &mut self.facilities {
            let mut ctx = context(tick, &self.recipes, &mut self.events, &mut self.series);
            f.post_exchange(&mut ctx).map_err(fail(f.id(), Phase::PostExchange))?;
        }

        let report = StepReport {
            tick,
            requests: round.requests.iter().map(|g| g.requests.len()).sum(),
            bids: round.bids.iter().map(|g| g.bids.len()).sum(),
            trades: trade_count,
            transferred,
        };
        debug!(
            target: LOG_TARGET,
            tick,
            requests = report.requests,
            bids = report.bids,
            trades = report.trades,
            transferred = report.transferred,
            "step complete"
        );
        self.tick += 1;
        Ok(report)
    }
}

impl<X: Exchange> fmt::Debug for Simulation<X> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("tick", &self.tick)
            .field("facilities", &self.facilities.len())
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}
