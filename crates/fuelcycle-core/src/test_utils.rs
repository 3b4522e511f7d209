//! Shared test helpers for integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so these helpers
//! are available in unit tests, integration tests, and benchmarks (via the
//! `test-utils` feature).

use crate::batch::{Batch, BatchAllocator};
use crate::config::{FuelPathConfig, FuelPathsConfig, ReactorConfig};
use crate::event::{Event, OutputSample};
use crate::exchange::{Bid, Exchange, Request, RequestGroup, Round, Trade};
use crate::facility::{Facility, FacilityError, PhaseContext};
use crate::fixed::{Fixed64, Quantity, Ticks};
use crate::fuel_path::FuelPath;
use crate::id::{BatchId, FacilityId, RequestId};
use crate::reactor::Reactor;
use crate::recipe::{Composition, CompositionService, RecipeBook, RecipeBookBuilder};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Configuration
// ===========================================================================

/// Bidder id used for material supplied from outside the simulation.
pub const EXTERNAL: FacilityId = FacilityId(u32::MAX);

pub fn fuel_path(in_commodity: &str, in_recipe: &str, out_commodity: &str, out_recipe: &str) -> FuelPath {
    FuelPath {
        in_commodity: in_commodity.to_string(),
        in_recipe: in_recipe.to_string(),
        out_commodity: out_commodity.to_string(),
        out_recipe: out_recipe.to_string(),
        preference: Some(fixed(1.0)),
    }
}

/// A reactor burning `uox` into `spent_uox`, 10 units per assembly, 100
/// units of power per operating step.
pub fn reactor_config(n_core: usize, n_batch: usize, cycle_time: Ticks, refuel_time: Ticks) -> ReactorConfig {
    ReactorConfig {
        prototype: "test_reactor".to_string(),
        n_assem_batch: n_batch,
        assem_size: 10.0,
        n_assem_core: n_core,
        n_assem_fresh: 0,
        n_assem_spent: 1000,
        cycle_time,
        refuel_time,
        power_cap: 100.0,
        power_name: "power".to_string(),
        fuel: FuelPathsConfig::Records(vec![FuelPathConfig {
            in_commodity: "uox".to_string(),
            in_recipe: "uox_fresh".to_string(),
            out_commodity: "spent_uox".to_string(),
            out_recipe: "uox_spent".to_string(),
            preference: Some(1.0),
        }]),
        recipe_changes: Default::default(),
        preference_changes: Default::default(),
    }
}

/// Fresh and spent recipes for `uox` and `mox`.
pub fn recipe_book() -> RecipeBook {
    let mut b = RecipeBookBuilder::new();
    let entries = [
        ("uox_fresh", [("u235", 0.04), ("u238", 0.96)]),
        ("uox_spent", [("u235", 0.01), ("u238", 0.94)]),
        ("mox_fresh", [("pu239", 0.07), ("u238", 0.93)]),
        ("mox_spent", [("pu239", 0.03), ("u238", 0.90)]),
    ];
    for (name, fractions) in entries {
        let mut c = Composition::new(name);
        for (nuc, f) in fractions {
            c = c.with_fraction(nuc, fixed(f));
        }
        b.register(c).expect("distinct recipe names");
    }
    b.build()
}

// ===========================================================================
// Exchange types
// ===========================================================================

pub fn request(requester: FacilityId, seq: u64, commodity: &str, quantity: f64) -> Request {
    Request {
        id: RequestId { requester, seq },
        commodity: commodity.to_string(),
        quantity: fixed(quantity),
        target: Arc::new(Composition::new(commodity)),
        preference: Fixed64::ZERO,
        exclusive: true,
    }
}

/// A trade in which `bidder` sells one batch of `commodity` to an outside
/// requester.
pub fn spent_trade(bidder: FacilityId, commodity: &str, seq: u64) -> Trade {
    let request = request(EXTERNAL, seq, commodity, 10.0);
    Trade {
        bid: Bid {
            request: request.id,
            bidder,
            batch: BatchId::default(),
            commodity: commodity.to_string(),
            quantity: request.quantity,
            exclusive: true,
        },
        quantity: request.quantity,
        request,
    }
}

// ===========================================================================
// Harness
// ===========================================================================

/// Recipes, sinks and a batch allocator for driving one facility by hand.
pub struct Harness {
    pub recipes: RecipeBook,
    pub alloc: BatchAllocator,
    pub events: Vec<Event>,
    pub series: Vec<OutputSample>,
    next_seq: u64,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            recipes: recipe_book(),
            alloc: BatchAllocator::new(),
            events: Vec::new(),
            series: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn ctx(&mut self, tick: Ticks) -> PhaseContext<'_> {
        PhaseContext {
            tick,
            recipes: &self.recipes,
            events: &mut self.events,
            series: &mut self.series,
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
        self.series.clear();
    }

    pub fn reactor(&self, id: FacilityId, config: ReactorConfig) -> Reactor {
        Reactor::enter(id, config).unwrap()
    }

    pub fn batch(&mut self, quantity: f64, recipe: &str) -> Batch {
        let comp = self.recipes.recipe(recipe).unwrap();
        self.alloc.create(fixed(quantity), comp)
    }

    /// `n` fresh `uox`-recipe assemblies traded to `requester` under `commodity`.
    pub fn fresh_responses(&mut self, requester: FacilityId, commodity: &str, n: usize) -> Vec<(Trade, Batch)> {
        (0..n)
            .map(|_| {
                let seq = self.next_seq;
                self.next_seq += 1;
                let req = request(requester, seq, commodity, 10.0);
                let batch = self.batch(10.0, "uox_fresh");
                let trade = Trade {
                    bid: Bid {
                        request: req.id,
                        bidder: EXTERNAL,
                        batch: batch.id(),
                        commodity: commodity.to_string(),
                        quantity: req.quantity,
                        exclusive: true,
                    },
                    quantity: req.quantity,
                    request: req,
                };
                (trade, batch)
            })
            .collect()
    }

    /// Accept `n` fresh `uox` assemblies. Returns their ids in arrival order.
    pub fn accept_fresh(&mut self, reactor: &mut Reactor, n: usize) -> Vec<BatchId> {
        let responses = self.fresh_responses(reactor.id(), "uox", n);
        let ids = responses.iter().map(|(_, b)| b.id()).collect();
        let mut ctx = self.ctx(0);
        reactor.accept(&mut ctx, responses).unwrap();
        ids
    }

    /// Accept `n` assemblies straight into an empty core.
    pub fn fill_core(&mut self, reactor: &mut Reactor, n: usize) -> Vec<BatchId> {
        let ids = self.accept_fresh(reactor, n);
        assert_eq!(reactor.buffers().core.count(), n);
        ids
    }

    pub fn pre_exchange(&mut self, reactor: &mut Reactor, tick: Ticks) {
        let mut ctx = self.ctx(tick);
        reactor.pre_exchange(&mut ctx).unwrap();
    }

    pub fn post_exchange(&mut self, reactor: &mut Reactor, tick: Ticks) {
        let mut ctx = self.ctx(tick);
        reactor.post_exchange(&mut ctx).unwrap();
    }
}

pub fn force_step(reactor: &mut Reactor, step: Ticks) {
    reactor.cycle_mut().step = step;
}

// ===========================================================================
// Exchange and counterpart facilities
// ===========================================================================

/// Greedy exchange: walks request groups in order and fills at most one
/// request per group, preferring facility bids over external supply.
#[derive(Debug, Default)]
pub struct FirstFitExchange {
    recipes: BTreeMap<String, Arc<Composition>>,
    alloc: BatchAllocator,
    /// Externally supplied batches still allowed; `None` is unlimited.
    pub supply_limit: Option<usize>,
    pub supplied: usize,
    /// Batches that left the simulation through the exchange.
    pub absorbed: Vec<Batch>,
}

impl FirstFitExchange {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply `commodity` from outside the simulation, as `recipe`.
    pub fn with_supply(mut self, commodity: &str, recipe: Arc<Composition>) -> Self {
        self.recipes.insert(commodity.to_string(), recipe);
        self
    }

    pub fn with_supply_limit(mut self, limit: usize) -> Self {
        self.supply_limit = Some(limit);
        self
    }

    fn can_supply(&self, commodity: &str, pending: usize) -> bool {
        self.recipes.contains_key(commodity)
            && self.supply_limit.is_none_or(|limit| self.supplied + pending < limit)
    }
}

impl Exchange for FirstFitExchange {
    fn resolve(&mut self, round: &Round) -> Vec<Trade> {
        let mut trades = Vec::new();
        let mut taken: BTreeSet<BatchId> = BTreeSet::new();
        let mut remaining: Vec<Quantity> = round
            .bids
            .iter()
            .map(|g| g.constraints.iter().map(|c| c.capacity).min().unwrap_or(Quantity::MAX))
            .collect();
        let mut pending_supply = 0;

        for group in &round.requests {
            'requests: for request in &group.requests {
                for (gi, bid_group) in round.bids.iter().enumerate() {
                    for bid in bid_group.bids.iter().filter(|b| b.request == request.id) {
                        if taken.contains(&bid.batch) || remaining[gi] < bid.quantity {
                            continue;
                        }
                        taken.insert(bid.batch);
                        remaining[gi] -= bid.quantity;
                        trades.push(Trade {
                            request: request.clone(),
                            bid: bid.clone(),
                            quantity: bid.quantity,
                        });
                        break 'requests;
                    }
                }
                if self.can_supply(&request.commodity, pending_supply) {
                    pending_supply += 1;
                    trades.push(Trade {
                        request: request.clone(),
                        bid: Bid {
                            request: request.id,
                            bidder: EXTERNAL,
                            batch: BatchId::default(),
                            commodity: request.commodity.clone(),
                            quantity: request.quantity,
                            exclusive: true,
                        },
                        quantity: request.quantity,
                    });
                    break;
                }
            }
        }
        trades
    }

    fn supply(&mut self, trade: &Trade) -> Option<Batch> {
        let comp = self.recipes.get(trade.commodity())?;
        self.supplied += 1;
        Some(self.alloc.create(trade.quantity, Arc::clone(comp)))
    }

    fn absorb(&mut self, _trade: &Trade, batch: Batch) {
        self.absorbed.push(batch);
    }
}

/// Buys one batch of a commodity per timestep and keeps what it receives.
#[derive(Debug)]
pub struct SinkFacility {
    pub id: FacilityId,
    pub commodity: String,
    pub quantity: Quantity,
    pub received: Vec<Batch>,
    next_seq: u64,
}

impl SinkFacility {
    pub fn new(id: FacilityId, commodity: &str, quantity: f64) -> Self {
        Self {
            id,
            commodity: commodity.to_string(),
            quantity: fixed(quantity),
            received: Vec::new(),
            next_seq: 0,
        }
    }
}

impl Facility for SinkFacility {
    fn id(&self) -> FacilityId {
        self.id
    }

    fn prototype(&self) -> &str {
        "sink"
    }

    fn requests(&mut self, _ctx: &mut PhaseContext<'_>) -> Result<Vec<RequestGroup>, FacilityError> {
        let mut group = RequestGroup::new();
        let mut req = request(self.id, self.next_seq, &self.commodity, 0.0);
        req.quantity = self.quantity;
        self.next_seq += 1;
        group.add_request(req);
        Ok(vec![group])
    }

    fn check_accept(&self, _trades: &[Trade]) -> Result<(), FacilityError> {
        Ok(())
    }

    fn accept(&mut self, _ctx: &mut PhaseContext<'_>, responses: Vec<(Trade, Batch)>) -> Result<(), FacilityError> {
        self.received.extend(responses.into_iter().map(|(_, b)| b));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
