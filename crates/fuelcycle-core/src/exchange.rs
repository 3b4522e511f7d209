//! Request/bid/trade types shared with the exchange.
//!
//! The exchange itself (matching requests to bids) lives outside this crate
//! behind the [`Exchange`] trait. Facilities only build [`RequestGroup`]s and
//! [`BidGroup`]s and later receive [`Trade`]s.

use crate::batch::Batch;
use crate::fixed::{Fixed64, Quantity, Ticks};
use crate::id::{BatchId, FacilityId, RequestId};
use crate::recipe::Composition;
use std::collections::BTreeMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A demand for `quantity` of `commodity`, ideally of `target` composition.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub commodity: String,
    pub quantity: Quantity,
    pub target: Arc<Composition>,
    pub preference: Fixed64,
    /// Must be satisfied by a single batch or not at all.
    pub exclusive: bool,
}

impl Request {
    pub fn requester(&self) -> FacilityId {
        self.id.requester
    }
}

/// Requests submitted together. Each mutual set names alternatives of which
/// at most one should be satisfied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestGroup {
    pub requests: Vec<Request>,
    pub mutual: Vec<Vec<RequestId>>,
}

impl RequestGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_request(&mut self, request: Request) -> RequestId {
        let id = request.id;
        self.requests.push(request);
        id
    }

    /// Declare `ids` mutually exclusive alternatives.
    pub fn add_mutual(&mut self, ids: Vec<RequestId>) {
        self.mutual.push(ids);
    }
}

/// Outstanding requests per commodity, each list in arrival order.
#[derive(Debug, Clone, Default)]
pub struct DemandBook {
    by_commodity: BTreeMap<String, Vec<Request>>,
}

impl DemandBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect every request of every group, preserving group order.
    pub fn from_groups<'a, I>(groups: I) -> Self
    where
        I: IntoIterator<Item = &'a RequestGroup>,
    {
        let mut book = Self::new();
        for group in groups {
            for request in &group.requests {
                book.push(request.clone());
            }
        }
        book
    }

    pub fn push(&mut self, request: Request) {
        self.by_commodity
            .entry(request.commodity.clone())
            .or_default()
            .push(request);
    }

    /// Requests for `commodity` in arrival order. Empty if none.
    pub fn requests_for(&self, commodity: &str) -> &[Request] {
        self.by_commodity
            .get(commodity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn find(&self, id: RequestId) -> Option<&Request> {
        self.by_commodity.values().flatten().find(|r| r.id == id)
    }

    pub fn len(&self) -> usize {
        self.by_commodity.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ---------------------------------------------------------------------------
// Bids
// ---------------------------------------------------------------------------

/// An offer of one spent batch against one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bid {
    pub request: RequestId,
    pub bidder: FacilityId,
    pub batch: BatchId,
    pub commodity: String,
    pub quantity: Quantity,
    /// The batch is offered whole or not at all.
    pub exclusive: bool,
}

/// Upper bound on the total quantity the exchange may award from a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityConstraint {
    pub capacity: Quantity,
}

/// Bids for one commodity from one facility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BidGroup {
    pub bidder: FacilityId,
    pub commodity: String,
    pub bids: Vec<Bid>,
    pub constraints: Vec<CapacityConstraint>,
}

// ---------------------------------------------------------------------------
// Trades
// ---------------------------------------------------------------------------

/// An awarded match of a request with a bid.
#[derive(Debug, Clone, PartialEq)]
pub struct Trade {
    pub request: Request,
    pub bid: Bid,
    pub quantity: Quantity,
}

impl Trade {
    pub fn commodity(&self) -> &str {
        &self.request.commodity
    }
}

/// Everything submitted to the exchange for one timestep.
#[derive(Debug, Default)]
pub struct Round {
    pub tick: Ticks,
    pub requests: Vec<RequestGroup>,
    pub bids: Vec<BidGroup>,
}

/// The market-clearing collaborator.
pub trait Exchange {
    /// Match requests with bids. Called once per timestep after every
    /// facility has run its pre-exchange phase.
    fn resolve(&mut self, round: &Round) -> Vec<Trade>;

    /// Produce the batch for a trade whose bidder is not a simulated
    /// facility. `None` leaves the request unfilled.
    fn supply(&mut self, trade: &Trade) -> Option<Batch>;

    /// Take ownership of a batch leaving the simulation: delivered to a
    /// requester that is not a simulated facility, or stranded when a trade
    /// phase is aborted.
    fn absorb(&mut self, trade: &Trade, batch: Batch);
}
