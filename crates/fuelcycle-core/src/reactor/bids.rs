use super::{LOG_TARGET, Reactor};
use crate::batch::Batch;
use crate::exchange::{Bid, BidGroup, CapacityConstraint, DemandBook};
use crate::facility::FacilityError;
use crate::fixed::{Quantity, total_quantity};
use std::collections::BTreeMap;
use tracing::debug;

impl Reactor {
    /// Offer spent batches against outstanding demand, one group per output
    /// commodity. Batches are offered most recently discharged first, the
    /// same order [`deliver`](crate::facility::Facility::deliver) hands them
    /// over in.
    ///
    /// Offers are not capped across requests: the same batch may be bid
    /// against several requests, and the group's capacity constraint is left
    /// to the exchange to enforce.
    pub(super) fn build_bids(&self, demand: &DemandBook) -> Result<Vec<BidGroup>, FacilityError> {
        if demand.is_empty() || self.buffers.spent.is_empty() {
            return Ok(Vec::new());
        }

        let mut by_commodity: Option<BTreeMap<&str, Vec<&Batch>>> = None;
        let mut groups = Vec::new();

        for commodity in self.tracker.paths().out_commodities() {
            let requests = demand.requests_for(commodity);
            if requests.is_empty() {
                continue;
            }

            if by_commodity.is_none() {
                by_commodity = Some(self.spent_by_commodity()?);
            }
            let Some(batches) = by_commodity.as_ref().and_then(|m| m.get(commodity)) else {
                continue;
            };

            let mut bids = Vec::new();
            for request in requests {
                let mut offered = Quantity::ZERO;
                for batch in batches {
                    bids.push(Bid {
                        request: request.id,
                        bidder: self.id,
                        batch: batch.id(),
                        commodity: commodity.to_string(),
                        quantity: batch.quantity(),
                        exclusive: true,
                    });
                    offered = offered.saturating_add(batch.quantity());
                    if offered >= request.quantity {
                        break;
                    }
                }
            }

            let capacity = total_quantity(batches.iter().map(|b| b.quantity()));
            debug!(
                target: LOG_TARGET,
                facility = self.id.0,
                commodity,
                bids = bids.len(),
                capacity = %capacity,
                "bidding spent fuel"
            );
            groups.push(BidGroup {
                bidder: self.id,
                commodity: commodity.to_string(),
                bids,
                constraints: vec![CapacityConstraint { capacity }],
            });
        }

        Ok(groups)
    }

    /// Spent batches keyed by output commodity, newest first within each key.
    fn spent_by_commodity(&self) -> Result<BTreeMap<&str, Vec<&Batch>>, FacilityError> {
        let mut map: BTreeMap<&str, Vec<&Batch>> = BTreeMap::new();
        for batch in self.buffers.spent.iter().rev() {
            let commodity = self.tracker.commodity_out(batch.id())?;
            map.entry(commodity).or_default().push(batch);
        }
        Ok(map)
    }
}
