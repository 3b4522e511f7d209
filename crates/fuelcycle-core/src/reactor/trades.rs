use super::{LOG_TARGET, Reactor};
use crate::batch::Batch;
use crate::event::Event;
use crate::exchange::Trade;
use crate::facility::{FacilityError, PhaseContext, TradeError};
use crate::fuel_path::TrackerError;
use std::collections::BTreeMap;
use tracing::info;

impl Reactor {
    /// Pick a spent batch for each trade: the most recently discharged batch
    /// of its commodity. Returns positions counted from the newest spent
    /// batch, one per trade in order.
    fn plan_delivery(&self, trades: &[Trade]) -> Result<Vec<usize>, FacilityError> {
        for trade in trades {
            if trade.bid.bidder != self.id {
                return Err(TradeError::Misrouted {
                    expected: trade.bid.bidder,
                    actual: self.id,
                }
                .into());
            }
        }

        // Output commodity of each spent batch, newest first.
        let commodities = self
            .buffers
            .spent
            .iter()
            .rev()
            .map(|b| self.tracker.commodity_out(b.id()))
            .collect::<Result<Vec<&str>, TrackerError>>()?;

        // Positions per commodity, oldest at the front so `pop` yields newest.
        let mut positions: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (i, commodity) in commodities.iter().enumerate().rev() {
            positions.entry(*commodity).or_default().push(i);
        }

        let mut picks = Vec::with_capacity(trades.len());
        for trade in trades {
            let commodity = trade.commodity();
            match positions.get_mut(commodity).and_then(Vec::pop) {
                Some(i) => picks.push(i),
                None => {
                    return Err(TradeError::Exhausted {
                        commodity: commodity.to_string(),
                        requested: trades.iter().filter(|t| t.commodity() == commodity).count(),
                        available: commodities.iter().filter(|c| **c == commodity).count(),
                    }
                    .into());
                }
            }
        }
        Ok(picks)
    }

    pub(super) fn check_spent_trades(&self, trades: &[Trade]) -> Result<(), FacilityError> {
        self.plan_delivery(trades).map(|_| ())
    }

    /// Hand over spent batches for awarded trades. Each trade takes the most
    /// recently discharged batch of its commodity. Every trade is checked
    /// before spent storage is touched, so an error leaves it unchanged.
    pub(super) fn deliver_spent(
        &mut self,
        trades: &[Trade],
    ) -> Result<Vec<(Trade, Batch)>, FacilityError> {
        if trades.is_empty() {
            return Ok(Vec::new());
        }
        let picks = self.plan_delivery(trades)?;

        let count = self.buffers.spent.count();
        let mut slots: Vec<Option<Batch>> =
            self.buffers.spent.pop_n(count)?.into_iter().map(Some).collect();

        let delivered: Vec<(Trade, Batch)> = trades
            .iter()
            .zip(picks)
            .filter_map(|(trade, i)| slots[i].take().map(|b| (trade.clone(), b)))
            .collect();
        for (_, batch) in &delivered {
            self.tracker.forget(batch.id());
        }

        let remaining: Vec<Batch> = slots.into_iter().rev().flatten().collect();
        self.buffers.spent.push_all(remaining)?;

        info!(
            target: LOG_TARGET,
            facility = self.id.0,
            batches = delivered.len(),
            spent = self.buffers.spent.count(),
            "delivered spent fuel"
        );
        Ok(delivered)
    }

    /// Check that fresh batches for `trades` fit the free assembly slots and
    /// arrive on a configured path.
    pub(super) fn check_fresh_trades<'t, I>(&self, trades: I) -> Result<(), FacilityError>
    where
        I: IntoIterator<Item = &'t Trade>,
        I::IntoIter: ExactSizeIterator,
    {
        let trades = trades.into_iter();
        let free = self.buffers.missing_assemblies();
        if trades.len() > free {
            return Err(TradeError::Overfilled {
                offered: trades.len(),
                free,
            }
            .into());
        }
        for trade in trades {
            if trade.request.requester() != self.id {
                return Err(TradeError::Misrouted {
                    expected: trade.request.requester(),
                    actual: self.id,
                }
                .into());
            }
            if self.tracker.paths().position_in(trade.commodity()).is_none() {
                return Err(TrackerError::UnsupportedCommodity(trade.commodity().to_string()).into());
            }
        }
        Ok(())
    }

    /// Take fresh batches won in the exchange. The core is filled first and
    /// the rest goes to fresh storage.
    pub(super) fn accept_fresh(
        &mut self,
        ctx: &mut PhaseContext<'_>,
        responses: Vec<(Trade, Batch)>,
    ) -> Result<(), FacilityError> {
        if responses.is_empty() {
            return Ok(());
        }
        self.check_fresh_trades(responses.iter().map(|(t, _)| t))?;

        let nload = responses.len().min(self.buffers.core.space());
        if nload > 0 {
            ctx.events.record(Event::Load {
                facility: self.id,
                tick: ctx.tick,
                assemblies: nload,
            });
            info!(target: LOG_TARGET, facility = self.id.0, tick = ctx.tick, assemblies = nload, "load");
        }

        for (trade, batch) in responses {
            self.tracker.index(batch.id(), trade.commodity())?;
            if self.buffers.core.is_full() {
                self.buffers.fresh.push(batch)?;
            } else {
                self.buffers.core.push(batch)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::config::{FuelPathConfig, FuelPathsConfig};
    use crate::event::EventKind;
    use crate::exchange::DemandBook;
    use crate::facility::{Facility, FacilityError, TradeError};
    use crate::fuel_path::TrackerError;
    use crate::id::FacilityId;
    use crate::test_utils::*;

    fn config() -> crate::config::ReactorConfig {
        let mut cfg = reactor_config(2, 1, 2, 1);
        cfg.n_assem_fresh = 2;
        cfg.fuel = FuelPathsConfig::Records(vec![
            FuelPathConfig {
                in_commodity: "uox".into(),
                in_recipe: "uox_fresh".into(),
                out_commodity: "out1".into(),
                out_recipe: "uox_spent".into(),
                preference: None,
            },
            FuelPathConfig {
                in_commodity: "mox".into(),
                in_recipe: "mox_fresh".into(),
                out_commodity: "out2".into(),
                out_recipe: "mox_spent".into(),
                preference: None,
            },
        ]);
        cfg
    }

    #[test]
    fn accept_fills_core_then_fresh() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let ids = h.accept_fresh(&mut r, 3);

        assert_eq!(r.buffers().core.ids(), vec![ids[0], ids[1]]);
        assert_eq!(r.buffers().fresh.ids(), vec![ids[2]]);
        assert!(ids.iter().all(|id| r.tracker().contains(*id)));
        let loads: Vec<_> = h.events.iter().filter(|e| e.kind() == EventKind::Load).collect();
        assert_eq!(loads.len(), 1);
        assert_eq!(loads[0].value(), "2 assemblies");
    }

    #[test]
    fn accept_into_fresh_only_logs_nothing() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        h.fill_core(&mut r, 2);
        h.clear();
        h.accept_fresh(&mut r, 1);
        assert!(h.events.is_empty());
        assert_eq!(r.buffers().fresh.count(), 1);
    }

    #[test]
    fn accept_more_than_free_slots_is_rejected() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let responses = h.fresh_responses(FacilityId(0), "uox", 5);
        let mut ctx = h.ctx(0);
        let err = r.accept(&mut ctx, responses).unwrap_err();
        assert!(matches!(
            err,
            FacilityError::Trade(TradeError::Overfilled { offered: 5, free: 4 })
        ));
        assert!(r.buffers().core.is_empty());
        assert!(r.tracker().is_empty());
    }

    #[test]
    fn accept_unconfigured_commodity_is_rejected() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let responses = h.fresh_responses(FacilityId(0), "thorium", 1);
        let mut ctx = h.ctx(0);
        let err = r.accept(&mut ctx, responses).unwrap_err();
        assert!(matches!(
            err,
            FacilityError::Tracker(TrackerError::UnsupportedCommodity(ref c)) if c == "thorium"
        ));
        assert!(r.buffers().core.is_empty());
    }

    #[test]
    fn accept_for_another_facility_is_rejected() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let responses = h.fresh_responses(FacilityId(5), "uox", 1);
        let mut ctx = h.ctx(0);
        let err = r.accept(&mut ctx, responses).unwrap_err();
        assert!(matches!(
            err,
            FacilityError::Trade(TradeError::Misrouted {
                expected: FacilityId(5),
                actual: FacilityId(0)
            })
        ));
    }

    #[test]
    fn deliver_takes_newest_of_commodity_and_keeps_order() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let a = r.stock_spent(h.batch(5.0, "uox_spent"), "uox");
        let b = r.stock_spent(h.batch(5.0, "mox_spent"), "mox");
        let c = r.stock_spent(h.batch(5.0, "uox_spent"), "uox");
        let d = r.stock_spent(h.batch(5.0, "mox_spent"), "mox");

        let trades = vec![spent_trade(FacilityId(0), "out1", 0)];
        let delivered = r.deliver(&trades).unwrap();

        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1.id(), c);
        assert_eq!(delivered[0].0, trades[0]);
        assert!(!r.tracker().contains(c));
        assert_eq!(r.buffers().spent.ids(), vec![a, b, d]);
    }

    #[test]
    fn deliver_matches_bid_order() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        r.stock_spent(h.batch(5.0, "uox_spent"), "uox");
        r.stock_spent(h.batch(5.0, "uox_spent"), "uox");

        let mut demand = DemandBook::new();
        demand.push(request(FacilityId(9), 0, "out1", 5.0));
        let bids = r.bids(&demand).unwrap();
        let offered = bids[0].bids[0].batch;

        let delivered = r.deliver(&[spent_trade(FacilityId(0), "out1", 0)]).unwrap();
        assert_eq!(delivered[0].1.id(), offered);
    }

    #[test]
    fn deliver_more_than_stocked_leaves_spent_untouched() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let a = r.stock_spent(h.batch(5.0, "uox_spent"), "uox");
        let b = r.stock_spent(h.batch(5.0, "mox_spent"), "mox");

        let trades = vec![
            spent_trade(FacilityId(0), "out2", 0),
            spent_trade(FacilityId(0), "out2", 1),
        ];
        let err = r.deliver(&trades).unwrap_err();
        assert!(matches!(
            err,
            FacilityError::Trade(TradeError::Exhausted { ref commodity, requested: 2, available: 1 })
                if commodity == "out2"
        ));
        assert_eq!(r.buffers().spent.ids(), vec![a, b]);
        assert!(r.tracker().contains(b));
    }

    #[test]
    fn delivery_check_reports_the_same_error_without_mutating() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        let a = r.stock_spent(h.batch(5.0, "uox_spent"), "uox");
        let trades = vec![
            spent_trade(FacilityId(0), "out1", 0),
            spent_trade(FacilityId(0), "out1", 1),
        ];

        assert!(r.check_deliver(&trades[..1]).is_ok());
        let checked = r.check_deliver(&trades).unwrap_err().to_string();
        assert_eq!(r.buffers().spent.ids(), vec![a]);
        assert_eq!(checked, r.deliver(&trades).unwrap_err().to_string());
        assert_eq!(r.buffers().spent.ids(), vec![a]);
    }

    #[test]
    fn deliver_for_another_bidder_is_rejected() {
        let mut h = Harness::new();
        let mut r = h.reactor(FacilityId(0), config());
        r.stock_spent(h.batch(5.0, "uox_spent"), "uox");
        let err = r.deliver(&[spent_trade(FacilityId(1), "out1", 0)]).unwrap_err();
        assert!(matches!(err, FacilityError::Trade(TradeError::Misrouted { .. })));
        assert_eq!(r.buffers().spent.count(), 1);
    }

    proptest::proptest! {
        #[test]
        fn deliver_keeps_leftovers_in_order(
            stock in proptest::collection::vec(proptest::bool::ANY, 0..12),
            take_out1 in 0..6usize,
            take_out2 in 0..6usize,
        ) {
            let mut h = Harness::new();
            let mut r = h.reactor(FacilityId(0), config());
            let mut stocked = Vec::new();
            for is_uox in &stock {
                let (recipe, commodity, out) = if *is_uox {
                    ("uox_spent", "uox", "out1")
                } else {
                    ("mox_spent", "mox", "out2")
                };
                let id = r.stock_spent(h.batch(5.0, recipe), commodity);
                stocked.push((id, out));
            }

            let count = |out: &str| stocked.iter().filter(|(_, o)| *o == out).count();
            let take_out1 = take_out1.min(count("out1"));
            let take_out2 = take_out2.min(count("out2"));
            let mut trades = Vec::new();
            for seq in 0..take_out1 {
                trades.push(spent_trade(FacilityId(0), "out1", seq as u64));
            }
            for seq in 0..take_out2 {
                trades.push(spent_trade(FacilityId(0), "out2", (take_out1 + seq) as u64));
            }

            let delivered = r.deliver(&trades).unwrap();
            proptest::prop_assert_eq!(delivered.len(), trades.len());

            // The newest `take` batches of each commodity leave; the rest
            // stay in their original order.
            let mut leaving = Vec::new();
            for (out, take) in [("out1", take_out1), ("out2", take_out2)] {
                leaving.extend(
                    stocked.iter().rev().filter(|(_, o)| *o == out).take(take).map(|(id, _)| *id),
                );
            }
            let expected: Vec<_> = stocked
                .iter()
                .map(|(id, _)| *id)
                .filter(|id| !leaving.contains(id))
                .collect();
            proptest::prop_assert_eq!(r.buffers().spent.ids(), expected);
            for (_, batch) in &delivered {
                proptest::prop_assert!(leaving.contains(&batch.id()));
                proptest::prop_assert!(!r.tracker().contains(batch.id()));
            }
        }
    }
}
