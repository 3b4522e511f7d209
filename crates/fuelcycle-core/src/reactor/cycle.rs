use super::{LOG_TARGET, Reactor};
use crate::event::{DischargeOutcome, Event, OutputSample};
use crate::facility::{FacilityError, PhaseContext};
use crate::fixed::{Fixed64, Ticks};
use crate::recipe::Composition;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where a reactor is within its operating cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// `step < cycle_time`
    BeforeCycle,
    /// `step == cycle_time`
    CycleEnd,
    /// `cycle_time < step < cycle_time + refuel_time`
    Refueling,
    /// `step >= cycle_time + refuel_time`
    RefuelDone,
}

/// Cycle clock of one reactor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleState {
    /// Timesteps since the current cycle began. Reset to 0 only when a full
    /// core finishes its refuel window.
    pub step: Ticks,
    pub cycle_time: Ticks,
    pub refuel_time: Ticks,
    /// Whether this cycle's batch has left the core.
    pub discharged: bool,
}

impl CycleState {
    pub fn new(cycle_time: Ticks, refuel_time: Ticks) -> Self {
        Self {
            step: 0,
            cycle_time,
            refuel_time,
            discharged: false,
        }
    }

    pub fn phase(&self) -> CyclePhase {
        let refuel_end = self.refuel_end();
        if self.step < self.cycle_time {
            CyclePhase::BeforeCycle
        } else if self.step == self.cycle_time {
            CyclePhase::CycleEnd
        } else if self.step < refuel_end {
            CyclePhase::Refueling
        } else {
            CyclePhase::RefuelDone
        }
    }

    fn past_cycle_end(&self) -> bool {
        self.step >= self.cycle_time
    }

    fn refuel_end(&self) -> Ticks {
        self.cycle_time.saturating_add(self.refuel_time)
    }

    fn refuel_complete(&self) -> bool {
        self.step >= self.refuel_end()
    }
}

impl Reactor {
    /// Pre-exchange half of the timestep.
    pub(super) fn tick_cycle(&mut self, ctx: &mut PhaseContext<'_>) -> Result<(), FacilityError> {
        if self.cycle.step == self.cycle.cycle_time {
            self.transmute(ctx)?;
            ctx.events.record(Event::CycleEnd {
                facility: self.id,
                tick: ctx.tick,
            });
            info!(target: LOG_TARGET, facility = self.id.0, tick = ctx.tick, "cycle end");
        }
        if self.cycle.past_cycle_end() && !self.cycle.discharged {
            self.cycle.discharged = self.discharge(ctx)?;
        }
        if self.cycle.past_cycle_end() {
            self.load(ctx)?;
        }

        let applied = self.schedule.apply(ctx.tick, self.tracker.paths_mut());
        if applied.preferences + applied.recipes > 0 {
            debug!(
                target: LOG_TARGET,
                facility = self.id.0,
                tick = ctx.tick,
                preferences = applied.preferences,
                recipes = applied.recipes,
                "overrides applied"
            );
        }
        Ok(())
    }

    /// Post-exchange half of the timestep.
    pub(super) fn tock_cycle(&mut self, ctx: &mut PhaseContext<'_>) {
        let full = self.buffers.core.is_full();

        if self.cycle.refuel_complete() && full {
            self.cycle.discharged = false;
            self.cycle.step = 0;
        }

        if self.cycle.step == 0 && full {
            ctx.events.record(Event::CycleStart {
                facility: self.id,
                tick: ctx.tick,
            });
            info!(target: LOG_TARGET, facility = self.id.0, tick = ctx.tick, "cycle start");
        }

        let operating = full && self.cycle.step < self.cycle.cycle_time;
        ctx.series.record(OutputSample {
            facility: self.id,
            tick: ctx.tick,
            series: self.config.power_name.clone(),
            value: if operating { self.power_cap } else { Fixed64::ZERO },
        });

        // The clock holds at zero until the first core is complete.
        if self.cycle.step > 0 || full {
            self.cycle.step = self.cycle.step.saturating_add(1);
        }
    }

    /// Rewrite the oldest `n_assem_batch` core assemblies to their spent
    /// recipe and move them to the top of the core, where the next discharge
    /// will take them from. Returns the number transmuted.
    pub(super) fn transmute(&mut self, ctx: &mut PhaseContext<'_>) -> Result<usize, FacilityError> {
        let count = self.buffers.core.count();
        let n = self.config.n_assem_batch.min(count);

        // Resolve every target before touching the core.
        let targets = self
            .buffers
            .core
            .iter()
            .take(n)
            .map(|b| -> Result<Arc<Composition>, FacilityError> {
                let recipe = self.tracker.recipe_out(b.id())?;
                Ok(ctx.recipes.recipe(recipe)?)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut oldest_first = self.buffers.core.pop_n(count)?;
        oldest_first.reverse();
        let rest = oldest_first.split_off(n);
        self.buffers.core.push_all(rest)?;
        self.buffers.core.push_all(oldest_first)?;

        for (batch, target) in self.buffers.core.iter_mut().skip(count - n).zip(targets) {
            ctx.recipes.transmute(batch, target);
        }

        ctx.events.record(Event::Transmute {
            facility: self.id,
            tick: ctx.tick,
            assemblies: n,
        });
        info!(target: LOG_TARGET, facility = self.id.0, tick = ctx.tick, assemblies = n, "transmute");
        Ok(n)
    }

    /// Move one batch core → spent. Returns false, without moving anything,
    /// when spent storage cannot take a whole batch.
    pub(super) fn discharge(&mut self, ctx: &mut PhaseContext<'_>) -> Result<bool, FacilityError> {
        let n_batch = self.config.n_assem_batch;
        if self.buffers.spent.space() < n_batch {
            ctx.events.record(Event::Discharge {
                facility: self.id,
                tick: ctx.tick,
                outcome: DischargeOutcome::Failed,
            });
            warn!(
                target: LOG_TARGET,
                facility = self.id.0,
                tick = ctx.tick,
                spent = self.buffers.spent.count(),
                "discharge failed: spent storage full"
            );
            return Ok(false);
        }

        let n = n_batch.min(self.buffers.core.count());
        let mut moved = self.buffers.core.pop_n(n)?;
        moved.reverse();
        self.buffers.spent.push_all(moved)?;

        ctx.events.record(Event::Discharge {
            facility: self.id,
            tick: ctx.tick,
            outcome: DischargeOutcome::Moved(n),
        });
        info!(target: LOG_TARGET, facility = self.id.0, tick = ctx.tick, assemblies = n, "discharge");
        Ok(true)
    }

    /// Fill empty core slots from fresh stock. Returns the number loaded.
    pub(super) fn load(&mut self, ctx: &mut PhaseContext<'_>) -> Result<usize, FacilityError> {
        let n = self.buffers.core.space().min(self.buffers.fresh.count());
        if n == 0 {
            return Ok(0);
        }

        let mut moved = self.buffers.fresh.pop_n(n)?;
        moved.reverse();
        self.buffers.core.push_all(moved)?;

        ctx.events.record(Event::Load {
            facility: self.id,
            tick: ctx.tick,
            assemblies: n,
        });
        info!(target: LOG_TARGET, facility = self.id.0, tick = ctx.tick, assemblies = n, "load");
        Ok(n)
    }
}
