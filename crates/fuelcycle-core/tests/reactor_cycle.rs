//! Multi-cycle runs of reactors inside the host simulation.

use fuelcycle_core::archetype::ArchetypeRegistry;
use fuelcycle_core::config::{ArchetypeConfig, ReactorConfig};
use fuelcycle_core::event::{Event, EventKind};
use fuelcycle_core::id::FacilityId;
use fuelcycle_core::reactor::Reactor;
use fuelcycle_core::recipe::CompositionService;
use fuelcycle_core::sim::Simulation;
use fuelcycle_core::test_utils::*;

// ===========================================================================
// Helpers
// ===========================================================================

fn simulation(limit: Option<usize>) -> Simulation<FirstFitExchange> {
    let recipes = recipe_book();
    let uox = recipes.recipe("uox_fresh").unwrap();
    let mut exchange = FirstFitExchange::new().with_supply("uox", uox);
    exchange.supply_limit = limit;
    Simulation::new(recipes, exchange)
}

fn add_reactor(sim: &mut Simulation<FirstFitExchange>, cfg: ReactorConfig) -> FacilityId {
    sim.build(&ArchetypeRegistry::with_defaults(), &ArchetypeConfig::Reactor(cfg))
        .unwrap()
}

fn ticks_of(sim: &Simulation<FirstFitExchange>, kind: EventKind) -> Vec<u64> {
    sim.events().of_kind(kind).map(Event::tick).collect()
}

// ===========================================================================
// Steady operation
// ===========================================================================

#[test]
fn steady_state_cycles_with_spent_sink() {
    let mut sim = simulation(None);
    let mut cfg = reactor_config(3, 1, 3, 1);
    cfg.n_assem_fresh = 2;
    let reactor = add_reactor(&mut sim, cfg);
    let sink = sim.next_facility_id();
    sim.add(Box::new(SinkFacility::new(sink, "spent_uox", 10.0)));

    sim.run(20).unwrap();

    assert_eq!(ticks_of(&sim, EventKind::CycleStart), vec![0, 4, 8, 12, 16]);
    assert_eq!(ticks_of(&sim, EventKind::CycleEnd), vec![3, 7, 11, 15, 19]);
    assert_eq!(ticks_of(&sim, EventKind::Transmute), vec![3, 7, 11, 15, 19]);
    assert_eq!(ticks_of(&sim, EventKind::Discharge), vec![3, 7, 11, 15, 19]);

    let power = sim.series().values_for(reactor);
    assert_eq!(power.len(), 20);
    for (tick, value) in power.iter().enumerate() {
        let expected = if tick % 4 == 3 { 0.0 } else { 100.0 };
        assert_eq!(*value, fixed(expected), "power at tick {tick}");
    }

    let r = sim.facility_as::<Reactor>(reactor).unwrap();
    assert!(r.buffers().core.is_full());
    assert_eq!(r.buffers().fresh.count(), 2);
    assert!(r.buffers().spent.is_empty());

    let received = sim.facility_as::<SinkFacility>(sink).unwrap().received.len();
    assert_eq!(received, 5);
}

#[test]
fn supplied_batches_are_conserved() {
    let mut sim = simulation(None);
    let mut cfg = reactor_config(4, 2, 2, 2);
    cfg.n_assem_fresh = 1;
    let reactor = add_reactor(&mut sim, cfg);
    let sink = sim.next_facility_id();
    sim.add(Box::new(SinkFacility::new(sink, "spent_uox", 10.0)));

    for _ in 0..25 {
        sim.step().unwrap();
        let r = sim.facility_as::<Reactor>(reactor).unwrap();
        let b = r.buffers();
        assert!(b.core.count() <= b.core.capacity());
        assert!(b.fresh.count() <= b.fresh.capacity());
        let held = b.core.count() + b.fresh.count() + b.spent.count();
        let sold = sim.facility_as::<SinkFacility>(sink).unwrap().received.len();
        assert_eq!(sim.exchange().supplied, held + sold);
        assert_eq!(r.tracker().len(), held);
    }
}

// ===========================================================================
// Shortages
// ===========================================================================

#[test]
fn partial_core_never_starts_a_cycle() {
    let mut sim = simulation(Some(2));
    let reactor = add_reactor(&mut sim, reactor_config(3, 1, 2, 1));

    sim.run(6).unwrap();

    let r = sim.facility_as::<Reactor>(reactor).unwrap();
    assert_eq!(r.buffers().core.count(), 2);
    assert_eq!(r.cycle().step, 0);
    assert!(ticks_of(&sim, EventKind::CycleStart).is_empty());
    assert!(sim.series().values_for(reactor).iter().all(|v| *v == fixed(0.0)));
}

#[test]
fn full_spent_storage_fails_discharge_every_step() {
    let mut sim = simulation(None);
    let mut cfg = reactor_config(1, 1, 1, 0);
    cfg.n_assem_spent = 1;
    let reactor = add_reactor(&mut sim, cfg);

    sim.run(4).unwrap();

    let discharges: Vec<(u64, String)> = sim
        .events()
        .of_kind(EventKind::Discharge)
        .map(|e| (e.tick(), e.value()))
        .collect();
    assert_eq!(
        discharges,
        vec![
            (1, "1 assemblies".to_string()),
            (2, "failed".to_string()),
            (3, "failed".to_string()),
        ]
    );
    let r = sim.facility_as::<Reactor>(reactor).unwrap();
    assert_eq!(r.buffers().spent.count(), 1);
    assert_eq!(r.buffers().core.count(), 1);
    assert!(!r.cycle().discharged);
}

// ===========================================================================
// Overrides
// ===========================================================================

#[test]
fn recipe_override_changes_spent_composition() {
    let mut sim = simulation(None);
    let mut cfg = reactor_config(1, 1, 2, 0);
    cfg.recipe_changes.times = vec![1];
    cfg.recipe_changes.commodities = vec!["uox".into()];
    cfg.recipe_changes.in_recipes = vec!["uox_fresh".into()];
    cfg.recipe_changes.out_recipes = vec!["mox_spent".into()];
    let reactor = add_reactor(&mut sim, cfg);

    sim.run(3).unwrap();

    let r = sim.facility_as::<Reactor>(reactor).unwrap();
    let spent: Vec<&str> = r
        .buffers()
        .spent
        .iter()
        .map(|b| b.composition().name.as_str())
        .collect();
    assert_eq!(spent, vec!["mox_spent"]);
}

#[test]
fn exchange_sees_requests_from_every_reactor() {
    let mut sim = simulation(None);
    add_reactor(&mut sim, reactor_config(2, 1, 2, 1));
    add_reactor(&mut sim, reactor_config(3, 1, 2, 1));

    let report = sim.step().unwrap();
    assert_eq!(report.requests, 5);
    assert_eq!(report.transferred, 5);
    assert_eq!(sim.exchange().supplied, 5);
}
