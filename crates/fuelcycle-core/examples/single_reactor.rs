//! Single reactor example: one reactor fed from outside the simulation, with
//! a repository buying its spent fuel.
//!
//! Runs 24 timesteps and prints the event stream and power series.
//! Set `RUST_LOG=fuelcycle=debug` to see the per-phase log.
//!
//! Run with: `cargo run -p fuelcycle-core --example single_reactor --features test-utils`

use fuelcycle_core::archetype::ArchetypeRegistry;
use fuelcycle_core::config::{ArchetypeConfig, FuelPathConfig, FuelPathsConfig, ReactorConfig};
use fuelcycle_core::fixed::fixed64_to_f64;
use fuelcycle_core::recipe::CompositionService;
use fuelcycle_core::sim::Simulation;
use fuelcycle_core::test_utils::{FirstFitExchange, SinkFacility, recipe_book};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // --- Step 1: Recipes and exchange ---

    let recipes = recipe_book();
    let uox = recipes.recipe("uox_fresh").expect("uox_fresh is in the recipe book");
    let exchange = FirstFitExchange::new().with_supply("uox", uox);
    let mut sim = Simulation::new(recipes, exchange);

    // --- Step 2: Facilities ---

    let prototype = ReactorConfig {
        prototype: "lwr".to_string(),
        n_assem_batch: 1,
        assem_size: 33_000.0,
        n_assem_core: 3,
        n_assem_fresh: 1,
        n_assem_spent: 1_000_000_000,
        cycle_time: 5,
        refuel_time: 1,
        power_cap: 1000.0,
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
    };
    let registry = ArchetypeRegistry::with_defaults();
    let reactor = sim
        .build(&registry, &ArchetypeConfig::Reactor(prototype))
        .expect("prototype is valid");
    let repo = sim.next_facility_id();
    sim.add(Box::new(SinkFacility::new(repo, "spent_uox", 33_000.0)));

    // --- Step 3: Run ---

    for _ in 0..24 {
        let report = sim.step().expect("step succeeds");
        println!(
            "tick {:>2}: {} requests, {} bids, {} trades",
            report.tick, report.requests, report.bids, report.trades
        );
    }

    // --- Step 4: Results ---

    println!("\nevents:");
    for event in sim.events().iter() {
        println!("  t={:>2} {:<12} {}", event.tick(), event.kind().as_str(), event.value());
    }

    let power: Vec<String> = sim
        .series()
        .values_for(reactor)
        .iter()
        .map(|v| format!("{:.0}", fixed64_to_f64(*v)))
        .collect();
    println!("\npower: [{}]", power.join(", "));

    let sink = sim
        .facility_as::<SinkFacility>(repo)
        .expect("repository was added");
    println!("repository holds {} spent assemblies", sink.received.len());
}
