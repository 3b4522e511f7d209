//! Name → constructor registry for facility archetypes.
//!
//! Hosts populate a registry once at startup and build facilities from
//! [`ArchetypeConfig`] records; nothing is loaded dynamically.

use crate::config::{ArchetypeConfig, ConfigError};
use crate::facility::{Facility, FacilityError};
use crate::id::FacilityId;
use crate::reactor::Reactor;
use std::collections::HashMap;
use tracing::debug;

/// Builds one facility from its prototype configuration.
pub type Constructor = fn(FacilityId, &ArchetypeConfig) -> Result<Box<dyn Facility>, FacilityError>;

#[derive(Debug, Default)]
pub struct ArchetypeRegistry {
    constructors: HashMap<String, Constructor>,
}

impl ArchetypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every archetype this crate ships.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("Reactor", build_reactor);
        registry
    }

    /// Register `constructor` under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &str, constructor: Constructor) {
        self.constructors.insert(name.to_string(), constructor);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.constructors.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn build(&self, id: FacilityId, config: &ArchetypeConfig) -> Result<Box<dyn Facility>, FacilityError> {
        let archetype = config.archetype();
        let constructor = self
            .constructors
            .get(archetype)
            .ok_or_else(|| ConfigError::UnknownArchetype(archetype.to_string()))?;
        debug!(target: "fuelcycle.archetype", archetype, prototype = config.prototype(), facility = id.0, "building facility");
        constructor(id, config)
    }
}

fn build_reactor(id: FacilityId, config: &ArchetypeConfig) -> Result<Box<dyn Facility>, FacilityError> {
    match config {
        ArchetypeConfig::Reactor(cfg) => Ok(Box::new(Reactor::enter(id, cfg.clone())?)),
    }
}
