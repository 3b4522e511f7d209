//! Serde data file structs for scenario content.
//!
//! A scenario directory holds up to three files, each in RON, JSON, or TOML:
//!
//! - `recipes`: named compositions (required).
//! - `prototypes`: archetype-tagged facility configurations (required).
//! - `deployments`: how many facilities to build from each prototype.
//!
//! For TOML, each file is a table with one array under the file's base name,
//! e.g. `[[recipes]]`.

use fuelcycle_core::config::ArchetypeConfig;
use serde::Deserialize;
use std::collections::BTreeMap;

/// A named composition.
#[derive(Debug, Clone, Deserialize)]
pub struct RecipeData {
    pub name: String,
    /// Fraction per constituent.
    #[serde(default)]
    pub fractions: BTreeMap<String, f64>,
}

/// One prototype entry.
pub type PrototypeData = ArchetypeConfig;

fn one() -> u32 {
    1
}

/// Build `count` facilities from the named prototype at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeploymentData {
    pub prototype: String,
    #[serde(default = "one")]
    pub count: u32,
}
