//! Serde configuration types for facility prototypes.
//!
//! These structs are the on-disk shape of a prototype. They are checked and
//! converted into runtime types once, when a facility enters the simulation.
//! Numeric quantities are plain `f64` here and become [`Fixed64`] on entry.

use crate::fixed::{Fixed64, Ticks, f64_to_fixed64};
use crate::fuel_path::{FuelPath, FuelPaths};
use crate::schedule::{OverrideSchedule, PreferenceChange, RecipeChange};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("prototype '{prototype}' has no fuel paths")]
    NoFuelPaths { prototype: String },
    #[error("prototype '{prototype}' has {found} {field} vals, expected {expected}")]
    FuelColumnMismatch {
        prototype: String,
        field: &'static str,
        found: usize,
        expected: usize,
    },
    /// One line per inconsistent override table.
    #[error("malformed override schedule:\n{0}")]
    MalformedSchedule(String),
    #[error("prototype '{prototype}' has a core of zero assemblies")]
    EmptyCore { prototype: String },
    #[error("prototype '{prototype}' discharges {n_assem_batch} assemblies per batch from a core of {n_assem_core}")]
    BatchExceedsCore {
        prototype: String,
        n_assem_batch: usize,
        n_assem_core: usize,
    },
    #[error("prototype '{prototype}' has a cycle of {cycle_time} plus a refuel of {refuel_time} timesteps, which overflows")]
    CycleOverflow {
        prototype: String,
        cycle_time: Ticks,
        refuel_time: Ticks,
    },
    #[error("unknown archetype '{0}'")]
    UnknownArchetype(String),
}

// ---------------------------------------------------------------------------
// Fuel paths
// ---------------------------------------------------------------------------

/// One fuel path as written in a data file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPathConfig {
    pub in_commodity: String,
    pub in_recipe: String,
    pub out_commodity: String,
    pub out_recipe: String,
    #[serde(default)]
    pub preference: Option<f64>,
}

/// Column-wise fuel path tables, one entry per path in each column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelPathColumns {
    pub in_commodities: Vec<String>,
    pub in_recipes: Vec<String>,
    pub out_commodities: Vec<String>,
    pub out_recipes: Vec<String>,
    /// May be shorter than the other columns; missing entries mean "unset".
    #[serde(default)]
    pub preferences: Vec<f64>,
}

/// Fuel paths in either record or column form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FuelPathsConfig {
    Records(Vec<FuelPathConfig>),
    Columns(FuelPathColumns),
}

impl FuelPathColumns {
    /// Zip the columns into records. All string columns must agree in
    /// length; the preference column may be shorter but not longer.
    pub fn into_records(self, prototype: &str) -> Result<Vec<FuelPathConfig>, ConfigError> {
        let n = self.in_commodities.len();
        let mismatch = |field: &'static str, found: usize| ConfigError::FuelColumnMismatch {
            prototype: prototype.to_string(),
            field,
            found,
            expected: n,
        };
        if self.in_recipes.len() != n {
            return Err(mismatch("in_recipes", self.in_recipes.len()));
        }
        if self.out_commodities.len() != n {
            return Err(mismatch("out_commodities", self.out_commodities.len()));
        }
        if self.out_recipes.len() != n {
            return Err(mismatch("out_recipes", self.out_recipes.len()));
        }
        if self.preferences.len() > n {
            return Err(mismatch("preferences", self.preferences.len()));
        }

        let mut prefs = self.preferences.into_iter();
        Ok(self
            .in_commodities
            .into_iter()
            .zip(self.in_recipes)
            .zip(self.out_commodities)
            .zip(self.out_recipes)
            .map(|(((in_commodity, in_recipe), out_commodity), out_recipe)| FuelPathConfig {
                in_commodity,
                in_recipe,
                out_commodity,
                out_recipe,
                preference: prefs.next(),
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Override tables
// ---------------------------------------------------------------------------

/// Scheduled recipe changes, column-wise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecipeChangeTables {
    #[serde(default)]
    pub times: Vec<Ticks>,
    #[serde(default)]
    pub commodities: Vec<String>,
    #[serde(default)]
    pub in_recipes: Vec<String>,
    #[serde(default)]
    pub out_recipes: Vec<String>,
}

/// Scheduled preference changes, column-wise.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferenceChangeTables {
    #[serde(default)]
    pub times: Vec<Ticks>,
    #[serde(default)]
    pub commodities: Vec<String>,
    #[serde(default)]
    pub values: Vec<f64>,
}

// ---------------------------------------------------------------------------
// Reactor prototype
// ---------------------------------------------------------------------------

fn default_power_name() -> String {
    "power".to_string()
}

fn default_spent_capacity() -> usize {
    1_000_000_000
}

/// Parameters of a batch-fueled reactor prototype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactorConfig {
    pub prototype: String,
    /// Assemblies discharged and reloaded per refuel.
    pub n_assem_batch: usize,
    /// Quantity of one assembly.
    pub assem_size: f64,
    pub n_assem_core: usize,
    #[serde(default)]
    pub n_assem_fresh: usize,
    #[serde(default = "default_spent_capacity")]
    pub n_assem_spent: usize,
    pub cycle_time: Ticks,
    pub refuel_time: Ticks,
    /// Output produced per timestep while operating.
    #[serde(default)]
    pub power_cap: f64,
    /// Name of the output time series.
    #[serde(default = "default_power_name")]
    pub power_name: String,
    pub fuel: FuelPathsConfig,
    #[serde(default)]
    pub recipe_changes: RecipeChangeTables,
    #[serde(default)]
    pub preference_changes: PreferenceChangeTables,
}

impl ReactorConfig {
    pub fn assem_size(&self) -> Fixed64 {
        f64_to_fixed64(self.assem_size)
    }

    pub fn power_cap(&self) -> Fixed64 {
        f64_to_fixed64(self.power_cap)
    }

    /// Check capacities.
    pub fn check_capacities(&self) -> Result<(), ConfigError> {
        if self.n_assem_core == 0 {
            return Err(ConfigError::EmptyCore {
                prototype: self.prototype.clone(),
            });
        }
        if self.n_assem_batch > self.n_assem_core {
            return Err(ConfigError::BatchExceedsCore {
                prototype: self.prototype.clone(),
                n_assem_batch: self.n_assem_batch,
                n_assem_core: self.n_assem_core,
            });
        }
        if self.cycle_time.checked_add(self.refuel_time).is_none() {
            return Err(ConfigError::CycleOverflow {
                prototype: self.prototype.clone(),
                cycle_time: self.cycle_time,
                refuel_time: self.refuel_time,
            });
        }
        Ok(())
    }

    /// Build the ordered fuel path list.
    pub fn fuel_paths(&self) -> Result<FuelPaths, ConfigError> {
        let records = match &self.fuel {
            FuelPathsConfig::Records(r) => r.clone(),
            FuelPathsConfig::Columns(c) => c.clone().into_records(&self.prototype)?,
        };
        let paths = records
            .into_iter()
            .map(|r| FuelPath {
                in_commodity: r.in_commodity,
                in_recipe: r.in_recipe,
                out_commodity: r.out_commodity,
                out_recipe: r.out_recipe,
                preference: r.preference.map(f64_to_fixed64),
            })
            .collect();
        FuelPaths::new(paths).ok_or_else(|| ConfigError::NoFuelPaths {
            prototype: self.prototype.clone(),
        })
    }

    /// Validate the override tables and zip them into a schedule. Every
    /// inconsistent table is reported, not just the first.
    pub fn schedule(&self) -> Result<OverrideSchedule, ConfigError> {
        let mut problems = Vec::new();
        let mut check = |field: &str, found: usize, expected: usize| {
            if found != expected {
                problems.push(format!(
                    "prototype '{}' has {found} {field} vals, expected {expected}",
                    self.prototype
                ));
            }
        };

        let rc = &self.recipe_changes;
        let n = rc.times.len();
        check("recipe_change_commods", rc.commodities.len(), n);
        check("recipe_change_in", rc.in_recipes.len(), n);
        check("recipe_change_out", rc.out_recipes.len(), n);

        let pc = &self.preference_changes;
        let n = pc.times.len();
        check("pref_change_commods", pc.commodities.len(), n);
        check("pref_change_values", pc.values.len(), n);

        if !problems.is_empty() {
            return Err(ConfigError::MalformedSchedule(problems.join("\n")));
        }

        let recipes = rc
            .times
            .iter()
            .zip(&rc.commodities)
            .zip(rc.in_recipes.iter().zip(&rc.out_recipes))
            .map(|((&time, commodity), (in_recipe, out_recipe))| RecipeChange {
                time,
                commodity: commodity.clone(),
                in_recipe: in_recipe.clone(),
                out_recipe: out_recipe.clone(),
            })
            .collect();
        let preferences = pc
            .times
            .iter()
            .zip(&pc.commodities)
            .zip(&pc.values)
            .map(|((&time, commodity), &value)| PreferenceChange {
                time,
                commodity: commodity.clone(),
                value: f64_to_fixed64(value),
            })
            .collect();

        Ok(OverrideSchedule {
            recipes,
            preferences,
        })
    }
}

// ---------------------------------------------------------------------------
// Archetype selection
// ---------------------------------------------------------------------------

/// A prototype definition tagged with the archetype that builds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArchetypeConfig {
    Reactor(ReactorConfig),
}

impl ArchetypeConfig {
    /// Registry key of the archetype.
    pub fn archetype(&self) -> &'static str {
        match self {
            ArchetypeConfig::Reactor(_) => "Reactor",
        }
    }

    pub fn prototype(&self) -> &str {
        match self {
            ArchetypeConfig::Reactor(c) => &c.prototype,
        }
    }
}
