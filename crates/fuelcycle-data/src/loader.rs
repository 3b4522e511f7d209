//! Resolution pipeline: reads scenario files, checks cross-references, builds
//! the recipe book and prototype list.
//!
//! Provides format detection (RON/JSON/TOML), file discovery, and
//! deserialization helpers used by [`load_scenario`].

use crate::schema::{DeploymentData, PrototypeData, RecipeData};
use fuelcycle_core::archetype::ArchetypeRegistry;
use fuelcycle_core::config::{ArchetypeConfig, ConfigError, ReactorConfig};
use fuelcycle_core::exchange::Exchange;
use fuelcycle_core::facility::FacilityError;
use fuelcycle_core::fixed::f64_to_fixed64;
use fuelcycle_core::id::FacilityId;
use fuelcycle_core::recipe::{Composition, RecipeBook, RecipeBookBuilder};
use fuelcycle_core::sim::Simulation;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOG_TARGET: &str = "fuelcycle.data";

// ===========================================================================
// Errors
// ===========================================================================

/// Errors that can occur during data loading.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    /// A required data file was not found in the given directory.
    #[error("required file '{file}' not found in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    /// The file has an extension we don't support.
    #[error("unsupported format for file: {file}")]
    UnsupportedFormat { file: PathBuf },

    /// Two files with the same base name but different formats exist.
    #[error("conflicting formats: {a} and {b}")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    /// A deserialization error occurred.
    #[error("parse error in {file}: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// A name reference could not be resolved.
    #[error("unresolved {expected_kind} reference '{name}' in {file}")]
    UnresolvedRef {
        file: PathBuf,
        name: String,
        expected_kind: &'static str,
    },

    /// A duplicate name was found.
    #[error("duplicate name '{name}' in {file}")]
    DuplicateName { file: PathBuf, name: String },

    /// A prototype failed its configuration checks.
    #[error("invalid prototype in {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: ConfigError,
    },

    /// Building a deployed facility failed.
    #[error(transparent)]
    Facility(#[from] FacilityError),

    /// An I/O error occurred.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

// ===========================================================================
// Format detection
// ===========================================================================

/// Supported data file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

/// Detect the format of a file based on its extension.
pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("ron") => Ok(Format::Ron),
        Some("toml") => Ok(Format::Toml),
        Some("json") => Ok(Format::Json),
        _ => Err(DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        }),
    }
}

// ===========================================================================
// File discovery
// ===========================================================================

/// Scan a directory for a data file with the given base name (without extension).
///
/// Looks for `{base_name}.ron`, `{base_name}.toml`, and `{base_name}.json`.
/// Returns `Ok(None)` if no file is found, or `Err(ConflictingFormats)` if
/// multiple formats exist for the same base name.
pub fn find_data_file(dir: &Path, base_name: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let extensions = ["ron", "toml", "json"];
    let mut found: Option<PathBuf> = None;

    for ext in &extensions {
        let candidate = dir.join(format!("{base_name}.{ext}"));
        if candidate.exists() {
            if let Some(ref existing) = found {
                return Err(DataLoadError::ConflictingFormats {
                    a: existing.clone(),
                    b: candidate,
                });
            }
            found = Some(candidate);
        }
    }

    Ok(found)
}

/// Like [`find_data_file`], but returns an error if no file is found.
pub fn require_data_file(dir: &Path, base_name: &str) -> Result<PathBuf, DataLoadError> {
    find_data_file(dir, base_name)?.ok_or_else(|| DataLoadError::MissingRequired {
        file: base_name.to_string(),
        dir: dir.to_path_buf(),
    })
}

// ===========================================================================
// Deserialization
// ===========================================================================

fn parse_error(path: &Path, e: impl std::fmt::Display) -> DataLoadError {
    DataLoadError::Parse {
        file: path.to_path_buf(),
        detail: e.to_string(),
    }
}

/// Deserialize a list from a file. For TOML files, extracts the array at the
/// given `toml_key` from a top-level table. For RON and JSON, deserializes
/// directly as `Vec<T>`.
pub fn deserialize_list<T: DeserializeOwned>(
    path: &Path,
    toml_key: &str,
) -> Result<Vec<T>, DataLoadError> {
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;

    match format {
        Format::Ron => ron::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Json => serde_json::from_str(&content).map_err(|e| parse_error(path, e)),
        Format::Toml => {
            let table: toml::Value = toml::from_str(&content).map_err(|e| parse_error(path, e))?;
            let array = table
                .get(toml_key)
                .ok_or_else(|| parse_error(path, format!("missing key '{toml_key}' in TOML file")))?
                .clone();
            // Deserialize the array value into Vec<T>.
            array
                .try_into()
                .map_err(|e: toml::de::Error| parse_error(path, e))
        }
    }
}

// ===========================================================================
// Name checks
// ===========================================================================

/// Return an `UnresolvedRef` error unless `name` is in `known`.
pub fn resolve_name(
    known: &HashSet<String>,
    name: &str,
    file: &Path,
    expected_kind: &'static str,
) -> Result<(), DataLoadError> {
    if known.contains(name) {
        Ok(())
    } else {
        Err(DataLoadError::UnresolvedRef {
            file: file.to_path_buf(),
            name: name.to_string(),
            expected_kind,
        })
    }
}

/// Check whether a name has already been seen, returning a `DuplicateName`
/// error if so.
pub fn check_duplicate(
    seen: &HashSet<String>,
    name: &str,
    file: &Path,
) -> Result<(), DataLoadError> {
    if seen.contains(name) {
        Err(DataLoadError::DuplicateName {
            file: file.to_path_buf(),
            name: name.to_string(),
        })
    } else {
        Ok(())
    }
}

// ===========================================================================
// Scenario
// ===========================================================================

/// Everything loaded from a scenario directory.
#[derive(Debug)]
pub struct Scenario {
    pub recipes: RecipeBook,
    /// Prototypes in file order.
    pub prototypes: Vec<ArchetypeConfig>,
    pub deployments: Vec<DeploymentData>,
}

impl Scenario {
    pub fn prototype(&self, name: &str) -> Option<&ArchetypeConfig> {
        self.prototypes.iter().find(|p| p.prototype() == name)
    }

    /// Build every deployment into `sim`, in file order. Returns the ids of
    /// the facilities built. Every deployment is resolved before the first
    /// facility is built.
    pub fn deploy<X: Exchange>(
        &self,
        sim: &mut Simulation<X>,
        registry: &ArchetypeRegistry,
    ) -> Result<Vec<FacilityId>, DataLoadError> {
        let configs = self
            .deployments
            .iter()
            .map(|d| {
                self.prototype(&d.prototype)
                    .map(|config| (config, d.count))
                    .ok_or_else(|| DataLoadError::UnresolvedRef {
                        file: PathBuf::from("deployments"),
                        name: d.prototype.clone(),
                        expected_kind: "prototype",
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut ids = Vec::new();
        for (config, count) in configs {
            for _ in 0..count {
                ids.push(sim.build(registry, config)?);
            }
        }
        info!(target: LOG_TARGET, facilities = ids.len(), "scenario deployed");
        Ok(ids)
    }
}

/// Load a scenario directory.
///
/// Reads `recipes` and `prototypes` (both required) and `deployments`
/// (optional). Every prototype is validated and every recipe or prototype
/// it names must exist.
pub fn load_scenario(dir: &Path) -> Result<Scenario, DataLoadError> {
    let recipe_file = require_data_file(dir, "recipes")?;
    let recipe_data: Vec<RecipeData> = deserialize_list(&recipe_file, "recipes")?;

    let mut builder = RecipeBookBuilder::new();
    let mut recipe_names: HashSet<String> = HashSet::new();
    for data in recipe_data {
        let mut composition = Composition::new(&data.name);
        for (constituent, fraction) in &data.fractions {
            composition = composition.with_fraction(constituent, f64_to_fixed64(*fraction));
        }
        builder
            .register(composition)
            .map_err(|_| DataLoadError::DuplicateName {
                file: recipe_file.clone(),
                name: data.name.clone(),
            })?;
        recipe_names.insert(data.name);
    }
    let recipes = builder.build();

    let proto_file = require_data_file(dir, "prototypes")?;
    let prototypes: Vec<PrototypeData> = deserialize_list(&proto_file, "prototypes")?;
    let mut seen: HashSet<String> = HashSet::new();
    for proto in &prototypes {
        check_duplicate(&seen, proto.prototype(), &proto_file)?;
        seen.insert(proto.prototype().to_string());
        match proto {
            ArchetypeConfig::Reactor(cfg) => check_reactor(cfg, &recipe_names, &proto_file)?,
        }
    }

    let deployments: Vec<DeploymentData> = match find_data_file(dir, "deployments")? {
        Some(file) => {
            let deployments: Vec<DeploymentData> = deserialize_list(&file, "deployments")?;
            for d in &deployments {
                resolve_name(&seen, &d.prototype, &file, "prototype")?;
            }
            deployments
        }
        None => Vec::new(),
    };

    info!(
        target: LOG_TARGET,
        dir = %dir.display(),
        recipes = recipes.len(),
        prototypes = prototypes.len(),
        deployments = deployments.len(),
        "scenario loaded"
    );
    Ok(Scenario {
        recipes,
        prototypes,
        deployments,
    })
}

fn check_reactor(cfg: &ReactorConfig, recipes: &HashSet<String>, file: &Path) -> Result<(), DataLoadError> {
    let invalid = |source: ConfigError| DataLoadError::Invalid {
        file: file.to_path_buf(),
        source,
    };
    cfg.check_capacities().map_err(invalid)?;
    let paths = cfg.fuel_paths().map_err(invalid)?;
    let schedule = cfg.schedule().map_err(invalid)?;

    for path in paths.iter() {
        resolve_name(recipes, &path.in_recipe, file, "recipe")?;
        resolve_name(recipes, &path.out_recipe, file, "recipe")?;
    }
    for change in &schedule.recipes {
        resolve_name(recipes, &change.in_recipe, file, "recipe")?;
        resolve_name(recipes, &change.out_recipe, file, "recipe")?;
    }
    debug!(target: LOG_TARGET, prototype = %cfg.prototype, paths = paths.len(), "prototype checked");
    Ok(())
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    /// Create a temporary directory with a unique name for test isolation.
    fn make_test_dir(suffix: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fuelcycle_data_test_{suffix}_{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Clean up a test directory.
    fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir);
    }

    // -----------------------------------------------------------------------
    // detect_format
    // -----------------------------------------------------------------------

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("recipes.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("recipes.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("recipes.json")).unwrap(), Format::Json);
    }

    #[test]
    fn detect_format_unsupported() {
        for name in ["recipes.yaml", "recipes"] {
            assert!(matches!(
                detect_format(Path::new(name)),
                Err(DataLoadError::UnsupportedFormat { .. })
            ));
        }
    }

    // -----------------------------------------------------------------------
    // find_data_file / require_data_file
    // -----------------------------------------------------------------------

    #[test]
    fn find_data_file_found_and_missing() {
        let dir = make_test_dir("find");
        assert_eq!(find_data_file(&dir, "recipes").unwrap(), None);

        fs::write(dir.join("recipes.toml"), "").unwrap();
        assert_eq!(
            find_data_file(&dir, "recipes").unwrap(),
            Some(dir.join("recipes.toml"))
        );

        cleanup(&dir);
    }

    #[test]
    fn find_data_file_conflict() {
        let dir = make_test_dir("find_conflict");
        fs::write(dir.join("recipes.ron"), "[]").unwrap();
        fs::write(dir.join("recipes.json"), "[]").unwrap();

        let result = find_data_file(&dir, "recipes");
        assert!(matches!(
            result,
            Err(DataLoadError::ConflictingFormats { .. })
        ));

        cleanup(&dir);
    }

    #[test]
    fn require_data_file_missing() {
        let dir = make_test_dir("require_missing");

        let result = require_data_file(&dir, "prototypes");
        assert!(matches!(
            result,
            Err(DataLoadError::MissingRequired { ref file, .. }) if file == "prototypes"
        ));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // deserialize_list
    // -----------------------------------------------------------------------

    #[test]
    fn deserialize_list_ron() {
        let dir = make_test_dir("deser_ron");
        let path = dir.join("recipes.ron");
        fs::write(&path, r#"[(name: "a", fractions: {"u235": 0.5}), (name: "b")]"#).unwrap();

        let recipes: Vec<RecipeData> = deserialize_list(&path, "recipes").unwrap();
        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].fractions["u235"], 0.5);

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_json() {
        let dir = make_test_dir("deser_json");
        let path = dir.join("recipes.json");
        fs::write(&path, r#"[{"name": "a"}]"#).unwrap();

        let recipes: Vec<RecipeData> = deserialize_list(&path, "recipes").unwrap();
        assert_eq!(recipes[0].name, "a");

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml() {
        let dir = make_test_dir("deser_toml");
        let path = dir.join("recipes.toml");
        fs::write(
            &path,
            r#"
[[recipes]]
name = "a"
fractions = { u235 = 0.25 }

[[recipes]]
name = "b"
"#,
        )
        .unwrap();

        let recipes: Vec<RecipeData> = deserialize_list(&path, "recipes").unwrap();
        assert_eq!(recipes.len(), 2);
        assert_eq!(recipes[0].fractions["u235"], 0.25);

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_toml_missing_key() {
        let dir = make_test_dir("deser_toml_missing");
        let path = dir.join("recipes.toml");
        fs::write(&path, "[[other]]\nname = \"a\"\n").unwrap();

        let result: Result<Vec<RecipeData>, _> = deserialize_list(&path, "recipes");
        assert!(matches!(
            result,
            Err(DataLoadError::Parse { ref detail, .. }) if detail.contains("recipes")
        ));

        cleanup(&dir);
    }

    #[test]
    fn deserialize_list_parse_error() {
        let dir = make_test_dir("deser_bad");
        let path = dir.join("recipes.ron");
        fs::write(&path, "[(name: ").unwrap();

        let result: Result<Vec<RecipeData>, _> = deserialize_list(&path, "recipes");
        assert!(matches!(result, Err(DataLoadError::Parse { .. })));

        cleanup(&dir);
    }

    // -----------------------------------------------------------------------
    // Name checks
    // -----------------------------------------------------------------------

    #[test]
    fn resolve_name_found_and_missing() {
        let known: HashSet<String> = ["uox_fresh".to_string()].into_iter().collect();
        assert!(resolve_name(&known, "uox_fresh", Path::new("p.ron"), "recipe").is_ok());

        let result = resolve_name(&known, "mox_fresh", Path::new("p.ron"), "recipe");
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "recipe", .. }) if name == "mox_fresh"
        ));
    }

    #[test]
    fn check_duplicate_has_dup() {
        let mut seen = HashSet::new();
        assert!(check_duplicate(&seen, "lwr", Path::new("p.ron")).is_ok());
        seen.insert("lwr".to_string());

        let result = check_duplicate(&seen, "lwr", Path::new("p.ron"));
        assert!(matches!(
            result,
            Err(DataLoadError::DuplicateName { ref name, .. }) if name == "lwr"
        ));
    }

    // -----------------------------------------------------------------------
    // Scenario::deploy
    // -----------------------------------------------------------------------

    #[test]
    fn deploy_rejects_unknown_prototype_before_building() {
        use fuelcycle_core::test_utils::{reactor_config, recipe_book, FirstFitExchange};

        let scenario = Scenario {
            recipes: recipe_book(),
            prototypes: vec![ArchetypeConfig::Reactor(reactor_config(1, 1, 1, 0))],
            deployments: vec![
                DeploymentData {
                    prototype: "test_reactor".to_string(),
                    count: 2,
                },
                DeploymentData {
                    prototype: "fbr".to_string(),
                    count: 1,
                },
            ],
        };
        let mut sim = Simulation::new(recipe_book(), FirstFitExchange::new());

        let result = scenario.deploy(&mut sim, &ArchetypeRegistry::with_defaults());
        assert!(matches!(
            result,
            Err(DataLoadError::UnresolvedRef { ref name, expected_kind: "prototype", .. }) if name == "fbr"
        ));
        assert_eq!(sim.facilities().count(), 0);
    }

    // -----------------------------------------------------------------------
    // Error display messages
    // -----------------------------------------------------------------------

    #[test]
    fn error_display_messages() {
        let e = DataLoadError::MissingRequired {
            file: "recipes".to_string(),
            dir: PathBuf::from("/data"),
        };
        assert!(format!("{e}").contains("recipes"));
        assert!(format!("{e}").contains("/data"));

        let e = DataLoadError::Invalid {
            file: PathBuf::from("prototypes.ron"),
            source: ConfigError::EmptyCore {
                prototype: "lwr".to_string(),
            },
        };
        let msg = format!("{e}");
        assert!(msg.contains("prototypes.ron"));
        assert!(msg.contains("'lwr'"));

        let e = DataLoadError::UnresolvedRef {
            file: PathBuf::from("deployments.ron"),
            name: "fbr".to_string(),
            expected_kind: "prototype",
        };
        let msg = format!("{e}");
        assert!(msg.contains("fbr"));
        assert!(msg.contains("prototype"));
    }

    #[test]
    fn io_error_converts() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let data_err: DataLoadError = io_err.into();
        assert!(matches!(data_err, DataLoadError::Io(_)));
        assert!(format!("{data_err}").contains("file not found"));
    }
}
