//! Compositions and the recipe book that serves them by name.
//!
//! A [`Composition`] is immutable once built and shared through `Arc`, so a
//! transmute only swaps the pointer a batch holds. The simulation never
//! interprets the constituent fractions; they exist for sinks and hosts.

use crate::batch::Batch;
use crate::fixed::Fixed64;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// A named, immutable material composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub name: String,
    /// Constituent → mass fraction. Not required to be normalized.
    pub fractions: BTreeMap<String, Fixed64>,
}

impl Composition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            fractions: BTreeMap::new(),
        }
    }

    pub fn with_fraction(mut self, constituent: &str, fraction: Fixed64) -> Self {
        self.fractions.insert(constituent.to_string(), fraction);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompositionError {
    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),
    #[error("duplicate recipe '{0}'")]
    DuplicateRecipe(String),
}

/// Lookup and in-place transmutation of compositions.
pub trait CompositionService {
    /// Look up a composition by recipe name.
    fn recipe(&self, name: &str) -> Result<Arc<Composition>, CompositionError>;

    /// Rewrite a batch's composition in place. Identity and quantity are
    /// preserved.
    fn transmute(&self, batch: &mut Batch, target: Arc<Composition>) {
        batch.set_composition(target);
    }
}

/// Builder for an immutable [`RecipeBook`].
#[derive(Debug, Default)]
pub struct RecipeBookBuilder {
    recipes: HashMap<String, Arc<Composition>>,
}

impl RecipeBookBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a composition under its own name.
    pub fn register(&mut self, composition: Composition) -> Result<(), CompositionError> {
        if self.recipes.contains_key(&composition.name) {
            return Err(CompositionError::DuplicateRecipe(composition.name));
        }
        self.recipes
            .insert(composition.name.clone(), Arc::new(composition));
        Ok(())
    }

    pub fn build(self) -> RecipeBook {
        RecipeBook {
            recipes: self.recipes,
        }
    }
}

/// Immutable recipe registry. Frozen after `build()`.
#[derive(Debug, Clone, Default)]
pub struct RecipeBook {
    recipes: HashMap<String, Arc<Composition>>,
}

impl RecipeBook {
    pub fn len(&self) -> usize {
        self.recipes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recipes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.recipes.contains_key(name)
    }
}

impl CompositionService for RecipeBook {
    fn recipe(&self, name: &str) -> Result<Arc<Composition>, CompositionError> {
        self.recipes
            .get(name)
            .cloned()
            .ok_or_else(|| CompositionError::UnknownRecipe(name.to_string()))
    }
}
