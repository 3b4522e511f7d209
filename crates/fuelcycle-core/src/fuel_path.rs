//! Fuel paths and the assembly tracker that binds batches to them.
//!
//! A [`FuelPath`] ties one input commodity/recipe to the output
//! commodity/recipe its batches leave as. All paths live in a single ordered
//! [`FuelPaths`] list, and [`AssemblyTracker`] maps each resident batch to an
//! index into that list.

use crate::fixed::Fixed64;
use crate::id::BatchId;
use slotmap::SecondaryMap;

/// One configured fuel path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuelPath {
    pub in_commodity: String,
    pub in_recipe: String,
    pub out_commodity: String,
    pub out_recipe: String,
    /// Request preference. `None` behaves as zero.
    pub preference: Option<Fixed64>,
}

/// Ordered, non-empty list of fuel paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuelPaths {
    paths: Vec<FuelPath>,
}

impl FuelPaths {
    /// Returns `None` for an empty list.
    pub fn new(paths: Vec<FuelPath>) -> Option<Self> {
        if paths.is_empty() {
            None
        } else {
            Some(Self { paths })
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FuelPath> {
        self.paths.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FuelPath> {
        self.paths.iter()
    }

    /// Index of the first path accepting `in_commodity`.
    pub fn position_in(&self, in_commodity: &str) -> Option<usize> {
        self.paths.iter().position(|p| p.in_commodity == in_commodity)
    }

    /// Distinct output commodities in path order.
    pub fn out_commodities(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::with_capacity(self.paths.len());
        for p in &self.paths {
            if !out.contains(&p.out_commodity.as_str()) {
                out.push(&p.out_commodity);
            }
        }
        out
    }

    pub(crate) fn first_in_mut(&mut self, in_commodity: &str) -> Option<&mut FuelPath> {
        self.paths.iter_mut().find(|p| p.in_commodity == in_commodity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// The exchange delivered a batch under a commodity this facility never
    /// requested.
    #[error("received batch under unsupported commodity '{0}'")]
    UnsupportedCommodity(String),
    #[error("batch {0:?} is not tracked by this facility")]
    Untracked(BatchId),
    #[error("batch {batch:?} maps to fuel path {index}, but only {len} paths exist")]
    IndexOutOfBounds {
        batch: BatchId,
        index: usize,
        len: usize,
    },
}

/// Maps batch identity to fuel path index for every batch resident in (or
/// discharging from) a facility.
#[derive(Debug, Clone)]
pub struct AssemblyTracker {
    paths: FuelPaths,
    indexes: SecondaryMap<BatchId, usize>,
}

impl AssemblyTracker {
    pub fn new(paths: FuelPaths) -> Self {
        Self {
            paths,
            indexes: SecondaryMap::new(),
        }
    }

    pub fn paths(&self) -> &FuelPaths {
        &self.paths
    }

    pub(crate) fn paths_mut(&mut self) -> &mut FuelPaths {
        &mut self.paths
    }

    /// Number of tracked batches.
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    pub fn contains(&self, batch: BatchId) -> bool {
        self.indexes.contains_key(batch)
    }

    /// Record which path a newly accepted batch belongs to.
    pub fn index(&mut self, batch: BatchId, in_commodity: &str) -> Result<usize, TrackerError> {
        let i = self
            .paths
            .position_in(in_commodity)
            .ok_or_else(|| TrackerError::UnsupportedCommodity(in_commodity.to_string()))?;
        self.indexes.insert(batch, i);
        Ok(i)
    }

    /// Drop the entry for a batch that has left the facility for good.
    pub fn forget(&mut self, batch: BatchId) -> Option<usize> {
        self.indexes.remove(batch)
    }

    fn path(&self, batch: BatchId) -> Result<&FuelPath, TrackerError> {
        let index = *self
            .indexes
            .get(batch)
            .ok_or(TrackerError::Untracked(batch))?;
        self.paths.get(index).ok_or(TrackerError::IndexOutOfBounds {
            batch,
            index,
            len: self.paths.len(),
        })
    }

    pub fn commodity_in(&self, batch: BatchId) -> Result<&str, TrackerError> {
        Ok(&self.path(batch)?.in_commodity)
    }

    pub fn commodity_out(&self, batch: BatchId) -> Result<&str, TrackerError> {
        Ok(&self.path(batch)?.out_commodity)
    }

    pub fn recipe_in(&self, batch: BatchId) -> Result<&str, TrackerError> {
        Ok(&self.path(batch)?.in_recipe)
    }

    pub fn recipe_out(&self, batch: BatchId) -> Result<&str, TrackerError> {
        Ok(&self.path(batch)?.out_recipe)
    }

    /// Preference of the batch's path; zero when the path sets none.
    pub fn preference(&self, batch: BatchId) -> Result<Fixed64, TrackerError> {
        Ok(self.path(batch)?.preference.unwrap_or_default())
    }
}
