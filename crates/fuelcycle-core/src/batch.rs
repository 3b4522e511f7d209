use crate::fixed::Quantity;
use crate::id::BatchId;
use crate::recipe::Composition;
use slotmap::SlotMap;
use std::sync::Arc;

/// A discrete, uniquely identified unit of material.
///
/// Deliberately not `Clone`: a batch lives in exactly one place at a time and
/// moves between buffers by value.
#[derive(Debug, PartialEq, Eq)]
pub struct Batch {
    id: BatchId,
    quantity: Quantity,
    composition: Arc<Composition>,
}

impl Batch {
    pub fn id(&self) -> BatchId {
        self.id
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn composition(&self) -> &Arc<Composition> {
        &self.composition
    }

    pub(crate) fn set_composition(&mut self, composition: Arc<Composition>) {
        self.composition = composition;
    }
}

/// Mints batches with stable identities. Owned by whoever creates material
/// (the exchange side); facilities never create batches.
#[derive(Debug, Default)]
pub struct BatchAllocator {
    ids: SlotMap<BatchId, ()>,
}

impl BatchAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, quantity: Quantity, composition: Arc<Composition>) -> Batch {
        Batch {
            id: self.ids.insert(()),
            quantity,
            composition,
        }
    }

    /// Number of batches minted and not yet retired.
    pub fn live(&self) -> usize {
        self.ids.len()
    }

    /// Retire a batch that has left the simulation. Returns false if the id
    /// was already retired.
    pub fn retire(&mut self, batch: Batch) -> bool {
        self.ids.remove(batch.id).is_some()
    }
}
