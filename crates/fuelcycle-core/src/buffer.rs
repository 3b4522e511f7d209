use crate::batch::Batch;
use crate::fixed::{Quantity, total_quantity};
use crate::id::BatchId;

/// Buffer failures. A rejected push hands the batches back to the caller.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum BufferError {
    #[error("buffer full: capacity {capacity}, cannot take {} more", .rejected.len())]
    Full { capacity: usize, rejected: Vec<Batch> },
    #[error("cannot pop {requested} batches, only {available} held")]
    Underflow { requested: usize, available: usize },
}

/// An ordered, count-bounded collection of batches.
///
/// Batches are appended at the back. [`pop_n`](Self::pop_n) takes from the
/// back and returns batches newest-first, so `push_all` of the reversed
/// result restores the original order.
#[derive(Debug, Default)]
pub struct FuelBuffer {
    batches: Vec<Batch>,
    capacity: usize,
}

impl FuelBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            batches: Vec::new(),
            capacity,
        }
    }

    pub fn push(&mut self, batch: Batch) -> Result<(), BufferError> {
        if self.batches.len() >= self.capacity {
            return Err(BufferError::Full {
                capacity: self.capacity,
                rejected: vec![batch],
            });
        }
        self.batches.push(batch);
        Ok(())
    }

    /// Push several batches in order. All-or-nothing: nothing is pushed if
    /// the whole set does not fit.
    pub fn push_all(&mut self, batches: Vec<Batch>) -> Result<(), BufferError> {
        if batches.len() > self.space() {
            return Err(BufferError::Full {
                capacity: self.capacity,
                rejected: batches,
            });
        }
        self.batches.extend(batches);
        Ok(())
    }

    /// Remove the `n` most recently pushed batches, newest first.
    pub fn pop_n(&mut self, n: usize) -> Result<Vec<Batch>, BufferError> {
        let available = self.batches.len();
        if n > available {
            return Err(BufferError::Underflow {
                requested: n,
                available,
            });
        }
        let mut popped = self.batches.split_off(available - n);
        popped.reverse();
        Ok(popped)
    }

    pub fn count(&self) -> usize {
        self.batches.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Free slots.
    pub fn space(&self) -> usize {
        self.capacity.saturating_sub(self.batches.len())
    }

    pub fn is_full(&self) -> bool {
        self.batches.len() >= self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// Total material held.
    pub fn quantity(&self) -> Quantity {
        total_quantity(self.batches.iter().map(Batch::quantity))
    }

    /// Batches from oldest to newest.
    pub fn iter(&self) -> std::slice::Iter<'_, Batch> {
        self.batches.iter()
    }

    /// Identities from oldest to newest.
    pub fn ids(&self) -> Vec<BatchId> {
        self.batches.iter().map(Batch::id).collect()
    }

    pub(crate) fn iter_mut(&mut self) -> std::slice::IterMut<'_, Batch> {
        self.batches.iter_mut()
    }
}

/// The three buffers a batch-fueled facility owns.
#[derive(Debug, Default)]
pub struct FuelBuffers {
    /// Batches under active processing.
    pub core: FuelBuffer,
    /// Accepted, not yet loaded.
    pub fresh: FuelBuffer,
    /// Discharged, not yet delivered.
    pub spent: FuelBuffer,
}

impl FuelBuffers {
    pub fn new(n_core: usize, n_fresh: usize, n_spent: usize) -> Self {
        Self {
            core: FuelBuffer::new(n_core),
            fresh: FuelBuffer::new(n_fresh),
            spent: FuelBuffer::new(n_spent),
        }
    }

    /// Empty assembly slots across core and fresh.
    pub fn missing_assemblies(&self) -> usize {
        self.core.space() + self.fresh.space()
    }
}
