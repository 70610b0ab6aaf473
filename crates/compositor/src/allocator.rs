//! Layer buffer allocation.

use common::error::try_alloc_zeroed;
use common::{CoreError, CoreResult};
use parking_lot::Mutex;
use tracing::trace;

/// Source of zeroed layer buffers.
pub trait LayerAllocator: Send + Sync {
    /// Allocate `bytes` zeroed bytes. Failure is an error, never an abort.
    fn allocate(&self, bytes: usize) -> CoreResult<Vec<u8>>;

    /// Return the accounting for a buffer of `bytes` bytes.
    fn release(&self, bytes: usize) {
        let _ = bytes;
    }
}

/// Allocates from the global heap.
#[derive(Debug, Default)]
pub struct HeapAllocator;

impl LayerAllocator for HeapAllocator {
    fn allocate(&self, bytes: usize) -> CoreResult<Vec<u8>> {
        try_alloc_zeroed(bytes)
    }
}

/// Heap allocator with a cap on the bytes handed out at the same time,
/// modelling a fixed memory pool.
#[derive(Debug)]
pub struct BudgetAllocator {
    budget: usize,
    outstanding: Mutex<usize>,
}

impl BudgetAllocator {
    pub fn new(budget: usize) -> Self {
        Self {
            budget,
            outstanding: Mutex::new(0),
        }
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Bytes currently handed out.
    pub fn outstanding(&self) -> usize {
        *self.outstanding.lock()
    }
}

impl LayerAllocator for BudgetAllocator {
    fn allocate(&self, bytes: usize) -> CoreResult<Vec<u8>> {
        let mut outstanding = self.outstanding.lock();
        if *outstanding + bytes > self.budget {
            trace!(bytes, outstanding = *outstanding, budget = self.budget, "layer budget exhausted");
            return Err(CoreError::Alloc(bytes));
        }

        let buf = try_alloc_zeroed(bytes)?;
        *outstanding += bytes;
        Ok(buf)
    }

    fn release(&self, bytes: usize) {
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(bytes);
    }
}
