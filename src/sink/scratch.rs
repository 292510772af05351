use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::{DumpError, Result};

#[derive(Debug, Default)]
struct LedgerState {
    outstanding: AtomicUsize,
    allocations: AtomicUsize,
    releases: AtomicUsize,
}

/// Tracks every scratch allocation made during a session.
///
/// Each buffer returns its exact size to the ledger when dropped, so
/// `outstanding()` is zero whenever no operation holds scratch memory.
#[derive(Debug, Clone, Default)]
pub struct ScratchLedger {
    state: Arc<LedgerState>,
    limit: Option<usize>,
}

impl ScratchLedger {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            state: Arc::new(LedgerState::default()),
            limit,
        }
    }

    /// Allocates `count` zeroed elements.
    pub fn alloc<T: Copy + Default>(&self, count: usize) -> Result<Scratch<T>> {
        let bytes = count.saturating_mul(std::mem::size_of::<T>());

        if let Some(limit) = self.limit {
            if self.outstanding().saturating_add(bytes) > limit {
                return Err(DumpError::AllocationFailure { requested: bytes });
            }
        }

        let mut data = Vec::new();
        data.try_reserve_exact(count)
            .map_err(|_| DumpError::AllocationFailure { requested: bytes })?;
        data.resize(count, T::default());

        self.state.outstanding.fetch_add(bytes, Ordering::SeqCst);
        self.state.allocations.fetch_add(1, Ordering::SeqCst);

        Ok(Scratch {
            data,
            bytes,
            ledger: Arc::clone(&self.state),
        })
    }

    pub fn outstanding(&self) -> usize {
        self.state.outstanding.load(Ordering::SeqCst)
    }

    pub fn allocations(&self) -> usize {
        self.state.allocations.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.state.releases.load(Ordering::SeqCst)
    }
}

/// A ledger-tracked buffer, released on drop.
#[derive(Debug)]
pub struct Scratch<T> {
    data: Vec<T>,
    bytes: usize,
    ledger: Arc<LedgerState>,
}

impl<T> Scratch<T> {
    pub fn size_in_bytes(&self) -> usize {
        self.bytes
    }
}

impl<T> Deref for Scratch<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}

impl<T> DerefMut for Scratch<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data
    }
}

impl<T> Drop for Scratch<T> {
    fn drop(&mut self) {
        self.ledger.outstanding.fetch_sub(self.bytes, Ordering::SeqCst);
        self.ledger.releases.fetch_add(1, Ordering::SeqCst);
    }
}
