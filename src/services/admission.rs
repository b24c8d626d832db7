//! Admission control for percolation runs.
//!
//! Tracks which blueprints are currently percolating. Admission checks for a
//! duplicate id and for free capacity, then inserts, all under one lock, so
//! two simultaneous calls can never both be admitted for the same id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};

/// Set of blueprint ids with a run in flight.
#[derive(Debug, Clone)]
pub struct ActivePercolations {
    inner: Arc<Mutex<HashSet<Uuid>>>,
    max_concurrent: usize,
}

impl ActivePercolations {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(HashSet::new())),
            max_concurrent,
        }
    }

    // The set is never left half-updated, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, HashSet<Uuid>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Admit `id`, returning a permit that releases the slot on drop.
    pub fn try_admit(&self, id: Uuid) -> DomainResult<AdmissionPermit> {
        let mut active = self.lock();
        if active.contains(&id) {
            return Err(DomainError::AlreadyPercolating(id));
        }
        if active.len() >= self.max_concurrent {
            return Err(DomainError::ConcurrencyLimitReached {
                limit: self.max_concurrent,
            });
        }
        active.insert(id);
        Ok(AdmissionPermit {
            id,
            active: Arc::clone(&self.inner),
        })
    }

    pub fn contains(&self, id: Uuid) -> bool {
        self.lock().contains(&id)
    }

    /// Snapshot of the active ids.
    pub fn ids(&self) -> Vec<Uuid> {
        self.lock().iter().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

/// Proof of admission. Removes the id from the active set when dropped,
/// including on early returns and panics.
#[derive(Debug)]
pub struct AdmissionPermit {
    id: Uuid,
    active: Arc<Mutex<HashSet<Uuid>>>,
}

impl AdmissionPermit {
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Drop for AdmissionPermit {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}
