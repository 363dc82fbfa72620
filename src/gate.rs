use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{Semaphore, TryAcquireError};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GateError {
    #[error("invalid gate capacity {0}")]
    InvalidCapacity(usize),
    #[cfg(test)]
    #[error("gate is already at its capacity of {0}")]
    Full(usize),
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum GateOutcome {
    Open,
    Closed,
}

/// The gate starts empty, so a zero-timeout `try_pass` reports `Closed`
/// unless someone released a permit first.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl Gate {
    pub fn new(capacity: usize) -> Result<Gate, GateError> {
        if capacity == 0 || capacity > Semaphore::MAX_PERMITS {
            return Err(GateError::InvalidCapacity(capacity));
        }

        Ok(Gate {
            permits: Arc::new(Semaphore::new(0)),
            capacity,
        })
    }

    /// Zero-timeout acquisition. A taken permit is consumed for good.
    pub fn try_pass(&self) -> GateOutcome {
        match self.permits.try_acquire() {
            Ok(permit) => {
                permit.forget();
                GateOutcome::Open
            }
            Err(TryAcquireError::NoPermits) => GateOutcome::Closed,
            // never closed while a run holds the gate
            Err(TryAcquireError::Closed) => GateOutcome::Closed,
        }
    }

    #[cfg(test)]
    pub fn release(&self) -> Result<(), GateError> {
        if self.permits.available_permits() >= self.capacity {
            return Err(GateError::Full(self.capacity));
        }
        self.permits.add_permits(1);
        Ok(())
    }

    #[cfg(test)]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
