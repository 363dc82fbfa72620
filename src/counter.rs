use std::sync::Arc;

use log::debug;
use tokio::sync::Mutex;

struct Cell {
    value: u32,
    frozen: bool,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum WriteOutcome {
    Stored,
    Stale { current: u32 },
    Frozen { current: u32 },
}

/// Every operation takes the lock for exactly one step. Callers that read,
/// compute and write back do so in two separate critical sections.
#[derive(Clone)]
pub struct SharedCounter {
    cell: Arc<Mutex<Cell>>,
}

impl SharedCounter {
    pub fn new() -> Self {
        SharedCounter {
            cell: Arc::new(Mutex::new(Cell {
                value: 0,
                frozen: false,
            })),
        }
    }

    pub async fn read(&self) -> u32 {
        self.cell.lock().await.value
    }

    /// Store `value` unless the counter is frozen or `value` would not move
    /// it forward.
    pub async fn write(&self, value: u32) -> WriteOutcome {
        let mut cell = self.cell.lock().await;

        if cell.frozen {
            WriteOutcome::Frozen {
                current: cell.value,
            }
        } else if value <= cell.value {
            debug!("dropping stale write {value}, counter is at {}", cell.value);
            WriteOutcome::Stale {
                current: cell.value,
            }
        } else {
            cell.value = value;
            WriteOutcome::Stored
        }
    }

    pub async fn freeze(&self) -> u32 {
        let mut cell = self.cell.lock().await;
        cell.frozen = true;
        cell.value
    }

    pub async fn is_frozen(&self) -> bool {
        self.cell.lock().await.frozen
    }
}
