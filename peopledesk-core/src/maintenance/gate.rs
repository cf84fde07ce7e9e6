use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{MaintenanceError, MaintenanceResult};

/// In-process maintenance-mode flag.
///
/// Held for the whole of a rebuild. A second rebuild fails fast instead of
/// queueing, and application writes to projection payloads are refused.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceGate {
    held: Arc<AtomicBool>,
}

impl MaintenanceGate {
    pub fn try_acquire(&self) -> MaintenanceResult<MaintenanceLease> {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| MaintenanceError::MaintenanceInProgress)?;
        Ok(MaintenanceLease {
            held: Arc::clone(&self.held),
        })
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Releases the gate on drop.
#[derive(Debug)]
pub struct MaintenanceLease {
    held: Arc<AtomicBool>,
}

impl Drop for MaintenanceLease {
    fn drop(&mut self) {
        self.held.store(false, Ordering::Release);
    }
}
