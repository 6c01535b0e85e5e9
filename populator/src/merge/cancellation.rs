use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::PopulationError;

/// Cooperative cancellation flag shared by every level of a merge.
#[derive(Debug, Clone, Default)]
pub struct Cancellation(Arc<AtomicBool>);

impl Cancellation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), PopulationError> {
        if self.is_cancelled() {
            Err(PopulationError::Cancelled)
        } else {
            Ok(())
        }
    }
}
