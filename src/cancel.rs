use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::GraphStoreError;

/// Cooperative cancellation signal checked before statements execute and
/// again before commit. Cancelling after a transaction has committed has no
/// effect on that transaction.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_active(&self) -> Result<(), GraphStoreError> {
        if self.is_cancelled() {
            Err(GraphStoreError::Cancelled)
        } else {
            Ok(())
        }
    }
}
