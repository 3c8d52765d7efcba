// Cancellation handle for in-flight completions

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Clonable cancel switch shared between a completion and its caller.
///
/// `cancel()` sets the flag before firing the token, so code that observes
/// the flag never acts on a completion that has already been abandoned.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    token: CancellationToken,
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Resolves once `cancel()` has been called on any clone.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}
