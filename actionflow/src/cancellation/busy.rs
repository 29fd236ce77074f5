//! Busy regions.
//!
//! While a busy region is active every interrupt sent through its
//! [`InterruptSource`] invokes the region's callback. The listener is torn
//! down when the guard is dropped, so the callback never outlives the region
//! regardless of how the region is left.

use super::InterruptSource;
use std::future::Future;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// Guard that uninstalls a busy-region callback when dropped.
pub struct BusyGuard {
    listener: Option<JoinHandle<()>>,
}

impl BusyGuard {
    /// Installs `callback` on `source` until the guard is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn install<F>(source: &InterruptSource, callback: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        // Subscribe before spawning so no interrupt sent after install is lost.
        let mut receiver = source.subscribe();
        let listener = tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(()) => callback(),
                    Err(RecvError::Lagged(missed)) => {
                        for _ in 0..missed {
                            callback();
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Self {
            listener: Some(listener),
        }
    }

    /// Uninstalls the callback now.
    pub fn release(&mut self) {
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for BusyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusyGuard")
            .field("active", &self.listener.is_some())
            .finish()
    }
}

/// Runs `operation` inside a busy region.
pub async fn run_busy<T, F, Fut>(source: &InterruptSource, callback: F, operation: Fut) -> T
where
    F: Fn() + Send + Sync + 'static,
    Fut: Future<Output = T>,
{
    let _guard = BusyGuard::install(source, callback);
    operation.await
}
