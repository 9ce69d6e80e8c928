//! Request cancellation.
//!
//! A [`CancelController`] owned by the caller flips a watch channel; the
//! pipeline and correction loop hold [`CancelSignal`]s and check them before
//! every oracle call.

use crate::error::GuardError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

/// Cancellation signal that can be checked or awaited.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    receiver: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_sender, receiver) = watch::channel(false);
        Self { receiver }
    }

    /// Check if cancellation has been requested without blocking.
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Wait until cancellation is requested.
    ///
    /// Pends forever if the controller is dropped without cancelling.
    pub async fn cancelled(&mut self) {
        if self.receiver.wait_for(|&v| v).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Run `fut` unless cancellation is requested first.
    ///
    /// Already-cancelled signals never poll `fut`; a cancellation arriving
    /// while `fut` is pending drops it.
    pub async fn run<F, T>(&self, fut: F) -> Result<T, GuardError>
    where
        F: Future<Output = Result<T, GuardError>>,
    {
        if self.is_cancelled() {
            return Err(GuardError::Cancelled);
        }

        let mut signal = self.clone();
        tokio::select! {
            biased;
            _ = signal.cancelled() => Err(GuardError::Cancelled),
            result = fut => result,
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Controller that requests cancellation of in-flight work.
#[derive(Debug)]
pub struct CancelController {
    sender: watch::Sender<bool>,
    cancelled: AtomicBool,
}

impl CancelController {
    /// Create a new controller.
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender,
            cancelled: AtomicBool::new(false),
        }
    }

    /// Get a signal tied to this controller.
    pub fn signal(&self) -> CancelSignal {
        CancelSignal {
            receiver: self.sender.subscribe(),
        }
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation. Repeated calls are no-ops.
    pub fn cancel(&self) {
        if self
            .cancelled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("Cancelling in-flight requests");
            self.sender.send_replace(true);
        }
    }
}

impl Default for CancelController {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared controller handle.
pub type SharedCancelController = Arc<CancelController>;

/// Cancel the controller when Ctrl+C is received.
pub fn install_ctrl_c_handler(controller: SharedCancelController) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, cancelling...");
                controller.cancel();
            }
            Err(e) => {
                error!("Failed to listen for Ctrl+C signal: {}", e);
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancel_signal() {
        let controller = CancelController::new();
        let signal = controller.signal();
        assert!(!signal.is_cancelled());

        controller.cancel();
        assert!(controller.is_cancelled());
        assert!(signal.is_cancelled());
    }

    #[test]
    fn test_cancel_idempotent() {
        let controller = CancelController::new();
        controller.cancel();
        controller.cancel();
        assert!(controller.is_cancelled());
    }

    #[test]
    fn test_signal_created_after_cancel() {
        let controller = CancelController::new();
        controller.cancel();
        assert!(controller.signal().is_cancelled());
    }

    #[test]
    fn test_never_signal() {
        assert!(!CancelSignal::never().is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_wakes_waiter() {
        let controller = Arc::new(CancelController::new());
        let mut signal = controller.signal();

        let c = controller.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            c.cancel();
        });

        tokio::time::timeout(Duration::from_secs(1), signal.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_skips_future_when_cancelled() {
        let controller = CancelController::new();
        controller.cancel();

        let mut polled = false;
        let result: Result<(), GuardError> = controller
            .signal()
            .run(async {
                polled = true;
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(GuardError::Cancelled)));
        assert!(!polled);
    }

    #[tokio::test]
    async fn test_run_passes_result_through() {
        let value = CancelSignal::never().run(async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_never_signal_pends() {
        let mut signal = CancelSignal::never();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.cancelled()).await;
        assert!(result.is_err());
    }
}
