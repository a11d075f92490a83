//! Cooperative cancellation signal handed to the work behind a future

use tokio::sync::watch;

/// Observes whether the owning [`CommandFuture`](super::CommandFuture) was cancelled
///
/// Work that produces a future should poll [`is_cancelled`](Self::is_cancelled)
/// between steps, or race [`cancelled`](Self::cancelled) against its own progress.
#[derive(Debug, Clone)]
pub struct CancellationSignal {
    rx: watch::Receiver<bool>,
}

impl CancellationSignal {
    pub(super) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested
    ///
    /// Never completes if the future resolves without being cancelled.
    pub async fn cancelled(&mut self) {
        if self.rx.wait_for(|cancelled| *cancelled).await.is_err() {
            // Future state dropped: cancellation can no longer happen
            std::future::pending::<()>().await;
        }
    }
}
