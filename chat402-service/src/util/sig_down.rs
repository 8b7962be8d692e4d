//! Shutdown signal handling.
//!
//! [`SigDown`] listens for SIGTERM and SIGINT (Ctrl+C on Windows) and turns
//! the first one into a cancelled [`CancellationToken`]. The server waits on
//! it to drain connections; the paying client hands the token to the
//! negotiator so an interrupted payment stops before anything else is sent.

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Cancels a token on the first shutdown signal.
#[allow(missing_debug_implementations)] // TaskTracker doesn't impl Debug
pub struct SigDown {
    task_tracker: TaskTracker,
    cancellation_token: CancellationToken,
}

impl SigDown {
    /// Registers the signal handlers.
    ///
    /// # Errors
    ///
    /// Returns an [`std::io::Error`] if signal registration fails.
    #[allow(clippy::unnecessary_wraps)] // Result needed on Unix for signal registration
    pub fn try_new() -> Result<Self, std::io::Error> {
        let inner = CancellationToken::new();
        let outer = inner.clone();
        let task_tracker = TaskTracker::new();

        #[cfg(unix)]
        {
            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = sigterm.recv() => {
                        tracing::info!("received SIGTERM");
                    },
                    _ = sigint.recv() => {
                        tracing::info!("received SIGINT");
                    },
                    () = inner.cancelled() => return,
                }
                inner.cancel();
            });
        }

        #[cfg(windows)]
        {
            task_tracker.spawn(async move {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => inner.cancel(),
                    () = inner.cancelled() => {}
                }
            });
        }

        task_tracker.close();
        Ok(Self {
            task_tracker,
            cancellation_token: outer,
        })
    }

    /// A clone of the token that is cancelled on shutdown.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Waits for a shutdown signal and for the listener task to finish.
    pub async fn recv(&self) {
        self.cancellation_token.cancelled().await;
        self.task_tracker.wait().await;
    }
}
