//! Progress forwarding and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, Phase, ProgressUpdate};
use crate::utils::format_bytes;
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;

use super::App;

impl App {
    /// Forward download progress events to the presenter until shutdown
    pub(crate) fn spawn_progress_forwarder(&self) {
        let mut events = self.event_tx.subscribe();
        let presenter = self.presenter.clone();

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(Event::Downloading {
                        written_bytes,
                        total_bytes,
                        percent,
                        ..
                    }) => {
                        presenter.progress(&ProgressUpdate {
                            phase: Phase::Acquiring,
                            percent: Some(percent),
                            message: format!(
                                "Downloading {} of {}",
                                format_bytes(written_bytes),
                                format_bytes(total_bytes)
                            ),
                        });
                    }
                    Ok(Event::Shutdown) => break,
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "progress forwarder lagged behind");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    /// Gracefully shut down the application
    ///
    /// 1. Stops accepting new commands
    /// 2. Releases every screen's resources (login polling, download, playback)
    /// 3. Releases the wake lock
    /// 4. Closes the settings store
    /// 5. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        if !self.accepting.swap(false, Ordering::SeqCst) {
            tracing::debug!("shutdown already in progress");
            return Ok(());
        }

        let shutdown_timeout = std::time::Duration::from_secs(10);
        let released = tokio::time::timeout(shutdown_timeout, async {
            self.navigation.lock().await.release_all().await;
        })
        .await;
        if released.is_err() {
            tracing::warn!("Timeout waiting for screen resources to release, proceeding with shutdown");
        }

        self.wake_lock.release().await;
        self.settings.close().await;

        self.event_tx.send(Event::Shutdown).ok();
        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether [`App::shutdown`] has been called
    pub fn is_shutting_down(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }
}
