//! Chunked, disk-backed media acquisition
//!
//! The [`Acquirer`] drains a transport chunk reader into the single cache slot,
//! reporting progress and honoring cooperative cancellation at chunk
//! boundaries. At most one session is active: starting a new one cancels the
//! previous session and waits for its writer to close before the new writer
//! opens.
//!
//! - [`session`] - One download session, from writer open to playable reference

mod session;


use crate::config::{AcquisitionConfig, MAX_CHUNK_SIZE};
use crate::error::AcquisitionError;
use crate::navigation::ScreenResources;
use crate::storage::CacheSlot;
use crate::transport::TransportClient;
use crate::types::{Event, MediaHandle, PlayableReference, SessionId};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, broadcast};
use tokio_util::sync::CancellationToken;

use session::DownloadSession;

/// The session currently allowed to own the cache slot
struct ActiveSession {
    id: SessionId,
    cancel: CancellationToken,
}

/// A registered session that has not touched the slot yet
///
/// Pass it to [`Acquirer::run`]; until then it holds the active position.
#[must_use = "a prepared download stays active until it is run"]
#[derive(Debug)]
pub struct PendingDownload {
    id: SessionId,
    handle: MediaHandle,
    cancel: CancellationToken,
}

impl PendingDownload {
    /// Id the session will report in its events
    pub fn session(&self) -> SessionId {
        self.id
    }
}

/// Acquisition pipeline
///
/// Cheap to clone; all clones share the same slot and active session.
#[derive(Clone)]
pub struct Acquirer {
    config: Arc<AcquisitionConfig>,
    transport: Arc<dyn TransportClient>,
    slot: Arc<dyn CacheSlot>,
    event_tx: broadcast::Sender<Event>,
    /// Most recently started session (protected by Mutex)
    active: Arc<Mutex<Option<ActiveSession>>>,
    /// Held by a session from before its writer opens until after it closes
    slot_lock: Arc<Mutex<()>>,
    next_id: Arc<AtomicU64>,
}

impl Acquirer {
    /// Create a pipeline writing into `slot`
    pub fn new(
        config: AcquisitionConfig,
        transport: Arc<dyn TransportClient>,
        slot: Arc<dyn CacheSlot>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            transport,
            slot,
            event_tx,
            active: Arc::new(Mutex::new(None)),
            slot_lock: Arc::new(Mutex::new(())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Materialize one remote object into the cache slot
    ///
    /// Cancels any session still running and waits for its writer to close
    /// before opening the slot. Returns [`AcquisitionError::Cancelled`] if this
    /// session is itself cancelled or superseded.
    pub async fn start_download(
        &self,
        handle: MediaHandle,
    ) -> Result<PlayableReference, AcquisitionError> {
        let pending = self.prepare(handle).await?;
        self.run(pending).await
    }

    /// Check the preconditions and register a session without reading anything
    ///
    /// From here on [`Acquirer::cancel`] reaches the session, so a caller can
    /// make it the active download before handing [`Acquirer::run`] to
    /// another task. The previous session is cancelled.
    pub async fn prepare(
        &self,
        handle: MediaHandle,
    ) -> Result<PendingDownload, AcquisitionError> {
        if handle.length == 0 {
            return Err(AcquisitionError::EmptyMedia);
        }

        if let Err(e) = self.slot.ensure_available().await {
            tracing::warn!(error = %e, "cache slot storage is unavailable");
            return Err(AcquisitionError::StorageUnavailable(e.to_string()));
        }

        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let cancel = CancellationToken::new();

        // Supersede the previous session; it stops at its next chunk boundary
        let mut active = self.active.lock().await;
        if let Some(previous) = active.replace(ActiveSession {
            id,
            cancel: cancel.clone(),
        }) {
            tracing::info!(
                session_id = id.0,
                previous_session_id = previous.id.0,
                "cancelling previous download"
            );
            previous.cancel.cancel();
        }

        Ok(PendingDownload { id, handle, cancel })
    }

    /// Run a prepared session to completion, cancellation or failure
    pub async fn run(
        &self,
        pending: PendingDownload,
    ) -> Result<PlayableReference, AcquisitionError> {
        let PendingDownload { id, handle, cancel } = pending;
        let result = {
            // Waits for the superseded session's writer to close
            let _slot = self.slot_lock.lock().await;
            if cancel.is_cancelled() {
                Err(AcquisitionError::Cancelled)
            } else {
                self.run_session(id, &handle, cancel).await
            }
        };

        self.release_active(id).await;
        result
    }

    async fn run_session(
        &self,
        id: SessionId,
        handle: &MediaHandle,
        cancel: CancellationToken,
    ) -> Result<PlayableReference, AcquisitionError> {
        if let Err(e) = self.check_free_space(handle.length).await {
            tracing::warn!(session_id = id.0, error = %e, "not enough free space for download");
            self.event_tx
                .send(Event::DownloadFailed {
                    session: id,
                    error: e.to_string(),
                })
                .ok();
            return Err(e);
        }

        tracing::info!(
            session_id = id.0,
            media = %handle.remote,
            total_bytes = handle.length,
            "starting download"
        );

        let chunk_size = self.config.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let mut session = DownloadSession::new(id, handle.clone(), cancel);
        let result = session
            .run(
                self.transport.as_ref(),
                self.slot.as_ref(),
                chunk_size,
                &self.event_tx,
            )
            .await;

        match &result {
            Ok(playable) => {
                tracing::info!(
                    session_id = id.0,
                    bytes = playable.length,
                    path = %playable.path.display(),
                    "download complete"
                );
                self.event_tx
                    .send(Event::DownloadComplete {
                        session: id,
                        path: playable.path.clone(),
                    })
                    .ok();
            }
            Err(AcquisitionError::Cancelled) => {
                tracing::info!(
                    session_id = id.0,
                    written_bytes = session.written(),
                    "download cancelled"
                );
                self.event_tx
                    .send(Event::DownloadCancelled {
                        session: id,
                        written_bytes: session.written(),
                    })
                    .ok();
            }
            Err(e) => {
                tracing::error!(
                    session_id = id.0,
                    written_bytes = session.written(),
                    error = %e,
                    "download failed"
                );
                self.event_tx
                    .send(Event::DownloadFailed {
                        session: id,
                        error: e.to_string(),
                    })
                    .ok();
            }
        }

        result
    }

    /// Fail early when the slot's filesystem cannot hold the whole object
    async fn check_free_space(&self, length: u64) -> Result<(), AcquisitionError> {
        let disk = &self.config.disk_space;
        if !disk.enabled {
            return Ok(());
        }
        let Some(available) = self.slot.available_space().await else {
            return Ok(());
        };

        // Opening the writer frees whatever the slot currently holds
        let reclaimable = self.slot.cached_bytes().await;
        let usable = available.saturating_add(reclaimable);
        let needed = length.saturating_add(disk.min_free_space);
        if usable < needed {
            return Err(AcquisitionError::QuotaExceeded {
                written: 0,
                required: length,
            });
        }
        Ok(())
    }

    async fn release_active(&self, id: SessionId) {
        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(|s| s.id == id) {
            *active = None;
        }
    }

    /// Request cancellation of the active session
    ///
    /// Takes effect at the next chunk boundary. Returns `false` when no session is active.
    pub async fn cancel(&self) -> bool {
        match self.active.lock().await.as_ref() {
            Some(session) => {
                tracing::debug!(session_id = session.id.0, "cancellation requested");
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel the active session and wait until its writer is closed
    pub async fn cancel_and_wait(&self) {
        if self.cancel().await {
            let _slot = self.slot_lock.lock().await;
        }
    }

    /// Cancel any active session and discard the cached media
    ///
    /// This is the recovery for [`AcquisitionError::QuotaExceeded`].
    pub async fn clear_cache(&self) -> Result<(), AcquisitionError> {
        self.cancel().await;
        let _slot = self.slot_lock.lock().await;
        let freed = self.slot.cached_bytes().await;
        self.slot.clear().await?;
        tracing::info!(freed_bytes = freed, "cache slot cleared");
        Ok(())
    }

    /// Id of the session currently owning (or waiting for) the slot
    pub async fn active_session(&self) -> Option<SessionId> {
        self.active.lock().await.as_ref().map(|s| s.id)
    }

    /// Whether a session is running
    pub async fn is_active(&self) -> bool {
        self.active_session().await.is_some()
    }
}

#[async_trait::async_trait]
impl ScreenResources for Acquirer {
    fn name(&self) -> &'static str {
        "acquisition"
    }

    async fn release(&self) {
        self.cancel_and_wait().await;
    }
}
