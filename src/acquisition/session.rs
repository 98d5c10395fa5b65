//! One download session: open the slot, drain the chunk reader, close the slot.

use crate::error::AcquisitionError;
use crate::storage::{CacheSlot, SlotWriter};
use crate::transport::TransportClient;
use crate::types::{Event, MediaHandle, PlayableReference, SessionId};
use crate::utils::{is_quota_error, percent_complete};
use futures::StreamExt;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// State of one acquisition, exclusively owned by the pipeline
pub(super) struct DownloadSession {
    id: SessionId,
    handle: MediaHandle,
    written: u64,
    cancel: CancellationToken,
}

impl DownloadSession {
    pub(super) fn new(id: SessionId, handle: MediaHandle, cancel: CancellationToken) -> Self {
        Self {
            id,
            handle,
            written: 0,
            cancel,
        }
    }

    /// Bytes written to the slot so far
    pub(super) fn written(&self) -> u64 {
        self.written
    }

    /// Run the session to completion, cancellation or failure
    ///
    /// The writer is closed on every path before this returns.
    pub(super) async fn run(
        &mut self,
        transport: &dyn TransportClient,
        slot: &dyn CacheSlot,
        chunk_size: usize,
        event_tx: &broadcast::Sender<Event>,
    ) -> Result<PlayableReference, AcquisitionError> {
        let mut writer = slot.open_writer().await.map_err(|e| self.write_error(e))?;

        event_tx
            .send(Event::DownloadStarted {
                session: self.id,
                total_bytes: self.handle.length,
            })
            .ok();

        let drained = self
            .drain(writer.as_mut(), transport, chunk_size, event_tx)
            .await;
        let closed = writer.close().await;

        if let Err(e) = drained {
            if let Err(close_err) = closed {
                tracing::debug!(
                    session_id = self.id.0,
                    error = %close_err,
                    "closing cache slot after an aborted download also failed"
                );
            }
            return Err(e);
        }
        closed.map_err(|e| self.write_error(e))?;

        if self.written != self.handle.length {
            return Err(AcquisitionError::LengthMismatch {
                expected: self.handle.length,
                received: self.written,
            });
        }

        Ok(slot.playable(&self.handle.mime_type).await?)
    }

    async fn drain(
        &mut self,
        writer: &mut dyn SlotWriter,
        transport: &dyn TransportClient,
        chunk_size: usize,
        event_tx: &broadcast::Sender<Event>,
    ) -> Result<(), AcquisitionError> {
        let cancel = self.cancel.clone();
        let mut chunks = transport.read_chunks(&self.handle.remote, chunk_size);

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(AcquisitionError::Cancelled),
                next = chunks.next() => next,
            };

            let chunk = match next {
                None => return Ok(()),
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(AcquisitionError::Transport(e)),
            };

            // A chunk that arrived after cancellation is dropped unwritten
            if cancel.is_cancelled() {
                return Err(AcquisitionError::Cancelled);
            }

            let received = self.written + chunk.len() as u64;
            if received > self.handle.length {
                return Err(AcquisitionError::LengthMismatch {
                    expected: self.handle.length,
                    received,
                });
            }

            writer
                .write_chunk(&chunk)
                .await
                .map_err(|e| self.write_error(e))?;
            self.written = received;

            event_tx
                .send(Event::Downloading {
                    session: self.id,
                    written_bytes: self.written,
                    total_bytes: self.handle.length,
                    percent: percent_complete(self.written, self.handle.length),
                })
                .ok();
        }
    }

    fn write_error(&self, error: std::io::Error) -> AcquisitionError {
        if is_quota_error(&error) {
            AcquisitionError::QuotaExceeded {
                written: self.written,
                required: self.handle.length,
            }
        } else {
            AcquisitionError::Io(error)
        }
    }
}
