//! Event assertions for integration tests

use std::path::PathBuf;
use std::time::Duration;
use teletv::{Event, SessionId};
use tokio::sync::broadcast;

/// Result of waiting for a download to finish
#[derive(Debug)]
pub enum WaitResult {
    /// Download completed and the file is at the given path
    Completed(PathBuf),
    /// Download was cancelled after writing this many bytes
    Cancelled(u64),
    /// Download failed with error
    Failed(String),
    /// Timeout waiting for a terminal event
    Timeout,
    /// Channel closed unexpectedly
    ChannelClosed,
}

/// Wait for any download session to reach a terminal state
///
/// Subscribe before triggering the download so no event is missed.
pub async fn wait_for_download(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
) -> (Option<SessionId>, WaitResult) {
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::DownloadComplete { session, path }) => {
                    return (Some(session), WaitResult::Completed(path));
                }
                Ok(Event::DownloadCancelled {
                    session,
                    written_bytes,
                }) => {
                    return (Some(session), WaitResult::Cancelled(written_bytes));
                }
                Ok(Event::DownloadFailed { session, error }) => {
                    return (Some(session), WaitResult::Failed(error));
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => {
                    return (None, WaitResult::ChannelClosed);
                }
            }
        }
    })
    .await;

    result.unwrap_or((None, WaitResult::Timeout))
}

/// Wait for a specific event
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => {
                    return Some(event);
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await;

    result.ok().flatten()
}

/// Collect every event until the predicate matches or the timeout expires
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    stop_predicate: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();

    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let should_stop = stop_predicate(&event);
            collected.push(event);
            if should_stop {
                break;
            }
        }
    })
    .await;

    collected
}

/// Progress percentages reported in `events`, in order
pub fn download_percents(events: &[Event]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            Event::Downloading { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect()
}
