//! # teletv
//!
//! Remote-control media browser core for television-class displays.
//!
//! ## Design Philosophy
//!
//! teletv is designed to be:
//! - **Host-agnostic** - Rendering, history, display sleep and playback are traits
//! - **Transport-agnostic** - The messaging protocol client is a trait
//! - **Library-first** - No UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The three cores are a chunked, disk-backed acquisition pipeline
//! ([`acquisition`]), a back-stack navigation controller ([`navigation`]) and
//! a login-token polling flow ([`login`]). [`App`] wires them together with
//! the host's collaborators.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use teletv::{App, Collaborators, Config, NoopHistory, NoopWakeLock, UiCommand};
//! # use teletv::{host::{Presenter, PlayerSurface}, transport::TransportClient};
//! # async fn example(
//! #     transport: Arc<dyn TransportClient>,
//! #     presenter: Arc<dyn Presenter>,
//! #     player: Arc<dyn PlayerSurface>,
//! # ) -> teletv::Result<()> {
//! let app = App::open(
//!     Config::default(),
//!     Collaborators {
//!         transport,
//!         presenter,
//!         history: Arc::new(NoopHistory),
//!         wake_lock: Arc::new(NoopWakeLock),
//!         player,
//!     },
//! )
//! .await?;
//!
//! // Subscribe to events
//! let mut events = app.subscribe();
//! tokio::spawn(async move {
//!     while let Ok(event) = events.recv().await {
//!         println!("Event: {:?}", event);
//!     }
//! });
//!
//! app.start().await?;
//! app.dispatch(UiCommand::Back).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Chunked media acquisition into the cache slot
pub mod acquisition;
/// Application context and UI command dispatch
pub mod app;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Host and presentation boundary
pub mod host;
/// Login token polling
pub mod login;
/// Screen stack and back navigation
pub mod navigation;
/// Retry logic with exponential backoff
pub mod retry;
/// Settings store and media cache slot
pub mod storage;
/// Messaging transport boundary
pub mod transport;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use acquisition::{Acquirer, PendingDownload};
pub use app::{App, Collaborators, Stores, UiCommand};
pub use config::{AcquisitionConfig, AppCredentials, Config, LoginConfig, RetryPolicy};
pub use error::{
    AcquisitionError, AuthError, Error, LoginError, RecoveryAction, Result, StorageError,
    TransportError,
};
pub use host::{HostHistory, NoopHistory, NoopWakeLock, PlayerSurface, Presenter, WakeLock};
pub use login::LoginFlow;
pub use navigation::{NavigationController, ScreenResources};
pub use storage::{
    CacheSlot, FileCacheSlot, MemoryCacheSlot, MemorySettings, SettingsStore, SqliteSettings,
};
pub use transport::{ChunkStream, TransportClient};
pub use types::{
    Conversation, EntityRef, Event, LoginTokenState, MediaHandle, MediaPost, MediaRef,
    PlayableReference, ScreenId, SessionBlob, SessionId,
};

/// Helper function to run the application with graceful signal handling.
///
/// Waits for a termination signal and then calls the application's `shutdown()` method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(app: App) -> Result<()> {
    shutdown_on(app, wait_for_signal()).await
}

/// Shut the application down once `signal` completes
///
/// For hosts with their own exit trigger (a window close, a remote power key).
pub async fn shutdown_on<F>(app: App, signal: F) -> Result<()>
where
    F: std::future::Future<Output = ()>,
{
    signal.await;
    tracing::info!("shutdown requested");
    app.shutdown().await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
