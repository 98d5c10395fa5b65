//! Error types for teletv
//!
//! This module provides the error taxonomy of the library:
//! - Domain-specific error types (transport, acquisition, login, storage)
//! - Machine-readable error codes for UI integration
//! - The recovery action a remote-control UI should offer for each failure

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for teletv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for teletv
///
/// Each component classifies its own failures into one of the nested error
/// types; this enum is what the application context surfaces to callers.
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed configuration (app identifier, app secret, tuning values)
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "teletv_api_id")
        key: Option<String>,
    },

    /// Messaging transport failure (connect, list, read)
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Media acquisition failure
    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    /// Login flow failure
    #[error("login error: {0}")]
    Login(#[from] LoginError),

    /// Settings store failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A screen identifier that does not name any screen
    #[error("unknown screen: {0}")]
    UnknownScreen(String),

    /// The transport has not been connected yet
    #[error("not connected: call start() first")]
    NotConnected,

    /// Shutdown in progress - not accepting new commands
    #[error("shutdown in progress: not accepting new commands")]
    ShuttingDown,
}

/// Failures reported by the messaging transport
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Could not establish a connection to the remote service
    #[error("connection failed: {0}")]
    Connect(String),

    /// An established connection dropped
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// The remote did not answer in time
    #[error("request timed out")]
    Timeout,

    /// The remote answered with an error
    #[error("remote error {code}: {message}")]
    Rpc {
        /// Remote error code
        code: i32,
        /// Remote error message (e.g., "FILE_REFERENCE_EXPIRED")
        message: String,
    },

    /// A chunk reader stopped before the end of the object
    #[error("chunk stream interrupted at byte {offset}: {reason}")]
    StreamInterrupted {
        /// Byte offset of the chunk that could not be read
        offset: u64,
        /// The reason the stream stopped
        reason: String,
    },
}

/// Failures of one media acquisition
#[derive(Debug, Error)]
pub enum AcquisitionError {
    /// The media declares a length of zero bytes
    #[error("media has no content (declared length is 0)")]
    EmptyMedia,

    /// The host offers no writable byte-addressable storage
    #[error("persistent storage is unavailable: {0}")]
    StorageUnavailable(String),

    /// Local storage is full; clearing the cache slot and retrying is the recovery
    #[error("storage quota exceeded after writing {written} of {required} bytes")]
    QuotaExceeded {
        /// Bytes written to the slot before the rejection
        written: u64,
        /// Bytes the media needs in total
        required: u64,
    },

    /// The chunk reader failed; not retried by the pipeline
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Any other write failure on the cache slot
    #[error("cache slot I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The chunk reader ended with a byte count different from the declared length
    #[error("received {received} bytes, expected {expected}")]
    LengthMismatch {
        /// Declared media length
        expected: u64,
        /// Bytes actually received
        received: u64,
    },

    /// The session was cancelled (not a failure)
    #[error("download cancelled")]
    Cancelled,
}

impl AcquisitionError {
    /// Whether this outcome is an intentional early termination
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AcquisitionError::Cancelled)
    }
}

/// Failures of a credential-completion call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The supplied password was rejected; the prompt may be shown again
    #[error("invalid password")]
    InvalidPassword,

    /// Too many attempts; the remote asks to wait
    #[error("too many attempts, retry in {seconds}s")]
    FloodWait {
        /// Seconds to wait before the next attempt
        seconds: u32,
    },

    /// Transport failure while submitting the credential
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// Any other rejection
    #[error("{0}")]
    Rejected(String),
}

/// Terminal failures of the login polling flow
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LoginError {
    /// The remote answered with a state the flow does not handle
    #[error("unexpected login state: {0}")]
    UnexpectedState(String),

    /// The password challenge failed for a reason other than a wrong password
    #[error("password login failed: {0}")]
    PasswordFlowFailed(AuthError),

    /// The caller or the user abandoned the flow
    #[error("login abandoned")]
    Abandoned,
}

/// Settings store errors
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to open the settings database
    #[error("failed to open settings store: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to migrate settings store: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("settings query failed: {0}")]
    QueryFailed(String),
}

/// The action a UI offers the user after a failure
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryAction {
    /// Nothing to offer (expected outcome or informational)
    None,
    /// Offer to wipe the stored configuration and start over
    ResetConfiguration,
    /// Offer to clear the single media cache slot and retry
    ClearCache,
    /// Transient; the user may retry the same action
    RetryLater,
    /// Restart the login flow from scratch
    RestartLogin,
}

impl Error {
    /// Build a configuration error for a given key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// The recovery action the UI should offer for this error
    pub fn recovery(&self) -> RecoveryAction {
        match self {
            Error::Config { .. } => RecoveryAction::ResetConfiguration,
            Error::Transport(_) | Error::NotConnected => RecoveryAction::RetryLater,
            Error::Acquisition(e) => match e {
                AcquisitionError::StorageUnavailable(_) | AcquisitionError::QuotaExceeded { .. } => {
                    RecoveryAction::ClearCache
                }
                AcquisitionError::Cancelled => RecoveryAction::None,
                AcquisitionError::EmptyMedia => RecoveryAction::None,
                AcquisitionError::Transport(_)
                | AcquisitionError::Io(_)
                | AcquisitionError::LengthMismatch { .. } => RecoveryAction::RetryLater,
            },
            Error::Login(e) => match e {
                LoginError::Abandoned => RecoveryAction::None,
                LoginError::UnexpectedState(_) | LoginError::PasswordFlowFailed(_) => {
                    RecoveryAction::RestartLogin
                }
            },
            // A settings store that cannot be opened or read is treated as a corrupted configuration
            Error::Storage(_) => RecoveryAction::ResetConfiguration,
            Error::Io(_) => RecoveryAction::RetryLater,
            Error::Serialization(_) => RecoveryAction::ResetConfiguration,
            Error::UnknownScreen(_) => RecoveryAction::None,
            Error::ShuttingDown => RecoveryAction::None,
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_invalid",
            Error::Transport(_) => "transport_error",
            Error::Acquisition(e) => match e {
                AcquisitionError::EmptyMedia => "empty_media",
                AcquisitionError::StorageUnavailable(_) => "storage_unavailable",
                AcquisitionError::QuotaExceeded { .. } => "quota_exceeded",
                AcquisitionError::Transport(_) => "transport_error",
                AcquisitionError::Io(_) => "io_error",
                AcquisitionError::LengthMismatch { .. } => "length_mismatch",
                AcquisitionError::Cancelled => "cancelled",
            },
            Error::Login(e) => match e {
                LoginError::UnexpectedState(_) => "unexpected_state",
                LoginError::PasswordFlowFailed(_) => "password_flow_failed",
                LoginError::Abandoned => "login_abandoned",
            },
            Error::Storage(_) => "storage_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::UnknownScreen(_) => "unknown_screen",
            Error::NotConnected => "not_connected",
            Error::ShuttingDown => "shutting_down",
        }
    }

    /// Whether this error should produce user-visible failure messaging
    ///
    /// Cancellation and abandonment are expected outcomes of back-navigation.
    pub fn is_silent(&self) -> bool {
        matches!(
            self,
            Error::Acquisition(AcquisitionError::Cancelled) | Error::Login(LoginError::Abandoned)
        )
    }
}
