//! Core types for teletv

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, RecoveryAction};
use crate::utils::format_duration;

/// One mutually-exclusive visible application view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreenId {
    /// App identifier / secret entry
    Config,
    /// Login token (QR) and password challenge
    Auth,
    /// Channel listing (root once authorized)
    Channels,
    /// Video posts of one channel
    Videos,
    /// Full-screen playback
    Player,
    /// Search results
    Search,
}

impl ScreenId {
    /// Every screen, in declaration order
    pub const ALL: [ScreenId; 6] = [
        ScreenId::Config,
        ScreenId::Auth,
        ScreenId::Channels,
        ScreenId::Videos,
        ScreenId::Player,
        ScreenId::Search,
    ];

    /// Stable element id used by the presentation layer
    pub fn dom_id(&self) -> &'static str {
        match self {
            ScreenId::Config => "config-screen",
            ScreenId::Auth => "auth-screen",
            ScreenId::Channels => "channels-screen",
            ScreenId::Videos => "videos-screen",
            ScreenId::Player => "player-screen",
            ScreenId::Search => "search-screen",
        }
    }
}

impl std::fmt::Display for ScreenId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dom_id())
    }
}

impl std::str::FromStr for ScreenId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScreenId::ALL
            .into_iter()
            .find(|screen| screen.dom_id() == s)
            .ok_or_else(|| Error::UnknownScreen(s.to_string()))
    }
}

/// Identifier of one acquisition session
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SessionId(pub u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to a conversation, as understood by the transport
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityRef(pub String);

/// Opaque reference to a remote media object, as understood by the transport
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

impl std::fmt::Display for MediaRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything the acquisition pipeline needs to know about one remote object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaHandle {
    /// Transport reference of the object
    pub remote: MediaRef,
    /// Declared byte length
    pub length: u64,
    /// Declared MIME/container hint
    pub mime_type: String,
}

impl MediaHandle {
    /// Create a new handle
    pub fn new(remote: MediaRef, length: u64, mime_type: impl Into<String>) -> Self {
        Self {
            remote,
            length,
            mime_type: mime_type.into(),
        }
    }
}

/// A thumbnail size offered for a media object
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailSpec {
    /// Transport-specific size tag (e.g., "m", "x")
    pub kind: String,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Encoded size in bytes
    pub size: u64,
}

/// MIME type assumed when the transport does not declare one
pub const DEFAULT_VIDEO_MIME: &str = "video/mp4";

/// Media descriptor attached to a post
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Transport reference
    pub remote: MediaRef,
    /// Byte size
    pub size: u64,
    /// Duration in seconds, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<u32>,
    /// Offered thumbnails (may be empty)
    #[serde(default)]
    pub thumbnails: Vec<ThumbnailSpec>,
    /// Declared MIME type, when known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl MediaDescriptor {
    /// Handle for the acquisition pipeline
    pub fn handle(&self) -> MediaHandle {
        MediaHandle::new(
            self.remote.clone(),
            self.size,
            self.mime_type.as_deref().unwrap_or(DEFAULT_VIDEO_MIME),
        )
    }

    /// Smallest offered thumbnail, by encoded size
    pub fn smallest_thumbnail(&self) -> Option<&ThumbnailSpec> {
        self.thumbnails.iter().min_by_key(|t| t.size)
    }
}

/// One video post inside a conversation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaPost {
    /// Message id
    pub id: i64,
    /// Optional caption
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Attached media
    pub media: MediaDescriptor,
}

impl MediaPost {
    /// Card label: the caption (or "Video <id>") followed by the duration
    pub fn label(&self) -> String {
        let title = match self.caption.as_deref().map(str::trim) {
            Some(caption) if !caption.is_empty() => caption.to_string(),
            _ => format!("Video {}", self.id),
        };
        match self.media.duration_secs {
            Some(secs) => format!("{} ({})", title, format_duration(secs)),
            None => title,
        }
    }
}

/// A chat as listed by the transport
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    /// Display title (may be empty)
    pub title: String,
    /// Channel or group (the only kinds that are browsed)
    pub is_channel_like: bool,
    /// Archived by the user
    pub archived: bool,
    /// Pinned by the user
    pub pinned: bool,
    /// Transport reference
    pub entity: EntityRef,
}

impl Conversation {
    /// Title to display, with a placeholder for untitled chats
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            "Untitled"
        } else {
            &self.title
        }
    }
}

/// A user returned by search
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    /// Display name
    pub name: String,
    /// Public username, when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Transport reference
    pub entity: EntityRef,
}

/// One search result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchHit {
    /// A chat, channel or group
    Conversation(Conversation),
    /// A user
    Contact(Contact),
}

impl SearchHit {
    /// Transport reference of the hit
    pub fn entity(&self) -> &EntityRef {
        match self {
            SearchHit::Conversation(c) => &c.entity,
            SearchHit::Contact(c) => &c.entity,
        }
    }
}

/// Saved session string produced by a successful login
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionBlob(pub String);

impl SessionBlob {
    /// The raw session string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// Never print session material
impl std::fmt::Debug for SessionBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionBlob({} chars)", self.0.len())
    }
}

/// Credential submitted to finish a login
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// Two-step verification password
    Password(String),
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
        }
    }
}

/// Result of one login-token export call
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoginTokenState {
    /// Not confirmed yet; show the token and ask again later
    Pending {
        /// Raw token bytes (rotates between calls)
        token: Vec<u8>,
        /// When the remote stops accepting this token
        expires_at: Option<DateTime<Utc>>,
    },
    /// Confirmed on another device
    Success(SessionBlob),
    /// Confirmed, but the account requires its two-step password
    PasswordRequired,
    /// The account lives on another data center
    MigrateElsewhere {
        /// Target data center
        dc_id: i32,
    },
    /// A remote answer the transport could not map onto any of the above
    Unrecognized {
        /// Remote type name, for diagnostics
        tag: String,
    },
}

/// Kind of media listed inside a conversation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaFilter {
    /// Video posts only
    #[default]
    Video,
    /// Every post carrying media
    Any,
}

/// A completed acquisition, ready for in-place playback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableReference {
    /// Location of the cached file
    pub path: PathBuf,
    /// Byte length of the cached file
    pub length: u64,
    /// MIME type for the playback element
    pub mime_type: String,
}

/// What a long-running operation is currently doing
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Connecting to the remote service
    Connecting,
    /// Fetching a listing
    Listing,
    /// Downloading media into the cache slot
    Acquiring,
    /// Waiting for the login token to be confirmed
    LoginPolling,
}

/// Progress notification for the presentation layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current phase
    pub phase: Phase,
    /// Completion percentage, when measurable
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
    /// Human-readable message
    pub message: String,
}

/// Transient status line for the presentation layer
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    /// Human-readable message
    pub text: String,
    /// Action to offer alongside the message
    pub recovery: RecoveryAction,
}

impl StatusMessage {
    /// Informational status without a recovery action
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            recovery: RecoveryAction::None,
        }
    }

    /// Status describing an error, with the error's recovery action
    pub fn from_error(context: &str, error: &Error) -> Self {
        Self {
            text: format!("{}: {}", context, error),
            recovery: error.recovery(),
        }
    }
}

/// Password prompt shown during a login challenge
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPrompt {
    /// 1-based attempt number
    pub attempt: u32,
    /// Whether the previous attempt was rejected
    pub retry: bool,
}

/// Event emitted by the core components
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A screen became active
    ScreenActivated {
        /// The active screen
        screen: ScreenId,
        /// Back-stack depth after the transition
        depth: usize,
    },

    /// Acquisition session started writing
    DownloadStarted {
        /// Session id
        session: SessionId,
        /// Declared media length
        total_bytes: u64,
    },

    /// Acquisition progress (advisory)
    Downloading {
        /// Session id
        session: SessionId,
        /// Bytes written so far
        written_bytes: u64,
        /// Declared media length
        total_bytes: u64,
        /// round(written / total * 100), never 100 before the last byte
        percent: u8,
    },

    /// Acquisition finished and the file is playable
    DownloadComplete {
        /// Session id
        session: SessionId,
        /// Location of the cached file
        path: PathBuf,
    },

    /// Acquisition was cancelled
    DownloadCancelled {
        /// Session id
        session: SessionId,
        /// Bytes written before the cancellation took effect
        written_bytes: u64,
    },

    /// Acquisition failed
    DownloadFailed {
        /// Session id
        session: SessionId,
        /// Error message
        error: String,
    },

    /// A login token is waiting to be scanned
    LoginTokenIssued {
        /// Scannable payload
        payload: String,
        /// Number of token requests made so far
        poll: u32,
    },

    /// The login flow is waiting for the account password
    PasswordRequired {
        /// 1-based attempt number
        attempt: u32,
    },

    /// Login completed and the session was saved
    LoggedIn,

    /// Status line update
    Status {
        /// Message text
        message: String,
    },

    /// Shutdown completed
    Shutdown,
}
