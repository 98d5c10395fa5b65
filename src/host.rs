//! Host and presentation boundary
//!
//! The core components call into these traits; they never call back into the
//! core to mutate state. Rendering, history integration, display sleep and the
//! playback element all live on the other side.

use crate::types::{
    Conversation, MediaPost, PlayableReference, ProgressUpdate, ScreenId, SearchHit, SecretPrompt,
    StatusMessage,
};

/// Rendering surface driven by the application
#[async_trait::async_trait]
pub trait Presenter: Send + Sync {
    /// A screen became the active one
    fn screen_activated(&self, screen: ScreenId);

    /// Move input focus to the default element of `screen`
    ///
    /// Called after the screen's content has had time to render.
    fn focus_default(&self, screen: ScreenId);

    /// Progress of the current long-running phase
    fn progress(&self, update: &ProgressUpdate);

    /// Transient status line
    fn status(&self, message: &StatusMessage);

    /// Render a scannable image of `payload`
    fn render_login_token(&self, payload: &str);

    /// Ask the user for a secret; `None` means the prompt was dismissed
    async fn request_secret(&self, prompt: &SecretPrompt) -> Option<String>;

    /// Channel listing
    fn show_conversations(&self, conversations: &[Conversation]);

    /// Video listing of one conversation
    fn show_media(&self, posts: &[MediaPost]);

    /// Search results
    fn show_search_results(&self, hits: &[SearchHit]);
}

/// Host back-navigation history
pub trait HostHistory: Send + Sync {
    /// Record a logical position so the next host back signal lands on a known state
    fn push_position(&self, screen: ScreenId);
}

/// Display sleep suppression
#[async_trait::async_trait]
pub trait WakeLock: Send + Sync {
    /// Keep the display awake until [`WakeLock::release`]
    async fn acquire(&self) -> std::io::Result<()>;

    /// Allow the display to sleep again; releasing an unheld lock is a no-op
    async fn release(&self);
}

/// The playback element
#[async_trait::async_trait]
pub trait PlayerSurface: Send + Sync {
    /// Start in-place playback of a completed acquisition
    async fn load(&self, media: &PlayableReference) -> std::io::Result<()>;

    /// Stop playback and detach the source
    async fn stop(&self);

    /// Whether something is playing
    fn is_playing(&self) -> bool;
}

/// History for hosts without a native back stack
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHistory;

impl HostHistory for NoopHistory {
    fn push_position(&self, _screen: ScreenId) {}
}

/// Wake lock for hosts that cannot keep the display awake
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopWakeLock;

#[async_trait::async_trait]
impl WakeLock for NoopWakeLock {
    async fn acquire(&self) -> std::io::Result<()> {
        tracing::debug!("wake lock not supported by host, continuing without it");
        Ok(())
    }

    async fn release(&self) {}
}
