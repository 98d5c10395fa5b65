//! Messaging transport boundary
//!
//! The messaging-protocol client is an external collaborator. Everything the
//! application needs from it goes through [`TransportClient`], which keeps the
//! core components testable against scripted clients.

use crate::error::{AuthError, TransportError};
use crate::types::{
    Conversation, Credential, EntityRef, LoginTokenState, MediaFilter, MediaPost, MediaRef,
    SearchHit, SessionBlob, ThumbnailSpec,
};
use futures::stream::BoxStream;

/// Sequential, non-overlapping byte chunks of one remote object, in ascending offset order
///
/// Finite and not restartable; a fresh [`TransportClient::read_chunks`] call starts again at offset 0.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

/// Abstraction over the messaging-protocol client
#[async_trait::async_trait]
pub trait TransportClient: Send + Sync {
    /// Connect to the remote service
    async fn connect(&self) -> Result<(), TransportError>;

    /// Attach a previously saved session before connecting
    ///
    /// Clients that take the session at construction time can ignore this.
    async fn resume_session(&self, _session: &SessionBlob) -> Result<(), TransportError> {
        Ok(())
    }

    /// Whether the connected session belongs to a logged-in account
    async fn is_authorized(&self) -> Result<bool, TransportError>;

    /// Most recent conversations, newest first
    async fn list_conversations(&self, limit: usize) -> Result<Vec<Conversation>, TransportError>;

    /// Media posts of one conversation, newest first
    async fn list_media(
        &self,
        conversation: &EntityRef,
        limit: usize,
        filter: MediaFilter,
    ) -> Result<Vec<MediaPost>, TransportError>;

    /// Chunk reader over one media object
    fn read_chunks(&self, media: &MediaRef, chunk_size: usize) -> ChunkStream;

    /// Encoded bytes of one thumbnail
    async fn download_thumbnail(
        &self,
        media: &MediaRef,
        spec: &ThumbnailSpec,
    ) -> Result<Vec<u8>, TransportError>;

    /// One login-token export call
    async fn export_login_token(
        &self,
        api_id: i32,
        api_hash: &str,
        except_ids: &[i64],
    ) -> Result<LoginTokenState, TransportError>;

    /// Finish a login that stopped at a credential challenge
    async fn complete_login(&self, credential: Credential) -> Result<SessionBlob, AuthError>;

    /// Global search over chats and users
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, TransportError>;
}

/// Split `length` bytes into `(offset, len)` requests of at most `chunk_size` bytes
///
/// Helper for transport implementations whose remote API takes explicit offsets.
/// A `chunk_size` of 0 yields nothing.
pub fn chunk_plan(length: u64, chunk_size: usize) -> impl Iterator<Item = (u64, usize)> {
    let step = chunk_size as u64;
    let count = if step == 0 { 0 } else { length.div_ceil(step) };
    (0..count).map(move |i| {
        let offset = i * step;
        let len = (length - offset).min(step) as usize;
        (offset, len)
    })
}
