//! Scripted collaborators for unit tests.

use crate::error::{AuthError, TransportError};
use crate::host::{HostHistory, PlayerSurface, Presenter, WakeLock};
use crate::storage::{CacheSlot, SlotWriter};
use crate::transport::{ChunkStream, TransportClient, chunk_plan};
use crate::types::{
    Conversation, Credential, EntityRef, LoginTokenState, MediaDescriptor, MediaFilter, MediaPost,
    MediaRef, PlayableReference, ProgressUpdate, ScreenId, SearchHit, SecretPrompt, SessionBlob,
    StatusMessage, ThumbnailSpec,
};
use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Byte value of every position in chunk `index`
pub(crate) fn chunk_byte(index: usize) -> u8 {
    (index % 251) as u8
}

pub(crate) fn channel(title: &str, entity: &str) -> Conversation {
    Conversation {
        title: title.to_string(),
        is_channel_like: true,
        archived: false,
        pinned: false,
        entity: EntityRef(entity.to_string()),
    }
}

pub(crate) fn direct_chat(title: &str, entity: &str) -> Conversation {
    Conversation {
        is_channel_like: false,
        ..channel(title, entity)
    }
}

pub(crate) fn video_post(id: i64, remote: &str, size: u64) -> MediaPost {
    MediaPost {
        id,
        caption: None,
        media: MediaDescriptor {
            remote: MediaRef(remote.to_string()),
            size,
            duration_secs: Some(90),
            thumbnails: vec![ThumbnailSpec {
                kind: "m".into(),
                width: 320,
                height: 180,
                size: 4,
            }],
            mime_type: None,
        },
    }
}

/// Transport with scripted listings, chunk readers and login answers
pub(crate) struct MockTransport {
    objects: HashMap<MediaRef, u64>,
    chunk_delay: Duration,
    fail_at_chunk: Option<usize>,
    chunks_served: Arc<AtomicUsize>,
    login_script: Mutex<VecDeque<Result<LoginTokenState, TransportError>>>,
    token_requests: AtomicU32,
    password: Option<String>,
    password_attempts: AtomicU32,
    password_error: Option<AuthError>,
    authorized: AtomicBool,
    connect_failures: AtomicU32,
    connects: AtomicU32,
    resumed: Mutex<Option<SessionBlob>>,
    conversations: Vec<Conversation>,
    posts: Vec<MediaPost>,
    hits: Vec<SearchHit>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            objects: HashMap::new(),
            chunk_delay: Duration::ZERO,
            fail_at_chunk: None,
            chunks_served: Arc::new(AtomicUsize::new(0)),
            login_script: Mutex::new(VecDeque::new()),
            token_requests: AtomicU32::new(0),
            password: None,
            password_attempts: AtomicU32::new(0),
            password_error: None,
            authorized: AtomicBool::new(false),
            connect_failures: AtomicU32::new(0),
            connects: AtomicU32::new(0),
            resumed: Mutex::new(None),
            conversations: vec![],
            posts: vec![],
            hits: vec![],
        }
    }

    pub(crate) fn with_object(mut self, remote: &str, length: u64) -> Self {
        self.objects.insert(MediaRef(remote.to_string()), length);
        self
    }

    pub(crate) fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub(crate) fn failing_at_chunk(mut self, index: usize) -> Self {
        self.fail_at_chunk = Some(index);
        self
    }

    /// Answers returned by successive token exports; `Pending` once exhausted
    pub(crate) fn with_login_script(
        self,
        script: impl IntoIterator<Item = Result<LoginTokenState, TransportError>>,
    ) -> Self {
        *self.login_script.lock().unwrap() = script.into_iter().collect();
        self
    }

    pub(crate) fn with_password(mut self, password: &str) -> Self {
        self.password = Some(password.to_string());
        self
    }

    pub(crate) fn with_password_error(mut self, error: AuthError) -> Self {
        self.password_error = Some(error);
        self
    }

    pub(crate) fn authorized(self) -> Self {
        self.authorized.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_connect_failures(self, count: u32) -> Self {
        self.connect_failures.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_conversations(mut self, conversations: Vec<Conversation>) -> Self {
        self.conversations = conversations;
        self
    }

    pub(crate) fn with_posts(mut self, posts: Vec<MediaPost>) -> Self {
        self.posts = posts;
        self
    }

    pub(crate) fn with_hits(mut self, hits: Vec<SearchHit>) -> Self {
        self.hits = hits;
        self
    }

    pub(crate) fn token_requests(&self) -> u32 {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub(crate) fn password_attempts(&self) -> u32 {
        self.password_attempts.load(Ordering::SeqCst)
    }

    pub(crate) fn chunks_served(&self) -> usize {
        self.chunks_served.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> u32 {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn resumed_session(&self) -> Option<SessionBlob> {
        self.resumed.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl TransportClient for MockTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let remaining = self.connect_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.connect_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Connect("connection refused".into()));
        }
        Ok(())
    }

    async fn resume_session(&self, session: &SessionBlob) -> Result<(), TransportError> {
        *self.resumed.lock().unwrap() = Some(session.clone());
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool, TransportError> {
        Ok(self.authorized.load(Ordering::SeqCst))
    }

    async fn list_conversations(&self, limit: usize) -> Result<Vec<Conversation>, TransportError> {
        Ok(self.conversations.iter().take(limit).cloned().collect())
    }

    async fn list_media(
        &self,
        _conversation: &EntityRef,
        limit: usize,
        _filter: MediaFilter,
    ) -> Result<Vec<MediaPost>, TransportError> {
        Ok(self.posts.iter().take(limit).cloned().collect())
    }

    fn read_chunks(&self, media: &MediaRef, chunk_size: usize) -> ChunkStream {
        let Some(length) = self.objects.get(media).copied() else {
            return futures::stream::once(async {
                Err(TransportError::Rpc {
                    code: 400,
                    message: "FILE_ID_INVALID".into(),
                })
            })
            .boxed();
        };

        let delay = self.chunk_delay;
        let fail_at = self.fail_at_chunk;
        let served = self.chunks_served.clone();
        let plan: Vec<(usize, (u64, usize))> = chunk_plan(length, chunk_size).enumerate().collect();

        futures::stream::iter(plan)
            .then(move |(index, (offset, len))| {
                let served = served.clone();
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if fail_at == Some(index) {
                        return Err(TransportError::StreamInterrupted {
                            offset,
                            reason: "connection reset".into(),
                        });
                    }
                    served.fetch_add(1, Ordering::SeqCst);
                    Ok(vec![chunk_byte(index); len])
                }
            })
            .boxed()
    }

    async fn download_thumbnail(
        &self,
        _media: &MediaRef,
        spec: &ThumbnailSpec,
    ) -> Result<Vec<u8>, TransportError> {
        Ok(vec![0xFF; spec.size as usize])
    }

    async fn export_login_token(
        &self,
        _api_id: i32,
        _api_hash: &str,
        _except_ids: &[i64],
    ) -> Result<LoginTokenState, TransportError> {
        let n = self.token_requests.fetch_add(1, Ordering::SeqCst) + 1;
        match self.login_script.lock().unwrap().pop_front() {
            Some(answer) => answer,
            None => Ok(LoginTokenState::Pending {
                token: format!("token-{n}").into_bytes(),
                expires_at: None,
            }),
        }
    }

    async fn complete_login(&self, credential: Credential) -> Result<SessionBlob, AuthError> {
        self.password_attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.password_error {
            return Err(error.clone());
        }
        let Credential::Password(given) = credential;
        match &self.password {
            Some(expected) if *expected == given => Ok(SessionBlob("session-after-2fa".into())),
            _ => Err(AuthError::InvalidPassword),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, TransportError> {
        let query = query.to_lowercase();
        Ok(self
            .hits
            .iter()
            .filter(|hit| match hit {
                SearchHit::Conversation(c) => c.title.to_lowercase().contains(&query),
                SearchHit::Contact(c) => c.name.to_lowercase().contains(&query),
            })
            .take(limit)
            .cloned()
            .collect())
    }
}

/// What happened to a [`ScriptedSlot`], in order
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum SlotEvent {
    Opened(usize),
    Wrote(usize),
    Closed(usize),
    Cleared,
}

/// In-memory slot that can refuse storage or run out of quota
#[derive(Clone, Default)]
pub(crate) struct ScriptedSlot {
    bytes: Arc<Mutex<Vec<u8>>>,
    log: Arc<Mutex<Vec<SlotEvent>>>,
    writers: Arc<AtomicUsize>,
    /// Write index (0-based, per writer) that fails with StorageFull until the slot is cleared
    quota_at_write: Arc<Mutex<Option<usize>>>,
    unavailable: bool,
    available: Option<u64>,
}

impl ScriptedSlot {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub(crate) fn with_quota_at_write(self, index: usize) -> Self {
        *self.quota_at_write.lock().unwrap() = Some(index);
        self
    }

    pub(crate) fn with_available_space(mut self, bytes: u64) -> Self {
        self.available = Some(bytes);
        self
    }

    pub(crate) fn log(&self) -> Vec<SlotEvent> {
        self.log.lock().unwrap().clone()
    }

    pub(crate) fn contents(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CacheSlot for ScriptedSlot {
    async fn ensure_available(&self) -> io::Result<()> {
        if self.unavailable {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "no persistent file system",
            ));
        }
        Ok(())
    }

    async fn available_space(&self) -> Option<u64> {
        self.available
    }

    async fn open_writer(&self) -> io::Result<Box<dyn SlotWriter>> {
        let writer = self.writers.fetch_add(1, Ordering::SeqCst);
        self.bytes.lock().unwrap().clear();
        self.log.lock().unwrap().push(SlotEvent::Opened(writer));
        Ok(Box::new(ScriptedWriter {
            slot: self.clone(),
            writer,
            writes: 0,
            closed: false,
        }))
    }

    async fn playable(&self, mime_type: &str) -> io::Result<PlayableReference> {
        Ok(PlayableReference {
            path: PathBuf::from("scripted://slot"),
            length: self.bytes.lock().unwrap().len() as u64,
            mime_type: mime_type.to_string(),
        })
    }

    async fn clear(&self) -> io::Result<()> {
        self.bytes.lock().unwrap().clear();
        *self.quota_at_write.lock().unwrap() = None;
        self.log.lock().unwrap().push(SlotEvent::Cleared);
        Ok(())
    }

    async fn cached_bytes(&self) -> u64 {
        self.bytes.lock().unwrap().len() as u64
    }
}

struct ScriptedWriter {
    slot: ScriptedSlot,
    writer: usize,
    writes: usize,
    closed: bool,
}

#[async_trait::async_trait]
impl SlotWriter for ScriptedWriter {
    async fn write_chunk(&mut self, chunk: &[u8]) -> io::Result<()> {
        assert!(!self.closed, "write after close");
        let index = self.writes;
        self.writes += 1;
        if *self.slot.quota_at_write.lock().unwrap() == Some(index) {
            return Err(io::Error::new(io::ErrorKind::StorageFull, "quota exceeded"));
        }
        self.slot.bytes.lock().unwrap().extend_from_slice(chunk);
        self.slot
            .log
            .lock()
            .unwrap()
            .push(SlotEvent::Wrote(self.writer));
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        if !self.closed {
            self.closed = true;
            self.slot
                .log
                .lock()
                .unwrap()
                .push(SlotEvent::Closed(self.writer));
        }
        Ok(())
    }
}

/// Presenter that records every call
#[derive(Default)]
pub(crate) struct RecordingPresenter {
    pub(crate) activated: Mutex<Vec<ScreenId>>,
    pub(crate) focused: Mutex<Vec<ScreenId>>,
    pub(crate) progress: Mutex<Vec<ProgressUpdate>>,
    pub(crate) statuses: Mutex<Vec<StatusMessage>>,
    pub(crate) tokens: Mutex<Vec<String>>,
    pub(crate) prompts: Mutex<Vec<SecretPrompt>>,
    pub(crate) secrets: Mutex<VecDeque<Option<String>>>,
    pub(crate) conversations: Mutex<Vec<Vec<Conversation>>>,
    pub(crate) media: Mutex<Vec<Vec<MediaPost>>>,
    pub(crate) search_results: Mutex<Vec<Vec<SearchHit>>>,
}

impl RecordingPresenter {
    pub(crate) fn with_secrets<'a>(secrets: impl IntoIterator<Item = Option<&'a str>>) -> Self {
        let presenter = Self::default();
        *presenter.secrets.lock().unwrap() = secrets
            .into_iter()
            .map(|s| s.map(str::to_string))
            .collect();
        presenter
    }

    pub(crate) fn activated(&self) -> Vec<ScreenId> {
        self.activated.lock().unwrap().clone()
    }

    pub(crate) fn focused(&self) -> Vec<ScreenId> {
        self.focused.lock().unwrap().clone()
    }

    pub(crate) fn statuses(&self) -> Vec<StatusMessage> {
        self.statuses.lock().unwrap().clone()
    }

    pub(crate) fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }

    pub(crate) fn prompts(&self) -> Vec<SecretPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl Presenter for RecordingPresenter {
    fn screen_activated(&self, screen: ScreenId) {
        self.activated.lock().unwrap().push(screen);
    }

    fn focus_default(&self, screen: ScreenId) {
        self.focused.lock().unwrap().push(screen);
    }

    fn progress(&self, update: &ProgressUpdate) {
        self.progress.lock().unwrap().push(update.clone());
    }

    fn status(&self, message: &StatusMessage) {
        self.statuses.lock().unwrap().push(message.clone());
    }

    fn render_login_token(&self, payload: &str) {
        self.tokens.lock().unwrap().push(payload.to_string());
    }

    async fn request_secret(&self, prompt: &SecretPrompt) -> Option<String> {
        self.prompts.lock().unwrap().push(prompt.clone());
        self.secrets.lock().unwrap().pop_front().flatten()
    }

    fn show_conversations(&self, conversations: &[Conversation]) {
        self.conversations
            .lock()
            .unwrap()
            .push(conversations.to_vec());
    }

    fn show_media(&self, posts: &[MediaPost]) {
        self.media.lock().unwrap().push(posts.to_vec());
    }

    fn show_search_results(&self, hits: &[SearchHit]) {
        self.search_results.lock().unwrap().push(hits.to_vec());
    }
}

#[derive(Default)]
pub(crate) struct RecordingHistory {
    pub(crate) positions: Mutex<Vec<ScreenId>>,
}

impl RecordingHistory {
    pub(crate) fn positions(&self) -> Vec<ScreenId> {
        self.positions.lock().unwrap().clone()
    }
}

impl HostHistory for RecordingHistory {
    fn push_position(&self, screen: ScreenId) {
        self.positions.lock().unwrap().push(screen);
    }
}

#[derive(Default)]
pub(crate) struct CountingWakeLock {
    pub(crate) acquired: AtomicU32,
    pub(crate) released: AtomicU32,
    pub(crate) held: AtomicBool,
    acquire_delay: Duration,
}

impl CountingWakeLock {
    /// A wake lock whose acquisition takes `delay`
    pub(crate) fn slow(delay: Duration) -> Self {
        Self {
            acquire_delay: delay,
            ..Default::default()
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }

    pub(crate) fn acquisitions(&self) -> u32 {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WakeLock for CountingWakeLock {
    async fn acquire(&self) -> io::Result<()> {
        if !self.acquire_delay.is_zero() {
            tokio::time::sleep(self.acquire_delay).await;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) {
        if self.held.swap(false, Ordering::SeqCst) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[derive(Default)]
pub(crate) struct RecordingPlayer {
    pub(crate) loaded: Mutex<Vec<PlayableReference>>,
    pub(crate) stops: AtomicU32,
    pub(crate) playing: AtomicBool,
}

impl RecordingPlayer {
    pub(crate) fn loaded(&self) -> Vec<PlayableReference> {
        self.loaded.lock().unwrap().clone()
    }

    pub(crate) fn stops(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl PlayerSurface for RecordingPlayer {
    async fn load(&self, media: &PlayableReference) -> io::Result<()> {
        self.loaded.lock().unwrap().push(media.clone());
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}
