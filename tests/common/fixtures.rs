//! Fake collaborators and app construction for integration tests
//!
//! Every fake records what the application asked of it so tests can assert
//! on the host-visible behavior without a real transport or display.

use futures::StreamExt;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use teletv::storage::keys;
use teletv::transport::chunk_plan;
use teletv::types::{
    Credential, MediaDescriptor, MediaFilter, ProgressUpdate, SearchHit, SecretPrompt,
    StatusMessage, ThumbnailSpec,
};
use teletv::{
    App, AuthError, ChunkStream, Collaborators, Config, Conversation, EntityRef, LoginTokenState,
    MediaPost, MediaRef, PlayableReference, PlayerSurface, Presenter, ScreenId, SessionBlob,
    SettingsStore, SqliteSettings, TransportClient, TransportError, WakeLock,
};

/// Chunk size used by every integration test
pub const TEST_CHUNK_SIZE: usize = 4096;

/// Byte at `offset` of an object generated with `seed`
pub fn object_byte(seed: u8, offset: u64) -> u8 {
    ((offset + seed as u64) % 251) as u8
}

/// Full content of an object generated with `seed`
pub fn object_bytes(seed: u8, length: u64) -> Vec<u8> {
    (0..length).map(|offset| object_byte(seed, offset)).collect()
}

/// Video post pointing at `remote`
pub fn video(id: i64, remote: &str, size: u64) -> MediaPost {
    MediaPost {
        id,
        caption: Some(format!("Clip {}", id)),
        media: MediaDescriptor {
            remote: MediaRef(remote.to_string()),
            size,
            duration_secs: Some(75),
            thumbnails: vec![ThumbnailSpec {
                kind: "s".into(),
                width: 90,
                height: 90,
                size: 16,
            }],
            mime_type: Some("video/mp4".into()),
        },
    }
}

/// Channel-like conversation
pub fn channel(title: &str, entity: &str) -> Conversation {
    Conversation {
        title: title.to_string(),
        is_channel_like: true,
        archived: false,
        pinned: false,
        entity: EntityRef(entity.to_string()),
    }
}

/// Transport serving generated objects
pub struct FakeTransport {
    objects: HashMap<MediaRef, (u64, u8)>,
    chunk_delay: Duration,
    authorized: AtomicBool,
    conversations: Vec<Conversation>,
    posts: Vec<MediaPost>,
    login_script: Mutex<VecDeque<LoginTokenState>>,
    chunks_served: Arc<AtomicUsize>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            objects: HashMap::new(),
            chunk_delay: Duration::ZERO,
            authorized: AtomicBool::new(false),
            conversations: vec![],
            posts: vec![],
            login_script: Mutex::new(VecDeque::new()),
            chunks_served: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Authorized account with one channel and the given posts, each served with its id as seed
    pub fn library(posts: Vec<MediaPost>) -> Self {
        let mut transport = Self::new().authorized();
        for post in &posts {
            transport = transport.with_object(&post.media.remote.0, post.media.size, post.id as u8);
        }
        transport.conversations = vec![channel("Launches", "c1")];
        transport.posts = posts;
        transport
    }

    pub fn authorized(self) -> Self {
        self.authorized.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_object(mut self, remote: &str, length: u64, seed: u8) -> Self {
        self.objects
            .insert(MediaRef(remote.to_string()), (length, seed));
        self
    }

    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    pub fn with_login_script(self, script: impl IntoIterator<Item = LoginTokenState>) -> Self {
        *self.login_script.lock().unwrap() = script.into_iter().collect();
        self
    }

    pub fn chunks_served(&self) -> usize {
        self.chunks_served.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TransportClient for FakeTransport {
    async fn connect(&self) -> Result<(), TransportError> {
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
        let Some((length, seed)) = self.objects.get(media).copied() else {
            return futures::stream::once(async {
                Err(TransportError::Rpc {
                    code: 400,
                    message: "FILE_ID_INVALID".into(),
                })
            })
            .boxed();
        };

        let delay = self.chunk_delay;
        let served = self.chunks_served.clone();
        let plan: Vec<(u64, usize)> = chunk_plan(length, chunk_size).collect();

        futures::stream::iter(plan)
            .then(move |(offset, len)| {
                let served = served.clone();
                async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    served.fetch_add(1, Ordering::SeqCst);
                    Ok((offset..offset + len as u64)
                        .map(|o| object_byte(seed, o))
                        .collect())
                }
            })
            .boxed()
    }

    async fn download_thumbnail(
        &self,
        _media: &MediaRef,
        spec: &ThumbnailSpec,
    ) -> Result<Vec<u8>, TransportError> {
        Ok(vec![0xAB; spec.size as usize])
    }

    async fn export_login_token(
        &self,
        _api_id: i32,
        _api_hash: &str,
        _except_ids: &[i64],
    ) -> Result<LoginTokenState, TransportError> {
        Ok(self
            .login_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(LoginTokenState::Pending {
                token: b"pending".to_vec(),
                expires_at: None,
            }))
    }

    async fn complete_login(&self, _credential: Credential) -> Result<SessionBlob, AuthError> {
        Err(AuthError::InvalidPassword)
    }

    async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, TransportError> {
        Ok(vec![])
    }
}

/// Presenter recording statuses, progress and activations
#[derive(Default)]
pub struct FakePresenter {
    pub activated: Mutex<Vec<ScreenId>>,
    pub statuses: Mutex<Vec<StatusMessage>>,
    pub progress: Mutex<Vec<ProgressUpdate>>,
    pub conversations: Mutex<Vec<Vec<Conversation>>>,
    pub media: Mutex<Vec<Vec<MediaPost>>>,
}

#[async_trait::async_trait]
impl Presenter for FakePresenter {
    fn screen_activated(&self, screen: ScreenId) {
        self.activated.lock().unwrap().push(screen);
    }

    fn focus_default(&self, _screen: ScreenId) {}

    fn progress(&self, update: &ProgressUpdate) {
        self.progress.lock().unwrap().push(update.clone());
    }

    fn status(&self, message: &StatusMessage) {
        self.statuses.lock().unwrap().push(message.clone());
    }

    fn render_login_token(&self, _payload: &str) {}

    async fn request_secret(&self, _prompt: &SecretPrompt) -> Option<String> {
        None
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

    fn show_search_results(&self, _hits: &[SearchHit]) {}
}

#[derive(Default)]
pub struct FakePlayer {
    pub loaded: Mutex<Vec<PlayableReference>>,
    pub playing: AtomicBool,
}

#[async_trait::async_trait]
impl PlayerSurface for FakePlayer {
    async fn load(&self, media: &PlayableReference) -> io::Result<()> {
        self.loaded.lock().unwrap().push(media.clone());
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.playing.store(false, Ordering::SeqCst);
    }

    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeWakeLock {
    pub held: AtomicBool,
}

impl FakeWakeLock {
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl WakeLock for FakeWakeLock {
    async fn acquire(&self) -> io::Result<()> {
        self.held.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
    }
}

/// An application over SQLite settings and a file cache slot in a temp dir
pub struct TestApp {
    pub app: App,
    pub transport: Arc<FakeTransport>,
    pub presenter: Arc<FakePresenter>,
    pub player: Arc<FakePlayer>,
    pub wake_lock: Arc<FakeWakeLock>,
    pub config: Config,
}

impl TestApp {
    /// Path of the single cache slot file
    pub fn slot_path(&self) -> PathBuf {
        self.config.acquisition.slot_path()
    }
}

/// Configuration rooted in `dir` with millisecond-scale delays
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.settings_path = dir.path().join("teletv.db");
    config.acquisition.cache_dir = dir.path().join("cache");
    config.acquisition.chunk_size = TEST_CHUNK_SIZE;
    config.acquisition.disk_space.min_free_space = 0;
    config.navigation.focus_delay = Duration::from_millis(1);
    config.login.poll_policy = teletv::RetryPolicy::Fixed {
        delay: Duration::from_millis(5),
    };
    config.login.transport_retry_policy = teletv::RetryPolicy::Fixed {
        delay: Duration::from_millis(5),
    };
    config.connect.initial_delay = Duration::from_millis(1);
    config.connect.jitter = false;
    config
}

/// Store app credentials in the settings database under `dir`
pub async fn seed_credentials(dir: &TempDir) {
    let settings = SqliteSettings::new(&dir.path().join("teletv.db"))
        .await
        .unwrap();
    settings.set(keys::API_ID, "12345").await.unwrap();
    settings
        .set(keys::API_HASH, "0123456789abcdef")
        .await
        .unwrap();
    settings.close().await;
}

/// Open an application in `dir` with fresh fakes around `transport`
pub async fn create_app(dir: &TempDir, transport: FakeTransport) -> TestApp {
    let config = test_config(dir);
    let transport = Arc::new(transport);
    let presenter = Arc::new(FakePresenter::default());
    let player = Arc::new(FakePlayer::default());
    let wake_lock = Arc::new(FakeWakeLock::default());

    let app = App::open(
        config.clone(),
        Collaborators {
            transport: transport.clone(),
            presenter: presenter.clone(),
            history: Arc::new(teletv::NoopHistory),
            wake_lock: wake_lock.clone(),
            player: player.clone(),
        },
    )
    .await
    .unwrap();

    TestApp {
        app,
        transport,
        presenter,
        player,
        wake_lock,
        config,
    }
}
