//! Application context split into focused submodules.
//!
//! The `App` struct owns every component as an explicit field and turns UI
//! commands into navigation and pipeline calls. Its methods are organized by flow:
//! - [`startup`] - Credential loading, connect and the login flow
//! - [`browse`] - Channel, video and search listings
//! - [`playback`] - Acquisition into the player and the player's screen resources
//! - [`settings`] - Configuration save and reset, cache clearing
//! - [`lifecycle`] - Progress forwarding and shutdown

mod browse;
mod lifecycle;
mod playback;
mod settings;
mod startup;


use crate::acquisition::Acquirer;
use crate::config::{AppCredentials, Config};
use crate::error::{Error, Result};
use crate::host::{HostHistory, PlayerSurface, Presenter, WakeLock};
use crate::navigation::NavigationController;
use crate::storage::{CacheSlot, FileCacheSlot, SettingsStore, SqliteSettings};
use crate::transport::TransportClient;
use crate::types::{EntityRef, Event, MediaPost, ScreenId, StatusMessage};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};

use playback::PlayerResources;
use startup::{LoginResources, LoginTask};

/// A user intent coming from the remote control
#[derive(Clone)]
pub enum UiCommand {
    /// Back key (Backspace / Escape)
    Back,
    /// Back signal raised by the host's native history
    HostBack,
    /// Open the video listing of a conversation
    OpenConversation(EntityRef),
    /// Play a video post
    Play(MediaPost),
    /// Store new app credentials and restart
    SaveConfig {
        /// App identifier, as typed
        api_id: String,
        /// App secret, as typed
        api_hash: String,
    },
    /// Wipe all stored state and return to the configuration screen
    ResetConfig,
    /// Discard the cached media
    ClearCache,
    /// Search conversations and contacts
    Search(String),
    /// Abandon the current login token and start over
    RestartLogin,
    /// Reload the listing of the active screen
    Refresh,
}

impl UiCommand {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            UiCommand::Back => "back",
            UiCommand::HostBack => "host_back",
            UiCommand::OpenConversation(_) => "open_conversation",
            UiCommand::Play(_) => "play",
            UiCommand::SaveConfig { .. } => "save_config",
            UiCommand::ResetConfig => "reset_config",
            UiCommand::ClearCache => "clear_cache",
            UiCommand::Search(_) => "search",
            UiCommand::RestartLogin => "restart_login",
            UiCommand::Refresh => "refresh",
        }
    }
}

// Keeps the app secret out of logs
impl std::fmt::Debug for UiCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UiCommand::OpenConversation(entity) => {
                f.debug_tuple("OpenConversation").field(entity).finish()
            }
            UiCommand::Play(post) => f.debug_tuple("Play").field(&post.id).finish(),
            UiCommand::SaveConfig { api_id, .. } => f
                .debug_struct("SaveConfig")
                .field("api_id", api_id)
                .field("api_hash", &"<redacted>")
                .finish(),
            UiCommand::Search(query) => f.debug_tuple("Search").field(query).finish(),
            other => f.write_str(other.name()),
        }
    }
}

/// External collaborators supplied by the host
pub struct Collaborators {
    /// Messaging protocol client
    pub transport: Arc<dyn TransportClient>,
    /// Rendering surface
    pub presenter: Arc<dyn Presenter>,
    /// Native back-navigation history
    pub history: Arc<dyn HostHistory>,
    /// Display sleep suppression
    pub wake_lock: Arc<dyn WakeLock>,
    /// Playback element
    pub player: Arc<dyn PlayerSurface>,
}

/// Persistent state: small settings plus the single media cache slot
pub struct Stores {
    /// Credentials and saved session
    pub settings: Arc<dyn SettingsStore>,
    /// Reusable media cache slot
    pub slot: Arc<dyn CacheSlot>,
}

/// What the listing screens last showed, for [`UiCommand::Refresh`]
#[derive(Default)]
pub(crate) struct BrowseState {
    pub(crate) conversation: Option<EntityRef>,
    pub(crate) query: Option<String>,
}

/// Main application instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct App {
    pub(crate) config: Arc<Config>,
    pub(crate) transport: Arc<dyn TransportClient>,
    pub(crate) settings: Arc<dyn SettingsStore>,
    pub(crate) presenter: Arc<dyn Presenter>,
    pub(crate) wake_lock: Arc<dyn WakeLock>,
    pub(crate) player: Arc<dyn PlayerSurface>,
    /// Media acquisition pipeline (owns the cache slot)
    pub(crate) acquirer: Acquirer,
    /// Serializes every screen change
    pub(crate) navigation: Arc<Mutex<NavigationController>>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Credentials validated by the last start
    pub(crate) credentials: Arc<RwLock<Option<AppCredentials>>>,
    /// Set once the transport connected
    pub(crate) connected: Arc<AtomicBool>,
    /// Cleared during shutdown
    pub(crate) accepting: Arc<AtomicBool>,
    /// Running login flow, if any
    pub(crate) login: Arc<Mutex<Option<LoginTask>>>,
    pub(crate) playback: Arc<PlayerResources>,
    pub(crate) browse: Arc<Mutex<BrowseState>>,
}

impl App {
    /// Create a new application context
    ///
    /// Validates `config`, wires the screen resources (acquisition and
    /// playback on the player screen, the login flow on the auth screen) and
    /// starts forwarding download progress to the presenter. Nothing is shown
    /// until [`App::start`] runs.
    pub async fn new(config: Config, collaborators: Collaborators, stores: Stores) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(256);

        let acquirer = Acquirer::new(
            config.acquisition.clone(),
            collaborators.transport.clone(),
            stores.slot,
            event_tx.clone(),
        );
        let playback = Arc::new(PlayerResources::new(
            collaborators.player.clone(),
            collaborators.wake_lock.clone(),
        ));
        let login = Arc::new(Mutex::new(None));

        let mut navigation = NavigationController::new(
            ScreenId::Config,
            &config.navigation,
            collaborators.presenter.clone(),
            collaborators.history,
            event_tx.clone(),
        );
        // The download stops before playback is torn down
        navigation.register_resources(ScreenId::Player, Arc::new(acquirer.clone()));
        navigation.register_resources(ScreenId::Player, playback.clone());
        navigation.register_resources(ScreenId::Auth, Arc::new(LoginResources::new(login.clone())));

        let app = Self {
            config: Arc::new(config),
            transport: collaborators.transport,
            settings: stores.settings,
            presenter: collaborators.presenter,
            wake_lock: collaborators.wake_lock,
            player: collaborators.player,
            acquirer,
            navigation: Arc::new(Mutex::new(navigation)),
            event_tx,
            credentials: Arc::new(RwLock::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            accepting: Arc::new(AtomicBool::new(true)),
            login,
            playback,
            browse: Arc::new(Mutex::new(BrowseState::default())),
        };

        app.spawn_progress_forwarder();
        Ok(app)
    }

    /// Create an application context backed by the SQLite settings store and
    /// the file cache slot named in `config`
    pub async fn open(config: Config, collaborators: Collaborators) -> Result<Self> {
        let settings = SqliteSettings::new(&config.persistence.settings_path).await?;
        let slot = FileCacheSlot::new(&config.acquisition);
        tracing::info!(
            settings = %config.persistence.settings_path.display(),
            slot = %slot.path().display(),
            "opened persistent stores"
        );

        Self::new(
            config,
            collaborators,
            Stores {
                settings: Arc::new(settings),
                slot: Arc::new(slot),
            },
        )
        .await
    }

    /// Subscribe to application events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Application events as a stream
    ///
    /// Events missed by a slow consumer are skipped with a warning.
    pub fn event_stream(&self) -> impl Stream<Item = Event> + Send + 'static {
        BroadcastStream::new(self.event_tx.subscribe()).filter_map(|result| match result {
            Ok(event) => Some(event),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event consumer lagged, events skipped");
                None
            }
        })
    }

    /// The configuration this context runs with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The active screen
    pub async fn active_screen(&self) -> ScreenId {
        self.navigation.lock().await.active()
    }

    /// The back stack, oldest first
    pub async fn back_stack(&self) -> Vec<ScreenId> {
        self.navigation.lock().await.stack().to_vec()
    }

    /// Handle one UI command
    ///
    /// `Play` enters the player screen before this returns and downloads in
    /// its own task, so a following `Back` can cancel it; every other command
    /// completes before this returns.
    pub async fn dispatch(&self, command: UiCommand) -> Result<()> {
        self.ensure_accepting()?;
        tracing::debug!(command = command.name(), "dispatching ui command");

        match command {
            UiCommand::Back => {
                self.navigation.lock().await.go_back().await;
            }
            UiCommand::HostBack => {
                self.navigation.lock().await.on_host_back().await;
            }
            UiCommand::OpenConversation(entity) => {
                self.open_conversation(&entity).await?;
            }
            UiCommand::Play(post) => {
                let prepared = self.prepare_play(&post).await?;
                let app = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = app.finish_play(&post, prepared).await {
                        tracing::debug!(post_id = post.id, error = %e, "playback ended with an error");
                    }
                });
            }
            UiCommand::SaveConfig { api_id, api_hash } => {
                self.save_configuration(&api_id, &api_hash).await?;
                self.start().await?;
            }
            UiCommand::ResetConfig => self.reset_configuration().await?,
            UiCommand::ClearCache => self.clear_cache().await?,
            UiCommand::Search(query) => {
                self.search(&query).await?;
            }
            UiCommand::RestartLogin => self.restart_login().await?,
            UiCommand::Refresh => self.refresh().await?,
        }
        Ok(())
    }

    /// Put `error` on the status line unless it is an expected outcome, and hand it back
    pub(crate) fn report(&self, context: &str, error: Error) -> Error {
        if error.is_silent() {
            tracing::debug!(context, error = %error, "operation ended early");
            return error;
        }

        tracing::warn!(context, code = error.error_code(), error = %error, "operation failed");
        let status = StatusMessage::from_error(context, &error);
        self.event_tx
            .send(Event::Status {
                message: status.text.clone(),
            })
            .ok();
        self.presenter.status(&status);
        error
    }

    pub(crate) fn ensure_accepting(&self) -> Result<()> {
        if self.accepting.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::ShuttingDown)
        }
    }

    pub(crate) fn ensure_connected(&self) -> Result<()> {
        if self.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }
}
