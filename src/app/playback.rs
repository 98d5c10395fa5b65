//! Acquisition into the player and the player screen's resources.

use crate::acquisition::PendingDownload;
use crate::error::{Error, Result};
use crate::host::{PlayerSurface, WakeLock};
use crate::navigation::ScreenResources;
use crate::types::{MediaPost, PlayableReference, ScreenId};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use super::App;

/// Playback and display sleep suppression, torn down when the player screen is left
pub(crate) struct PlayerResources {
    player: Arc<dyn PlayerSurface>,
    wake_lock: Arc<dyn WakeLock>,
    /// Bumped per play request and per release; a finished download only loads if still current
    generation: AtomicU64,
    wake_held: AtomicBool,
}

impl PlayerResources {
    pub(crate) fn new(player: Arc<dyn PlayerSurface>, wake_lock: Arc<dyn WakeLock>) -> Self {
        Self {
            player,
            wake_lock,
            generation: AtomicU64::new(0),
            wake_held: AtomicBool::new(false),
        }
    }

    fn begin(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    /// Keep the display awake; a second play on the same screen keeps the existing hold
    async fn hold_wake_lock(&self) {
        if self.wake_held.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.wake_lock.acquire().await {
            self.wake_held.store(false, Ordering::SeqCst);
            tracing::warn!(error = %e, "could not acquire wake lock, the display may sleep");
        }
    }

    async fn release_wake_lock(&self) {
        if self.wake_held.swap(false, Ordering::SeqCst) {
            self.wake_lock.release().await;
        }
    }
}

#[async_trait::async_trait]
impl ScreenResources for PlayerResources {
    fn name(&self) -> &'static str {
        "playback"
    }

    async fn release(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.player.is_playing() {
            self.player.stop().await;
        }
        self.release_wake_lock().await;
    }
}

/// A play request whose screen, session and wake lock are already in place
pub(crate) struct PreparedPlay {
    generation: u64,
    download: PendingDownload,
}

impl App {
    /// Play a video post
    ///
    /// Navigates to the player, keeps the display awake and downloads the
    /// whole object into the cache slot before loading it into the player.
    /// Returns `Ok(None)` when the download was cancelled or the player
    /// screen was left before it finished. Storage failures carry the
    /// clear-cache recovery on the status line.
    pub async fn play(&self, post: &MediaPost) -> Result<Option<PlayableReference>> {
        let prepared = self.prepare_play(post).await?;
        self.finish_play(post, prepared).await
    }

    /// Enter the player screen with everything its release tears down already set up
    ///
    /// The navigation lock is held throughout, so a back press lands either
    /// before the screen change or after the session and wake lock exist.
    pub(crate) async fn prepare_play(&self, post: &MediaPost) -> Result<PreparedPlay> {
        self.ensure_accepting()?;
        self.ensure_connected()?;

        let mut navigation = self.navigation.lock().await;
        let download = self
            .acquirer
            .prepare(post.media.handle())
            .await
            .map_err(|e| self.report("Could not play video", e.into()))?;

        let generation = self.playback.begin();
        if !navigation.is_active(ScreenId::Player) {
            navigation.navigate_to(ScreenId::Player);
        }
        self.playback.hold_wake_lock().await;
        drop(navigation);

        tracing::info!(
            post_id = post.id,
            size = post.media.size,
            session_id = download.session().0,
            "playing video"
        );
        Ok(PreparedPlay {
            generation,
            download,
        })
    }

    /// Download a prepared play request and load it into the player
    pub(crate) async fn finish_play(
        &self,
        post: &MediaPost,
        prepared: PreparedPlay,
    ) -> Result<Option<PlayableReference>> {
        let PreparedPlay {
            generation,
            download,
        } = prepared;

        let playable = match self.acquirer.run(download).await {
            Ok(playable) => playable,
            Err(e) => {
                let error = self.report("Could not play video", Error::from(e));
                // A stale request's hold was already released or handed to the newer one
                if self.playback.is_current(generation) {
                    self.playback.release_wake_lock().await;
                }
                if error.is_silent() {
                    return Ok(None);
                }
                return Err(error);
            }
        };

        // Holding the lock keeps a back press from interleaving with the load
        let navigation = self.navigation.lock().await;
        if !navigation.is_active(ScreenId::Player) {
            tracing::debug!(post_id = post.id, "player left before the download finished");
            drop(navigation);
            self.playback.release_wake_lock().await;
            return Ok(None);
        }
        if !self.playback.is_current(generation) {
            tracing::debug!(post_id = post.id, "a newer play request owns the player");
            return Ok(None);
        }
        if let Err(e) = self.player.load(&playable).await {
            drop(navigation);
            self.playback.release_wake_lock().await;
            return Err(self.report("Could not start playback", e.into()));
        }
        Ok(Some(playable))
    }
}
