//! Configuration save and reset, cache clearing.

use crate::config::AppCredentials;
use crate::error::Result;
use crate::storage::keys;
use crate::types::{ScreenId, StatusMessage};
use std::sync::atomic::Ordering;

use super::{App, BrowseState};

impl App {
    /// Validate and store app credentials typed on the configuration screen
    ///
    /// Nothing is stored when either value is malformed. Call [`App::start`]
    /// afterwards to connect with the new credentials.
    pub async fn save_configuration(&self, api_id: &str, api_hash: &str) -> Result<()> {
        self.ensure_accepting()?;

        let credentials = AppCredentials::parse(api_id, api_hash)
            .map_err(|e| self.report("Invalid configuration", e))?;

        self.settings
            .set(keys::API_ID, &credentials.api_id.to_string())
            .await?;
        self.settings
            .set(keys::API_HASH, &credentials.api_hash)
            .await?;
        tracing::info!(api_id = credentials.api_id, "app credentials saved");

        self.presenter
            .status(&StatusMessage::info("Configuration saved"));
        Ok(())
    }

    /// Wipe the stored credentials, the saved session and the cached media,
    /// then show the configuration screen
    pub async fn reset_configuration(&self) -> Result<()> {
        self.ensure_accepting()?;
        tracing::info!("resetting configuration");

        // Login polling, the download and playback stop before anything is wiped
        self.navigation.lock().await.release_all().await;

        if let Err(e) = self.acquirer.clear_cache().await {
            tracing::warn!(error = %e, "could not clear the cache slot during reset");
        }
        self.settings.clear().await?;

        *self.credentials.write().await = None;
        self.connected.store(false, Ordering::SeqCst);
        *self.browse.lock().await = BrowseState::default();

        self.navigation.lock().await.reset_to(ScreenId::Config).await;
        self.presenter
            .status(&StatusMessage::info("Configuration cleared"));
        Ok(())
    }

    /// Discard the cached media, cancelling any download in progress
    ///
    /// This is the recovery offered after a storage quota failure.
    pub async fn clear_cache(&self) -> Result<()> {
        self.ensure_accepting()?;
        self.acquirer
            .clear_cache()
            .await
            .map_err(|e| self.report("Could not clear cache", e.into()))?;

        self.presenter.status(&StatusMessage::info("Cache cleared"));
        Ok(())
    }
}
