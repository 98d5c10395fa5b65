//! Credential loading, connect and the login flow.

use crate::config::AppCredentials;
use crate::error::{Error, LoginError, Result};
use crate::login::LoginFlow;
use crate::navigation::ScreenResources;
use crate::retry::with_retry;
use crate::storage::keys;
use crate::types::{Event, Phase, ProgressUpdate, ScreenId, SessionBlob};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::App;

/// Handles of the running login flow
pub(crate) struct LoginTask {
    /// Stops the polling
    cancel: CancellationToken,
    /// Fires once the flow has returned
    finished: CancellationToken,
}

/// Auth screen resource: the login flow stops when the screen is left
pub(crate) struct LoginResources {
    login: Arc<Mutex<Option<LoginTask>>>,
}

impl LoginResources {
    pub(crate) fn new(login: Arc<Mutex<Option<LoginTask>>>) -> Self {
        Self { login }
    }
}

#[async_trait::async_trait]
impl ScreenResources for LoginResources {
    fn name(&self) -> &'static str {
        "login"
    }

    async fn release(&self) {
        let task = self.login.lock().await.take();
        if let Some(task) = task {
            task.cancel.cancel();
            task.finished.cancelled().await;
        }
    }
}

impl App {
    /// Bring the application to its first screen
    ///
    /// - No stored credentials: the configuration screen.
    /// - A malformed stored credential: it is removed, the configuration
    ///   screen is shown and [`Error::Config`] is returned.
    /// - Otherwise the saved session is restored, the transport connected
    ///   (with retry) and either the channel listing shown or the login flow
    ///   started in the background on the auth screen.
    pub async fn start(&self) -> Result<()> {
        self.ensure_accepting()?;

        let Some(credentials) = self.load_credentials().await? else {
            tracing::info!("no app credentials stored, showing configuration");
            self.navigation.lock().await.reset_to(ScreenId::Config).await;
            return Ok(());
        };
        *self.credentials.write().await = Some(credentials);

        self.connect().await?;

        let authorized = self
            .transport
            .is_authorized()
            .await
            .map_err(|e| self.report("Could not check login state", e.into()))?;

        if authorized {
            tracing::info!("saved session is authorized");
            self.load_channels().await?;
        } else {
            self.begin_login().await?;
        }
        Ok(())
    }

    async fn load_credentials(&self) -> Result<Option<AppCredentials>> {
        let api_id = self.settings.get(keys::API_ID).await?;
        let api_hash = self.settings.get(keys::API_HASH).await?;
        let (Some(api_id), Some(api_hash)) = (api_id, api_hash) else {
            return Ok(None);
        };

        match AppCredentials::parse(&api_id, &api_hash) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                let key = match &e {
                    Error::Config { key: Some(key), .. } => key.clone(),
                    _ => keys::API_ID.to_string(),
                };
                tracing::warn!(key = %key, error = %e, "stored credential is malformed, removing it");
                self.settings.remove(&key).await?;
                self.navigation.lock().await.reset_to(ScreenId::Config).await;
                Err(self.report("Stored configuration is invalid", e))
            }
        }
    }

    /// Restore the saved session, if any, and connect the transport
    async fn connect(&self) -> Result<()> {
        self.presenter.progress(&ProgressUpdate {
            phase: Phase::Connecting,
            percent: None,
            message: "Connecting".to_string(),
        });

        if let Some(saved) = self.settings.get(keys::SESSION).await? {
            let session = SessionBlob(saved);
            if let Err(e) = self.transport.resume_session(&session).await {
                tracing::warn!(error = %e, "saved session could not be restored, a new login is needed");
                self.settings.remove(keys::SESSION).await?;
            }
        }

        with_retry(&self.config.connect, || self.transport.connect())
            .await
            .map_err(|e| self.report("Could not connect", e.into()))?;

        self.connected.store(true, Ordering::SeqCst);
        tracing::info!("transport connected");
        Ok(())
    }

    /// Show the auth screen and run the login flow in the background
    ///
    /// Showing the auth screen releases any flow that was still running.
    async fn begin_login(&self) -> Result<()> {
        self.ensure_connected()?;
        let credentials = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::config("app credentials are not set", keys::API_ID))?;

        self.navigation.lock().await.reset_to(ScreenId::Auth).await;

        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        *self.login.lock().await = Some(LoginTask {
            cancel: cancel.clone(),
            finished: finished.clone(),
        });

        let flow = LoginFlow::new(
            self.transport.clone(),
            self.presenter.clone(),
            self.event_tx.clone(),
            credentials,
            self.config.login.clone(),
        );
        tracing::info!("login flow started");

        let app = self.clone();
        tokio::spawn(async move {
            let outcome = {
                let _finished = finished.drop_guard();
                flow.run(&cancel).await
            };
            if let Err(e) = app.finish_login(outcome, &cancel).await {
                tracing::debug!(error = %e, "login flow ended without a session");
            }
        });
        Ok(())
    }

    async fn finish_login(
        &self,
        outcome: std::result::Result<SessionBlob, LoginError>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let session = outcome.map_err(|e| self.report("Login failed", e.into()))?;

        if cancel.is_cancelled() {
            tracing::info!("login confirmed after the flow was abandoned, session discarded");
            return Err(LoginError::Abandoned.into());
        }

        self.settings.set(keys::SESSION, session.as_str()).await?;
        tracing::info!("login complete, session saved");
        self.event_tx.send(Event::LoggedIn).ok();

        self.load_channels().await?;
        Ok(())
    }

    /// Abandon the current login token and start a fresh flow
    pub async fn restart_login(&self) -> Result<()> {
        self.ensure_accepting()?;
        tracing::info!("restarting login");
        self.begin_login().await
    }
}
