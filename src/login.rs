//! Login token polling
//!
//! Turns the one-shot token export call into a login flow: a pending token is
//! rendered as a scannable code and re-requested on a fixed interval until it
//! is confirmed on another device. An account protected by a password stops
//! the polling and prompts for the password instead.
//!
//! The poll interval is deliberately fixed rather than exponential: a token
//! only lives for a few tens of seconds on the remote side, and backing off
//! would let the next poll land after it expired.

use crate::config::{AppCredentials, LoginConfig};
use crate::error::{AuthError, LoginError, RecoveryAction};
use crate::host::Presenter;
use crate::retry::sleep_or_cancel;
use crate::transport::TransportClient;
use crate::types::{
    Credential, Event, LoginTokenState, Phase, ProgressUpdate, SecretPrompt, SessionBlob,
    StatusMessage,
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

/// Scheme prefix of the scannable login payload
pub const LOGIN_URL_PREFIX: &str = "tg://login?token=";

/// Scannable payload for a raw login token
pub fn login_url(token: &[u8]) -> String {
    format!("{}{}", LOGIN_URL_PREFIX, URL_SAFE_NO_PAD.encode(token))
}

/// One run of the login polling state machine
pub struct LoginFlow {
    transport: Arc<dyn TransportClient>,
    presenter: Arc<dyn Presenter>,
    event_tx: broadcast::Sender<Event>,
    credentials: AppCredentials,
    config: LoginConfig,
}

impl LoginFlow {
    /// Create a flow using the given app credentials
    pub fn new(
        transport: Arc<dyn TransportClient>,
        presenter: Arc<dyn Presenter>,
        event_tx: broadcast::Sender<Event>,
        credentials: AppCredentials,
        config: LoginConfig,
    ) -> Self {
        Self {
            transport,
            presenter,
            event_tx,
            credentials,
            config,
        }
    }

    /// Poll until the login succeeds, fails terminally or `cancel` fires
    ///
    /// Transport failures while polling are retried without limit; only a
    /// confirmed login, an unexpected remote state, a failed password
    /// challenge or abandonment end the flow.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<SessionBlob, LoginError> {
        let mut polls: u32 = 0;
        let mut transport_failures: u32 = 0;

        loop {
            polls += 1;
            let answer = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LoginError::Abandoned),
                answer = self.transport.export_login_token(
                    self.credentials.api_id,
                    &self.credentials.api_hash,
                    &self.config.except_ids,
                ) => answer,
            };

            let state = match answer {
                Ok(state) => {
                    transport_failures = 0;
                    state
                }
                Err(e) => {
                    transport_failures += 1;
                    let delay = self.config.transport_retry_policy.delay(transport_failures);
                    tracing::warn!(
                        error = %e,
                        attempt = transport_failures,
                        delay_ms = delay.as_millis(),
                        "login token request failed, retrying"
                    );
                    self.presenter.status(&StatusMessage {
                        text: format!("Connection problem: {}", e),
                        recovery: RecoveryAction::RetryLater,
                    });
                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(LoginError::Abandoned);
                    }
                    continue;
                }
            };

            match state {
                LoginTokenState::Success(session) => {
                    tracing::info!(polls, "login confirmed");
                    return Ok(session);
                }
                LoginTokenState::Pending { token, expires_at } => {
                    let payload = login_url(&token);
                    tracing::debug!(poll = polls, expires_at = ?expires_at, "login token pending");

                    self.presenter.render_login_token(&payload);
                    self.presenter.progress(&ProgressUpdate {
                        phase: Phase::LoginPolling,
                        percent: None,
                        message: "Scan the code with the app on your phone".to_string(),
                    });
                    self.event_tx
                        .send(Event::LoginTokenIssued {
                            payload,
                            poll: polls,
                        })
                        .ok();

                    let delay = self.config.poll_policy.delay(polls);
                    if !sleep_or_cancel(delay, cancel).await {
                        return Err(LoginError::Abandoned);
                    }
                }
                LoginTokenState::PasswordRequired => {
                    return self.password_challenge(cancel).await;
                }
                LoginTokenState::MigrateElsewhere { dc_id } => {
                    tracing::warn!(dc_id, "login requires a data center migration");
                    return Err(LoginError::UnexpectedState(format!(
                        "account lives on data center {}",
                        dc_id
                    )));
                }
                LoginTokenState::Unrecognized { tag } => {
                    tracing::warn!(tag = %tag, "unrecognized login token answer");
                    return Err(LoginError::UnexpectedState(tag));
                }
            }
        }
    }

    /// Prompt for the account password until it is accepted or the prompt is dismissed
    ///
    /// No token polling happens while this runs.
    async fn password_challenge(
        &self,
        cancel: &CancellationToken,
    ) -> Result<SessionBlob, LoginError> {
        tracing::info!("account requires its password");
        let mut attempt: u32 = 0;
        let mut retry = false;

        loop {
            attempt += 1;
            self.event_tx.send(Event::PasswordRequired { attempt }).ok();

            let prompt = SecretPrompt { attempt, retry };
            let secret = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                secret = self.presenter.request_secret(&prompt) => secret,
            };
            let Some(secret) = secret else {
                tracing::info!(attempt, "password prompt dismissed");
                return Err(LoginError::Abandoned);
            };

            match self
                .transport
                .complete_login(Credential::Password(secret))
                .await
            {
                Ok(session) => {
                    tracing::info!(attempt, "password accepted");
                    return Ok(session);
                }
                Err(AuthError::InvalidPassword) => {
                    tracing::warn!(attempt, "password rejected");
                    self.presenter
                        .status(&StatusMessage::info("Wrong password, try again"));
                    retry = true;
                }
                // The challenge stays open on the remote side; ask again
                Err(AuthError::Transport(e)) => {
                    tracing::warn!(attempt, error = %e, "password submission failed");
                    self.presenter.status(&StatusMessage {
                        text: format!("Connection problem: {}", e),
                        recovery: RecoveryAction::RetryLater,
                    });
                    retry = true;
                }
                Err(e) => {
                    tracing::error!(attempt, error = %e, "password login failed");
                    return Err(LoginError::PasswordFlowFailed(e));
                }
            }
        }
    }
}
