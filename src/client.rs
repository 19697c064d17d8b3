// Client facade
// Wires configuration, transport, credential store and the API handles together

use std::sync::Arc;

use crate::auth::{AuthManager, Credential, CredentialStore, TokenStatus};
use crate::config::ClientConfig;
use crate::error::{Result, ScoreganizerError};
use crate::http_client::ScoreganizerHttpClient;
use crate::pause::{Pause, TokioPause};
use crate::scores::Scores;
use crate::tournaments::Tournaments;

/// Scoreganizer client: one authenticated session against one server
#[derive(Clone)]
pub struct Scoreganizer {
    auth: Arc<AuthManager>,
    tournaments: Tournaments,
    scores: Scores,
}

impl Scoreganizer {
    /// Create a client. With an auth file configured, a stored credential is restored
    /// without any network call.
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_pause(config, Arc::new(TokioPause))
    }

    /// Create a client whose protocol-level waits go through `pause`
    pub fn with_pause(config: ClientConfig, pause: Arc<dyn Pause>) -> Result<Self> {
        config
            .validate()
            .map_err(|e| ScoreganizerError::Config(e.to_string()))?;

        let http = ScoreganizerHttpClient::new(&config)?;
        let store = match config.auth_file {
            Some(ref path) => CredentialStore::open(path)?,
            None => CredentialStore::in_memory(),
        };

        tracing::debug!(base_url = %http.base_url(), "Scoreganizer client created");

        let auth = Arc::new(AuthManager::new(http, store));
        Ok(Self {
            tournaments: Tournaments::new(auth.clone(), pause.clone()),
            scores: Scores::new(auth.clone(), pause),
            auth,
        })
    }

    pub fn tournaments(&self) -> &Tournaments {
        &self.tournaments
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    pub fn auth(&self) -> &AuthManager {
        &self.auth
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        self.auth.login(username, password).await
    }

    pub async fn refresh_login(&self) -> Result<Credential> {
        self.auth.refresh().await
    }

    pub async fn refresh_login_if_stale(&self) -> Result<Option<Credential>> {
        self.auth.refresh_if_stale().await
    }

    pub async fn token_status(&self) -> Result<TokenStatus> {
        self.auth.token_status().await
    }

    pub async fn token_status_ok(&self) -> Result<bool> {
        self.auth.token_status_ok().await
    }

    /// Use an authorization string obtained elsewhere (`username:token`)
    pub async fn set_auth_str(&self, auth_str: &str) -> Result<()> {
        self.auth
            .set_credential(Credential::from_raw(auth_str))
            .await
    }

    pub async fn credential(&self) -> Option<Credential> {
        self.auth.credential().await
    }
}
