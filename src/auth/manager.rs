use tokio::sync::RwLock;

use super::store::CredentialStore;
use super::types::{Credential, TokenResponse, TokenStatus, TokenStatusResponse};
use crate::error::{classify, Result, ScoreganizerError};
use crate::http_client::{ApiRequest, ApiResponse, ScoreganizerHttpClient};

/// Authentication manager
/// Owns the session credential and is the only path through which requests are sent
pub struct AuthManager {
    /// Transport used for every request of the session
    http: ScoreganizerHttpClient,

    /// Current credential, mirrored to disk when configured
    store: CredentialStore,

    /// Username of the last successful login
    username: RwLock<Option<String>>,
}

impl AuthManager {
    pub fn new(http: ScoreganizerHttpClient, store: CredentialStore) -> Self {
        Self {
            http,
            store,
            username: RwLock::new(None),
        }
    }

    /// Current credential, if logged in or restored
    pub async fn credential(&self) -> Option<Credential> {
        self.store.current().await
    }

    pub async fn is_authenticated(&self) -> bool {
        self.store.current().await.is_some()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Send a request with the current credential attached.
    /// Non-success responses are classified into [`ScoreganizerError::Api`].
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let credential = self.store.current().await;
        let response = self.http.execute(&request, credential.as_ref()).await?;

        if response.is_success() {
            return Ok(response);
        }

        let failure = classify(response.status, response.elapsed, &response.body);
        tracing::warn!(
            method = %request.method,
            path = %request.path,
            status = response.status.as_u16(),
            error = failure.code(),
            wait_ms = failure.wait().map(|w| w.as_millis() as u64),
            "Request rejected by Scoreganizer"
        );
        Err(failure.into())
    }

    /// Obtain a token for `username`; the credential is only replaced on success
    pub async fn login(&self, username: &str, password: &str) -> Result<Credential> {
        tracing::debug!(username = username, "Logging in");

        let request =
            ApiRequest::post("obtain_token").form([("username", username), ("password", password)]);
        let response = self.send(request).await?;
        let token = extract_token(&response)?;

        let credential = Credential::new(username, &token);
        self.store.set(credential.clone()).await?;
        *self.username.write().await = Some(username.to_string());

        tracing::info!(username = username, "Logged in");
        Ok(credential)
    }

    /// Exchange the current token for a new one, keeping the username
    pub async fn refresh(&self) -> Result<Credential> {
        let username = self
            .known_username()
            .await
            .ok_or(ScoreganizerError::NotAuthenticated)?;

        tracing::debug!(username = %username, "Refreshing token");

        let response = self.send(ApiRequest::post("refresh_token")).await?;
        let token = extract_token(&response)?;

        let credential = Credential::new(&username, &token);
        self.store.set(credential.clone()).await?;

        tracing::info!(username = %username, "Token refreshed");
        Ok(credential)
    }

    pub async fn token_status(&self) -> Result<TokenStatus> {
        let response = self.send(ApiRequest::get("token_status")).await?;
        let body: TokenStatusResponse = response.json()?;

        let status = body.status.ok_or_else(|| {
            ScoreganizerError::InvalidResponse("token_status response has no status".to_string())
        })?;
        Ok(TokenStatus::parse(&status))
    }

    /// True for `ok` and `ok_stale`
    pub async fn token_status_ok(&self) -> Result<bool> {
        Ok(self.token_status().await?.is_ok())
    }

    /// Refresh only if the server reports the token as stale
    pub async fn refresh_if_stale(&self) -> Result<Option<Credential>> {
        let status = self.token_status().await?;
        if status == TokenStatus::OkStale {
            tracing::info!("Token is stale, refreshing");
            return self.refresh().await.map(Some);
        }

        tracing::debug!(status = %status, "No refresh needed");
        Ok(None)
    }

    /// Install a credential obtained elsewhere.
    ///
    /// The username for later refreshes is taken from the credential; a value without
    /// `:` leaves no username behind.
    pub async fn set_credential(&self, credential: Credential) -> Result<()> {
        let username = credential.username().map(str::to_string);
        self.store.set(credential).await?;
        *self.username.write().await = username;
        Ok(())
    }

    /// Login username, else the one embedded in a restored credential
    async fn known_username(&self) -> Option<String> {
        if let Some(ref username) = *self.username.read().await {
            return Some(username.clone());
        }
        self.store
            .current()
            .await
            .and_then(|c| c.username().map(str::to_string))
    }
}

fn extract_token(response: &ApiResponse) -> Result<String> {
    let body: TokenResponse = response.json()?;
    body.token
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ScoreganizerError::InvalidResponse("response has no token".to_string()))
}
