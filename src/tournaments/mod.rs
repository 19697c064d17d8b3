// Tournament endpoints
// Lists, participation, and the per-tournament key exchange

mod model;

pub use model::{Tournament, TournamentRef};

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::auth::AuthManager;
use crate::error::{ApiFailure, FailureKind, Result, ScoreganizerError};
use crate::http_client::{ApiRequest, ApiResponse};
use crate::pause::Pause;

/// Wait used when a `too_early` response carries no `wait` hint
const FALLBACK_KEY_WAIT: Duration = Duration::from_secs(1);

/// Outcome of a single key generation attempt
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAttempt {
    /// This call generated the key
    Generated(String),
    /// Someone else generated it already; fetch it with `get_key`
    Exists,
    /// Generation is not open yet; retry after the failure's wait
    MustWait(ApiFailure),
}

#[derive(Deserialize)]
struct KeyResponse {
    key: Option<String>,
}

/// Tournament API
#[derive(Clone)]
pub struct Tournaments {
    auth: Arc<AuthManager>,
    pause: Arc<dyn Pause>,
}

impl Tournaments {
    pub fn new(auth: Arc<AuthManager>, pause: Arc<dyn Pause>) -> Self {
        Self { auth, pause }
    }

    pub async fn all(&self) -> Result<Vec<Tournament>> {
        self.list("all").await
    }

    /// Requires login
    pub async fn my_active(&self) -> Result<Vec<Tournament>> {
        self.list("my_active").await
    }

    pub async fn active(&self) -> Result<Vec<Tournament>> {
        self.list("active").await
    }

    pub async fn archive(&self) -> Result<Vec<Tournament>> {
        self.list("archive").await
    }

    pub async fn upcoming(&self) -> Result<Vec<Tournament>> {
        self.list("upcoming").await
    }

    pub async fn in_progress(&self) -> Result<Vec<Tournament>> {
        self.list("in_progress").await
    }

    pub async fn participate<'a>(&self, tournament: impl Into<TournamentRef<'a>>) -> Result<()> {
        let id = tournament.into().id();
        self.auth
            .send(ApiRequest::post(format!("tournaments/participate/{}", id)))
            .await?;
        tracing::info!(tournament = id, "Participating in tournament");
        Ok(())
    }

    pub async fn player_confirm<'a>(&self, tournament: impl Into<TournamentRef<'a>>) -> Result<()> {
        let id = tournament.into().id();
        self.auth
            .send(ApiRequest::post(format!("tournaments/player_confirm/{}", id)))
            .await?;
        tracing::info!(tournament = id, "Confirmed participation");
        Ok(())
    }

    /// Generate the tournament key. Fails with `KeyExists` or `TooEarly` when it cannot.
    pub async fn gen_key<'a>(&self, tournament: impl Into<TournamentRef<'a>>) -> Result<String> {
        let id = tournament.into().id();
        let response = self
            .auth
            .send(ApiRequest::post(format!("tournaments/gen_key/{}", id)))
            .await?;
        extract_key(&response)
    }

    /// Fetch a key that was already generated
    pub async fn get_key<'a>(&self, tournament: impl Into<TournamentRef<'a>>) -> Result<String> {
        let id = tournament.into().id();
        let response = self
            .auth
            .send(ApiRequest::get(format!("tournaments/get_key/{}", id)))
            .await?;
        extract_key(&response)
    }

    /// One generation attempt, with the expected refusals as values
    pub async fn try_gen_key<'a>(
        &self,
        tournament: impl Into<TournamentRef<'a>>,
    ) -> Result<KeyAttempt> {
        match self.gen_key(tournament).await {
            Ok(key) => Ok(KeyAttempt::Generated(key)),
            Err(ScoreganizerError::Api(failure)) => match failure.kind() {
                FailureKind::KeyExists => Ok(KeyAttempt::Exists),
                FailureKind::TooEarly => Ok(KeyAttempt::MustWait(failure)),
                _ => Err(failure.into()),
            },
            Err(e) => Err(e),
        }
    }

    /// Obtain the key, generating it as soon as the server allows.
    ///
    /// Waits exactly as long as each `too_early` response asks and never gives up on its
    /// own; any failure other than `too_early`/`key_exists` is returned.
    pub async fn wait_key<'a>(&self, tournament: impl Into<TournamentRef<'a>>) -> Result<String> {
        self.wait_key_inner(tournament.into().id(), None).await
    }

    /// Like [`wait_key`](Self::wait_key), but gives up after `max_attempts` generation
    /// attempts, returning the last `too_early` failure
    pub async fn wait_key_with_limit<'a>(
        &self,
        tournament: impl Into<TournamentRef<'a>>,
        max_attempts: u32,
    ) -> Result<String> {
        self.wait_key_inner(tournament.into().id(), Some(max_attempts.max(1)))
            .await
    }

    async fn wait_key_inner(&self, id: i64, max_attempts: Option<u32>) -> Result<String> {
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.try_gen_key(id).await? {
                KeyAttempt::Generated(key) => {
                    tracing::info!(
                        tournament = id,
                        attempts = attempts,
                        "Generated tournament key"
                    );
                    return Ok(key);
                }
                KeyAttempt::Exists => {
                    tracing::debug!(tournament = id, "Key already exists, fetching it");
                    return self.get_key(id).await;
                }
                KeyAttempt::MustWait(failure) => {
                    if max_attempts.is_some_and(|max| attempts >= max) {
                        tracing::warn!(
                            tournament = id,
                            attempts = attempts,
                            "Giving up waiting for key"
                        );
                        return Err(failure.into());
                    }

                    let wait = failure.wait().unwrap_or(FALLBACK_KEY_WAIT);
                    tracing::debug!(
                        tournament = id,
                        wait_ms = wait.as_millis() as u64,
                        "Too early for key generation, waiting"
                    );
                    self.pause.pause(wait).await;
                }
            }
        }
    }

    async fn list(&self, name: &str) -> Result<Vec<Tournament>> {
        let response = self
            .auth
            .send(ApiRequest::get(format!("tournaments/{}", name)))
            .await?;
        let tournaments: Vec<Tournament> = response.json()?;
        tracing::debug!(list = name, count = tournaments.len(), "Fetched tournaments");
        Ok(tournaments)
    }
}

fn extract_key(response: &ApiResponse) -> Result<String> {
    let body: KeyResponse = response.json()?;
    body.key
        .ok_or_else(|| ScoreganizerError::InvalidResponse("response has no key".to_string()))
}
