// Scoreganizer client - Library root

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod http_client;
pub mod pause;
pub mod scores;
pub mod tournaments;
pub mod version;

pub use auth::{Credential, TokenStatus};
pub use client::Scoreganizer;
pub use config::{ClientConfig, TransportRetry};
pub use error::{ApiFailure, FailureKind, Result, ScoreganizerError};
pub use scores::UploadOptions;
pub use tournaments::{KeyAttempt, Tournament, TournamentRef};
