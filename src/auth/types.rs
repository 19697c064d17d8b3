// Authentication types

use serde::Deserialize;
use std::fmt;

/// Authorization string sent as `X-Scoreganizer-Authorization`, formatted `username:token`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(username: &str, token: &str) -> Self {
        Self(format!("{}:{}", username, token))
    }

    /// Wrap an existing authorization string, e.g. one restored from disk
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Username part, if the string has the `username:token` shape
    pub fn username(&self) -> Option<&str> {
        self.0.split_once(':').map(|(username, _)| username)
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Token status as reported by the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStatus {
    Ok,
    /// Still valid, but due for renewal
    OkStale,
    NotSent,
    Expired,
    Other(String),
}

impl TokenStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "ok" => Self::Ok,
            "ok_stale" => Self::OkStale,
            "not_sent" => Self::NotSent,
            "expired" => Self::Expired,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Ok => "ok",
            Self::OkStale => "ok_stale",
            Self::NotSent => "not_sent",
            Self::Expired => "expired",
            Self::Other(raw) => raw,
        }
    }

    /// True for every status starting with `ok`
    pub fn is_ok(&self) -> bool {
        self.as_str().starts_with("ok")
    }
}

impl fmt::Display for TokenStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `obtain_token` and `refresh_token`
#[derive(Deserialize)]
pub struct TokenResponse {
    pub token: Option<String>,
}

/// Body of `token_status`
#[derive(Deserialize)]
pub struct TokenStatusResponse {
    pub status: Option<String>,
}
