// Error handling module
// Defines the typed server failures and the classifier that builds them

use reqwest::StatusCode;
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Kind of a failure reported by the Scoreganizer API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The tournament key was already generated
    KeyExists,
    /// Key generation is not open yet; carries a wait
    TooEarly,
    InvalidLoginData,
    InvalidData,
    NotLoggedIn,
    /// Transient server-side condition; only uploads retry on it
    Retry,
    NotGenerated,
    /// Key not generated yet; carries a wait
    NotGeneratedYet,
    NeverGenerated,
    TokenTooRecent,
    /// Unmapped error code, with or without a wait
    Generic,
}

impl FailureKind {
    /// Look up a server error code in the fixed mapping table
    pub fn from_code(code: &str) -> Option<Self> {
        let kind = match code {
            "key_exists" => Self::KeyExists,
            "too_early" => Self::TooEarly,
            "invalid_login_data" => Self::InvalidLoginData,
            "invalid_data" => Self::InvalidData,
            "not_logged_in" => Self::NotLoggedIn,
            "retry" => Self::Retry,
            "not_generated" => Self::NotGenerated,
            "not_generated_yet" => Self::NotGeneratedYet,
            "never_generated" => Self::NeverGenerated,
            "token_too_recent" => Self::TokenTooRecent,
            _ => return None,
        };
        Some(kind)
    }
}

/// A classified non-success response
#[derive(Debug, Clone, PartialEq, Error)]
pub struct ApiFailure {
    kind: FailureKind,
    code: String,
    status: u16,
    wait: Option<Duration>,
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (HTTP {})", self.code, self.status)?;
        if let Some(wait) = self.wait {
            write!(f, ", retry in {:.3}s", wait.as_secs_f64())?;
        }
        Ok(())
    }
}

impl ApiFailure {
    pub fn new(kind: FailureKind, code: impl Into<String>, status: u16) -> Self {
        Self {
            kind,
            code: code.into(),
            status,
            wait: None,
        }
    }

    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = Some(wait);
        self
    }

    pub fn kind(&self) -> FailureKind {
        self.kind
    }

    /// Server error code, or the HTTP status when the server sent none
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    /// Minimum delay before retrying, already reduced by the request latency
    pub fn wait(&self) -> Option<Duration> {
        self.wait
    }
}

/// Errors returned by the client
#[derive(Error, Debug)]
pub enum ScoreganizerError {
    /// Server answered with a non-success status
    #[error("Scoreganizer API error: {0}")]
    Api(#[from] ApiFailure),

    /// Connection or protocol failure from the transport
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Operation needs a credential and none is known
    #[error("Not authenticated: log in first")]
    NotAuthenticated,

    /// Success response that could not be understood
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Digest authentication failed: {0}")]
    Digest(String),
}

impl ScoreganizerError {
    /// Failure kind if this is a classified API failure
    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            Self::Api(failure) => Some(failure.kind()),
            _ => None,
        }
    }

    pub fn is_kind(&self, kind: FailureKind) -> bool {
        self.kind() == Some(kind)
    }

    pub fn wait(&self) -> Option<Duration> {
        match self {
            Self::Api(failure) => failure.wait(),
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ScoreganizerError>;

/// Classify a non-success response into a typed failure.
///
/// `elapsed` is the measured round-trip time of the request; it is subtracted from the
/// server's `wait` hint so the caller waits no longer than necessary.
pub fn classify(status: StatusCode, elapsed: Duration, body: &[u8]) -> ApiFailure {
    let (code, wait) = parse_error_body(body).unwrap_or((None, None));
    let code = code.unwrap_or_else(|| status.as_u16().to_string());

    let kind = FailureKind::from_code(&code).unwrap_or(FailureKind::Generic);
    let failure = ApiFailure::new(kind, code, status.as_u16());

    match wait {
        Some(seconds) => failure.with_wait(remaining_wait(seconds, elapsed)),
        None => failure,
    }
}

/// Extract `error` and `wait` from a JSON error body
fn parse_error_body(body: &[u8]) -> Option<(Option<String>, Option<f64>)> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }

    let json: Value = match serde_json::from_slice(body) {
        Ok(json) => json,
        Err(e) => {
            tracing::debug!(error = %e, "Error response body is not JSON");
            return None;
        }
    };
    let object = json.as_object()?;

    let code = object
        .get("error")
        .and_then(|v| v.as_str())
        .map(str::to_string);
    let wait = object.get("wait").and_then(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    });

    Some((code, wait))
}

/// max(0, wait - elapsed)
fn remaining_wait(wait_secs: f64, elapsed: Duration) -> Duration {
    if !wait_secs.is_finite() || wait_secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f64(wait_secs)
        .unwrap_or(Duration::MAX)
        .saturating_sub(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_CODES: [(&str, FailureKind); 10] = [
        ("key_exists", FailureKind::KeyExists),
        ("too_early", FailureKind::TooEarly),
        ("invalid_login_data", FailureKind::InvalidLoginData),
        ("invalid_data", FailureKind::InvalidData),
        ("not_logged_in", FailureKind::NotLoggedIn),
        ("retry", FailureKind::Retry),
        ("not_generated", FailureKind::NotGenerated),
        ("not_generated_yet", FailureKind::NotGeneratedYet),
        ("never_generated", FailureKind::NeverGenerated),
        ("token_too_recent", FailureKind::TokenTooRecent),
    ];

    #[test]
    fn test_mapping_table() {
        for (code, kind) in ALL_CODES {
            let body = format!(r#"{{"error": "{}"}}"#, code);
            let failure = classify(StatusCode::FORBIDDEN, Duration::ZERO, body.as_bytes());
            assert_eq!(failure.kind(), kind, "code {}", code);
            assert_eq!(failure.code(), code);
            assert_eq!(failure.wait(), None);
        }
    }

    #[test]
    fn test_unknown_code_is_generic() {
        let failure = classify(StatusCode::BAD_REQUEST, Duration::ZERO, br#"{"error": "nope"}"#);
        assert_eq!(failure.kind(), FailureKind::Generic);
        assert_eq!(failure.code(), "nope");
        assert_eq!(failure.wait(), None);
    }

    #[test]
    fn test_unknown_code_with_wait_is_generic_wait() {
        let failure = classify(
            StatusCode::BAD_REQUEST,
            Duration::ZERO,
            br#"{"error": "slow_down", "wait": 2}"#,
        );
        assert_eq!(failure.kind(), FailureKind::Generic);
        assert_eq!(failure.wait(), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_empty_body_uses_status_code() {
        let failure = classify(StatusCode::FORBIDDEN, Duration::ZERO, b"");
        assert_eq!(failure.kind(), FailureKind::Generic);
        assert_eq!(failure.code(), "403");
        assert_eq!(failure.status(), 403);
        assert_eq!(failure.wait(), None);
    }

    #[test]
    fn test_non_json_body_uses_status_code() {
        let failure = classify(
            StatusCode::BAD_GATEWAY,
            Duration::ZERO,
            b"<html>Bad Gateway</html>",
        );
        assert_eq!(failure.code(), "502");
        assert_eq!(failure.kind(), FailureKind::Generic);
    }

    #[test]
    fn test_wait_as_string() {
        let failure = classify(
            StatusCode::FORBIDDEN,
            Duration::ZERO,
            br#"{"error": "too_early", "wait": "0.0042069"}"#,
        );
        assert_eq!(failure.kind(), FailureKind::TooEarly);
        let wait = failure.wait().unwrap();
        assert!((wait.as_secs_f64() - 0.0042069).abs() < 1e-6);
    }

    #[test]
    fn test_wait_reduced_by_elapsed() {
        let failure = classify(
            StatusCode::FORBIDDEN,
            Duration::from_millis(250),
            br#"{"error": "not_generated_yet", "wait": 1.0}"#,
        );
        assert_eq!(failure.kind(), FailureKind::NotGeneratedYet);
        assert_eq!(failure.wait(), Some(Duration::from_millis(750)));
    }

    #[test]
    fn test_wait_never_negative() {
        let failure = classify(
            StatusCode::FORBIDDEN,
            Duration::from_secs(5),
            br#"{"error": "too_early", "wait": 1.5}"#,
        );
        assert_eq!(failure.wait(), Some(Duration::ZERO));

        let failure = classify(
            StatusCode::FORBIDDEN,
            Duration::ZERO,
            br#"{"error": "too_early", "wait": -3}"#,
        );
        assert_eq!(failure.wait(), Some(Duration::ZERO));
    }

    #[test]
    fn test_error_messages() {
        let err = ScoreganizerError::from(ApiFailure::new(
            FailureKind::InvalidData,
            "invalid_data",
            403,
        ));
        assert_eq!(err.to_string(), "Scoreganizer API error: invalid_data (HTTP 403)");
        assert!(err.is_kind(FailureKind::InvalidData));

        let err = ScoreganizerError::InvalidResponse("missing token".to_string());
        assert_eq!(err.to_string(), "Invalid response: missing token");
        assert_eq!(err.kind(), None);
    }

    proptest! {
        #[test]
        fn prop_wait_is_clamped_difference(
            wait_ms in 0u64..10_000_000,
            elapsed_ms in 0u64..20_000_000,
        ) {
            let body = format!(r#"{{"error": "too_early", "wait": {}}}"#, wait_ms as f64 / 1000.0);
            let failure = classify(
                StatusCode::FORBIDDEN,
                Duration::from_millis(elapsed_ms),
                body.as_bytes(),
            );
            let expected = (wait_ms as f64 - elapsed_ms as f64).max(0.0) / 1000.0;
            let actual = failure.wait().unwrap().as_secs_f64();
            prop_assert!((actual - expected).abs() < 1e-6);
        }
    }
}
