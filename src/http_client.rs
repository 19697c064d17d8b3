use bytes::Bytes;
use digest_auth::{AuthContext, HttpMethod, WwwAuthenticateHeader};
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER, WWW_AUTHENTICATE};
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::auth::Credential;
use crate::config::{ClientConfig, TransportRetry};
use crate::error::{Result, ScoreganizerError};

/// Header carrying the `username:token` credential
pub const AUTH_HEADER: &str = "X-Scoreganizer-Authorization";

/// Body of an API request
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    /// `application/x-www-form-urlencoded`
    Form(Vec<(String, String)>),
    Multipart(FilePart),
}

/// A file sent as `multipart/form-data`, plus extra text fields
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub bytes: Bytes,
    pub fields: Vec<(String, String)>,
}

/// Request against a path below `/api/`.
///
/// Bodies are kept as plain data so a request can be rebuilt for every transport retry
/// and digest round trip.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self {
            method: Method::POST,
            path: path.into(),
            body: RequestBody::Empty,
        }
    }

    pub fn form<K, V>(mut self, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.body = RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        );
        self
    }

    pub fn multipart(mut self, part: FilePart) -> Self {
        self.body = RequestBody::Multipart(part);
        self
    }
}

/// Response with the body fully read
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    /// Time from sending the final attempt until the body was read
    pub elapsed: Duration,
    pub body: Bytes,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ScoreganizerError::InvalidResponse(format!(
                "failed to parse response body (HTTP {}): {}",
                self.status.as_u16(),
                e
            ))
        })
    }
}

/// HTTP digest credentials and the last challenge seen
struct DigestAuth {
    username: String,
    password: String,
    challenge: Mutex<Option<WwwAuthenticateHeader>>,
}

impl DigestAuth {
    /// Answer the cached challenge for this request, if there is one
    async fn authorization(&self, method: &Method, uri: &str) -> Result<Option<String>> {
        let mut challenge = self.challenge.lock().await;
        let Some(prompt) = challenge.as_mut() else {
            return Ok(None);
        };

        let mut context = AuthContext::new(self.username.as_str(), self.password.as_str(), uri);
        if *method == Method::POST {
            context.method = HttpMethod::POST;
        }

        let answer = prompt
            .respond(&context)
            .map_err(|e| ScoreganizerError::Digest(e.to_string()))?;
        Ok(Some(answer.to_header_string()))
    }

    /// Store a new challenge; false if the header is not a digest challenge
    async fn accept_challenge(&self, headers: &HeaderMap) -> bool {
        let Some(header) = headers.get(WWW_AUTHENTICATE).and_then(|v| v.to_str().ok()) else {
            return false;
        };

        match digest_auth::parse(header) {
            Ok(prompt) => {
                *self.challenge.lock().await = Some(prompt);
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring unusable WWW-Authenticate challenge");
                false
            }
        }
    }
}

/// HTTP transport for the Scoreganizer API.
///
/// Handles:
/// - digest authentication (answers a 401 challenge once per request, then reuses it)
/// - connection errors: exponential backoff up to the configured retries
/// - 429/5xx and timeouts: the same, for idempotent methods only
///
/// Server `wait` hints are not interpreted here.
pub struct ScoreganizerHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    /// `{scheme}://{host}:{port}/api/`
    base_url: Url,

    digest: Option<DigestAuth>,

    retry: TransportRetry,
}

impl ScoreganizerHttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        let base_url = Url::parse(&config.base_url())
            .map_err(|e| ScoreganizerError::Config(format!("invalid base URL: {}", e)))?;

        let digest = match (&config.digest_username, &config.digest_password) {
            (Some(username), Some(password)) => Some(DigestAuth {
                username: username.clone(),
                password: password.clone(),
                challenge: Mutex::new(None),
            }),
            _ => None,
        };

        Ok(Self {
            client,
            base_url,
            digest,
            retry: config.retry.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a request, attaching `credential` as the authorization header.
    ///
    /// Returns every response that survives the transport retries, success or not;
    /// classification happens one layer up.
    pub async fn execute(
        &self,
        request: &ApiRequest,
        credential: Option<&Credential>,
    ) -> Result<ApiResponse> {
        let url = self
            .base_url
            .join(&request.path)
            .map_err(|e| {
                ScoreganizerError::Config(format!("invalid path {}: {}", request.path, e))
            })?;
        let max_retries = self.retry.max_retries;
        let resendable = self.retry.retries_method(&request.method);
        let mut attempt = 0;
        let mut challenge_answered = false;

        tracing::debug!(method = %request.method, url = %url, "Sending HTTP request");

        loop {
            let builder = self.build(request, &url, credential).await?;

            tracing::debug!(
                attempt = attempt + 1,
                max_retries = max_retries,
                "Executing request attempt"
            );

            let started = Instant::now();
            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!(status = %status, "Received HTTP response");

                    if status == StatusCode::UNAUTHORIZED && !challenge_answered {
                        if let Some(ref digest) = self.digest {
                            if digest.accept_challenge(response.headers()).await {
                                tracing::debug!("Answering digest challenge");
                                challenge_answered = true;
                                continue;
                            }
                        }
                    }

                    if resendable && self.retry.retries_status(status) && attempt < max_retries {
                        let delay = self.backoff_delay(attempt, status, response.headers());
                        tracing::warn!(
                            "Received {}, retrying after {}ms (attempt {}/{})",
                            status,
                            delay.as_millis(),
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    let body = response.bytes().await?;
                    return Ok(ApiResponse {
                        status,
                        elapsed: started.elapsed(),
                        body,
                    });
                }

                Err(e) => {
                    let error_kind = if e.is_timeout() {
                        "timeout"
                    } else if e.is_connect() {
                        "connection_failed"
                    } else if e.is_request() {
                        "request_error"
                    } else if e.is_body() {
                        "body_error"
                    } else {
                        "unknown"
                    };

                    // A connect failure never reached the server; a timeout may have
                    let retryable = e.is_connect() || (resendable && e.is_timeout());
                    if retryable && attempt < max_retries {
                        let delay = self.retry.backoff(attempt);
                        tracing::warn!(
                            error_kind = error_kind,
                            error = %e,
                            url = %url,
                            "Request failed, retrying after {}ms (attempt {}/{})",
                            delay.as_millis(),
                            attempt + 1,
                            max_retries
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    tracing::error!(
                        error_kind = error_kind,
                        error = %e,
                        url = %url,
                        total_attempts = attempt + 1,
                        "HTTP request failed"
                    );
                    return Err(e.into());
                }
            }
        }
    }

    async fn build(
        &self,
        request: &ApiRequest,
        url: &Url,
        credential: Option<&Credential>,
    ) -> Result<RequestBuilder> {
        let mut builder = self.client.request(request.method.clone(), url.clone());

        if let Some(credential) = credential {
            builder = builder.header(AUTH_HEADER, credential.as_str());
        }

        if let Some(ref digest) = self.digest {
            if let Some(answer) = digest.authorization(&request.method, url.path()).await? {
                builder = builder.header(AUTHORIZATION, answer);
            }
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(pairs) => builder.form(pairs),
            RequestBody::Multipart(part) => builder.multipart(multipart_form(part)),
        };

        Ok(builder)
    }

    /// Exponential backoff, unless a 413/429/503 carries a `Retry-After` in seconds.
    ///
    /// The server's `Retry-After` is taken as-is, without the backoff cap.
    fn backoff_delay(&self, attempt: u32, status: StatusCode, headers: &HeaderMap) -> Duration {
        let retry_after = headers
            .get(RETRY_AFTER)
            .filter(|_| self.retry.honours_retry_after(status))
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        retry_after.unwrap_or_else(|| self.retry.backoff(attempt))
    }
}

fn multipart_form(part: &FilePart) -> reqwest::multipart::Form {
    let file =
        reqwest::multipart::Part::bytes(part.bytes.to_vec()).file_name(part.file_name.clone());
    part.fields.iter().fold(
        reqwest::multipart::Form::new().part(part.field.clone(), file),
        |form, (name, value)| form.text(name.clone(), value.clone()),
    )
}
