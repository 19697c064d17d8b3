// Score replay uploads

use bytes::Bytes;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::auth::AuthManager;
use crate::error::{FailureKind, Result};
use crate::http_client::{ApiRequest, FilePart};
use crate::pause::Pause;

/// Viennasweeper replay (`.rmv`), also the fallback type
pub const REPLAY_MIME_TYPE: &str = "application/x-viennasweeper";
/// Minesweeper Arbiter replay (`.avf`)
pub const ARBITER_MIME_TYPE: &str = "application/x-minesweeper-arbiter";

pub const DEFAULT_UPLOAD_TRIES: u32 = 10;
/// Fixed pause between attempts after a `retry` response
pub const UPLOAD_RETRY_INTERVAL: Duration = Duration::from_millis(300);

/// Map a file extension to the replay MIME type.
///
/// Matching is exact: `AVF` is not `avf` and falls back to the Viennasweeper type.
pub fn mime_type_for_ext(ext: &str) -> &'static str {
    match ext {
        "avf" => ARBITER_MIME_TYPE,
        _ => REPLAY_MIME_TYPE,
    }
}

#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Sent as-is, overriding any extension
    pub mime_type: Option<String>,
    /// Used instead of the filename's extension
    pub ext: Option<String>,
    /// Total attempts when the server answers `retry`
    pub tries: u32,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            mime_type: None,
            ext: None,
            tries: DEFAULT_UPLOAD_TRIES,
        }
    }
}

impl UploadOptions {
    pub fn mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn ext(mut self, ext: impl Into<String>) -> Self {
        self.ext = Some(ext.into());
        self
    }

    pub fn tries(mut self, tries: u32) -> Self {
        self.tries = tries;
        self
    }

    /// Explicit MIME type, else explicit extension, else the filename's extension
    pub fn resolve_mime_type(&self, filename: &str) -> String {
        if let Some(ref mime_type) = self.mime_type {
            return mime_type.clone();
        }
        let ext = self
            .ext
            .as_deref()
            .or_else(|| file_name(filename).rsplit_once('.').map(|(_, ext)| ext))
            .unwrap_or_default();
        mime_type_for_ext(ext).to_string()
    }
}

/// Last path segment of `filename`
fn file_name(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

/// Score API
#[derive(Clone)]
pub struct Scores {
    auth: Arc<AuthManager>,
    pause: Arc<dyn Pause>,
}

impl Scores {
    pub fn new(auth: Arc<AuthManager>, pause: Arc<dyn Pause>) -> Self {
        Self { auth, pause }
    }

    /// Upload the replay file at `path`
    pub async fn upload_path(
        &self,
        path: impl AsRef<Path>,
        options: &UploadOptions,
    ) -> Result<()> {
        let path = path.as_ref();
        let file = tokio::fs::File::open(path).await?;
        self.upload_file(file, &path.to_string_lossy(), options).await
    }

    /// Upload a replay read from `source`.
    ///
    /// `filename` names the upload and supplies the extension when neither a MIME type
    /// nor an extension is given. Only `retry` responses are retried, up to
    /// `options.tries` attempts in total.
    pub async fn upload_file<R>(
        &self,
        mut source: R,
        filename: &str,
        options: &UploadOptions,
    ) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let mut buf = Vec::new();
        source.read_to_end(&mut buf).await?;

        let mime_type = options.resolve_mime_type(filename);
        let part = FilePart {
            field: "video".to_string(),
            file_name: file_name(filename).to_string(),
            bytes: Bytes::from(buf),
            fields: vec![("mime_type".to_string(), mime_type.clone())],
        };
        let tries = options.tries.max(1);

        tracing::debug!(
            filename = filename,
            mime_type = %mime_type,
            size = part.bytes.len(),
            "Uploading replay"
        );

        let mut done_tries = 0;
        loop {
            done_tries += 1;
            let request = ApiRequest::post("scores/upload").multipart(part.clone());

            match self.auth.send(request).await {
                Ok(_) => {
                    tracing::info!(filename = filename, attempts = done_tries, "Replay uploaded");
                    return Ok(());
                }
                Err(e) if e.is_kind(FailureKind::Retry) && done_tries < tries => {
                    tracing::warn!(
                        filename = filename,
                        "Server asked to retry upload (attempt {}/{})",
                        done_tries,
                        tries
                    );
                    self.pause.pause(UPLOAD_RETRY_INTERVAL).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
