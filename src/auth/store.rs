// Credential storage with optional file persistence

use std::fs::{self, OpenOptions};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::types::Credential;
use crate::error::Result;

/// Holds the current credential and mirrors it to a plain-text file if configured
pub struct CredentialStore {
    current: RwLock<Option<Credential>>,
    path: Option<PathBuf>,
}

impl CredentialStore {
    /// In-memory store, nothing persisted
    pub fn in_memory() -> Self {
        Self {
            current: RwLock::new(None),
            path: None,
        }
    }

    /// Open a file-backed store, creating the file if it does not exist.
    /// Existing content is never truncated; a non-empty file becomes the initial credential.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .read(true)
            .open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        // Tolerate a trailing newline left by editors
        let restored = contents.trim_end();
        let current = if restored.is_empty() {
            tracing::debug!("No stored credential in {}", path.display());
            None
        } else {
            tracing::info!("Restored credential from {}", path.display());
            Some(Credential::from_raw(restored))
        };

        Ok(Self {
            current: RwLock::new(current),
            path: Some(path),
        })
    }

    pub async fn current(&self) -> Option<Credential> {
        self.current.read().await.clone()
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Persist the credential, then make it current.
    ///
    /// A failed write leaves the current credential untouched.
    pub async fn set(&self, credential: Credential) -> Result<()> {
        let mut current = self.current.write().await;

        if let Some(ref path) = self.path {
            write_atomic(path, credential.as_str())?;
            tracing::debug!("Persisted credential to {}", path.display());
        }

        *current = Some(credential);
        Ok(())
    }
}

/// Write to a sibling temp file and rename it over the target
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    {
        let mut tmp = fs::File::create(&tmp_path)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.sync_all()?;
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&tmp_path, fs::Permissions::from_mode(0o600))?;
    }

    fs::rename(&tmp_path, path)?;
    Ok(())
}
