//! State this client keeps between runs: which name it submitted, the rank it
//! got, and the token that proves it. Plus the lock file that keeps two
//! invocations from sending requests at the same time.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use nyboard_types::api::SubmitResponse;

use crate::error::ClientError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_rank: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl LocalState {
    /// A missing file is an empty state.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text)
                .with_context(|| format!("corrupt state file {}", path.display())),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Write through a temporary file so a crash never leaves half a state.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }

        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(self)?)
            .with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;

        debug!("Saved client state to {}", path.display());
        Ok(())
    }

    pub fn record(&mut self, submitted: &SubmitResponse) {
        self.submitted_name = Some(submitted.entry.name.clone());
        self.submitted_rank = Some(submitted.entry.rank);
        self.token = Some(submitted.token.clone());
    }

    /// The name and rank this client holds, if it has submitted.
    pub fn submission(&self) -> Option<(&str, u64)> {
        match (&self.submitted_name, self.submitted_rank, &self.token) {
            (Some(name), Some(rank), Some(_)) => Some((name, rank)),
            _ => None,
        }
    }
}

/// `$XDG_STATE_HOME/nyboard/state.json`, falling back to `~/.local/state`.
pub fn default_state_path() -> PathBuf {
    let base = std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local/state")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("nyboard").join("state.json")
}

/// Held for the lifetime of one request. While it exists, other invocations
/// sharing the same state file are refused with [`ClientError::Busy`].
///
/// The exclusion is an OS lock on `<state>.lock`, so it ends with the process
/// even when the process is killed. The file itself may stay behind; only the
/// lock on it counts.
#[derive(Debug)]
pub struct RequestGuard {
    path: PathBuf,
    _file: File,
}

impl RequestGuard {
    pub fn acquire(state_path: &Path) -> Result<Self, ClientError> {
        let path = state_path.with_extension("lock");
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .with_context(|| format!("opening {}", path.display()))?;

        match file.try_lock() {
            Ok(()) => {
                debug!("Locked {}", path.display());
                Ok(Self { path, _file: file })
            }
            Err(TryLockError::WouldBlock) => Err(ClientError::Busy(path)),
            Err(TryLockError::Error(e)) => Err(anyhow::Error::new(e)
                .context(format!("locking {}", path.display()))
                .into()),
        }
    }
}

impl Drop for RequestGuard {
    fn drop(&mut self) {
        // Closing the file releases the lock.
        debug!("Unlocking {}", self.path.display());
    }
}
