#![forbid(unsafe_code)]

use capstan_install::InstallError;
use capstan_tuf::TufError;
use thiserror::Error;

pub type AgentResult<T> = Result<T, AgentError>;

/// Orchestration errors, one variant per failure kind the agent reports.
///
/// Poller kinds (`Bootstrap`, `MetadataRefresh`, `IndexFetch`) end the
/// current poll iteration. Pipeline kinds abort the apply in progress;
/// only `Gc` and `StatusWrite` are tolerated past their stage.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("trust bootstrap failed: {0}")]
    Bootstrap(#[source] TufError),

    #[error("metadata refresh failed: {0}")]
    MetadataRefresh(#[source] TufError),

    #[error("index fetch failed: {0}")]
    IndexFetch(#[source] TufError),

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("artifact download failed: {0}")]
    Download(String),

    #[error("staged artifact handling failed: {0}")]
    Staging(String),

    #[error("artifact hash mismatch: declared {declared}, computed {computed}")]
    HashMismatch { declared: String, computed: String },

    #[error("extraction failed: {0}")]
    Extract(#[source] InstallError),

    #[error("symlink redirection failed: {0}")]
    Symlink(#[source] InstallError),

    #[error("service restart failed: {0}")]
    Restart(String),

    #[error("generation cleanup failed: {0}")]
    Gc(#[source] InstallError),

    #[error("status record read failed: {0}")]
    StatusRead(String),

    #[error("status record write failed: {0}")]
    StatusWrite(String),

    #[error("install layout error: {0}")]
    Install(#[from] InstallError),
}
