#![forbid(unsafe_code)]

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};

/// The two-flag mailbox shared with the external consent UI, plus a
/// failure counter the UI may ignore.
///
/// Fields are integers, not booleans, for compatibility with the existing
/// external consumer. Absent fields read as 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    #[serde(default)]
    pub update_available: u8,
    #[serde(default)]
    pub update_requested: u8,
    /// Failed applies since the last successful one.
    #[serde(default)]
    pub apply_failures: u64,
}

/// Whole-file JSON record on disk.
///
/// Reads and writes are whole-file operations; writes go through a
/// temp + rename so the external reader never observes a torn record.
/// There is no locking: last writer wins, and the UI re-issues a consent
/// that races the agent's clear.
#[derive(Clone, Debug)]
pub struct StatusRecord {
    path: PathBuf,
}

impl StatusRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Read the record. A missing file is an all-zero record (initial
    /// boot); a present-but-unparsable file is an error the caller logs
    /// and survives.
    pub async fn read(&self) -> AgentResult<UpdateStatus> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(UpdateStatus::default())
            }
            Err(e) => return Err(AgentError::StatusRead(e.to_string())),
        };
        serde_json::from_slice(&raw).map_err(|e| AgentError::StatusRead(e.to_string()))
    }

    /// Replace the record.
    pub async fn write(&self, status: UpdateStatus) -> AgentResult<()> {
        let body = serde_json::to_vec_pretty(&status)
            .map_err(|e| AgentError::StatusWrite(e.to_string()))?;

        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, &body)
            .await
            .map_err(|e| AgentError::StatusWrite(e.to_string()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| AgentError::StatusWrite(e.to_string()))
    }

    /// Read-modify-write, preserving the fields `f` leaves untouched.
    pub async fn update(&self, f: impl FnOnce(&mut UpdateStatus)) -> AgentResult<UpdateStatus> {
        let mut status = self.read().await?;
        f(&mut status);
        self.write(status).await?;
        Ok(status)
    }
}
