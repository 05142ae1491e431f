#![forbid(unsafe_code)]

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::{NetError, NetResult};

/// Source of bearer tokens for the artifact object store.
///
/// Implementations may refresh on every call; callers must not cache the
/// returned token across requests.
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn bearer_token(&self) -> NetResult<String>;
}

/// Fixed token, for tests and deployments with externally rotated files.
#[derive(Clone, Debug)]
pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn bearer_token(&self) -> NetResult<String> {
        Ok(self.token.clone())
    }
}

/// Reads the token material from a file on every call.
///
/// The file is whatever the deployment's credential helper maintains at the
/// configured key path; a service-account OAuth exchange producing the same
/// file is the expected production setup.
#[derive(Clone, Debug)]
pub struct FileTokenSource {
    path: PathBuf,
}

impl FileTokenSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl TokenSource for FileTokenSource {
    async fn bearer_token(&self) -> NetResult<String> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            NetError::Credentials(format!("failed to read {}: {e}", self.path.display()))
        })?;
        let token = raw.trim();
        if token.is_empty() {
            return Err(NetError::Credentials(format!(
                "token file {} is empty",
                self.path.display()
            )));
        }
        Ok(token.to_string())
    }
}
