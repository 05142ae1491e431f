#![forbid(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use capstan_install::InstallLayout;
use capstan_net::HttpClient;
use capstan_tuf::{ensure_trust_root, TufRepo};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use url::Url;

use crate::error::{AgentError, AgentResult};
use crate::status::StatusRecord;

/// Result of one poll iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The cached index already matches the remote one; nothing changed.
    CacheHit,
    /// A fresh index was downloaded and `update_available` was raised.
    Downloaded,
}

/// Periodically refreshes trusted metadata and keeps the local index
/// cache current, raising `update_available` exactly when a fresh index
/// first lands.
pub struct MetadataPoller {
    repo: Arc<dyn TufRepo>,
    net: HttpClient,
    metadata_url: Url,
    layout: InstallLayout,
    status: StatusRecord,
    /// Fired on a fresh index so the consent watcher wakes promptly.
    update_signal: Arc<Notify>,
    interval: Duration,
    cancel: CancellationToken,
}

impl MetadataPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: Arc<dyn TufRepo>,
        net: HttpClient,
        metadata_url: Url,
        layout: InstallLayout,
        status: StatusRecord,
        update_signal: Arc<Notify>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            repo,
            net,
            metadata_url,
            layout,
            status,
            update_signal,
            interval,
            cancel,
        }
    }

    /// One iteration: bootstrap if needed, refresh, sync the index cache.
    pub async fn poll_once(&self) -> AgentResult<PollOutcome> {
        ensure_trust_root(&self.net, &self.metadata_url, &self.layout.tmp_dir())
            .await
            .map_err(AgentError::Bootstrap)?;

        self.repo
            .refresh()
            .await
            .map_err(AgentError::MetadataRefresh)?;

        let target_path = self.layout.index_target_path();
        let info = self
            .repo
            .target_info(&target_path)
            .await
            .map_err(AgentError::IndexFetch)?;

        let index_path = self.layout.index_path();
        if self
            .repo
            .find_cached(&info, &index_path)
            .await
            .map_err(AgentError::IndexFetch)?
            .is_some()
        {
            debug!(target_path, "index cache hit");
            return Ok(PollOutcome::CacheHit);
        }

        self.repo
            .download_target(&info, &index_path)
            .await
            .map_err(AgentError::IndexFetch)?;

        self.status.update(|s| s.update_available = 1).await?;
        self.update_signal.notify_one();
        info!(target_path, "new index cached, update available");
        Ok(PollOutcome::Downloaded)
    }

    /// Poll until cancelled. Failures end the iteration, never the loop.
    pub async fn run(self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            if let Err(e) = self.poll_once().await {
                error!(error = %e, "metadata poll failed");
            }
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.interval) => {}
            }
        }
        debug!("metadata poller stopped");
    }
}
