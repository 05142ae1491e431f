#![forbid(unsafe_code)]

use std::sync::Arc;

use capstan_install::InstallLayout;
use capstan_net::{HttpClient, TokenSource};
use capstan_tuf::TufRepo;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::apply::{discover_generations, ConsentWatcher, WatcherOptions};
use crate::config::AgentConfig;
use crate::error::AgentResult;
use crate::poller::MetadataPoller;
use crate::status::StatusRecord;
use crate::systemd::ServiceController;

/// The update agent: one metadata poller and one consent watcher running
/// until the cancellation token fires.
///
/// The two tasks coordinate through the on-disk status record (the
/// external contract with the consent UI) plus an in-process signal so a
/// freshly cached index is acted on without waiting out a consent
/// interval.
pub struct UpdateAgent {
    config: AgentConfig,
    repo: Arc<dyn TufRepo>,
    tokens: Arc<dyn TokenSource>,
    controller: Arc<dyn ServiceController>,
    cancel: CancellationToken,
}

impl UpdateAgent {
    pub fn new(
        config: AgentConfig,
        repo: Arc<dyn TufRepo>,
        tokens: Arc<dyn TokenSource>,
        controller: Arc<dyn ServiceController>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            repo,
            tokens,
            controller,
            cancel,
        }
    }

    /// Prepare the layout and run both loops to completion.
    ///
    /// Returns once both tasks have observed cancellation; an in-flight
    /// pipeline stage finishes before the watcher exits.
    pub async fn run(self) -> AgentResult<()> {
        let layout = InstallLayout::new(
            self.config.install_root.clone(),
            self.config.service_name.clone(),
        );
        layout.ensure_directories()?;

        let net = HttpClient::new(self.config.net.clone());

        let state = discover_generations(&layout, &self.config.bin_link_path)?;
        info!(
            current = state.current.as_deref().unwrap_or("none"),
            previous = state.previous.as_deref().unwrap_or("none"),
            "generation state discovered"
        );

        let status = StatusRecord::new(layout.status_path());
        let update_signal = Arc::new(Notify::new());

        let poller = MetadataPoller::new(
            Arc::clone(&self.repo),
            net.clone(),
            self.config.metadata_url.clone(),
            layout.clone(),
            status.clone(),
            Arc::clone(&update_signal),
            self.config.poll_interval_metadata,
            self.cancel.clone(),
        );

        let watcher = ConsentWatcher::new(
            WatcherOptions {
                layout,
                bin_link: self.config.bin_link_path.clone(),
                config_link: self.config.config_link_path.clone(),
                unit: self.config.managed_unit_name.clone(),
                auto_apply: self.config.auto_apply,
                interval: self.config.poll_interval_consent,
            },
            net.clone(),
            self.tokens,
            self.controller,
            status,
            state,
            update_signal,
            self.cancel.clone(),
        );

        let poller_task = tokio::spawn(poller.run());
        let watcher_task = tokio::spawn(watcher.run());
        let _ = tokio::join!(poller_task, watcher_task);

        info!("update agent stopped");
        Ok(())
    }
}
