#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use capstan_install::{
    extract_zip, link_destination, remove_generation, scan_generations, update_symlink,
    InstallError, InstallLayout,
};
use capstan_net::{Headers, HttpClient, TokenSource};
use futures::StreamExt;
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::error::{AgentError, AgentResult};
use crate::index::{entry_for, parse_index, IndexEntry};
use crate::status::{StatusRecord, UpdateStatus};
use crate::systemd::ServiceController;

/// The generations the watcher tracks across applies.
///
/// `current` is authoritatively whatever the binary link resolves into;
/// `previous` is the generation retired by the next successful apply.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GenerationState {
    pub current: Option<String>,
    pub previous: Option<String>,
}

/// Reconstruct the generation state from disk on boot.
///
/// Zero, one, or two matching directories are all valid starting points;
/// anything beyond two is reported and the newest non-current directory
/// is taken as previous.
pub fn discover_generations(
    layout: &InstallLayout,
    bin_link: &Path,
) -> AgentResult<GenerationState> {
    let generations = scan_generations(layout.root())?;
    if generations.len() > 2 {
        warn!(
            count = generations.len(),
            "more than two generations on disk; the oldest will be collected over future applies"
        );
    }

    let current = link_destination(bin_link)
        .and_then(|target| {
            target
                .strip_prefix(layout.root())
                .ok()
                .and_then(|rel| rel.components().next())
                .and_then(|c| c.as_os_str().to_str().map(String::from))
        })
        .filter(|name| generations.iter().any(|g| g == name));

    let previous = if current.is_some() {
        generations
            .iter()
            .rev()
            .find(|g| current.as_deref() != Some(g.as_str()))
            .cloned()
    } else {
        None
    };

    Ok(GenerationState { current, previous })
}

/// Non-credential knobs of the consent watcher.
#[derive(Clone, Debug)]
pub struct WatcherOptions {
    pub layout: InstallLayout,
    pub bin_link: PathBuf,
    pub config_link: PathBuf,
    pub unit: String,
    /// Treat a freshly raised `update_available` as consent.
    pub auto_apply: bool,
    pub interval: Duration,
}

/// Watches the consent mailbox and runs the apply pipeline.
///
/// A single watcher task serializes applies; the pipeline itself is not
/// reentrant.
pub struct ConsentWatcher {
    options: WatcherOptions,
    net: HttpClient,
    tokens: Arc<dyn TokenSource>,
    controller: Arc<dyn ServiceController>,
    status: StatusRecord,
    state: GenerationState,
    update_signal: Arc<Notify>,
    cancel: CancellationToken,
}

impl ConsentWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        options: WatcherOptions,
        net: HttpClient,
        tokens: Arc<dyn TokenSource>,
        controller: Arc<dyn ServiceController>,
        status: StatusRecord,
        state: GenerationState,
        update_signal: Arc<Notify>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            options,
            net,
            tokens,
            controller,
            status,
            state,
            update_signal,
            cancel,
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    fn consented(&self, status: &UpdateStatus) -> bool {
        status.update_requested == 1 || (self.options.auto_apply && status.update_available == 1)
    }

    /// Run the full apply pipeline once. On success the new generation is
    /// active, the retired one is gone, and the mailbox is cleared.
    pub async fn apply_once(&mut self) -> AgentResult<String> {
        let layout = self.options.layout.clone();

        // 1. Read the locally cached trusted index.
        let raw = tokio::fs::read(layout.index_path())
            .await
            .map_err(|e| AgentError::IndexCorrupt(format!("failed to read index: {e}")))?;
        let index = parse_index(&raw)?;
        let entry = entry_for(&index, layout.service())?;
        let version = entry.version.clone();
        info!(version = %version, url = %entry.path, "applying update");

        // 2. Authenticated download into the staging area.
        let staging = layout.staging_zip_path();
        self.download_artifact(&entry, &staging).await?;

        // 3. The artifact must be executable once extracted; assert the
        //    bit on the staged file as well.
        tokio::fs::set_permissions(&staging, permissions_0755())
            .await
            .map_err(|e| AgentError::Staging(format!("failed to set staged artifact mode: {e}")))?;

        // 4. Integrity gate. A mismatching artifact stays in staging for
        //    forensics and never reaches the install root.
        let declared = entry.hashes.sha256.to_lowercase();
        let computed = sha256_file(&staging)
            .await
            .map_err(|e| AgentError::Staging(format!("failed to hash staged artifact: {e}")))?;
        if computed != declared {
            return Err(AgentError::HashMismatch { declared, computed });
        }
        debug!(version = %version, sha256 = %computed, "artifact verified");

        // 5. Promote. Same filesystem, so the rename is atomic.
        let promoted = layout.promoted_zip_path();
        tokio::fs::rename(&staging, &promoted)
            .await
            .map_err(|e| AgentError::Staging(format!("failed to promote archive: {e}")))?;

        // 6. Extract the new generation.
        let dest = layout.generation_dir(&version);
        let archive = promoted.clone();
        run_blocking(move || extract_zip(&archive, &dest))
            .await
            .map_err(|e| AgentError::Extract(InstallError::Io(e)))?
            .map_err(AgentError::Extract)?;
        if let Err(e) = tokio::fs::remove_file(&promoted).await {
            warn!(error = %e, "could not remove promoted archive");
        }

        // 7. Redirect the active links: binary first, then config.
        update_symlink(&layout.generation_bin(&version), &self.options.bin_link)
            .map_err(AgentError::Symlink)?;
        update_symlink(&layout.generation_config(&version), &self.options.config_link)
            .map_err(AgentError::Symlink)?;

        // 8. Reload unit definitions and restart the managed service.
        self.controller.daemon_reload().await?;
        self.controller.restart_unit(&self.options.unit).await?;

        // 9. Retire the pre-apply previous generation. Failure here is
        //    tolerated; the next apply collects the leftover.
        if let Some(retiring) = self.state.previous.take() {
            if retiring != version && self.state.current.as_deref() != Some(retiring.as_str()) {
                info!(version = %retiring, "removing previous generation");
                if let Err(e) = remove_generation(layout.root(), &retiring) {
                    warn!(error = %AgentError::Gc(e), "generation cleanup failed");
                }
            }
        }
        self.state.previous = self.state.current.take();
        self.state.current = Some(version.clone());

        // 10. Clear the mailbox: both flags down, failure counter reset.
        self.status.write(UpdateStatus::default()).await?;

        info!(version = %version, "update applied");
        Ok(version)
    }

    async fn download_artifact(&self, entry: &IndexEntry, staging: &Path) -> AgentResult<()> {
        let url: Url = entry
            .path
            .parse()
            .map_err(|e| AgentError::Download(format!("invalid artifact URL: {e}")))?;
        let token = self
            .tokens
            .bearer_token()
            .await
            .map_err(|e| AgentError::Download(e.to_string()))?;

        let (headers, mut body) = self
            .net
            .stream(url.clone(), Some(Headers::bearer(&token)))
            .await
            .map_err(|e| AgentError::Download(e.to_string()))?;

        // The upstream name is informational only; the staged artifact
        // always lands at the fixed staging path.
        if let Some(name) = headers
            .get("content-disposition")
            .and_then(content_disposition_filename)
        {
            debug!(upstream_name = name, "artifact name declared by server");
        }

        if let Some(parent) = staging.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AgentError::Download(format!("failed to prepare staging dir: {e}")))?;
        }
        let mut file = tokio::fs::File::create(staging)
            .await
            .map_err(|e| AgentError::Download(format!("failed to create staging file: {e}")))?;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| AgentError::Download(e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| AgentError::Download(format!("failed to write staging file: {e}")))?;
        }
        file.flush()
            .await
            .map_err(|e| AgentError::Download(format!("failed to write staging file: {e}")))?;

        debug!(url = %url, staging = %staging.display(), "artifact downloaded");
        Ok(())
    }

    /// Watch the mailbox until cancelled. A failed apply leaves the
    /// consent flag up and bumps the failure counter, so the request is
    /// retried on a later iteration.
    pub async fn run(mut self) {
        loop {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.status.read().await {
                Ok(status) if self.consented(&status) => match self.apply_once().await {
                    Ok(_) => {}
                    Err(e) => {
                        error!(error = %e, "apply pipeline failed");
                        if let Err(e) = self.status.update(|s| s.apply_failures += 1).await {
                            warn!(error = %e, "could not record apply failure");
                        }
                    }
                },
                Ok(_) => {}
                Err(e) => warn!(error = %e, "could not read status record"),
            }
            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = self.update_signal.notified() => {}
                () = tokio::time::sleep(self.options.interval) => {}
            }
        }
        debug!("consent watcher stopped");
    }
}

fn permissions_0755() -> std::fs::Permissions {
    use std::os::unix::fs::PermissionsExt;
    std::fs::Permissions::from_mode(0o755)
}

/// `filename` parameter of a Content-Disposition header value, if any.
fn content_disposition_filename(value: &str) -> Option<&str> {
    value
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
}

/// Streaming sha256 of a file, off the async threads.
async fn sha256_file(path: &Path) -> std::io::Result<String> {
    let path = path.to_path_buf();
    run_blocking(move || -> std::io::Result<String> {
        let mut file = std::fs::File::open(&path)?;
        let mut hasher = Sha256::new();
        std::io::copy(&mut file, &mut hasher)?;
        Ok(hex::encode(hasher.finalize()))
    })
    .await?
}

async fn run_blocking<T: Send + 'static>(
    f: impl FnOnce() -> T + Send + 'static,
) -> std::io::Result<T> {
    tokio::task::spawn_blocking(f)
        .await
        .map_err(std::io::Error::other)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_disposition_plain_filename() {
        assert_eq!(
            content_disposition_filename("attachment; filename=orion.zip"),
            Some("orion.zip")
        );
    }

    #[test]
    fn content_disposition_quoted_filename() {
        assert_eq!(
            content_disposition_filename("attachment; filename=\"orion v2.zip\""),
            Some("orion v2.zip")
        );
    }

    #[test]
    fn content_disposition_without_filename() {
        assert_eq!(content_disposition_filename("inline"), None);
    }

    #[tokio::test]
    async fn sha256_file_matches_known_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload");
        tokio::fs::write(&path, b"hello world").await.unwrap();

        assert_eq!(
            sha256_file(&path).await.unwrap(),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn discovery_with_no_generations_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(tmp.path(), "orion");
        let state = discover_generations(&layout, &tmp.path().join("bin-link")).unwrap();
        assert_eq!(state, GenerationState::default());
    }

    #[test]
    fn discovery_reads_current_from_the_binary_link() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(tmp.path(), "orion");
        for gen in ["v2024.12.01-sha.aaaaaaa", "v2025.01.15-sha.abc1234"] {
            std::fs::create_dir_all(layout.generation_dir(gen).join("bin")).unwrap();
            std::fs::write(layout.generation_bin(gen), b"elf").unwrap();
        }

        let link = tmp.path().join("bin-link");
        update_symlink(&layout.generation_bin("v2025.01.15-sha.abc1234"), &link).unwrap();

        let state = discover_generations(&layout, &link).unwrap();
        assert_eq!(state.current.as_deref(), Some("v2025.01.15-sha.abc1234"));
        assert_eq!(state.previous.as_deref(), Some("v2024.12.01-sha.aaaaaaa"));
    }

    #[test]
    fn discovery_with_one_generation_has_no_previous() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(tmp.path(), "orion");
        let gen = "v2025.01.15-sha.abc1234";
        std::fs::create_dir_all(layout.generation_dir(gen).join("bin")).unwrap();
        std::fs::write(layout.generation_bin(gen), b"elf").unwrap();

        let link = tmp.path().join("bin-link");
        update_symlink(&layout.generation_bin(gen), &link).unwrap();

        let state = discover_generations(&layout, &link).unwrap();
        assert_eq!(state.current.as_deref(), Some(gen));
        assert_eq!(state.previous, None);
    }

    #[test]
    fn discovery_without_a_link_claims_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(tmp.path(), "orion");
        std::fs::create_dir(tmp.path().join("v2025.01.15-sha.abc1234")).unwrap();

        let state = discover_generations(&layout, &tmp.path().join("bin-link")).unwrap();
        assert_eq!(state.current, None);
        assert_eq!(state.previous, None);
    }
}
