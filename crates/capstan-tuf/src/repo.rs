#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use capstan_net::HttpClient;

use crate::error::{TufError, TufResult};
use crate::target::{sha256_hex, TargetInfo};

/// The interface the orchestration core consumes.
#[async_trait]
pub trait TufRepo: Send + Sync {
    /// Refresh the metadata chain from the remote repository.
    async fn refresh(&self) -> TufResult<()>;

    /// Declared info for a target path, from the refreshed metadata.
    async fn target_info(&self, path: &str) -> TufResult<TargetInfo>;

    /// Return the cached target content if `local_path` already holds a
    /// hash-matching copy.
    async fn find_cached(&self, info: &TargetInfo, local_path: &Path) -> TufResult<Option<Bytes>>;

    /// Download the target, enforce its declared hash and length, and
    /// persist it to `local_path`.
    async fn download_target(&self, info: &TargetInfo, local_path: &Path) -> TufResult<Bytes>;
}

/// Options for [`HttpTufRepo`].
#[derive(Clone, Debug)]
pub struct RepoOptions {
    /// Base URL of the metadata files (`root.json`, `timestamp.json`, …).
    pub metadata_url: Url,
    /// Base URL of the target files.
    pub targets_url: Url,
    /// Local directory the metadata chain is cached in.
    pub metadata_dir: PathBuf,
    /// Whether remote target names carry the consistent-snapshot hash
    /// prefix (`dir/<sha256>.<name>`).
    pub prefix_targets_with_hash: bool,
}

#[derive(Debug, Deserialize)]
struct SignedEnvelope {
    signed: SignedMetadata,
}

#[derive(Debug, Deserialize)]
struct SignedMetadata {
    version: u64,
    #[serde(default)]
    targets: HashMap<String, TargetMetadata>,
}

#[derive(Debug, Deserialize)]
struct TargetMetadata {
    length: u64,
    hashes: TargetHashes,
}

#[derive(Debug, Deserialize)]
struct TargetHashes {
    sha256: String,
}

/// HTTP-backed repository client.
///
/// Caches `timestamp.json`, `snapshot.json` and `targets.json` under the
/// metadata directory, refuses metadata version rollbacks, and enforces
/// declared hashes and lengths on targets. Requires the trust root to be
/// present (see [`crate::ensure_trust_root`]).
pub struct HttpTufRepo {
    client: HttpClient,
    options: RepoOptions,
    targets: RwLock<Option<HashMap<String, TargetInfo>>>,
}

impl HttpTufRepo {
    pub fn new(client: HttpClient, options: RepoOptions) -> Self {
        Self {
            client,
            options,
            targets: RwLock::new(None),
        }
    }

    fn metadata_path(&self, file: &str) -> PathBuf {
        self.options.metadata_dir.join(file)
    }

    async fn cached_version(&self, file: &str) -> TufResult<Option<u64>> {
        let path = self.metadata_path(file);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match parse_envelope(file, &raw) {
            Ok(envelope) => Ok(Some(envelope.signed.version)),
            Err(e) => {
                // A damaged cache entry must not wedge refreshes; the next
                // write replaces it.
                warn!(file, error = %e, "ignoring unreadable cached metadata");
                Ok(None)
            }
        }
    }

    async fn fetch_metadata_file(&self, file: &str) -> TufResult<SignedEnvelope> {
        let url = self
            .options
            .metadata_url
            .join(file)
            .map_err(|e| TufError::InvalidUrl(e.to_string()))?;
        let bytes = self.client.get_bytes(url, None).await?;
        let envelope = parse_envelope(file, &bytes)?;

        if let Some(cached) = self.cached_version(file).await? {
            if envelope.signed.version < cached {
                return Err(TufError::VersionRollback {
                    file: file.to_string(),
                    cached,
                    remote: envelope.signed.version,
                });
            }
        }

        write_atomic(&self.metadata_path(file), &bytes).await?;
        Ok(envelope)
    }

    fn target_url(&self, info: &TargetInfo) -> TufResult<Url> {
        let name = if self.options.prefix_targets_with_hash {
            info.hash_prefixed_path()
        } else {
            info.path.clone()
        };
        self.options
            .targets_url
            .join(&name)
            .map_err(|e| TufError::InvalidUrl(e.to_string()))
    }
}

#[async_trait]
impl TufRepo for HttpTufRepo {
    async fn refresh(&self) -> TufResult<()> {
        let root = self.metadata_path("root.json");
        if !tokio::fs::try_exists(&root).await? {
            return Err(TufError::TrustRootMissing(root.display().to_string()));
        }

        for file in ["timestamp.json", "snapshot.json"] {
            let envelope = self.fetch_metadata_file(file).await?;
            debug!(file, version = envelope.signed.version, "metadata refreshed");
        }
        let targets_doc = self.fetch_metadata_file("targets.json").await?;
        debug!(
            file = "targets.json",
            version = targets_doc.signed.version,
            targets = targets_doc.signed.targets.len(),
            "metadata refreshed"
        );

        let mut map = HashMap::new();
        for (path, meta) in targets_doc.signed.targets {
            map.insert(
                path.clone(),
                TargetInfo {
                    path,
                    length: meta.length,
                    sha256: meta.hashes.sha256.to_lowercase(),
                },
            );
        }
        *self.targets.write().await = Some(map);
        Ok(())
    }

    async fn target_info(&self, path: &str) -> TufResult<TargetInfo> {
        let targets = self.targets.read().await;
        targets
            .as_ref()
            .and_then(|m| m.get(path))
            .cloned()
            .ok_or_else(|| TufError::TargetNotFound(path.to_string()))
    }

    async fn find_cached(&self, info: &TargetInfo, local_path: &Path) -> TufResult<Option<Bytes>> {
        let raw = match tokio::fs::read(local_path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if info.matches(&raw) {
            Ok(Some(Bytes::from(raw)))
        } else {
            // Stale or damaged cache entry; the caller downloads over it.
            warn!(path = %local_path.display(), "cached target does not match declared hash");
            Ok(None)
        }
    }

    async fn download_target(&self, info: &TargetInfo, local_path: &Path) -> TufResult<Bytes> {
        let url = self.target_url(info)?;
        debug!(target_path = %info.path, url = %url, "downloading target");
        let bytes = self.client.get_bytes(url, None).await?;

        if bytes.len() as u64 != info.length {
            return Err(TufError::LengthMismatch {
                target: info.path.clone(),
                declared: info.length,
                received: bytes.len() as u64,
            });
        }
        let computed = sha256_hex(&bytes);
        if computed != info.sha256 {
            return Err(TufError::HashMismatch {
                target: info.path.clone(),
                declared: info.sha256.clone(),
                computed,
            });
        }

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        write_atomic(local_path, &bytes).await?;
        Ok(bytes)
    }
}

fn parse_envelope(file: &str, raw: &[u8]) -> TufResult<SignedEnvelope> {
    serde_json::from_slice(raw).map_err(|e| TufError::MetadataParse {
        file: file.to_string(),
        reason: e.to_string(),
    })
}

/// Whole-file write via temp + rename. Atomicity, not fsync durability.
pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    tokio::fs::write(&tmp, data).await?;
    tokio::fs::rename(&tmp, path).await
}
