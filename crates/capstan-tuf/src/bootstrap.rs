#![forbid(unsafe_code)]

use std::path::Path;

use capstan_net::HttpClient;
use tracing::info;
use url::Url;

use crate::error::{TufError, TufResult};
use crate::repo::write_atomic;

/// Trust-on-first-use bootstrap.
///
/// If `<metadata_dir>/root.json` does not exist, fetch `1.root.json` from
/// the metadata base URL and persist it. All later refreshes start from
/// the persisted root.
pub async fn ensure_trust_root(
    client: &HttpClient,
    metadata_url: &Url,
    metadata_dir: &Path,
) -> TufResult<()> {
    let root_path = metadata_dir.join("root.json");
    if tokio::fs::try_exists(&root_path).await? {
        return Ok(());
    }

    let root_url = metadata_url
        .join("1.root.json")
        .map_err(|e| TufError::InvalidUrl(e.to_string()))?;

    info!(url = %root_url, "bootstrapping trust root");
    let bytes = client.get_bytes(root_url, None).await?;

    tokio::fs::create_dir_all(metadata_dir).await?;
    write_atomic(&root_path, &bytes).await?;
    Ok(())
}
