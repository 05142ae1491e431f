#![forbid(unsafe_code)]

use std::collections::HashMap;

use capstan_install::is_generation_name;
use serde::{Deserialize, Serialize};

use crate::error::{AgentError, AgentResult};

/// One service's entry in the trusted index document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Version identifier; doubles as the generation directory name.
    pub version: String,
    /// Informational release timestamp.
    #[serde(rename = "release-date", default)]
    pub release_date: String,
    /// Declared artifact size, informational (verification uses the hash).
    #[serde(default)]
    pub bytes: String,
    /// Absolute URL of the artifact in the object store.
    pub path: String,
    pub hashes: IndexHashes,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexHashes {
    pub sha256: String,
}

/// The index document: service name to entry.
pub type ServiceIndex = HashMap<String, IndexEntry>;

pub fn parse_index(raw: &[u8]) -> AgentResult<ServiceIndex> {
    serde_json::from_slice(raw).map_err(|e| AgentError::IndexCorrupt(e.to_string()))
}

/// The entry for `service`, validated enough to be acted on: the version
/// must be a well-formed generation name, since it becomes a path
/// component under the install root.
pub fn entry_for(index: &ServiceIndex, service: &str) -> AgentResult<IndexEntry> {
    let entry = index
        .get(service)
        .cloned()
        .ok_or_else(|| AgentError::IndexCorrupt(format!("no entry for service {service}")))?;
    if !is_generation_name(&entry.version) {
        return Err(AgentError::IndexCorrupt(format!(
            "version {} is not a valid generation name",
            entry.version
        )));
    }
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    const INDEX: &str = r#"{
        "orion": {
            "version": "v2025.01.15-sha.abc1234",
            "release-date": "2025-01-15T10:00:00Z",
            "bytes": "1048576",
            "path": "https://store.example/orion.zip",
            "hashes": { "sha256": "deadbeef" }
        }
    }"#;

    #[test]
    fn parses_the_wire_format() {
        let index = parse_index(INDEX.as_bytes()).unwrap();
        let entry = entry_for(&index, "orion").unwrap();
        assert_eq!(entry.version, "v2025.01.15-sha.abc1234");
        assert_eq!(entry.release_date, "2025-01-15T10:00:00Z");
        assert_eq!(entry.hashes.sha256, "deadbeef");
    }

    #[test]
    fn missing_service_is_corrupt() {
        let index = parse_index(INDEX.as_bytes()).unwrap();
        assert!(matches!(
            entry_for(&index, "vega"),
            Err(AgentError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn malformed_document_is_corrupt() {
        assert!(matches!(
            parse_index(b"not json"),
            Err(AgentError::IndexCorrupt(_))
        ));
    }

    #[test]
    fn hostile_version_name_is_corrupt() {
        let index: ServiceIndex = serde_json::from_str(
            r#"{"orion":{"version":"../../etc","path":"https://x/","hashes":{"sha256":"aa"}}}"#,
        )
        .unwrap();
        assert!(matches!(
            entry_for(&index, "orion"),
            Err(AgentError::IndexCorrupt(_))
        ));
    }
}
