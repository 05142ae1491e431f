#![forbid(unsafe_code)]

use sha2::{Digest, Sha256};

/// Declared properties of one target file, as read from targets metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetInfo {
    /// Repository-relative target path, e.g. `svc/svc-index.json`.
    pub path: String,
    /// Declared byte length.
    pub length: u64,
    /// Declared lowercase-hex sha256 of the target content.
    pub sha256: String,
}

impl TargetInfo {
    /// Whether `bytes` matches the declared length and hash.
    pub fn matches(&self, bytes: &[u8]) -> bool {
        bytes.len() as u64 == self.length && sha256_hex(bytes) == self.sha256
    }

    /// Target name with the consistent-snapshot hash prefix applied to the
    /// final path component: `dir/<sha256>.<name>`.
    pub fn hash_prefixed_path(&self) -> String {
        match self.path.rsplit_once('/') {
            Some((dir, name)) => format!("{dir}/{}.{name}", self.sha256),
            None => format!("{}.{}", self.sha256, self.path),
        }
    }
}

/// Lowercase-hex sha256 of a byte slice.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
