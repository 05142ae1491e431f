#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::InstallResult;

/// Path schema of one managed service's install root.
///
/// All path construction goes through here; nothing else in the workspace
/// joins install-root paths by hand.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallLayout {
    root: PathBuf,
    service: String,
}

impl InstallLayout {
    pub fn new(root: impl Into<PathBuf>, service: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            service: service.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// Metadata cache and download staging area.
    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    /// Locally cached trusted index document.
    pub fn index_path(&self) -> PathBuf {
        self.data_dir()
            .join(&self.service)
            .join(format!("{}-index.json", self.service))
    }

    /// Repository-relative target path of the index.
    pub fn index_target_path(&self) -> String {
        format!("{s}/{s}-index.json", s = self.service)
    }

    /// Staging location of an in-flight artifact download.
    pub fn staging_zip_path(&self) -> PathBuf {
        self.tmp_dir().join(format!("{}.zip", self.service))
    }

    /// Location a verified artifact is promoted to before extraction.
    pub fn promoted_zip_path(&self) -> PathBuf {
        self.root.join(format!("{}.zip", self.service))
    }

    pub fn status_path(&self) -> PathBuf {
        self.root.join("update_status.json")
    }

    pub fn generation_dir(&self, version: &str) -> PathBuf {
        self.root.join(version)
    }

    pub fn generation_bin(&self, version: &str) -> PathBuf {
        self.generation_dir(version).join("bin").join(&self.service)
    }

    pub fn generation_config(&self, version: &str) -> PathBuf {
        self.generation_dir(version)
            .join("config")
            .join(format!("{}.yml", self.service))
    }

    /// Create the directories the agent expects on boot.
    pub fn ensure_directories(&self) -> InstallResult<()> {
        fs::create_dir_all(self.tmp_dir())?;
        fs::create_dir_all(self.data_dir().join(&self.service))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_follow_the_layout() {
        let layout = InstallLayout::new("/srv/orion", "orion");
        assert_eq!(layout.tmp_dir(), PathBuf::from("/srv/orion/tmp"));
        assert_eq!(
            layout.index_path(),
            PathBuf::from("/srv/orion/data/orion/orion-index.json")
        );
        assert_eq!(layout.index_target_path(), "orion/orion-index.json");
        assert_eq!(
            layout.staging_zip_path(),
            PathBuf::from("/srv/orion/tmp/orion.zip")
        );
        assert_eq!(
            layout.promoted_zip_path(),
            PathBuf::from("/srv/orion/orion.zip")
        );
        assert_eq!(
            layout.generation_bin("v2025.01.15-sha.abc1234"),
            PathBuf::from("/srv/orion/v2025.01.15-sha.abc1234/bin/orion")
        );
        assert_eq!(
            layout.generation_config("v2025.01.15-sha.abc1234"),
            PathBuf::from("/srv/orion/v2025.01.15-sha.abc1234/config/orion.yml")
        );
    }

    #[test]
    fn ensure_directories_is_idempotent() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = InstallLayout::new(tmp.path(), "orion");
        layout.ensure_directories().unwrap();
        layout.ensure_directories().unwrap();
        assert!(layout.tmp_dir().is_dir());
        assert!(layout.data_dir().join("orion").is_dir());
    }
}
