#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{InstallError, InstallResult};

/// Repoint `link` at `target`.
///
/// Update = unlink + symlink; a missing link at unlink time is fine. The
/// link does not exist between the two calls; callers restart the managed
/// service right after redirecting, so the window is not observable.
pub fn update_symlink(target: &Path, link: &Path) -> InstallResult<()> {
    match fs::remove_file(link) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(InstallError::Symlink {
                link: link.to_path_buf(),
                source: e,
            })
        }
    }
    std::os::unix::fs::symlink(target, link).map_err(|e| InstallError::Symlink {
        link: link.to_path_buf(),
        source: e,
    })?;
    debug!(link = %link.display(), dest = %target.display(), "symlink updated");
    Ok(())
}

/// Where `link` currently points, if it exists and is a symlink.
pub fn link_destination(link: &Path) -> Option<PathBuf> {
    fs::read_link(link).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_a_fresh_link() {
        let tmp = tempfile::tempdir().unwrap();
        let target = tmp.path().join("payload");
        std::fs::write(&target, b"x").unwrap();
        let link = tmp.path().join("current");

        update_symlink(&target, &link).unwrap();
        assert_eq!(link_destination(&link).unwrap(), target);
    }

    #[test]
    fn replaces_an_existing_link() {
        let tmp = tempfile::tempdir().unwrap();
        let old = tmp.path().join("old");
        let new = tmp.path().join("new");
        std::fs::write(&old, b"x").unwrap();
        std::fs::write(&new, b"y").unwrap();
        let link = tmp.path().join("current");

        update_symlink(&old, &link).unwrap();
        update_symlink(&new, &link).unwrap();
        assert_eq!(link_destination(&link).unwrap(), new);
        assert_eq!(std::fs::read(&link).unwrap(), b"y");
    }

    #[test]
    fn missing_link_reads_as_none() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(link_destination(&tmp.path().join("nope")).is_none());
    }
}
