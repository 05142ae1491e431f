#![forbid(unsafe_code)]

use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::debug;
use zip::ZipArchive;

use crate::error::{InstallError, InstallResult};

/// Unpack `archive` into `dest`, preserving unix modes from the archive.
///
/// Every entry's resolved destination must stay inside `dest`; an entry
/// that would land outside (`..` traversal, absolute name) aborts the
/// whole extraction before anything of it is written.
pub fn extract_zip(archive: &Path, dest: &Path) -> InstallResult<()> {
    let file = fs::File::open(archive)?;
    let mut zip = ZipArchive::new(file)?;

    fs::create_dir_all(dest)?;

    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;

        let rel = entry
            .enclosed_name()
            .ok_or_else(|| InstallError::PathEscape {
                entry: entry.name().to_string(),
            })?;
        let out = dest.join(rel);
        if !out.starts_with(dest) {
            return Err(InstallError::PathEscape {
                entry: entry.name().to_string(),
            });
        }

        if entry.is_dir() {
            fs::create_dir_all(&out)?;
        } else {
            if let Some(parent) = out.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut target = fs::File::create(&out)?;
            io::copy(&mut entry, &mut target)?;
        }

        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&out, fs::Permissions::from_mode(mode))?;
        }
    }

    debug!(archive = %archive.display(), dest = %dest.display(), entries = zip.len(), "archive extracted");
    Ok(())
}
