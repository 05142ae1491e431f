#![forbid(unsafe_code)]

use std::path::PathBuf;

use thiserror::Error;

pub type InstallResult<T> = Result<T, InstallError>;

/// Installation layout errors.
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("archive entry escapes the destination: {entry}")]
    PathEscape { entry: String },

    #[error("failed to update symlink {link}: {source}")]
    Symlink {
        link: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
