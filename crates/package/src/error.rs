use std::path::PathBuf;

/// Errors raised while reading a package or staging its binaries.
#[derive(Debug, thiserror::Error)]
pub enum PackageError {
    /// The archive could not be read as a package.
    #[error("unreadable package: {0}")]
    Archive(String),

    #[error("package entry not found: {0}")]
    EntryNotFound(String),

    #[error("failed to access {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The `.nuspec` manifest is malformed.
    #[error("malformed manifest: {0}")]
    Manifest(String),

    #[error("operation cancelled")]
    Cancelled,
}
