//! Error types for metadata loading, resolution and documentation parsing.
//!
//! Only [`LoadError`] aborts an operation. [`ResolveError`] describes a
//! missing dependency and is always handled at the narrowest scope (one
//! type, one member) by the caller.

use std::path::PathBuf;

/// A structural problem in a binary: bad PE container, bad metadata root,
/// out-of-range heap offset, truncated table or signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct FormatError(pub String);

impl FormatError {
    pub fn new(msg: impl Into<String>) -> Self {
        FormatError(msg.into())
    }
}

/// Fatal errors for a load operation.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The file is not a readable CLI assembly. Distinct from a missing
    /// dependency, which never surfaces as an error.
    #[error("invalid binary format in {}: {}", .path.display(), .reason)]
    InvalidBinary { path: PathBuf, reason: String },

    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("operation cancelled")]
    Cancelled,
}

impl LoadError {
    pub fn invalid_binary(path: impl Into<PathBuf>, err: FormatError) -> Self {
        LoadError::InvalidBinary {
            path: path.into(),
            reason: err.0,
        }
    }
}

/// Failure to resolve a type reference inside the metadata context.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("assembly '{assembly}' is not available (needed for {type_name})")]
    MissingAssembly { assembly: String, type_name: String },

    #[error("type '{type_name}' not found in assembly '{assembly}'")]
    TypeNotFound { assembly: String, type_name: String },

    #[error("unresolvable type reference: {0}")]
    Unresolvable(String),
}

/// Errors reading a documentation file.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("failed to read {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed documentation XML: {0}")]
    Xml(String),
}

/// A method or type signature blob that cannot be decoded. Recoverable: the
/// affected member is skipped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SignatureError {
    #[error("unknown element type {0:#04x}")]
    UnknownElement(u8),

    #[error("unsupported calling convention {0:#04x}")]
    CallingConvention(u8),

    #[error("signature nesting deeper than {0} levels")]
    TooDeep(usize),

    #[error(transparent)]
    Format(#[from] FormatError),
}
