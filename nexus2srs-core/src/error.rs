//! Error types for nexus2srs-core.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for classification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types.
///
/// Only [`Error::SourceUnreadable`] is fatal to a conversion. Every other variant is
/// recovered close to where it is raised: the affected address, column or image is
/// skipped and the rest of the file is still converted.
#[derive(Error, Debug)]
pub enum Error {
    /// The source file cannot be opened or is not a hierarchical container.
    #[error("cannot open source {path}: {reason}")]
    SourceUnreadable { path: String, reason: String },

    /// An address exists in the hierarchy but its object cannot be resolved.
    #[error("unresolvable address {address}: {reason}")]
    Unresolvable { address: String, reason: String },

    /// A dataset or attribute could not be read.
    #[error("failed to read {address}: {reason}")]
    Read { address: String, reason: String },

    /// A dataset is stored with a type that has no SRS representation.
    #[error("unsupported datatype at {address}: {kind}")]
    UnsupportedType { address: String, kind: String },

    /// An image could not be persisted.
    #[error("failed to write image {}: {reason}", path.display())]
    ImageWrite { path: PathBuf, reason: String },

    /// Data has an unexpected layout.
    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

impl Error {
    /// Build a read error for `address`.
    pub fn read(address: impl Into<String>, reason: impl ToString) -> Self {
        Self::Read {
            address: address.into(),
            reason: reason.to_string(),
        }
    }
}
