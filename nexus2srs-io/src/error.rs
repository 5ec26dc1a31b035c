//! I/O error types.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Conversion stage that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Classify,
    Write,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Open => "open",
            Self::Classify => "classify",
            Self::Write => "write",
        })
    }
}

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error.
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// TIFF encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// Worker pool could not be started.
    #[error("thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] nexus2srs_core::Error),

    /// A conversion failed; names the file and the stage.
    #[error("{} failed during {stage}: {source}", path.display())]
    Stage {
        path: PathBuf,
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Tag the error with the file and stage it occurred in.
    pub fn at(self, path: impl Into<PathBuf>, stage: Stage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                path: path.into(),
                stage,
                source: Box::new(other),
            },
        }
    }

    /// Stage of a tagged error.
    #[must_use]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}
