//! Capabilities the classification engine needs from the outside world.
//!
//! Opening the hierarchical file and persisting images are I/O concerns; the engine only
//! sees these traits, so it can run over an HDF5 file or an in-memory fixture alike.

use chrono::NaiveDateTime;
use ndarray::{Array2, ArrayView2};
use std::path::Path;

use crate::Result;

/// Read access to datasets by absolute address.
pub trait DataSource {
    /// Read a whole dataset, flattened in row-major order.
    ///
    /// # Errors
    /// Returns an error if the address cannot be opened or its type is unsupported.
    fn read_array(&self, address: &str) -> Result<crate::ArrayData>;

    /// Read one 2-D frame of a dataset with `point.len() + 2` dimensions.
    ///
    /// `point` indexes the leading (scan) axes; an empty `point` reads a 2-D dataset whole.
    ///
    /// # Errors
    /// Returns an error if the address cannot be read or the index is out of range.
    fn read_frame(&self, address: &str, point: &[usize]) -> Result<Array2<f64>>;
}

/// Outcome of a single image persist request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Persisted {
    /// The image was written.
    Written,
    /// A file already existed at the destination and was kept.
    Existing,
}

/// Persists 2-D images to files.
pub trait ImageSink {
    /// Write `image` to `path`, creating parent directories as needed.
    ///
    /// # Errors
    /// Returns [`crate::Error::ImageWrite`] if the image cannot be written.
    fn write_image(&mut self, image: ArrayView2<'_, f64>, path: &Path) -> Result<Persisted>;
}

/// Facts about the source file that are not stored inside it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceInfo {
    /// File name without extension, e.g. `1040323`.
    pub stem: String,
    /// Last modification time, used when the file carries no start time.
    pub modified: Option<NaiveDateTime>,
}

impl SourceInfo {
    /// Describe a source file from its path alone.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            stem,
            modified: None,
        }
    }

    /// Set the modification time.
    #[must_use]
    pub fn with_modified(mut self, modified: Option<NaiveDateTime>) -> Self {
        self.modified = modified;
        self
    }

    /// First run of at least four digits in the file stem.
    #[must_use]
    pub fn stem_number(&self) -> Option<i64> {
        let bytes = self.stem.as_bytes();
        let mut start = None;
        for (i, b) in bytes.iter().chain(std::iter::once(&b'_')).enumerate() {
            match (b.is_ascii_digit(), start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if i - s >= 4 {
                        return self.stem[s..i].parse().ok();
                    }
                    start = None;
                }
                _ => {}
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stem_number() {
        let info = |stem: &str| SourceInfo {
            stem: stem.to_string(),
            modified: None,
        };
        assert_eq!(info("1040323").stem_number(), Some(1_040_323));
        assert_eq!(info("i10-759799").stem_number(), Some(759_799));
        assert_eq!(info("i16-12-345678_new").stem_number(), Some(345_678));
        assert_eq!(info("scan").stem_number(), None);
    }

    #[test]
    fn test_from_path() {
        let info = SourceInfo::from_path(Path::new("/data/i16/815893.nxs"));
        assert_eq!(info.stem, "815893");
        assert!(info.modified.is_none());
    }
}
