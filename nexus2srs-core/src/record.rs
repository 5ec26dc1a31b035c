//! The structures handed to the writer: scan columns, metadata, header and detector images.

use chrono::NaiveDateTime;
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::index::IndexStats;
use crate::resolver::ResolverKind;
use crate::template::render_template;
use crate::value::{Column, ScalarValue};

/// Why a column was refused by [`ScanData`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// A column with the same name is already present.
    Duplicate,
    /// The column length differs from the established number of points.
    LengthMismatch { expected: usize, found: usize },
    /// The column has no points.
    Empty,
}

/// Ordered scan columns of equal length.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanData {
    columns: Vec<(String, Column)>,
    positions: HashMap<String, usize>,
    points: Option<usize>,
}

impl ScanData {
    /// Create empty scan data. The first accepted column fixes the number of points.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create empty scan data with the number of points fixed up front.
    #[must_use]
    pub fn with_points(points: usize) -> Self {
        Self {
            points: Some(points),
            ..Self::default()
        }
    }

    /// Number of scan points; zero until a column is accepted or a length is preset.
    #[must_use]
    pub fn points(&self) -> usize {
        self.points.unwrap_or(0)
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true if no column was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Returns true if a column called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    /// Check whether a column of `len` points could be inserted as `name`.
    ///
    /// # Errors
    /// Returns the [`Rejection`] that [`ScanData::insert`] would report.
    pub fn check(&self, name: &str, len: usize) -> Result<(), Rejection> {
        if len == 0 {
            return Err(Rejection::Empty);
        }
        if self.contains(name) {
            return Err(Rejection::Duplicate);
        }
        match self.points {
            Some(expected) if expected != len => Err(Rejection::LengthMismatch {
                expected,
                found: len,
            }),
            _ => Ok(()),
        }
    }

    /// Append a column, keeping every column the same length.
    ///
    /// # Errors
    /// Returns a [`Rejection`] and leaves the scan data unchanged if the column is empty,
    /// its name is taken or its length differs from the established number of points.
    pub fn insert(&mut self, name: impl Into<String>, column: Column) -> Result<(), Rejection> {
        let name = name.into();
        self.check(&name, column.len())?;
        self.points = Some(column.len());
        self.positions.insert(name.clone(), self.columns.len());
        self.columns.push((name, column));
        Ok(())
    }

    /// Column called `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Column> {
        self.positions.get(name).map(|&i| &self.columns[i].1)
    }

    /// Column names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Columns in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.columns.iter().map(|(name, column)| (name.as_str(), column))
    }
}

/// Ordered name to scalar mapping. The first value stored under a name is kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    entries: Vec<(String, ScalarValue)>,
    positions: HashMap<String, usize>,
}

impl Metadata {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `name` unless the name is taken. Returns true if stored.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) -> bool {
        let name = name.into();
        if self.positions.contains_key(&name) {
            return false;
        }
        self.positions.insert(name.clone(), self.entries.len());
        self.entries.push((name, value.into()));
        true
    }

    /// Copy every entry of `other` that does not collide with an existing name.
    pub fn extend(&mut self, other: Metadata) {
        for (name, value) in other.entries {
            self.insert(name, value);
        }
    }

    /// Remove the entry called `name`, keeping the order of the rest.
    pub fn remove(&mut self, name: &str) -> Option<ScalarValue> {
        let position = self.positions.remove(name)?;
        let (_, value) = self.entries.remove(position);
        for slot in self.positions.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }
        Some(value)
    }

    /// Returns true if an entry called `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.positions.contains_key(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.positions.get(name).map(|&i| &self.entries[i].1)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.entries.iter().map(|(name, value)| (name.as_str(), value))
    }
}

/// Scan provenance found by well-known name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    /// Command that started the scan.
    pub scan_command: Option<String>,
    /// Start time exactly as stored.
    pub start_time: Option<String>,
    /// Pre-rendered header lines.
    pub scan_header: Option<String>,
    /// Run number.
    pub scan_number: Option<i64>,
    /// Parsed start time, or the source modification time when none is stored.
    pub date: Option<NaiveDateTime>,
}

/// Where the frames of a detector come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Frames stored in the source at `address`; one frame per index over `scan_shape`.
    Stored {
        address: String,
        scan_shape: Vec<usize>,
    },
    /// Files written during acquisition; nothing is persisted by the converter.
    Existing { count: usize },
}

/// One area detector and the file names its frames are externalised to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectorImageSet {
    /// Logical detector name, e.g. `pil3_100k`.
    pub name: String,
    /// Path template relative to the output directory, e.g. `1040323-pil3_100k-files/%05d.tif`.
    pub template: String,
    pub source: ImageSource,
}

impl DetectorImageSet {
    /// Metadata key carrying the template.
    #[must_use]
    pub fn metadata_key(&self) -> String {
        crate::conventions::path_template_key(&self.name)
    }

    /// Number of frames, one per scan point.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        match &self.source {
            ImageSource::Stored { scan_shape, .. } => scan_shape.iter().product(),
            ImageSource::Existing { count } => *count,
        }
    }

    /// Returns true if frames must be written by the converter.
    #[must_use]
    pub fn is_stored(&self) -> bool {
        matches!(self.source, ImageSource::Stored { .. })
    }

    /// Index into the leading axes of the stored frame `number` (1-based, row-major).
    #[must_use]
    pub fn frame_index(&self, number: usize) -> Option<Vec<usize>> {
        let ImageSource::Stored { scan_shape, .. } = &self.source else {
            return None;
        };
        if number == 0 || number > self.frame_count() {
            return None;
        }
        let mut rest = number - 1;
        let mut index = vec![0; scan_shape.len()];
        for (slot, &extent) in index.iter_mut().zip(scan_shape).rev() {
            *slot = rest % extent;
            rest /= extent;
        }
        Some(index)
    }

    /// Relative file name of frame `number` (1-based).
    #[must_use]
    pub fn file_name(&self, number: usize) -> String {
        render_template(&self.template, number)
    }
}

/// Everything the writer needs for one source file.
#[derive(Debug, Clone, Default)]
pub struct ScanRecord {
    pub scan_data: ScanData,
    pub metadata: Metadata,
    pub header: Header,
    pub detectors: Vec<DetectorImageSet>,
    /// Resolver that produced the scan data; `None` for metadata-only files.
    pub resolver: Option<ResolverKind>,
    pub stats: IndexStats,
}

impl ScanRecord {
    /// Condensed description for reporting.
    #[must_use]
    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            resolver: self.resolver,
            points: self.scan_data.points(),
            columns: self.scan_data.names().map(str::to_owned).collect(),
            metadata: self.metadata.len(),
            detectors: self.detectors.iter().map(|d| d.name.clone()).collect(),
            scan_command: self.header.scan_command.clone(),
            stats: self.stats,
        }
    }
}

/// Classification outcome of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RecordSummary {
    pub resolver: Option<ResolverKind>,
    pub points: usize,
    pub columns: Vec<String>,
    pub metadata: usize,
    pub detectors: Vec<String>,
    pub scan_command: Option<String>,
    pub stats: IndexStats,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_data_length_invariant() {
        let mut scan = ScanData::new();
        assert!(scan.insert("eta", Column::Numeric(vec![1.0, 2.0, 3.0])).is_ok());
        assert_eq!(scan.points(), 3);
        assert_eq!(
            scan.insert("sum", Column::Numeric(vec![1.0])),
            Err(Rejection::LengthMismatch {
                expected: 3,
                found: 1
            })
        );
        assert_eq!(
            scan.insert("eta", Column::Numeric(vec![0.0; 3])),
            Err(Rejection::Duplicate)
        );
        assert_eq!(scan.insert("x", Column::Text(Vec::new())), Err(Rejection::Empty));
        assert_eq!(scan.names().collect::<Vec<_>>(), vec!["eta"]);
    }

    #[test]
    fn test_preset_points() {
        let mut scan = ScanData::with_points(2);
        assert!(scan.insert("a", Column::Numeric(vec![1.0, 2.0, 3.0])).is_err());
        assert!(scan.insert("b", Column::Text(vec!["x".into(), "y".into()])).is_ok());
        assert_eq!(scan.points(), 2);
    }

    #[test]
    fn test_metadata_first_wins() {
        let mut meta = Metadata::new();
        assert!(meta.insert("temperature", 300.0));
        assert!(!meta.insert("temperature", 10.0));
        assert!(meta.insert("cmd", "scan eta 1 2 0.1"));
        assert_eq!(meta.get("temperature"), Some(&ScalarValue::Float(300.0)));
        assert_eq!(meta.remove("temperature"), Some(ScalarValue::Float(300.0)));
        assert_eq!(meta.iter().map(|(n, _)| n).collect::<Vec<_>>(), vec!["cmd"]);
        assert_eq!(meta.get("cmd").and_then(ScalarValue::as_str), Some("scan eta 1 2 0.1"));
    }

    #[test]
    fn test_frame_numbering() {
        let detector = DetectorImageSet {
            name: "pil".into(),
            template: "1-pil-files/%05d.tif".into(),
            source: ImageSource::Stored {
                address: "/entry/instrument/pil/data".into(),
                scan_shape: vec![2, 3],
            },
        };
        assert_eq!(detector.frame_count(), 6);
        assert_eq!(detector.frame_index(1), Some(vec![0, 0]));
        assert_eq!(detector.frame_index(4), Some(vec![1, 0]));
        assert_eq!(detector.frame_index(6), Some(vec![1, 2]));
        assert_eq!(detector.frame_index(7), None);
        assert_eq!(detector.file_name(4), "1-pil-files/00004.tif");
        assert_eq!(detector.metadata_key(), "pil_path_template");
    }
}
