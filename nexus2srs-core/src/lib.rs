//! nexus2srs-core: Classification engine for NeXus scan files.
//!
//! Given an index of every address in a hierarchical file, this crate decides which
//! datasets form the scan columns, which scalars form the metadata, where the scan
//! command, timestamp and header live, and which area-detector frames must be written
//! out as image files. File access and image writing are abstracted behind
//! [`DataSource`] and [`ImageSink`].
//!

pub mod assemble;
pub mod conventions;
pub mod error;
pub mod extract;
pub mod images;
pub mod index;
#[cfg(any(test, feature = "testing"))]
pub mod memory;
pub mod record;
pub mod resolver;
pub mod source;
pub mod template;
pub mod value;

pub use assemble::{assemble, classify, ClassifyOptions};
pub use error::{Error, Result};
pub use extract::{extract_header, find_detectors, format_srs_date, parse_timestamp};
pub use images::{persist_images, ImageReport};
pub use index::{
    AddressIndex, Attributes, DatasetEntry, GroupEntry, IndexBuilder, IndexStats, UnresolvedEntry,
};
pub use record::{
    DetectorImageSet, Header, ImageSource, Metadata, RecordSummary, Rejection, ScanData,
    ScanRecord,
};
pub use resolver::{resolve, Resolution, ResolverKind, CASCADE};
pub use source::{DataSource, ImageSink, Persisted, SourceInfo};
pub use template::render_template;
pub use value::{ArrayData, Column, DataKind, ScalarValue};
