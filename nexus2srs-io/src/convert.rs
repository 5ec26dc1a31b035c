//! Single-file conversion pipeline: open, classify, write.

use crate::error::Stage;
use crate::hdf5::NexusFile;
use crate::srs::{write_srs, SrsFormat};
use crate::tiff::TiffImageSink;
use crate::Result;
use log::info;
use nexus2srs_core::{classify, persist_images, ClassifyOptions, ImageReport, RecordSummary, ScanRecord};
use std::path::{Path, PathBuf};

#[cfg(feature = "serde")]
use serde::Serialize;

/// Options for converting one file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Write detector frames as TIFF files next to the `.dat` file.
    pub write_images: bool,
    /// Replace image files that already exist.
    pub overwrite_images: bool,
    pub format: SrsFormat,
    pub classify: ClassifyOptions,
}

impl ConvertOptions {
    /// Enable or disable TIFF output.
    #[must_use]
    pub fn with_images(mut self, write_images: bool) -> Self {
        self.write_images = write_images;
        self
    }

    /// Replace existing image files.
    #[must_use]
    pub fn with_overwrite_images(mut self, overwrite: bool) -> Self {
        self.overwrite_images = overwrite;
        self
    }

    /// Set the table layout.
    #[must_use]
    pub fn with_format(mut self, format: SrsFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the classification options.
    #[must_use]
    pub fn with_classify(mut self, classify: ClassifyOptions) -> Self {
        self.classify = classify;
        self
    }
}

/// Outcome of a successful conversion.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ConversionSummary {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub record: RecordSummary,
    pub images: ImageReport,
}

/// Output path for `source`.
///
/// Without a destination the source extension is replaced by `.dat`; an existing
/// directory receives `<stem>.dat`.
#[must_use]
pub fn resolve_destination(source: &Path, destination: Option<&Path>) -> PathBuf {
    match destination {
        None => source.with_extension("dat"),
        Some(dir) if dir.is_dir() => {
            let mut name = source.file_stem().unwrap_or(source.as_os_str()).to_os_string();
            name.push(".dat");
            dir.join(name)
        }
        Some(path) => path.to_path_buf(),
    }
}

/// Open and classify `source` without writing anything.
///
/// # Errors
/// Returns a [`crate::Error::Stage`] naming the open stage if the file cannot be opened.
pub fn classify_file(source: &Path, options: &ClassifyOptions) -> Result<(NexusFile, ScanRecord)> {
    let file = NexusFile::open(source).map_err(|e| e.at(source, Stage::Open))?;
    let index = file.build_index();
    let info = file.source_info();
    let record = classify(&index, &file, &info, options);
    Ok((file, record))
}

/// Convert a NeXus file into an SRS `.dat` file.
///
/// Detector frames are written as TIFF files relative to the destination directory when
/// [`ConvertOptions::write_images`] is set. A frame that fails is logged and skipped.
///
/// # Errors
/// Returns a [`crate::Error::Stage`] naming the file and the stage that failed.
pub fn nxs2dat(
    source: impl AsRef<Path>,
    destination: Option<&Path>,
    options: &ConvertOptions,
) -> Result<ConversionSummary> {
    let source = source.as_ref();
    let (file, record) = classify_file(source, &options.classify)?;
    let destination = resolve_destination(source, destination);
    write_srs(&destination, &record, &options.format).map_err(|e| e.at(source, Stage::Write))?;
    info!("{} -> {}", source.display(), destination.display());

    let mut images = ImageReport::default();
    if options.write_images {
        let out_dir = destination
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let mut sink = TiffImageSink::new().with_overwrite(options.overwrite_images);
        images = persist_images(&record.detectors, &file, &mut sink, &out_dir);
        if images.total() > 0 {
            info!(
                "{}: {} images written, {} existing, {} failed",
                source.display(),
                images.written,
                images.existing,
                images.failed
            );
        }
    }

    Ok(ConversionSummary {
        source: source.to_path_buf(),
        destination,
        record: record.summary(),
        images,
    })
}
