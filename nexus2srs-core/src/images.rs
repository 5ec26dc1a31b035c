//! Externalising detector frames through an [`ImageSink`].

use log::{info, warn};
use std::path::Path;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::record::{DetectorImageSet, ImageSource};
use crate::source::{DataSource, ImageSink, Persisted};

/// Counts of persisted frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct ImageReport {
    pub written: usize,
    /// Frames whose file already existed.
    pub existing: usize,
    /// Frames that could not be read or written.
    pub failed: usize,
}

impl ImageReport {
    /// Total number of frames requested.
    #[must_use]
    pub fn total(&self) -> usize {
        self.written + self.existing + self.failed
    }

    /// Add the counts of `other`.
    pub fn merge(&mut self, other: ImageReport) {
        self.written += other.written;
        self.existing += other.existing;
        self.failed += other.failed;
    }
}

/// Persist every stored frame of `detectors` below `out_dir`.
///
/// File names follow each detector's path template, numbered from 1. A frame that cannot
/// be read or written is counted as failed and the remaining frames are still persisted.
pub fn persist_images(
    detectors: &[DetectorImageSet],
    source: &dyn DataSource,
    sink: &mut dyn ImageSink,
    out_dir: &Path,
) -> ImageReport {
    let mut report = ImageReport::default();
    for detector in detectors {
        let ImageSource::Stored { address, .. } = &detector.source else {
            continue;
        };
        let frames = detector.frame_count();
        info!(
            "{}: writing {frames} images as {}",
            detector.name,
            out_dir.join(&detector.template).display()
        );
        for number in 1..=frames {
            let Some(point) = detector.frame_index(number) else {
                continue;
            };
            let path = out_dir.join(detector.file_name(number));
            let outcome = source
                .read_frame(address, &point)
                .and_then(|frame| sink.write_image(frame.view(), &path));
            match outcome {
                Ok(Persisted::Written) => report.written += 1,
                Ok(Persisted::Existing) => report.existing += 1,
                Err(e) => {
                    warn!("{}: image {number} skipped: {e}", detector.name);
                    report.failed += 1;
                }
            }
        }
    }
    report
}
