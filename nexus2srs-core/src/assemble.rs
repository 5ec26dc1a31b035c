//! Classification entry point and record assembly.

use log::{debug, info, warn};

use crate::conventions::DEFAULT_IMAGE_TEMPLATE;
use crate::extract::{extract_header, find_detectors, format_srs_date};
use crate::index::AddressIndex;
use crate::record::{DetectorImageSet, Header, Metadata, ScanRecord};
use crate::resolver::{read_logged, resolve, Claimed, Resolution};
use crate::source::{DataSource, SourceInfo};
use crate::value::{DataKind, ScalarValue};

/// Options for classifying a source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifyOptions {
    /// Highest rank considered by the shape-majority fallback; `None` considers all.
    pub fallback_max_ndim: Option<usize>,
    /// File-name pattern for externalised images (default: `%05d.tif`).
    pub image_template: String,
}

impl Default for ClassifyOptions {
    fn default() -> Self {
        Self {
            fallback_max_ndim: Some(2),
            image_template: DEFAULT_IMAGE_TEMPLATE.to_string(),
        }
    }
}

impl ClassifyOptions {
    /// Set the highest rank considered by the shape-majority fallback.
    #[must_use]
    pub fn with_fallback_max_ndim(mut self, max_ndim: Option<usize>) -> Self {
        self.fallback_max_ndim = max_ndim;
        self
    }

    /// Set the image file-name pattern.
    #[must_use]
    pub fn with_image_template(mut self, template: impl Into<String>) -> Self {
        self.image_template = template.into();
        self
    }
}

/// Classify an indexed source file into scan columns, metadata, header and detectors.
///
/// Never fails: unreadable branches are already recorded in the index, and a file with
/// no scan columns is classified as metadata-only.
#[must_use]
pub fn classify(
    index: &AddressIndex,
    source: &dyn DataSource,
    info: &SourceInfo,
    options: &ClassifyOptions,
) -> ScanRecord {
    let stats = index.stats();
    if stats.unresolved > 0 {
        warn!("{}: {} unresolvable addresses skipped", info.stem, stats.unresolved);
    }
    let resolution = resolve(index, source, options);
    let header = extract_header(index, source, info);
    let detectors = find_detectors(index, source, info, options);
    let record = assemble(index, source, resolution, header, detectors);
    info!(
        "{}: {} columns x {} points ({}), {} metadata, {} detectors",
        info.stem,
        record.scan_data.len(),
        record.scan_data.points(),
        record.resolver.map_or("metadata only", |kind| kind.name()),
        record.metadata.len(),
        record.detectors.len()
    );
    record
}

/// Merge the winning resolution, header and detectors into a [`ScanRecord`].
///
/// Metadata order: `cmd`, `date`, detector path templates, values demoted by the
/// resolver, then every unclaimed size-1 dataset keyed by leaf name. The first value
/// stored under a name is kept and names used by scan columns are removed.
#[must_use]
pub fn assemble(
    index: &AddressIndex,
    source: &dyn DataSource,
    resolution: Option<Resolution>,
    header: Header,
    detectors: Vec<DetectorImageSet>,
) -> ScanRecord {
    let mut metadata = required_metadata(&header, &detectors);
    let (scan_data, claimed, resolver) = match resolution {
        Some(resolution) => {
            metadata.extend(resolution.metadata);
            (
                resolution.scan_data,
                resolution.claimed,
                Some(resolution.kind),
            )
        }
        None => Default::default(),
    };
    collect_scalars(index, source, &claimed, &mut metadata);

    let clashes: Vec<String> = metadata
        .iter()
        .map(|(name, _)| name)
        .filter(|name| scan_data.contains(name))
        .map(str::to_owned)
        .collect();
    for name in clashes {
        debug!("metadata {name} shadowed by scan column");
        metadata.remove(&name);
    }

    ScanRecord {
        scan_data,
        metadata,
        header,
        detectors,
        resolver,
        stats: index.stats(),
    }
}

fn required_metadata(header: &Header, detectors: &[DetectorImageSet]) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("cmd", header.scan_command.clone().unwrap_or_default());
    metadata.insert(
        "date",
        header.date.as_ref().map(format_srs_date).unwrap_or_default(),
    );
    for detector in detectors {
        metadata.insert(detector.metadata_key(), detector.template.clone());
    }
    metadata
}

/// Add every readable size-1 dataset not used as a scan column.
fn collect_scalars(
    index: &AddressIndex,
    source: &dyn DataSource,
    claimed: &Claimed,
    metadata: &mut Metadata,
) {
    let scalars = index
        .datasets()
        .iter()
        .filter(|entry| entry.size == 1 && entry.kind != DataKind::Other)
        .filter(|entry| !claimed.contains(entry));
    for entry in scalars {
        let Some(value) = read_logged(source, entry).and_then(crate::ArrayData::into_scalar)
        else {
            continue;
        };
        let value = match value {
            ScalarValue::Text(text) => ScalarValue::Text(text.trim().to_owned()),
            other => other,
        };
        if !metadata.insert(entry.name(), value) {
            debug!("{}: metadata {} already set", entry.path, entry.name());
        }
    }
}
