//! Header fields and area detectors, found by well-known name wherever they are stored.

use chrono::{DateTime, NaiveDateTime};
use log::debug;

use crate::assemble::ClassifyOptions;
use crate::conventions::{
    names_for, Role, DETECTOR_CLASSES, DETECTOR_DATA_FIELDS, FALLBACK_DETECTOR_NAME,
    IMAGE_INTERPRETATION,
};
use crate::index::{leaf_name, AddressIndex, DatasetEntry};
use crate::record::{DetectorImageSet, Header, ImageSource};
use crate::resolver::{read_logged, Claimed};
use crate::source::{DataSource, SourceInfo};
use crate::value::DataKind;

/// Date layout used in SRS headers and the `date` metadata entry.
pub const SRS_DATE_FORMAT: &str = "%a %b %d %H:%M:%S %Y";

const ZONED_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];
const NAIVE_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Strings stored in the first readable dataset registered for `role`.
fn read_role(index: &AddressIndex, source: &dyn DataSource, role: Role) -> Option<Vec<String>> {
    names_for(role)
        .flat_map(|name| index.datasets_named(name))
        .filter(|entry| entry.kind != DataKind::Other)
        .find_map(|entry| read_logged(source, entry))
        .map(crate::ArrayData::into_strings)
}

/// Scan command, start time, header lines and run number.
#[must_use]
pub fn extract_header(index: &AddressIndex, source: &dyn DataSource, info: &SourceInfo) -> Header {
    let first = |role| {
        read_role(index, source, role)
            .and_then(|values| values.into_iter().next())
            .map(|value| value.trim().to_owned())
    };
    let scan_command = first(Role::ScanCommand);
    let start_time = first(Role::StartTime);
    let scan_header = read_role(index, source, Role::ScanHeader)
        .map(|lines| lines.join("\n"))
        .filter(|text| !text.trim().is_empty());
    let scan_number = names_for(Role::ScanNumber)
        .flat_map(|name| index.datasets_named(name))
        .find_map(|entry| read_logged(source, entry))
        .and_then(|data| data.first())
        .and_then(|value| value.as_i64())
        .or_else(|| info.stem_number());

    let date = match start_time.as_deref().map(parse_timestamp) {
        Some(Some(date)) => Some(date),
        Some(None) => {
            debug!("unrecognised start time, using file modification time");
            info.modified
        }
        None => info.modified,
    };

    Header {
        scan_command,
        start_time,
        scan_header,
        scan_number,
        date,
    }
}

/// Parse an ISO-8601 timestamp, keeping the local wall-clock time when an offset is given.
#[must_use]
pub fn parse_timestamp(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.naive_local());
    }
    ZONED_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(text, format).ok())
        .map(|date| date.naive_local())
        .or_else(|| {
            NAIVE_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        })
}

/// Render a date the way SRS headers do, e.g. `Tue Mar 05 14:02:11 2024`.
#[must_use]
pub fn format_srs_date(date: &NaiveDateTime) -> String {
    date.format(SRS_DATE_FORMAT).to_string()
}

/// Returns true if `entry` holds one image per scan point.
fn is_image_stack(entry: &DatasetEntry) -> bool {
    if entry.kind != DataKind::Numeric {
        return false;
    }
    match entry.ndim() {
        0 | 1 => false,
        2 => entry.attr_str(IMAGE_INTERPRETATION.0) == Some(IMAGE_INTERPRETATION.1),
        _ => true,
    }
}

/// Area detectors whose images are externalised.
///
/// Detectors already written during acquisition (an `image_data` list) come first, then
/// every image stack stored in a detector group. A detector name is used once.
#[must_use]
pub fn find_detectors(
    index: &AddressIndex,
    source: &dyn DataSource,
    info: &SourceInfo,
    options: &ClassifyOptions,
) -> Vec<DetectorImageSet> {
    let mut found: Vec<DetectorImageSet> = existing_images(index, source, options)
        .into_iter()
        .collect();

    let mut seen = Claimed::default();
    let detector_groups = index.groups().iter().filter(|group| {
        group
            .nx_class()
            .is_some_and(|class| DETECTOR_CLASSES.contains(&class))
    });
    for group in detector_groups {
        let stacks = index
            .child_datasets(group)
            .filter(|entry| DETECTOR_DATA_FIELDS.contains(&entry.name()))
            .filter(|entry| is_image_stack(entry));
        for entry in stacks {
            let name = group.name();
            if seen.contains(entry) || found.iter().any(|d| d.name == name) {
                debug!("{}: detector {name} already found", entry.path);
                continue;
            }
            seen.claim(entry);
            found.push(DetectorImageSet {
                name: name.to_owned(),
                template: format!("{}-{name}-files/{}", info.stem, options.image_template),
                source: ImageSource::Stored {
                    address: entry.path.clone(),
                    scan_shape: entry.shape[..entry.ndim() - 2].to_vec(),
                },
            });
        }
    }
    found
}

/// Detector described by a list of image files written during acquisition.
fn existing_images(
    index: &AddressIndex,
    source: &dyn DataSource,
    options: &ClassifyOptions,
) -> Option<DetectorImageSet> {
    let entry = names_for(Role::ImagePaths)
        .flat_map(|name| index.datasets_named(name))
        .find(|entry| entry.kind == DataKind::Text)?;
    let paths = read_logged(source, entry)?.into_strings();
    let paths: Vec<&str> = paths
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect();
    let first = paths.first()?;

    // e.g. 815893-pilatus3_100k-files/00001.tif
    let directory = first.rsplit_once('/').map_or("", |(dir, _)| dir);
    let name = leaf_name(directory)
        .split('-')
        .nth(1)
        .filter(|token| !token.is_empty())
        .unwrap_or(FALLBACK_DETECTOR_NAME);
    let template = if directory.is_empty() {
        options.image_template.clone()
    } else {
        format!("{directory}/{}", options.image_template)
    };
    Some(DetectorImageSet {
        name: name.to_owned(),
        template,
        source: ImageSource::Existing { count: paths.len() },
    })
}
