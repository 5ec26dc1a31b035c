//! Convention resolvers.
//!
//! Each resolver locates scan columns using one convention and is tried in a fixed
//! priority order; the first one that yields a column wins and the others are not run.
//! Resolvers are plain functions over the index so the cascade is a table, not a
//! trait-object hierarchy.

use log::{debug, warn};
use std::collections::HashSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::assemble::ClassifyOptions;
use crate::conventions::{names_for, Role, MEASUREMENT_CONTAINERS};
use crate::index::{AddressIndex, DatasetEntry};
use crate::record::{Metadata, Rejection, ScanData};
use crate::source::DataSource;
use crate::value::{ArrayData, DataKind};

/// Identifies the convention that produced the scan data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ResolverKind {
    /// Ordered field list stored in `scan_fields`.
    ExplicitFields,
    /// Children of a `measurement` group.
    NamedContainer,
    /// Most frequent array shape.
    ShapeMajority,
}

impl ResolverKind {
    /// Short name used in logs and reports.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ExplicitFields => "explicit-fields",
            Self::NamedContainer => "named-container",
            Self::ShapeMajority => "shape-majority",
        }
    }
}

impl fmt::Display for ResolverKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Datasets already used by a resolver, by address and by stored object.
#[derive(Debug, Clone, Default)]
pub struct Claimed {
    paths: HashSet<String>,
    objects: HashSet<u64>,
}

impl Claimed {
    /// Mark `entry` as used.
    pub fn claim(&mut self, entry: &DatasetEntry) {
        self.paths.insert(entry.path.clone());
        if let Some(id) = entry.object_id {
            self.objects.insert(id);
        }
    }

    /// Returns true if `entry`, or another address of the same object, was used.
    #[must_use]
    pub fn contains(&self, entry: &DatasetEntry) -> bool {
        self.paths.contains(&entry.path)
            || entry.object_id.is_some_and(|id| self.objects.contains(&id))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Output of a resolver.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub kind: ResolverKind,
    pub scan_data: ScanData,
    /// Size-1 candidates demoted from the scan columns.
    pub metadata: Metadata,
    pub claimed: Claimed,
}

impl Resolution {
    fn new(kind: ResolverKind, scan_data: ScanData) -> Self {
        Self {
            kind,
            scan_data,
            metadata: Metadata::new(),
            claimed: Claimed::default(),
        }
    }

    /// Offer `data` read from `entry` as column `name`.
    ///
    /// A column whose length disagrees with the scan is demoted to metadata when it holds a
    /// single value and dropped otherwise.
    fn offer(&mut self, name: &str, entry: &DatasetEntry, data: ArrayData) {
        match self.scan_data.check(name, data.len()) {
            Ok(()) => {
                if self.scan_data.insert(name, data.into_column()).is_ok() {
                    self.claimed.claim(entry);
                }
            }
            Err(Rejection::LengthMismatch { expected, found }) => {
                if let Some(value) = data.into_scalar() {
                    debug!("{}: demoting {name} to metadata", entry.path);
                    self.metadata.insert(name, value);
                    self.claimed.claim(entry);
                } else {
                    warn!(
                        "{}: dropping column {name}, {found} points instead of {expected}",
                        entry.path
                    );
                }
            }
            Err(Rejection::Duplicate) => {
                debug!("{}: column {name} already present", entry.path);
            }
            Err(Rejection::Empty) => {
                debug!("{}: column {name} is empty", entry.path);
            }
        }
    }
}

/// Signature shared by every resolver.
pub type Resolver = fn(&AddressIndex, &dyn DataSource, &ClassifyOptions) -> Option<Resolution>;

/// Resolvers in priority order.
pub const CASCADE: &[(ResolverKind, Resolver)] = &[
    (ResolverKind::ExplicitFields, explicit_fields),
    (ResolverKind::NamedContainer, named_container),
    (ResolverKind::ShapeMajority, shape_majority),
];

/// Run the cascade and return the first resolution with at least one column.
#[must_use]
pub fn resolve(
    index: &AddressIndex,
    source: &dyn DataSource,
    options: &ClassifyOptions,
) -> Option<Resolution> {
    for (kind, resolver) in CASCADE {
        match resolver(index, source, options) {
            Some(resolution) if !resolution.scan_data.is_empty() => {
                debug!(
                    "{kind} resolver found {} columns of {} points",
                    resolution.scan_data.len(),
                    resolution.scan_data.points()
                );
                return Some(resolution);
            }
            _ => debug!("{kind} resolver not applicable"),
        }
    }
    None
}

/// Read a dataset, logging and skipping it on failure.
pub(crate) fn read_logged(source: &dyn DataSource, entry: &DatasetEntry) -> Option<ArrayData> {
    match source.read_array(&entry.path) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("skipping {}: {e}", entry.path);
            None
        }
    }
}

/// Columns named by the `scan_fields` dataset, in declared order.
pub fn explicit_fields(
    index: &AddressIndex,
    source: &dyn DataSource,
    _options: &ClassifyOptions,
) -> Option<Resolution> {
    let fields = names_for(Role::ScanFields)
        .flat_map(|name| index.datasets_named(name))
        .find(|entry| entry.kind == DataKind::Text)?;
    let names = read_logged(source, fields)?.into_strings();
    let names: Vec<&str> = names
        .iter()
        .map(|n| n.trim())
        .filter(|n| !n.is_empty())
        .collect();

    // The first declared array fixes the scan length, so leading scalars are demoted.
    let unclaimed = Claimed::default();
    let scan_data = names
        .iter()
        .filter_map(|name| find_field(index, name, &unclaimed, fields))
        .find(|entry| entry.size > 1)
        .map_or_else(ScanData::new, |entry| ScanData::with_points(entry.size));

    let mut resolution = Resolution::new(ResolverKind::ExplicitFields, scan_data);
    for name in names {
        let Some(entry) = find_field(index, name, &resolution.claimed, fields) else {
            debug!("scan field {name} not found");
            continue;
        };
        if let Some(data) = read_logged(source, entry) {
            resolution.offer(name, entry, data);
        }
    }
    Some(resolution)
}

/// Dataset for a declared field name.
///
/// Arrays are preferred, matched by address, leaf name, then field-name attribute. Any
/// size is accepted when no array matches, so single-point scans still resolve.
fn find_field<'a>(
    index: &'a AddressIndex,
    name: &str,
    claimed: &Claimed,
    fields: &DatasetEntry,
) -> Option<&'a DatasetEntry> {
    let usable = |entry: &&DatasetEntry| {
        entry.kind != DataKind::Other && !claimed.contains(entry) && !entry.same_object(fields)
    };
    if name.starts_with('/') {
        if let Some(entry) = index.dataset(name).filter(usable) {
            return Some(entry);
        }
    }
    let array = |entry: &&DatasetEntry| entry.size > 1;
    index
        .datasets_named(name)
        .filter(usable)
        .find(array)
        .or_else(|| index.datasets_with_field_name(name).filter(usable).find(array))
        .or_else(|| index.datasets_named(name).find(usable))
        .or_else(|| index.datasets_with_field_name(name).find(usable))
}

/// Every dataset directly inside a measurement group, in traversal order.
pub fn named_container(
    index: &AddressIndex,
    source: &dyn DataSource,
    _options: &ClassifyOptions,
) -> Option<Resolution> {
    let group = MEASUREMENT_CONTAINERS
        .iter()
        .flat_map(|name| index.groups_named(name))
        .find(|group| index.child_datasets(group).next().is_some())?;
    debug!("using measurement container {}", group.path);

    let children: Vec<&DatasetEntry> = index
        .child_datasets(group)
        .filter(|entry| entry.kind != DataKind::Other)
        .collect();
    let scan_data = children
        .iter()
        .find(|entry| entry.size > 1)
        .map_or_else(ScanData::new, |entry| ScanData::with_points(entry.size));

    let mut resolution = Resolution::new(ResolverKind::NamedContainer, scan_data);
    for entry in children {
        if resolution.claimed.contains(entry) {
            continue;
        }
        if let Some(data) = read_logged(source, entry) {
            resolution.offer(entry.name(), entry, data);
        }
    }
    Some(resolution)
}

/// Numeric arrays sharing the most frequent shape.
///
/// Column order follows the index, which is not necessarily acquisition order.
pub fn shape_majority(
    index: &AddressIndex,
    source: &dyn DataSource,
    options: &ClassifyOptions,
) -> Option<Resolution> {
    let candidates: Vec<&DatasetEntry> = index
        .datasets()
        .iter()
        .filter(|entry| entry.kind == DataKind::Numeric && entry.size > 1)
        .filter(|entry| options.fallback_max_ndim.map_or(true, |max| entry.ndim() <= max))
        .collect();

    let mut counts: Vec<(&[usize], usize)> = Vec::new();
    for entry in &candidates {
        match counts.iter_mut().find(|(shape, _)| *shape == entry.shape.as_slice()) {
            Some((_, count)) => *count += 1,
            None => counts.push((&entry.shape, 1)),
        }
    }
    let mut best: Option<(&[usize], usize)> = None;
    for (shape, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((shape, count));
        }
    }
    let (shape, count) = best?;
    debug!("most frequent shape {shape:?} shared by {count} datasets");

    let mut resolution = Resolution::new(ResolverKind::ShapeMajority, ScanData::new());
    for entry in candidates.into_iter().filter(|e| e.shape.as_slice() == shape) {
        if resolution.claimed.contains(entry) {
            debug!("{}: alias of a claimed dataset", entry.path);
            continue;
        }
        if let Some(data) = read_logged(source, entry) {
            resolution.offer(entry.name(), entry, data);
        }
    }
    Some(resolution)
}
