//! NeXus/HDF5 access: single-pass indexing and dataset reads.

use crate::Result;
use chrono::{DateTime, Local, NaiveDateTime};
use hdf5::types::{FixedAscii, FixedUnicode, TypeDescriptor, VarLenAscii, VarLenUnicode};
use hdf5::{Container, Dataset, File, Group, Location};
use log::{debug, warn};
use ndarray::{s, Array2, Axis, Ix2};
use nexus2srs_core::index::join_path;
use nexus2srs_core::{
    AddressIndex, ArrayData, Attributes, DataKind, DataSource, DatasetEntry, GroupEntry,
    IndexBuilder, SourceInfo,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Longest fixed-length string read without truncation.
const FIXED_STRING_CAPACITY: usize = 1024;

/// An open NeXus file. The handle is released when the value is dropped.
pub struct NexusFile {
    file: File,
    path: PathBuf,
}

impl NexusFile {
    /// Open a file read-only.
    ///
    /// # Errors
    /// Returns [`nexus2srs_core::Error::SourceUnreadable`] if the file is missing or is
    /// not an HDF5 container.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| nexus2srs_core::Error::SourceUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    /// Path the file was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File stem and modification time.
    #[must_use]
    pub fn source_info(&self) -> SourceInfo {
        SourceInfo::from_path(&self.path).with_modified(modified_time(&self.path))
    }

    /// Index every group and dataset reachable from the root.
    ///
    /// Members that cannot be opened, such as dangling links, are recorded as unresolved
    /// and the traversal continues. A group reached again through a link to one of its
    /// ancestors is recorded but not descended into.
    #[must_use]
    pub fn build_index(&self) -> AddressIndex {
        let mut walker = Walker::default();
        walker.visit_group(&self.file, "/");
        let index = walker.builder.build();
        let stats = index.stats();
        debug!(
            "{}: indexed {} datasets, {} groups, {} unresolved",
            self.path.display(),
            stats.datasets,
            stats.groups,
            stats.unresolved
        );
        index
    }

    fn dataset(&self, address: &str) -> nexus2srs_core::Result<Dataset> {
        self.file
            .dataset(address)
            .map_err(|e| nexus2srs_core::Error::Unresolvable {
                address: address.to_owned(),
                reason: e.to_string(),
            })
    }
}

impl DataSource for NexusFile {
    fn read_array(&self, address: &str) -> nexus2srs_core::Result<ArrayData> {
        let dataset = self.dataset(address)?;
        read_container(&dataset, address)
    }

    fn read_frame(&self, address: &str, point: &[usize]) -> nexus2srs_core::Result<Array2<f64>> {
        let dataset = self.dataset(address)?;
        let shape = dataset.shape();
        if shape.len() != point.len() + 2 {
            return Err(nexus2srs_core::Error::InvalidFormat(format!(
                "{address}: {} indices for shape {shape:?}",
                point.len()
            )));
        }
        if point.iter().zip(&shape).any(|(&i, &extent)| i >= extent) {
            return Err(nexus2srs_core::Error::InvalidFormat(format!(
                "{address}: index {point:?} outside {shape:?}"
            )));
        }
        let read = match point {
            [] => dataset.read_2d::<f64>(),
            [i] => dataset.read_slice_2d::<f64, _>(s![*i, .., ..]),
            [i, j] => dataset.read_slice_2d::<f64, _>(s![*i, *j, .., ..]),
            _ => dataset.read_dyn::<f64>().and_then(|mut stack| {
                for &i in point {
                    stack = stack.index_axis_move(Axis(0), i);
                }
                stack
                    .into_dimensionality::<Ix2>()
                    .map_err(|e| hdf5::Error::from(e.to_string()))
            }),
        };
        read.map_err(|e| nexus2srs_core::Error::read(address, e))
    }
}

/// Depth-first traversal state.
#[derive(Default)]
struct Walker {
    builder: IndexBuilder,
    objects: ObjectRegistry,
    ancestors: Vec<u64>,
}

impl Walker {
    fn visit_group(&mut self, group: &Group, path: &str) {
        let id = self.objects.id_of(group);
        self.builder
            .add_group(GroupEntry::new(path).with_attrs(read_attributes(group, path)));
        if id.is_some_and(|id| self.ancestors.contains(&id)) {
            debug!("{path}: link to an enclosing group, not descending");
            return;
        }
        let names = match group.member_names() {
            Ok(names) => names,
            Err(e) => {
                warn!("{path}: cannot list members: {e}");
                return;
            }
        };
        if let Some(id) = id {
            self.ancestors.push(id);
        }
        for name in names {
            let child = join_path(path, &name);
            if let Ok(sub) = group.group(&name) {
                self.visit_group(&sub, &child);
                continue;
            }
            match group.dataset(&name) {
                Ok(dataset) => self.visit_dataset(&dataset, &child),
                Err(e) => {
                    warn!("{child}: unresolvable, skipped: {e}");
                    self.builder.add_unresolved(child, e);
                }
            }
        }
        if id.is_some() {
            self.ancestors.pop();
        }
    }

    fn visit_dataset(&mut self, dataset: &Dataset, path: &str) {
        let kind = match dataset.dtype().and_then(|dtype| dtype.to_descriptor()) {
            Ok(descriptor) => data_kind(&descriptor),
            Err(e) => {
                debug!("{path}: unknown datatype: {e}");
                DataKind::Other
            }
        };
        let mut entry = DatasetEntry::new(path, dataset.shape(), kind)
            .with_attrs(read_attributes(dataset, path));
        if let Some(id) = self.objects.id_of(dataset) {
            entry = entry.with_object_id(id);
        }
        self.builder.add_dataset(entry);
    }
}

/// Assigns one number per stored object so aliases can be recognised.
#[derive(Default)]
struct ObjectRegistry {
    ids: HashMap<(u64, String), u64>,
}

impl ObjectRegistry {
    fn id_of(&mut self, location: &Location) -> Option<u64> {
        let info = location.loc_info().ok()?;
        let key = (info.fileno, format!("{:?}", info.token));
        let next = self.ids.len() as u64;
        Some(*self.ids.entry(key).or_insert(next))
    }
}

fn data_kind(descriptor: &TypeDescriptor) -> DataKind {
    match descriptor {
        TypeDescriptor::Integer(_)
        | TypeDescriptor::Unsigned(_)
        | TypeDescriptor::Float(_)
        | TypeDescriptor::Boolean => DataKind::Numeric,
        TypeDescriptor::FixedAscii(_)
        | TypeDescriptor::FixedUnicode(_)
        | TypeDescriptor::VarLenAscii
        | TypeDescriptor::VarLenUnicode => DataKind::Text,
        _ => DataKind::Other,
    }
}

/// Read a dataset or attribute in full, flattened in row-major order.
fn read_container(container: &Container, address: &str) -> nexus2srs_core::Result<ArrayData> {
    let descriptor = container
        .dtype()
        .and_then(|dtype| dtype.to_descriptor())
        .map_err(|e| nexus2srs_core::Error::read(address, e))?;
    let read = match &descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
            container.read_raw::<i64>().map(ArrayData::Int)
        }
        TypeDescriptor::Float(_) => container.read_raw::<f64>().map(ArrayData::Float),
        TypeDescriptor::Boolean => container.read_raw::<bool>().map(ArrayData::Bool),
        TypeDescriptor::VarLenUnicode => container
            .read_raw::<VarLenUnicode>()
            .map(|v| ArrayData::Text(v.iter().map(|s| s.as_str().to_owned()).collect())),
        TypeDescriptor::VarLenAscii => container
            .read_raw::<VarLenAscii>()
            .map(|v| ArrayData::Text(v.iter().map(|s| s.as_str().to_owned()).collect())),
        TypeDescriptor::FixedAscii(_) => container
            .read_raw::<FixedAscii<FIXED_STRING_CAPACITY>>()
            .map(|v| ArrayData::Text(v.iter().map(|s| s.as_str().to_owned()).collect())),
        TypeDescriptor::FixedUnicode(_) => container
            .read_raw::<FixedUnicode<FIXED_STRING_CAPACITY>>()
            .map(|v| ArrayData::Text(v.iter().map(|s| s.as_str().to_owned()).collect())),
        other => {
            return Err(nexus2srs_core::Error::UnsupportedType {
                address: address.to_owned(),
                kind: format!("{other:?}"),
            })
        }
    };
    read.map_err(|e| nexus2srs_core::Error::read(address, e))
}

/// Attributes of a group or dataset that can be read as scalars.
fn read_attributes(location: &Location, path: &str) -> Attributes {
    let mut attrs = Attributes::new();
    let Ok(names) = location.attr_names() else {
        return attrs;
    };
    for name in names {
        let address = format!("{path}@{name}");
        let value = location
            .attr(&name)
            .map_err(|e| nexus2srs_core::Error::read(&address, e))
            .and_then(|attr| read_container(&attr, &address));
        match value.map(ArrayData::into_scalar) {
            Ok(Some(value)) => {
                attrs.insert(name, value);
            }
            Ok(None) => {}
            Err(e) => debug!("skipping attribute: {e}"),
        }
    }
    attrs
}

fn modified_time(path: &Path) -> Option<NaiveDateTime> {
    let modified = std::fs::metadata(path).and_then(|m| m.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).naive_local())
}

/// Open `path`, index it and describe it, in one call.
///
/// # Errors
/// Returns an error if the file cannot be opened.
pub fn open_indexed<P: AsRef<Path>>(path: P) -> Result<(NexusFile, AddressIndex)> {
    let file = NexusFile::open(path)?;
    let index = file.build_index();
    if index.is_empty() && !index.unresolved().is_empty() {
        warn!(
            "{}: no readable objects, {} unresolved",
            file.path().display(),
            index.unresolved().len()
        );
    }
    Ok((file, index))
}
