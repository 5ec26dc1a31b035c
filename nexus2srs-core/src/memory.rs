//! In-memory [`DataSource`] and [`ImageSink`] for fixtures and tests.
//!
//! A [`MemoryFile`] is built with chained calls; missing parent groups are created on
//! the fly, in the order their first member was added.

use ndarray::{Array2, ArrayView2};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::index::{parent_path, AddressIndex, Attributes, DatasetEntry, GroupEntry};
use crate::source::{DataSource, ImageSink, Persisted};
use crate::value::{ArrayData, ScalarValue};

#[derive(Debug, Clone)]
enum Node {
    Group {
        attrs: Attributes,
    },
    Dataset {
        shape: Vec<usize>,
        data: ArrayData,
        attrs: Attributes,
        object: u64,
    },
    Alias {
        target: String,
    },
    Broken {
        reason: String,
    },
}

/// Hierarchical file held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    order: Vec<String>,
    nodes: HashMap<String, Node>,
    next_object: u64,
}

impl MemoryFile {
    #[must_use]
    pub fn new() -> Self {
        let mut file = Self::default();
        file.insert("/", Node::Group {
            attrs: Attributes::new(),
        });
        file
    }

    fn insert(&mut self, path: &str, node: Node) {
        if path != "/" {
            self.ensure_group(parent_path(path));
        }
        if self.nodes.insert(path.to_owned(), node).is_none() {
            self.order.push(path.to_owned());
        }
    }

    fn ensure_group(&mut self, path: &str) {
        if self.nodes.contains_key(path) {
            return;
        }
        self.insert(path, Node::Group {
            attrs: Attributes::new(),
        });
    }

    /// Add a group.
    #[must_use]
    pub fn group(mut self, path: &str) -> Self {
        self.ensure_group(path);
        self
    }

    /// Add a group with an `NX_class` attribute.
    #[must_use]
    pub fn group_class(self, path: &str, nx_class: &str) -> Self {
        self.group(path)
            .attr(path, crate::conventions::NX_CLASS_ATTRIBUTE, nx_class)
    }

    /// Add a dataset with an explicit shape.
    #[must_use]
    pub fn array(mut self, path: &str, shape: &[usize], data: ArrayData) -> Self {
        let object = self.next_object;
        self.next_object += 1;
        self.insert(path, Node::Dataset {
            shape: shape.to_vec(),
            data,
            attrs: Attributes::new(),
            object,
        });
        self
    }

    /// Add a 1-D float dataset.
    #[must_use]
    pub fn floats(self, path: &str, values: &[f64]) -> Self {
        self.array(path, &[values.len()], ArrayData::Float(values.to_vec()))
    }

    /// Add a 1-D integer dataset.
    #[must_use]
    pub fn ints(self, path: &str, values: &[i64]) -> Self {
        self.array(path, &[values.len()], ArrayData::Int(values.to_vec()))
    }

    /// Add a 1-D string dataset.
    #[must_use]
    pub fn text(self, path: &str, values: &[&str]) -> Self {
        let values: Vec<String> = values.iter().map(|v| (*v).to_owned()).collect();
        let len = values.len();
        self.array(path, &[len], ArrayData::Text(values))
    }

    /// Add a float dataset of zeros.
    #[must_use]
    pub fn zeros(self, path: &str, shape: &[usize]) -> Self {
        let size = shape.iter().product();
        self.array(path, shape, ArrayData::Float(vec![0.0; size]))
    }

    /// Set an attribute on an existing group or dataset.
    #[must_use]
    pub fn attr(mut self, path: &str, name: &str, value: impl Into<ScalarValue>) -> Self {
        if let Some(Node::Group { attrs } | Node::Dataset { attrs, .. }) = self.nodes.get_mut(path) {
            attrs.insert(name.to_owned(), value.into());
        }
        self
    }

    /// Add an address that exists but cannot be opened.
    #[must_use]
    pub fn broken(mut self, path: &str, reason: &str) -> Self {
        self.insert(path, Node::Broken {
            reason: reason.to_owned(),
        });
        self
    }

    /// Add a second address for the dataset at `target`.
    #[must_use]
    pub fn alias(mut self, path: &str, target: &str) -> Self {
        self.insert(path, Node::Alias {
            target: target.to_owned(),
        });
        self
    }

    fn resolve(&self, address: &str) -> Result<(&Vec<usize>, &ArrayData, &Attributes, u64)> {
        match self.nodes.get(address) {
            Some(Node::Dataset {
                shape,
                data,
                attrs,
                object,
            }) => Ok((shape, data, attrs, *object)),
            Some(Node::Alias { target }) => self.resolve(target),
            Some(Node::Broken { reason }) => Err(Error::Unresolvable {
                address: address.to_owned(),
                reason: reason.clone(),
            }),
            Some(Node::Group { .. }) => Err(Error::read(address, "not a dataset")),
            None => Err(Error::read(address, "no such address")),
        }
    }

    /// Index every address in insertion order.
    #[must_use]
    pub fn index(&self) -> AddressIndex {
        let mut builder = AddressIndex::builder();
        for path in &self.order {
            match &self.nodes[path] {
                Node::Group { attrs } => {
                    builder.add_group(GroupEntry::new(path.as_str()).with_attrs(attrs.clone()));
                }
                Node::Broken { reason } => {
                    builder.add_unresolved(path.as_str(), reason);
                }
                Node::Dataset { .. } | Node::Alias { .. } => match self.resolve(path) {
                    Ok((shape, data, attrs, object)) => {
                        builder.add_dataset(
                            DatasetEntry::new(path.as_str(), shape.clone(), data.kind())
                                .with_attrs(attrs.clone())
                                .with_object_id(object),
                        );
                    }
                    Err(e) => {
                        builder.add_unresolved(path.as_str(), e);
                    }
                },
            }
        }
        builder.build()
    }
}

impl DataSource for MemoryFile {
    fn read_array(&self, address: &str) -> Result<ArrayData> {
        self.resolve(address).map(|(_, data, _, _)| data.clone())
    }

    fn read_frame(&self, address: &str, point: &[usize]) -> Result<Array2<f64>> {
        let (shape, data, _, _) = self.resolve(address)?;
        if shape.len() != point.len() + 2 {
            return Err(Error::InvalidFormat(format!(
                "{address}: {} indices for shape {shape:?}",
                point.len()
            )));
        }
        let ArrayData::Float(values) = data else {
            return Err(Error::UnsupportedType {
                address: address.to_owned(),
                kind: "non-float frame".to_owned(),
            });
        };
        let (rows, cols) = (shape[point.len()], shape[point.len() + 1]);
        let mut frame = 0;
        for (&i, &extent) in point.iter().zip(shape.iter()) {
            if i >= extent {
                return Err(Error::InvalidFormat(format!(
                    "{address}: index {point:?} outside {shape:?}"
                )));
            }
            frame = frame * extent + i;
        }
        let start = frame * rows * cols;
        let pixels = values[start..start + rows * cols].to_vec();
        Array2::from_shape_vec((rows, cols), pixels)
            .map_err(|e| Error::InvalidFormat(e.to_string()))
    }
}

/// Image sink that records requests instead of writing files.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    written: Vec<(PathBuf, (usize, usize))>,
    existing: HashSet<PathBuf>,
    failing: HashSet<PathBuf>,
}

impl MemorySink {
    /// Treat `path` as already present.
    #[must_use]
    pub fn existing(mut self, path: impl Into<PathBuf>) -> Self {
        self.existing.insert(path.into());
        self
    }

    /// Fail every write to `path`.
    #[must_use]
    pub fn fail_on(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing.insert(path.into());
        self
    }

    /// Paths written, in request order.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.written.iter().map(|(path, _)| path.clone()).collect()
    }

    /// Dimensions of each written image, in request order.
    #[must_use]
    pub fn dims(&self) -> Vec<(usize, usize)> {
        self.written.iter().map(|(_, dim)| *dim).collect()
    }
}

impl ImageSink for MemorySink {
    fn write_image(&mut self, image: ArrayView2<'_, f64>, path: &Path) -> Result<Persisted> {
        if self.failing.contains(path) {
            return Err(Error::ImageWrite {
                path: path.to_path_buf(),
                reason: "injected failure".to_owned(),
            });
        }
        if self.existing.contains(path) {
            return Ok(Persisted::Existing);
        }
        self.written.push((path.to_path_buf(), image.dim()));
        Ok(Persisted::Written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parents_are_created() {
        let index = MemoryFile::new().floats("/entry1/sample/x", &[1.0]).index();
        let groups: Vec<_> = index.groups().iter().map(|g| g.path.as_str()).collect();
        assert_eq!(groups, vec!["/", "/entry1", "/entry1/sample"]);
    }

    #[test]
    fn test_alias_shares_object() {
        let file = MemoryFile::new()
            .floats("/entry1/measurement/eta", &[1.0, 2.0])
            .alias("/entry1/sample/eta", "/entry1/measurement/eta")
            .alias("/entry1/sample/gone", "/entry1/nowhere");
        let index = file.index();
        let a = index.dataset("/entry1/measurement/eta").unwrap();
        let b = index.dataset("/entry1/sample/eta").unwrap();
        assert!(a.same_object(b));
        assert_eq!(index.unresolved().len(), 1);
    }

    #[test]
    fn test_read_frame() {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let file = MemoryFile::new().array("/d", &[3, 2, 2], ArrayData::Float(values));
        let frame = file.read_frame("/d", &[1]).unwrap();
        assert_eq!(frame[[0, 0]], 4.0);
        assert_eq!(frame[[1, 1]], 7.0);
        assert!(file.read_frame("/d", &[3]).is_err());
        assert!(file.read_frame("/d", &[]).is_err());
    }
}
