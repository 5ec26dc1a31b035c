//! Flat index of every address in a hierarchical source file.
//!
//! The index is built once per file by a single traversal (see the io crate) and is
//! immutable afterwards. All searches by path, leaf name or field-name attribute are
//! answered from lookup tables built here instead of walking the hierarchy again.

use std::collections::{BTreeMap, HashMap};

#[cfg(feature = "serde")]
use serde::Serialize;

use crate::conventions::{FIELD_NAME_ATTRIBUTES, NX_CLASS_ATTRIBUTE};
use crate::value::{DataKind, ScalarValue};

/// Attribute name to value mapping.
pub type Attributes = BTreeMap<String, ScalarValue>;

/// A dataset recorded in the index.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetEntry {
    /// Absolute address, e.g. `/entry1/measurement/eta`.
    pub path: String,
    /// Dimensions; empty for scalar datasets.
    pub shape: Vec<usize>,
    /// Total number of elements.
    pub size: usize,
    /// Semantic type of the stored elements.
    pub kind: DataKind,
    /// Attributes that could be read as scalars.
    pub attrs: Attributes,
    /// Identity of the underlying object. Addresses aliasing the same data share it.
    pub object_id: Option<u64>,
}

impl DatasetEntry {
    /// Create an entry with the size derived from `shape`.
    #[must_use]
    pub fn new(path: impl Into<String>, shape: Vec<usize>, kind: DataKind) -> Self {
        let size = shape.iter().product();
        Self {
            path: path.into(),
            shape,
            size,
            kind,
            attrs: Attributes::new(),
            object_id: None,
        }
    }

    /// Set the attributes.
    #[must_use]
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Set the object identity.
    #[must_use]
    pub fn with_object_id(mut self, object_id: u64) -> Self {
        self.object_id = Some(object_id);
        self
    }

    /// Leaf name of the address.
    #[must_use]
    pub fn name(&self) -> &str {
        leaf_name(&self.path)
    }

    /// Address of the enclosing group.
    #[must_use]
    pub fn parent(&self) -> &str {
        parent_path(&self.path)
    }

    /// Number of dimensions.
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// String value of an attribute.
    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).and_then(ScalarValue::as_str)
    }

    /// Returns true if both entries refer to the same stored object.
    #[must_use]
    pub fn same_object(&self, other: &DatasetEntry) -> bool {
        match (self.object_id, other.object_id) {
            (Some(a), Some(b)) => a == b,
            _ => self.path == other.path,
        }
    }
}

/// A group recorded in the index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupEntry {
    /// Absolute address; the root is `/`.
    pub path: String,
    /// Attributes that could be read as scalars.
    pub attrs: Attributes,
    /// Addresses of direct children, in traversal order. Filled by [`IndexBuilder::build`].
    pub children: Vec<String>,
}

impl GroupEntry {
    /// Create a group entry without attributes.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Set the attributes.
    #[must_use]
    pub fn with_attrs(mut self, attrs: Attributes) -> Self {
        self.attrs = attrs;
        self
    }

    /// Leaf name of the address.
    #[must_use]
    pub fn name(&self) -> &str {
        leaf_name(&self.path)
    }

    /// NeXus base class from the `NX_class` attribute.
    #[must_use]
    pub fn nx_class(&self) -> Option<&str> {
        self.attrs.get(NX_CLASS_ATTRIBUTE).and_then(ScalarValue::as_str)
    }
}

/// An address that exists in the hierarchy but could not be opened.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct UnresolvedEntry {
    pub path: String,
    pub reason: String,
}

/// Counts describing an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct IndexStats {
    pub datasets: usize,
    pub groups: usize,
    pub unresolved: usize,
}

/// Immutable index of a source file.
#[derive(Debug, Clone, Default)]
pub struct AddressIndex {
    datasets: Vec<DatasetEntry>,
    groups: Vec<GroupEntry>,
    unresolved: Vec<UnresolvedEntry>,
    dataset_by_path: HashMap<String, usize>,
    group_by_path: HashMap<String, usize>,
    datasets_by_name: HashMap<String, Vec<usize>>,
    datasets_by_field_name: HashMap<String, Vec<usize>>,
    groups_by_name: HashMap<String, Vec<usize>>,
}

impl AddressIndex {
    /// Start building an index.
    #[must_use]
    pub fn builder() -> IndexBuilder {
        IndexBuilder::default()
    }

    /// All datasets in index order.
    #[must_use]
    pub fn datasets(&self) -> &[DatasetEntry] {
        &self.datasets
    }

    /// All groups in index order.
    #[must_use]
    pub fn groups(&self) -> &[GroupEntry] {
        &self.groups
    }

    /// Addresses recorded as present but unresolvable.
    #[must_use]
    pub fn unresolved(&self) -> &[UnresolvedEntry] {
        &self.unresolved
    }

    /// Entry counts.
    #[must_use]
    pub fn stats(&self) -> IndexStats {
        IndexStats {
            datasets: self.datasets.len(),
            groups: self.groups.len(),
            unresolved: self.unresolved.len(),
        }
    }

    /// Returns true if nothing readable was indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty() && self.groups.iter().all(|g| g.path == "/")
    }

    /// Dataset at an exact address.
    #[must_use]
    pub fn dataset(&self, path: &str) -> Option<&DatasetEntry> {
        self.dataset_by_path.get(path).map(|&i| &self.datasets[i])
    }

    /// Group at an exact address.
    #[must_use]
    pub fn group(&self, path: &str) -> Option<&GroupEntry> {
        self.group_by_path.get(path).map(|&i| &self.groups[i])
    }

    /// Datasets with leaf name `name`, in index order.
    pub fn datasets_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a DatasetEntry> {
        self.lookup(&self.datasets_by_name, name)
    }

    /// First dataset with leaf name `name`.
    #[must_use]
    pub fn first_named(&self, name: &str) -> Option<&DatasetEntry> {
        self.datasets_named(name).next()
    }

    /// Datasets whose field-name attribute equals `name`, in index order.
    pub fn datasets_with_field_name<'a>(
        &'a self,
        name: &str,
    ) -> impl Iterator<Item = &'a DatasetEntry> {
        self.lookup(&self.datasets_by_field_name, name)
    }

    /// Groups with leaf name `name`, in index order.
    pub fn groups_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a GroupEntry> {
        self.groups_by_name
            .get(name)
            .into_iter()
            .flatten()
            .map(|&i| &self.groups[i])
    }

    /// Datasets directly inside `group`, in traversal order.
    pub fn child_datasets<'a>(&'a self, group: &'a GroupEntry) -> impl Iterator<Item = &'a DatasetEntry> {
        group.children.iter().filter_map(|path| self.dataset(path))
    }

    fn lookup<'a>(
        &'a self,
        table: &'a HashMap<String, Vec<usize>>,
        key: &str,
    ) -> impl Iterator<Item = &'a DatasetEntry> {
        table
            .get(key)
            .into_iter()
            .flatten()
            .map(|&i| &self.datasets[i])
    }
}

/// Accumulates entries during traversal and freezes them into an [`AddressIndex`].
#[derive(Debug, Default)]
pub struct IndexBuilder {
    datasets: Vec<DatasetEntry>,
    groups: Vec<GroupEntry>,
    unresolved: Vec<UnresolvedEntry>,
    // Address to insertion sequence number.
    seen: HashMap<String, usize>,
}

impl IndexBuilder {
    /// Record a group. Returns false if the address was already recorded.
    pub fn add_group(&mut self, group: GroupEntry) -> bool {
        if !self.claim(&group.path) {
            return false;
        }
        self.groups.push(group);
        true
    }

    /// Record a dataset. Returns false if the address was already recorded.
    pub fn add_dataset(&mut self, dataset: DatasetEntry) -> bool {
        if !self.claim(&dataset.path) {
            return false;
        }
        self.datasets.push(dataset);
        true
    }

    /// Record an address whose object could not be opened.
    pub fn add_unresolved(&mut self, path: impl Into<String>, reason: impl ToString) -> bool {
        let path = path.into();
        if !self.claim(&path) {
            return false;
        }
        self.unresolved.push(UnresolvedEntry {
            path,
            reason: reason.to_string(),
        });
        true
    }

    /// Returns true if `path` has been recorded.
    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.seen.contains_key(path)
    }

    fn claim(&mut self, path: &str) -> bool {
        if self.seen.contains_key(path) {
            return false;
        }
        let sequence = self.seen.len();
        self.seen.insert(path.to_owned(), sequence);
        true
    }

    /// Build the lookup tables and group membership.
    #[must_use]
    pub fn build(self) -> AddressIndex {
        let mut index = AddressIndex {
            datasets: self.datasets,
            groups: self.groups,
            unresolved: self.unresolved,
            ..AddressIndex::default()
        };

        for (i, group) in index.groups.iter_mut().enumerate() {
            group.children.clear();
            index.group_by_path.insert(group.path.clone(), i);
            index
                .groups_by_name
                .entry(leaf_name(&group.path).to_owned())
                .or_default()
                .push(i);
        }

        let mut children: Vec<(usize, String)> = Vec::new();
        for (i, dataset) in index.datasets.iter().enumerate() {
            index.dataset_by_path.insert(dataset.path.clone(), i);
            index
                .datasets_by_name
                .entry(dataset.name().to_owned())
                .or_default()
                .push(i);
            for key in field_name_keys(dataset) {
                let slots = index.datasets_by_field_name.entry(key).or_default();
                if slots.last() != Some(&i) {
                    slots.push(i);
                }
            }
            if let Some(&parent) = index.group_by_path.get(dataset.parent()) {
                children.push((parent, dataset.path.clone()));
            }
        }
        for group in &index.groups {
            if group.path == "/" {
                continue;
            }
            if let Some(&parent) = index.group_by_path.get(parent_path(&group.path)) {
                children.push((parent, group.path.clone()));
            }
        }
        for entry in &index.unresolved {
            if let Some(&parent) = index.group_by_path.get(parent_path(&entry.path)) {
                children.push((parent, entry.path.clone()));
            }
        }

        // Children keep the order in which they were traversed.
        let mut ranked: Vec<(usize, usize, String)> = children
            .into_iter()
            .map(|(parent, path)| {
                let rank = self.seen.get(&path).copied().unwrap_or(usize::MAX);
                (parent, rank, path)
            })
            .collect();
        ranked.sort_by_key(|(parent, rank, _)| (*parent, *rank));
        for (parent, _, path) in ranked {
            index.groups[parent].children.push(path);
        }

        index
    }
}

/// Names a dataset answers to through its field-name attributes.
///
/// `local_name` values look like `pil3_100k.sum`; the part after the last dot is
/// registered as well.
fn field_name_keys(dataset: &DatasetEntry) -> Vec<String> {
    let mut keys = Vec::new();
    for attr in FIELD_NAME_ATTRIBUTES {
        if let Some(value) = dataset.attr_str(attr) {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            keys.push(value.to_owned());
            if let Some((_, tail)) = value.rsplit_once('.') {
                if !tail.is_empty() {
                    keys.push(tail.to_owned());
                }
            }
        }
    }
    keys.dedup();
    keys
}

/// Last component of an address.
#[must_use]
pub fn leaf_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Address of the enclosing group; the parent of a top-level address is `/`.
#[must_use]
pub fn parent_path(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) | None => "/",
        Some(i) => &path[..i],
    }
}

/// Join a group address and a member name.
#[must_use]
pub fn join_path(group: &str, name: &str) -> String {
    if group == "/" || group.is_empty() {
        format!("/{name}")
    } else {
        format!("{group}/{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> AddressIndex {
        let mut builder = AddressIndex::builder();
        builder.add_group(GroupEntry::new("/"));
        builder.add_group(GroupEntry::new("/entry1"));
        builder.add_group(GroupEntry::new("/entry1/measurement"));
        builder.add_dataset(DatasetEntry::new(
            "/entry1/measurement/eta",
            vec![61],
            DataKind::Numeric,
        ));
        let mut attrs = Attributes::new();
        attrs.insert("local_name".into(), "pil3_100k.sum".into());
        builder.add_dataset(
            DatasetEntry::new("/entry1/measurement/sum", vec![61], DataKind::Numeric)
                .with_attrs(attrs),
        );
        builder.add_unresolved("/entry1/broken", "dangling link");
        builder.build()
    }

    #[test]
    fn test_paths() {
        assert_eq!(leaf_name("/entry1/scan/eta"), "eta");
        assert_eq!(parent_path("/entry1/scan/eta"), "/entry1/scan");
        assert_eq!(parent_path("/entry1"), "/");
        assert_eq!(join_path("/", "entry1"), "/entry1");
        assert_eq!(join_path("/entry1", "eta"), "/entry1/eta");
    }

    #[test]
    fn test_duplicate_addresses_are_rejected() {
        let mut builder = AddressIndex::builder();
        assert!(builder.add_dataset(DatasetEntry::new("/a", vec![2], DataKind::Numeric)));
        assert!(!builder.add_dataset(DatasetEntry::new("/a", vec![3], DataKind::Numeric)));
        assert!(!builder.add_unresolved("/a", "again"));
        assert_eq!(builder.build().datasets().len(), 1);
    }

    #[test]
    fn test_lookup_tables() {
        let index = sample_index();
        assert_eq!(index.stats().datasets, 2);
        assert_eq!(index.stats().unresolved, 1);
        assert_eq!(index.first_named("eta").map(|d| d.size), Some(61));
        assert!(index.dataset("/entry1/measurement/eta").is_some());
        assert_eq!(
            index
                .datasets_with_field_name("pil3_100k.sum")
                .map(DatasetEntry::name)
                .collect::<Vec<_>>(),
            vec!["sum"]
        );
        assert_eq!(index.datasets_with_field_name("sum").count(), 1);
    }

    #[test]
    fn test_group_children_in_traversal_order() {
        let index = sample_index();
        let entry = index.group("/entry1").unwrap();
        assert_eq!(entry.children, vec!["/entry1/measurement", "/entry1/broken"]);
        let measurement = index.groups_named("measurement").next().unwrap();
        let names: Vec<_> = index.child_datasets(measurement).map(DatasetEntry::name).collect();
        assert_eq!(names, vec!["eta", "sum"]);
    }
}
