//! In-memory source backend.
//!
//! Files are built with a small builder API and registered under the path
//! the scanner will later discover, so the whole pipeline can run without
//! touching `libhdf5`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{normalize, parent, ArrayData, DatasetMeta, Node, RawAttrs, Slab, SourceFile, Store};
use crate::{Error, Result};

#[derive(Debug, Clone)]
enum MemoryNode {
    Group,
    Dataset { data: ArrayData, dtype: String },
}

/// An in-memory HDF5-like file.
///
/// # Example
///
/// ```rust
/// use h5_broker::source::{MemoryFile, SourceFile};
///
/// let file = MemoryFile::new()
///     .dataset("params/F2_dd", vec![1.0, 2.0, 3.0])
///     .attr("", "generator", "edrixs");
///
/// assert!(file.is_group("params"));
/// assert_eq!(file.members("").unwrap(), vec!["params".to_string()]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryFile {
    path: PathBuf,
    nodes: BTreeMap<String, MemoryNode>,
    attrs: BTreeMap<String, RawAttrs>,
}

impl MemoryFile {
    /// Create an empty file (root group only).
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dataset; the dtype tag follows the element type.
    #[must_use]
    pub fn dataset(self, path: &str, data: impl Into<ArrayData>) -> Self {
        let data = data.into();
        let dtype = data.values().dtype().to_string();
        self.typed_dataset(path, data, &dtype)
    }

    /// Add a dataset with an explicit dtype tag (`float32`, `|S8`, ...).
    #[must_use]
    pub fn typed_dataset(mut self, path: &str, data: impl Into<ArrayData>, dtype: &str) -> Self {
        let path = normalize(path).to_string();
        self.ensure_groups(parent(&path));
        self.nodes.insert(
            path,
            MemoryNode::Dataset {
                data: data.into(),
                dtype: dtype.to_string(),
            },
        );
        self
    }

    /// Add an (empty) group and its parents.
    #[must_use]
    pub fn group(mut self, path: &str) -> Self {
        self.ensure_groups(normalize(path));
        self
    }

    /// Attach an attribute to an object (`""` for the root group).
    #[must_use]
    pub fn attr(mut self, object: &str, name: &str, value: impl Into<ArrayData>) -> Self {
        self.attrs
            .entry(normalize(object).to_string())
            .or_default()
            .insert(name.to_string(), value.into());
        self
    }

    fn ensure_groups(&mut self, path: &str) {
        if path.is_empty() {
            return;
        }
        self.ensure_groups(parent(path));
        self.nodes
            .entry(path.to_string())
            .or_insert(MemoryNode::Group);
    }

    fn not_found(&self, path: &str) -> Error {
        Error::NotFound {
            file: self.path.display().to_string(),
            path: path.to_string(),
        }
    }

    fn exists(&self, path: &str) -> bool {
        path.is_empty() || self.nodes.contains_key(path)
    }
}

impl SourceFile for MemoryFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn visit(&self) -> Result<Vec<(String, Node)>> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.walk("", &mut out)?;
        Ok(out)
    }

    fn node(&self, path: &str) -> Option<Node> {
        let path = normalize(path);
        if path.is_empty() {
            return Some(Node::Group);
        }
        self.nodes.get(path).map(|node| match node {
            MemoryNode::Group => Node::Group,
            MemoryNode::Dataset { data, dtype } => Node::Dataset(DatasetMeta {
                shape: data.shape().to_vec(),
                dtype: dtype.clone(),
            }),
        })
    }

    fn members(&self, group: &str) -> Result<Vec<String>> {
        let group = normalize(group);
        if !self.is_group(group) {
            return Err(self.not_found(group));
        }
        Ok(self
            .nodes
            .keys()
            .filter(|path| parent(path) == group)
            .map(|path| super::leaf(path).to_string())
            .collect())
    }

    fn read(&self, dataset: &str, slab: Slab) -> Result<ArrayData> {
        let path = normalize(dataset);
        let Some(MemoryNode::Dataset { data, .. }) = self.nodes.get(path) else {
            return Err(self.not_found(path));
        };
        match slab {
            Slab::All => Ok(data.clone()),
            Slab::Index(i) => data.row(i),
            Slab::Head(n) => Ok(data.head(n)),
        }
    }

    fn attrs(&self, object: &str) -> Result<RawAttrs> {
        let object = normalize(object);
        if !self.exists(object) {
            return Err(self.not_found(object));
        }
        Ok(self.attrs.get(object).cloned().unwrap_or_default())
    }
}

impl MemoryFile {
    fn walk(&self, group: &str, out: &mut Vec<(String, Node)>) -> Result<()> {
        for name in self.members(group)? {
            let path = if group.is_empty() {
                name
            } else {
                format!("{group}/{name}")
            };
            if let Some(node) = self.node(&path) {
                let is_group = node == Node::Group;
                out.push((path.clone(), node));
                if is_group {
                    self.walk(&path, out)?;
                }
            }
        }
        Ok(())
    }
}

/// In-memory store: a map from file path to [`MemoryFile`].
///
/// Opening a path that was never registered fails like a missing file.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<PathBuf, MemoryFile>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file under `path` (builder style).
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>, file: MemoryFile) -> Self {
        self.insert(path, file);
        self
    }

    /// Register or replace a file under `path`.
    pub fn insert(&mut self, path: impl Into<PathBuf>, file: MemoryFile) {
        self.files.insert(path.into(), file);
    }

    /// Registered paths in sorted order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }

    /// Number of registered files.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if no files are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl Store for MemoryStore {
    type File = MemoryFile;

    fn open(&self, path: &Path) -> Result<MemoryFile> {
        let mut file = self
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Source(format!("unable to open {}: no such file", path.display())))?;
        file.path = path.to_path_buf();
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MemoryFile {
        MemoryFile::new()
            .dataset("b/y", 2.0)
            .dataset("a", 1.0)
            .dataset("b/c/z", vec![1.0, 2.0])
            .dataset("b-x", 3.0)
    }

    #[test]
    fn test_builder_creates_parent_groups() {
        let file = sample();
        assert!(file.is_group("b"));
        assert!(file.is_group("/b/c"));
        assert_eq!(SourceFile::dataset(&file, "b/c/z").unwrap().shape, vec![2]);
    }

    #[test]
    fn test_visit_is_preorder_by_name() {
        let names: Vec<String> = sample().visit().unwrap().into_iter().map(|(p, _)| p).collect();
        assert_eq!(names, vec!["a", "b", "b/c", "b/c/z", "b/y", "b-x"]);
    }

    #[test]
    fn test_members_sorted_and_direct() {
        let file = sample();
        assert_eq!(file.members("").unwrap(), vec!["a", "b", "b-x"]);
        assert_eq!(file.members("b").unwrap(), vec!["c", "y"]);
        assert!(file.members("a").is_err());
    }

    #[test]
    fn test_read_slabs() {
        let file = MemoryFile::new()
            .dataset("m", ArrayData::int(&[3, 2], vec![0, 1, 2, 3, 4, 5]).unwrap());
        assert_eq!(file.read("m", Slab::Index(2)).unwrap().shape(), &[2]);
        assert_eq!(file.read("m", Slab::Head(2)).unwrap().shape(), &[2, 2]);
        assert!(file.read("m", Slab::Index(3)).is_err());
        assert!(matches!(file.read("nope", Slab::All), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_attrs_on_missing_object() {
        let file = sample().attr("", "generator", "edrixs");
        assert_eq!(file.attrs("").unwrap().len(), 1);
        assert!(file.attrs("a").unwrap().is_empty());
        assert!(file.attrs("missing").is_err());
    }

    #[test]
    fn test_open_unknown_path() {
        let store = MemoryStore::new().with_file("/data/a.h5", sample());
        assert_eq!(store.len(), 1);
        assert!(store.open(Path::new("/data/b.h5")).is_err());
        let file = store.open(Path::new("/data/a.h5")).unwrap();
        assert_eq!(file.path(), Path::new("/data/a.h5"));
    }
}
