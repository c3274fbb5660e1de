//! HDF5-shaped data sources
//!
//! Inspection and generation never talk to `libhdf5` directly. They go
//! through a [`Store`] that opens one file at a time and hands back a
//! [`SourceFile`] handle. Handles are scoped: each pipeline stage opens the
//! file it needs, reads, and drops the handle (closing the file) before the
//! next stage runs.
//!
//! Two backends ship with the crate:
//! - [`Hdf5Store`] (feature `hdf5`): real files through the HDF5 C library
//! - [`MemoryStore`]: in-memory files, used by tests and benchmarks
//!
//! # Example
//!
//! ```rust
//! use h5_broker::source::{MemoryFile, MemoryStore, SourceFile, Store, Slab};
//!
//! let store = MemoryStore::new().with_file(
//!     "run_0001.h5",
//!     MemoryFile::new().dataset("J", 1.5).dataset("curve", vec![0.0, 0.5, 1.0]),
//! );
//!
//! let file = store.open("run_0001.h5".as_ref())?;
//! let curve = file.read("curve", Slab::All)?;
//! assert_eq!(curve.shape(), &[3]);
//! # Ok::<(), h5_broker::Error>(())
//! ```

mod array;
#[cfg(feature = "hdf5")]
mod hdf5;
mod memory;

pub use array::{ArrayData, Values};
#[cfg(feature = "hdf5")]
pub use self::hdf5::{Hdf5File, Hdf5Store};
pub use memory::{MemoryFile, MemoryStore};

use std::collections::BTreeMap;
use std::path::Path;

use crate::Result;

/// Raw attribute values of one object, keyed by attribute name.
pub type RawAttrs = BTreeMap<String, ArrayData>;

/// Structural facts of a dataset, available without reading its values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetMeta {
    /// Dimension lengths (empty for a true scalar)
    pub shape: Vec<usize>,
    /// numpy-style dtype tag (`float64`, `int32`, `|S8`, ...)
    pub dtype: String,
}

/// Kind of object found at a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// HDF5 group
    Group,
    /// HDF5 dataset
    Dataset(DatasetMeta),
}

/// Selection along axis 0 of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slab {
    /// Whole dataset
    All,
    /// One row along axis 0; the axis is dropped from the result
    Index(usize),
    /// First `n` rows along axis 0 (fewer if the dataset is shorter)
    Head(usize),
}

/// An open source file. Dropping the handle closes the file.
///
/// Object paths are slash-separated without a leading slash; the empty
/// string names the root group. Leading and trailing slashes are tolerated.
pub trait SourceFile {
    /// Path the file was opened from.
    fn path(&self) -> &Path;

    /// Every object below the root, depth-first, parents before children,
    /// siblings in name order.
    ///
    /// # Errors
    ///
    /// Returns error if the file structure cannot be traversed
    fn visit(&self) -> Result<Vec<(String, Node)>>;

    /// Object at `path`, if any.
    fn node(&self, path: &str) -> Option<Node>;

    /// Sorted names of the direct children of a group.
    ///
    /// # Errors
    ///
    /// Returns error if `group` is not a group in this file
    fn members(&self, group: &str) -> Result<Vec<String>>;

    /// Read (part of) a dataset.
    ///
    /// # Errors
    ///
    /// Returns error if the dataset is missing, the selection is out of
    /// range, or the dtype cannot be converted
    fn read(&self, dataset: &str, slab: Slab) -> Result<ArrayData>;

    /// Attributes attached to a group or dataset (`""` for the root).
    ///
    /// # Errors
    ///
    /// Returns error if the object is missing or an attribute is unreadable
    fn attrs(&self, object: &str) -> Result<RawAttrs>;

    /// Dataset metadata at `path`, if `path` is a dataset.
    fn dataset(&self, path: &str) -> Option<DatasetMeta> {
        match self.node(path) {
            Some(Node::Dataset(meta)) => Some(meta),
            _ => None,
        }
    }

    /// Whether `path` is a group.
    fn is_group(&self, path: &str) -> bool {
        matches!(self.node(path), Some(Node::Group))
    }
}

/// Opens source files.
pub trait Store {
    /// Handle type for an open file
    type File: SourceFile;

    /// Open `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns error if the file does not exist or is not a readable container
    fn open(&self, path: &Path) -> Result<Self::File>;
}

impl<S: Store + ?Sized> Store for &S {
    type File = S::File;

    fn open(&self, path: &Path) -> Result<Self::File> {
        (**self).open(path)
    }
}

/// Strip leading/trailing slashes from an object path.
#[must_use]
pub fn normalize(path: &str) -> &str {
    path.trim_matches('/')
}

/// Parent group of an object path (`""` for root-level objects).
#[must_use]
pub fn parent(path: &str) -> &str {
    normalize(path).rsplit_once('/').map_or("", |(parent, _)| parent)
}

/// Last path component.
#[must_use]
pub fn leaf(path: &str) -> &str {
    let path = normalize(path);
    path.rsplit_once('/').map_or(path, |(_, leaf)| leaf)
}
