//! Reference-file tree walk

use std::collections::BTreeMap;
use std::path::Path;

use super::DatasetInfo;
use crate::source::{Node, SourceFile, Store};
use crate::Result;

/// Datasets and groups of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tree {
    /// Datasets keyed by path (no leading slash)
    pub datasets: BTreeMap<String, DatasetInfo>,
    /// Dataset paths in visit order (depth-first, siblings by name)
    pub order: Vec<String>,
    /// Group paths in visit order
    pub groups: Vec<String>,
}

/// Open `path`, record every dataset and group, and close it again.
///
/// # Errors
///
/// Returns error if the file cannot be opened or traversed
pub fn walk_tree<S: Store>(store: &S, path: &Path) -> Result<Tree> {
    let file = store.open(path)?;
    let mut tree = Tree::default();
    for (name, node) in file.visit()? {
        match node {
            Node::Group => tree.groups.push(name),
            Node::Dataset(meta) => {
                let info = DatasetInfo::new(name.clone(), meta.shape, meta.dtype);
                tree.order.push(name.clone());
                tree.datasets.insert(name, info);
            }
        }
    }
    Ok(tree)
}

/// Dataset shapes of one file keyed by path.
///
/// # Errors
///
/// Returns error if the file cannot be opened or traversed
pub fn dataset_shapes<S: Store>(store: &S, path: &Path) -> Result<BTreeMap<String, Vec<usize>>> {
    let file = store.open(path)?;
    Ok(file
        .visit()?
        .into_iter()
        .filter_map(|(name, node)| match node {
            Node::Dataset(meta) => Some((name, meta.shape)),
            Node::Group => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryFile, MemoryStore};

    #[test]
    fn test_walk_records_datasets_and_groups() {
        let store = MemoryStore::new().with_file(
            "a.h5",
            MemoryFile::new()
                .typed_dataset("params/Ja", vec![0.0; 4], "float32")
                .dataset("energy", vec![1.0, 2.0]),
        );
        let tree = walk_tree(&store, Path::new("a.h5")).unwrap();
        assert_eq!(tree.groups, vec!["params"]);
        assert_eq!(tree.datasets.len(), 2);
        assert_eq!(tree.datasets["params/Ja"].dtype, "float32");
        assert_eq!(tree.datasets["energy"].shape, vec![2]);
    }

    #[test]
    fn test_walk_keeps_visit_order() {
        let store = MemoryStore::new().with_file(
            "a.h5",
            MemoryFile::new().dataset("a.b", vec![0.0; 9]).dataset("a/x", vec![0.0; 7]),
        );
        let tree = walk_tree(&store, Path::new("a.h5")).unwrap();
        // '.' sorts before '/' as a key, but group "a" is visited before "a.b"
        assert_eq!(tree.order, ["a/x", "a.b"]);
        assert_eq!(tree.datasets.keys().collect::<Vec<_>>(), ["a.b", "a/x"]);
    }

    #[test]
    fn test_walk_missing_file() {
        let store = MemoryStore::new();
        assert!(walk_tree(&store, Path::new("nope.h5")).is_err());
    }
}
