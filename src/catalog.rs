//! Catalog node preparation
//!
//! Turns manifest rows into the two-level hierarchy a catalog stores:
//! one container node per entity (every entity column plus the locators of
//! its artifacts) and one array node per artifact. Persisting the nodes is
//! the catalog's job; this module only computes them.
//!
//! Array shapes come from the backing files. Files of one dataset share
//! their dataset shapes, so lookups go through a [`ShapeCache`] the caller
//! owns and passes in; a fresh cache per dataset keeps runs independent.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

use crate::manifest::{Artifact, Manifest};
use crate::source::{SourceFile, Store};
use crate::{Error, Result};

/// Element type recorded for every array node
pub const ARRAY_DTYPE: &str = "float64";

/// Dataset shapes keyed by dataset path and whether a batch row is taken.
#[derive(Debug, Clone, Default)]
pub struct ShapeCache {
    shapes: HashMap<(String, bool), Vec<usize>>,
}

impl ShapeCache {
    /// Empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached shapes
    #[must_use]
    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    /// Whether nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Forget every cached shape.
    pub fn clear(&mut self) {
        self.shapes.clear();
    }

    /// Shape of `dataset` in `file`, without the batch axis when `indexed`.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or lacks the dataset
    pub fn shape<S: Store>(
        &mut self,
        store: &S,
        file: &Path,
        dataset: &str,
        indexed: bool,
    ) -> Result<Vec<usize>> {
        let key = (dataset.to_string(), indexed);
        if let Some(shape) = self.shapes.get(&key) {
            return Ok(shape.clone());
        }
        let handle = store.open(file)?;
        let meta = handle.dataset(dataset).ok_or_else(|| Error::NotFound {
            file: file.display().to_string(),
            path: dataset.to_string(),
        })?;
        let shape = if indexed {
            meta.shape.get(1..).unwrap_or_default().to_vec()
        } else {
            meta.shape
        };
        debug!("shape of {dataset} in {}: {shape:?}", file.display());
        self.shapes.insert(key, shape.clone());
        Ok(shape)
    }
}

/// Entity container node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerNode {
    /// Catalog key
    pub key: String,
    /// Entity uid, links array nodes to this node
    pub uid: String,
    /// Every entity column plus artifact locators
    pub metadata: Map<String, Value>,
}

/// Artifact array node with its data source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArrayNode {
    /// Artifact type, unique within the parent
    pub key: String,
    /// Owning entity uid
    pub parent_uid: String,
    /// `{type, shape, dtype}`
    pub metadata: Map<String, Value>,
    /// Backing file (absolute or relative to the working directory)
    pub file: PathBuf,
    /// Data-source parameters: `dataset`, plus `slice` for batch rows
    pub parameters: Map<String, Value>,
}

impl ArrayNode {
    /// Shape recorded in the metadata
    #[must_use]
    pub fn shape(&self) -> Vec<usize> {
        self.metadata
            .get("shape")
            .and_then(Value::as_array)
            .map(|dims| {
                dims.iter()
                    .filter_map(Value::as_u64)
                    .filter_map(|d| usize::try_from(d).ok())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Nodes ready for registration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NodeData {
    /// One per entity
    pub containers: Vec<ContainerNode>,
    /// One per artifact of the prepared entities
    pub arrays: Vec<ArrayNode>,
}

/// Compute catalog nodes for the first `max_entities` entities.
///
/// # Errors
/// Returns [`Error::MissingColumn`] if an entity has no key, or an error
/// reading an artifact's shape
pub fn prepare_node_data<S: Store>(
    manifest: &Manifest,
    base_dir: &Path,
    store: &S,
    cache: &mut ShapeCache,
    max_entities: usize,
) -> Result<NodeData> {
    if manifest.entities.iter().any(|e| e.key.is_empty()) {
        return Err(Error::MissingColumn {
            table: "entities".to_string(),
            column: "key".to_string(),
        });
    }

    let mut by_uid: BTreeMap<&str, Vec<&Artifact>> = BTreeMap::new();
    for art in &manifest.artifacts {
        by_uid.entry(art.uid.as_str()).or_default().push(art);
    }

    let entities = &manifest.entities[..manifest.entities.len().min(max_entities)];
    info!("Preparing data for {} entities", entities.len());
    let mut nodes = NodeData::default();

    for entity in entities {
        let mut metadata = Map::new();
        metadata.insert("uid".to_string(), json!(entity.uid));
        metadata.insert("key".to_string(), json!(entity.key));
        metadata.extend(entity.metadata.clone());

        let artifacts = by_uid.get(entity.uid.as_str()).map_or(&[][..], Vec::as_slice);
        for art in artifacts {
            metadata.insert(format!("path_{}", art.kind), json!(art.file));
            metadata.insert(format!("dataset_{}", art.kind), json!(art.dataset));
            if let Some(index) = art.index {
                metadata.insert(format!("index_{}", art.kind), json!(index));
            }
        }
        nodes.containers.push(ContainerNode {
            key: entity.key.clone(),
            uid: entity.uid.clone(),
            metadata,
        });

        for art in artifacts {
            let file = base_dir.join(&art.file);
            let shape = cache.shape(store, &file, &art.dataset, art.index.is_some())?;
            let mut metadata = Map::new();
            metadata.insert("type".to_string(), json!(art.kind));
            metadata.insert("shape".to_string(), json!(shape));
            metadata.insert("dtype".to_string(), json!(ARRAY_DTYPE));

            let mut parameters = Map::new();
            parameters.insert("dataset".to_string(), json!(art.dataset));
            if let Some(index) = art.index {
                parameters.insert("slice".to_string(), json!(index.to_string()));
            }
            nodes.arrays.push(ArrayNode {
                key: art.kind.clone(),
                parent_uid: entity.uid.clone(),
                metadata,
                file,
                parameters,
            });
        }
    }
    info!(
        "Prepared {} entities, {} artifacts",
        nodes.containers.len(),
        nodes.arrays.len()
    );
    Ok(nodes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Entity;
    use crate::source::{ArrayData, MemoryFile, MemoryStore};

    fn store() -> MemoryStore {
        MemoryStore::new()
            .with_file("/base/a.h5", MemoryFile::new().dataset("curve", vec![0.0; 200]))
            .with_file(
                "/base/batch.h5",
                MemoryFile::new().dataset("MAG", ArrayData::float(&[5, 3, 2], vec![0.0; 30]).unwrap()),
            )
    }

    fn manifest() -> Manifest {
        let mut a = Entity::new("mh_a");
        a.set("J", 1.5);
        let b = Entity::new("mag_000000");
        let artifacts = vec![
            Artifact {
                uid: a.uid.clone(),
                kind: "curve".into(),
                file: "a.h5".into(),
                dataset: "/curve".into(),
                index: None,
            },
            Artifact {
                uid: b.uid.clone(),
                kind: "mag".into(),
                file: "batch.h5".into(),
                dataset: "/MAG".into(),
                index: Some(2),
            },
        ];
        Manifest {
            entities: vec![a, b],
            artifacts,
        }
    }

    #[test]
    fn test_nodes_and_locators() {
        let mut cache = ShapeCache::new();
        let nodes = prepare_node_data(&manifest(), Path::new("/base"), &store(), &mut cache, 10).unwrap();
        assert_eq!(nodes.containers.len(), 2);
        assert_eq!(nodes.arrays.len(), 2);

        let a = &nodes.containers[0];
        assert_eq!(a.metadata["J"], json!(1.5));
        assert_eq!(a.metadata["path_curve"], json!("a.h5"));
        assert_eq!(a.metadata["dataset_curve"], json!("/curve"));
        assert!(!a.metadata.contains_key("index_curve"));

        let b = &nodes.containers[1];
        assert_eq!(b.metadata["index_mag"], json!(2));

        assert_eq!(nodes.arrays[0].shape(), [200]);
        assert_eq!(nodes.arrays[1].shape(), [3, 2]);
        assert_eq!(nodes.arrays[1].parameters["slice"], json!("2"));
        assert_eq!(nodes.arrays[1].metadata["dtype"], json!("float64"));
        assert_eq!(nodes.arrays[1].file, Path::new("/base/batch.h5"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_cache_avoids_reopening() {
        let mut cache = ShapeCache::new();
        let store = store();
        cache.shape(&store, Path::new("/base/a.h5"), "/curve", false).unwrap();
        // cached by dataset path: a missing file is never opened
        let shape = cache.shape(&store, Path::new("/base/zzz.h5"), "/curve", false).unwrap();
        assert_eq!(shape, [200]);
        cache.clear();
        assert!(cache.shape(&store, Path::new("/base/zzz.h5"), "/curve", false).is_err());
    }

    #[test]
    fn test_max_entities_and_missing_key() {
        let mut cache = ShapeCache::new();
        let nodes = prepare_node_data(&manifest(), Path::new("/base"), &store(), &mut cache, 1).unwrap();
        assert_eq!(nodes.containers.len(), 1);
        assert_eq!(nodes.arrays.len(), 1);

        let mut bad = manifest();
        bad.entities[0].key.clear();
        let err = prepare_node_data(&bad, Path::new("/base"), &store(), &mut cache, 10).unwrap_err();
        assert!(matches!(err, Error::MissingColumn { .. }));
    }
}
