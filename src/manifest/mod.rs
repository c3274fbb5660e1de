//! Manifest generation
//!
//! A finalized [`Contract`] plus the files it selects become two flat
//! tables: one row per entity (parameters as columns, artifact locators,
//! provenance) and one row per entity-artifact pair. Each layout has its own
//! strategy; all of them are deterministic so regeneration is idempotent.
//!
//! Toyota Way Principles:
//! - Jidoka: unknown layouts and inconsistent batches stop generation, no
//!   partial manifests
//! - Poka-Yoke: uids are content hashes of the entity key

mod batched;
pub mod generator;
mod grouped;
mod per_entity;
pub mod table;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::contract::Contract;
use crate::inspect::scan::glob_files;
use crate::layout::{InspectPolicy, Layout};
use crate::source::{normalize, ArrayData, SourceFile, Slab, Store};
use crate::{Error, Result};

pub use generator::{ContractGenerator, ManifestGenerator};
pub use table::{read_manifest, write_manifest};

/// Hex characters kept from the SHA-256 digest of an entity key
pub const UID_LEN: usize = 16;

/// Deterministic uid of an entity key.
#[must_use]
pub fn make_uid(key: &str) -> String {
    let digest = hex::encode(Sha256::digest(key.as_bytes()));
    digest[..UID_LEN].to_string()
}

/// One logical entity: identity plus an open-ended, ordered column set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable id derived from `key`
    pub uid: String,
    /// Catalog key
    pub key: String,
    /// Remaining columns in generation order
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl Entity {
    /// Entity whose uid is the hash of `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            uid: make_uid(&key),
            key,
            metadata: Map::new(),
        }
    }

    /// Set a metadata column.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        self.metadata.insert(column.into(), value.into());
    }

    /// Value of any column, identity columns included.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<Value> {
        match column {
            "uid" => Some(Value::String(self.uid.clone())),
            "key" => Some(Value::String(self.key.clone())),
            other => self.metadata.get(other).cloned(),
        }
    }
}

/// One retrievable array owned by an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    /// Owning entity uid
    pub uid: String,
    /// Artifact type, unique within its entity
    #[serde(rename = "type")]
    pub kind: String,
    /// Backing file relative to the data directory
    pub file: String,
    /// Dataset path inside the file, with leading `/`
    pub dataset: String,
    /// Row along axis 0 when the file stores a batch
    pub index: Option<u64>,
}

/// Entity and artifact rows of one generation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    /// One row per entity
    pub entities: Vec<Entity>,
    /// One row per entity-artifact pair
    pub artifacts: Vec<Artifact>,
}

impl Manifest {
    /// Entity column names, identity first, then in first-seen order.
    #[must_use]
    pub fn entity_columns(&self) -> Vec<String> {
        let mut columns = vec!["uid".to_string(), "key".to_string()];
        for entity in &self.entities {
            for column in entity.metadata.keys() {
                if !columns.contains(column) {
                    columns.push(column.clone());
                }
            }
        }
        columns
    }

    /// Check that every artifact belongs to a generated entity.
    ///
    /// # Errors
    /// Returns [`Error::Manifest`] naming the first orphaned artifact
    pub fn validate_links(&self) -> Result<()> {
        let uids: std::collections::HashSet<&str> =
            self.entities.iter().map(|e| e.uid.as_str()).collect();
        match self.artifacts.iter().find(|a| !uids.contains(a.uid.as_str())) {
            Some(orphan) => Err(Error::Manifest(format!(
                "artifact '{}' references unknown entity uid {}",
                orphan.kind, orphan.uid
            ))),
            None => Ok(()),
        }
    }
}

/// Files selected by `pattern` under `directory`, sorted.
///
/// Falls back to matching the pattern at any depth.
///
/// # Errors
/// Returns [`Error::DirectoryNotFound`] or [`Error::NoFiles`]
pub fn discover_files(directory: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Err(Error::DirectoryNotFound(directory.display().to_string()));
    }
    let mut files = glob_files(directory, pattern)?;
    if files.is_empty() && !pattern.starts_with("**/") {
        debug!("No match for '{pattern}', retrying at any depth");
        files = glob_files(directory, &format!("**/{pattern}"))?;
    }
    if files.is_empty() {
        return Err(Error::NoFiles {
            directory: directory.display().to_string(),
            pattern: pattern.to_string(),
        });
    }
    Ok(files)
}

/// Read the array an artifact row points at.
///
/// Batch rows (`index` set) read one slice along axis 0; every other row
/// reads the whole dataset. `artifact.file` is resolved against `base_dir`.
///
/// # Errors
/// Returns error if the file cannot be opened, the dataset is missing, or
/// the index is out of range
pub fn load_artifact<S: Store>(
    store: &S,
    base_dir: &Path,
    artifact: &Artifact,
) -> Result<ArrayData> {
    let file = store.open(&base_dir.join(&artifact.file))?;
    let slab = match artifact.index {
        Some(index) => Slab::Index(usize::try_from(index).map_err(|_| {
            Error::Manifest(format!("artifact index {index} does not fit in memory"))
        })?),
        None => Slab::All,
    };
    file.read(&artifact.dataset, slab)
}

/// Contract-driven manifest generator over a [`Store`].
#[derive(Debug, Clone)]
pub struct Generator<S> {
    store: S,
    policy: InspectPolicy,
}

impl<S: Store> Generator<S> {
    /// Generator with the default policy
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: InspectPolicy::default(),
        }
    }

    /// Replace the policy (`inline_max_elements`, `attr_max_elements`)
    #[must_use]
    pub fn with_policy(mut self, policy: InspectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Generate rows for `contract`, stopping after `limit` entities.
    ///
    /// # Errors
    /// Returns error if the contract is invalid, no files match, the layout
    /// is unknown, or a source file contradicts the contract
    pub fn generate(&self, contract: &Contract, limit: Option<usize>) -> Result<Manifest> {
        contract.validate()?;
        let layout = contract.layout()?;
        let files = discover_files(&contract.directory(), contract.file_pattern())?;
        info!("Found {} HDF5 files for {} ({layout})", files.len(), contract.label);

        let job = Job {
            store: &self.store,
            policy: &self.policy,
            contract,
            root: contract.directory(),
            limit: limit.unwrap_or(usize::MAX),
        };
        let manifest = match layout {
            Layout::PerEntity => per_entity::generate(&job, &files)?,
            Layout::Batched => batched::generate(&job, &files)?,
            Layout::Grouped => grouped::generate(&job, &files)?,
        };
        manifest.validate_links()?;
        info!(
            "Generated {} entities, {} artifacts",
            manifest.entities.len(),
            manifest.artifacts.len()
        );
        Ok(manifest)
    }
}

/// Load a contract, generate with the HDF5 backend and write both Parquet
/// tables to `output_dir` (default `<contract dir>/manifests/<label>`).
///
/// # Errors
/// Returns error if the contract is invalid or generation or writing fails
#[cfg(feature = "hdf5")]
pub fn generate_manifests(
    contract_path: impl AsRef<Path>,
    output_dir: Option<&Path>,
) -> Result<(PathBuf, PathBuf)> {
    let contract_path = contract_path.as_ref();
    let contract = Contract::load(contract_path)?;
    let output_dir = output_dir.map_or_else(
        || {
            contract_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("manifests")
                .join(&contract.label)
        },
        Path::to_path_buf,
    );
    let manifest = Generator::new(crate::source::Hdf5Store::new()).generate(&contract, None)?;
    write_manifest(&manifest, &output_dir)
}

/// Everything a layout strategy needs for one run.
pub(crate) struct Job<'a, S> {
    pub store: &'a S,
    pub policy: &'a InspectPolicy,
    pub contract: &'a Contract,
    pub root: PathBuf,
    pub limit: usize,
}

impl<S: Store> Job<'_, S> {
    /// File path relative to the data directory.
    pub fn relative(&self, file: &Path) -> String {
        crate::inspect::scan::relative_path(&self.root, file)
    }

    /// Append provenance, optional root attributes and the label.
    pub fn finish_row(&self, entity: &mut Entity, attrs: &Map<String, Value>) {
        for (k, v) in &self.contract.provenance {
            entity.set(format!("prov_{k}"), v.clone());
        }
        for (k, v) in attrs {
            entity.set(format!("attr_{k}"), v.clone());
        }
        entity.set("label", self.contract.label.clone());
    }
}

/// Dataset path as a locator: leading `/`, no trailing slash.
pub(crate) fn locator(dataset: &str) -> String {
    format!("/{}", normalize(dataset))
}

/// `group/child` without doubled or leading slashes.
pub(crate) fn join(group: &str, child: &str) -> String {
    match (normalize(group), normalize(child)) {
        ("", child) => child.to_string(),
        (group, "") => group.to_string(),
        (group, child) => format!("{group}/{child}"),
    }
}

/// Every dataset directly in `group`, read whole, in name order.
pub(crate) fn read_children<F: SourceFile>(file: &F, group: &str) -> Result<Vec<(String, Value)>> {
    let mut values = Vec::new();
    for name in file.members(group)? {
        let path = join(group, &name);
        if file.dataset(&path).is_some() {
            values.push((name, file.read(&path, Slab::All)?.to_value()));
        }
    }
    Ok(values)
}

/// Scalar datasets directly in `group`, in name order.
pub(crate) fn read_scalars<F: SourceFile>(file: &F, group: &str) -> Result<Vec<(String, Value)>> {
    let mut values = Vec::new();
    for name in file.members(group)? {
        let path = join(group, &name);
        if file.dataset(&path).is_some_and(|meta| meta.shape.is_empty()) {
            values.push((name, file.read(&path, Slab::All)?.to_value()));
        }
    }
    Ok(values)
}

/// Inline a small extra-metadata dataset: scalars as-is, 1-D arrays of at
/// most `max_elements` as lists. Anything else is skipped.
pub(crate) fn read_inline<F: SourceFile>(
    file: &F,
    path: &str,
    max_elements: usize,
) -> Result<Option<Value>> {
    let Some(meta) = file.dataset(path) else {
        debug!("extra metadata {path} absent from {}", file.path().display());
        return Ok(None);
    };
    let inline = meta.shape.is_empty() || (meta.shape.len() == 1 && meta.shape[0] <= max_elements);
    if !inline {
        debug!("extra metadata {path} too large to inline");
        return Ok(None);
    }
    Ok(Some(file.read(path, Slab::All)?.to_value()))
}
