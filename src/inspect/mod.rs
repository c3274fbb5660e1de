//! HDF5 layout inference and dataset classification
//!
//! Looks at an unlabeled directory of HDF5 files and works out how it is
//! organized: which layout the corpus uses, which datasets are per-entity
//! parameters, output artifacts or shared coordinate axes, and whether the
//! files agree with each other. The result feeds the draft contract emitter.
//!
//! Stages run strictly in order, each opening the files it needs and
//! closing them before the next stage:
//!
//! 1. [`scan`]: find files, infer a glob pattern
//! 2. [`walk`]: record every dataset and group of the reference file
//! 3. [`detect`]: pick `per_entity`, `batched` or `grouped`
//! 4. [`classify`]: assign a [`Category`] to each dataset
//! 5. [`sample`]: per-category statistics
//! 6. [`attrs`]: root/group/dataset attributes
//! 7. [`consistency`]: compare other files against the reference
//!
//! Toyota Way Principles:
//! - Jidoka: ambiguous arrays stop at `ARTIFACT_OR_AXIS` for a human to resolve
//! - Genchi Genbutsu: statistics come from reading actual values, not names
//!
//! Per-file and per-dataset failures never abort an inspection: they are
//! recorded as issues or [`Stats::Error`] and the run continues.

pub mod attrs;
pub mod classify;
pub mod consistency;
pub mod detect;
mod recommend;
pub mod sample;
pub mod scan;
pub mod walk;

pub use attrs::{attr_value, Attrs};
pub use detect::Detection;
pub use recommend::recommendations;
pub use scan::Scan;

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use crate::layout::{InspectPolicy, Layout};
use crate::source::Store;
use crate::{Error, Result};

/// Role of a dataset within an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// Per-entity scalar input
    Parameter,
    /// Per-entity multi-dimensional output
    Artifact,
    /// Coordinate grid identical across entities
    SharedAxis,
    /// Per-entity data that is neither parameter nor artifact
    ExtraMetadata,
    /// Array that needs a human to call it artifact or shared axis
    ArtifactOrAxis,
}

impl Category {
    /// Label used in logs and drafts
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Parameter => "PARAMETER",
            Self::Artifact => "ARTIFACT",
            Self::SharedAxis => "SHARED_AXIS",
            Self::ExtraMetadata => "EXTRA_METADATA",
            Self::ArtifactOrAxis => "ARTIFACT_OR_AXIS",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Category-specific statistics of one dataset.
///
/// Minimum and maximum ignore NaN where numpy's `nanmin`/`nanmax` would;
/// they are `None` when no value could contribute.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stats {
    /// Not sampled yet
    #[default]
    Pending,
    /// Parameter value spread
    Parameter {
        /// Smallest value
        min: Option<f64>,
        /// Largest value
        max: Option<f64>,
        /// Distinct finite values
        n_unique: usize,
        /// Any NaN present
        has_nans: bool,
        /// Every value equal
        is_constant: bool,
        /// Files contributing a value when sampled across the corpus
        sampled_from: Option<usize>,
    },
    /// One representative entity's artifact
    Artifact {
        /// Shape with the batch axis removed
        shape_per_entity: Vec<usize>,
        /// Smallest value
        min: Option<f64>,
        /// Largest value
        max: Option<f64>,
        /// Fraction of NaN elements
        nan_fraction: f64,
    },
    /// Shared coordinate axis
    SharedAxis {
        /// Full shape
        shape: Vec<usize>,
        /// Value range
        range: Option<(f64, f64)>,
        /// Strictly increasing or decreasing over the leading window
        monotonic: bool,
        /// Mean spacing for monotonic 1-D axes
        step: Option<f64>,
    },
    /// Light peek at extra or unclassified data
    Peek {
        /// Shape with the batch axis removed (batched layout)
        shape_per_entity: Vec<usize>,
        /// Smallest value (floating dtypes only)
        min: Option<f64>,
        /// Largest value (floating dtypes only)
        max: Option<f64>,
    },
    /// Statistics could not be computed
    Error(String),
}

impl Stats {
    /// Minimum, when the statistics carry one
    #[must_use]
    pub fn min(&self) -> Option<f64> {
        match self {
            Self::Parameter { min, .. } | Self::Artifact { min, .. } | Self::Peek { min, .. } => *min,
            Self::SharedAxis { range, .. } => match range {
                Some((lo, _)) => Some(*lo),
                None => None,
            },
            Self::Pending | Self::Error(_) => None,
        }
    }

    /// Maximum, when the statistics carry one
    #[must_use]
    pub fn max(&self) -> Option<f64> {
        match self {
            Self::Parameter { max, .. } | Self::Artifact { max, .. } | Self::Peek { max, .. } => *max,
            Self::SharedAxis { range, .. } => match range {
                Some((_, hi)) => Some(*hi),
                None => None,
            },
            Self::Pending | Self::Error(_) => None,
        }
    }

    /// Whether a parameter never varies across the sample
    #[must_use]
    pub const fn is_constant(&self) -> bool {
        matches!(self, Self::Parameter { is_constant: true, .. })
    }

    /// Per-entity shape, when known
    #[must_use]
    pub fn shape_per_entity(&self) -> Option<&[usize]> {
        match self {
            Self::Artifact { shape_per_entity, .. } | Self::Peek { shape_per_entity, .. } => {
                Some(shape_per_entity)
            }
            _ => None,
        }
    }
}

/// Structural facts of one dataset plus what later stages learned about it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Path inside the file, no leading slash
    pub name: String,
    /// Dimension lengths
    pub shape: Vec<usize>,
    /// numpy-style dtype tag
    pub dtype: String,
    /// Assigned by classification
    pub category: Option<Category>,
    /// Filled by sampling
    pub stats: Stats,
}

impl DatasetInfo {
    /// Structural record, not yet classified or sampled
    #[must_use]
    pub fn new(name: impl Into<String>, shape: Vec<usize>, dtype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype: dtype.into(),
            category: None,
            stats: Stats::Pending,
        }
    }

    /// Number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total element count
    #[must_use]
    pub fn size(&self) -> usize {
        self.shape.iter().product()
    }

    /// Whether the dtype holds floating point values
    #[must_use]
    pub fn is_float(&self) -> bool {
        self.dtype.starts_with("float")
    }
}

/// Everything one inspection run found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InspectionResult {
    /// Inspected directory
    pub source_dir: PathBuf,
    /// Discovered HDF5 files, sorted
    pub files: Vec<PathBuf>,
    /// Glob pattern describing `files`
    pub file_pattern: String,
    /// Detected layout
    pub layout: Layout,
    /// Axis-0 batch length; nonzero iff `layout` is batched
    pub batch_size: usize,
    /// Entities the corpus holds
    pub total_entities: usize,
    /// Datasets of the reference file keyed by path
    pub datasets: BTreeMap<String, DatasetInfo>,
    /// Dataset paths of the reference file in visit order
    pub dataset_order: Vec<String>,
    /// Group paths of the reference file
    pub groups: Vec<String>,
    /// Entity groups (grouped layout only); the first is the representative
    pub entity_groups: Vec<String>,
    /// Root attributes
    pub root_attrs: Attrs,
    /// Group attributes keyed by group path
    pub group_attrs: BTreeMap<String, Attrs>,
    /// Dataset attributes keyed by dataset path
    pub dataset_attrs: BTreeMap<String, Attrs>,
    /// Files actually compared (reference included)
    pub files_checked: usize,
    /// Human-readable consistency problems
    pub consistency_issues: Vec<String>,
    /// Suggestions for the data producer
    pub recommendations: Vec<String>,
}

impl InspectionResult {
    /// Empty result for a directory with no files.
    #[must_use]
    pub fn empty(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            files: Vec::new(),
            file_pattern: scan::DEFAULT_PATTERN.to_string(),
            layout: Layout::PerEntity,
            batch_size: 0,
            total_entities: 0,
            datasets: BTreeMap::new(),
            dataset_order: Vec::new(),
            groups: Vec::new(),
            entity_groups: Vec::new(),
            root_attrs: Attrs::new(),
            group_attrs: BTreeMap::new(),
            dataset_attrs: BTreeMap::new(),
            files_checked: 0,
            consistency_issues: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    /// Datasets with the given category, in name order.
    pub fn by_category(&self, category: Category) -> impl Iterator<Item = &DatasetInfo> {
        self.datasets
            .values()
            .filter(move |ds| ds.category == Some(category))
    }

    /// Datasets in the order the reference file was visited. Datasets missing
    /// from `dataset_order` follow in name order.
    #[must_use]
    pub fn datasets_in_visit_order(&self) -> Vec<&DatasetInfo> {
        let mut ordered: Vec<&DatasetInfo> = self
            .dataset_order
            .iter()
            .filter_map(|name| self.datasets.get(name))
            .collect();
        if ordered.len() < self.datasets.len() {
            let listed: HashSet<&str> = self.dataset_order.iter().map(String::as_str).collect();
            ordered.extend(
                self.datasets
                    .values()
                    .filter(|ds| !listed.contains(ds.name.as_str())),
            );
        }
        ordered
    }

    /// Count of datasets per category.
    #[must_use]
    pub fn category_counts(&self) -> BTreeMap<Category, usize> {
        let mut counts = BTreeMap::new();
        for category in self.datasets.values().filter_map(|ds| ds.category) {
            *counts.entry(category).or_insert(0) += 1;
        }
        counts
    }

    /// Representative entity group (grouped layout only).
    #[must_use]
    pub fn representative_group(&self) -> Option<&str> {
        self.entity_groups.first().map(String::as_str)
    }
}

/// Runs the inspection stages against a [`Store`].
///
/// # Example
///
/// ```rust
/// use h5_broker::inspect::Inspector;
/// use h5_broker::source::{MemoryFile, MemoryStore};
/// use h5_broker::Layout;
///
/// let store = MemoryStore::new()
///     .with_file("data/run_a.h5", MemoryFile::new().dataset("J", 1.5))
///     .with_file("data/run_b.h5", MemoryFile::new().dataset("J", 2.5));
///
/// let files = store.paths().map(ToOwned::to_owned).collect();
/// let result = Inspector::new(&store).inspect_files("data", files, "*.h5");
/// assert_eq!(result.layout, Layout::PerEntity);
/// assert_eq!(result.total_entities, 2);
/// ```
#[derive(Debug, Clone)]
pub struct Inspector<S> {
    store: S,
    policy: InspectPolicy,
}

impl<S: Store> Inspector<S> {
    /// Inspector with the default policy
    pub fn new(store: S) -> Self {
        Self {
            store,
            policy: InspectPolicy::default(),
        }
    }

    /// Replace the heuristic thresholds
    #[must_use]
    pub fn with_policy(mut self, policy: InspectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active thresholds
    pub const fn policy(&self) -> &InspectPolicy {
        &self.policy
    }

    /// Scan `directory` and inspect whatever HDF5 files it holds.
    ///
    /// A directory without HDF5 files yields an empty result, not an error.
    ///
    /// # Errors
    ///
    /// Returns error if `directory` does not exist or is not a directory
    pub fn inspect(&self, directory: impl AsRef<Path>) -> Result<InspectionResult> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(Error::DirectoryNotFound(directory.display().to_string()));
        }
        let Scan { files, pattern } = scan::find_h5_files(directory);
        if files.is_empty() {
            warn!("No HDF5 files found in {}", directory.display());
            return Ok(InspectionResult::empty(directory));
        }
        info!("Found {} HDF5 files ({})", files.len(), pattern);
        Ok(self.inspect_files(directory, files, pattern))
    }

    /// Inspect an already discovered, sorted file list.
    ///
    /// The first file is the reference. Never fails: problems are recorded
    /// in the result.
    pub fn inspect_files(
        &self,
        directory: impl Into<PathBuf>,
        files: Vec<PathBuf>,
        pattern: impl Into<String>,
    ) -> InspectionResult {
        let mut result = InspectionResult::empty(directory);
        result.file_pattern = pattern.into();
        result.files = files;
        let Some(reference) = result.files.first().cloned() else {
            return result;
        };

        let tree = match walk::walk_tree(&self.store, &reference) {
            Ok(tree) => tree,
            Err(e) => {
                warn!("Could not walk reference file {}: {e}", reference.display());
                result
                    .consistency_issues
                    .push(format!("{}: could not open ({e})", file_name(&reference)));
                walk::Tree::default()
            }
        };
        info!(
            "  {} datasets, {} groups in {}",
            tree.datasets.len(),
            tree.groups.len(),
            file_name(&reference)
        );
        result.datasets = tree.datasets;
        result.dataset_order = tree.order;
        result.groups = tree.groups;

        if result.files.len() == 1 {
            let entity_groups = detect::entity_groups(&self.store, &reference).unwrap_or_else(|e| {
                warn!("Could not list groups of {}: {e}", reference.display());
                Vec::new()
            });
            if detect::is_grouped(&entity_groups, result.files.len(), &self.policy) {
                self.finish_grouped(&mut result, &reference, entity_groups);
                return result;
            }
        }

        let Detection { layout, batch_size } =
            detect::detect_layout(
                &result.datasets_in_visit_order(),
                result.files.len(),
                &self.policy,
            );
        result.layout = layout;
        result.batch_size = batch_size;
        result.total_entities = if layout == Layout::Batched {
            batch_size * result.files.len()
        } else {
            result.files.len()
        };
        match layout {
            Layout::Batched => info!(
                "  Layout: batched (axis-0 = {batch_size}, total = {})",
                crate::text::thousands(result.total_entities)
            ),
            _ => info!(
                "  Layout: {layout} ({} files)",
                crate::text::thousands(result.total_entities)
            ),
        }

        let categories = classify::classify(&result.datasets, &result.groups, layout, batch_size);
        apply_categories(&mut result, categories);
        info!("  Classification: {:?}", result.category_counts());

        let stats = sample::sample_stats(
            &self.store,
            &result.files,
            &result.datasets,
            layout,
            batch_size,
            &self.policy,
        );
        apply_stats(&mut result, stats);

        self.read_attributes(&mut result, &reference);

        let report = consistency::check_consistency(
            &self.store,
            &result.files,
            &result.datasets,
            &self.policy,
        );
        result.files_checked = report.files_checked;
        result.consistency_issues.extend(report.issues);
        if result.consistency_issues.is_empty() {
            info!("  Consistency: PASSED");
        } else {
            warn!(
                "  Consistency: FAILED ({} issues)",
                result.consistency_issues.len()
            );
        }

        result.recommendations = recommendations(&result);
        result
    }

    fn finish_grouped(&self, result: &mut InspectionResult, reference: &Path, groups: Vec<String>) {
        result.layout = Layout::Grouped;
        result.batch_size = 0;
        result.total_entities = groups.len();
        info!("  Layout: grouped ({} entity groups)", result.total_entities);

        // Keep root-level objects and the representative group only.
        let representative = groups.first().cloned().unwrap_or_default();
        let in_other_group = |path: &str| {
            let top = path.split('/').next().unwrap_or(path);
            top != representative && groups.iter().any(|g| g == top)
        };
        result.datasets.retain(|name, _| !in_other_group(name));
        result.dataset_order.retain(|name| !in_other_group(name));
        result.groups.retain(|name| !in_other_group(name));
        result.entity_groups = groups;

        let categories = classify::classify(&result.datasets, &result.groups, Layout::Grouped, 0);
        apply_categories(result, categories);

        let stats = sample::sample_stats(
            &self.store,
            &result.files,
            &result.datasets,
            Layout::Grouped,
            0,
            &self.policy,
        );
        apply_stats(result, stats);
        self.read_attributes(result, reference);

        result.files_checked = result.files.len();
        result.recommendations = recommendations(result);
    }

    fn read_attributes(&self, result: &mut InspectionResult, reference: &Path) {
        let names: Vec<String> = result.datasets.keys().cloned().collect();
        let found = attrs::read_attributes(
            &self.store,
            reference,
            &names,
            &result.groups,
            self.policy.attr_max_elements,
        );
        if !found.root.is_empty() {
            info!("  Root attrs: {:?}", found.root);
        }
        result.root_attrs = found.root;
        result.group_attrs = found.groups;
        result.dataset_attrs = found.datasets;
    }
}

/// Inspect a directory of real HDF5 files with the default policy.
///
/// # Errors
///
/// Returns error if `directory` does not exist or is not a directory
#[cfg(feature = "hdf5")]
pub fn inspect_directory(directory: impl AsRef<Path>) -> Result<InspectionResult> {
    Inspector::new(crate::source::Hdf5Store::new()).inspect(directory)
}

fn apply_categories(result: &mut InspectionResult, categories: BTreeMap<String, Category>) {
    for (name, category) in categories {
        if let Some(ds) = result.datasets.get_mut(&name) {
            ds.category = Some(category);
        }
    }
}

fn apply_stats(result: &mut InspectionResult, stats: BTreeMap<String, Stats>) {
    for (name, stats) in stats {
        if let Some(ds) = result.datasets.get_mut(&name) {
            ds.stats = stats;
        }
    }
}

/// Evenly strided subset of at most `n` items (all of them if `len <= n`).
pub(crate) fn evenly_spaced<T: Clone>(items: &[T], n: usize) -> Vec<T> {
    if items.len() <= n || n == 0 {
        return items.to_vec();
    }
    let step = items.len() / n;
    items.iter().step_by(step).take(n).cloned().collect()
}

/// Final path component for issue strings.
pub(crate) fn file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}
