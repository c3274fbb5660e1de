//! Dataset classification
//!
//! A pure function of `(layout, batch_size)` applied to each dataset. The
//! two layouts that cannot tell an output array from a coordinate axis by
//! structure alone (`per_entity`, `grouped`) leave arrays as
//! [`Category::ArtifactOrAxis`] instead of guessing.

use std::collections::{BTreeMap, BTreeSet};

use super::{Category, DatasetInfo};
use crate::layout::Layout;
use crate::source::parent;

/// Groups whose direct dataset children are all 1-D of length `batch_size`.
#[must_use]
pub fn param_groups(
    datasets: &BTreeMap<String, DatasetInfo>,
    groups: &[String],
    batch_size: usize,
) -> BTreeSet<String> {
    groups
        .iter()
        .filter(|group| {
            let mut children = datasets
                .values()
                .filter(|ds| parent(&ds.name) == group.as_str())
                .peekable();
            children.peek().is_some()
                && children.all(|ds| ds.ndim() == 1 && ds.shape[0] == batch_size)
        })
        .cloned()
        .collect()
}

/// Category of every dataset for the given layout.
#[must_use]
pub fn classify(
    datasets: &BTreeMap<String, DatasetInfo>,
    groups: &[String],
    layout: Layout,
    batch_size: usize,
) -> BTreeMap<String, Category> {
    let param_groups = if layout == Layout::Batched {
        param_groups(datasets, groups, batch_size)
    } else {
        BTreeSet::new()
    };
    datasets
        .iter()
        .map(|(name, ds)| {
            let category = match layout {
                Layout::PerEntity => classify_per_entity(ds),
                Layout::Batched => classify_batched(ds, batch_size, &param_groups),
                Layout::Grouped => Category::ArtifactOrAxis,
            };
            (name.clone(), category)
        })
        .collect()
}

fn classify_per_entity(ds: &DatasetInfo) -> Category {
    if ds.ndim() == 0 {
        Category::Parameter
    } else {
        Category::ArtifactOrAxis
    }
}

fn classify_batched(ds: &DatasetInfo, batch_size: usize, param_groups: &BTreeSet<String>) -> Category {
    match ds.shape.first() {
        None => Category::Parameter,
        Some(&length) if length == batch_size => {
            if ds.ndim() == 1 && param_groups.contains(parent(&ds.name)) {
                Category::Parameter
            } else if ds.ndim() > 1 {
                Category::Artifact
            } else {
                Category::ExtraMetadata
            }
        }
        Some(_) => Category::SharedAxis,
    }
}
