//! Layout detection
//!
//! Priority order:
//! 1. grouped: a single file with more than `grouped_min_groups` top-level
//!    groups that directly hold a dataset
//! 2. per_entity: any true scalar AND more than one file (a shared axis-0
//!    length is then a grid size, not a batch count)
//! 3. batched: at least `batch_min_datasets` arrays share the most common
//!    axis-0 length `L > 1`, and either there is one file or
//!    `L >= batch_min_len_multi_file`
//! 4. per_entity otherwise

use std::path::Path;

use super::DatasetInfo;
use crate::layout::{InspectPolicy, Layout};
use crate::source::{SourceFile, Store};
use crate::Result;

/// Layout decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    /// Detected layout
    pub layout: Layout,
    /// Batch length (0 unless batched)
    pub batch_size: usize,
}

impl Detection {
    const PER_ENTITY: Self = Self {
        layout: Layout::PerEntity,
        batch_size: 0,
    };
}

/// Decide between per_entity and batched from the reference file's datasets,
/// given in visit order.
#[must_use]
pub fn detect_layout(datasets: &[&DatasetInfo], n_files: usize, policy: &InspectPolicy) -> Detection {
    if datasets.is_empty() {
        return Detection::PER_ENTITY;
    }

    let has_scalars = datasets.iter().any(|ds| ds.ndim() == 0);
    let many_files = n_files > 1;
    if has_scalars && many_files {
        return Detection::PER_ENTITY;
    }

    let Some((length, count)) = most_common_axis0(datasets.iter().copied()) else {
        return Detection::PER_ENTITY;
    };
    if count >= policy.batch_min_datasets
        && length > 1
        && (!many_files || length >= policy.batch_min_len_multi_file)
    {
        return Detection {
            layout: Layout::Batched,
            batch_size: length,
        };
    }
    Detection::PER_ENTITY
}

/// Most frequent axis-0 length among arrays; ties go to the length seen first
/// in iteration order.
fn most_common_axis0<'a>(datasets: impl Iterator<Item = &'a DatasetInfo>) -> Option<(usize, usize)> {
    let mut tally: Vec<(usize, usize)> = Vec::new();
    for ds in datasets {
        let Some(&length) = ds.shape.first() else {
            continue;
        };
        match tally.iter_mut().find(|(l, _)| *l == length) {
            Some((_, count)) => *count += 1,
            None => tally.push((length, 1)),
        }
    }
    tally
        .into_iter()
        .fold(None, |best: Option<(usize, usize)>, (length, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((length, count)),
        })
}

/// Top-level groups of `path` that directly contain at least one dataset.
///
/// # Errors
///
/// Returns error if the file cannot be opened or listed
pub fn entity_groups<S: Store>(store: &S, path: &Path) -> Result<Vec<String>> {
    let file = store.open(path)?;
    let mut groups = Vec::new();
    for name in file.members("")? {
        if !file.is_group(&name) {
            continue;
        }
        let has_dataset = file
            .members(&name)?
            .iter()
            .any(|child| file.dataset(&format!("{name}/{child}")).is_some());
        if has_dataset {
            groups.push(name);
        }
    }
    Ok(groups)
}

/// Whether the candidate entity groups make a grouped corpus.
///
/// Only a single-file corpus can be grouped.
#[must_use]
pub fn is_grouped(entity_groups: &[String], n_files: usize, policy: &InspectPolicy) -> bool {
    n_files == 1 && entity_groups.len() > policy.grouped_min_groups
}
