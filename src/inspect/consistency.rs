//! Cross-file consistency check
//!
//! Compares up to `consistency_max_files` other files (evenly strided)
//! against the reference: missing datasets, extra datasets and shape
//! mismatches. Shared axes are additionally compared value-for-value
//! against the first `shared_axis_spot_checks` of those files, since they
//! should be identical across the whole corpus.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::walk::dataset_shapes;
use super::{evenly_spaced, file_name, Category, DatasetInfo};
use crate::layout::InspectPolicy;
use crate::source::{ArrayData, Slab, SourceFile, Store};
use crate::text::{name_set, shape_tuple};

/// Outcome of a consistency check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Human-readable problems, one per finding
    pub issues: Vec<String>,
    /// Files compared, reference included
    pub files_checked: usize,
}

/// Check `files[1..]` against the reference datasets of `files[0]`.
///
/// Never fails: unopenable files contribute a "could not open" issue.
#[must_use]
pub fn check_consistency<S: Store>(
    store: &S,
    files: &[PathBuf],
    reference: &BTreeMap<String, DatasetInfo>,
    policy: &InspectPolicy,
) -> Report {
    if files.len() <= 1 {
        return Report {
            issues: Vec::new(),
            files_checked: files.len(),
        };
    }

    let to_check = evenly_spaced(&files[1..], policy.consistency_max_files);
    let mut issues = Vec::new();
    let ref_names: BTreeSet<&String> = reference.keys().collect();

    for path in &to_check {
        let name = file_name(path);
        let other = match dataset_shapes(store, path) {
            Ok(other) => other,
            Err(e) => {
                issues.push(format!("{name}: could not open ({e})"));
                continue;
            }
        };
        let other_names: BTreeSet<&String> = other.keys().collect();

        let missing: Vec<&String> = ref_names.difference(&other_names).copied().collect();
        let extra: Vec<&String> = other_names.difference(&ref_names).copied().collect();
        if !missing.is_empty() {
            issues.push(format!("{name}: missing datasets {}", name_set(missing)));
        }
        if !extra.is_empty() {
            issues.push(format!("{name}: extra datasets {}", name_set(extra)));
        }
        for ds in ref_names.intersection(&other_names) {
            let expected = &reference[*ds].shape;
            let found = &other[*ds];
            if expected != found {
                issues.push(format!(
                    "{name}: {ds} shape {} != reference {}",
                    shape_tuple(found),
                    shape_tuple(expected)
                ));
            }
        }
    }

    let spot_checks = &to_check[..to_check.len().min(policy.shared_axis_spot_checks)];
    issues.extend(check_shared_axes(store, &files[0], spot_checks, reference));

    Report {
        issues,
        files_checked: 1 + to_check.len(),
    }
}

fn check_shared_axes<S: Store>(
    store: &S,
    reference_path: &Path,
    spot_checks: &[PathBuf],
    reference: &BTreeMap<String, DatasetInfo>,
) -> Vec<String> {
    let shared: Vec<&String> = reference
        .iter()
        .filter(|(_, ds)| ds.category == Some(Category::SharedAxis))
        .map(|(name, _)| name)
        .collect();
    if shared.is_empty() {
        return Vec::new();
    }

    let mut issues = Vec::new();
    let ref_name = file_name(reference_path);
    let mut ref_data: Vec<(&String, ArrayData)> = Vec::new();
    match store.open(reference_path) {
        Ok(file) => {
            for name in shared {
                match file.read(name, Slab::All) {
                    Ok(data) => ref_data.push((name, data)),
                    Err(e) => issues.push(format!("{ref_name}: could not read {name} ({e})")),
                }
            }
        }
        Err(e) => {
            issues.push(format!("{ref_name}: could not open ({e})"));
            return issues;
        }
    }

    for path in spot_checks {
        let Ok(file) = store.open(path) else {
            debug!("spot check skipped, cannot open {}", path.display());
            continue;
        };
        for (name, expected) in &ref_data {
            if file.dataset(name).is_none() {
                continue;
            }
            match file.read(name, Slab::All) {
                Ok(found) if &found == expected => {}
                Ok(_) => issues.push(format!(
                    "{}: {name} values differ from reference",
                    file_name(path)
                )),
                Err(e) => debug!("spot check of {name} in {} failed: {e}", path.display()),
            }
        }
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryFile, MemoryStore};

    fn reference(file: &MemoryFile) -> BTreeMap<String, DatasetInfo> {
        let store = MemoryStore::new().with_file("ref.h5", file.clone());
        super::super::walk::walk_tree(&store, Path::new("ref.h5"))
            .unwrap()
            .datasets
    }

    fn base() -> MemoryFile {
        MemoryFile::new()
            .dataset("J", 1.0)
            .dataset("curve", vec![1.0, 2.0, 3.0])
    }

    #[test]
    fn test_single_file_has_no_issues() {
        let store = MemoryStore::new().with_file("a.h5", base());
        let report = check_consistency(&store, &["a.h5".into()], &reference(&base()), &InspectPolicy::default());
        assert!(report.issues.is_empty());
        assert_eq!(report.files_checked, 1);
    }

    #[test]
    fn test_duplicated_corpus_passes() {
        let mut store = MemoryStore::new();
        let files: Vec<PathBuf> = (0..15).map(|i| PathBuf::from(format!("f{i:02}.h5"))).collect();
        for f in &files {
            store.insert(f.clone(), base());
        }
        let report = check_consistency(&store, &files, &reference(&base()), &InspectPolicy::default());
        assert!(report.issues.is_empty());
        assert_eq!(report.files_checked, 11);
    }

    #[test]
    fn test_structural_issues() {
        let other = MemoryFile::new()
            .dataset("curve", vec![1.0, 2.0])
            .dataset("extra", 3.0);
        let store = MemoryStore::new().with_file("a.h5", base()).with_file("b.h5", other);
        let report = check_consistency(
            &store,
            &["a.h5".into(), "b.h5".into(), "c.h5".into()],
            &reference(&base()),
            &InspectPolicy::default(),
        );
        assert_eq!(
            report.issues[..3],
            [
                "b.h5: missing datasets {'J'}",
                "b.h5: extra datasets {'extra'}",
                "b.h5: curve shape (2,) != reference (3,)",
            ]
        );
        assert!(report.issues[3].starts_with("c.h5: could not open"));
        assert_eq!(report.issues.len(), 4);
    }

    #[test]
    fn test_shared_axis_values_differ() {
        let make = |end: f64| MemoryFile::new().dataset("energy", vec![0.0, end]);
        let store = MemoryStore::new()
            .with_file("a.h5", make(1.0))
            .with_file("b.h5", make(1.0))
            .with_file("c.h5", make(2.0));
        let mut datasets = reference(&make(1.0));
        datasets.get_mut("energy").unwrap().category = Some(Category::SharedAxis);
        let report = check_consistency(
            &store,
            &["a.h5".into(), "b.h5".into(), "c.h5".into()],
            &datasets,
            &InspectPolicy::default(),
        );
        assert_eq!(report.issues, vec!["c.h5: energy values differ from reference"]);
    }
}
