//! Property-based tests for h5-broker
//!
//! - Layout detection invariants
//! - Deterministic identity
//! - Batched generation counts
//! - Run with ProptestConfig::with_cases(100) (generation uses fewer cases)

use std::collections::HashSet;

use h5_broker::inspect::detect::{detect_layout, Detection};
use h5_broker::inspect::DatasetInfo;
use h5_broker::manifest::{make_uid, UID_LEN};
use h5_broker::source::{ArrayData, MemoryFile, MemoryStore};
use h5_broker::text::{shape_tuple, thousands};
use h5_broker::{Contract, Generator, InspectPolicy, Layout};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Distinct dataset names
fn arb_names(max: usize) -> impl Strategy<Value = Vec<String>> {
    proptest::collection::btree_set("[a-z][a-z0-9_]{0,7}", 1..max)
        .prop_map(|names| names.into_iter().collect())
}

fn infos(specs: impl IntoIterator<Item = (String, Vec<usize>)>) -> Vec<DatasetInfo> {
    specs
        .into_iter()
        .map(|(name, shape)| DatasetInfo::new(name, shape, "float64"))
        .collect()
}

fn detect(datasets: &[DatasetInfo], n_files: usize) -> Detection {
    detect_layout(&datasets.iter().collect::<Vec<_>>(), n_files, &InspectPolicy::default())
}

// ============================================================================
// Layout detection
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Scalar-only multi-file corpora are always per_entity
    #[test]
    fn prop_scalar_multi_file_is_per_entity(names in arb_names(20), n_files in 2usize..500) {
        let datasets = infos(names.into_iter().map(|n| (n, Vec::new())));
        let detection = detect(&datasets, n_files);
        prop_assert_eq!(detection.layout, Layout::PerEntity);
        prop_assert_eq!(detection.batch_size, 0);
    }

    /// A scalar anywhere in a multi-file corpus wins over shared axis-0 lengths
    #[test]
    fn prop_scalars_override_arrays(len in 100usize..5000, arrays in 3usize..8, n_files in 2usize..50) {
        let mut specs: Vec<(String, Vec<usize>)> =
            (0..arrays).map(|i| (format!("a{i}"), vec![len, 4])).collect();
        specs.push(("J".to_string(), Vec::new()));
        let detection = detect(&infos(specs), n_files);
        prop_assert_eq!(detection.layout, Layout::PerEntity);
    }

    /// Single file, at least three datasets sharing axis-0 length L >= 100
    #[test]
    fn prop_single_file_shared_length_is_batched(
        len in 100usize..100_000,
        shared in 3usize..10,
        inner in proptest::collection::vec(1usize..50, 0..3),
    ) {
        let specs = (0..shared).map(|i| {
            let mut shape = vec![len];
            shape.extend(&inner);
            (format!("ds{i}"), shape)
        });
        let detection = detect(&infos(specs), 1);
        prop_assert_eq!(detection.layout, Layout::Batched);
        prop_assert_eq!(detection.batch_size, len);
    }

    /// Fewer than the policy's dataset count never batches
    #[test]
    fn prop_two_datasets_never_batch(len in 2usize..100_000, n_files in 1usize..10) {
        let specs = vec![("a".to_string(), vec![len]), ("b".to_string(), vec![len, 2])];
        let detection = detect(&infos(specs), n_files);
        prop_assert_eq!(detection.layout, Layout::PerEntity);
    }
}

// ============================================================================
// Identity and formatting
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Same key, same uid; always 16 lowercase hex characters
    #[test]
    fn prop_uid_deterministic(key in ".{0,64}") {
        let uid = make_uid(&key);
        prop_assert_eq!(uid.len(), UID_LEN);
        prop_assert!(uid.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        prop_assert_eq!(uid, make_uid(&key));
    }

    /// Distinct counter keys never collide
    #[test]
    fn prop_counter_keys_unique(prefix in "[a-z]{1,6}", n in 1usize..2000) {
        let uids: HashSet<String> = (0..n).map(|i| make_uid(&format!("{prefix}_{i:06}"))).collect();
        prop_assert_eq!(uids.len(), n);
    }

    /// Separators only regroup digits
    #[test]
    fn prop_thousands_preserves_digits(n in any::<usize>()) {
        let formatted = thousands(n);
        prop_assert_eq!(formatted.replace(',', ""), n.to_string());
        for group in formatted.split(',').skip(1) {
            prop_assert_eq!(group.len(), 3);
        }
    }

    /// Tuples have one entry per dimension
    #[test]
    fn prop_shape_tuple_lists_dims(shape in proptest::collection::vec(0usize..10_000, 2..6)) {
        let text = shape_tuple(&shape);
        prop_assert!(text.starts_with('(') && text.ends_with(')'));
        prop_assert_eq!(text.matches(", ").count(), shape.len() - 1);
    }

    /// Rows of a 2-D array are contiguous runs
    #[test]
    fn prop_row_slices_axis0(rows in 1usize..20, cols in 1usize..20, pick in any::<prop::sample::Index>()) {
        let n = i64::try_from(rows * cols).unwrap();
        let data = ArrayData::int(&[rows, cols], (0..n).collect()).unwrap();
        let i = pick.index(rows);
        let row = data.row(i).unwrap();
        prop_assert_eq!(row.shape(), &[cols][..]);
        let start = i64::try_from(i * cols).unwrap();
        let expected: Vec<i64> = (start..start + i64::try_from(cols).unwrap()).collect();
        prop_assert_eq!(row.to_value(), serde_json::json!(expected));
    }
}

// ============================================================================
// Batched generation
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(20))]

    /// k files of batch b give k*b entities with unique (file, index) pairs
    #[test]
    fn prop_batched_counts(k in 1usize..4, b in 1usize..12) {
        let dir = tempfile::tempdir().unwrap();
        let mut store = MemoryStore::new();
        for f in 0..k {
            let path = dir.path().join(format!("b{f}.h5"));
            std::fs::write(&path, b"").unwrap();
            store.insert(
                path,
                MemoryFile::new().dataset("MAG", ArrayData::float(&[b, 2], vec![0.0; b * 2]).unwrap()),
            );
        }
        let contract = Contract::from_yaml_str(&format!(
            "label: p\nkey_prefix: p\n\
             data:\n  directory: {}\n  file_pattern: \"*.h5\"\n  layout: batched\n\
             artifacts:\n  - type: mag\n    dataset: /MAG\n",
            dir.path().display()
        ))
        .unwrap();

        let manifest = Generator::new(&store).generate(&contract, None).unwrap();
        prop_assert_eq!(manifest.entities.len(), k * b);
        let pairs: HashSet<(String, u64)> = manifest
            .artifacts
            .iter()
            .map(|a| (a.file.clone(), a.index.unwrap()))
            .collect();
        prop_assert_eq!(pairs.len(), k * b);
        prop_assert!(manifest.artifacts.iter().all(|a| a.index.unwrap() < b as u64));
    }
}
