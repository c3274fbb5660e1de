//! Draft contract emission and contract validation
//!
//! The draft an inspection emits must be a loadable contract once a person
//! fills in the identity fields, and must drive generation unchanged.
//!
//! Toyota Way: Poka-Yoke (the draft carries its own TODO markers)

use std::path::Path;

use chrono::NaiveDate;
use h5_broker::contract::{render_draft, ArraySpec, ParamLocation};
use h5_broker::inspect::Inspector;
use h5_broker::source::{ArrayData, MemoryFile, MemoryStore};
use h5_broker::{Contract, Error, Generator, Layout};
use serde_json::json;

fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 1, 31).unwrap()
}

fn batched_store(dir: &Path) -> MemoryStore {
    let ja: Vec<f64> = (0..120).map(f64::from).collect();
    let file = MemoryFile::new()
        .dataset("params/Ja", ja.clone())
        .dataset("params/Jb", ja.iter().map(|x| x * 2.0).collect::<Vec<_>>())
        .dataset("spectra", ArrayData::float(&[120, 3, 2], vec![0.25; 720]).unwrap())
        .dataset("energy", vec![-1.0, 0.0, 1.0])
        .dataset("seed", (0..120_i64).collect::<Vec<_>>())
        .attr("", "generator", "edrixs")
        .attr("", "created_at", "2025-01-01");
    let path = dir.join("batch_000.h5");
    std::fs::write(&path, b"").unwrap();
    MemoryStore::new().with_file(path, file)
}

fn fill_identity(draft: &str) -> String {
    draft
        .replace(r#"label: """#, "label: edrixs_test")
        .replace(r#"key_prefix: """#, "key_prefix: edx")
}

#[test]
fn test_batched_draft_sections() {
    let dir = tempfile::tempdir().unwrap();
    let store = batched_store(dir.path());
    let result = Inspector::new(&store).inspect(dir.path()).unwrap();
    let draft = render_draft(&result, date());

    assert!(draft.starts_with("# AUTO-GENERATED by h5-broker inspect on 2025-01-31\n"));
    assert!(draft.contains("# Entities detected: 120 (1 files x 120 batch size)"));
    assert!(draft.contains("  layout: batched\n  # batch_size: 120"));
    assert!(draft.contains("  location: group\n  group: /params"));
    assert!(draft.contains("  - type: spectra"));
    assert!(draft.contains("    # shape per entity: (3, 2), dtype: float64"));
    assert!(draft.contains("shared:\n  - type: energy\n    dataset: /energy"));
    assert!(draft.contains("extra_metadata:\n  - dataset: /seed"));
    assert!(draft.contains("  generator: edrixs"));
    assert!(draft.contains("# === Consistency check: PASSED (1 files checked) ==="));
    assert!(!draft.contains("No 'generator'"));
}

#[test]
fn test_unfilled_draft_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let store = batched_store(dir.path());
    let result = Inspector::new(&store).inspect(dir.path()).unwrap();
    let draft = render_draft(&result, date());

    let err = Contract::from_yaml_str(&draft).unwrap_err();
    let Error::Contract(errors) = err else {
        panic!("expected contract errors, got {err}");
    };
    assert_eq!(errors.0.len(), 2);
    assert!(errors.0[0].starts_with("'label' is required"));
    assert!(errors.0[1].starts_with("'key_prefix' is required"));
}

#[test]
fn test_filled_draft_drives_generation() {
    let dir = tempfile::tempdir().unwrap();
    let store = batched_store(dir.path());
    let result = Inspector::new(&store).inspect(dir.path()).unwrap();
    let contract = Contract::from_yaml_str(&fill_identity(&render_draft(&result, date()))).unwrap();

    assert_eq!(contract.layout().unwrap(), Layout::Batched);
    assert_eq!(contract.param_location(Layout::Batched).unwrap(), ParamLocation::Group);
    assert_eq!(contract.artifacts, vec![ArraySpec::new("spectra", "/spectra")]);
    assert_eq!(contract.provenance["generator"], json!("edrixs"));

    let manifest = Generator::new(&store).generate(&contract, Some(4)).unwrap();
    assert_eq!(manifest.entities.len(), 4);
    let third = &manifest.entities[2];
    assert_eq!(third.key, "edx_000002");
    assert_eq!(third.get("Ja"), Some(json!(2.0)));
    assert_eq!(third.get("Jb"), Some(json!(4.0)));
    assert_eq!(third.get("seed"), Some(json!(2)));
    assert_eq!(third.get("index_spectra"), Some(json!(2)));
    assert_eq!(third.get("prov_generator"), Some(json!("edrixs")));
    assert_eq!(third.get("label"), Some(json!("edrixs_test")));
}

#[test]
fn test_contract_yaml_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let text = format!(
        "label: vdp\nkey_prefix: vdp\n\
         data:\n  directory: {}\n  layout: grouped\n\
         artifacts:\n  - type: trajectory\n    dataset: /x\n\
         parameters:\n  location: group_scalars\n  entity_group: runs\n",
        dir.path().display()
    );
    let contract = Contract::from_yaml_str(&text).unwrap();
    let again = Contract::from_yaml_str(&serde_yaml::to_string(&contract).unwrap()).unwrap();
    assert_eq!(contract, again);
    assert_eq!(again.entity_group(), Some("runs"));
    assert_eq!(again.file_pattern(), "**/*.h5");
}

#[test]
fn test_invalid_yaml_is_a_yaml_error() {
    let err = Contract::from_yaml_str("label: [unterminated").unwrap_err();
    assert!(matches!(err, Error::Yaml(_)));
}
