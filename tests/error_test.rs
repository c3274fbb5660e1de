//! Tests for error types

use h5_broker::error::ContractErrors;
use h5_broker::Error;

#[test]
fn test_contract_error_lists_every_violation() {
    let error = Error::Contract(ContractErrors(vec![
        "'label' is required (e.g., edrixs_sbi)".to_string(),
        "'artifacts' list is required (at least one artifact)".to_string(),
    ]));
    let error_str = format!("{error}");
    assert!(error_str.contains("Contract invalid: 2 validation error(s):"));
    assert!(error_str.contains("\n  - 'label' is required"));
    assert!(error_str.contains("\n  - 'artifacts' list is required"));
}

#[test]
fn test_unknown_layout_error() {
    let error = Error::UnknownLayout("stacked".to_string());
    let error_str = format!("{error}");
    assert!(error_str.contains("Unknown layout 'stacked'"));
    assert!(error_str.contains("per_entity, batched, grouped"));
}

#[test]
fn test_no_files_error() {
    let error = Error::NoFiles {
        directory: "/data/mh".to_string(),
        pattern: "*.h5".to_string(),
    };
    assert_eq!(error.to_string(), "No HDF5 files matching '*.h5' in /data/mh");
}

#[test]
fn test_not_found_error() {
    let error = Error::NotFound {
        file: "a.h5".to_string(),
        path: "params/Ja".to_string(),
    };
    assert_eq!(error.to_string(), "Object not found: params/Ja in a.h5");
}

#[test]
fn test_missing_column_error() {
    let error = Error::MissingColumn {
        table: "entities".to_string(),
        column: "key".to_string(),
    };
    let error_str = format!("{error}");
    assert!(error_str.contains("missing required column 'key'"));
    assert!(error_str.contains("entities table"));
}

#[test]
fn test_manifest_error() {
    let error = Error::Manifest("batch mismatch".to_string());
    assert_eq!(error.to_string(), "Manifest generation failed: batch mismatch");
}

#[test]
fn test_io_error_conversion() {
    let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
    let error: Error = io_error.into();
    let error_str = format!("{error}");
    assert!(error_str.contains("IO error"));
    assert!(error_str.contains("file not found"));
}

#[test]
fn test_yaml_error_conversion() {
    let yaml_error = serde_yaml::from_str::<Vec<u8>>("{").unwrap_err();
    let error: Error = yaml_error.into();
    assert!(error.to_string().starts_with("YAML error"));
}

#[test]
fn test_glob_error_conversion() {
    let glob_error = globset::Glob::new("run_[0-9.h5").unwrap_err();
    let error: Error = glob_error.into();
    assert!(error.to_string().starts_with("Invalid file pattern"));
}

#[test]
fn test_other_error() {
    let error = Error::Other("unknown parameter location 'x'".to_string());
    assert_eq!(error.to_string(), "unknown parameter location 'x'");
}

#[test]
fn test_error_debug() {
    let error = Error::DirectoryNotFound("/nope".to_string());
    let debug_str = format!("{error:?}");
    assert!(debug_str.contains("DirectoryNotFound"));
}
