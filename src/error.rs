//! Error types for h5-broker
//!
//! Only configuration and generation problems are errors. Per-file and
//! per-dataset failures during inspection are recorded in the result instead.

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Every violation found while validating a dataset contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractErrors(pub Vec<String>);

impl std::fmt::Display for ContractErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} validation error(s):", self.0.len())?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

/// h5-broker error types
#[derive(Error, Debug)]
pub enum Error {
    /// Dataset contract failed validation (all violations, not just the first)
    #[error("Contract invalid: {0}")]
    Contract(ContractErrors),

    /// Layout tag outside `per_entity | batched | grouped`
    #[error("Unknown layout '{0}'\nExpected one of: per_entity, batched, grouped")]
    UnknownLayout(String),

    /// Data directory does not exist or is not a directory
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),

    /// No HDF5 files matched the contract's file pattern
    #[error("No HDF5 files matching '{pattern}' in {directory}")]
    NoFiles {
        /// Data directory that was searched
        directory: String,
        /// Glob pattern that matched nothing
        pattern: String,
    },

    /// Object path absent from a source file
    #[error("Object not found: {path} in {file}")]
    NotFound {
        /// Source file
        file: String,
        /// Dataset or group path inside the file
        path: String,
    },

    /// Source file could not be opened or read
    #[error("Source error: {0}")]
    Source(String),

    /// A manifest table lacks a column downstream registration needs
    #[error("Manifest missing required column '{column}' in {table} table")]
    MissingColumn {
        /// Table name (`entities` or `artifacts`)
        table: String,
        /// Missing column name
        column: String,
    },

    /// Manifest generation cannot proceed without producing wrong rows
    #[error("Manifest generation failed: {0}")]
    Manifest(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HDF5 library error
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// YAML parse/serialize error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Malformed file pattern
    #[error("Invalid file pattern: {0}")]
    Glob(#[from] globset::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
