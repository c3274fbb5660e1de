//! # h5-broker: HDF5 Dataset Onboarding
//!
//! **Version**: 0.1.0
//!
//! h5-broker looks at unlabeled directories of HDF5 files, works out how
//! they are organized, drafts a dataset contract for a person to confirm,
//! and turns the confirmed contract into entity and artifact manifests a
//! catalog can register.
//!
//! Two pipelines share the layout vocabulary (`per_entity`, `batched`,
//! `grouped`) but run independently:
//!
//! 1. **Inspect** ([`inspect`], [`contract::emit`]): scan, walk, detect the
//!    layout, classify and sample datasets, check cross-file consistency,
//!    render a draft YAML contract with `TODO` markers.
//! 2. **Generate** ([`manifest`], [`catalog`]): validate a finalized
//!    [`Contract`], emit entity/artifact rows, write Parquet, prepare
//!    catalog nodes.
//!
//! ## Design Principles (Toyota Way Aligned)
//!
//! - **Jidoka**: invalid contracts and inconsistent batches stop generation
//! - **Poka-Yoke**: ambiguous arrays are surfaced as `ARTIFACT_OR_AXIS`,
//!   never guessed
//! - **Genchi Genbutsu**: statistics and consistency come from reading the
//!   files themselves
//!
//! ## Example Usage
//!
//! ```rust
//! use h5_broker::inspect::{Category, Inspector};
//! use h5_broker::source::{ArrayData, MemoryFile, MemoryStore};
//! use h5_broker::Layout;
//!
//! let spectra = ArrayData::float(&[500, 6, 4], vec![0.0; 500 * 24])?;
//! let ja: Vec<f64> = (0..500).map(f64::from).collect();
//! let store = MemoryStore::new().with_file(
//!     "data/batch.h5",
//!     MemoryFile::new()
//!         .dataset("params/Ja", ja.clone())
//!         .dataset("params/Jb", ja)
//!         .dataset("spectra", spectra),
//! );
//!
//! let result = Inspector::new(&store).inspect_files("data", vec!["data/batch.h5".into()], "*.h5");
//! assert_eq!(result.layout, Layout::Batched);
//! assert_eq!(result.batch_size, 500);
//! assert_eq!(result.datasets["spectra"].category, Some(Category::Artifact));
//! # Ok::<(), h5_broker::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod catalog;
pub mod contract;
pub mod error;
pub mod inspect;
pub mod layout;
pub mod manifest;
pub mod source;
pub mod text;

pub use catalog::{prepare_node_data, ShapeCache};
pub use contract::Contract;
pub use error::{Error, Result};
pub use inspect::{InspectionResult, Inspector};
pub use layout::{InspectPolicy, Layout};
pub use manifest::{Artifact, Entity, Generator, Manifest, ManifestGenerator};
