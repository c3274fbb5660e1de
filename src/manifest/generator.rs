//! Pluggable generators
//!
//! Registration only needs entity and artifact rows; where they come from
//! is up to the generator. [`ContractGenerator`] is the built-in one, driven
//! by a dataset contract. Custom generators for other source formats
//! implement [`ManifestGenerator`] directly.

use std::path::Path;

use super::{write_manifest, Generator, Manifest};
use crate::contract::Contract;
use crate::source::Store;
use crate::Result;

/// Produces the rows of one dataset family.
pub trait ManifestGenerator {
    /// Generate up to `n_entities` entities (all when `None`), persist the
    /// tables under `output_dir` and return the rows.
    ///
    /// # Errors
    /// Returns error if generation or writing fails; nothing partial is
    /// returned
    fn generate(&self, output_dir: &Path, n_entities: Option<usize>) -> Result<Manifest>;
}

/// [`ManifestGenerator`] backed by a contract and a [`Store`].
#[derive(Debug, Clone)]
pub struct ContractGenerator<S> {
    contract: Contract,
    generator: Generator<S>,
}

impl<S: Store> ContractGenerator<S> {
    /// Generator for `contract` reading through `store`.
    #[must_use]
    pub fn new(contract: Contract, store: S) -> Self {
        Self {
            contract,
            generator: Generator::new(store),
        }
    }

    /// The contract driving generation
    #[must_use]
    pub const fn contract(&self) -> &Contract {
        &self.contract
    }
}

impl<S: Store> ManifestGenerator for ContractGenerator<S> {
    fn generate(&self, output_dir: &Path, n_entities: Option<usize>) -> Result<Manifest> {
        let manifest = self.generator.generate(&self.contract, n_entities)?;
        write_manifest(&manifest, output_dir)?;
        Ok(manifest)
    }
}
