//! Layout vocabulary and inspection policy
//!
//! The three layout tags are shared by the inspection pipeline (which infers
//! one) and the manifest generators (which consume one from a contract).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Storage pattern of a source corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// One file holds exactly one entity.
    #[default]
    PerEntity,
    /// Entities are stacked along axis 0 of the datasets in each file.
    Batched,
    /// One HDF5 group per entity inside a file.
    Grouped,
}

impl Layout {
    /// All layout tags, in contract order.
    pub const ALL: [Self; 3] = [Self::PerEntity, Self::Batched, Self::Grouped];

    /// Contract spelling of the tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PerEntity => "per_entity",
            Self::Batched => "batched",
            Self::Grouped => "grouped",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|layout| layout.as_str() == s)
            .ok_or_else(|| Error::UnknownLayout(s.to_string()))
    }
}

/// Heuristic thresholds used by inspection and generation.
///
/// The defaults are empirical values carried over from production corpora.
/// They have no derivation beyond that and should be reviewed by someone who
/// knows the data before being trusted on unfamiliar shapes.
///
/// # Example
///
/// ```rust
/// use h5_broker::InspectPolicy;
///
/// let policy = InspectPolicy::default().with_batch_min_len_multi_file(50);
/// assert_eq!(policy.batch_min_len_multi_file, 50);
/// assert_eq!(policy.grouped_min_groups, 5);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectPolicy {
    /// A single file is `grouped` when it holds MORE than this many
    /// top-level groups that contain datasets.
    pub grouped_min_groups: usize,
    /// Minimum number of datasets that must share an axis-0 length.
    pub batch_min_datasets: usize,
    /// Shared axis-0 length required to call a multi-file corpus batched.
    pub batch_min_len_multi_file: usize,
    /// Files opened to gather per-entity scalar parameter statistics.
    pub param_sample_files: usize,
    /// Additional files compared against the reference file.
    pub consistency_max_files: usize,
    /// Files whose shared axes are compared value-by-value.
    pub shared_axis_spot_checks: usize,
    /// Rows read when peeking at batched metadata arrays.
    pub peek_rows: usize,
    /// Leading samples tested for monotonicity.
    pub monotonic_window: usize,
    /// Largest 1-D extra-metadata dataset inlined as a list column.
    pub inline_max_elements: usize,
    /// Largest attribute array converted to a list.
    pub attr_max_elements: usize,
}

impl Default for InspectPolicy {
    fn default() -> Self {
        Self {
            grouped_min_groups: 5,
            batch_min_datasets: 3,
            batch_min_len_multi_file: 100,
            param_sample_files: 100,
            consistency_max_files: 10,
            shared_axis_spot_checks: 3,
            peek_rows: 10,
            monotonic_window: 100,
            inline_max_elements: 10,
            attr_max_elements: 10,
        }
    }
}

impl InspectPolicy {
    /// Load a policy from YAML text; missing keys keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the text is not valid YAML for this structure
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Set the grouped-layout group threshold
    #[must_use]
    pub fn with_grouped_min_groups(mut self, n: usize) -> Self {
        self.grouped_min_groups = n;
        self
    }

    /// Set how many datasets must share an axis-0 length
    #[must_use]
    pub fn with_batch_min_datasets(mut self, n: usize) -> Self {
        self.batch_min_datasets = n;
        self
    }

    /// Set the multi-file batch length floor
    #[must_use]
    pub fn with_batch_min_len_multi_file(mut self, n: usize) -> Self {
        self.batch_min_len_multi_file = n;
        self
    }

    /// Set the parameter sampling cap
    #[must_use]
    pub fn with_param_sample_files(mut self, n: usize) -> Self {
        self.param_sample_files = n;
        self
    }

    /// Set the consistency check file cap
    #[must_use]
    pub fn with_consistency_max_files(mut self, n: usize) -> Self {
        self.consistency_max_files = n;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_roundtrip_str() {
        for layout in Layout::ALL {
            assert_eq!(layout.as_str().parse::<Layout>().unwrap(), layout);
        }
    }

    #[test]
    fn test_unknown_layout_is_error() {
        let err = "stacked".parse::<Layout>().unwrap_err();
        assert!(matches!(err, Error::UnknownLayout(ref s) if s == "stacked"));
    }

    #[test]
    fn test_layout_serde_snake_case() {
        let yaml = serde_yaml::to_string(&Layout::PerEntity).unwrap();
        assert_eq!(yaml.trim(), "per_entity");
    }

    #[test]
    fn test_policy_partial_yaml_keeps_defaults() {
        let policy = InspectPolicy::from_yaml_str("batch_min_len_multi_file: 64\n").unwrap();
        assert_eq!(policy.batch_min_len_multi_file, 64);
        assert_eq!(policy.batch_min_datasets, 3);
        assert_eq!(policy.param_sample_files, 100);
    }
}
