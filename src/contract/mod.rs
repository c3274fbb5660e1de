//! Dataset contracts
//!
//! A contract is the human-reviewed YAML document that tells the manifest
//! generators how a corpus is laid out: identity (`label`, `key_prefix`),
//! where the files are (`data`), which datasets are artifacts, where the
//! parameters live, and any provenance to stamp on every entity.
//!
//! Toyota Way Principles:
//! - Jidoka: validation stops on a malformed contract before any rows exist
//! - Genchi Genbutsu: every violation is reported at once, not just the first

pub mod emit;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::error::ContractErrors;
use crate::layout::Layout;
use crate::text::name_set;
use crate::{Error, Result};

pub use emit::{default_draft_path, emit_draft, render_draft, write_draft};

/// File pattern used when a contract does not set `data.file_pattern`
pub const DEFAULT_FILE_PATTERN: &str = "**/*.h5";

/// Where a contract's parameters come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamLocation {
    /// Scalar datasets at the file root
    RootScalars,
    /// Children of a named group
    Group,
    /// Scalars inside each entity group (or its params sub-group)
    GroupScalars,
    /// An external manifest; nothing is read from HDF5
    Manifest,
}

impl ParamLocation {
    /// All accepted locations
    pub const ALL: [Self; 4] = [Self::RootScalars, Self::Group, Self::GroupScalars, Self::Manifest];

    /// Contract tag
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RootScalars => "root_scalars",
            Self::Group => "group",
            Self::GroupScalars => "group_scalars",
            Self::Manifest => "manifest",
        }
    }

    /// Location used when the contract leaves it unset.
    #[must_use]
    pub const fn default_for(layout: Layout) -> Self {
        match layout {
            Layout::PerEntity => Self::RootScalars,
            Layout::Batched => Self::Group,
            Layout::Grouped => Self::GroupScalars,
        }
    }
}

impl fmt::Display for ParamLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParamLocation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|loc| loc.as_str() == s)
            .ok_or_else(|| Error::Other(format!("Unknown parameter location '{s}'")))
    }
}

/// `data:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSection {
    /// Root directory of the corpus
    #[serde(default)]
    pub directory: String,
    /// Glob relative to `directory`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_pattern: Option<String>,
    /// Layout tag, kept raw so validation can report bad values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
}

/// One artifact or shared-axis entry: a type name mapped to a dataset path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArraySpec {
    /// Artifact type, used in column and node names
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Dataset path inside the file
    #[serde(default)]
    pub dataset: String,
}

impl ArraySpec {
    /// New entry
    #[must_use]
    pub fn new(kind: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            dataset: dataset.into(),
        }
    }
}

/// `extra_metadata:` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraSpec {
    /// Dataset path inside the file
    #[serde(default)]
    pub dataset: String,
}

/// `parameters:` section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameters {
    /// Location tag, kept raw so validation can report bad values
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Group holding the parameters (`group`, `group_scalars`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    /// External parameter manifest (`manifest`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,
    /// Container of the entity groups (grouped layout)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_group: Option<String>,
}

/// A dataset contract.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    /// Dataset name
    #[serde(default)]
    pub label: String,
    /// Prefix of every entity key
    #[serde(default)]
    pub key_prefix: String,
    /// Where the files are
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<DataSection>,
    /// Per-entity arrays to register
    #[serde(default)]
    pub artifacts: Vec<ArraySpec>,
    /// Parameter location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Parameters>,
    /// Coordinate axes shared by every entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shared: Vec<ArraySpec>,
    /// Small per-entity datasets to inline as columns
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_metadata: Vec<ExtraSpec>,
    /// Key/value pairs stamped on every entity as `prov_*` columns
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub provenance: Map<String, Value>,
}

impl Contract {
    /// Parse without validating.
    ///
    /// # Errors
    /// Returns error if the text is not a YAML mapping of the contract shape
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Parse and validate, logging any warnings.
    ///
    /// # Errors
    /// Returns [`Error::Contract`] listing every violation, or a YAML error
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let contract = Self::parse(text)?;
        for warning in contract.validate()? {
            warn!("{warning}");
        }
        Ok(contract)
    }

    /// Read, parse and validate a contract file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read or the contract is invalid
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading contract {}", path.display());
        Self::from_yaml_str(&std::fs::read_to_string(path)?)
    }

    /// Check the contract, returning non-fatal warnings.
    ///
    /// # Errors
    /// Returns [`Error::Contract`] with every violation found
    pub fn validate(&self) -> Result<Vec<String>> {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        if self.label.is_empty() {
            errors.push("'label' is required (e.g., edrixs_sbi)".to_string());
        }
        if self.key_prefix.is_empty() {
            errors.push("'key_prefix' is required (e.g., edrixs)".to_string());
        }

        match &self.data {
            None => errors.push("'data' section is required".to_string()),
            Some(data) => {
                if data.directory.is_empty() {
                    errors.push("'data.directory' is required".to_string());
                } else if !Path::new(&data.directory).is_dir() {
                    errors.push(format!("'data.directory' does not exist: {}", data.directory));
                }
                match data.layout.as_deref() {
                    None | Some("") => errors.push(
                        "'data.layout' is required (per_entity | batched | grouped)".to_string(),
                    ),
                    Some(tag) if tag.parse::<Layout>().is_err() => {
                        let valid: Vec<String> = Layout::ALL.iter().map(ToString::to_string).collect();
                        errors.push(format!("'data.layout' must be one of {}, got '{tag}'", name_set(&valid)));
                    }
                    Some(_) => {}
                }
                if is_blank(data.file_pattern.as_deref()) {
                    warnings.push(format!(
                        "'data.file_pattern' not set - will default to '{DEFAULT_FILE_PATTERN}'"
                    ));
                }
            }
        }

        if self.artifacts.is_empty() {
            errors.push("'artifacts' list is required (at least one artifact)".to_string());
        }
        check_arrays("artifacts", &self.artifacts, &mut errors);

        if let Some(params) = &self.parameters {
            let location = params.location.as_deref().filter(|loc| !loc.is_empty());
            if let Some(loc) = location {
                if loc.parse::<ParamLocation>().is_err() {
                    let valid: Vec<String> =
                        ParamLocation::ALL.iter().map(ToString::to_string).collect();
                    errors.push(format!(
                        "'parameters.location' must be one of {}, got '{loc}'",
                        name_set(&valid)
                    ));
                }
            }
            if location == Some("group") && is_blank(params.group.as_deref()) {
                errors.push("'parameters.group' is required when location is 'group'".to_string());
            }
            if location == Some("manifest") && is_blank(params.manifest.as_deref()) {
                errors.push("'parameters.manifest' is required when location is 'manifest'".to_string());
            }
        }

        check_arrays("shared", &self.shared, &mut errors);

        if errors.is_empty() {
            Ok(warnings)
        } else {
            Err(Error::Contract(ContractErrors(errors)))
        }
    }

    /// Parsed layout tag.
    ///
    /// # Errors
    /// Returns [`Error::UnknownLayout`] for a missing or unrecognized tag
    pub fn layout(&self) -> Result<Layout> {
        self.data
            .as_ref()
            .and_then(|data| data.layout.as_deref())
            .unwrap_or_default()
            .parse()
    }

    /// Data directory (empty when the section is missing).
    #[must_use]
    pub fn directory(&self) -> PathBuf {
        self.data
            .as_ref()
            .map(|data| PathBuf::from(&data.directory))
            .unwrap_or_default()
    }

    /// File pattern, defaulting to `**/*.h5`.
    #[must_use]
    pub fn file_pattern(&self) -> &str {
        self.data
            .as_ref()
            .and_then(|data| data.file_pattern.as_deref())
            .filter(|pattern| !pattern.is_empty())
            .unwrap_or(DEFAULT_FILE_PATTERN)
    }

    /// Effective parameter location for `layout`.
    ///
    /// # Errors
    /// Returns error for an unrecognized location tag
    pub fn param_location(&self, layout: Layout) -> Result<ParamLocation> {
        match self
            .parameters
            .as_ref()
            .and_then(|p| p.location.as_deref())
            .filter(|loc| !loc.is_empty())
        {
            Some(loc) => loc.parse(),
            None => Ok(ParamLocation::default_for(layout)),
        }
    }

    /// `parameters.group`, if set.
    #[must_use]
    pub fn param_group(&self) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.group.as_deref())
            .filter(|g| !g.is_empty())
    }

    /// `parameters.entity_group`, if set.
    #[must_use]
    pub fn entity_group(&self) -> Option<&str> {
        self.parameters
            .as_ref()
            .and_then(|p| p.entity_group.as_deref())
            .filter(|g| !g.is_empty())
    }
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, str::is_empty)
}

fn check_arrays(section: &str, specs: &[ArraySpec], errors: &mut Vec<String>) {
    for (i, spec) in specs.iter().enumerate() {
        if spec.kind.is_empty() {
            errors.push(format!("{section}[{i}].type is required"));
        }
        if spec.dataset.is_empty() {
            errors.push(format!("{section}[{i}].dataset is required"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(directory: &Path) -> String {
        format!(
            "label: mh_curves\n\
             key_prefix: mh\n\
             data:\n  directory: {}\n  file_pattern: \"*.h5\"\n  layout: per_entity\n\
             artifacts:\n  - type: mh_curve\n    dataset: /curve\n\
             provenance:\n  code: edrixs\n  version: 2\n",
            directory.display()
        )
    }

    #[test]
    fn test_valid_contract() {
        let dir = tempfile::tempdir().unwrap();
        let contract = Contract::from_yaml_str(&yaml(dir.path())).unwrap();
        assert_eq!(contract.label, "mh_curves");
        assert_eq!(contract.layout().unwrap(), Layout::PerEntity);
        assert_eq!(contract.file_pattern(), "*.h5");
        assert_eq!(contract.artifacts, vec![ArraySpec::new("mh_curve", "/curve")]);
        assert_eq!(contract.param_location(Layout::PerEntity).unwrap(), ParamLocation::RootScalars);
        let keys: Vec<&String> = contract.provenance.keys().collect();
        assert_eq!(keys, ["code", "version"]);
    }

    #[test]
    fn test_missing_pattern_warns() {
        let dir = tempfile::tempdir().unwrap();
        let text = yaml(dir.path()).replace("  file_pattern: \"*.h5\"\n", "");
        let warnings = Contract::parse(&text).unwrap().validate().unwrap();
        assert_eq!(warnings, vec!["'data.file_pattern' not set - will default to '**/*.h5'"]);
        assert_eq!(Contract::parse(&text).unwrap().file_pattern(), DEFAULT_FILE_PATTERN);
    }

    #[test]
    fn test_all_errors_reported() {
        let contract = Contract::parse(
            "data:\n  directory: /definitely/not/here\n  layout: stacked\n\
             parameters:\n  location: group\n\
             shared:\n  - type: energy\n",
        )
        .unwrap();
        let Err(Error::Contract(ContractErrors(errors))) = contract.validate() else {
            panic!("expected contract errors");
        };
        assert_eq!(
            errors,
            vec![
                "'label' is required (e.g., edrixs_sbi)",
                "'key_prefix' is required (e.g., edrixs)",
                "'data.directory' does not exist: /definitely/not/here",
                "'data.layout' must be one of {'batched', 'grouped', 'per_entity'}, got 'stacked'",
                "'artifacts' list is required (at least one artifact)",
                "'parameters.group' is required when location is 'group'",
                "shared[0].dataset is required",
            ]
        );
    }

    #[test]
    fn test_missing_data_section() {
        let contract = Contract::parse("label: x\nkey_prefix: x\nartifacts:\n  - dataset: /a\n").unwrap();
        let err = contract.validate().unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("2 validation error(s)"));
        assert!(msg.contains("'data' section is required"));
        assert!(msg.contains("artifacts[0].type is required"));
        assert!(matches!(contract.layout(), Err(Error::UnknownLayout(_))));
    }

    #[test]
    fn test_bad_param_location() {
        let dir = tempfile::tempdir().unwrap();
        let text = format!("{}parameters:\n  location: sidecar\n", yaml(dir.path()));
        let err = Contract::from_yaml_str(&text).unwrap_err();
        assert!(err
            .to_string()
            .contains("'parameters.location' must be one of {'group', 'group_scalars', 'manifest', 'root_scalars'}, got 'sidecar'"));

        let text = format!("{}parameters:\n  location: manifest\n", yaml(dir.path()));
        assert!(Contract::from_yaml_str(&text).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mh.yml");
        std::fs::write(&path, yaml(dir.path())).unwrap();
        let contract = Contract::load(&path).unwrap();
        assert_eq!(contract.key_prefix, "mh");
        assert_eq!(contract.directory(), dir.path());
    }

    #[test]
    fn test_param_location_defaults() {
        assert_eq!(ParamLocation::default_for(Layout::Batched), ParamLocation::Group);
        assert_eq!(ParamLocation::default_for(Layout::Grouped), ParamLocation::GroupScalars);
        assert_eq!("group_scalars".parse::<ParamLocation>().unwrap(), ParamLocation::GroupScalars);
    }
}
