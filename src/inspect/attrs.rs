//! HDF5 attribute reading

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::Value;
use tracing::warn;

use crate::source::{ArrayData, SourceFile, Store};
use crate::text::shape_tuple;
use crate::Result;

/// Attribute values of one object, keyed by name.
pub type Attrs = BTreeMap<String, Value>;

/// Root, group and dataset attributes of one file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttributeSet {
    /// Root group attributes
    pub root: Attrs,
    /// Non-empty group attributes keyed by group path
    pub groups: BTreeMap<String, Attrs>,
    /// Non-empty dataset attributes keyed by dataset path
    pub datasets: BTreeMap<String, Attrs>,
}

/// Native value of an attribute.
///
/// Scalars stay scalars; arrays of at most `max_elements` become lists;
/// larger arrays become an `array((shape), dtype)` placeholder.
#[must_use]
pub fn attr_value(data: &ArrayData, max_elements: usize) -> Value {
    if data.ndim() == 0 || data.len() <= max_elements {
        return data.to_value();
    }
    Value::String(format!(
        "array({}, {})",
        shape_tuple(data.shape()),
        data.values().dtype()
    ))
}

/// Read attributes of the root, `groups` and `datasets` of `path`.
///
/// Failures are logged and yield an empty set.
#[must_use]
pub fn read_attributes<S: Store>(
    store: &S,
    path: &Path,
    datasets: &[String],
    groups: &[String],
    max_elements: usize,
) -> AttributeSet {
    match try_read_attributes(store, path, datasets, groups, max_elements) {
        Ok(set) => set,
        Err(e) => {
            warn!("Could not read attributes of {}: {e}", path.display());
            AttributeSet::default()
        }
    }
}

fn try_read_attributes<S: Store>(
    store: &S,
    path: &Path,
    datasets: &[String],
    groups: &[String],
    max_elements: usize,
) -> Result<AttributeSet> {
    let file = store.open(path)?;
    let convert = |object: &str| -> Result<Attrs> {
        Ok(file
            .attrs(object)?
            .iter()
            .map(|(k, v)| (k.clone(), attr_value(v, max_elements)))
            .collect())
    };

    let mut set = AttributeSet {
        root: convert("")?,
        ..AttributeSet::default()
    };
    for group in groups {
        let attrs = convert(group)?;
        if !attrs.is_empty() {
            set.groups.insert(group.clone(), attrs);
        }
    }
    for dataset in datasets {
        let attrs = convert(dataset)?;
        if !attrs.is_empty() {
            set.datasets.insert(dataset.clone(), attrs);
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryFile, MemoryStore};
    use serde_json::json;

    #[test]
    fn test_attr_value_conversion() {
        assert_eq!(attr_value(&ArrayData::from("edrixs"), 10), json!("edrixs"));
        assert_eq!(attr_value(&ArrayData::from(vec![1.0, 2.0]), 10), json!([1.0, 2.0]));
        let big = ArrayData::from(vec![0.0; 20]);
        assert_eq!(attr_value(&big, 10), json!("array((20,), float64)"));
    }

    #[test]
    fn test_read_attributes_skips_empty() {
        let store = MemoryStore::new().with_file(
            "a.h5",
            MemoryFile::new()
                .dataset("params/Ja", vec![1.0])
                .dataset("energy", vec![1.0])
                .attr("", "generator", "edrixs")
                .attr("params", "units", "eV"),
        );
        let set = read_attributes(
            &store,
            Path::new("a.h5"),
            &["params/Ja".to_string(), "energy".to_string()],
            &["params".to_string()],
            10,
        );
        assert_eq!(set.root["generator"], json!("edrixs"));
        assert_eq!(set.groups["params"]["units"], json!("eV"));
        assert!(set.datasets.is_empty());
    }

    #[test]
    fn test_unopenable_file_gives_empty_set() {
        let set = read_attributes(&MemoryStore::new(), Path::new("x.h5"), &[], &[], 10);
        assert_eq!(set, AttributeSet::default());
    }
}
