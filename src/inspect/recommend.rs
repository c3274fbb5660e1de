//! Suggestions for the data producer

use super::{Category, InspectionResult};
use crate::layout::Layout;
use crate::source::leaf;

const TIMESTAMP_ATTRS: [&str; 2] = ["created_at", "generated_at"];
const GENERATOR_ATTRS: [&str; 3] = ["generator", "code_version", "software"];
const MATERIAL_ATTRS: [&str; 3] = ["material", "system", "compound"];

/// Recommendations derived from what an inspection found missing or odd.
#[must_use]
pub fn recommendations(result: &InspectionResult) -> Vec<String> {
    let mut recs = Vec::new();
    let has_any = |keys: &[&str]| keys.iter().any(|k| result.root_attrs.contains_key(*k));

    if !has_any(&TIMESTAMP_ATTRS) {
        recs.push("No 'created_at' timestamp - add as HDF5 root attribute".to_string());
    }
    if !has_any(&GENERATOR_ATTRS) {
        recs.push("No 'generator' or 'code_version' - add as HDF5 root attribute".to_string());
    }
    if !has_any(&MATERIAL_ATTRS) {
        recs.push("No 'material' identifier - add as HDF5 root attribute".to_string());
    }

    for ds in result.by_category(Category::Parameter) {
        if ds.stats.is_constant() {
            recs.push(format!(
                "Parameter '{}' is constant - consider moving to provenance/metadata",
                leaf(&ds.name)
            ));
        }
    }

    if result.layout == Layout::PerEntity && result.files.len() > 1 {
        let shared: Vec<&str> = result
            .datasets
            .values()
            .filter(|ds| {
                matches!(
                    ds.category,
                    Some(Category::SharedAxis | Category::ArtifactOrAxis)
                )
            })
            .map(|ds| ds.name.as_str())
            .collect();
        if !shared.is_empty() {
            recs.push(format!(
                "Shared arrays ({}) stored redundantly in every file - consider a single reference file",
                shared.join(", ")
            ));
        }
    }
    recs
}
