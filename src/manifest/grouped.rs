//! One group per entity inside a file

use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::info;

use super::{join, locator, read_children, read_inline, read_scalars, Artifact, Entity, Job, Manifest};
use crate::contract::ParamLocation;
use crate::layout::Layout;
use crate::source::{normalize, SourceFile, Store};
use crate::Result;

/// Container searched for entity groups when the contract names none
const DEFAULT_ENTITY_GROUP: &str = "samples";

/// Parameter sub-group looked for inside each entity group
const DEFAULT_PARAM_GROUP: &str = "params";

pub(crate) fn generate<S: Store>(job: &Job<'_, S>, files: &[PathBuf]) -> Result<Manifest> {
    let contract = job.contract;
    let location = contract.param_location(Layout::Grouped)?;
    let container = contract.entity_group().unwrap_or(DEFAULT_ENTITY_GROUP);
    let mut manifest = Manifest::default();
    let mut global = 0usize;

    'files: for path in files {
        let rel = job.relative(path);
        let file = job.store.open(path)?;
        let groups = entity_groups(&file, container)?;

        for group in &groups {
            if global >= job.limit {
                break 'files;
            }
            let mut entity = Entity::new(format!("{}_{global:06}", contract.key_prefix));
            entity.set("source_group", group.clone());

            for (name, value) in read_params(&file, group, location, contract.param_group())? {
                entity.set(name, value);
            }
            for art in &contract.artifacts {
                entity.set(format!("path_{}", art.kind), rel.clone());
                entity.set(format!("dataset_{}", art.kind), locator(&join(group, &art.dataset)));
            }
            for extra in &contract.extra_metadata {
                let name = normalize(&extra.dataset);
                if let Some(value) = read_inline(&file, &join(group, name), job.policy.inline_max_elements)? {
                    entity.set(name, value);
                }
            }
            job.finish_row(&mut entity, &Map::new());

            for art in &contract.artifacts {
                manifest.artifacts.push(Artifact {
                    uid: entity.uid.clone(),
                    kind: art.kind.clone(),
                    file: rel.clone(),
                    dataset: locator(&join(group, &art.dataset)),
                    index: None,
                });
            }
            manifest.entities.push(entity);
            global += 1;
        }
        info!("Processed {rel}: {} entity groups (total: {global})", groups.len());
    }
    Ok(manifest)
}

/// Full paths of the entity groups: children of `container` when it
/// exists, otherwise every top-level group.
fn entity_groups<F: SourceFile>(file: &F, container: &str) -> Result<Vec<String>> {
    let base = if file.is_group(container) { normalize(container) } else { "" };
    Ok(file
        .members(base)?
        .into_iter()
        .map(|name| join(base, &name))
        .filter(|path| file.is_group(path))
        .collect())
}

fn read_params<F: SourceFile>(
    file: &F,
    group: &str,
    location: ParamLocation,
    param_group: Option<&str>,
) -> Result<Vec<(String, Value)>> {
    match location {
        ParamLocation::GroupScalars | ParamLocation::Group => {
            let sub = join(group, param_group.unwrap_or(DEFAULT_PARAM_GROUP));
            if file.is_group(&sub) {
                read_children(file, &sub)
            } else {
                read_scalars(file, group)
            }
        }
        ParamLocation::RootScalars => read_scalars(file, group),
        ParamLocation::Manifest => Ok(Vec::new()),
    }
}
