//! One file = one entity

use std::path::{Path, PathBuf};

use serde_json::Map;
use tracing::{debug, info, warn};

use super::{locator, read_children, read_inline, read_scalars, Artifact, Entity, Job, Manifest};
use crate::contract::ParamLocation;
use crate::layout::Layout;
use crate::source::{normalize, SourceFile, Store};
use crate::Result;

const PROGRESS_EVERY: usize = 1000;

pub(crate) fn generate<S: Store>(job: &Job<'_, S>, files: &[PathBuf]) -> Result<Manifest> {
    let contract = job.contract;
    let location = contract.param_location(Layout::PerEntity)?;
    let mut manifest = Manifest::default();
    let files = &files[..files.len().min(job.limit)];

    for (i, path) in files.iter().enumerate() {
        let rel = job.relative(path);
        let mut entity = Entity::new(entity_key(&contract.key_prefix, path));

        let file = job.store.open(path)?;
        for (name, value) in read_params(&file, location, contract.param_group())? {
            entity.set(name, value);
        }

        for art in &contract.artifacts {
            if file.dataset(&art.dataset).is_none() {
                warn!("{rel}: artifact dataset {} not found", art.dataset);
            }
            entity.set(format!("path_{}", art.kind), rel.clone());
            entity.set(format!("dataset_{}", art.kind), locator(&art.dataset));
        }

        for extra in &contract.extra_metadata {
            let name = normalize(&extra.dataset);
            if let Some(value) = read_inline(&file, name, job.policy.inline_max_elements)? {
                entity.set(name, value);
            }
        }
        drop(file);

        job.finish_row(&mut entity, &Map::new());
        for art in &contract.artifacts {
            manifest.artifacts.push(Artifact {
                uid: entity.uid.clone(),
                kind: art.kind.clone(),
                file: rel.clone(),
                dataset: locator(&art.dataset),
                index: None,
            });
        }
        manifest.entities.push(entity);

        if (i + 1) % PROGRESS_EVERY == 0 {
            info!("Processed {}/{} entities", i + 1, files.len());
        }
    }
    Ok(manifest)
}

fn read_params<F: SourceFile>(
    file: &F,
    location: ParamLocation,
    group: Option<&str>,
) -> Result<Vec<(String, serde_json::Value)>> {
    match location {
        ParamLocation::RootScalars => read_scalars(file, ""),
        ParamLocation::Group => {
            let group = group.unwrap_or_default();
            if file.is_group(group) {
                read_children(file, group)
            } else {
                debug!("parameter group {group} absent from {}", file.path().display());
                Ok(Vec::new())
            }
        }
        ParamLocation::GroupScalars => {
            let group = group.unwrap_or("params");
            if file.is_group(group) {
                read_scalars(file, group)
            } else {
                read_scalars(file, "")
            }
        }
        ParamLocation::Manifest => Ok(Vec::new()),
    }
}

/// `{prefix}_{file stem}`
fn entity_key(prefix: &str, path: &Path) -> String {
    let stem = path.file_stem().map_or_else(String::new, |s| s.to_string_lossy().into_owned());
    format!("{prefix}_{stem}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{MemoryFile, MemoryStore};
    use serde_json::json;

    fn file() -> impl SourceFile {
        let store = MemoryStore::new().with_file(
            "run_a.h5",
            MemoryFile::new()
                .dataset("J", 1.5)
                .dataset("curve", vec![1.0, 2.0])
                .dataset("params/Ja", 0.5)
                .dataset("params/grid", vec![1_i64, 2]),
        );
        store.open(Path::new("run_a.h5")).unwrap()
    }

    #[test]
    fn test_entity_key_uses_stem() {
        assert_eq!(entity_key("mh", Path::new("/data/x/run_a.h5")), "mh_run_a");
    }

    #[test]
    fn test_param_locations() {
        let f = file();
        assert_eq!(
            read_params(&f, ParamLocation::RootScalars, None).unwrap(),
            vec![("J".to_string(), json!(1.5))]
        );
        assert_eq!(
            read_params(&f, ParamLocation::Group, Some("/params")).unwrap(),
            vec![("Ja".to_string(), json!(0.5)), ("grid".to_string(), json!([1, 2]))]
        );
        assert_eq!(
            read_params(&f, ParamLocation::GroupScalars, None).unwrap(),
            vec![("Ja".to_string(), json!(0.5))]
        );
        assert!(read_params(&f, ParamLocation::Group, Some("missing")).unwrap().is_empty());
        assert!(read_params(&f, ParamLocation::Manifest, None).unwrap().is_empty());
    }
}
