//! Entities stacked along axis 0
//!
//! Keys use a zero-padded counter that runs across all files, so two files
//! never produce the same key. Parameter and extra-metadata arrays are read
//! once per file and indexed per entity.

use std::path::PathBuf;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{join, locator, Artifact, Entity, Job, Manifest};
use crate::contract::ParamLocation;
use crate::inspect::attr_value;
use crate::layout::Layout;
use crate::source::{leaf, normalize, ArrayData, SourceFile, Slab, Store};
use crate::{Error, Result};

pub(crate) fn generate<S: Store>(job: &Job<'_, S>, files: &[PathBuf]) -> Result<Manifest> {
    let contract = job.contract;
    let location = contract.param_location(Layout::Batched)?;
    let Some(first) = contract.artifacts.first() else {
        return Err(Error::Manifest("batched layout needs at least one artifact".to_string()));
    };
    let mut manifest = Manifest::default();
    let mut global = 0usize;

    for path in files {
        if global >= job.limit {
            break;
        }
        let rel = job.relative(path);
        let file = job.store.open(path)?;

        let batch_size = axis0(&file, &first.dataset)?;
        for art in &contract.artifacts[1..] {
            let len = axis0(&file, &art.dataset)?;
            if len != batch_size {
                return Err(Error::Manifest(format!(
                    "{rel}: artifact {} has {len} rows, expected {batch_size} (from {})",
                    art.dataset, first.dataset
                )));
            }
        }

        let params = read_param_arrays(&file, location, contract.param_group(), batch_size)?;
        let extras = read_extra_arrays(&file, job, batch_size)?;
        let attrs: Map<String, Value> = file
            .attrs("")?
            .iter()
            .map(|(k, v)| (k.clone(), attr_value(v, job.policy.attr_max_elements)))
            .collect();
        drop(file);

        let take = batch_size.min(job.limit - global);
        for i in 0..take {
            let mut entity = Entity::new(format!("{}_{global:06}", contract.key_prefix));
            for (name, data) in &params {
                entity.set(name.clone(), data.row(i)?.to_value());
            }
            for art in &contract.artifacts {
                entity.set(format!("path_{}", art.kind), rel.clone());
                entity.set(format!("dataset_{}", art.kind), locator(&art.dataset));
                entity.set(format!("index_{}", art.kind), i);
            }
            for (name, data) in &extras {
                entity.set(name.clone(), data.row(i)?.to_value());
            }
            job.finish_row(&mut entity, &attrs);

            for art in &contract.artifacts {
                manifest.artifacts.push(Artifact {
                    uid: entity.uid.clone(),
                    kind: art.kind.clone(),
                    file: rel.clone(),
                    dataset: locator(&art.dataset),
                    index: Some(i as u64),
                });
            }
            manifest.entities.push(entity);
            global += 1;
        }
        info!("Processed {rel}: {take} entities (total: {global})");
    }
    Ok(manifest)
}

fn axis0<F: SourceFile>(file: &F, dataset: &str) -> Result<usize> {
    let meta = file.dataset(dataset).ok_or_else(|| Error::NotFound {
        file: file.path().display().to_string(),
        path: normalize(dataset).to_string(),
    })?;
    meta.shape.first().copied().ok_or_else(|| {
        Error::Manifest(format!(
            "{}: artifact {dataset} is a scalar, cannot hold a batch",
            file.path().display()
        ))
    })
}

/// Arrays long enough to index every entity of the batch.
fn require_rows(file_path: &str, name: &str, data: &ArrayData, batch_size: usize) -> Result<()> {
    match data.shape().first() {
        Some(&rows) if rows >= batch_size => Ok(()),
        found => Err(Error::Manifest(format!(
            "{file_path}: {name} has {} rows, batch needs {batch_size}",
            found.copied().unwrap_or(0)
        ))),
    }
}

fn read_param_arrays<F: SourceFile>(
    file: &F,
    location: ParamLocation,
    group: Option<&str>,
    batch_size: usize,
) -> Result<Vec<(String, ArrayData)>> {
    let file_path = file.path().display().to_string();
    let mut arrays = Vec::new();
    match location {
        ParamLocation::Group | ParamLocation::GroupScalars => {
            let group = group.unwrap_or("params");
            if !file.is_group(group) {
                debug!("parameter group {group} absent from {file_path}");
                return Ok(arrays);
            }
            for name in file.members(group)? {
                let path = join(group, &name);
                if file.dataset(&path).is_none() {
                    continue;
                }
                let data = file.read(&path, Slab::All)?;
                require_rows(&file_path, &path, &data, batch_size)?;
                arrays.push((name, data));
            }
        }
        ParamLocation::RootScalars => {
            for name in file.members("")? {
                let is_column = file
                    .dataset(&name)
                    .is_some_and(|meta| meta.shape == [batch_size]);
                if is_column {
                    arrays.push((name.clone(), file.read(&name, Slab::All)?));
                }
            }
        }
        ParamLocation::Manifest => {}
    }
    Ok(arrays)
}

fn read_extra_arrays<S: Store, F: SourceFile>(
    file: &F,
    job: &Job<'_, S>,
    batch_size: usize,
) -> Result<Vec<(String, ArrayData)>> {
    let mut arrays = Vec::new();
    for extra in &job.contract.extra_metadata {
        let path = normalize(&extra.dataset);
        match file.dataset(path) {
            Some(meta) if meta.shape.first() == Some(&batch_size) => {
                arrays.push((leaf(path).to_string(), file.read(path, Slab::All)?));
            }
            Some(meta) => debug!("extra metadata {path} shape {:?} is not per entity", meta.shape),
            None => debug!("extra metadata {path} absent from {}", file.path().display()),
        }
    }
    Ok(arrays)
}
