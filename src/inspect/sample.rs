//! Per-category statistics
//!
//! Reads representative values for each classified dataset. A failure on
//! one dataset becomes [`Stats::Error`] for that dataset only.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::{evenly_spaced, Category, DatasetInfo, Stats};
use crate::layout::{InspectPolicy, Layout};
use crate::source::{ArrayData, Slab, SourceFile, Store};
use crate::{Error, Result};

/// Statistics for every classified dataset of the reference file.
///
/// `files[0]` is the reference; the rest are only opened to sample
/// per-entity scalar parameters.
#[must_use]
pub fn sample_stats<S: Store>(
    store: &S,
    files: &[PathBuf],
    datasets: &BTreeMap<String, DatasetInfo>,
    layout: Layout,
    batch_size: usize,
    policy: &InspectPolicy,
) -> BTreeMap<String, Stats> {
    let Some(reference) = files.first() else {
        return BTreeMap::new();
    };
    let file = match store.open(reference) {
        Ok(file) => file,
        Err(e) => {
            warn!("Could not open {} for sampling: {e}", reference.display());
            let message = e.to_string();
            return datasets
                .keys()
                .map(|name| (name.clone(), Stats::Error(message.clone())))
                .collect();
        }
    };

    let sampler = Sampler {
        store,
        files,
        layout,
        batch_size,
        policy,
    };
    datasets
        .iter()
        .filter_map(|(name, ds)| {
            let category = ds.category?;
            let stats = sampler.stats(&file, ds, category).unwrap_or_else(|e| {
                debug!("stats failed for {name}: {e}");
                Stats::Error(e.to_string())
            });
            Some((name.clone(), stats))
        })
        .collect()
}

struct Sampler<'a, S> {
    store: &'a S,
    files: &'a [PathBuf],
    layout: Layout,
    batch_size: usize,
    policy: &'a InspectPolicy,
}

impl<S: Store> Sampler<'_, S> {
    fn stats<F: SourceFile>(&self, file: &F, ds: &DatasetInfo, category: Category) -> Result<Stats> {
        match category {
            Category::Parameter => self.parameter(file, ds),
            Category::Artifact => self.artifact(file, ds),
            Category::SharedAxis => self.shared_axis(file, ds),
            Category::ExtraMetadata | Category::ArtifactOrAxis => self.peek(file, ds),
        }
    }

    fn parameter<F: SourceFile>(&self, file: &F, ds: &DatasetInfo) -> Result<Stats> {
        if self.layout == Layout::PerEntity && ds.ndim() == 0 && self.files.len() > 1 {
            if let Some(stats) = self.parameter_across_files(&ds.name) {
                return Ok(stats);
            }
        }

        let data = file.read(&ds.name, Slab::All)?;
        let values = numeric(&data, &ds.name)?;
        let is_float = data.is_float();
        let finite: Vec<f64> = if is_float {
            values.iter().copied().filter(|v| v.is_finite()).collect()
        } else {
            values.clone()
        };
        if finite.is_empty() {
            return Ok(Stats::Parameter {
                min: None,
                max: None,
                n_unique: 0,
                has_nans: is_float && values.iter().any(|v| v.is_nan()),
                is_constant: true,
                sampled_from: None,
            });
        }
        let (min, max) = nan_min_max(&values);
        Ok(Stats::Parameter {
            min,
            max,
            n_unique: count_unique(&finite),
            has_nans: is_float && values.iter().any(|v| v.is_nan()),
            is_constant: min == max,
            sampled_from: None,
        })
    }

    /// Spread of a per-entity scalar over an evenly strided file sample.
    /// Unreadable files are skipped.
    fn parameter_across_files(&self, name: &str) -> Option<Stats> {
        let sample = evenly_spaced(self.files, self.policy.param_sample_files);
        let values: Vec<f64> = sample
            .iter()
            .filter_map(|path| match read_scalar(self.store, path, name) {
                Ok(value) => Some(value),
                Err(e) => {
                    debug!("skipping {} for {name}: {e}", path.display());
                    None
                }
            })
            .collect();
        if values.is_empty() {
            return None;
        }
        let has_nans = values.iter().any(|v| v.is_nan());
        let (min, max) = if has_nans {
            (Some(f64::NAN), Some(f64::NAN))
        } else {
            nan_min_max(&values)
        };
        Some(Stats::Parameter {
            min,
            max,
            n_unique: count_unique(&values),
            has_nans,
            is_constant: !has_nans && min == max,
            sampled_from: Some(values.len()),
        })
    }

    #[allow(clippy::cast_precision_loss)]
    fn artifact<F: SourceFile>(&self, file: &F, ds: &DatasetInfo) -> Result<Stats> {
        let slab = if self.layout == Layout::Batched && ds.ndim() > 1 {
            Slab::Index(0)
        } else {
            Slab::All
        };
        let sample = file.read(&ds.name, slab)?;
        let values = numeric(&sample, &ds.name)?;
        if values.is_empty() {
            return Err(Error::Other(format!("{} has no elements", ds.name)));
        }
        let (min, max) = nan_min_max(&values);
        let nan_fraction = if sample.is_float() {
            nan_count(&values) as f64 / values.len() as f64
        } else {
            0.0
        };
        Ok(Stats::Artifact {
            shape_per_entity: sample.shape().to_vec(),
            min,
            max,
            nan_fraction,
        })
    }

    fn shared_axis<F: SourceFile>(&self, file: &F, ds: &DatasetInfo) -> Result<Stats> {
        let data = file.read(&ds.name, Slab::All)?;
        let values = numeric(&data, &ds.name)?;
        let one_d = data.ndim() == 1 && values.len() > 1;
        let monotonic = one_d && is_monotonic(&values[..values.len().min(self.policy.monotonic_window)]);
        let range = if values.is_empty() {
            None
        } else {
            Some(propagating_min_max(&values))
        };
        let step = (one_d && monotonic).then(|| mean_step(&values));
        Ok(Stats::SharedAxis {
            shape: data.shape().to_vec(),
            range,
            monotonic,
            step,
        })
    }

    fn peek<F: SourceFile>(&self, file: &F, ds: &DatasetInfo) -> Result<Stats> {
        let batched = self.layout == Layout::Batched;
        let slab = if batched && ds.shape.first() == Some(&self.batch_size) {
            Slab::Head(self.policy.peek_rows)
        } else {
            Slab::All
        };
        let data = file.read(&ds.name, slab)?;
        let shape_per_entity = if batched && data.ndim() > 0 {
            data.shape()[1..].to_vec()
        } else {
            data.shape().to_vec()
        };
        let (min, max) = match data.to_f64() {
            Some(values) if data.is_float() && !values.is_empty() => nan_min_max(&values),
            _ => (None, None),
        };
        Ok(Stats::Peek {
            shape_per_entity,
            min,
            max,
        })
    }
}

fn read_scalar<S: Store>(store: &S, path: &Path, name: &str) -> Result<f64> {
    let file = store.open(path)?;
    let data = file.read(name, Slab::All)?;
    match numeric(&data, name)?.as_slice() {
        [value] => Ok(*value),
        other => Err(Error::Other(format!(
            "{name} holds {} values, expected one",
            other.len()
        ))),
    }
}

fn numeric(data: &ArrayData, name: &str) -> Result<Vec<f64>> {
    data.to_f64()
        .ok_or_else(|| Error::Other(format!("{name} is not numeric")))
}

/// Minimum and maximum ignoring NaN; both NaN when every value is NaN.
fn nan_min_max(values: &[f64]) -> (Option<f64>, Option<f64>) {
    let mut present = values.iter().copied().filter(|v| !v.is_nan()).peekable();
    if present.peek().is_none() {
        return if values.is_empty() {
            (None, None)
        } else {
            (Some(f64::NAN), Some(f64::NAN))
        };
    }
    let (min, max) = present.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    (Some(min), Some(max))
}

/// Minimum and maximum where any NaN makes both NaN.
fn propagating_min_max(values: &[f64]) -> (f64, f64) {
    if values.iter().any(|v| v.is_nan()) {
        return (f64::NAN, f64::NAN);
    }
    values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)))
}

fn nan_count(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_nan()).count()
}

fn count_unique(values: &[f64]) -> usize {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted.dedup_by(|a, b| a == b || (a.is_nan() && b.is_nan()));
    sorted.len()
}

fn is_monotonic(values: &[f64]) -> bool {
    let mut diffs = values.windows(2).map(|w| w[1] - w[0]).peekable();
    if diffs.peek().is_none() {
        return false;
    }
    let diffs: Vec<f64> = diffs.collect();
    diffs.iter().all(|d| *d > 0.0) || diffs.iter().all(|d| *d < 0.0)
}

#[allow(clippy::cast_precision_loss)]
fn mean_step(values: &[f64]) -> f64 {
    let diffs: f64 = values.windows(2).map(|w| w[1] - w[0]).sum();
    diffs / (values.len() - 1) as f64
}
