//! Draft contract rendering
//!
//! Turns an [`InspectionResult`] into a commented YAML draft. Everything
//! that could be detected is filled in; identity fields and every
//! classification a person must confirm are marked `TODO`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use crate::inspect::{Category, DatasetInfo, InspectionResult, Stats};
use crate::layout::Layout;
use crate::source::{leaf, parent};
use crate::text::{float, general4, shape_tuple, thousands, value};
use crate::Result;

/// Accumulates draft lines.
struct Draft {
    lines: Vec<String>,
}

impl Draft {
    fn line(&mut self, line: impl Into<String>) {
        self.lines.push(line.into());
    }

    fn blank(&mut self) {
        self.lines.push(String::new());
    }
}

/// Render the draft YAML for `result`, dated `date`.
///
/// Pure: identical input gives identical text.
#[must_use]
pub fn render_draft(result: &InspectionResult, date: NaiveDate) -> String {
    let mut d = Draft { lines: Vec::new() };
    let n_files = result.files.len();

    d.line(format!("# AUTO-GENERATED by h5-broker inspect on {date}"));
    d.line(format!("# Source: {}", result.source_dir.display()));
    d.line(format!("# Files scanned: {n_files} HDF5 ({})", result.file_pattern));
    match result.layout {
        Layout::Batched => d.line(format!(
            "# Entities detected: {} ({n_files} files x {} batch size)",
            thousands(result.total_entities),
            thousands(result.batch_size)
        )),
        Layout::PerEntity => d.line(format!(
            "# Entities detected: {} (one per file)",
            thousands(result.total_entities)
        )),
        Layout::Grouped => d.line(format!(
            "# Entities detected: {} (one per group)",
            thousands(result.total_entities)
        )),
    }
    d.blank();

    d.line("# === REQUIRED: Fill in these identity fields ===");
    d.line(r#"label: ""           # TODO: dataset name (e.g., my_simulation)"#);
    d.line(r#"key_prefix: ""      # TODO: short prefix for catalog keys (e.g., sim)"#);
    d.blank();

    d.line("# === Auto-detected ===");
    d.line("data:");
    d.line(format!("  directory: {}", result.source_dir.display()));
    d.line(format!("  file_pattern: \"{}\"", result.file_pattern));
    d.line(format!("  layout: {}", result.layout));
    match result.layout {
        Layout::Batched => d.line(format!("  # batch_size: {}", result.batch_size)),
        Layout::Grouped => {
            if let Some(rep) = result.representative_group() {
                d.line(format!(
                    "  # {} entity groups, per-entity dataset paths below are relative to each (e.g. /{rep})",
                    result.entity_groups.len()
                ));
            }
        }
        Layout::PerEntity => {}
    }
    d.blank();

    render_parameters(&mut d, result);
    render_artifacts(&mut d, result);
    render_unclassified(&mut d, result);
    render_shared(&mut d, result);
    render_extra(&mut d, result);

    d.line("# === Optional: Add project metadata ===");
    d.line(r#"# project: ""          # scientific project name"#);
    d.line(r#"# generator: ""        # simulation code"#);
    d.line(r#"# material: ""         # physical system"#);
    d.blank();

    render_provenance(&mut d, result);

    if !result.recommendations.is_empty() {
        d.blank();
        d.line("# === Recommendations for data producer ===");
        for rec in &result.recommendations {
            d.line(format!("# - {rec}"));
        }
    }

    d.blank();
    if result.consistency_issues.is_empty() {
        d.line(format!(
            "# === Consistency check: PASSED ({} files checked) ===",
            result.files_checked
        ));
    } else {
        d.line(format!(
            "# === Consistency check: FAILED ({} issues) ===",
            result.consistency_issues.len()
        ));
        for issue in &result.consistency_issues {
            d.line(format!("# ! {issue}"));
        }
    }

    let mut text = d.lines.join("\n");
    text.push('\n');
    text
}

/// Render the draft dated today.
#[must_use]
pub fn emit_draft(result: &InspectionResult) -> String {
    render_draft(result, chrono::Local::now().date_naive())
}

/// Render the draft and write it to `path`, creating parent directories.
///
/// # Errors
/// Returns error if the directory or file cannot be written
pub fn write_draft(result: &InspectionResult, path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let text = emit_draft(result);
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(path, &text)?;
    info!("Draft YAML written to: {}", path.display());
    Ok(text)
}

/// `datasets/draft_<dirname>.yml` for a data directory.
#[must_use]
pub fn default_draft_path(directory: impl AsRef<Path>) -> PathBuf {
    let name = directory
        .as_ref()
        .file_name()
        .map_or_else(|| "dataset".to_string(), |n| n.to_string_lossy().into_owned());
    let name: String = name
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect();
    PathBuf::from("datasets").join(format!("draft_{name}.yml"))
}

/// Whether `name` is stored once per entity. In grouped corpora only the
/// representative group's datasets are; root-level ones are common to all.
fn is_entity_dataset(result: &InspectionResult, name: &str) -> bool {
    match result.representative_group() {
        Some(rep) if result.layout == Layout::Grouped => name
            .strip_prefix(rep)
            .is_some_and(|rest| rest.starts_with('/')),
        _ => true,
    }
}

/// Per-entity datasets of one category, in name order.
fn entries(result: &InspectionResult, category: Category) -> Vec<&DatasetInfo> {
    result
        .by_category(category)
        .filter(|ds| is_entity_dataset(result, &ds.name))
        .collect()
}

/// Dataset path as the generators expect it: relative to the entity group
/// for grouped corpora, as-is otherwise.
fn display_name<'a>(result: &InspectionResult, name: &'a str) -> &'a str {
    match result.representative_group() {
        Some(rep) if result.layout == Layout::Grouped => name
            .strip_prefix(rep)
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(name),
        _ => name,
    }
}

fn opt_float(x: Option<f64>) -> String {
    x.map_or_else(|| "None".to_string(), float)
}

fn range(stats: &Stats) -> String {
    match stats {
        Stats::Pending | Stats::Error(_) => "[?, ?]".to_string(),
        _ => format!("[{}, {}]", opt_float(stats.min()), opt_float(stats.max())),
    }
}

fn stats_error(d: &mut Draft, ds: &DatasetInfo) {
    if let Stats::Error(e) = &ds.stats {
        d.line(format!("    # stats error: {e}"));
    }
}

fn render_parameters(d: &mut Draft, result: &InspectionResult) {
    let params: Vec<&DatasetInfo> = entries(result, Category::Parameter);
    if params.is_empty() {
        return;
    }
    d.line("parameters:");
    let group = params
        .iter()
        .map(|ds| parent(&ds.name))
        .filter(|g| !g.is_empty())
        .min();
    match group {
        Some(group) => {
            d.line("  location: group");
            d.line(format!("  group: /{group}"));
        }
        None => d.line("  location: root_scalars"),
    }
    d.line(format!("  # {} parameters discovered:", params.len()));
    for ds in params {
        let mut stat = format!("  {}", ds.dtype);
        if let (Some(min), Some(max)) = (ds.stats.min(), ds.stats.max()) {
            let _ = write!(stat, "  range [{}, {}]", float(min), float(max));
        }
        if ds.stats.is_constant() {
            stat.push_str("  ** CONSTANT - consider moving to provenance **");
        }
        d.line(format!("  #   {:<16}{stat}", leaf(&ds.name)));
    }
    d.blank();
}

fn render_artifacts(d: &mut Draft, result: &InspectionResult) {
    let artifacts: Vec<&DatasetInfo> = entries(result, Category::Artifact);
    if artifacts.is_empty() {
        return;
    }
    d.line("# === TODO: Confirm artifact classification ===");
    if result.layout == Layout::Batched {
        d.line("# These datasets have shape (batch, ...) with ndim > 1 -> classified as artifacts");
    } else {
        d.line("# These datasets are multi-dimensional arrays -> classified as artifacts");
    }
    d.line("artifacts:");
    for ds in artifacts {
        d.line(format!("  - type: {}           # TODO: rename if desired", leaf(&ds.name)));
        d.line(format!("    dataset: /{}", display_name(result, &ds.name)));
        let shape = ds.stats.shape_per_entity().unwrap_or(&ds.shape);
        let nan = match ds.stats {
            Stats::Artifact { nan_fraction, .. } if nan_fraction > 0.0 => {
                format!(", NaN: {:.1}%", nan_fraction * 100.0)
            }
            _ => String::new(),
        };
        d.line(format!(
            "    # shape per entity: {}, dtype: {}, range: {}{nan}",
            shape_tuple(shape),
            ds.dtype,
            range(&ds.stats)
        ));
        stats_error(d, ds);
    }
    d.blank();
}

fn render_unclassified(d: &mut Draft, result: &InspectionResult) {
    let unclassified: Vec<&DatasetInfo> = entries(result, Category::ArtifactOrAxis);
    if unclassified.is_empty() {
        return;
    }
    d.line("# === TODO: Classify these arrays as artifacts or shared axes ===");
    d.line("# Move each entry to either 'artifacts:' or 'shared:' section");
    d.line("# Artifacts = output observables (different per entity)");
    d.line("# Shared = axes/grids (same across all entities)");
    d.line("unclassified:");
    for ds in unclassified {
        let name = display_name(result, &ds.name);
        d.line(format!("  - name: {name}"));
        d.line(format!("    dataset: /{name}"));
        d.line(format!("    # shape: {}, dtype: {}", shape_tuple(&ds.shape), ds.dtype));
        if let (Some(min), Some(max)) = (ds.stats.min(), ds.stats.max()) {
            d.line(format!("    # range: [{}, {}]", float(min), float(max)));
        }
        stats_error(d, ds);
    }
    d.blank();
}

fn render_shared(d: &mut Draft, result: &InspectionResult) {
    let shared = entries(result, Category::SharedAxis);
    let common: Vec<&DatasetInfo> = result
        .datasets
        .values()
        .filter(|ds| !is_entity_dataset(result, &ds.name))
        .collect();
    if shared.is_empty() && common.is_empty() {
        return;
    }
    d.line("# === TODO: Confirm shared axes ===");
    if !shared.is_empty() {
        d.line("# These datasets do NOT have the batch dimension -> classified as shared");
    }
    if !common.is_empty() {
        d.line("# These datasets sit outside the entity groups -> shared by every entity");
    }
    d.line("shared:");
    for ds in shared.into_iter().chain(common) {
        d.line(format!("  - type: {}", leaf(&ds.name)));
        d.line(format!("    dataset: /{}", display_name(result, &ds.name)));
        let mut parts = Vec::new();
        match &ds.stats {
            Stats::SharedAxis {
                shape,
                range,
                monotonic,
                step,
            } => {
                parts.push(format!("shape: {}", shape_tuple(shape)));
                if *monotonic {
                    parts.push("monotonic".to_string());
                }
                if let Some((lo, hi)) = range {
                    parts.push(format!("range [{}, {}]", float(*lo), float(*hi)));
                }
                if let Some(step) = step {
                    parts.push(format!("step={}", general4(*step)));
                }
            }
            _ => parts.push(format!("shape: {}", shape_tuple(&ds.shape))),
        }
        d.line(format!("    # {}", parts.join(", ")));
        stats_error(d, ds);
    }
    d.blank();
}

fn render_extra(d: &mut Draft, result: &InspectionResult) {
    let extra: Vec<&DatasetInfo> = entries(result, Category::ExtraMetadata);
    if extra.is_empty() {
        return;
    }
    d.line("# === Additional per-entity data (not under params/) ===");
    d.line("# TODO: Keep as metadata, promote to parameter, or remove?");
    d.line("extra_metadata:");
    for ds in extra {
        d.line(format!("  - dataset: /{}", display_name(result, &ds.name)));
        let shape = ds.stats.shape_per_entity().unwrap_or(&ds.shape);
        d.line(format!("    # shape per entity: {}, dtype: {}", shape_tuple(shape), ds.dtype));
        if let (Some(min), Some(max)) = (ds.stats.min(), ds.stats.max()) {
            d.line(format!("    # range: [{}, {}]", float(min), float(max)));
        }
    }
    d.blank();
}

fn render_provenance(d: &mut Draft, result: &InspectionResult) {
    if result.root_attrs.is_empty() && result.group_attrs.is_empty() {
        d.line("# === No provenance attributes found in HDF5 ===");
        d.line("# provenance: {}");
        return;
    }
    d.line("# === Provenance found in HDF5 attributes ===");
    d.line("provenance:");
    for (k, v) in &result.root_attrs {
        d.line(format!("  {k}: {}", value(v)));
    }
    for (group, attrs) in &result.group_attrs {
        let attrs = Value::Object(attrs.clone().into_iter().collect());
        d.line(format!("  # {group}/ attrs: {}", value(&attrs)));
    }
}
