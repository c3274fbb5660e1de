//! Manifest tables (Arrow/Parquet)
//!
//! Entity columns are open-ended, so each column's Arrow type is inferred
//! from its values: Boolean, Int64, Float64, Utf8, List<Int64> for integer
//! lists or List<Float64> for other numeric lists. Columns mixing kinds fall
//! back to JSON text. Absent values are nulls.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, AsArray, BooleanArray, Float64Array, Float64Builder, Int64Array,
    Int64Builder, ListBuilder, StringArray,
};
use arrow::datatypes::{DataType, Field, Float64Type, Int64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use serde_json::{Map, Number, Value};
use tracing::info;

use super::{Artifact, Entity, Manifest};
use crate::{Error, Result};

/// File name of the entity table
pub const ENTITIES_FILE: &str = "entities.parquet";
/// File name of the artifact table
pub const ARTIFACTS_FILE: &str = "artifacts.parquet";

const ENTITY_REQUIRED: [&str; 2] = ["uid", "key"];
const ARTIFACT_REQUIRED: [&str; 4] = ["uid", "type", "file", "dataset"];

/// Inferred Arrow type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Bool,
    Int,
    Float,
    Text,
    IntList,
    FloatList,
    Json,
}

impl Kind {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(_) => Some(Self::Bool),
            Value::Number(n) if n.is_i64() => Some(Self::Int),
            Value::Number(_) => Some(Self::Float),
            Value::String(_) => Some(Self::Text),
            Value::Array(items)
                if items.iter().any(Value::is_i64)
                    && items.iter().all(|v| v.is_i64() || v.is_null()) =>
            {
                Some(Self::IntList)
            }
            Value::Array(items) if items.iter().all(|v| v.is_number() || v.is_null()) => {
                Some(Self::FloatList)
            }
            Value::Array(_) | Value::Object(_) => Some(Self::Json),
        }
    }

    fn merge(self, other: Self) -> Self {
        match (self, other) {
            (a, b) if a == b => a,
            (Self::Int, Self::Float) | (Self::Float, Self::Int) => Self::Float,
            (Self::IntList, Self::FloatList) | (Self::FloatList, Self::IntList) => Self::FloatList,
            _ => Self::Json,
        }
    }

    fn infer<'a>(values: impl IntoIterator<Item = &'a Value>) -> Self {
        values
            .into_iter()
            .filter_map(Self::of)
            .reduce(Self::merge)
            .unwrap_or(Self::Text)
    }

    fn data_type(self) -> DataType {
        match self {
            Self::Bool => DataType::Boolean,
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Text | Self::Json => DataType::Utf8,
            Self::IntList => DataType::List(Arc::new(Field::new("item", DataType::Int64, true))),
            Self::FloatList => DataType::List(Arc::new(Field::new("item", DataType::Float64, true))),
        }
    }
}

fn build_column(kind: Kind, values: &[Value]) -> ArrayRef {
    match kind {
        Kind::Bool => Arc::new(values.iter().map(Value::as_bool).collect::<BooleanArray>()),
        Kind::Int => Arc::new(values.iter().map(Value::as_i64).collect::<Int64Array>()),
        Kind::Float => Arc::new(values.iter().map(Value::as_f64).collect::<Float64Array>()),
        Kind::Text => Arc::new(
            values
                .iter()
                .map(|v| v.as_str().map(str::to_owned))
                .collect::<StringArray>(),
        ),
        Kind::Json => Arc::new(
            values
                .iter()
                .map(|v| match v {
                    Value::Null => None,
                    Value::String(s) => Some(s.clone()),
                    other => Some(other.to_string()),
                })
                .collect::<StringArray>(),
        ),
        Kind::IntList => {
            let mut builder = ListBuilder::new(Int64Builder::new());
            for value in values {
                match value.as_array() {
                    Some(items) => {
                        for item in items {
                            builder.values().append_option(item.as_i64());
                        }
                        builder.append(true);
                    }
                    None => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
        Kind::FloatList => {
            let mut builder = ListBuilder::new(Float64Builder::new());
            for value in values {
                match value.as_array() {
                    Some(items) => {
                        for item in items {
                            builder.values().append_option(item.as_f64());
                        }
                        builder.append(true);
                    }
                    None => builder.append(false),
                }
            }
            Arc::new(builder.finish())
        }
    }
}

fn batch_from_columns(columns: Vec<(String, Vec<Value>)>) -> Result<RecordBatch> {
    let mut fields = Vec::with_capacity(columns.len());
    let mut arrays = Vec::with_capacity(columns.len());
    for (name, values) in columns {
        let kind = Kind::infer(&values);
        fields.push(Field::new(name, kind.data_type(), true));
        arrays.push(build_column(kind, &values));
    }
    Ok(RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)?)
}

/// Entity rows as a record batch, one column per entity column.
///
/// # Errors
/// Returns error if Arrow rejects the assembled columns
pub fn entities_batch(manifest: &Manifest) -> Result<RecordBatch> {
    let columns = manifest
        .entity_columns()
        .into_iter()
        .map(|name| {
            let values = manifest
                .entities
                .iter()
                .map(|e| e.get(&name).unwrap_or(Value::Null))
                .collect();
            (name, values)
        })
        .collect();
    batch_from_columns(columns)
}

/// Artifact rows as a record batch (`uid`, `type`, `file`, `dataset`, `index`).
///
/// # Errors
/// Returns error if Arrow rejects the assembled columns
pub fn artifacts_batch(manifest: &Manifest) -> Result<RecordBatch> {
    let arts = &manifest.artifacts;
    let text = |f: fn(&Artifact) -> &str| -> ArrayRef {
        Arc::new(arts.iter().map(|a| Some(f(a))).collect::<StringArray>())
    };
    let index: Int64Array = arts
        .iter()
        .map(|a| a.index.and_then(|i| i64::try_from(i).ok()))
        .collect();
    let schema = Schema::new(vec![
        Field::new("uid", DataType::Utf8, false),
        Field::new("type", DataType::Utf8, false),
        Field::new("file", DataType::Utf8, false),
        Field::new("dataset", DataType::Utf8, false),
        Field::new("index", DataType::Int64, true),
    ]);
    Ok(RecordBatch::try_new(
        Arc::new(schema),
        vec![
            text(|a| a.uid.as_str()),
            text(|a| a.kind.as_str()),
            text(|a| a.file.as_str()),
            text(|a| a.dataset.as_str()),
            Arc::new(index),
        ],
    )?)
}

fn write_batch(batch: &RecordBatch, path: &Path) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Write `entities.parquet` and `artifacts.parquet` into `dir`.
///
/// # Errors
/// Returns error if the directory or either file cannot be written
pub fn write_manifest(manifest: &Manifest, dir: impl AsRef<Path>) -> Result<(PathBuf, PathBuf)> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let entities = dir.join(ENTITIES_FILE);
    let artifacts = dir.join(ARTIFACTS_FILE);
    write_batch(&entities_batch(manifest)?, &entities)?;
    write_batch(&artifacts_batch(manifest)?, &artifacts)?;
    info!("Entities: {} rows -> {}", manifest.entities.len(), entities.display());
    info!("Artifacts: {} rows -> {}", manifest.artifacts.len(), artifacts.display());
    Ok((entities, artifacts))
}

fn load_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)?.build()?;
    let mut batches = Vec::new();
    for batch in reader {
        batches.push(batch?);
    }
    Ok(batches)
}

fn require(batch: &RecordBatch, table: &str, columns: &[&str]) -> Result<()> {
    let schema = batch.schema();
    match columns.iter().find(|c| schema.index_of(c).is_err()) {
        Some(missing) => Err(Error::MissingColumn {
            table: table.to_string(),
            column: (*missing).to_string(),
        }),
        None => Ok(()),
    }
}

/// Value of row `i` of a column written by this module.
fn cell(array: &dyn Array, i: usize) -> Value {
    if array.is_null(i) {
        return Value::Null;
    }
    match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(i)),
        DataType::Int64 => Value::from(array.as_primitive::<Int64Type>().value(i)),
        DataType::Float64 => float_value(array.as_primitive::<Float64Type>().value(i)),
        DataType::Utf8 => Value::String(array.as_string::<i32>().value(i).to_string()),
        DataType::List(field) if field.data_type() == &DataType::Int64 => {
            let items = array.as_list::<i32>().value(i);
            let items = items.as_primitive::<Int64Type>();
            Value::Array(
                (0..items.len())
                    .map(|j| {
                        if items.is_null(j) {
                            Value::Null
                        } else {
                            Value::from(items.value(j))
                        }
                    })
                    .collect(),
            )
        }
        DataType::List(_) => {
            let items = array.as_list::<i32>().value(i);
            let items = items.as_primitive::<Float64Type>();
            Value::Array(
                (0..items.len())
                    .map(|j| {
                        if items.is_null(j) {
                            Value::Null
                        } else {
                            float_value(items.value(j))
                        }
                    })
                    .collect(),
            )
        }
        other => Value::String(format!("<unsupported {other}>")),
    }
}

fn float_value(x: f64) -> Value {
    Number::from_f64(x).map_or(Value::Null, Value::Number)
}

fn text_cell(batch: &RecordBatch, column: &str, i: usize) -> String {
    batch
        .column_by_name(column)
        .map(|c| match cell(c.as_ref(), i) {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
        .unwrap_or_default()
}

/// Read both tables back from `dir`.
///
/// # Errors
/// Returns [`Error::MissingColumn`] if a table lacks a column registration
/// needs, or a Parquet/IO error
pub fn read_manifest(dir: impl AsRef<Path>) -> Result<Manifest> {
    let dir = dir.as_ref();
    let mut manifest = Manifest::default();

    for batch in load_batches(&dir.join(ENTITIES_FILE))? {
        require(&batch, "entities", &ENTITY_REQUIRED)?;
        let schema = batch.schema();
        for i in 0..batch.num_rows() {
            let mut metadata = Map::new();
            for (field, column) in schema.fields().iter().zip(batch.columns()) {
                if !ENTITY_REQUIRED.contains(&field.name().as_str()) {
                    metadata.insert(field.name().clone(), cell(column.as_ref(), i));
                }
            }
            manifest.entities.push(Entity {
                uid: text_cell(&batch, "uid", i),
                key: text_cell(&batch, "key", i),
                metadata,
            });
        }
    }

    for batch in load_batches(&dir.join(ARTIFACTS_FILE))? {
        require(&batch, "artifacts", &ARTIFACT_REQUIRED)?;
        for i in 0..batch.num_rows() {
            let index = batch
                .column_by_name("index")
                .and_then(|c| cell(c.as_ref(), i).as_u64());
            manifest.artifacts.push(Artifact {
                uid: text_cell(&batch, "uid", i),
                kind: text_cell(&batch, "type", i),
                file: text_cell(&batch, "file", i),
                dataset: text_cell(&batch, "dataset", i),
                index,
            });
        }
    }
    Ok(manifest)
}
