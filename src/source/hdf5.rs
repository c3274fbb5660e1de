//! HDF5 backend over the `hdf5` crate (libhdf5 bindings).

use std::path::{Path, PathBuf};

use hdf5::types::{
    FixedAscii, FixedUnicode, FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode,
};
use hdf5::{Attribute, Dataset, File, Group, H5Type, Hyperslab, Location, Selection, SliceOrIndex};
use ndarray::IxDyn;

use super::{normalize, ArrayData, DatasetMeta, Node, RawAttrs, Slab, SourceFile, Store, Values};
use crate::{Error, Result};

/// Widest fixed-length string read without truncation.
const FIXED_STRING_CAPACITY: usize = 1024;

/// Opens real HDF5 files read-only.
#[derive(Debug, Clone, Copy, Default)]
pub struct Hdf5Store;

impl Hdf5Store {
    /// Create the store.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Store for Hdf5Store {
    type File = Hdf5File;

    fn open(&self, path: &Path) -> Result<Hdf5File> {
        let file = File::open(path)?;
        Ok(Hdf5File {
            file,
            path: path.to_path_buf(),
        })
    }
}

/// An open HDF5 file; closed when dropped.
pub struct Hdf5File {
    file: File,
    path: PathBuf,
}

impl std::fmt::Debug for Hdf5File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hdf5File").field("path", &self.path).finish()
    }
}

impl Hdf5File {
    fn not_found(&self, path: &str) -> Error {
        Error::NotFound {
            file: self.path.display().to_string(),
            path: path.to_string(),
        }
    }

    fn open_dataset(&self, path: &str) -> Result<Dataset> {
        self.file.dataset(path).map_err(|_| self.not_found(path))
    }
}

impl SourceFile for Hdf5File {
    fn path(&self) -> &Path {
        &self.path
    }

    fn visit(&self) -> Result<Vec<(String, Node)>> {
        let mut out = Vec::new();
        visit_group(&self.file, "", &mut out)?;
        Ok(out)
    }

    fn node(&self, path: &str) -> Option<Node> {
        let path = normalize(path);
        if path.is_empty() || self.file.group(path).is_ok() {
            return Some(Node::Group);
        }
        let dataset = self.file.dataset(path).ok()?;
        dataset_meta(&dataset).ok().map(Node::Dataset)
    }

    fn members(&self, group: &str) -> Result<Vec<String>> {
        let group = normalize(group);
        let mut names = if group.is_empty() {
            self.file.member_names()?
        } else {
            self.file
                .group(group)
                .map_err(|_| self.not_found(group))?
                .member_names()?
        };
        names.sort();
        Ok(names)
    }

    fn read(&self, dataset: &str, slab: Slab) -> Result<ArrayData> {
        let path = normalize(dataset);
        let ds = self.open_dataset(path)?;
        let selection = selection_for(&ds.shape(), slab, path)?;
        let descriptor = ds.dtype()?.to_descriptor()?;
        let (shape, values) = match descriptor {
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                let (shape, v) = read_typed::<i64>(&ds, selection)?;
                (shape, Values::Int(v))
            }
            TypeDescriptor::Float(_) => {
                let (shape, v) = read_typed::<f64>(&ds, selection)?;
                (shape, Values::Float(v))
            }
            TypeDescriptor::Boolean => {
                let (shape, v) = read_typed::<bool>(&ds, selection)?;
                (shape, Values::Bool(v))
            }
            TypeDescriptor::VarLenUnicode => {
                let (shape, v) = read_typed::<VarLenUnicode>(&ds, selection)?;
                (shape, Values::Text(v.iter().map(|s| s.as_str().to_string()).collect()))
            }
            TypeDescriptor::VarLenAscii => {
                let (shape, v) = read_typed::<VarLenAscii>(&ds, selection)?;
                (shape, Values::Text(v.iter().map(|s| s.as_str().to_string()).collect()))
            }
            TypeDescriptor::FixedAscii(_) => {
                let (shape, v) = read_typed::<FixedAscii<FIXED_STRING_CAPACITY>>(&ds, selection)?;
                (shape, Values::Text(v.iter().map(|s| s.as_str().to_string()).collect()))
            }
            TypeDescriptor::FixedUnicode(_) => {
                let (shape, v) = read_typed::<FixedUnicode<FIXED_STRING_CAPACITY>>(&ds, selection)?;
                (shape, Values::Text(v.iter().map(|s| s.as_str().to_string()).collect()))
            }
            other => {
                return Err(Error::Source(format!(
                    "unsupported dtype {other:?} for {path} in {}",
                    self.path.display()
                )))
            }
        };
        ArrayData::new(shape, values)
    }

    fn attrs(&self, object: &str) -> Result<RawAttrs> {
        let object = normalize(object);
        if object.is_empty() {
            return read_attrs(&self.file);
        }
        if let Ok(group) = self.file.group(object) {
            return read_attrs(&group);
        }
        let ds = self.open_dataset(object)?;
        read_attrs(&ds)
    }
}

fn visit_group(group: &Group, prefix: &str, out: &mut Vec<(String, Node)>) -> Result<()> {
    enum Child {
        Group(Group),
        Dataset(DatasetMeta),
    }

    let mut children = Vec::new();
    for name in group.member_names()? {
        if let Ok(sub) = group.group(&name) {
            children.push((name, Child::Group(sub)));
        } else if let Ok(ds) = group.dataset(&name) {
            children.push((name, Child::Dataset(dataset_meta(&ds)?)));
        }
    }
    children.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, child) in children {
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}/{name}")
        };
        match child {
            Child::Group(sub) => {
                out.push((path.clone(), Node::Group));
                visit_group(&sub, &path, out)?;
            }
            Child::Dataset(meta) => out.push((path, Node::Dataset(meta))),
        }
    }
    Ok(())
}

fn dataset_meta(ds: &Dataset) -> Result<DatasetMeta> {
    Ok(DatasetMeta {
        shape: ds.shape(),
        dtype: dtype_tag(&ds.dtype()?.to_descriptor()?),
    })
}

/// numpy spelling of an HDF5 type.
fn dtype_tag(descriptor: &TypeDescriptor) -> String {
    match descriptor {
        TypeDescriptor::Integer(size) => format!("int{}", int_bits(*size)),
        TypeDescriptor::Unsigned(size) => format!("uint{}", int_bits(*size)),
        TypeDescriptor::Float(size) => float_tag(*size).to_string(),
        TypeDescriptor::Boolean => "bool".to_string(),
        TypeDescriptor::FixedAscii(n) | TypeDescriptor::FixedUnicode(n) => format!("|S{n}"),
        TypeDescriptor::VarLenAscii | TypeDescriptor::VarLenUnicode => "str".to_string(),
        other => format!("{other:?}"),
    }
}

const fn int_bits(size: IntSize) -> usize {
    match size {
        IntSize::U1 => 8,
        IntSize::U2 => 16,
        IntSize::U4 => 32,
        IntSize::U8 => 64,
    }
}

#[allow(unreachable_patterns)]
const fn float_tag(size: FloatSize) -> &'static str {
    match size {
        FloatSize::U4 => "float32",
        FloatSize::U8 => "float64",
        _ => "float16",
    }
}

fn selection_for(shape: &[usize], slab: Slab, path: &str) -> Result<Option<Selection>> {
    let Some((&rows, inner)) = shape.split_first() else {
        return match slab {
            Slab::Index(_) => Err(Error::Source(format!("cannot index scalar dataset {path}"))),
            Slab::All | Slab::Head(_) => Ok(None),
        };
    };
    let first = match slab {
        Slab::All => return Ok(None),
        Slab::Index(i) if i >= rows => {
            return Err(Error::Source(format!(
                "index {i} out of range for {path} with {rows} rows"
            )))
        }
        Slab::Index(i) => SliceOrIndex::from(i),
        Slab::Head(n) if n >= rows => return Ok(None),
        Slab::Head(n) => SliceOrIndex::from(0..n),
    };
    let mut dims = vec![first];
    dims.extend(inner.iter().map(|_| SliceOrIndex::from(..)));
    Ok(Some(Selection::from(Hyperslab::from(dims))))
}

fn read_typed<T: H5Type + Clone>(
    ds: &Dataset,
    selection: Option<Selection>,
) -> Result<(Vec<usize>, Vec<T>)> {
    let array = match selection {
        None => ds.read_dyn::<T>()?,
        Some(selection) => ds.read_slice::<T, _, IxDyn>(selection)?,
    };
    Ok((array.shape().to_vec(), array.iter().cloned().collect()))
}

fn read_attrs(location: &Location) -> Result<RawAttrs> {
    let mut out = RawAttrs::new();
    for name in location.attr_names()? {
        let attr = location.attr(&name)?;
        match read_attr(&attr) {
            Ok(value) => {
                out.insert(name, value);
            }
            Err(e) => {
                tracing::debug!(attribute = %name, error = %e, "skipping unreadable attribute");
            }
        }
    }
    Ok(out)
}

fn read_attr(attr: &Attribute) -> Result<ArrayData> {
    let shape = attr.shape();
    let descriptor = attr.dtype()?.to_descriptor()?;
    let values = match descriptor {
        TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => Values::Int(attr.read_raw::<i64>()?),
        TypeDescriptor::Float(_) => Values::Float(attr.read_raw::<f64>()?),
        TypeDescriptor::Boolean => Values::Bool(attr.read_raw::<bool>()?),
        TypeDescriptor::VarLenUnicode => Values::Text(
            attr.read_raw::<VarLenUnicode>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::VarLenAscii => Values::Text(
            attr.read_raw::<VarLenAscii>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::FixedAscii(_) => Values::Text(
            attr.read_raw::<FixedAscii<FIXED_STRING_CAPACITY>>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        TypeDescriptor::FixedUnicode(_) => Values::Text(
            attr.read_raw::<FixedUnicode<FIXED_STRING_CAPACITY>>()?
                .iter()
                .map(|s| s.as_str().to_string())
                .collect(),
        ),
        other => return Err(Error::Source(format!("unsupported attribute dtype {other:?}"))),
    };
    ArrayData::new(shape, values)
}
