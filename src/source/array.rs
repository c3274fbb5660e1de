//! Typed n-dimensional values read from a source file

use serde_json::Value;

use crate::{Error, Result};

/// Flat, row-major element storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Values {
    /// Floating point elements
    Float(Vec<f64>),
    /// Signed and unsigned integer elements
    Int(Vec<i64>),
    /// Boolean elements
    Bool(Vec<bool>),
    /// String elements
    Text(Vec<String>),
}

impl Values {
    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float(v) => v.len(),
            Self::Int(v) => v.len(),
            Self::Bool(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    /// Whether there are no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// numpy dtype name of the in-memory representation
    #[must_use]
    pub const fn dtype(&self) -> &'static str {
        match self {
            Self::Float(_) => "float64",
            Self::Int(_) => "int64",
            Self::Bool(_) => "bool",
            Self::Text(_) => "str",
        }
    }

    fn range(&self, start: usize, end: usize) -> Self {
        match self {
            Self::Float(v) => Self::Float(v[start..end].to_vec()),
            Self::Int(v) => Self::Int(v[start..end].to_vec()),
            Self::Bool(v) => Self::Bool(v[start..end].to_vec()),
            Self::Text(v) => Self::Text(v[start..end].to_vec()),
        }
    }

    fn element(&self, i: usize) -> Value {
        match self {
            Self::Float(v) => Value::from(v[i]),
            Self::Int(v) => Value::from(v[i]),
            Self::Bool(v) => Value::from(v[i]),
            Self::Text(v) => Value::from(v[i].clone()),
        }
    }
}

/// A dense array: shape plus row-major values.
///
/// Scalars have an empty shape and exactly one element.
#[derive(Debug, Clone, PartialEq)]
pub struct ArrayData {
    shape: Vec<usize>,
    values: Values,
}

impl ArrayData {
    /// Build an array, checking that the element count matches the shape.
    ///
    /// # Errors
    ///
    /// Returns error if `values` does not hold `product(shape)` elements
    pub fn new(shape: Vec<usize>, values: Values) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != values.len() {
            return Err(Error::Source(format!(
                "shape {shape:?} needs {expected} elements, got {}",
                values.len()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Floating point array with the given shape.
    ///
    /// # Errors
    ///
    /// Returns error if the element count does not match the shape
    pub fn float(shape: &[usize], values: Vec<f64>) -> Result<Self> {
        Self::new(shape.to_vec(), Values::Float(values))
    }

    /// Integer array with the given shape.
    ///
    /// # Errors
    ///
    /// Returns error if the element count does not match the shape
    pub fn int(shape: &[usize], values: Vec<i64>) -> Result<Self> {
        Self::new(shape.to_vec(), Values::Int(values))
    }

    /// Dimension lengths
    #[must_use]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions
    #[must_use]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total element count
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the array holds no elements
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Element storage
    #[must_use]
    pub const fn values(&self) -> &Values {
        &self.values
    }

    /// Whether elements are floating point
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self.values, Values::Float(_))
    }

    /// Elements widened to `f64`, or `None` for string data.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_f64(&self) -> Option<Vec<f64>> {
        match &self.values {
            Values::Float(v) => Some(v.clone()),
            Values::Int(v) => Some(v.iter().map(|&x| x as f64).collect()),
            Values::Bool(v) => Some(v.iter().map(|&x| f64::from(u8::from(x))).collect()),
            Values::Text(_) => None,
        }
    }

    /// Elements of one row along axis 0 (the axis is dropped).
    ///
    /// # Errors
    ///
    /// Returns error for scalars or an out-of-range row
    pub fn row(&self, index: usize) -> Result<Self> {
        let Some((&rows, inner)) = self.shape.split_first() else {
            return Err(Error::Source("cannot index a scalar".to_string()));
        };
        if index >= rows {
            return Err(Error::Source(format!(
                "index {index} out of range for axis 0 of length {rows}"
            )));
        }
        let stride: usize = inner.iter().product();
        Ok(Self {
            shape: inner.to_vec(),
            values: self.values.range(index * stride, (index + 1) * stride),
        })
    }

    /// First `n` rows along axis 0; scalars are returned unchanged.
    #[must_use]
    pub fn head(&self, n: usize) -> Self {
        let Some((&rows, inner)) = self.shape.split_first() else {
            return self.clone();
        };
        let keep = n.min(rows);
        let stride: usize = inner.iter().product();
        let mut shape = self.shape.clone();
        shape[0] = keep;
        Self {
            shape,
            values: self.values.range(0, keep * stride),
        }
    }

    /// Native value: a scalar for 0-d arrays, nested lists otherwise.
    /// Non-finite floats become `null`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        if self.shape.is_empty() {
            return if self.values.is_empty() {
                Value::Null
            } else {
                self.values.element(0)
            };
        }
        self.nested(0, 0)
    }

    fn nested(&self, axis: usize, offset: usize) -> Value {
        let len = self.shape[axis];
        if axis + 1 == self.shape.len() {
            return Value::Array((0..len).map(|i| self.values.element(offset + i)).collect());
        }
        let stride: usize = self.shape[axis + 1..].iter().product();
        Value::Array(
            (0..len)
                .map(|i| self.nested(axis + 1, offset + i * stride))
                .collect(),
        )
    }
}

impl From<f64> for ArrayData {
    fn from(value: f64) -> Self {
        Self {
            shape: Vec::new(),
            values: Values::Float(vec![value]),
        }
    }
}

impl From<i64> for ArrayData {
    fn from(value: i64) -> Self {
        Self {
            shape: Vec::new(),
            values: Values::Int(vec![value]),
        }
    }
}

impl From<bool> for ArrayData {
    fn from(value: bool) -> Self {
        Self {
            shape: Vec::new(),
            values: Values::Bool(vec![value]),
        }
    }
}

impl From<&str> for ArrayData {
    fn from(value: &str) -> Self {
        Self {
            shape: Vec::new(),
            values: Values::Text(vec![value.to_string()]),
        }
    }
}

impl From<Vec<f64>> for ArrayData {
    fn from(values: Vec<f64>) -> Self {
        Self {
            shape: vec![values.len()],
            values: Values::Float(values),
        }
    }
}

impl From<Vec<i64>> for ArrayData {
    fn from(values: Vec<i64>) -> Self {
        Self {
            shape: vec![values.len()],
            values: Values::Int(values),
        }
    }
}

impl From<Vec<String>> for ArrayData {
    fn from(values: Vec<String>) -> Self {
        Self {
            shape: vec![values.len()],
            values: Values::Text(values),
        }
    }
}
