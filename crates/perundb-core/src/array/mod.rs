//! In-memory columnar arrays.
//!
//! An [`Array`] is a typed value sequence over the closed physical type set
//! (int32, int64, float32, float64, fixed-size list of a primitive), with an
//! optional validity bitmap. Vector columns are fixed-size lists of float32.
//!
//! Equality is defined the way the storage layer needs it: float values
//! compare by bit pattern (NaN is self-equal, +0 and -0 collide) and values
//! under null positions are ignored.
//!
//! # Module Structure
//!
//! - [`bitmap`]: LSB-first validity bitmap ([`Bitmap`])
//! - [`schema`]: physical types and schemas ([`DataType`], [`Field`], [`Schema`])

mod bitmap;
mod schema;

#[cfg(test)]
mod tests;

pub use bitmap::Bitmap;
pub use schema::{DataType, Field, Schema};

use crate::error::{Error, Result};

/// A typed, optionally nullable column of values.
#[derive(Debug, Clone)]
pub enum Array {
    /// 32-bit signed integers.
    Int32 {
        /// Values; slots under null positions are unspecified.
        values: Vec<i32>,
        /// Validity bitmap; `None` means all values are valid.
        validity: Option<Bitmap>,
    },
    /// 64-bit signed integers.
    Int64 {
        /// Values; slots under null positions are unspecified.
        values: Vec<i64>,
        /// Validity bitmap; `None` means all values are valid.
        validity: Option<Bitmap>,
    },
    /// 32-bit floats.
    Float32 {
        /// Values; slots under null positions are unspecified.
        values: Vec<f32>,
        /// Validity bitmap; `None` means all values are valid.
        validity: Option<Bitmap>,
    },
    /// 64-bit floats.
    Float64 {
        /// Values; slots under null positions are unspecified.
        values: Vec<f64>,
        /// Validity bitmap; `None` means all values are valid.
        validity: Option<Bitmap>,
    },
    /// Fixed-size lists over a flattened primitive child array.
    FixedSizeList {
        /// Flattened child values (`list_size * len()` elements).
        child: Box<Array>,
        /// Number of child elements per list.
        list_size: i32,
        /// List-level validity bitmap.
        validity: Option<Bitmap>,
    },
}

impl Array {
    /// Creates a non-nullable int32 array.
    #[must_use]
    pub fn int32(values: Vec<i32>) -> Self {
        Self::Int32 {
            values,
            validity: None,
        }
    }

    /// Creates an int32 array from optional values (None becomes null).
    #[must_use]
    pub fn int32_opt(values: Vec<Option<i32>>) -> Self {
        let validity = Bitmap::from_bools(&values.iter().map(Option::is_some).collect::<Vec<_>>());
        let values = values.into_iter().map(Option::unwrap_or_default).collect();
        Self::Int32 {
            values,
            validity: Some(validity),
        }
    }

    /// Creates a non-nullable int64 array.
    #[must_use]
    pub fn int64(values: Vec<i64>) -> Self {
        Self::Int64 {
            values,
            validity: None,
        }
    }

    /// Creates an int64 array from optional values.
    #[must_use]
    pub fn int64_opt(values: Vec<Option<i64>>) -> Self {
        let validity = Bitmap::from_bools(&values.iter().map(Option::is_some).collect::<Vec<_>>());
        let values = values.into_iter().map(Option::unwrap_or_default).collect();
        Self::Int64 {
            values,
            validity: Some(validity),
        }
    }

    /// Creates a non-nullable float32 array.
    #[must_use]
    pub fn float32(values: Vec<f32>) -> Self {
        Self::Float32 {
            values,
            validity: None,
        }
    }

    /// Creates a float32 array from optional values.
    #[must_use]
    pub fn float32_opt(values: Vec<Option<f32>>) -> Self {
        let validity = Bitmap::from_bools(&values.iter().map(Option::is_some).collect::<Vec<_>>());
        let values = values.into_iter().map(Option::unwrap_or_default).collect();
        Self::Float32 {
            values,
            validity: Some(validity),
        }
    }

    /// Creates a non-nullable float64 array.
    #[must_use]
    pub fn float64(values: Vec<f64>) -> Self {
        Self::Float64 {
            values,
            validity: None,
        }
    }

    /// Creates a float64 array from optional values.
    #[must_use]
    pub fn float64_opt(values: Vec<Option<f64>>) -> Self {
        let validity = Bitmap::from_bools(&values.iter().map(Option::is_some).collect::<Vec<_>>());
        let values = values.into_iter().map(Option::unwrap_or_default).collect();
        Self::Float64 {
            values,
            validity: Some(validity),
        }
    }

    /// Creates a fixed-size list array over a flattened child.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `list_size` is not positive, the child
    /// is itself a list, or the child length is not a multiple of
    /// `list_size`.
    pub fn fixed_size_list(child: Array, list_size: i32) -> Result<Self> {
        Self::fixed_size_list_with_validity(child, list_size, None)
    }

    /// Creates a fixed-size list array with list-level validity.
    ///
    /// # Errors
    ///
    /// Same as [`Array::fixed_size_list`], plus `InvalidArgument` when the
    /// validity length does not match the list count.
    pub fn fixed_size_list_with_validity(
        child: Array,
        list_size: i32,
        validity: Option<Bitmap>,
    ) -> Result<Self> {
        if list_size <= 0 {
            return Err(
                Error::invalid_argument(format!("list size must be positive, got {list_size}"))
                    .op("array::fixed_size_list"),
            );
        }
        if child.data_type().is_fixed_size_list() {
            return Err(Error::invalid_argument("fixed-size list child must be a primitive")
                .op("array::fixed_size_list"));
        }
        if child.null_count() > 0 {
            return Err(Error::invalid_argument(
                "fixed-size list child must not carry its own nulls",
            )
            .op("array::fixed_size_list"));
        }
        #[allow(clippy::cast_sign_loss)]
        let size = list_size as usize;
        if child.len() % size != 0 {
            return Err(Error::invalid_argument(format!(
                "child length {} is not a multiple of list size {list_size}",
                child.len()
            ))
            .op("array::fixed_size_list"));
        }
        let num_lists = child.len() / size;
        if let Some(v) = &validity {
            if v.len() != num_lists {
                return Err(Error::invalid_argument(format!(
                    "validity covers {} lists, array has {num_lists}",
                    v.len()
                ))
                .op("array::fixed_size_list"));
            }
        }
        Ok(Self::FixedSizeList {
            child: Box::new(child),
            list_size,
            validity,
        })
    }

    /// Creates an empty array of the given type.
    #[must_use]
    pub fn empty(data_type: &DataType) -> Self {
        match data_type {
            DataType::Int32 => Self::int32(Vec::new()),
            DataType::Int64 => Self::int64(Vec::new()),
            DataType::Float32 => Self::float32(Vec::new()),
            DataType::Float64 => Self::float64(Vec::new()),
            DataType::FixedSizeList(child, size) => Self::FixedSizeList {
                child: Box::new(Self::empty(child)),
                list_size: *size,
                validity: None,
            },
        }
    }

    /// The physical type of this array.
    #[must_use]
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Int32 { .. } => DataType::Int32,
            Self::Int64 { .. } => DataType::Int64,
            Self::Float32 { .. } => DataType::Float32,
            Self::Float64 { .. } => DataType::Float64,
            Self::FixedSizeList {
                child, list_size, ..
            } => DataType::FixedSizeList(Box::new(child.data_type()), *list_size),
        }
    }

    /// Number of elements (lists count as one element).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int32 { values, .. } => values.len(),
            Self::Int64 { values, .. } => values.len(),
            Self::Float32 { values, .. } => values.len(),
            Self::Float64 { values, .. } => values.len(),
            #[allow(clippy::cast_sign_loss)]
            Self::FixedSizeList {
                child, list_size, ..
            } => child.len() / (*list_size as usize),
        }
    }

    /// Returns true if the array has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The validity bitmap, if any element is null.
    #[must_use]
    pub fn validity(&self) -> Option<&Bitmap> {
        match self {
            Self::Int32 { validity, .. }
            | Self::Int64 { validity, .. }
            | Self::Float32 { validity, .. }
            | Self::Float64 { validity, .. }
            | Self::FixedSizeList { validity, .. } => validity.as_ref(),
        }
    }

    /// Number of null elements.
    #[must_use]
    pub fn null_count(&self) -> usize {
        self.validity().map_or(0, Bitmap::count_null)
    }

    /// Returns true if element `i` is valid.
    #[must_use]
    pub fn is_valid(&self, i: usize) -> bool {
        i < self.len() && self.validity().is_none_or(|v| v.is_valid(i))
    }

    /// Typed accessor for int32 values.
    #[must_use]
    pub fn as_i32(&self) -> Option<&[i32]> {
        match self {
            Self::Int32 { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Typed accessor for int64 values.
    #[must_use]
    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Self::Int64 { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Typed accessor for float32 values.
    #[must_use]
    pub fn as_f32(&self) -> Option<&[f32]> {
        match self {
            Self::Float32 { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Typed accessor for float64 values.
    #[must_use]
    pub fn as_f64(&self) -> Option<&[f64]> {
        match self {
            Self::Float64 { values, .. } => Some(values),
            _ => None,
        }
    }

    /// The flattened child of a fixed-size list array.
    #[must_use]
    pub fn child(&self) -> Option<&Array> {
        match self {
            Self::FixedSizeList { child, .. } => Some(child),
            _ => None,
        }
    }

    /// Total size of the raw values in bytes.
    #[must_use]
    pub fn data_size(&self) -> usize {
        match self {
            Self::Int32 { values, .. } => values.len() * 4,
            Self::Int64 { values, .. } => values.len() * 8,
            Self::Float32 { values, .. } => values.len() * 4,
            Self::Float64 { values, .. } => values.len() * 8,
            Self::FixedSizeList { child, .. } => child.data_size(),
        }
    }

    /// Flattens the raw values to little-endian bytes.
    ///
    /// Null slots contribute whatever their backing value holds (zero for
    /// arrays built through the `_opt` constructors).
    #[must_use]
    pub fn value_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.data_size());
        match self {
            Self::Int32 { values, .. } => {
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            Self::Int64 { values, .. } => {
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            Self::Float32 { values, .. } => {
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            Self::Float64 { values, .. } => {
                for v in values {
                    buf.extend_from_slice(&v.to_le_bytes());
                }
            }
            Self::FixedSizeList { child, .. } => return child.value_bytes(),
        }
        buf
    }

    /// Reconstructs an array from little-endian value bytes.
    ///
    /// `num_values` counts elements (lists, not child slots). The validity
    /// bitmap, when present, must cover exactly `num_values` elements.
    ///
    /// # Errors
    ///
    /// Returns `DecodeFailed` when the byte length does not match
    /// `num_values` for the type.
    pub fn from_le_bytes(
        data_type: &DataType,
        bytes: &[u8],
        num_values: usize,
        validity: Option<Bitmap>,
    ) -> Result<Self> {
        let expected = data_type.byte_width() * num_values;
        if bytes.len() != expected {
            return Err(Error::decode_failed(format!(
                "raw value buffer is {} bytes, expected {expected} for {num_values} x {data_type}",
                bytes.len(),
            ))
            .op("array::from_le_bytes"));
        }
        if let Some(v) = &validity {
            if v.len() != num_values {
                return Err(Error::decode_failed(format!(
                    "validity covers {} elements, expected {num_values}",
                    v.len()
                ))
                .op("array::from_le_bytes"));
            }
        }
        let array = match data_type {
            DataType::Int32 => Self::Int32 {
                values: bytes
                    .chunks_exact(4)
                    .map(|c| i32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
                validity,
            },
            DataType::Int64 => Self::Int64 {
                values: bytes
                    .chunks_exact(8)
                    .map(|c| {
                        i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect(),
                validity,
            },
            DataType::Float32 => Self::Float32 {
                values: bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
                validity,
            },
            DataType::Float64 => Self::Float64 {
                values: bytes
                    .chunks_exact(8)
                    .map(|c| {
                        f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]])
                    })
                    .collect(),
                validity,
            },
            DataType::FixedSizeList(child_type, list_size) => {
                #[allow(clippy::cast_sign_loss)]
                let child_count = num_values * (*list_size as usize);
                let child = Self::from_le_bytes(child_type, bytes, child_count, None)?;
                Self::fixed_size_list_with_validity(child, *list_size, validity)?
            }
        };
        Ok(array)
    }

    /// Concatenates arrays of the same type, preserving order and nulls.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty input and `TypeMismatch` when
    /// the inputs disagree on type.
    pub fn concat(arrays: &[Array]) -> Result<Array> {
        let first = arrays
            .first()
            .ok_or_else(|| Error::invalid_argument("no arrays to concatenate").op("array::concat"))?;
        let data_type = first.data_type();
        for a in &arrays[1..] {
            if a.data_type() != data_type {
                return Err(Error::type_mismatch(&data_type, a.data_type()).op("array::concat"));
            }
        }
        if arrays.len() == 1 {
            return Ok(first.clone());
        }

        let total: usize = arrays.iter().map(Array::len).sum();
        let any_nulls = arrays.iter().any(|a| a.null_count() > 0);
        let validity = if any_nulls {
            let mut bitmap = Bitmap::from_bools(&[]);
            for a in arrays {
                match a.validity() {
                    Some(v) => bitmap.extend(v),
                    None => bitmap.extend(&Bitmap::all_valid(a.len())),
                }
            }
            debug_assert_eq!(bitmap.len(), total);
            Some(bitmap)
        } else {
            None
        };

        let array = match &data_type {
            DataType::Int32 => Self::Int32 {
                values: arrays
                    .iter()
                    .flat_map(|a| a.as_i32().unwrap_or_default().iter().copied())
                    .collect(),
                validity,
            },
            DataType::Int64 => Self::Int64 {
                values: arrays
                    .iter()
                    .flat_map(|a| a.as_i64().unwrap_or_default().iter().copied())
                    .collect(),
                validity,
            },
            DataType::Float32 => Self::Float32 {
                values: arrays
                    .iter()
                    .flat_map(|a| a.as_f32().unwrap_or_default().iter().copied())
                    .collect(),
                validity,
            },
            DataType::Float64 => Self::Float64 {
                values: arrays
                    .iter()
                    .flat_map(|a| a.as_f64().unwrap_or_default().iter().copied())
                    .collect(),
                validity,
            },
            DataType::FixedSizeList(_, list_size) => {
                let children: Vec<Array> = arrays
                    .iter()
                    .filter_map(|a| a.child().cloned())
                    .collect();
                let child = Self::concat(&children)?;
                Self::fixed_size_list_with_validity(child, *list_size, validity)?
            }
        };
        Ok(array)
    }
}

/// Bit-pattern equality for float slices restricted to valid positions.
fn eq_masked<T, F>(a: &[T], b: &[T], validity: Option<&Bitmap>, eq: F) -> bool
where
    F: Fn(&T, &T) -> bool,
{
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .enumerate()
            .all(|(i, (x, y))| validity.is_some_and(|v| !v.is_valid(i)) || eq(x, y))
}

impl PartialEq for Array {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        // Null layouts must match exactly.
        let nulls_match = match (self.validity(), other.validity()) {
            (None, None) => true,
            (Some(a), Some(b)) => a == b,
            (Some(v), None) | (None, Some(v)) => v.count_null() == 0,
        };
        if !nulls_match {
            return false;
        }
        let validity = self.validity().or_else(|| other.validity());

        match (self, other) {
            (Self::Int32 { values: a, .. }, Self::Int32 { values: b, .. }) => {
                eq_masked(a, b, validity, |x, y| x == y)
            }
            (Self::Int64 { values: a, .. }, Self::Int64 { values: b, .. }) => {
                eq_masked(a, b, validity, |x, y| x == y)
            }
            (Self::Float32 { values: a, .. }, Self::Float32 { values: b, .. }) => {
                eq_masked(a, b, validity, |x, y| x.to_bits() == y.to_bits())
            }
            (Self::Float64 { values: a, .. }, Self::Float64 { values: b, .. }) => {
                eq_masked(a, b, validity, |x, y| x.to_bits() == y.to_bits())
            }
            (
                Self::FixedSizeList {
                    child: a,
                    list_size: sa,
                    ..
                },
                Self::FixedSizeList {
                    child: b,
                    list_size: sb,
                    ..
                },
            ) => {
                if sa != sb {
                    return false;
                }
                #[allow(clippy::cast_sign_loss)]
                let size = *sa as usize;
                // Compare list by list so nulls mask whole lists.
                (0..self.len()).all(|i| {
                    if validity.is_some_and(|v| !v.is_valid(i)) {
                        return true;
                    }
                    let lo = i * size;
                    let hi = lo + size;
                    child_slice_eq(a, b, lo, hi)
                })
            }
            _ => false,
        }
    }
}

fn child_slice_eq(a: &Array, b: &Array, lo: usize, hi: usize) -> bool {
    match (a, b) {
        (Array::Int32 { values: x, .. }, Array::Int32 { values: y, .. }) => x[lo..hi] == y[lo..hi],
        (Array::Int64 { values: x, .. }, Array::Int64 { values: y, .. }) => x[lo..hi] == y[lo..hi],
        (Array::Float32 { values: x, .. }, Array::Float32 { values: y, .. }) => x[lo..hi]
            .iter()
            .zip(&y[lo..hi])
            .all(|(p, q)| p.to_bits() == q.to_bits()),
        (Array::Float64 { values: x, .. }, Array::Float64 { values: y, .. }) => x[lo..hi]
            .iter()
            .zip(&y[lo..hi])
            .all(|(p, q)| p.to_bits() == q.to_bits()),
        _ => false,
    }
}

/// A horizontal slice of rows: one array per schema column.
#[derive(Debug, Clone)]
pub struct RecordBatch {
    schema: Schema,
    columns: Vec<Array>,
    num_rows: usize,
}

impl RecordBatch {
    /// Creates a batch, validating column count, types, and lengths.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` when the columns do not line up with the
    /// schema or disagree on length.
    pub fn new(schema: Schema, columns: Vec<Array>) -> Result<Self> {
        if schema.len() != columns.len() {
            return Err(Error::schema_mismatch(format!(
                "schema has {} fields, batch has {} columns",
                schema.len(),
                columns.len()
            ))
            .op("batch::new"));
        }
        let num_rows = columns.first().map_or(0, Array::len);
        for (i, (field, col)) in schema.fields.iter().zip(columns.iter()).enumerate() {
            if col.data_type() != field.data_type {
                return Err(Error::schema_mismatch(format!(
                    "column {i} ({}) has type {}, schema declares {}",
                    field.name,
                    col.data_type(),
                    field.data_type
                ))
                .op("batch::new"));
            }
            if col.len() != num_rows {
                return Err(Error::schema_mismatch(format!(
                    "column {i} ({}) has {} rows, expected {num_rows}",
                    field.name,
                    col.len()
                ))
                .op("batch::new"));
            }
            if !field.nullable && col.null_count() > 0 {
                return Err(Error::schema_mismatch(format!(
                    "column {i} ({}) carries nulls but is declared non-nullable",
                    field.name
                ))
                .op("batch::new"));
            }
        }
        Ok(Self {
            schema,
            columns,
            num_rows,
        })
    }

    /// The batch schema.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// All columns in schema order.
    #[must_use]
    pub fn columns(&self) -> &[Array] {
        &self.columns
    }

    /// The column at `index`, or `ColumnNotFound`.
    pub fn column(&self, index: usize) -> Result<&Array> {
        self.columns.get(index).ok_or_else(|| {
            Error::new(
                crate::error::ErrorCode::ColumnNotFound,
                format!("column {index} out of range ({} columns)", self.columns.len()),
            )
            .op("batch::column")
        })
    }

    /// Number of rows.
    #[must_use]
    pub const fn num_rows(&self) -> usize {
        self.num_rows
    }
}
