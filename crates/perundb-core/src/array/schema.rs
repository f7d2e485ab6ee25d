//! Schema and data type definitions for columnar data.
//!
//! The physical type system is a closed set: four primitives plus
//! fixed-size lists of a primitive (the on-disk representation of vector
//! columns). The schema carries a compact binary form used by the file
//! header, which is length-prefixed and must fit the 8 KiB header
//! reservation.

use crate::error::{Error, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Physical data types supported by the columnar format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    /// 32-bit signed integer.
    Int32,
    /// 64-bit signed integer.
    Int64,
    /// 32-bit IEEE 754 float.
    Float32,
    /// 64-bit IEEE 754 float.
    Float64,
    /// Fixed-size list of a primitive type with a fixed element count.
    ///
    /// The child type must be one of the four primitives and the size must
    /// be positive.
    FixedSizeList(Box<DataType>, i32),
}

impl DataType {
    /// Byte width of one value of this type.
    ///
    /// For fixed-size lists this is the full list width
    /// (`child_width * list_size`).
    #[must_use]
    pub fn byte_width(&self) -> usize {
        match self {
            Self::Int32 | Self::Float32 => 4,
            Self::Int64 | Self::Float64 => 8,
            #[allow(clippy::cast_sign_loss)]
            Self::FixedSizeList(child, size) => child.byte_width() * (*size as usize),
        }
    }

    /// Returns true for Int32 / Int64.
    #[must_use]
    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Int32 | Self::Int64)
    }

    /// Returns true for Float32 / Float64.
    #[must_use]
    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Returns true for fixed-size lists.
    #[must_use]
    pub const fn is_fixed_size_list(&self) -> bool {
        matches!(self, Self::FixedSizeList(_, _))
    }

    /// Validates the closed-set constraints (primitive child, positive size).
    pub fn validate(&self) -> Result<()> {
        if let Self::FixedSizeList(child, size) = self {
            if *size <= 0 {
                return Err(Error::invalid_argument(format!(
                    "fixed-size list size must be positive, got {size}"
                ))
                .op("schema::validate"));
            }
            if child.is_fixed_size_list() {
                return Err(Error::invalid_argument(
                    "fixed-size list child must be a primitive type",
                )
                .op("schema::validate"));
            }
        }
        Ok(())
    }

    const fn tag(&self) -> u8 {
        match self {
            Self::Int32 => 1,
            Self::Int64 => 2,
            Self::Float32 => 3,
            Self::Float64 => 4,
            Self::FixedSizeList(_, _) => 5,
        }
    }

    fn primitive_from_tag(tag: u8) -> Result<Self> {
        match tag {
            1 => Ok(Self::Int32),
            2 => Ok(Self::Int64),
            3 => Ok(Self::Float32),
            4 => Ok(Self::Float64),
            _ => Err(Error::corrupted(format!("unknown data type tag {tag}"))
                .op("schema::decode")),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int32 => write!(f, "int32"),
            Self::Int64 => write!(f, "int64"),
            Self::Float32 => write!(f, "float32"),
            Self::Float64 => write!(f, "float64"),
            Self::FixedSizeList(child, size) => {
                write!(f, "fixed_size_list<{child}, {size}>")
            }
        }
    }
}

/// A named, typed column in a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Physical type.
    pub data_type: DataType,
    /// Whether the column may contain nulls.
    pub nullable: bool,
    /// Optional key/value metadata.
    pub metadata: BTreeMap<String, String>,
}

impl Field {
    /// Creates a non-nullable field without metadata.
    #[must_use]
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: false,
            metadata: BTreeMap::new(),
        }
    }

    /// Creates a nullable field without metadata.
    #[must_use]
    pub fn nullable(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable: true,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Ordered sequence of fields plus schema-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    /// Columns in declaration order.
    pub fields: Vec<Field>,
    /// Schema-level key/value metadata.
    pub metadata: BTreeMap<String, String>,
}

impl Schema {
    /// Creates a schema from a list of fields.
    #[must_use]
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            metadata: BTreeMap::new(),
        }
    }

    /// Adds a schema-level metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the field at `index`, or `ColumnNotFound`.
    pub fn field(&self, index: usize) -> Result<&Field> {
        self.fields.get(index).ok_or_else(|| {
            Error::new(
                crate::error::ErrorCode::ColumnNotFound,
                format!("column {index} out of range ({} columns)", self.fields.len()),
            )
            .op("schema::field")
        })
    }

    /// Validates every field type.
    pub fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(Error::invalid_argument("schema has no fields").op("schema::validate"));
        }
        for field in &self.fields {
            field.data_type.validate()?;
        }
        Ok(())
    }

    /// Serializes the schema to its compact binary form (all LE).
    ///
    /// Layout: `u16 field_count`, then per field `u16 name_len + name`,
    /// type tag (`u8`, fixed-size list adds `u8 child_tag + i32 size`),
    /// `u8 nullable`, metadata pairs; then schema-level metadata pairs.
    /// Metadata pairs are `u16 count { u16 klen, key, u16 vlen, value }`.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        write_u16(&mut buf, self.fields.len() as u16);
        for field in &self.fields {
            write_str(&mut buf, &field.name);
            buf.push(field.data_type.tag());
            if let DataType::FixedSizeList(child, size) = &field.data_type {
                buf.push(child.tag());
                buf.extend_from_slice(&size.to_le_bytes());
            }
            buf.push(u8::from(field.nullable));
            write_meta(&mut buf, &field.metadata);
        }
        write_meta(&mut buf, &self.metadata);
        buf
    }

    /// Deserializes a schema from its binary form.
    ///
    /// # Errors
    ///
    /// Returns `CorruptedFile` on truncation or unknown tags.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut cur = Cursor::new(bytes);
        let field_count = cur.read_u16()?;
        let mut fields = Vec::with_capacity(field_count as usize);
        for _ in 0..field_count {
            let name = cur.read_str()?;
            let tag = cur.read_u8()?;
            let data_type = if tag == 5 {
                let child = DataType::primitive_from_tag(cur.read_u8()?)?;
                let size = cur.read_i32()?;
                DataType::FixedSizeList(Box::new(child), size)
            } else {
                DataType::primitive_from_tag(tag)?
            };
            let nullable = cur.read_u8()? != 0;
            let metadata = cur.read_meta()?;
            fields.push(Field {
                name,
                data_type,
                nullable,
                metadata,
            });
        }
        let metadata = cur.read_meta()?;
        let schema = Self { fields, metadata };
        schema.validate().map_err(|e| {
            Error::corrupted("schema failed validation after decode")
                .op("schema::decode")
                .caused_by(e)
        })?;
        Ok(schema)
    }
}

fn write_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_u16(buf, s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
}

fn write_meta(buf: &mut Vec<u8>, meta: &BTreeMap<String, String>) {
    write_u16(buf, meta.len() as u16);
    for (k, v) in meta {
        write_str(buf, k);
        write_str(buf, v);
    }
}

/// Minimal bounds-checked reader over a byte slice.
struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or_else(truncated)?;
        if end > self.bytes.len() {
            return Err(truncated());
        }
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn read_str(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| Error::corrupted("schema string is not valid UTF-8").op("schema::decode"))
    }

    fn read_meta(&mut self) -> Result<BTreeMap<String, String>> {
        let count = self.read_u16()?;
        let mut meta = BTreeMap::new();
        for _ in 0..count {
            let k = self.read_str()?;
            let v = self.read_str()?;
            meta.insert(k, v);
        }
        Ok(meta)
    }
}

fn truncated() -> Error {
    Error::corrupted("schema bytes truncated").op("schema::decode")
}
