//! Decodes the field descriptor array that follows the table header and
//! computes each field's byte offset within a record.

use std::borrow::Cow;

use crate::error::{Error, Result, Stage};
use crate::parser::header::{HEADER_SIZE, TableHeader};

/// Size of one field descriptor on disk.
pub const FIELD_DESCRIPTOR_SIZE: usize = 32;

/// dBase field type tag. Unknown tags are treated as `Character`, and `Memo`
/// fields are extracted as text rather than dereferencing a memo file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Character,
    Numeric,
    Date,
    Logical,
    Memo,
}

impl FieldType {
    #[must_use]
    pub const fn from_tag(tag: u8) -> Self {
        match tag {
            b'N' => Self::Numeric,
            b'D' => Self::Date,
            b'L' => Self::Logical,
            b'M' => Self::Memo,
            _ => Self::Character,
        }
    }
}

/// Scalar type a field maps to in the columnar output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    Int32,
    Int64,
    Double,
    Date,
    Boolean,
}

impl ColumnKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Double => "double",
            Self::Date => "date",
            Self::Boolean => "boolean",
        }
    }
}

/// One column of the table: the on-disk descriptor plus the derived byte
/// offset of the field within each record.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    /// Field name, at most 11 ASCII bytes on disk.
    pub name: String,
    pub field_type: FieldType,
    /// Field width in bytes.
    pub length: u8,
    /// Decimal count; meaningful only for `Numeric` fields.
    pub decimals: u8,
    /// Offset of the field within a record. Field 0 starts at offset 1, past
    /// the per-record deletion flag.
    pub byte_offset: usize,
}

impl FieldDescriptor {
    /// Maps the declared field type to the output scalar type.
    #[must_use]
    pub const fn column_kind(&self) -> ColumnKind {
        match self.field_type {
            FieldType::Numeric => {
                if self.decimals > 0 {
                    ColumnKind::Double
                } else if self.length <= 9 {
                    ColumnKind::Int32
                } else {
                    ColumnKind::Int64
                }
            }
            FieldType::Date => ColumnKind::Date,
            FieldType::Logical => ColumnKind::Boolean,
            FieldType::Character | FieldType::Memo => ColumnKind::Text,
        }
    }
}

/// Number of field descriptors implied by the declared header length.
#[must_use]
pub const fn field_count(header: &TableHeader) -> usize {
    (header.header_length as usize - HEADER_SIZE - 1) / FIELD_DESCRIPTOR_SIZE
}

/// Decodes the contiguous descriptor array immediately after the header.
///
/// # Errors
///
/// Returns an error if the implied field count is zero or the buffer cannot
/// hold the whole array.
pub fn parse_fields(buffer: &[u8], header: &TableHeader) -> Result<Vec<FieldDescriptor>> {
    let count = field_count(header);
    if count == 0 {
        return Err(Error::corrupted(
            Stage::FieldCatalog,
            "header length implies an empty field catalog",
        ));
    }

    let catalog_end = HEADER_SIZE + count * FIELD_DESCRIPTOR_SIZE;
    if buffer.len() < catalog_end {
        return Err(Error::Corrupted {
            stage: Stage::FieldCatalog,
            details: Cow::Owned(format!(
                "buffer ends before the {count}-entry field catalog"
            )),
        });
    }

    let mut fields = Vec::with_capacity(count);
    let mut offset = 1_usize;
    for index in 0..count {
        let start = HEADER_SIZE + index * FIELD_DESCRIPTOR_SIZE;
        let raw = &buffer[start..start + FIELD_DESCRIPTOR_SIZE];

        // The name may occupy all 11 bytes without a NUL terminator.
        let name_len = raw[..11].iter().position(|&b| b == 0).unwrap_or(11);
        let name = String::from_utf8_lossy(&raw[..name_len]).into_owned();

        let length = raw[16];
        fields.push(FieldDescriptor {
            name,
            field_type: FieldType::from_tag(raw[11]),
            length,
            decimals: raw[17],
            byte_offset: offset,
        });
        offset += usize::from(length);
    }

    Ok(fields)
}

/// Builds raw descriptor bytes for unit tests across the parser modules.
#[cfg(test)]
pub(crate) fn raw_descriptor(name: &str, tag: u8, length: u8, decimals: u8) -> [u8; 32] {
    let mut bytes = [0_u8; FIELD_DESCRIPTOR_SIZE];
    bytes[..name.len()].copy_from_slice(name.as_bytes());
    bytes[11] = tag;
    bytes[16] = length;
    bytes[17] = decimals;
    bytes
}
