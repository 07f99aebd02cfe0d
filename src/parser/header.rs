//! Decodes the fixed 32-byte table header at the start of the decompressed
//! buffer.

use std::borrow::Cow;

use crate::error::{Error, Result, Stage};
use crate::parser::byteorder::{read_u16_le, read_u32_le};
use crate::parser::encoding::LegacyEncoding;

/// Size of the fixed table header on disk.
pub const HEADER_SIZE: usize = 32;

/// Fixed table header of a dBase III file.
///
/// Multi-byte fields are stored little-endian on disk; the raw last-update
/// date bytes are carried through without semantic validation.
#[derive(Debug, Clone)]
pub struct TableHeader {
    /// Byte 0: dialect version marker.
    pub version: u8,
    /// Bytes 1-3: date of last update (YY MM DD, raw).
    pub last_update: [u8; 3],
    /// Bytes 4-7: number of records in the table.
    pub record_count: u32,
    /// Bytes 8-9: number of bytes in the header (header + field catalog +
    /// terminator).
    pub header_length: u16,
    /// Bytes 10-11: number of bytes per record, including the deletion flag.
    pub record_length: u16,
    /// Byte 14: incomplete transaction flag.
    pub transaction: u8,
    /// Byte 15: encryption flag.
    pub encryption: u8,
    /// Byte 28: production index file flag.
    pub mdx: u8,
    /// Byte 29: language driver id selecting the legacy code page.
    pub language: u8,
}

impl TableHeader {
    /// Resolves the legacy code page selected by the language driver byte.
    #[must_use]
    pub fn encoding(&self) -> LegacyEncoding {
        LegacyEncoding::from_language_byte(self.language)
    }
}

/// Parses the table header from the start of the decompressed buffer.
///
/// # Errors
///
/// Returns an error if the buffer is shorter than the fixed header size or if
/// the declared header length does not leave room for a field catalog.
pub fn parse_header(buffer: &[u8]) -> Result<TableHeader> {
    if buffer.len() < HEADER_SIZE {
        return Err(Error::corrupted(
            Stage::Header,
            "buffer shorter than the fixed table header",
        ));
    }

    let header = TableHeader {
        version: buffer[0],
        last_update: [buffer[1], buffer[2], buffer[3]],
        record_count: read_u32_le(&buffer[4..8]),
        header_length: read_u16_le(&buffer[8..10]),
        record_length: read_u16_le(&buffer[10..12]),
        transaction: buffer[14],
        encryption: buffer[15],
        mdx: buffer[28],
        language: buffer[29],
    };

    if usize::from(header.header_length) <= HEADER_SIZE {
        return Err(Error::Corrupted {
            stage: Stage::Header,
            details: Cow::Owned(format!(
                "declared header length {} leaves no room for field descriptors",
                header.header_length
            )),
        });
    }

    Ok(header)
}

/// Builds raw header bytes for unit tests across the parser modules.
#[cfg(test)]
pub(crate) fn raw_header(
    record_count: u32,
    header_length: u16,
    record_length: u16,
    language: u8,
) -> [u8; HEADER_SIZE] {
    let mut bytes = [0_u8; HEADER_SIZE];
    bytes[0] = 0x03;
    bytes[1..4].copy_from_slice(&[24, 5, 17]);
    bytes[4..8].copy_from_slice(&record_count.to_le_bytes());
    bytes[8..10].copy_from_slice(&header_length.to_le_bytes());
    bytes[10..12].copy_from_slice(&record_length.to_le_bytes());
    bytes[29] = language;
    bytes
}
