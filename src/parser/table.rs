//! In-memory table handle: owns the decompressed buffer, the parsed header
//! and the field catalog for the lifetime of one conversion run.

use std::borrow::Cow;
use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::error::{Error, Result, Stage};
use crate::parser::encoding::LegacyEncoding;
use crate::parser::explode;
use crate::parser::fields::{FieldDescriptor, parse_fields};
use crate::parser::header::{TableHeader, parse_header};

/// Bytes between the verbatim pre-header and the implode stream in a DBC
/// container (a CRC32 of the compressed payload, not verified here).
const CONTAINER_GAP: u64 = 4;

/// A fully parsed dBase table backed by one frozen in-memory buffer.
///
/// A value of this type only exists after the header and field catalog have
/// been decoded successfully, so every accessor operates on consistent state.
#[derive(Debug)]
pub struct DbfTable {
    buffer: Vec<u8>,
    header: TableHeader,
    fields: Vec<FieldDescriptor>,
    encoding: LegacyEncoding,
}

impl DbfTable {
    /// Loads a DBC container: bytes 8-9 give the length of the uncompressed
    /// pre-header (table header + field catalog + terminator), which is copied
    /// verbatim; the implode stream that starts four bytes later is
    /// decompressed and appended.
    ///
    /// # Errors
    ///
    /// Returns an error on I/O failure, a corrupt implode stream, or an
    /// inconsistent table layout.
    pub fn from_compressed<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(8))?;
        let pre_header_length = reader.read_u16::<LittleEndian>()?;

        reader.seek(SeekFrom::Start(0))?;
        let mut buffer = vec![0_u8; usize::from(pre_header_length)];
        reader.read_exact(&mut buffer)?;

        reader.seek(SeekFrom::Start(u64::from(pre_header_length) + CONTAINER_GAP))?;
        explode::decompress_to_vec(&mut *reader, &mut buffer)?;

        Self::from_decompressed(buffer)
    }

    /// Builds a table from an already-decompressed dBase buffer (also the
    /// layout of a plain `.dbf` file).
    ///
    /// # Errors
    ///
    /// Returns an error if the header, field catalog or record region is
    /// inconsistent with the buffer.
    pub fn from_decompressed(buffer: Vec<u8>) -> Result<Self> {
        let header = parse_header(&buffer)?;
        let fields = parse_fields(&buffer, &header)?;

        // Field slicing trusts the catalog geometry, so the declared widths
        // must fit inside one record.
        let record_width = fields
            .last()
            .map_or(1, |field| field.byte_offset + usize::from(field.length));
        if record_width > usize::from(header.record_length) {
            return Err(Error::Corrupted {
                stage: Stage::FieldCatalog,
                details: Cow::Owned(format!(
                    "field catalog spans {record_width} bytes but records are {} bytes",
                    header.record_length
                )),
            });
        }

        let record_region_end = usize::from(header.header_length)
            + header.record_count as usize * usize::from(header.record_length);
        if buffer.len() < record_region_end {
            return Err(Error::Corrupted {
                stage: Stage::Records,
                details: Cow::Owned(format!(
                    "buffer holds {} bytes but {} records of {} bytes end at {}",
                    buffer.len(),
                    header.record_count,
                    header.record_length,
                    record_region_end
                )),
            });
        }

        let encoding = header.encoding();
        Ok(Self {
            buffer,
            header,
            fields,
            encoding,
        })
    }

    #[must_use]
    pub const fn header(&self) -> &TableHeader {
        &self.header
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.header.record_count as usize
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    #[must_use]
    pub fn field(&self, index: usize) -> Option<&FieldDescriptor> {
        self.fields.get(index)
    }

    #[must_use]
    pub const fn encoding(&self) -> LegacyEncoding {
        self.encoding
    }

    /// Returns the bytes of one record, including the leading deletion flag.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of range; construction has already verified the
    /// record region for all rows below `row_count()`.
    #[must_use]
    pub fn record(&self, row: usize) -> &[u8] {
        assert!(row < self.row_count(), "row {row} out of range");
        let start =
            usize::from(self.header.header_length) + row * usize::from(self.header.record_length);
        &self.buffer[start..start + usize::from(self.header.record_length)]
    }
}

/// Builds a minimal decompressed table buffer for unit tests.
#[cfg(test)]
pub(crate) fn test_table_buffer(
    descriptors: &[[u8; 32]],
    records: &[&[u8]],
    language: u8,
) -> Vec<u8> {
    use crate::parser::fields::FIELD_DESCRIPTOR_SIZE;
    use crate::parser::header::{HEADER_SIZE, raw_header};

    let header_length =
        u16::try_from(HEADER_SIZE + descriptors.len() * FIELD_DESCRIPTOR_SIZE + 1).unwrap();
    let record_length = u16::try_from(records.first().map_or(1, |r| r.len())).unwrap();
    let mut buffer = Vec::new();
    buffer.extend_from_slice(&raw_header(
        u32::try_from(records.len()).unwrap(),
        header_length,
        record_length,
        language,
    ));
    for descriptor in descriptors {
        buffer.extend_from_slice(descriptor);
    }
    buffer.push(0x0D);
    for record in records {
        assert_eq!(record.len(), usize::from(record_length));
        buffer.extend_from_slice(record);
    }
    buffer.push(0x1A);
    buffer
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::explode::testutil::ImplodeWriter;
    use crate::parser::fields::raw_descriptor;

    fn two_column_buffer() -> Vec<u8> {
        test_table_buffer(
            &[
                raw_descriptor("NAME", b'C', 5, 0),
                raw_descriptor("CITY", b'C', 10, 0),
            ],
            &[
                b" Ana  Sao Paulo ",
                b" Bia  Recife    ",
                b" Caio Salvador  ",
            ],
            0x02,
        )
    }

    #[test]
    fn builds_from_decompressed_buffer() {
        let table = DbfTable::from_decompressed(two_column_buffer()).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.encoding(), LegacyEncoding::Cp850);
        assert_eq!(table.field(0).unwrap().name, "NAME");
        assert_eq!(table.record(1)[0], b' ');
        assert_eq!(&table.record(1)[1..6], b"Bia  ");
    }

    #[test]
    fn loads_a_compressed_container() {
        let buffer = two_column_buffer();
        let header_length = 97_usize;

        let mut container = buffer[..header_length].to_vec();
        container.extend_from_slice(&[0_u8; 4]);
        container.extend_from_slice(&ImplodeWriter::stored(&buffer[header_length..]));

        let mut cursor = std::io::Cursor::new(container);
        let table = DbfTable::from_compressed(&mut cursor).unwrap();
        assert_eq!(table.row_count(), 3);
        assert_eq!(&table.record(0)[1..6], b"Ana  ");
        assert_eq!(&table.record(2)[6..16], b"Salvador  ");
    }

    #[test]
    fn field_widths_wider_than_the_record_are_fatal() {
        // Declared field widths sum past the record length; extraction would
        // slice out of bounds if this were accepted.
        let buffer = test_table_buffer(
            &[
                raw_descriptor("NAME", b'C', 5, 0),
                raw_descriptor("CITY", b'C', 30, 0),
            ],
            &[b" Ana  Sao Paulo "],
            0x02,
        );
        assert!(matches!(
            DbfTable::from_decompressed(buffer),
            Err(Error::Corrupted {
                stage: Stage::FieldCatalog,
                ..
            })
        ));
    }

    #[test]
    fn short_record_region_is_fatal() {
        let mut buffer = two_column_buffer();
        buffer.truncate(buffer.len() - 20);
        assert!(matches!(
            DbfTable::from_decompressed(buffer),
            Err(Error::Corrupted {
                stage: Stage::Records,
                ..
            })
        ));
    }
}
