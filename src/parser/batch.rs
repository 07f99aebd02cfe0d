//! Columnar batch extraction: slices fixed-width field regions out of a row
//! range and converts them to the schema-declared scalar types.
//!
//! Conversion is defensive at the value level only. Record and field geometry
//! are trusted once the catalog has been parsed; any cell that fails to parse
//! becomes a null instead of aborting the run. Extraction never mutates the
//! table's buffer, so overlapping batches are safe.

use std::borrow::Cow;

use time::{Date, Month};

use crate::parser::encoding::LegacyEncoding;
use crate::parser::fields::ColumnKind;
use crate::parser::table::DbfTable;
use crate::value::Value;

/// Julian day number of 1970-01-01, the epoch for day-granularity output.
pub const UNIX_EPOCH_JULIAN_DAY: i32 = 2_440_588;

/// Converts a calendar date to days since 1970-01-01.
#[must_use]
pub const fn days_since_unix_epoch(date: Date) -> i32 {
    date.to_julian_day() - UNIX_EPOCH_JULIAN_DAY
}

/// One extracted column: typed values with per-row validity.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    Boolean(Vec<Option<bool>>),
    Date(Vec<Option<Date>>),
}

impl ColumnData {
    fn with_capacity(kind: ColumnKind, capacity: usize) -> Self {
        match kind {
            ColumnKind::Text => Self::Text(Vec::with_capacity(capacity)),
            ColumnKind::Int32 => Self::Int32(Vec::with_capacity(capacity)),
            ColumnKind::Int64 => Self::Int64(Vec::with_capacity(capacity)),
            ColumnKind::Double => Self::Double(Vec::with_capacity(capacity)),
            ColumnKind::Boolean => Self::Boolean(Vec::with_capacity(capacity)),
            ColumnKind::Date => Self::Date(Vec::with_capacity(capacity)),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> ColumnKind {
        match self {
            Self::Text(_) => ColumnKind::Text,
            Self::Int32(_) => ColumnKind::Int32,
            Self::Int64(_) => ColumnKind::Int64,
            Self::Double(_) => ColumnKind::Double,
            Self::Boolean(_) => ColumnKind::Boolean,
            Self::Date(_) => ColumnKind::Date,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Text(values) => values.len(),
            Self::Int32(values) => values.len(),
            Self::Int64(values) => values.len(),
            Self::Double(values) => values.len(),
            Self::Boolean(values) => values.len(),
            Self::Date(values) => values.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the cell at `row` as a borrowed [`Value`].
    #[must_use]
    pub fn value(&self, row: usize) -> Value<'_> {
        match self {
            Self::Text(values) => values[row]
                .as_deref()
                .map_or(Value::Null, |s| Value::Str(Cow::Borrowed(s))),
            Self::Int32(values) => values[row].map_or(Value::Null, Value::Int32),
            Self::Int64(values) => values[row].map_or(Value::Null, Value::Int64),
            Self::Double(values) => values[row].map_or(Value::Null, Value::Float),
            Self::Boolean(values) => values[row].map_or(Value::Null, Value::Bool),
            Self::Date(values) => values[row].map_or(Value::Null, Value::Date),
        }
    }

    fn push_cell(&mut self, bytes: &[u8], encoding: LegacyEncoding) {
        let trimmed = trim_padding(bytes);
        if trimmed.is_empty() {
            // All-whitespace cells are null for every declared type.
            self.push_null();
            return;
        }
        match self {
            Self::Text(values) => values.push(Some(encoding.decode(trimmed).into_owned())),
            Self::Int32(values) => values.push(parse_ascii(trimmed)),
            Self::Int64(values) => values.push(parse_ascii(trimmed)),
            Self::Double(values) => values.push(parse_ascii(trimmed)),
            Self::Boolean(values) => values.push(Some(parse_logical(trimmed))),
            Self::Date(values) => values.push(parse_date(trimmed)),
        }
    }

    fn push_null(&mut self) {
        match self {
            Self::Text(values) => values.push(None),
            Self::Int32(values) => values.push(None),
            Self::Int64(values) => values.push(None),
            Self::Double(values) => values.push(None),
            Self::Boolean(values) => values.push(None),
            Self::Date(values) => values.push(None),
        }
    }
}

/// A columnar view over a contiguous row range.
#[derive(Debug)]
pub struct ColumnarBatch {
    start_row: usize,
    row_count: usize,
    columns: Vec<ColumnData>,
}

impl ColumnarBatch {
    #[must_use]
    pub const fn start_row(&self) -> usize {
        self.start_row
    }

    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.row_count
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, index: usize) -> Option<&ColumnData> {
        self.columns.get(index)
    }

    /// Returns one cell, or `None` when the indices are out of range.
    #[must_use]
    pub fn value(&self, row: usize, column: usize) -> Option<Value<'_>> {
        if row >= self.row_count {
            return None;
        }
        self.columns.get(column).map(|col| col.value(row))
    }
}

/// Extracts `requested_rows` rows starting at `start_row`, clipped to the
/// table's record count.
#[must_use]
pub fn extract_batch(table: &DbfTable, start_row: usize, requested_rows: usize) -> ColumnarBatch {
    let row_count = table
        .row_count()
        .saturating_sub(start_row)
        .min(requested_rows);

    let encoding = table.encoding();
    let mut columns: Vec<ColumnData> = table
        .fields()
        .iter()
        .map(|field| ColumnData::with_capacity(field.column_kind(), row_count))
        .collect();

    for row in start_row..start_row + row_count {
        let record = table.record(row);
        for (field, column) in table.fields().iter().zip(columns.iter_mut()) {
            let start = field.byte_offset;
            let end = start + usize::from(field.length);
            column.push_cell(&record[start..end], encoding);
        }
    }

    ColumnarBatch {
        start_row,
        row_count,
        columns,
    }
}

const fn is_field_padding(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r')
}

/// Trims field padding from both ends without touching the buffer.
fn trim_padding(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|&b| !is_field_padding(b))
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|&b| !is_field_padding(b))
        .map_or(start, |last| last + 1);
    &bytes[start..end]
}

fn parse_ascii<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

/// A logical cell is true for `{T,t,1,Y,y}`; every other non-empty content is
/// false, not an error.
fn parse_logical(bytes: &[u8]) -> bool {
    bytes.len() == 1 && matches!(bytes[0], b'T' | b't' | b'1' | b'Y' | b'y')
}

/// Parses an exact 8-digit `YYYYMMDD` literal into a calendar date.
fn parse_date(bytes: &[u8]) -> Option<Date> {
    if bytes.len() != 8 || !bytes.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let digits = std::str::from_utf8(bytes).ok()?;
    let year: i32 = digits[..4].parse().ok()?;
    let month: u8 = digits[4..6].parse().ok()?;
    let day: u8 = digits[6..8].parse().ok()?;
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::fields::raw_descriptor;
    use crate::parser::table::test_table_buffer;

    fn table(descriptors: &[[u8; 32]], records: &[&[u8]], language: u8) -> DbfTable {
        DbfTable::from_decompressed(test_table_buffer(descriptors, records, language)).unwrap()
    }

    #[test]
    fn whitespace_only_cells_are_null_for_every_type() {
        let table = table(
            &[
                raw_descriptor("C", b'C', 4, 0),
                raw_descriptor("N", b'N', 4, 0),
                raw_descriptor("F", b'N', 4, 2),
                raw_descriptor("D", b'D', 8, 0),
                raw_descriptor("L", b'L', 1, 0),
            ],
            &[{
                let mut record = [b' '; 22];
                record[2] = b'\t';
                record[6] = b'\n';
                record[14] = b'\r';
                record[21] = b'\t';
                record
            }
            .as_slice()],
            0x02,
        );
        let batch = extract_batch(&table, 0, 10);
        assert_eq!(batch.row_count(), 1);
        for column in batch.columns() {
            assert_eq!(column.value(0), Value::Null);
        }
    }

    #[test]
    fn numeric_width_boundary_selects_integer_type() {
        let table = table(
            &[
                raw_descriptor("SMALL", b'N', 9, 0),
                raw_descriptor("LARGE", b'N', 10, 0),
            ],
            &[b" 1234567891234567890"],
            0x02,
        );
        let batch = extract_batch(&table, 0, 1);
        assert_eq!(batch.value(0, 0), Some(Value::Int32(123_456_789)));
        assert_eq!(batch.value(0, 1), Some(Value::Int64(1_234_567_890)));
    }

    #[test]
    fn fractional_numeric_parses_as_double() {
        let table = table(
            &[raw_descriptor("RATE", b'N', 8, 3)],
            &[b"    3.125", b" badnum  ", b"   -0.25 "],
            0x02,
        );
        let batch = extract_batch(&table, 0, 3);
        assert_eq!(batch.value(0, 0), Some(Value::Float(3.125)));
        assert_eq!(batch.value(1, 0), Some(Value::Null));
        assert_eq!(batch.value(2, 0), Some(Value::Float(-0.25)));
    }

    #[test]
    fn date_parsing_validates_the_calendar() {
        let table = table(
            &[raw_descriptor("DT", b'D', 8, 0)],
            &[b" 20230229", b" 20240229", b" 2024022X", b" 202402  "],
            0x02,
        );
        let batch = extract_batch(&table, 0, 4);
        // 2023 is not a leap year.
        assert_eq!(batch.value(0, 0), Some(Value::Null));
        let leap = Date::from_calendar_date(2024, Month::February, 29).unwrap();
        assert_eq!(batch.value(1, 0), Some(Value::Date(leap)));
        assert_eq!(batch.value(2, 0), Some(Value::Null));
        assert_eq!(batch.value(3, 0), Some(Value::Null));
    }

    #[test]
    fn logical_truth_table() {
        let table = table(
            &[raw_descriptor("FLAG", b'L', 1, 0)],
            &[b" Y", b" N", b"  ", b" X", b" t", b" 1"],
            0x02,
        );
        let batch = extract_batch(&table, 0, 6);
        assert_eq!(batch.value(0, 0), Some(Value::Bool(true)));
        assert_eq!(batch.value(1, 0), Some(Value::Bool(false)));
        assert_eq!(batch.value(2, 0), Some(Value::Null));
        assert_eq!(batch.value(3, 0), Some(Value::Bool(false)));
        assert_eq!(batch.value(4, 0), Some(Value::Bool(true)));
        assert_eq!(batch.value(5, 0), Some(Value::Bool(true)));
    }

    #[test]
    fn memo_fields_extract_as_text() {
        let table = table(
            &[raw_descriptor("NOTES", b'M', 6, 0)],
            &[b" note1 "],
            0x02,
        );
        let batch = extract_batch(&table, 0, 1);
        assert_eq!(batch.value(0, 0), Some(Value::Str("note1".into())));
    }

    #[test]
    fn character_cells_decode_the_legacy_code_page() {
        let table = table(
            &[raw_descriptor("NAME", b'C', 6, 0)],
            &[b" Jo\xA0o  ", b" plain "],
            0x01,
        );
        let batch = extract_batch(&table, 0, 2);
        assert_eq!(batch.value(0, 0), Some(Value::Str("Joáo".into())));
        assert_eq!(batch.value(1, 0), Some(Value::Str("plain".into())));
    }

    #[test]
    fn row_range_is_clipped_to_the_table() {
        let table = table(
            &[raw_descriptor("N", b'N', 3, 0)],
            &[b"   1", b"   2", b"   3"],
            0x02,
        );
        let tail = extract_batch(&table, 2, 100);
        assert_eq!(tail.row_count(), 1);
        assert_eq!(tail.start_row(), 2);
        assert_eq!(tail.value(0, 0), Some(Value::Int32(3)));

        let past_end = extract_batch(&table, 5, 10);
        assert!(past_end.is_empty());
    }

    #[test]
    fn epoch_day_arithmetic() {
        let epoch = Date::from_calendar_date(1970, Month::January, 1).unwrap();
        assert_eq!(days_since_unix_epoch(epoch), 0);
        let y2k = Date::from_calendar_date(2000, Month::January, 1).unwrap();
        assert_eq!(days_since_unix_epoch(y2k), 10_957);
    }
}
