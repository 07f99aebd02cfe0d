//! Converts assembled containers to Parquet and reads the files back.

mod common;

use std::fs::File;
use std::io::Cursor;

use parquet::basic::Type as PhysicalType;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::record::Field;

use dbc2parquet::{DbcFile, ParquetSink, ReadOptions};

fn sample_file() -> DbcFile {
    let buffer = common::table_buffer(
        &[
            common::raw_descriptor("NAME", b'C', 5, 0),
            common::raw_descriptor("AGE", b'N', 3, 0),
            common::raw_descriptor("SCORE", b'N', 6, 1),
            common::raw_descriptor("BORN", b'D', 8, 0),
            common::raw_descriptor("ACTIVE", b'L', 1, 0),
        ],
        &[
            b" Ana   31  12.519840105T",
            b" Bia       -3.020000101 ",
            b" Caio  40      20230229 ",
        ],
        0x02,
    );
    let header_length = 32 + 5 * 32 + 1;
    let container = common::dbc_container(&buffer, header_length);
    let mut cursor = Cursor::new(container);
    DbcFile::from_reader(&mut cursor).unwrap()
}

fn convert_to_parquet(
    file: &DbcFile,
    options: &ReadOptions,
    row_group_size: Option<usize>,
) -> tempfile::NamedTempFile {
    let output = tempfile::NamedTempFile::new().unwrap();
    let mut sink = ParquetSink::new(output.reopen().unwrap());
    if let Some(size) = row_group_size {
        sink = sink.with_row_group_size(size);
    }
    file.convert(&mut sink, options).unwrap();
    output
}

fn sequence_file(rows: usize) -> DbcFile {
    let records: Vec<Vec<u8>> = (0..rows).map(|i| format!(" {i:3}").into_bytes()).collect();
    let record_refs: Vec<&[u8]> = records.iter().map(Vec::as_slice).collect();
    let buffer = common::table_buffer(
        &[common::raw_descriptor("SEQ", b'N', 3, 0)],
        &record_refs,
        0x02,
    );
    let container = common::dbc_container(&buffer, 65);
    let mut cursor = Cursor::new(container);
    DbcFile::from_reader(&mut cursor).unwrap()
}

#[test]
fn writes_schema_and_values() {
    let file = sample_file();
    let output = convert_to_parquet(&file, &ReadOptions::new(), None);

    let reader = SerializedFileReader::new(File::open(output.path()).unwrap()).unwrap();
    let metadata = reader.metadata();
    assert_eq!(metadata.file_metadata().num_rows(), 3);

    let schema = metadata.file_metadata().schema_descr();
    let names: Vec<String> = (0..schema.num_columns())
        .map(|i| schema.column(i).name().to_owned())
        .collect();
    assert_eq!(names, ["NAME", "AGE", "SCORE", "BORN", "ACTIVE"]);
    let physical: Vec<PhysicalType> = (0..schema.num_columns())
        .map(|i| schema.column(i).physical_type())
        .collect();
    assert_eq!(
        physical,
        [
            PhysicalType::BYTE_ARRAY,
            PhysicalType::INT32,
            PhysicalType::DOUBLE,
            PhysicalType::INT32,
            PhysicalType::BOOLEAN,
        ]
    );

    let rows: Vec<Vec<Field>> = reader
        .get_row_iter(None)
        .unwrap()
        .map(|row| {
            row.unwrap()
                .get_column_iter()
                .map(|(_, field)| field.clone())
                .collect()
        })
        .collect();

    assert_eq!(rows[0][0], Field::Str("Ana".to_owned()));
    assert_eq!(rows[0][1], Field::Int(31));
    assert_eq!(rows[0][2], Field::Double(12.5));
    // 1984-01-05 is 5117 days after the Unix epoch.
    assert_eq!(rows[0][3], Field::Date(5117));
    assert_eq!(rows[0][4], Field::Bool(true));

    // Blank numeric and logical cells are null.
    assert_eq!(rows[1][1], Field::Null);
    assert_eq!(rows[1][2], Field::Double(-3.0));
    assert_eq!(rows[1][3], Field::Date(10_957));
    assert_eq!(rows[1][4], Field::Null);

    // An impossible calendar date is null rather than an error.
    assert_eq!(rows[2][3], Field::Null);
    assert_eq!(rows[2][1], Field::Int(40));
}

#[test]
fn splits_output_into_row_groups() {
    // A single batch wider than the configured row group size must still be
    // split into capped groups.
    let file = sequence_file(5);
    let output = convert_to_parquet(&file, &ReadOptions::new(), Some(2));

    let reader = SerializedFileReader::new(File::open(output.path()).unwrap()).unwrap();
    let metadata = reader.metadata();
    assert_eq!(metadata.num_row_groups(), 3);
    assert_eq!(metadata.file_metadata().num_rows(), 5);
    assert_eq!(metadata.row_group(0).num_rows(), 2);
    assert_eq!(metadata.row_group(2).num_rows(), 1);
}

#[test]
fn row_groups_fill_across_batch_boundaries() {
    // Batches of 3 into groups of 4: groups keep filling across batches.
    let file = sequence_file(10);
    let options = ReadOptions::new().with_batch_rows(3);
    let output = convert_to_parquet(&file, &options, Some(4));

    let reader = SerializedFileReader::new(File::open(output.path()).unwrap()).unwrap();
    let metadata = reader.metadata();
    assert_eq!(metadata.num_row_groups(), 3);
    assert_eq!(metadata.row_group(0).num_rows(), 4);
    assert_eq!(metadata.row_group(1).num_rows(), 4);
    assert_eq!(metadata.row_group(2).num_rows(), 2);

    let values: Vec<Field> = reader
        .get_row_iter(None)
        .unwrap()
        .map(|row| row.unwrap().get_column_iter().next().unwrap().1.clone())
        .collect();
    let expected: Vec<Field> = (0..10).map(Field::Int).collect();
    assert_eq!(values, expected);
}
