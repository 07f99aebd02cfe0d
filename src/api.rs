use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use crate::error::Result;
use crate::parser::{ColumnarBatch, DbfTable, extract_batch};
use crate::sinks::{ColumnarSink, SinkContext};

const DEFAULT_BATCH_ROWS: usize = 65_536;

/// Configures batch sizing for extraction and conversion.
#[derive(Debug, Clone)]
pub struct ReadOptions {
    batch_rows: usize,
}

impl ReadOptions {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            batch_rows: DEFAULT_BATCH_ROWS,
        }
    }

    /// Sets the number of rows extracted per batch, bounding the typed
    /// representation's peak memory independently of the table size.
    #[must_use]
    pub const fn with_batch_rows(mut self, rows: usize) -> Self {
        self.batch_rows = if rows == 0 { 1 } else { rows };
        self
    }

    #[must_use]
    pub const fn batch_rows(&self) -> usize {
        self.batch_rows
    }
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// A loaded DBC file: the decompressed table plus its parsed metadata, owned
/// for the duration of one conversion run.
pub struct DbcFile {
    table: DbfTable,
}

impl DbcFile {
    /// Opens and loads a DBC container from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are
    /// corrupt.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::from_reader(&mut reader)
    }

    /// Loads a DBC container from any seekable reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be decompressed or parsed.
    pub fn from_reader<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            table: DbfTable::from_compressed(reader)?,
        })
    }

    /// Wraps an already-decompressed dBase buffer (a plain `.dbf` image).
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer does not hold a consistent table.
    pub fn from_decompressed(buffer: Vec<u8>) -> Result<Self> {
        Ok(Self {
            table: DbfTable::from_decompressed(buffer)?,
        })
    }

    #[must_use]
    pub const fn table(&self) -> &DbfTable {
        &self.table
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    #[must_use]
    pub fn column_count(&self) -> usize {
        self.table.column_count()
    }

    /// Iterates over the table in row order, one columnar batch at a time.
    #[must_use]
    pub const fn batches<'a>(&'a self, options: &ReadOptions) -> Batches<'a> {
        Batches {
            table: &self.table,
            next_row: 0,
            batch_rows: options.batch_rows,
        }
    }

    /// Drives a full conversion: declares the schema, forwards every batch in
    /// increasing row order, then finalises the sink exactly once.
    ///
    /// # Errors
    ///
    /// Returns the first sink failure; the sink's output is not finalised in
    /// that case.
    pub fn convert<S: ColumnarSink>(&self, sink: &mut S, options: &ReadOptions) -> Result<()> {
        sink.begin(SinkContext::new(&self.table))?;
        for batch in self.batches(options) {
            sink.write_batch(&batch)?;
        }
        sink.finish()
    }
}

/// Iterator over consecutive columnar batches of a table.
pub struct Batches<'a> {
    table: &'a DbfTable,
    next_row: usize,
    batch_rows: usize,
}

impl Iterator for Batches<'_> {
    type Item = ColumnarBatch;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.table.row_count() {
            return None;
        }
        let batch = extract_batch(self.table, self.next_row, self.batch_rows);
        self.next_row += batch.row_count();
        Some(batch)
    }
}
