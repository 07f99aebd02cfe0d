mod parquet;

use crate::error::Result;
use crate::parser::{ColumnarBatch, DbfTable};

pub use parquet::ParquetSink;

/// Provides table information to sinks during initialisation.
pub struct SinkContext<'a> {
    pub table: &'a DbfTable,
}

impl<'a> SinkContext<'a> {
    #[must_use]
    pub const fn new(table: &'a DbfTable) -> Self {
        Self { table }
    }
}

/// Trait implemented by sinks that consume typed columnar batches.
///
/// Callers invoke the methods in order: `begin` once, `write_batch` with
/// batches in increasing row order, `finish` exactly once. A sink must not
/// finalise its output before `finish` succeeds.
pub trait ColumnarSink {
    /// Called before any batches, with the table whose schema is being written.
    fn begin(&mut self, context: SinkContext<'_>) -> Result<()>;

    /// Invoked for every extracted batch, in row order.
    fn write_batch(&mut self, batch: &ColumnarBatch) -> Result<()>;

    /// Called once after the last batch to flush and finalise output.
    fn finish(&mut self) -> Result<()>;
}
