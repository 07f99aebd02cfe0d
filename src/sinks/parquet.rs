use std::borrow::Cow;
use std::io::Write;
use std::sync::Arc;

use parquet::basic::{Compression, LogicalType, Repetition, Type as PhysicalType, ZstdLevel};
use parquet::data_type::{BoolType, ByteArray, ByteArrayType, DoubleType, Int32Type, Int64Type};
use parquet::file::properties::WriterProperties;
use parquet::file::writer::{SerializedColumnWriter, SerializedFileWriter};
use parquet::schema::types::{Type, TypePtr};

use crate::error::{Error, Result};
use crate::parser::{ColumnData, ColumnKind, ColumnarBatch, FieldDescriptor, days_since_unix_epoch};
use crate::sinks::{ColumnarSink, SinkContext};

const DEFAULT_ROW_GROUP_SIZE: usize = 65_536;

/// Writes extracted columnar batches into a Parquet file.
///
/// The output is only finalised (footer written) by a successful `finish`;
/// an aborted run leaves no readable Parquet artifact.
pub struct ParquetSink<W: Write + Send> {
    output: Option<W>,
    writer: Option<SerializedFileWriter<W>>,
    row_group_size: usize,
    columns: Vec<ColumnPlan>,
    rows_buffered: usize,
}

impl<W: Write + Send> ParquetSink<W> {
    /// Creates a new sink that writes to the supplied writer.
    #[must_use]
    pub const fn new(writer: W) -> Self {
        Self {
            output: Some(writer),
            writer: None,
            row_group_size: DEFAULT_ROW_GROUP_SIZE,
            columns: Vec::new(),
            rows_buffered: 0,
        }
    }

    /// Configures the number of rows buffered per Parquet row group.
    #[must_use]
    pub const fn with_row_group_size(mut self, size: usize) -> Self {
        self.row_group_size = if size == 0 { 1 } else { size };
        self
    }

    /// Returns the underlying writer once the sink has been finalised.
    ///
    /// # Errors
    ///
    /// Returns an error if the sink has not been finished or if the internal
    /// output has already been taken.
    pub fn into_inner(mut self) -> Result<W> {
        if self.writer.is_some() {
            return Err(Error::Parquet {
                details: Cow::from("attempted to take Parquet writer before sink was finished"),
            });
        }
        self.output.take().ok_or_else(|| Error::Parquet {
            details: Cow::from("Parquet sink output already consumed"),
        })
    }

    fn flush(&mut self) -> Result<()> {
        if self.rows_buffered == 0 {
            return Ok(());
        }

        let writer = self.writer.as_mut().ok_or_else(|| Error::Parquet {
            details: Cow::from("Parquet sink has not been initialised"),
        })?;
        let mut row_group = writer.next_row_group()?;

        for plan in &mut self.columns {
            let column_writer = row_group.next_column()?.ok_or_else(|| Error::Parquet {
                details: Cow::from("writer returned fewer columns than the schema described"),
            })?;
            plan.flush(column_writer)?;
        }

        // Ensure the row group writer has no dangling columns.
        if row_group.next_column()?.is_some() {
            return Err(Error::Parquet {
                details: Cow::from("writer returned more columns than the schema described"),
            });
        }

        row_group.close()?;
        self.rows_buffered = 0;
        Ok(())
    }
}

impl<W: Write + Send> ColumnarSink for ParquetSink<W> {
    fn begin(&mut self, context: SinkContext<'_>) -> Result<()> {
        if self.writer.is_some() {
            return Err(Error::Parquet {
                details: Cow::from("Parquet sink cannot be reused without finishing"),
            });
        }

        let mut plans = Vec::with_capacity(context.table.column_count());
        let mut schema_fields: Vec<TypePtr> = Vec::with_capacity(context.table.column_count());
        for field in context.table.fields() {
            let (plan, schema_field) = ColumnPlan::new(field)?;
            plans.push(plan);
            schema_fields.push(schema_field);
        }
        for plan in &mut plans {
            plan.reserve_capacity(self.row_group_size.min(context.table.row_count()));
        }

        let schema = Type::group_type_builder("schema")
            .with_fields(schema_fields)
            .build()?;
        let props = WriterProperties::builder()
            .set_compression(Compression::ZSTD(ZstdLevel::default()))
            .build();
        let output = self.output.take().ok_or_else(|| Error::Parquet {
            details: Cow::from("Parquet sink output already taken"),
        })?;
        let writer = SerializedFileWriter::new(output, Arc::new(schema), props.into())?;

        self.columns = plans;
        self.writer = Some(writer);
        self.rows_buffered = 0;
        Ok(())
    }

    fn write_batch(&mut self, batch: &ColumnarBatch) -> Result<()> {
        if self.writer.is_none() {
            return Err(Error::Parquet {
                details: Cow::from("batches written before Parquet sink initialised"),
            });
        }
        if batch.columns().len() != self.columns.len() {
            return Err(Error::Parquet {
                details: Cow::Owned(format!(
                    "batch has {} columns but the schema declared {}",
                    batch.columns().len(),
                    self.columns.len()
                )),
            });
        }

        // Consume the batch in slices so no row group exceeds the configured
        // size, even when a single batch is larger than one group.
        let mut offset = 0;
        while offset < batch.row_count() {
            let take = (self.row_group_size - self.rows_buffered)
                .min(batch.row_count() - offset);
            for (plan, column) in self.columns.iter_mut().zip(batch.columns()) {
                plan.extend(column, offset, take)?;
            }
            self.rows_buffered += take;
            offset += take;
            if self.rows_buffered >= self.row_group_size {
                self.flush()?;
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.writer.is_none() {
            return Ok(());
        }

        self.flush()?;
        if let Some(writer) = self.writer.take() {
            let output = writer.into_inner()?;
            self.output = Some(output);
        }
        self.columns.clear();
        self.rows_buffered = 0;
        Ok(())
    }
}

enum PlanValues {
    Bytes(Vec<ByteArray>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Double(Vec<f64>),
    Bool(Vec<bool>),
}

struct ColumnPlan {
    kind: ColumnKind,
    def_levels: Vec<i16>,
    values: PlanValues,
}

impl ColumnPlan {
    fn new(field: &FieldDescriptor) -> Result<(Self, TypePtr)> {
        let kind = field.column_kind();
        let (physical_type, logical_type, values) = match kind {
            ColumnKind::Text => (
                PhysicalType::BYTE_ARRAY,
                Some(LogicalType::String),
                PlanValues::Bytes(Vec::new()),
            ),
            ColumnKind::Int32 => (PhysicalType::INT32, None, PlanValues::Int32(Vec::new())),
            ColumnKind::Int64 => (PhysicalType::INT64, None, PlanValues::Int64(Vec::new())),
            ColumnKind::Double => (PhysicalType::DOUBLE, None, PlanValues::Double(Vec::new())),
            ColumnKind::Date => (
                PhysicalType::INT32,
                Some(LogicalType::Date),
                PlanValues::Int32(Vec::new()),
            ),
            ColumnKind::Boolean => (PhysicalType::BOOLEAN, None, PlanValues::Bool(Vec::new())),
        };

        let schema_field = Type::primitive_type_builder(&field.name, physical_type)
            .with_repetition(Repetition::OPTIONAL)
            .with_logical_type(logical_type)
            .build()?;

        let plan = Self {
            kind,
            def_levels: Vec::new(),
            values,
        };
        Ok((plan, Arc::new(schema_field)))
    }

    fn reserve_capacity(&mut self, capacity: usize) {
        self.def_levels.reserve(capacity);
        match &mut self.values {
            PlanValues::Bytes(values) => values.reserve(capacity),
            PlanValues::Int32(values) => values.reserve(capacity),
            PlanValues::Int64(values) => values.reserve(capacity),
            PlanValues::Double(values) => values.reserve(capacity),
            PlanValues::Bool(values) => values.reserve(capacity),
        }
    }

    /// Buffers `rows` cells of `column` starting at `start`.
    fn extend(&mut self, column: &ColumnData, start: usize, rows: usize) -> Result<()> {
        match (&mut self.values, column) {
            (PlanValues::Bytes(values), ColumnData::Text(cells)) => {
                for cell in &cells[start..start + rows] {
                    self.def_levels.push(i16::from(cell.is_some()));
                    if let Some(text) = cell {
                        values.push(ByteArray::from(text.as_str()));
                    }
                }
            }
            (PlanValues::Int32(values), ColumnData::Int32(cells)) => {
                for cell in &cells[start..start + rows] {
                    self.def_levels.push(i16::from(cell.is_some()));
                    if let Some(value) = cell {
                        values.push(*value);
                    }
                }
            }
            (PlanValues::Int32(values), ColumnData::Date(cells)) => {
                for cell in &cells[start..start + rows] {
                    self.def_levels.push(i16::from(cell.is_some()));
                    if let Some(date) = cell {
                        values.push(days_since_unix_epoch(*date));
                    }
                }
            }
            (PlanValues::Int64(values), ColumnData::Int64(cells)) => {
                for cell in &cells[start..start + rows] {
                    self.def_levels.push(i16::from(cell.is_some()));
                    if let Some(value) = cell {
                        values.push(*value);
                    }
                }
            }
            (PlanValues::Double(values), ColumnData::Double(cells)) => {
                for cell in &cells[start..start + rows] {
                    self.def_levels.push(i16::from(cell.is_some()));
                    if let Some(value) = cell {
                        values.push(*value);
                    }
                }
            }
            (PlanValues::Bool(values), ColumnData::Boolean(cells)) => {
                for cell in &cells[start..start + rows] {
                    self.def_levels.push(i16::from(cell.is_some()));
                    if let Some(value) = cell {
                        values.push(*value);
                    }
                }
            }
            _ => {
                return Err(Error::Parquet {
                    details: Cow::Owned(format!(
                        "batch column of kind {} does not match the declared schema",
                        column.kind().name()
                    )),
                });
            }
        }
        Ok(())
    }

    fn flush(&mut self, mut column_writer: SerializedColumnWriter<'_>) -> Result<()> {
        match (&mut self.values, self.kind) {
            (PlanValues::Bytes(values), ColumnKind::Text) => {
                let writer = column_writer.typed::<ByteArrayType>();
                writer.write_batch(values, Some(&self.def_levels), None)?;
                values.clear();
            }
            (PlanValues::Int32(values), ColumnKind::Int32 | ColumnKind::Date) => {
                let writer = column_writer.typed::<Int32Type>();
                writer.write_batch(values, Some(&self.def_levels), None)?;
                values.clear();
            }
            (PlanValues::Int64(values), ColumnKind::Int64) => {
                let writer = column_writer.typed::<Int64Type>();
                writer.write_batch(values, Some(&self.def_levels), None)?;
                values.clear();
            }
            (PlanValues::Double(values), ColumnKind::Double) => {
                let writer = column_writer.typed::<DoubleType>();
                writer.write_batch(values, Some(&self.def_levels), None)?;
                values.clear();
            }
            (PlanValues::Bool(values), ColumnKind::Boolean) => {
                let writer = column_writer.typed::<BoolType>();
                writer.write_batch(values, Some(&self.def_levels), None)?;
                values.clear();
            }
            _ => {
                return Err(Error::Parquet {
                    details: Cow::from("unsupported column encoding during flush"),
                });
            }
        }
        self.def_levels.clear();
        column_writer.close()?;
        Ok(())
    }
}
