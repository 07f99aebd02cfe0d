mod batch;
mod byteorder;
mod encoding;
mod explode;
mod fields;
mod header;
mod table;

pub use batch::{
    ColumnData, ColumnarBatch, UNIX_EPOCH_JULIAN_DAY, days_since_unix_epoch, extract_batch,
};
pub use byteorder::{read_u16_le, read_u32_le};
pub use encoding::LegacyEncoding;
pub use explode::{Explode, decompress_to_vec};
pub use fields::{
    ColumnKind, FIELD_DESCRIPTOR_SIZE, FieldDescriptor, FieldType, field_count, parse_fields,
};
pub use header::{HEADER_SIZE, TableHeader, parse_header};
pub use table::DbfTable;

#[cfg(test)]
pub(crate) use fields::raw_descriptor;
#[cfg(test)]
pub(crate) use table::test_table_buffer;
