//! Reader for PKWare-DCL-compressed dBase III files (the DATASUS `.dbc`
//! container) with typed batch extraction and a Parquet sink.
//!
//! The pipeline is strictly sequential: the container is decompressed into a
//! single frozen buffer, the table header and field catalog are decoded from
//! it, and record batches are then sliced out and converted to typed columns
//! on demand.

pub mod api;
pub mod error;
pub mod logger;
pub mod parser;
pub mod sinks;
pub mod value;

pub use crate::error::{Error, Result};
pub use api::{DbcFile, ReadOptions};
pub use sinks::{ColumnarSink, ParquetSink, SinkContext};
pub use value::Value;
