use std::borrow::Cow;
use std::fmt;
use std::io;

use parquet::errors::ParquetError;

/// Result type used across the DBC reader implementation.
pub type Result<T> = std::result::Result<T, Error>;

/// High-level error type surfaced by the DBC reader and its sinks.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O failure while reading from the underlying data source.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// The file appears to be corrupt or inconsistent while processing a stage.
    #[error("corrupted DBC file while processing {stage}: {details}")]
    Corrupted {
        stage: Stage,
        details: Cow<'static, str>,
    },

    /// Metadata or schema could not be interpreted according to expectations.
    #[error("invalid table metadata: {details}")]
    InvalidMetadata { details: Cow<'static, str> },

    /// Failure encountered while interacting with the Parquet writer.
    #[error("parquet error: {details}")]
    Parquet { details: Cow<'static, str> },
}

impl Error {
    pub(crate) fn corrupted(stage: Stage, details: impl Into<Cow<'static, str>>) -> Self {
        Self::Corrupted {
            stage,
            details: details.into(),
        }
    }
}

/// Logical stage of the conversion pipeline used for diagnostic reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Container,
    Decompression,
    Header,
    FieldCatalog,
    Records,
    Sink,
}

impl From<ParquetError> for Error {
    fn from(err: ParquetError) -> Self {
        Self::Parquet {
            details: Cow::Owned(err.to_string()),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Container => write!(f, "container layout"),
            Self::Decompression => write!(f, "record decompression"),
            Self::Header => write!(f, "table header"),
            Self::FieldCatalog => write!(f, "field catalog"),
            Self::Records => write!(f, "record region"),
            Self::Sink => write!(f, "output sink"),
        }
    }
}
