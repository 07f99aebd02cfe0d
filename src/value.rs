use std::borrow::Cow;
use std::fmt;

use time::Date;

/// Represents a single cell value produced by the DBC reader.
#[derive(Debug, Clone, PartialEq)]
pub enum Value<'a> {
    /// UTF-8 string converted from the source encoding.
    Str(Cow<'a, str>),
    /// 32-bit signed integer (Numeric field with no decimals, width <= 9).
    Int32(i32),
    /// 64-bit signed integer (Numeric field with no decimals, width > 9).
    Int64(i64),
    /// 64-bit floating point number (Numeric field with decimals).
    Float(f64),
    /// Logical field.
    Bool(bool),
    /// Day-granularity calendar value.
    Date(Date),
    /// Empty or unparseable cell.
    Null,
}

impl Value<'_> {
    #[must_use]
    pub fn into_owned(self) -> Value<'static> {
        match self {
            Value::Str(s) => Value::Str(Cow::Owned(s.into_owned())),
            Value::Int32(v) => Value::Int32(v),
            Value::Int64(v) => Value::Int64(v),
            Value::Float(v) => Value::Float(v),
            Value::Bool(v) => Value::Bool(v),
            Value::Date(d) => Value::Date(d),
            Value::Null => Value::Null,
        }
    }

    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int32(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Date(d) => write!(f, "{d}"),
            Self::Null => Ok(()),
        }
    }
}
