//! Legacy code page resolution and text conversion to UTF-8.
//!
//! The language driver byte in the table header selects one of four legacy
//! code pages. The OEM pages (437, 850, 852) are decoded through `oem_cp`'s
//! tables; the ANSI page 1252 goes through `encoding_rs`. Conversion is lossy
//! by design: a malformed byte never fails the run.

use std::borrow::Cow;

use encoding_rs::WINDOWS_1252;
use oem_cp::code_table::{DECODING_TABLE_CP437, DECODING_TABLE_CP850, DECODING_TABLE_CP852};
use oem_cp::decode_string_complete_table;

/// One of the legacy code pages recognized by the format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyEncoding {
    Cp437,
    Cp850,
    Cp852,
    Cp1252,
}

impl LegacyEncoding {
    /// Maps the header's language driver byte to a code page. Unlisted values
    /// fall back to code page 850.
    #[must_use]
    pub const fn from_language_byte(language: u8) -> Self {
        match language {
            0x01 => Self::Cp437,
            0x03 => Self::Cp852,
            0x65 => Self::Cp1252,
            _ => Self::Cp850,
        }
    }

    /// Numeric code page identifier, as reported in metadata summaries.
    #[must_use]
    pub const fn code_page(self) -> &'static str {
        match self {
            Self::Cp437 => "437",
            Self::Cp850 => "850",
            Self::Cp852 => "852",
            Self::Cp1252 => "1252",
        }
    }

    /// Converts legacy-encoded bytes to UTF-8. Pure-ASCII input is borrowed
    /// verbatim; everything else is decoded through the code page tables.
    #[must_use]
    pub fn decode<'a>(self, bytes: &'a [u8]) -> Cow<'a, str> {
        if let Ok(text) = simdutf8::basic::from_utf8(bytes)
            && text.is_ascii()
        {
            return Cow::Borrowed(text);
        }
        match self {
            Self::Cp437 => Cow::Owned(decode_string_complete_table(bytes, &DECODING_TABLE_CP437)),
            Self::Cp850 => Cow::Owned(decode_string_complete_table(bytes, &DECODING_TABLE_CP850)),
            Self::Cp852 => Cow::Owned(decode_string_complete_table(bytes, &DECODING_TABLE_CP852)),
            Self::Cp1252 => {
                let (text, _, _) = WINDOWS_1252.decode(bytes);
                match text {
                    Cow::Borrowed(s) => Cow::Borrowed(s),
                    Cow::Owned(s) => Cow::Owned(s),
                }
            }
        }
    }
}
