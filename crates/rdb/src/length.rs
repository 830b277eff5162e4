//! Variable-width length/integer codec.
//!
//! ```text
//! 00xxxxxx                  6-bit length
//! 01xxxxxx xxxxxxxx         14-bit length (big-endian)
//! 10000000 [4 bytes BE]     32-bit length
//! 10000001 [8 bytes BE]     64-bit length
//! 11xxxxxx                  special string encoding xxxxxx
//! ```

use std::io::Read;

use crate::cursor::Cursor;
use crate::error::{RdbError, Result};
use crate::format::{LEN_14BIT, LEN_32BIT, LEN_64BIT, LEN_6BIT, LEN_ENCVAL};

/// A decoded length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Length {
    /// An ordinary non-negative length or count.
    Plain(u64),
    /// A special string encoding selector (int8/16/32 or LZF).
    Special(u8),
}

/// Reads a length field that may carry a special encoding selector.
pub fn read_length_or_special<R: Read>(cursor: &mut Cursor<R>) -> Result<Length> {
    let offset = cursor.position();
    let first = cursor.read_u8()?;
    match first >> 6 {
        LEN_6BIT => Ok(Length::Plain(u64::from(first & 0x3F))),
        LEN_14BIT => {
            let low = cursor.read_u8()?;
            Ok(Length::Plain((u64::from(first & 0x3F) << 8) | u64::from(low)))
        }
        LEN_ENCVAL => Ok(Length::Special(first & 0x3F)),
        _ => match first {
            LEN_32BIT => Ok(Length::Plain(u64::from(cursor.read_u32_be()?))),
            LEN_64BIT => Ok(Length::Plain(cursor.read_u64_be()?)),
            other => Err(RdbError::corrupt(
                offset,
                format!("unknown length encoding {:#04x}", other),
            )),
        },
    }
}

/// Reads a length field where a special encoding is not allowed.
pub fn read_length<R: Read>(cursor: &mut Cursor<R>) -> Result<u64> {
    let offset = cursor.position();
    match read_length_or_special(cursor)? {
        Length::Plain(len) => Ok(len),
        Length::Special(enc) => Err(RdbError::corrupt(
            offset,
            format!("special encoding {} where a length was expected", enc),
        )),
    }
}

/// Reads an element count, rejecting values that do not fit `usize`.
pub fn read_count<R: Read>(cursor: &mut Cursor<R>) -> Result<usize> {
    let offset = cursor.position();
    let len = read_length(cursor)?;
    usize::try_from(len)
        .map_err(|_| RdbError::corrupt(offset, format!("count {} out of range", len)))
}
