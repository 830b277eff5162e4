//! Listpack: the modern compact sequential encoding.
//!
//! ```text
//! total bytes (u32 LE) | count (u16 LE) | entries | 0xFF
//! entry: encoding+data | backlen (1-5 bytes, width derived from entry size)
//! ```

use crate::containers::{Blob, Element};
use crate::error::RdbError;

const LP_EOF: u8 = 0xFF;
const LP_ENCODING_32BIT_STR: u8 = 0xF0;
const LP_ENCODING_16BIT_INT: u8 = 0xF1;
const LP_ENCODING_24BIT_INT: u8 = 0xF2;
const LP_ENCODING_32BIT_INT: u8 = 0xF3;
const LP_ENCODING_64BIT_INT: u8 = 0xF4;
const LP_UNKNOWN_COUNT: u16 = u16::MAX;
const HEADER_BYTES: usize = 6;

/// Width of the backlen field trailing an entry of `entry_len` bytes.
fn backlen_width(entry_len: usize) -> usize {
    match entry_len {
        0..=127 => 1,
        128..=16382 => 2,
        16383..=2_097_150 => 3,
        2_097_151..=268_435_454 => 4,
        _ => 5,
    }
}

/// Lazy iterator over the elements of a listpack blob.
#[derive(Debug, Clone)]
pub struct Listpack<'a> {
    blob: Blob<'a>,
    remaining: Option<usize>,
    done: bool,
}

impl<'a> Listpack<'a> {
    /// Validates the header of `buf`. `base` is the file offset of the blob.
    pub fn parse(buf: &'a [u8], base: u64) -> Result<Self, RdbError> {
        let mut blob = Blob::new(buf, base, "listpack");
        if blob.len() < HEADER_BYTES + 1 {
            return Err(blob.corrupt("blob shorter than header"));
        }
        let total = blob.u32_le()? as usize;
        if total != blob.len() {
            return Err(blob.corrupt(format!(
                "total bytes {} does not match blob length {}",
                total,
                blob.len()
            )));
        }
        let count = blob.u16_le()?;
        Ok(Self {
            blob,
            remaining: (count != LP_UNKNOWN_COUNT).then_some(count as usize),
            done: false,
        })
    }

    #[must_use]
    pub fn declared_len(&self) -> Option<usize> {
        self.remaining
    }

    pub(crate) fn corrupt(&self, reason: impl std::fmt::Display) -> RdbError {
        self.blob.corrupt(reason)
    }

    fn next_element(&mut self) -> Result<Option<Element<'a>>, RdbError> {
        if self.remaining == Some(0) || self.blob.peek_u8()? == LP_EOF {
            return Ok(None);
        }

        let enc = self.blob.u8()?;
        let (element, entry_len) = if enc & 0x80 == 0 {
            (Element::Int(i64::from(enc & 0x7F)), 1)
        } else if enc & 0xC0 == 0x80 {
            let len = (enc & 0x3F) as usize;
            (Element::Bytes(self.blob.take(len)?), 1 + len)
        } else if enc & 0xE0 == 0xC0 {
            let raw = (i64::from(enc & 0x1F) << 8) | i64::from(self.blob.u8()?);
            let v = if raw >= 1 << 12 { raw - (1 << 13) } else { raw };
            (Element::Int(v), 2)
        } else if enc & 0xF0 == 0xE0 {
            let len = (((enc & 0x0F) as usize) << 8) | self.blob.u8()? as usize;
            (Element::Bytes(self.blob.take(len)?), 2 + len)
        } else {
            match enc {
                LP_ENCODING_32BIT_STR => {
                    let len = self.blob.u32_le()? as usize;
                    (Element::Bytes(self.blob.take(len)?), 5 + len)
                }
                LP_ENCODING_16BIT_INT => (Element::Int(i64::from(self.blob.i16_le()?)), 3),
                LP_ENCODING_24BIT_INT => (Element::Int(i64::from(self.blob.i24_le()?)), 4),
                LP_ENCODING_32BIT_INT => (Element::Int(i64::from(self.blob.i32_le()?)), 5),
                LP_ENCODING_64BIT_INT => (Element::Int(self.blob.i64_le()?), 9),
                _ => return Err(self.blob.corrupt(format!("bad encoding {:#04x}", enc))),
            }
        };
        self.blob.skip(backlen_width(entry_len))?;

        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        Ok(Some(element))
    }

    /// Next element, failing if the listpack is exhausted.
    pub(crate) fn expect_next(&mut self, what: &str) -> Result<Element<'a>, RdbError> {
        match self.next() {
            Some(item) => item,
            None => Err(self.blob.corrupt(format!("missing {}", what))),
        }
    }

    /// Next element as an integer, failing if absent or non-numeric.
    pub(crate) fn expect_int(&mut self, what: &str) -> Result<i64, RdbError> {
        let element = self.expect_next(what)?;
        element
            .as_int()
            .ok_or_else(|| self.blob.corrupt(format!("{} is not an integer", what)))
    }
}

impl<'a> Iterator for Listpack<'a> {
    type Item = Result<Element<'a>, RdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_element() {
            Ok(Some(e)) => Some(Ok(e)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
