//! Decoders for aggregate encodings.
//!
//! Blob formats (ziplist, listpack, intset, zipmap) are read as one string
//! through the string codec and then walked lazily in memory through
//! [`Blob`]. Multi-record formats (streams, module payloads) read straight
//! from the cursor.
//!
//! Errors raised while walking a blob carry the file offset at which the
//! blob started; the position inside the blob is part of the reason text.

pub mod intset;
pub mod listpack;
pub mod module;
pub mod stream;
pub mod ziplist;
pub mod zipmap;

use byteorder::{ByteOrder, LittleEndian};

use crate::error::RdbError;

pub use intset::Intset;
pub use listpack::Listpack;
pub use ziplist::Ziplist;
pub use zipmap::Zipmap;

/// One element of a compact container.
///
/// Integers stay integers until a consumer asks for bytes; strings borrow
/// from the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Element<'a> {
    Int(i64),
    Bytes(&'a [u8]),
}

impl Element<'_> {
    /// Canonical byte form: integers are rendered in base 10.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Element::Int(v) => v.to_string().into_bytes(),
            Element::Bytes(b) => b.to_vec(),
        }
    }

    /// Integer value, parsing string elements if they hold one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Element::Int(v) => Some(*v),
            Element::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
        }
    }

    /// Floating point value, for sorted-set scores.
    #[must_use]
    pub fn as_score(&self) -> Option<f64> {
        match self {
            Element::Int(v) => Some(*v as f64),
            Element::Bytes(b) => crate::string::parse_score(b),
        }
    }
}

/// Bounds-checked reader over an in-memory container blob.
#[derive(Debug, Clone)]
pub(crate) struct Blob<'a> {
    buf: &'a [u8],
    pos: usize,
    /// File offset of the string that held this blob.
    base: u64,
    what: &'static str,
}

impl<'a> Blob<'a> {
    pub(crate) fn new(buf: &'a [u8], base: u64, what: &'static str) -> Self {
        Self {
            buf,
            pos: 0,
            base,
            what,
        }
    }

    pub(crate) fn corrupt(&self, reason: impl std::fmt::Display) -> RdbError {
        RdbError::corrupt(
            self.base,
            format!("{} at byte {}: {}", self.what, self.pos, reason),
        )
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8], RdbError> {
        if n > self.remaining() {
            return Err(self.corrupt(format!(
                "needs {} bytes, {} left",
                n,
                self.remaining()
            )));
        }
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(out)
    }

    pub(crate) fn skip(&mut self, n: usize) -> Result<(), RdbError> {
        self.take(n).map(|_| ())
    }

    pub(crate) fn peek_u8(&self) -> Result<u8, RdbError> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.corrupt("missing terminator"))
    }

    pub(crate) fn u8(&mut self) -> Result<u8, RdbError> {
        Ok(self.take(1)?[0])
    }

    pub(crate) fn u16_le(&mut self) -> Result<u16, RdbError> {
        Ok(LittleEndian::read_u16(self.take(2)?))
    }

    pub(crate) fn u32_le(&mut self) -> Result<u32, RdbError> {
        Ok(LittleEndian::read_u32(self.take(4)?))
    }

    pub(crate) fn i16_le(&mut self) -> Result<i16, RdbError> {
        Ok(LittleEndian::read_i16(self.take(2)?))
    }

    pub(crate) fn i24_le(&mut self) -> Result<i32, RdbError> {
        Ok(LittleEndian::read_i24(self.take(3)?))
    }

    pub(crate) fn i32_le(&mut self) -> Result<i32, RdbError> {
        Ok(LittleEndian::read_i32(self.take(4)?))
    }

    pub(crate) fn i64_le(&mut self) -> Result<i64, RdbError> {
        Ok(LittleEndian::read_i64(self.take(8)?))
    }

    pub(crate) fn u32_be(&mut self) -> Result<u32, RdbError> {
        Ok(byteorder::BigEndian::read_u32(self.take(4)?))
    }
}

/// Pulls elements off `iter` two at a time.
///
/// Fails if the container holds an odd number of elements.
pub(crate) fn pairs<'a, I>(
    mut iter: I,
    mut on_pair: impl FnMut(Element<'a>, Element<'a>) -> Result<(), RdbError>,
    odd: impl FnOnce() -> RdbError,
) -> Result<(), RdbError>
where
    I: Iterator<Item = Result<Element<'a>, RdbError>>,
{
    while let Some(first) = iter.next() {
        let first = first?;
        let second = match iter.next() {
            Some(second) => second?,
            None => return Err(odd()),
        };
        on_pair(first, second)?;
    }
    Ok(())
}
