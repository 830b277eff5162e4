//! Intset: a sorted array of fixed-width little-endian integers.
//!
//! ```text
//! width (u32 LE: 2, 4 or 8) | count (u32 LE) | count * width bytes
//! ```

use crate::containers::Blob;
use crate::error::RdbError;

/// Lazy iterator over intset members in stored (ascending) order.
#[derive(Debug, Clone)]
pub struct Intset<'a> {
    blob: Blob<'a>,
    width: u32,
    remaining: usize,
}

impl<'a> Intset<'a> {
    pub fn parse(buf: &'a [u8], base: u64) -> Result<Self, RdbError> {
        let mut blob = Blob::new(buf, base, "intset");
        let width = blob.u32_le()?;
        if !matches!(width, 2 | 4 | 8) {
            return Err(blob.corrupt(format!("invalid element width {}", width)));
        }
        let count = blob.u32_le()? as usize;
        let body = count
            .checked_mul(width as usize)
            .ok_or_else(|| blob.corrupt("element count overflows"))?;
        if body != blob.remaining() {
            return Err(blob.corrupt(format!(
                "{} elements of {} bytes do not fit {} remaining bytes",
                count,
                width,
                blob.remaining()
            )));
        }
        Ok(Self {
            blob,
            width,
            remaining: count,
        })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }
}

impl Iterator for Intset<'_> {
    type Item = Result<i64, RdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let v = match self.width {
            2 => self.blob.i16_le().map(i64::from),
            4 => self.blob.i32_le().map(i64::from),
            _ => self.blob.i64_le(),
        };
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
