//! Zipmap: the oldest compact hash encoding.
//!
//! ```text
//! zmlen (u8) | (len key len free value [free bytes])* | 0xFF
//! len: < 254 inline, 254 followed by u32 LE
//! ```

use crate::containers::Blob;
use crate::error::RdbError;

const ZIPMAP_BIGLEN: u8 = 254;
const ZIPMAP_END: u8 = 255;

/// Lazy iterator over `(field, value)` pairs of a zipmap blob.
#[derive(Debug, Clone)]
pub struct Zipmap<'a> {
    blob: Blob<'a>,
    done: bool,
}

impl<'a> Zipmap<'a> {
    pub fn parse(buf: &'a [u8], base: u64) -> Result<Self, RdbError> {
        let mut blob = Blob::new(buf, base, "zipmap");
        // The count byte saturates at 254, so the terminator is authoritative.
        let _zmlen = blob.u8()?;
        Ok(Self { blob, done: false })
    }

    fn read_len(&mut self) -> Result<Option<usize>, RdbError> {
        match self.blob.u8()? {
            ZIPMAP_END => Ok(None),
            ZIPMAP_BIGLEN => Ok(Some(self.blob.u32_le()? as usize)),
            n => Ok(Some(n as usize)),
        }
    }

    fn next_pair(&mut self) -> Result<Option<(&'a [u8], &'a [u8])>, RdbError> {
        let key_len = match self.read_len()? {
            Some(n) => n,
            None => return Ok(None),
        };
        let key = self.blob.take(key_len)?;
        let value_len = self
            .read_len()?
            .ok_or_else(|| self.blob.corrupt("field without value"))?;
        let free = self.blob.u8()? as usize;
        let value = self.blob.take(value_len)?;
        self.blob.skip(free)?;
        Ok(Some((key, value)))
    }
}

impl<'a> Iterator for Zipmap<'a> {
    type Item = Result<(&'a [u8], &'a [u8]), RdbError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_pair() {
            Ok(Some(pair)) => Some(Ok(pair)),
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
