//! Ziplist: the legacy compact sequential encoding.
//!
//! ```text
//! zlbytes (u32 LE) | zltail (u32 LE) | zllen (u16 LE) | entries | 0xFF
//! entry: prevlen (1 byte, or 0xFE + u32 LE) | encoding | data
//! ```

use crate::containers::{Blob, Element};
use crate::error::RdbError;

const ZIP_END: u8 = 0xFF;
const ZIP_BIG_PREVLEN: u8 = 0xFE;
const ZIP_INT_16B: u8 = 0xC0;
const ZIP_INT_32B: u8 = 0xD0;
const ZIP_INT_64B: u8 = 0xE0;
const ZIP_INT_24B: u8 = 0xF0;
const ZIP_INT_8B: u8 = 0xFE;
const ZIP_STR_32B: u8 = 0x80;
/// `zllen` saturates at this value; the real count is then unknown.
const ZIP_UNKNOWN_LEN: u16 = u16::MAX;
const HEADER_BYTES: usize = 10;

/// Lazy iterator over the elements of a ziplist blob.
#[derive(Debug, Clone)]
pub struct Ziplist<'a> {
    blob: Blob<'a>,
    remaining: Option<usize>,
    done: bool,
}

impl<'a> Ziplist<'a> {
    /// Validates the header of `buf`. `base` is the file offset of the blob.
    pub fn parse(buf: &'a [u8], base: u64) -> Result<Self, RdbError> {
        let mut blob = Blob::new(buf, base, "ziplist");
        if blob.len() < HEADER_BYTES + 1 {
            return Err(blob.corrupt("blob shorter than header"));
        }
        let zlbytes = blob.u32_le()? as usize;
        if zlbytes != blob.len() {
            return Err(blob.corrupt(format!(
                "zlbytes {} does not match blob length {}",
                zlbytes,
                blob.len()
            )));
        }
        let _zltail = blob.u32_le()?;
        let zllen = blob.u16_le()?;
        Ok(Self {
            blob,
            remaining: (zllen != ZIP_UNKNOWN_LEN).then_some(zllen as usize),
            done: false,
        })
    }

    /// Declared element count, if the header did not saturate.
    #[must_use]
    pub fn declared_len(&self) -> Option<usize> {
        self.remaining
    }

    fn next_element(&mut self) -> Result<Option<Element<'a>>, RdbError> {
        if self.remaining == Some(0) || self.blob.peek_u8()? == ZIP_END {
            return Ok(None);
        }

        if self.blob.u8()? == ZIP_BIG_PREVLEN {
            self.blob.skip(4)?;
        }

        let enc = self.blob.u8()?;
        let element = match enc >> 6 {
            0 => Element::Bytes(self.blob.take((enc & 0x3F) as usize)?),
            1 => {
                let low = self.blob.u8()?;
                let len = (((enc & 0x3F) as usize) << 8) | low as usize;
                Element::Bytes(self.blob.take(len)?)
            }
            2 => {
                if enc != ZIP_STR_32B {
                    return Err(self.blob.corrupt(format!("bad string encoding {:#04x}", enc)));
                }
                let len = self.blob.u32_be()? as usize;
                Element::Bytes(self.blob.take(len)?)
            }
            _ => match enc {
                ZIP_INT_8B => Element::Int(i64::from(self.blob.u8()? as i8)),
                ZIP_INT_16B => Element::Int(i64::from(self.blob.i16_le()?)),
                ZIP_INT_24B => Element::Int(i64::from(self.blob.i24_le()?)),
                ZIP_INT_32B => Element::Int(i64::from(self.blob.i32_le()?)),
                ZIP_INT_64B => Element::Int(self.blob.i64_le()?),
                0xF1..=0xFD => Element::Int(i64::from(enc & 0x0F) - 1),
                _ => return Err(self.blob.corrupt(format!("bad int encoding {:#04x}", enc))),
            },
        };

        if let Some(n) = self.remaining.as_mut() {
            *n -= 1;
        }
        Ok(Some(element))
    }
}

impl<'a> Iterator for Ziplist<'a> {
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
