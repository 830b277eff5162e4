//! Forward-only byte reader with position tracking and checksum feed.

use std::io::{self, Read};

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::checksum::Checksum;
use crate::error::{RdbError, Result};

/// Declared lengths up to this size are allocated up front; larger ones grow
/// the buffer as bytes actually arrive so a hostile length cannot force a
/// huge allocation.
const EAGER_ALLOC_LIMIT: u64 = 64 * 1024;

/// Scratch size used when discarding bytes.
const SKIP_CHUNK: usize = 8 * 1024;

/// Reads the snapshot front to back.
///
/// Every byte handed out is also fed to the running [`Checksum`], except
/// bytes read through [`Cursor::read_unhashed`], which is reserved for the
/// trailing checksum field.
pub struct Cursor<R: Read> {
    inner: R,
    pos: u64,
    checksum: Checksum,
    /// Raw bytes recorded between `start_capture` and `finish_capture`.
    capture: Option<Vec<u8>>,
}

impl<R: Read> Cursor<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            checksum: Checksum::new(),
            capture: None,
        }
    }

    /// Number of bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.pos
    }

    #[must_use]
    pub fn checksum(&self) -> &Checksum {
        &self.checksum
    }

    /// Gives the underlying reader back.
    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Fills `buf` completely without feeding the checksum.
    ///
    /// Returns `Truncated` with the exact shortfall if the input ends first.
    fn fill(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut got = 0;
        while got < buf.len() {
            match self.inner.read(&mut buf[got..]) {
                Ok(0) => {
                    self.pos += got as u64;
                    return Err(RdbError::Truncated {
                        offset: self.pos,
                        needed: (buf.len() - got) as u64,
                    });
                }
                Ok(n) => got += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(RdbError::Io(e)),
            }
        }
        self.pos += got as u64;
        Ok(())
    }

    fn consumed(&mut self, bytes: &[u8]) {
        self.checksum.update(bytes);
        if let Some(capture) = self.capture.as_mut() {
            capture.extend_from_slice(bytes);
        }
    }

    /// Starts recording every hashed byte read from here on.
    pub fn start_capture(&mut self) {
        self.capture = Some(Vec::new());
    }

    /// Stops recording and returns the bytes read since `start_capture`.
    pub fn finish_capture(&mut self) -> Vec<u8> {
        self.capture.take().unwrap_or_default()
    }

    pub fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self.fill(buf)?;
        self.consumed(buf);
        Ok(())
    }

    /// Reads bytes that are excluded from the checksum (the trailing field).
    pub fn read_unhashed(&mut self, buf: &mut [u8]) -> Result<()> {
        self.fill(buf)
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_u64_le(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(&self.read_array::<8>()?))
    }

    pub fn read_i32_le(&mut self) -> Result<i32> {
        Ok(LittleEndian::read_i32(&self.read_array::<4>()?))
    }

    pub fn read_i64_le(&mut self) -> Result<i64> {
        Ok(LittleEndian::read_i64(&self.read_array::<8>()?))
    }

    pub fn read_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(&self.read_array::<4>()?))
    }

    pub fn read_u64_be(&mut self) -> Result<u64> {
        Ok(BigEndian::read_u64(&self.read_array::<8>()?))
    }

    /// Reads exactly `len` bytes into a fresh buffer.
    pub fn read_vec(&mut self, len: u64) -> Result<Vec<u8>> {
        if len <= EAGER_ALLOC_LIMIT {
            let mut buf = vec![0u8; len as usize];
            self.read_exact(&mut buf)?;
            return Ok(buf);
        }
        let mut buf = Vec::with_capacity(EAGER_ALLOC_LIMIT as usize);
        let read = (&mut self.inner).take(len).read_to_end(&mut buf)?;
        self.pos += read as u64;
        self.consumed(&buf);
        if (read as u64) < len {
            return Err(RdbError::Truncated {
                offset: self.pos,
                needed: len - read as u64,
            });
        }
        Ok(buf)
    }

    /// Consumes `len` bytes without keeping them.
    pub fn skip(&mut self, mut len: u64) -> Result<()> {
        let mut scratch = [0u8; SKIP_CHUNK];
        while len > 0 {
            let n = len.min(SKIP_CHUNK as u64) as usize;
            self.read_exact(&mut scratch[..n])?;
            len -= n as u64;
        }
        Ok(())
    }
}
