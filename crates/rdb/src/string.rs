//! String codec: raw, integer-literal and LZF-compressed payloads.

use std::io::Read;

use byteorder::{ByteOrder, LittleEndian};

use crate::cursor::Cursor;
use crate::error::{RdbError, Result};
use crate::format::{ENC_INT16, ENC_INT32, ENC_INT8, ENC_LZF};
use crate::length::{read_length, read_length_or_special, Length};
use crate::lzf;
use crate::model::Encoding;

/// Reads one string and reports which encoding it was stored with.
pub fn read_string_encoded<R: Read>(cursor: &mut Cursor<R>) -> Result<(Vec<u8>, Encoding)> {
    let offset = cursor.position();
    match read_length_or_special(cursor)? {
        Length::Plain(len) => Ok((cursor.read_vec(len)?, Encoding::Raw)),
        Length::Special(ENC_INT8) => {
            let v = cursor.read_u8()? as i8;
            Ok((v.to_string().into_bytes(), Encoding::Int))
        }
        Length::Special(ENC_INT16) => {
            let v = LittleEndian::read_i16(&cursor.read_array::<2>()?);
            Ok((v.to_string().into_bytes(), Encoding::Int))
        }
        Length::Special(ENC_INT32) => {
            let v = LittleEndian::read_i32(&cursor.read_array::<4>()?);
            Ok((v.to_string().into_bytes(), Encoding::Int))
        }
        Length::Special(ENC_LZF) => Ok((read_lzf(cursor, offset)?, Encoding::Lzf)),
        Length::Special(other) => Err(RdbError::corrupt(
            offset,
            format!("unknown string encoding {}", other),
        )),
    }
}

/// Reads one string payload.
pub fn read_string<R: Read>(cursor: &mut Cursor<R>) -> Result<Vec<u8>> {
    read_string_encoded(cursor).map(|(bytes, _)| bytes)
}

/// Consumes one string without materializing or decompressing it.
pub fn skip_string<R: Read>(cursor: &mut Cursor<R>) -> Result<Encoding> {
    let offset = cursor.position();
    match read_length_or_special(cursor)? {
        Length::Plain(len) => {
            cursor.skip(len)?;
            Ok(Encoding::Raw)
        }
        Length::Special(ENC_INT8) => cursor.skip(1).map(|_| Encoding::Int),
        Length::Special(ENC_INT16) => cursor.skip(2).map(|_| Encoding::Int),
        Length::Special(ENC_INT32) => cursor.skip(4).map(|_| Encoding::Int),
        Length::Special(ENC_LZF) => {
            let compressed_len = read_length(cursor)?;
            let _original_len = read_length(cursor)?;
            cursor.skip(compressed_len)?;
            Ok(Encoding::Lzf)
        }
        Length::Special(other) => Err(RdbError::corrupt(
            offset,
            format!("unknown string encoding {}", other),
        )),
    }
}

fn read_lzf<R: Read>(cursor: &mut Cursor<R>, offset: u64) -> Result<Vec<u8>> {
    let compressed_len = read_length(cursor)?;
    let original_len = read_length(cursor)?;
    let original_len = usize::try_from(original_len).map_err(|_| RdbError::Decompression {
        offset,
        reason: format!("declared length {} out of range", original_len),
    })?;
    let compressed = cursor.read_vec(compressed_len)?;
    lzf::decompress(&compressed, original_len)
        .map_err(|reason| RdbError::Decompression { offset, reason })
}

/// Parses a decimal score the way sorted-set encodings store it.
pub(crate) fn parse_score(raw: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(raw).ok()?;
    match text {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        "nan" => Some(f64::NAN),
        _ => text.parse().ok(),
    }
}

/// Reads a legacy sorted-set score: a one-byte length followed by ASCII.
///
/// Length bytes 253, 254 and 255 stand for NaN, +inf and -inf.
pub fn read_double_string<R: Read>(cursor: &mut Cursor<R>) -> Result<f64> {
    let offset = cursor.position();
    let len = cursor.read_u8()?;
    match len {
        253 => Ok(f64::NAN),
        254 => Ok(f64::INFINITY),
        255 => Ok(f64::NEG_INFINITY),
        n => {
            let raw = cursor.read_vec(u64::from(n))?;
            parse_score(&raw).ok_or_else(|| {
                RdbError::corrupt(
                    offset,
                    format!("invalid score {:?}", String::from_utf8_lossy(&raw)),
                )
            })
        }
    }
}

pub fn skip_double_string<R: Read>(cursor: &mut Cursor<R>) -> Result<()> {
    let len = cursor.read_u8()?;
    if len < 253 {
        cursor.skip(u64::from(len))?;
    }
    Ok(())
}

/// Reads an 8-byte little-endian IEEE-754 score.
pub fn read_binary_double<R: Read>(cursor: &mut Cursor<R>) -> Result<f64> {
    Ok(LittleEndian::read_f64(&cursor.read_array::<8>()?))
}
