//! Test-only encoders for building snapshot fixtures byte by byte.

use crate::checksum::CRC64;
use crate::format::*;

pub fn encode_length(n: u64) -> Vec<u8> {
    if n < 1 << 6 {
        vec![n as u8]
    } else if n < 1 << 14 {
        vec![0x40 | (n >> 8) as u8, n as u8]
    } else if n <= u64::from(u32::MAX) {
        let mut out = vec![LEN_32BIT];
        out.extend_from_slice(&(n as u32).to_be_bytes());
        out
    } else {
        let mut out = vec![LEN_64BIT];
        out.extend_from_slice(&n.to_be_bytes());
        out
    }
}

pub fn encode_string(bytes: &[u8]) -> Vec<u8> {
    let mut out = encode_length(bytes.len() as u64);
    out.extend_from_slice(bytes);
    out
}

/// Integer-literal string encoding, narrowest width that fits.
pub fn encode_int_string(v: i32) -> Vec<u8> {
    if let Ok(v) = i8::try_from(v) {
        vec![0xC0 | ENC_INT8, v as u8]
    } else if let Ok(v) = i16::try_from(v) {
        let mut out = vec![0xC0 | ENC_INT16];
        out.extend_from_slice(&v.to_le_bytes());
        out
    } else {
        let mut out = vec![0xC0 | ENC_INT32];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }
}

pub fn encode_lzf_string(compressed: &[u8], original_len: usize) -> Vec<u8> {
    let mut out = vec![0xC0 | ENC_LZF];
    out.extend(encode_length(compressed.len() as u64));
    out.extend(encode_length(original_len as u64));
    out.extend_from_slice(compressed);
    out
}

/// LZF block made only of literal runs.
pub fn lzf_literals(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for chunk in data.chunks(32) {
        out.push((chunk.len() - 1) as u8);
        out.extend_from_slice(chunk);
    }
    out
}

// -------------------- Ziplist --------------------

/// Ziplist entry body (encoding + data) for a string.
pub fn zl_str(bytes: &[u8]) -> Vec<u8> {
    let len = bytes.len();
    let mut out = if len < 1 << 6 {
        vec![len as u8]
    } else if len < 1 << 14 {
        vec![0x40 | (len >> 8) as u8, len as u8]
    } else {
        let mut h = vec![0x80];
        h.extend_from_slice(&(len as u32).to_be_bytes());
        h
    };
    out.extend_from_slice(bytes);
    out
}

/// Ziplist entry body for an integer, using the narrowest encoding.
pub fn zl_int(v: i64) -> Vec<u8> {
    if (0..=12).contains(&v) {
        vec![0xF1 + v as u8]
    } else if let Ok(v) = i8::try_from(v) {
        vec![0xFE, v as u8]
    } else if let Ok(v) = i16::try_from(v) {
        let mut out = vec![0xC0];
        out.extend_from_slice(&v.to_le_bytes());
        out
    } else if (-(1 << 23)..(1 << 23)).contains(&v) {
        let mut out = vec![0xF0];
        out.extend_from_slice(&(v as i32).to_le_bytes()[..3]);
        out
    } else if let Ok(v) = i32::try_from(v) {
        let mut out = vec![0xD0];
        out.extend_from_slice(&v.to_le_bytes());
        out
    } else {
        let mut out = vec![0xE0];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }
}

pub fn ziplist(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    let mut prev_len = 0usize;
    let mut tail = 10usize;
    for entry in entries {
        tail = 10 + body.len();
        let start = body.len();
        if prev_len < 254 {
            body.push(prev_len as u8);
        } else {
            body.push(0xFE);
            body.extend_from_slice(&(prev_len as u32).to_le_bytes());
        }
        body.extend_from_slice(entry);
        prev_len = body.len() - start;
    }
    let total = 10 + body.len() + 1;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(tail as u32).to_le_bytes());
    out.extend_from_slice(&(entries.len().min(u16::MAX as usize) as u16).to_le_bytes());
    out.extend(body);
    out.push(0xFF);
    out
}

pub fn ziplist_of_strs(items: &[&[u8]]) -> Vec<u8> {
    ziplist(&items.iter().map(|s| zl_str(s)).collect::<Vec<_>>())
}

// -------------------- Listpack --------------------

pub fn lp_str(bytes: &[u8]) -> Vec<u8> {
    let len = bytes.len();
    let mut out = if len < 1 << 6 {
        vec![0x80 | len as u8]
    } else if len < 1 << 12 {
        vec![0xE0 | (len >> 8) as u8, len as u8]
    } else {
        let mut h = vec![0xF0];
        h.extend_from_slice(&(len as u32).to_le_bytes());
        h
    };
    out.extend_from_slice(bytes);
    out
}

pub fn lp_int(v: i64) -> Vec<u8> {
    if (0..=127).contains(&v) {
        vec![v as u8]
    } else if (-4096..4096).contains(&v) {
        let u = (v as u16) & 0x1FFF;
        vec![0xC0 | (u >> 8) as u8, u as u8]
    } else if let Ok(v) = i16::try_from(v) {
        let mut out = vec![0xF1];
        out.extend_from_slice(&v.to_le_bytes());
        out
    } else if (-(1 << 23)..(1 << 23)).contains(&v) {
        let mut out = vec![0xF2];
        out.extend_from_slice(&(v as i32).to_le_bytes()[..3]);
        out
    } else if let Ok(v) = i32::try_from(v) {
        let mut out = vec![0xF3];
        out.extend_from_slice(&v.to_le_bytes());
        out
    } else {
        let mut out = vec![0xF4];
        out.extend_from_slice(&v.to_le_bytes());
        out
    }
}

fn lp_backlen(entry_len: usize) -> Vec<u8> {
    let width = match entry_len {
        0..=127 => 1,
        128..=16382 => 2,
        16383..=2_097_150 => 3,
        2_097_151..=268_435_454 => 4,
        _ => 5,
    };
    if width == 1 {
        vec![entry_len as u8]
    } else {
        vec![0; width]
    }
}

pub fn listpack(entries: &[Vec<u8>]) -> Vec<u8> {
    let mut body = Vec::new();
    for entry in entries {
        body.extend_from_slice(entry);
        body.extend(lp_backlen(entry.len()));
    }
    let total = 6 + body.len() + 1;
    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(entries.len().min(u16::MAX as usize) as u16).to_le_bytes());
    out.extend(body);
    out.push(0xFF);
    out
}

pub fn listpack_of_strs(items: &[&[u8]]) -> Vec<u8> {
    listpack(&items.iter().map(|s| lp_str(s)).collect::<Vec<_>>())
}

// -------------------- Intset / zipmap --------------------

pub fn intset(width: u32, values: &[i64]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&width.to_le_bytes());
    out.extend_from_slice(&(values.len() as u32).to_le_bytes());
    for v in values {
        match width {
            2 => out.extend_from_slice(&(*v as i16).to_le_bytes()),
            4 => out.extend_from_slice(&(*v as i32).to_le_bytes()),
            _ => out.extend_from_slice(&v.to_le_bytes()),
        }
    }
    out
}

pub fn zipmap(pairs: &[(&[u8], &[u8])]) -> Vec<u8> {
    let mut out = vec![pairs.len().min(254) as u8];
    for (k, v) in pairs {
        out.push(k.len() as u8);
        out.extend_from_slice(k);
        out.push(v.len() as u8);
        out.push(1); // one free byte
        out.extend_from_slice(v);
        out.push(0);
    }
    out.push(0xFF);
    out
}

// -------------------- Whole files --------------------

/// How the trailing checksum field should be written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trailer {
    Valid,
    Zero,
    Flipped,
}

/// Builds a snapshot record by record.
pub struct RdbBuilder {
    buf: Vec<u8>,
    version: u32,
}

impl RdbBuilder {
    pub fn new() -> Self {
        Self::with_version(11)
    }

    pub fn with_version(version: u32) -> Self {
        let mut buf = RDB_MAGIC.to_vec();
        buf.extend_from_slice(format!("{:04}", version).as_bytes());
        Self { buf, version }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    pub fn select_db(mut self, db: u64) -> Self {
        self.buf.push(OPCODE_SELECTDB);
        self.buf.extend(encode_length(db));
        self
    }

    pub fn resize_db(mut self, db_size: u64, expires: u64) -> Self {
        self.buf.push(OPCODE_RESIZEDB);
        self.buf.extend(encode_length(db_size));
        self.buf.extend(encode_length(expires));
        self
    }

    pub fn aux(mut self, key: &str, value: &str) -> Self {
        self.buf.push(OPCODE_AUX);
        self.buf.extend(encode_string(key.as_bytes()));
        self.buf.extend(encode_string(value.as_bytes()));
        self
    }

    pub fn expire_ms(mut self, at: i64) -> Self {
        self.buf.push(OPCODE_EXPIRETIME_MS);
        self.buf.extend_from_slice(&at.to_le_bytes());
        self
    }

    pub fn expire_secs(mut self, at: i32) -> Self {
        self.buf.push(OPCODE_EXPIRETIME);
        self.buf.extend_from_slice(&at.to_le_bytes());
        self
    }

    pub fn freq(mut self, freq: u8) -> Self {
        self.buf.push(OPCODE_FREQ);
        self.buf.push(freq);
        self
    }

    pub fn idle(mut self, idle: u64) -> Self {
        self.buf.push(OPCODE_IDLE);
        self.buf.extend(encode_length(idle));
        self
    }

    /// Object record with an already-encoded value payload.
    pub fn object(mut self, tag: u8, key: &[u8], payload: &[u8]) -> Self {
        self.buf.push(tag);
        self.buf.extend(encode_string(key));
        self.buf.extend_from_slice(payload);
        self
    }

    pub fn string(self, key: &[u8], value: &[u8]) -> Self {
        self.object(TYPE_STRING, key, &encode_string(value))
    }

    /// Object whose value is a single blob string (ziplist, listpack, ...).
    pub fn blob(self, tag: u8, key: &[u8], blob: &[u8]) -> Self {
        self.object(tag, key, &encode_string(blob))
    }

    /// Appends the EOF opcode and, for version >= 5, the checksum field.
    pub fn finish(mut self, trailer: Trailer) -> Vec<u8> {
        self.buf.push(OPCODE_EOF);
        if self.version >= CHECKSUM_MIN_VERSION {
            let crc = CRC64.checksum(&self.buf);
            let field = match trailer {
                Trailer::Valid => crc,
                Trailer::Zero => 0,
                Trailer::Flipped => crc ^ 0x0100,
            };
            self.buf.extend_from_slice(&field.to_le_bytes());
        }
        self.buf
    }
}
