//! Top-level record dispatcher: walks opcodes and assembles entries.

use std::collections::BTreeMap;
use std::io::Read;

use tracing::{debug, info, warn};

use crate::containers::module::{read_module_aux, ModuleAux};
use crate::cursor::Cursor;
use crate::error::{RdbError, Result};
use crate::format::*;
use crate::length::read_length;
use crate::model::{ChecksumStatus, Entry};
use crate::string::read_string;
use crate::value::read_value;

/// One record of the top-level stream, as seen by a consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Subsequent entries belong to this database.
    SelectDb(u64),
    /// Sizing hint for the current database.
    ResizeDb { db_size: u64, expires_size: u64 },
    /// Cluster slot sizing hint.
    SlotInfo {
        slot_id: u64,
        slot_size: u64,
        expires_slot_size: u64,
    },
    /// Producer metadata such as `redis-ver` or `ctime`.
    Aux { key: Vec<u8>, value: Vec<u8> },
    /// Source code of a function library.
    Function(Vec<u8>),
    ModuleAux(ModuleAux),
    Entry(Entry),
    /// End of stream with the result of checksum verification.
    End(ChecksumStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Header,
    Body,
    Done,
}

/// Dispatcher state that persists between records.
///
/// The pending slots are filled by expiry/freq/idle records and consumed by
/// exactly the next entry.
#[derive(Debug, Default)]
struct DecodeContext {
    db: u64,
    metadata: BTreeMap<Vec<u8>, Vec<u8>>,
    pending_expire_ms: Option<i64>,
    pending_freq: Option<u8>,
    pending_idle: Option<u64>,
    /// Offset of the first pending record, which starts the next entry's span.
    pending_start: Option<u64>,
}

impl DecodeContext {
    fn mark_pending(&mut self, offset: u64) {
        self.pending_start.get_or_insert(offset);
    }
}

/// Streaming snapshot decoder.
///
/// Reads one record per call to [`next_event`](RdbReader::next_event) and
/// never looks back, so at most one entry's value is held in memory at a
/// time. After an error or the end-of-stream event the reader yields
/// nothing further.
///
/// The reader is generic over any `Read` implementor, so it works with files
/// (see [`crate::open`]) and in-memory buffers alike. Wrap unbuffered
/// sources in a `BufReader`.
pub struct RdbReader<R: Read> {
    cursor: Cursor<R>,
    state: State,
    version: u32,
    ctx: DecodeContext,
    skip_values: bool,
    entries: u64,
}

impl<R: Read> RdbReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            cursor: Cursor::new(inner),
            state: State::Header,
            version: 0,
            ctx: DecodeContext::default(),
            skip_values: false,
            entries: 0,
        }
    }

    /// Key-only mode: values are stepped over using their declared lengths
    /// and entries carry `value: None`. Spans and metadata are unaffected.
    #[must_use]
    pub fn skip_values(mut self, skip: bool) -> Self {
        self.skip_values = skip;
        self
    }

    /// Snapshot version, known once the header has been read.
    #[must_use]
    pub fn version(&self) -> Option<u32> {
        (self.state != State::Header).then_some(self.version)
    }

    /// Aux metadata collected so far.
    #[must_use]
    pub fn metadata(&self) -> &BTreeMap<Vec<u8>, Vec<u8>> {
        &self.ctx.metadata
    }

    /// Bytes consumed so far.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.cursor.position()
    }

    /// Number of entries yielded so far.
    #[must_use]
    pub fn entries_read(&self) -> u64 {
        self.entries
    }

    pub fn into_inner(self) -> R {
        self.cursor.into_inner()
    }

    /// Decodes the next record.
    ///
    /// Returns `Ok(None)` once the end-of-stream event has been returned.
    pub fn next_event(&mut self) -> Result<Option<Event>> {
        if self.state == State::Done {
            return Ok(None);
        }
        match self.step() {
            Ok(event) => Ok(Some(event)),
            Err(e) => {
                self.state = State::Done;
                Err(e)
            }
        }
    }

    fn read_header(&mut self) -> Result<()> {
        let header = self.cursor.read_array::<9>()?;
        self.version = parse_header(&header).map_err(|reason| RdbError::corrupt(0, reason))?;
        debug!(version = self.version, "rdb header");
        self.state = State::Body;
        Ok(())
    }

    fn step(&mut self) -> Result<Event> {
        if self.state == State::Header {
            self.read_header()?;
        }

        loop {
            let offset = self.cursor.position();
            let tag = self.cursor.read_u8()?;
            match tag {
                OPCODE_EOF => {
                    self.reject_pending()?;
                    let status = self.finish()?;
                    return Ok(Event::End(status));
                }
                OPCODE_SELECTDB => {
                    self.reject_pending()?;
                    let db = read_length(&mut self.cursor)?;
                    debug!(db, "select db");
                    self.ctx.db = db;
                    return Ok(Event::SelectDb(db));
                }
                OPCODE_RESIZEDB => {
                    self.reject_pending()?;
                    let db_size = read_length(&mut self.cursor)?;
                    let expires_size = read_length(&mut self.cursor)?;
                    debug!(db_size, expires_size, "resize db");
                    return Ok(Event::ResizeDb {
                        db_size,
                        expires_size,
                    });
                }
                OPCODE_SLOT_INFO => {
                    self.reject_pending()?;
                    let slot_id = read_length(&mut self.cursor)?;
                    let slot_size = read_length(&mut self.cursor)?;
                    let expires_slot_size = read_length(&mut self.cursor)?;
                    return Ok(Event::SlotInfo {
                        slot_id,
                        slot_size,
                        expires_slot_size,
                    });
                }
                OPCODE_EXPIRETIME => {
                    self.ctx.mark_pending(offset);
                    let secs = self.cursor.read_i32_le()?;
                    self.ctx.pending_expire_ms = Some(i64::from(secs) * 1000);
                }
                OPCODE_EXPIRETIME_MS => {
                    self.ctx.mark_pending(offset);
                    self.ctx.pending_expire_ms = Some(self.cursor.read_i64_le()?);
                }
                OPCODE_FREQ => {
                    self.ctx.mark_pending(offset);
                    self.ctx.pending_freq = Some(self.cursor.read_u8()?);
                }
                OPCODE_IDLE => {
                    self.ctx.mark_pending(offset);
                    self.ctx.pending_idle = Some(read_length(&mut self.cursor)?);
                }
                OPCODE_AUX => {
                    self.reject_pending()?;
                    let key = read_string(&mut self.cursor)?;
                    let value = read_string(&mut self.cursor)?;
                    debug!(
                        key = %String::from_utf8_lossy(&key),
                        value = %String::from_utf8_lossy(&value),
                        "aux field"
                    );
                    self.ctx.metadata.insert(key.clone(), value.clone());
                    return Ok(Event::Aux { key, value });
                }
                OPCODE_MODULE_AUX => {
                    self.reject_pending()?;
                    let aux = read_module_aux(&mut self.cursor)?;
                    debug!(module = %aux.module.name, bytes = aux.raw.len(), "module aux");
                    return Ok(Event::ModuleAux(aux));
                }
                OPCODE_FUNCTION2 => {
                    self.reject_pending()?;
                    let code = read_string(&mut self.cursor)?;
                    debug!(bytes = code.len(), "function library");
                    return Ok(Event::Function(code));
                }
                _ => return self.read_entry(offset, tag).map(Event::Entry),
            }
        }
    }

    /// Expiry and eviction hints must be followed by a key.
    fn reject_pending(&self) -> Result<()> {
        match self.ctx.pending_start {
            Some(start) => Err(RdbError::corrupt(
                start,
                "expiry or eviction hint not followed by a key",
            )),
            None => Ok(()),
        }
    }

    fn read_entry(&mut self, offset: u64, tag: u8) -> Result<Entry> {
        let (kind, layout) =
            object_layout(tag).ok_or(RdbError::UnsupportedType { offset, tag })?;
        let key = read_string(&mut self.cursor)?;
        let (value, encoding) = read_value(&mut self.cursor, tag, layout, self.skip_values)?;

        let start = self.ctx.pending_start.take().unwrap_or(offset);
        let entry = Entry {
            db: self.ctx.db,
            key,
            value,
            expire_at_ms: self.ctx.pending_expire_ms.take(),
            lfu_freq: self.ctx.pending_freq.take(),
            lru_idle: self.ctx.pending_idle.take(),
            kind,
            type_tag: tag,
            encoding,
            span: start..self.cursor.position(),
        };
        self.entries += 1;
        Ok(entry)
    }

    /// Reads the trailing checksum field (if the version has one) and
    /// compares it with the running value.
    fn finish(&mut self) -> Result<ChecksumStatus> {
        self.state = State::Done;
        let status = if self.version >= CHECKSUM_MIN_VERSION {
            let mut field = [0u8; CHECKSUM_BYTES];
            self.cursor.read_unhashed(&mut field)?;
            self.cursor.checksum().verify(u64::from_le_bytes(field))
        } else {
            ChecksumStatus::Skipped
        };
        match status {
            ChecksumStatus::Mismatch { expected, actual } => warn!(
                expected = %format!("{:#018x}", expected),
                actual = %format!("{:#018x}", actual),
                "rdb checksum mismatch"
            ),
            _ => info!(entries = self.entries, checksum = ?status, "rdb decoded"),
        }
        Ok(status)
    }
}

impl<R: Read> Iterator for RdbReader<R> {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
