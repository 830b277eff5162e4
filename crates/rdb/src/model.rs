//! Decoded record types handed to consumers.

use std::fmt;
use std::ops::Range;

/// Logical kind of a stored object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    String,
    List,
    Set,
    SortedSet,
    Hash,
    Stream,
    Module,
}

impl ObjectType {
    /// Lower-case name as used by reports (`string`, `list`, `zset`, ...).
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::String => "string",
            ObjectType::List => "list",
            ObjectType::Set => "set",
            ObjectType::SortedSet => "zset",
            ObjectType::Hash => "hash",
            ObjectType::Stream => "stream",
            ObjectType::Module => "module",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// On-disk layout an object was stored with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Plain length-prefixed string.
    Raw,
    /// String stored as an 8/16/32-bit integer literal.
    Int,
    /// String stored as an LZF block.
    Lzf,
    LinkedList,
    HashTable,
    SkipList,
    Zipmap,
    Ziplist,
    Intset,
    Quicklist,
    Quicklist2,
    Listpack,
    StreamListpacks,
    Module,
}

impl Encoding {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Encoding::Raw => "raw",
            Encoding::Int => "int",
            Encoding::Lzf => "lzf",
            Encoding::LinkedList => "linkedlist",
            Encoding::HashTable => "hashtable",
            Encoding::SkipList => "skiplist",
            Encoding::Zipmap => "zipmap",
            Encoding::Ziplist => "ziplist",
            Encoding::Intset => "intset",
            Encoding::Quicklist => "quicklist",
            Encoding::Quicklist2 => "quicklist2",
            Encoding::Listpack => "listpack",
            Encoding::StreamListpacks => "stream-listpacks",
            Encoding::Module => "module",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stream entry id (`<ms>-<seq>`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    /// Decodes the 16-byte big-endian raw form used for master ids and PELs.
    #[must_use]
    pub fn from_raw(raw: &[u8; 16]) -> Self {
        let mut ms = [0u8; 8];
        let mut seq = [0u8; 8];
        ms.copy_from_slice(&raw[..8]);
        seq.copy_from_slice(&raw[8..]);
        StreamId {
            ms: u64::from_be_bytes(ms),
            seq: u64::from_be_bytes(seq),
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

/// A pending (delivered but unacknowledged) message of a consumer group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEntry {
    pub id: StreamId,
    pub delivery_time_ms: u64,
    pub delivery_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Consumer {
    pub name: Vec<u8>,
    pub seen_time_ms: u64,
    /// Present from stream layout v3 on.
    pub active_time_ms: Option<u64>,
    pub pending: Vec<StreamId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerGroup {
    pub name: Vec<u8>,
    pub last_id: StreamId,
    /// Present from stream layout v2 on.
    pub entries_read: Option<u64>,
    pub pending: Vec<PendingEntry>,
    pub consumers: Vec<Consumer>,
}

/// A fully decoded stream: live entries in on-disk order plus group state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stream {
    pub entries: Vec<StreamEntry>,
    /// Number of live entries as recorded by the producer.
    pub length: u64,
    pub last_id: StreamId,
    pub first_id: Option<StreamId>,
    pub max_deleted_id: Option<StreamId>,
    pub entries_added: Option<u64>,
    pub groups: Vec<ConsumerGroup>,
}

/// Identity of the extension module that produced an opaque value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleId {
    pub name: String,
    pub version: u16,
}

impl ModuleId {
    const CHARSET: &'static [u8; 64] =
        b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";

    /// Splits a 64-bit module id into its 9-character name and 10-bit version.
    #[must_use]
    pub fn from_raw(id: u64) -> Self {
        let name = (0..9)
            .map(|i| {
                let shift = 64 - 6 * (i + 1);
                Self::CHARSET[((id >> shift) & 63) as usize] as char
            })
            .collect();
        ModuleId {
            name,
            version: (id & 1023) as u16,
        }
    }
}

/// The decoded value of one key.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(Vec<u8>),
    List(Vec<Vec<u8>>),
    Set(Vec<Vec<u8>>),
    /// Field/value pairs in on-disk order.
    Hash(Vec<(Vec<u8>, Vec<u8>)>),
    /// Member/score pairs in on-disk order.
    SortedSet(Vec<(Vec<u8>, f64)>),
    Stream(Box<Stream>),
    /// Module payload captured byte-for-byte, never interpreted.
    Opaque { module: ModuleId, raw: Vec<u8> },
}

impl Value {
    /// Number of logical elements (1 for strings and opaque values).
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Value::String(_) | Value::Opaque { .. } => 1,
            Value::List(items) | Value::Set(items) => items.len(),
            Value::Hash(pairs) => pairs.len(),
            Value::SortedSet(pairs) => pairs.len(),
            Value::Stream(stream) => stream.entries.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One key of the snapshot with everything the file says about it.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub db: u64,
    pub key: Vec<u8>,
    /// `None` when the decoder runs in key-only mode.
    pub value: Option<Value>,
    /// Absolute expiry in unix milliseconds.
    pub expire_at_ms: Option<i64>,
    pub lfu_freq: Option<u8>,
    pub lru_idle: Option<u64>,
    pub kind: ObjectType,
    pub type_tag: u8,
    pub encoding: Encoding,
    /// Input offsets covered by this entry, including any expiry/freq/idle
    /// records that preceded it.
    pub span: Range<u64>,
}

impl Entry {
    /// Serialized size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.span.end - self.span.start
    }

    /// Returns `true` if the entry has an expiry at or before `now_ms`.
    #[must_use]
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        matches!(self.expire_at_ms, Some(at) if at <= now_ms)
    }
}

/// Outcome of the trailing checksum comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    Valid,
    Mismatch { expected: u64, actual: u64 },
    /// The producer disabled checksums (all-zero field) or the version
    /// predates them.
    Skipped,
}
