//! RDB binary format constants and the type-tag lookup table.
//!
//! ## File layout
//!
//! ```text
//! "REDIS" | version (4 ASCII digits)
//! repeated records, each introduced by one tag byte:
//!   0xFA aux        key string | value string
//!   0xFE select-db  db index (length)
//!   0xFB resize-db  db size (length) | expires size (length)
//!   0xFD / 0xFC     expire seconds (u32 LE) / expire millis (u64 LE)
//!   0xF9 / 0xF8     lfu frequency (u8) / lru idle (length)
//!   0-21            object: key string | encoded value
//! 0xFF | checksum (u64 LE, version >= 5 only)
//! ```

use crate::model::{Encoding, ObjectType};

/// The five magic bytes every snapshot starts with.
pub const RDB_MAGIC: &[u8; 5] = b"REDIS";

/// Newest snapshot version this decoder understands.
pub const MAX_RDB_VERSION: u32 = 12;

/// First version that carries a trailing CRC-64.
pub const CHECKSUM_MIN_VERSION: u32 = 5;

/// Size of the trailing checksum field in bytes.
pub const CHECKSUM_BYTES: usize = 8;

pub const OPCODE_SLOT_INFO: u8 = 0xF4;
pub const OPCODE_FUNCTION2: u8 = 0xF5;
pub const OPCODE_FUNCTION_PRE_GA: u8 = 0xF6;
pub const OPCODE_MODULE_AUX: u8 = 0xF7;
pub const OPCODE_IDLE: u8 = 0xF8;
pub const OPCODE_FREQ: u8 = 0xF9;
pub const OPCODE_AUX: u8 = 0xFA;
pub const OPCODE_RESIZEDB: u8 = 0xFB;
pub const OPCODE_EXPIRETIME_MS: u8 = 0xFC;
pub const OPCODE_EXPIRETIME: u8 = 0xFD;
pub const OPCODE_SELECTDB: u8 = 0xFE;
pub const OPCODE_EOF: u8 = 0xFF;

pub const TYPE_STRING: u8 = 0;
pub const TYPE_LIST: u8 = 1;
pub const TYPE_SET: u8 = 2;
pub const TYPE_ZSET: u8 = 3;
pub const TYPE_HASH: u8 = 4;
pub const TYPE_ZSET_2: u8 = 5;
pub const TYPE_MODULE_PRE_GA: u8 = 6;
pub const TYPE_MODULE_2: u8 = 7;
pub const TYPE_HASH_ZIPMAP: u8 = 9;
pub const TYPE_LIST_ZIPLIST: u8 = 10;
pub const TYPE_SET_INTSET: u8 = 11;
pub const TYPE_ZSET_ZIPLIST: u8 = 12;
pub const TYPE_HASH_ZIPLIST: u8 = 13;
pub const TYPE_LIST_QUICKLIST: u8 = 14;
pub const TYPE_STREAM_LISTPACKS: u8 = 15;
pub const TYPE_HASH_LISTPACK: u8 = 16;
pub const TYPE_ZSET_LISTPACK: u8 = 17;
pub const TYPE_LIST_QUICKLIST_2: u8 = 18;
pub const TYPE_STREAM_LISTPACKS_2: u8 = 19;
pub const TYPE_SET_LISTPACK: u8 = 20;
pub const TYPE_STREAM_LISTPACKS_3: u8 = 21;

/// Length-encoding prefixes (top two bits of the first byte).
pub const LEN_6BIT: u8 = 0;
pub const LEN_14BIT: u8 = 1;
pub const LEN_32BIT: u8 = 0x80;
pub const LEN_64BIT: u8 = 0x81;
pub const LEN_ENCVAL: u8 = 3;

/// Special string encodings selected by a `11xxxxxx` length byte.
pub const ENC_INT8: u8 = 0;
pub const ENC_INT16: u8 = 1;
pub const ENC_INT32: u8 = 2;
pub const ENC_LZF: u8 = 3;

/// Quicklist v2 node container tags.
pub const QUICKLIST_NODE_PLAIN: u64 = 1;
pub const QUICKLIST_NODE_PACKED: u64 = 2;

/// Module v2 opcodes.
pub const MODULE_OPCODE_EOF: u64 = 0;
pub const MODULE_OPCODE_SINT: u64 = 1;
pub const MODULE_OPCODE_UINT: u64 = 2;
pub const MODULE_OPCODE_FLOAT: u64 = 3;
pub const MODULE_OPCODE_DOUBLE: u64 = 4;
pub const MODULE_OPCODE_STRING: u64 = 5;

/// Maps an on-disk object type tag to its logical kind and layout.
///
/// Returns `None` for tags this decoder cannot size (including the pre-GA
/// module encoding), which the dispatcher turns into `UnsupportedType`.
#[must_use]
pub fn object_layout(tag: u8) -> Option<(ObjectType, Encoding)> {
    let layout = match tag {
        TYPE_STRING => (ObjectType::String, Encoding::Raw),
        TYPE_LIST => (ObjectType::List, Encoding::LinkedList),
        TYPE_SET => (ObjectType::Set, Encoding::HashTable),
        TYPE_ZSET | TYPE_ZSET_2 => (ObjectType::SortedSet, Encoding::SkipList),
        TYPE_HASH => (ObjectType::Hash, Encoding::HashTable),
        TYPE_MODULE_2 => (ObjectType::Module, Encoding::Module),
        TYPE_HASH_ZIPMAP => (ObjectType::Hash, Encoding::Zipmap),
        TYPE_LIST_ZIPLIST => (ObjectType::List, Encoding::Ziplist),
        TYPE_SET_INTSET => (ObjectType::Set, Encoding::Intset),
        TYPE_ZSET_ZIPLIST => (ObjectType::SortedSet, Encoding::Ziplist),
        TYPE_HASH_ZIPLIST => (ObjectType::Hash, Encoding::Ziplist),
        TYPE_LIST_QUICKLIST => (ObjectType::List, Encoding::Quicklist),
        TYPE_LIST_QUICKLIST_2 => (ObjectType::List, Encoding::Quicklist2),
        TYPE_HASH_LISTPACK => (ObjectType::Hash, Encoding::Listpack),
        TYPE_ZSET_LISTPACK => (ObjectType::SortedSet, Encoding::Listpack),
        TYPE_SET_LISTPACK => (ObjectType::Set, Encoding::Listpack),
        TYPE_STREAM_LISTPACKS | TYPE_STREAM_LISTPACKS_2 | TYPE_STREAM_LISTPACKS_3 => {
            (ObjectType::Stream, Encoding::StreamListpacks)
        }
        _ => return None,
    };
    Some(layout)
}

/// Parses the 9-byte header, returning the version number.
///
/// Returns a human readable reason on failure; the caller attaches offsets.
pub(crate) fn parse_header(header: &[u8; 9]) -> std::result::Result<u32, String> {
    if &header[..5] != RDB_MAGIC {
        return Err(format!(
            "bad magic {:?}",
            String::from_utf8_lossy(&header[..5])
        ));
    }
    let digits = &header[5..];
    if !digits.iter().all(u8::is_ascii_digit) {
        return Err(format!(
            "bad version {:?}",
            String::from_utf8_lossy(digits)
        ));
    }
    let version = digits
        .iter()
        .fold(0u32, |acc, d| acc * 10 + u32::from(d - b'0'));
    if version == 0 || version > MAX_RDB_VERSION {
        return Err(format!("unsupported rdb version {}", version));
    }
    Ok(version)
}
