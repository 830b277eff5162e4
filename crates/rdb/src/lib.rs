//! # RDB - Redis snapshot decoder
//!
//! Streams an offline RDB file into typed records without a running server.
//!
//! ## Components
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │ reader.rs   opcode dispatcher (Header -> Body -> Done)         │
//! │   │  pending expiry / freq / idle, current db, aux metadata   │
//! │   v                                                           │
//! │ value.rs    type tag -> container decoder                      │
//! │   │                                                           │
//! │   ├── string.rs      raw | int8/16/32 literal | LZF            │
//! │   │     └── lzf.rs   literal runs + back-references           │
//! │   ├── length.rs      6/14/32/64-bit lengths, special selectors │
//! │   └── containers/    ziplist listpack intset zipmap stream     │
//! │                      module                                   │
//! │ cursor.rs   forward-only reads, offsets, CRC-64 feed           │
//! │ checksum.rs trailing CRC-64 comparison                         │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use rdb::{Event, RdbReader};
//!
//! let file = rdb::open("dump.rdb").unwrap();
//! for event in RdbReader::new(file) {
//!     if let Event::Entry(entry) = event.unwrap() {
//!         println!("{} {}", String::from_utf8_lossy(&entry.key), entry.size());
//!     }
//! }
//! ```

pub mod checksum;
pub mod containers;
pub mod cursor;
mod error;
pub mod format;
mod handler;
pub mod length;
pub mod lzf;
mod model;
mod reader;
pub mod string;
mod value;

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

pub use containers::module::ModuleAux;
pub use error::{DecodeAbort, RdbError, Result};
pub use handler::{decode, DecodeSummary, RdbHandler};
pub use model::{
    ChecksumStatus, Consumer, ConsumerGroup, Encoding, Entry, ModuleId, ObjectType, PendingEntry,
    Stream, StreamEntry, StreamId, Value,
};
pub use reader::{Event, RdbReader};

/// Opens a snapshot file for decoding behind a buffered reader.
pub fn open<P: AsRef<Path>>(path: P) -> io::Result<BufReader<File>> {
    Ok(BufReader::new(File::open(path)?))
}

#[cfg(test)]
mod tests;
