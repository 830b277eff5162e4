//! Streams: listpack nodes keyed by master id, followed by metadata and
//! consumer groups.
//!
//! ```text
//! node count | (master id string (16 bytes) | listpack string)*
//! length | last id (ms, seq)
//! [v2+] first id | max deleted id | entries added
//! group count | (name | last id | [v2+] entries read | PEL | consumers)*
//! ```
//!
//! Inside a node listpack the first entry is the master entry:
//!
//! ```text
//! count | deleted | n | field_1 .. field_n | 0
//! ```
//!
//! followed by one record per stream entry:
//!
//! ```text
//! flags | ms-diff | seq-diff | (values of master fields | n | field value ..) | lp-count
//! ```

use std::io::Read;

use crate::containers::{Element, Listpack};
use crate::cursor::Cursor;
use crate::error::{RdbError, Result};
use crate::format::{TYPE_STREAM_LISTPACKS_2, TYPE_STREAM_LISTPACKS_3};
use crate::length::{read_count, read_length};
use crate::model::{Consumer, ConsumerGroup, PendingEntry, Stream, StreamEntry, StreamId};
use crate::string::{read_string, skip_string};

const STREAM_ITEM_FLAG_DELETED: i64 = 1 << 0;
const STREAM_ITEM_FLAG_SAMEFIELDS: i64 = 1 << 1;

/// Cap on pre-allocation driven by declared counts.
const MAX_PREALLOC: usize = 1024;

fn read_id<R: Read>(cursor: &mut Cursor<R>) -> Result<StreamId> {
    let ms = read_length(cursor)?;
    let seq = read_length(cursor)?;
    Ok(StreamId { ms, seq })
}

fn read_raw_id<R: Read>(cursor: &mut Cursor<R>) -> Result<StreamId> {
    Ok(StreamId::from_raw(&cursor.read_array::<16>()?))
}

/// Reads a stream value. With `skip_entries` the listpack nodes are consumed
/// without being decoded and `entries` stays empty.
pub fn read_stream<R: Read>(cursor: &mut Cursor<R>, tag: u8, skip_entries: bool) -> Result<Stream> {
    let mut stream = Stream::default();

    let nodes = read_count(cursor)?;
    for _ in 0..nodes {
        if skip_entries {
            skip_string(cursor)?;
            skip_string(cursor)?;
            continue;
        }
        let key_offset = cursor.position();
        let master_key = read_string(cursor)?;
        let master: [u8; 16] = master_key.as_slice().try_into().map_err(|_| {
            RdbError::corrupt(
                key_offset,
                format!("stream node key is {} bytes, expected 16", master_key.len()),
            )
        })?;
        let master_id = StreamId::from_raw(&master);

        let lp_offset = cursor.position();
        let blob = read_string(cursor)?;
        read_node(&blob, lp_offset, master_id, &mut stream.entries)?;
    }

    stream.length = read_length(cursor)?;
    stream.last_id = read_id(cursor)?;

    if tag >= TYPE_STREAM_LISTPACKS_2 {
        stream.first_id = Some(read_id(cursor)?);
        stream.max_deleted_id = Some(read_id(cursor)?);
        stream.entries_added = Some(read_length(cursor)?);
    }

    let groups = read_count(cursor)?;
    stream.groups.reserve(groups.min(MAX_PREALLOC));
    for _ in 0..groups {
        stream.groups.push(read_group(cursor, tag)?);
    }

    Ok(stream)
}

fn read_group<R: Read>(cursor: &mut Cursor<R>, tag: u8) -> Result<ConsumerGroup> {
    let name = read_string(cursor)?;
    let last_id = read_id(cursor)?;
    let entries_read = if tag >= TYPE_STREAM_LISTPACKS_2 {
        Some(read_length(cursor)?)
    } else {
        None
    };

    let pel_len = read_count(cursor)?;
    let mut pending = Vec::with_capacity(pel_len.min(MAX_PREALLOC));
    for _ in 0..pel_len {
        let id = read_raw_id(cursor)?;
        let delivery_time_ms = cursor.read_u64_le()?;
        let delivery_count = read_length(cursor)?;
        pending.push(PendingEntry {
            id,
            delivery_time_ms,
            delivery_count,
        });
    }

    let consumer_count = read_count(cursor)?;
    let mut consumers = Vec::with_capacity(consumer_count.min(MAX_PREALLOC));
    for _ in 0..consumer_count {
        let name = read_string(cursor)?;
        let seen_time_ms = cursor.read_u64_le()?;
        let active_time_ms = if tag >= TYPE_STREAM_LISTPACKS_3 {
            Some(cursor.read_u64_le()?)
        } else {
            None
        };
        let owned = read_count(cursor)?;
        let mut ids = Vec::with_capacity(owned.min(MAX_PREALLOC));
        for _ in 0..owned {
            ids.push(read_raw_id(cursor)?);
        }
        consumers.push(Consumer {
            name,
            seen_time_ms,
            active_time_ms,
            pending: ids,
        });
    }

    Ok(ConsumerGroup {
        name,
        last_id,
        entries_read,
        pending,
        consumers,
    })
}

fn non_negative(lp: &Listpack<'_>, value: i64, what: &str) -> Result<usize> {
    usize::try_from(value).map_err(|_| lp.corrupt(format!("negative {}: {}", what, value)))
}

/// Decodes the entries of one node, appending live ones to `out`.
fn read_node(
    blob: &[u8],
    base: u64,
    master_id: StreamId,
    out: &mut Vec<StreamEntry>,
) -> Result<()> {
    let mut lp = Listpack::parse(blob, base)?;

    let _count = lp.expect_int("master entry count")?;
    let _deleted = lp.expect_int("master deleted count")?;
    let field_count = lp.expect_int("master field count")?;
    let field_count = non_negative(&lp, field_count, "master field count")?;
    let mut master_fields: Vec<Element<'_>> = Vec::with_capacity(field_count.min(MAX_PREALLOC));
    for _ in 0..field_count {
        master_fields.push(lp.expect_next("master field")?);
    }
    let terminator = lp.expect_int("master entry terminator")?;
    if terminator != 0 {
        return Err(lp.corrupt(format!("master entry terminator is {}", terminator)));
    }

    loop {
        let flags = match lp.next() {
            None => break,
            Some(element) => element?
                .as_int()
                .ok_or_else(|| lp.corrupt("entry flags are not an integer"))?,
        };
        let ms_diff = lp.expect_int("entry ms delta")?;
        let seq_diff = lp.expect_int("entry seq delta")?;
        let id = StreamId {
            ms: master_id.ms.wrapping_add(ms_diff as u64),
            seq: master_id.seq.wrapping_add(seq_diff as u64),
        };

        let fields = if flags & STREAM_ITEM_FLAG_SAMEFIELDS != 0 {
            let mut fields = Vec::with_capacity(master_fields.len());
            for field in &master_fields {
                let value = lp.expect_next("entry value")?;
                fields.push((field.to_bytes(), value.to_bytes()));
            }
            fields
        } else {
            let n = lp.expect_int("entry field count")?;
            let n = non_negative(&lp, n, "entry field count")?;
            let mut fields = Vec::with_capacity(n.min(MAX_PREALLOC));
            for _ in 0..n {
                let field = lp.expect_next("entry field")?;
                let value = lp.expect_next("entry value")?;
                fields.push((field.to_bytes(), value.to_bytes()));
            }
            fields
        };
        let _lp_count = lp.expect_int("entry lp-count")?;

        if flags & STREAM_ITEM_FLAG_DELETED == 0 {
            out.push(StreamEntry { id, fields });
        }
    }
    Ok(())
}
