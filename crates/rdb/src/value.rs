//! Per-type value decoding, selected by the on-disk type tag.

use std::io::Read;

use crate::containers::module::read_module_value;
use crate::containers::stream::read_stream;
use crate::containers::{pairs, Element, Intset, Listpack, Ziplist, Zipmap};
use crate::cursor::Cursor;
use crate::error::{RdbError, Result};
use crate::format::*;
use crate::length::{read_count, read_length};
use crate::model::{Encoding, Value};
use crate::string::{
    read_binary_double, read_double_string, read_string, read_string_encoded, skip_double_string,
    skip_string,
};

/// Cap on pre-allocation driven by declared counts.
const MAX_PREALLOC: usize = 1024;

/// Decodes (or, with `skip`, steps over) the value of an object with type
/// `tag`. Returns the value and the effective encoding.
///
/// The caller has already checked `tag` with [`object_layout`]; the layout
/// encoding is returned unchanged except for plain strings, whose encoding
/// depends on the string header.
pub(crate) fn read_value<R: Read>(
    cursor: &mut Cursor<R>,
    tag: u8,
    layout: Encoding,
    skip: bool,
) -> Result<(Option<Value>, Encoding)> {
    if skip {
        let encoding = skip_value(cursor, tag)?;
        return Ok((None, encoding.unwrap_or(layout)));
    }

    let value = match tag {
        TYPE_STRING => {
            let (bytes, encoding) = read_string_encoded(cursor)?;
            return Ok((Some(Value::String(bytes)), encoding));
        }
        TYPE_LIST => Value::List(read_strings(cursor)?),
        TYPE_SET => Value::Set(read_strings(cursor)?),
        TYPE_ZSET | TYPE_ZSET_2 => {
            let n = read_count(cursor)?;
            let mut members = Vec::with_capacity(n.min(MAX_PREALLOC));
            for _ in 0..n {
                let member = read_string(cursor)?;
                let score = if tag == TYPE_ZSET {
                    read_double_string(cursor)?
                } else {
                    read_binary_double(cursor)?
                };
                members.push((member, score));
            }
            Value::SortedSet(members)
        }
        TYPE_HASH => {
            let n = read_count(cursor)?;
            let mut fields = Vec::with_capacity(n.min(MAX_PREALLOC));
            for _ in 0..n {
                let field = read_string(cursor)?;
                let value = read_string(cursor)?;
                fields.push((field, value));
            }
            Value::Hash(fields)
        }
        TYPE_MODULE_2 => {
            let (module, raw) = read_module_value(cursor, true)?;
            Value::Opaque { module, raw }
        }
        TYPE_HASH_ZIPMAP => {
            let (blob, base) = read_blob(cursor)?;
            let mut fields = Vec::new();
            for pair in Zipmap::parse(&blob, base)? {
                let (field, value) = pair?;
                fields.push((field.to_vec(), value.to_vec()));
            }
            Value::Hash(fields)
        }
        TYPE_LIST_ZIPLIST => {
            let (blob, base) = read_blob(cursor)?;
            Value::List(collect_bytes(Ziplist::parse(&blob, base)?)?)
        }
        TYPE_SET_INTSET => {
            let (blob, base) = read_blob(cursor)?;
            let members = Intset::parse(&blob, base)?
                .map(|v| v.map(|v| v.to_string().into_bytes()))
                .collect::<Result<Vec<_>>>()?;
            Value::Set(members)
        }
        TYPE_ZSET_ZIPLIST => {
            let (blob, base) = read_blob(cursor)?;
            Value::SortedSet(collect_scored(Ziplist::parse(&blob, base)?, base)?)
        }
        TYPE_ZSET_LISTPACK => {
            let (blob, base) = read_blob(cursor)?;
            Value::SortedSet(collect_scored(Listpack::parse(&blob, base)?, base)?)
        }
        TYPE_HASH_ZIPLIST => {
            let (blob, base) = read_blob(cursor)?;
            Value::Hash(collect_pairs(Ziplist::parse(&blob, base)?, base)?)
        }
        TYPE_HASH_LISTPACK => {
            let (blob, base) = read_blob(cursor)?;
            Value::Hash(collect_pairs(Listpack::parse(&blob, base)?, base)?)
        }
        TYPE_SET_LISTPACK => {
            let (blob, base) = read_blob(cursor)?;
            Value::Set(collect_bytes(Listpack::parse(&blob, base)?)?)
        }
        TYPE_LIST_QUICKLIST => {
            let nodes = read_count(cursor)?;
            let mut items = Vec::new();
            for _ in 0..nodes {
                let (blob, base) = read_blob(cursor)?;
                items.extend(collect_bytes(Ziplist::parse(&blob, base)?)?);
            }
            Value::List(items)
        }
        TYPE_LIST_QUICKLIST_2 => {
            let nodes = read_count(cursor)?;
            let mut items = Vec::new();
            for _ in 0..nodes {
                let container_offset = cursor.position();
                let container = read_length(cursor)?;
                let (blob, base) = read_blob(cursor)?;
                match container {
                    QUICKLIST_NODE_PLAIN => items.push(blob),
                    QUICKLIST_NODE_PACKED => {
                        items.extend(collect_bytes(Listpack::parse(&blob, base)?)?)
                    }
                    other => {
                        return Err(RdbError::corrupt(
                            container_offset,
                            format!("unknown quicklist container {}", other),
                        ))
                    }
                }
            }
            Value::List(items)
        }
        TYPE_STREAM_LISTPACKS | TYPE_STREAM_LISTPACKS_2 | TYPE_STREAM_LISTPACKS_3 => {
            Value::Stream(Box::new(read_stream(cursor, tag, false)?))
        }
        other => {
            return Err(RdbError::UnsupportedType {
                offset: cursor.position(),
                tag: other,
            })
        }
    };
    Ok((Some(value), layout))
}

/// Steps over a value using only declared lengths. Returns the string
/// encoding for plain strings, `None` otherwise.
fn skip_value<R: Read>(cursor: &mut Cursor<R>, tag: u8) -> Result<Option<Encoding>> {
    match tag {
        TYPE_STRING => return skip_string(cursor).map(Some),
        TYPE_LIST | TYPE_SET => skip_strings(cursor, 1)?,
        TYPE_HASH => skip_strings(cursor, 2)?,
        TYPE_ZSET | TYPE_ZSET_2 => {
            let n = read_count(cursor)?;
            for _ in 0..n {
                skip_string(cursor)?;
                if tag == TYPE_ZSET {
                    skip_double_string(cursor)?;
                } else {
                    cursor.skip(8)?;
                }
            }
        }
        TYPE_MODULE_2 => {
            read_module_value(cursor, false)?;
        }
        TYPE_HASH_ZIPMAP | TYPE_LIST_ZIPLIST | TYPE_SET_INTSET | TYPE_ZSET_ZIPLIST
        | TYPE_HASH_ZIPLIST | TYPE_HASH_LISTPACK | TYPE_ZSET_LISTPACK | TYPE_SET_LISTPACK => {
            skip_string(cursor)?;
        }
        TYPE_LIST_QUICKLIST => skip_strings(cursor, 1)?,
        TYPE_LIST_QUICKLIST_2 => {
            let n = read_count(cursor)?;
            for _ in 0..n {
                read_length(cursor)?;
                skip_string(cursor)?;
            }
        }
        TYPE_STREAM_LISTPACKS | TYPE_STREAM_LISTPACKS_2 | TYPE_STREAM_LISTPACKS_3 => {
            read_stream(cursor, tag, true)?;
        }
        other => {
            return Err(RdbError::UnsupportedType {
                offset: cursor.position(),
                tag: other,
            })
        }
    }
    Ok(None)
}

/// Reads a count, then `count * per_item` strings, discarding them.
fn skip_strings<R: Read>(cursor: &mut Cursor<R>, per_item: usize) -> Result<()> {
    let n = read_count(cursor)?;
    for _ in 0..n {
        for _ in 0..per_item {
            skip_string(cursor)?;
        }
    }
    Ok(())
}

fn read_strings<R: Read>(cursor: &mut Cursor<R>) -> Result<Vec<Vec<u8>>> {
    let n = read_count(cursor)?;
    let mut items = Vec::with_capacity(n.min(MAX_PREALLOC));
    for _ in 0..n {
        items.push(read_string(cursor)?);
    }
    Ok(items)
}

/// Reads a container blob and the file offset its string started at.
fn read_blob<R: Read>(cursor: &mut Cursor<R>) -> Result<(Vec<u8>, u64)> {
    let base = cursor.position();
    Ok((read_string(cursor)?, base))
}

fn collect_bytes<'a>(iter: impl Iterator<Item = Result<Element<'a>>>) -> Result<Vec<Vec<u8>>> {
    iter.map(|e| e.map(|e| e.to_bytes())).collect()
}

fn collect_pairs<'a>(
    iter: impl Iterator<Item = Result<Element<'a>>>,
    base: u64,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
    let mut out = Vec::new();
    pairs(
        iter,
        |field, value| {
            out.push((field.to_bytes(), value.to_bytes()));
            Ok(())
        },
        || RdbError::corrupt(base, "hash has a field without a value"),
    )?;
    Ok(out)
}

fn collect_scored<'a>(
    iter: impl Iterator<Item = Result<Element<'a>>>,
    base: u64,
) -> Result<Vec<(Vec<u8>, f64)>> {
    let mut out = Vec::new();
    pairs(
        iter,
        |member, score| {
            let score = score.as_score().ok_or_else(|| {
                RdbError::corrupt(
                    base,
                    format!("score {:?} is not a number", String::from_utf8_lossy(&score.to_bytes())),
                )
            })?;
            out.push((member.to_bytes(), score));
            Ok(())
        },
        || RdbError::corrupt(base, "sorted set has a member without a score"),
    )?;
    Ok(out)
}
