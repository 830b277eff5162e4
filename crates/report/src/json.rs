//! JSON array export.
//!
//! ```json
//! [
//! {"db":0,"key":"user:1","size":42,"type":"hash","encoding":"listpack","hash":{"name":"ada"}},
//! {"db":0,"key":"q","expiration":1700000000000,"size":30,"type":"list","encoding":"quicklist2","values":["a","b"]}
//! ]
//! ```
//!
//! The value attribute is named after the type: `value` (string), `values`
//! (list), `members` (set), `hash`, `entries` (sorted set, stream) and
//! `module`. Byte strings that are not UTF-8 are rendered lossily.

use std::io::Write;

use anyhow::{Context, Result};
use filter::{Record, RecordHandler};
use rdb::{ChecksumStatus, ConsumerGroup, Stream, Value};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;

use crate::text;

/// Field/value pairs serialized as a JSON object in stored order.
struct Pairs<'a>(&'a [(Vec<u8>, Vec<u8>)]);

impl Serialize for Pairs<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (field, value) in self.0 {
            map.serialize_entry(&text(field), &text(value))?;
        }
        map.end()
    }
}

/// Scores that JSON numbers cannot carry are written as strings.
fn score_json(score: f64) -> serde_json::Value {
    serde_json::Number::from_f64(score)
        .map(serde_json::Value::Number)
        .unwrap_or_else(|| serde_json::Value::String(format!("{}", score)))
}

#[derive(Serialize)]
struct Member {
    member: String,
    score: serde_json::Value,
}

#[derive(Serialize)]
struct StreamItem<'a> {
    id: String,
    fields: Pairs<'a>,
}

#[derive(Serialize)]
struct Group {
    name: String,
    last_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    entries_read: Option<u64>,
    pending: usize,
    consumers: Vec<String>,
}

impl From<&ConsumerGroup> for Group {
    fn from(g: &ConsumerGroup) -> Self {
        Group {
            name: text(&g.name),
            last_id: g.last_id.to_string(),
            entries_read: g.entries_read,
            pending: g.pending.len(),
            consumers: g.consumers.iter().map(|c| text(&c.name)).collect(),
        }
    }
}

#[derive(Serialize)]
struct ModuleInfo {
    name: String,
    version: u16,
    size: usize,
}

#[derive(Serialize)]
enum Body<'a> {
    #[serde(rename = "value")]
    String(String),
    #[serde(rename = "values")]
    List(Vec<String>),
    #[serde(rename = "members")]
    Set(Vec<String>),
    #[serde(rename = "hash")]
    Hash(Pairs<'a>),
    #[serde(rename = "entries")]
    SortedSet(Vec<Member>),
    #[serde(rename = "entries")]
    Stream(Vec<StreamItem<'a>>),
    #[serde(rename = "module")]
    Module(ModuleInfo),
}

impl<'a> Body<'a> {
    fn new(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Body::String(text(s)),
            Value::List(items) => Body::List(items.iter().map(|i| text(i)).collect()),
            Value::Set(items) => Body::Set(items.iter().map(|i| text(i)).collect()),
            Value::Hash(pairs) => Body::Hash(Pairs(pairs)),
            Value::SortedSet(members) => Body::SortedSet(
                members
                    .iter()
                    .map(|(m, s)| Member {
                        member: text(m),
                        score: score_json(*s),
                    })
                    .collect(),
            ),
            Value::Stream(stream) => Body::Stream(
                stream
                    .entries
                    .iter()
                    .map(|e| StreamItem {
                        id: e.id.to_string(),
                        fields: Pairs(&e.fields),
                    })
                    .collect(),
            ),
            Value::Opaque { module, raw } => Body::Module(ModuleInfo {
                name: module.name.clone(),
                version: module.version,
                size: raw.len(),
            }),
        }
    }
}

/// Compact single-line rendering of a value: strings as their text, other
/// types as JSON.
pub(crate) fn compact_value(value: &Value) -> serde_json::Result<String> {
    match Body::new(value) {
        Body::String(s) => Ok(s),
        Body::List(items) | Body::Set(items) => serde_json::to_string(&items),
        Body::Hash(pairs) => serde_json::to_string(&pairs),
        Body::SortedSet(members) => serde_json::to_string(&members),
        Body::Stream(items) => serde_json::to_string(&items),
        Body::Module(info) => serde_json::to_string(&info),
    }
}

#[derive(Serialize)]
struct JsonRecord<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    db: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    expiration: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
    #[serde(flatten)]
    body: Option<Body<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    groups: Vec<Group>,
}

fn stream_groups(stream: &Stream) -> Vec<Group> {
    stream.groups.iter().map(Group::from).collect()
}

impl<'a> JsonRecord<'a> {
    fn new(record: &'a Record) -> Self {
        JsonRecord {
            db: record.db,
            key: record.key.as_deref().map(text),
            expiration: record.expire_at_ms,
            size: record.size,
            kind: record.kind.map(|k| k.name()),
            encoding: record.encoding.map(|e| e.name()),
            body: record.value.as_ref().map(Body::new),
            groups: match &record.value {
                Some(Value::Stream(stream)) => stream_groups(stream),
                _ => Vec::new(),
            },
        }
    }
}

/// Writes records as the elements of one JSON array.
///
/// The array is opened by the first record (or by `on_end` when there are
/// none) and closed by `on_end`, or by `on_abort` after a failed decode.
pub struct JsonExporter<W: Write> {
    out: W,
    written: u64,
    closed: bool,
}

impl<W: Write> JsonExporter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            written: 0,
            closed: false,
        }
    }

    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn close(&mut self) -> Result<()> {
        if !self.closed {
            let tail: &[u8] = if self.written == 0 { b"[]\n" } else { b"\n]\n" };
            self.out.write_all(tail).context("writing json")?;
            self.closed = true;
        }
        self.out.flush().context("flushing json")
    }
}

impl<W: Write> RecordHandler for JsonExporter<W> {
    fn on_record(&mut self, record: Record) -> Result<()> {
        let sep: &[u8] = if self.written == 0 { b"[\n" } else { b",\n" };
        self.out.write_all(sep).context("writing json")?;
        serde_json::to_writer(&mut self.out, &JsonRecord::new(&record))
            .context("serializing record")?;
        self.written += 1;
        Ok(())
    }

    fn on_end(&mut self, _status: ChecksumStatus) -> Result<()> {
        self.close()
    }

    fn on_abort(&mut self) -> Result<()> {
        self.close()
    }
}
