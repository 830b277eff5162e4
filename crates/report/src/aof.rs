//! Replay-command generation in RESP (append-only file) form.
//!
//! Every record becomes the commands that recreate it on an empty server:
//!
//! ```text
//! SELECT db                      when the database changes
//! SET | RPUSH | SADD | HSET | ZADD | XADD ...
//! XSETID / XGROUP CREATE         stream metadata
//! PEXPIREAT key ms               when the key has an expiry
//! ```
//!
//! Collections are emitted in batches so that no single command grows
//! without bound.

use std::io::Write;

use anyhow::{Context, Result};
use filter::{Record, RecordHandler};
use rdb::{ChecksumStatus, Stream, Value};
use tracing::{debug, warn};

/// Elements per RPUSH/SADD/HSET/ZADD command.
pub const DEFAULT_BATCH: usize = 64;

/// Formats a sorted-set score the way the server parses it back.
fn score_arg(score: f64) -> Vec<u8> {
    if score == f64::INFINITY {
        b"+inf".to_vec()
    } else if score == f64::NEG_INFINITY {
        b"-inf".to_vec()
    } else {
        score.to_string().into_bytes()
    }
}

pub struct AofWriter<W: Write> {
    out: W,
    batch: usize,
    current_db: Option<u64>,
    commands: u64,
    skipped: u64,
}

impl<W: Write> AofWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            batch: DEFAULT_BATCH,
            current_db: None,
            commands: 0,
            skipped: 0,
        }
    }

    /// Sets the number of elements per command (at least 1).
    #[must_use]
    pub fn with_batch(mut self, batch: usize) -> Self {
        self.batch = batch.max(1);
        self
    }

    /// Commands written so far.
    #[must_use]
    pub fn commands(&self) -> u64 {
        self.commands
    }

    /// Records that could not be expressed as commands.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Writes one command as a RESP array of bulk strings.
    fn command(&mut self, args: &[&[u8]]) -> Result<()> {
        write!(self.out, "*{}\r\n", args.len())?;
        for arg in args {
            write!(self.out, "${}\r\n", arg.len())?;
            self.out.write_all(arg)?;
            self.out.write_all(b"\r\n")?;
        }
        self.commands += 1;
        Ok(())
    }

    /// `name key` followed by `items`, at most `batch` items per command.
    fn batched(&mut self, name: &[u8], key: &[u8], items: Vec<Vec<Vec<u8>>>) -> Result<()> {
        for chunk in items.chunks(self.batch) {
            let mut args: Vec<&[u8]> = vec![name, key];
            for item in chunk {
                args.extend(item.iter().map(Vec::as_slice));
            }
            self.command(&args)?;
        }
        Ok(())
    }

    fn select(&mut self, db: u64) -> Result<()> {
        if self.current_db != Some(db) {
            let db_arg = db.to_string();
            self.command(&[b"SELECT", db_arg.as_bytes()])?;
            self.current_db = Some(db);
        }
        Ok(())
    }

    fn stream(&mut self, key: &[u8], stream: &Stream) -> Result<()> {
        let last_id = stream.last_id.to_string();
        if stream.entries.is_empty() {
            // XADD cannot create an empty stream; add and trim one placeholder.
            self.command(&[b"XADD", key, b"MAXLEN", b"0", last_id.as_bytes(), b"x", b"y"])?;
        }
        for entry in &stream.entries {
            let id = entry.id.to_string();
            let mut args: Vec<&[u8]> = vec![&b"XADD"[..], key, id.as_bytes()];
            for (field, value) in &entry.fields {
                args.push(field.as_slice());
                args.push(value.as_slice());
            }
            self.command(&args)?;
        }
        self.command(&[b"XSETID", key, last_id.as_bytes()])?;
        for group in &stream.groups {
            let group_last = group.last_id.to_string();
            let mut args: Vec<&[u8]> = vec![
                &b"XGROUP"[..],
                &b"CREATE"[..],
                key,
                group.name.as_slice(),
                group_last.as_bytes(),
            ];
            let entries_read = group.entries_read.map(|n| n.to_string());
            if let Some(n) = &entries_read {
                args.push(&b"ENTRIESREAD"[..]);
                args.push(n.as_bytes());
            }
            self.command(&args)?;
        }
        Ok(())
    }

    fn value(&mut self, key: &[u8], value: &Value) -> Result<bool> {
        match value {
            Value::String(s) => self.command(&[b"SET", key, s.as_slice()])?,
            Value::List(items) => {
                self.batched(b"RPUSH", key, items.iter().map(|i| vec![i.clone()]).collect())?
            }
            Value::Set(items) => {
                self.batched(b"SADD", key, items.iter().map(|i| vec![i.clone()]).collect())?
            }
            Value::Hash(pairs) => self.batched(
                b"HSET",
                key,
                pairs.iter().map(|(f, v)| vec![f.clone(), v.clone()]).collect(),
            )?,
            Value::SortedSet(members) => self.batched(
                b"ZADD",
                key,
                members
                    .iter()
                    .map(|(m, s)| vec![score_arg(*s), m.clone()])
                    .collect(),
            )?,
            Value::Stream(stream) => self.stream(key, stream)?,
            Value::Opaque { module, .. } => {
                warn!(
                    key = %String::from_utf8_lossy(key),
                    module = %module.name,
                    "module value has no replay form, skipped"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl<W: Write> RecordHandler for AofWriter<W> {
    fn on_record(&mut self, record: Record) -> Result<()> {
        let (Some(db), Some(key), Some(value)) = (record.db, &record.key, &record.value) else {
            debug!(key = %record.key_lossy(), "record without db, key or value, skipped");
            self.skipped += 1;
            return Ok(());
        };
        self.select(db).context("writing aof")?;
        if !self.value(key, value).context("writing aof")? {
            self.skipped += 1;
            return Ok(());
        }
        if let Some(at) = record.expire_at_ms {
            let at = at.to_string();
            self.command(&[b"PEXPIREAT", key, at.as_bytes()])
                .context("writing aof")?;
        }
        Ok(())
    }

    fn on_end(&mut self, _status: ChecksumStatus) -> Result<()> {
        debug!(commands = self.commands, skipped = self.skipped, "aof written");
        self.out.flush().context("flushing aof")
    }

    fn on_abort(&mut self) -> Result<()> {
        self.out.flush().context("flushing aof")
    }
}
