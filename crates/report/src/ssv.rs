//! Space-separated export: one line per key, projected fields in order.
//!
//! ```text
//! 0 user:1 hash 42
//! 0 queue list 30
//! ```
//!
//! Absent values are written as `-`. Values render as their text for
//! strings and as compact JSON for every other type.

use std::io::Write;

use anyhow::{Context, Result};
use config::Field;
use filter::{Record, RecordHandler};
use rdb::ChecksumStatus;

use crate::json::compact_value;

/// Fields written when none are configured.
pub const DEFAULT_FIELDS: [Field; 4] = [Field::Db, Field::Key, Field::Type, Field::Size];

const ABSENT: &str = "-";

pub struct SsvExporter<W: Write> {
    out: W,
    fields: Vec<Field>,
    separator: String,
}

impl<W: Write> SsvExporter<W> {
    pub fn new(out: W, fields: Option<Vec<Field>>) -> Self {
        Self {
            out,
            fields: fields.unwrap_or_else(|| DEFAULT_FIELDS.to_vec()),
            separator: " ".to_string(),
        }
    }

    #[must_use]
    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    #[must_use]
    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn cell(record: &Record, field: Field) -> Result<String> {
        let cell = match field {
            Field::Db => record.db.map(|db| db.to_string()),
            Field::Key => record.key.as_ref().map(|_| record.key_lossy()),
            Field::Expiration => record.expire_at_ms.map(|at| at.to_string()),
            Field::Size => record.size.map(|s| s.to_string()),
            Field::Type => record.kind.map(|k| k.name().to_string()),
            Field::Encoding => record.encoding.map(|e| e.name().to_string()),
            Field::Value => record
                .value
                .as_ref()
                .map(compact_value)
                .transpose()
                .context("rendering value")?,
        };
        Ok(cell.unwrap_or_else(|| ABSENT.to_string()))
    }
}

impl<W: Write> RecordHandler for SsvExporter<W> {
    fn on_record(&mut self, record: Record) -> Result<()> {
        let cells = self
            .fields
            .iter()
            .map(|f| Self::cell(&record, *f))
            .collect::<Result<Vec<_>>>()?;
        writeln!(self.out, "{}", cells.join(&self.separator)).context("writing ssv line")?;
        Ok(())
    }

    fn on_end(&mut self, _status: ChecksumStatus) -> Result<()> {
        self.out.flush().context("flushing ssv")
    }

    fn on_abort(&mut self) -> Result<()> {
        self.out.flush().context("flushing ssv")
    }
}
