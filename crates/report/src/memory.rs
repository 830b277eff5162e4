//! Per-key size report in CSV form.

use std::io::Write;

use anyhow::{Context, Result};
use filter::{Record, RecordHandler};
use rdb::ChecksumStatus;

use crate::{csv_cell, readable_size};

pub const HEADER: &str = "database,key,type,size,size_readable,element_count";

/// One CSV row for `record`. The element count is empty when the value
/// was not decoded.
pub(crate) fn csv_row(record: &Record) -> String {
    let size = record.size.unwrap_or(0);
    format!(
        "{},{},{},{},{},{}",
        record.db.map(|db| db.to_string()).unwrap_or_default(),
        csv_cell(&record.key_lossy()),
        record.kind.map(|k| k.name()).unwrap_or_default(),
        size,
        readable_size(size),
        record
            .value
            .as_ref()
            .map(|v| v.len().to_string())
            .unwrap_or_default(),
    )
}

/// Streams one CSV row per record.
pub struct MemoryReport<W: Write> {
    out: W,
    header_written: bool,
    total_bytes: u64,
}

impl<W: Write> MemoryReport<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            header_written: false,
            total_bytes: 0,
        }
    }

    /// Sum of all reported sizes.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn header(&mut self) -> Result<()> {
        if !self.header_written {
            writeln!(self.out, "{}", HEADER).context("writing csv header")?;
            self.header_written = true;
        }
        Ok(())
    }
}

impl<W: Write> RecordHandler for MemoryReport<W> {
    fn on_record(&mut self, record: Record) -> Result<()> {
        self.header()?;
        self.total_bytes += record.size.unwrap_or(0);
        writeln!(self.out, "{}", csv_row(&record)).context("writing csv row")?;
        Ok(())
    }

    fn on_end(&mut self, _status: ChecksumStatus) -> Result<()> {
        self.header()?;
        self.out.flush().context("flushing csv")
    }

    fn on_abort(&mut self) -> Result<()> {
        self.header()?;
        self.out.flush().context("flushing csv")
    }
}
