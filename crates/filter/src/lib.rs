//! # Filter - selection and projection between decoder and consumers
//!
//! ```text
//!  RdbReader ──Entry──> Pipeline ──Record──> RecordHandler (json, aof, ...)
//!                        │  key patterns (any match)
//!                        │  expiry <= now_ms  (optional)
//!                        └  field projection
//! ```
//!
//! The pipeline is an [`RdbHandler`], so it plugs straight into
//! [`rdb::decode`]. Consumers see [`Record`]s, which carry only the
//! attributes the configuration projects.

use std::io::Read;
use std::ops::ControlFlow;
use std::path::Path;

use anyhow::{Context, Result};
use config::{DecodeConfig, Field};
use rdb::{ChecksumStatus, Encoding, Entry, ObjectType, RdbHandler, Value};
use regex::bytes::RegexSet;
use tracing::{debug, info, warn};

/// Key-pattern and expiry selection.
#[derive(Debug, Clone)]
pub struct Filter {
    patterns: Option<RegexSet>,
    exclude_expired: bool,
    now_ms: i64,
}

impl Filter {
    /// Compiles the configured key patterns.
    pub fn new(config: &DecodeConfig) -> Result<Self> {
        let patterns = if config.key_patterns.is_empty() {
            None
        } else {
            let set = RegexSet::new(&config.key_patterns).with_context(|| {
                format!("invalid key pattern in {:?}", config.key_patterns)
            })?;
            Some(set)
        };
        debug!(
            patterns = config.key_patterns.len(),
            exclude_expired = config.exclude_expired,
            now_ms = config.now_ms,
            "filter ready"
        );
        Ok(Self {
            patterns,
            exclude_expired: config.exclude_expired,
            now_ms: config.now_ms,
        })
    }

    /// A key passes if there are no patterns or any pattern matches.
    #[must_use]
    pub fn matches_key(&self, key: &[u8]) -> bool {
        self.patterns.as_ref().map_or(true, |set| set.is_match(key))
    }

    #[must_use]
    pub fn accepts(&self, entry: &Entry) -> bool {
        if self.exclude_expired && entry.is_expired_at(self.now_ms) {
            return false;
        }
        self.matches_key(&entry.key)
    }
}

/// The projected view of an entry handed to consumers.
///
/// A `None` attribute was either not projected or, for `expire_at_ms` and
/// `value`, not present in the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub db: Option<u64>,
    pub key: Option<Vec<u8>>,
    pub expire_at_ms: Option<i64>,
    pub size: Option<u64>,
    pub kind: Option<ObjectType>,
    pub encoding: Option<Encoding>,
    pub value: Option<Value>,
}

impl Record {
    /// Every attribute of `entry`.
    #[must_use]
    pub fn full(entry: Entry) -> Self {
        Self {
            db: Some(entry.db),
            size: Some(entry.size()),
            key: Some(entry.key),
            expire_at_ms: entry.expire_at_ms,
            kind: Some(entry.kind),
            encoding: Some(entry.encoding),
            value: entry.value,
        }
    }

    /// Only the attributes listed in `fields`.
    #[must_use]
    pub fn project(entry: Entry, fields: &[Field]) -> Self {
        let keep = |f: Field| fields.contains(&f);
        Self {
            db: keep(Field::Db).then_some(entry.db),
            size: keep(Field::Size).then(|| entry.size()),
            kind: keep(Field::Type).then_some(entry.kind),
            encoding: keep(Field::Encoding).then_some(entry.encoding),
            expire_at_ms: entry.expire_at_ms.filter(|_| keep(Field::Expiration)),
            key: keep(Field::Key).then_some(entry.key),
            value: entry.value.filter(|_| keep(Field::Value)),
        }
    }

    /// Key as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn key_lossy(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }
}

/// Receives the records that survive filtering.
pub trait RecordHandler {
    fn on_record(&mut self, record: Record) -> Result<()>;

    /// Called once after the last record with the checksum outcome.
    fn on_end(&mut self, _status: ChecksumStatus) -> Result<()> {
        Ok(())
    }

    /// Called instead of `on_end` when the decode fails part way. Records
    /// already delivered should still be written out.
    fn on_abort(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<H: RecordHandler + ?Sized> RecordHandler for &mut H {
    fn on_record(&mut self, record: Record) -> Result<()> {
        (**self).on_record(record)
    }

    fn on_end(&mut self, status: ChecksumStatus) -> Result<()> {
        (**self).on_end(status)
    }

    fn on_abort(&mut self) -> Result<()> {
        (**self).on_abort()
    }
}

/// Filters and projects decoded entries for a [`RecordHandler`].
///
/// A consumer error stops the decode at the current entry; it is kept and
/// returned by [`Pipeline::finish`].
pub struct Pipeline<H> {
    filter: Filter,
    fields: Option<Vec<Field>>,
    handler: H,
    forwarded: u64,
    skipped: u64,
    error: Option<anyhow::Error>,
}

impl<H: RecordHandler> Pipeline<H> {
    pub fn new(config: &DecodeConfig, handler: H) -> Result<Self> {
        Ok(Self {
            filter: Filter::new(config)?,
            fields: config.fields.clone(),
            handler,
            forwarded: 0,
            skipped: 0,
            error: None,
        })
    }

    #[must_use]
    pub fn forwarded(&self) -> u64 {
        self.forwarded
    }

    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Returns the handler, or the first error it raised.
    pub fn finish(self) -> Result<H> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.handler),
        }
    }

    /// Lets the consumer flush what it holds after a failed decode.
    pub fn abort(&mut self) -> Result<()> {
        self.handler.on_abort()
    }

    fn record(&self, entry: Entry) -> Record {
        match &self.fields {
            Some(fields) => Record::project(entry, fields),
            None => Record::full(entry),
        }
    }
}

impl<H: RecordHandler> RdbHandler for Pipeline<H> {
    fn on_entry(&mut self, entry: Entry) -> ControlFlow<()> {
        if !self.filter.accepts(&entry) {
            self.skipped += 1;
            return ControlFlow::Continue(());
        }
        let record = self.record(entry);
        match self.handler.on_record(record) {
            Ok(()) => {
                self.forwarded += 1;
                ControlFlow::Continue(())
            }
            Err(e) => {
                self.error = Some(e);
                ControlFlow::Break(())
            }
        }
    }

    fn on_end(&mut self, status: ChecksumStatus) {
        if let Err(e) = self.handler.on_end(status) {
            self.error = Some(e);
        }
    }
}

/// Totals for one filtered decode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeReport {
    /// Entries decoded from the input.
    pub entries: u64,
    /// Entries handed to the consumer.
    pub forwarded: u64,
    /// Entries dropped by key pattern or expiry.
    pub skipped: u64,
    pub checksum: Option<ChecksumStatus>,
}

/// Decodes `input` through a [`Pipeline`] built from `config`.
pub fn decode_reader<R, H>(input: R, config: &DecodeConfig, handler: H) -> Result<DecodeReport>
where
    R: Read,
    H: RecordHandler,
{
    let mut pipeline = Pipeline::new(config, handler)?;
    let summary = match rdb::decode(input, &mut pipeline, config.key_only) {
        Ok(summary) => summary,
        Err(abort) => {
            if let Err(e) = pipeline.abort() {
                warn!(error = %e, "flushing partial output failed");
            }
            return Err(abort.into());
        }
    };
    let forwarded = pipeline.forwarded();
    let skipped = pipeline.skipped();
    pipeline.finish()?;
    Ok(DecodeReport {
        entries: summary.entries,
        forwarded,
        skipped,
        checksum: summary.checksum,
    })
}

/// Opens the snapshot at `path` and decodes it through a [`Pipeline`].
pub fn decode_file<P, H>(path: P, config: &DecodeConfig, handler: H) -> Result<DecodeReport>
where
    P: AsRef<Path>,
    H: RecordHandler,
{
    let path = path.as_ref();
    let input = rdb::open(path).with_context(|| format!("opening {}", path.display()))?;
    let report = decode_reader(input, config, handler)
        .with_context(|| format!("decoding {}", path.display()))?;
    info!(
        path = %path.display(),
        entries = report.entries,
        forwarded = report.forwarded,
        skipped = report.skipped,
        "decode finished"
    );
    Ok(report)
}
