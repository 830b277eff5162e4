//! Top-N ranking of keys by serialized size.
//!
//! A min-heap holds at most N candidates; the smallest is evicted whenever
//! a larger key arrives, so memory stays O(N) however large the snapshot.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::io::Write;

use anyhow::{Context, Result};
use filter::{Record, RecordHandler};

use crate::memory::{csv_row, HEADER};

/// One ranked key.
#[derive(Debug, Clone)]
pub struct Ranked {
    pub size: u64,
    /// Arrival order, used to break ties in favour of earlier keys.
    pub seq: u64,
    pub record: Record,
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.size == other.size && self.seq == other.seq
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the smallest size (and, on a
        // tie, the latest arrival) sits on top and is evicted first.
        other
            .size
            .cmp(&self.size)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Keeps the `n` largest records seen.
pub struct TopN {
    n: usize,
    heap: BinaryHeap<Ranked>,
    seen: u64,
}

impl TopN {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            heap: BinaryHeap::with_capacity(n.min(4096)),
            seen: 0,
        }
    }

    pub fn push(&mut self, record: Record) {
        let ranked = Ranked {
            size: record.size.unwrap_or(0),
            seq: self.seen,
            record,
        };
        self.seen += 1;
        if self.n == 0 {
            return;
        }
        if self.heap.len() < self.n {
            self.heap.push(ranked);
        } else if let Some(mut smallest) = self.heap.peek_mut() {
            if ranked.size > smallest.size {
                *smallest = ranked;
            }
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// The ranked records, largest first.
    #[must_use]
    pub fn into_sorted(self) -> Vec<Ranked> {
        // Ascending in the inverted order is descending by size.
        self.heap.into_sorted_vec()
    }

    /// Writes the ranking as CSV in the memory report layout.
    pub fn write_csv<W: Write>(self, mut out: W) -> Result<()> {
        writeln!(out, "{}", HEADER).context("writing csv header")?;
        for ranked in self.into_sorted() {
            writeln!(out, "{}", csv_row(&ranked.record)).context("writing csv row")?;
        }
        out.flush().context("flushing csv")
    }
}

impl RecordHandler for TopN {
    fn on_record(&mut self, record: Record) -> Result<()> {
        self.push(record);
        Ok(())
    }
}
