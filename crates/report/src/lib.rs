//! # Report - consumers of decoded snapshots
//!
//! Each consumer is a [`filter::RecordHandler`] that turns the filtered
//! record stream into one output format:
//!
//! ```text
//! json.rs        JSON array, one object per key
//! ssv.rs         space-separated lines of projected fields
//! aof.rs         RESP commands that rebuild the dataset
//! memory.rs      per-key size CSV
//! bigkey.rs      N largest keys (bounded min-heap)
//! flamegraph.rs  key-prefix size tree
//! server.rs      HTTP service for the flame graph page
//! ```

pub mod aof;
pub mod bigkey;
pub mod flamegraph;
pub mod json;
pub mod memory;
pub mod server;
pub mod ssv;

pub use aof::AofWriter;
pub use bigkey::{Ranked, TopN};
pub use flamegraph::{FlameNode, FlameTree};
pub use json::JsonExporter;
pub use memory::MemoryReport;
pub use server::FlameServer;
pub use ssv::SsvExporter;

/// Lossy text form of a byte string.
pub(crate) fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Formats a byte count with a binary unit: `512B`, `1.5K`, `20.0M`.
#[must_use]
pub fn readable_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["K", "M", "G", "T", "P"];
    if bytes < 1024 {
        return format!("{}B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1}{}", value, UNITS[unit])
}

/// Quotes a CSV cell when it contains a delimiter, quote or line break.
pub(crate) fn csv_cell(cell: &str) -> String {
    if cell.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

#[cfg(test)]
mod tests;
