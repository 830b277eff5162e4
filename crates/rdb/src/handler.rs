//! Push-style decoding: drive an [`RdbReader`] to completion and hand each
//! record to an [`RdbHandler`].

use std::io::Read;
use std::ops::ControlFlow;

use crate::containers::module::ModuleAux;
use crate::error::DecodeAbort;
use crate::model::{ChecksumStatus, Entry};
use crate::reader::{Event, RdbReader};

/// Receives decoded records in file order.
///
/// Every method except [`on_entry`](RdbHandler::on_entry) has a no-op
/// default. Returning `ControlFlow::Break` from `on_entry` stops the pass at
/// that entry boundary; the input is released when [`decode`] returns.
pub trait RdbHandler {
    fn on_select_db(&mut self, _db: u64) {}

    fn on_resize_db(&mut self, _db_size: u64, _expires_size: u64) {}

    fn on_aux(&mut self, _key: &[u8], _value: &[u8]) {}

    fn on_function(&mut self, _code: &[u8]) {}

    fn on_module_aux(&mut self, _aux: &ModuleAux) {}

    fn on_entry(&mut self, entry: Entry) -> ControlFlow<()>;

    fn on_end(&mut self, _status: ChecksumStatus) {}
}

/// Outcome of a decode pass that did not hit an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeSummary {
    /// Entries handed to the handler.
    pub entries: u64,
    /// `None` if the handler stopped before the end-of-stream record.
    pub checksum: Option<ChecksumStatus>,
}

/// Decodes `input` start to finish, feeding `handler`.
///
/// # Errors
///
/// Returns [`DecodeAbort`] on the first decode error. Entries already passed
/// to the handler remain valid; `entries_delivered` says how many there were.
pub fn decode<R, H>(input: R, handler: &mut H, skip_values: bool) -> Result<DecodeSummary, DecodeAbort>
where
    R: Read,
    H: RdbHandler + ?Sized,
{
    let mut reader = RdbReader::new(input).skip_values(skip_values);
    let mut entries = 0u64;
    loop {
        let event = match reader.next_event() {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(error) => {
                return Err(DecodeAbort {
                    error,
                    entries_delivered: entries,
                })
            }
        };
        match event {
            Event::SelectDb(db) => handler.on_select_db(db),
            Event::ResizeDb {
                db_size,
                expires_size,
            } => handler.on_resize_db(db_size, expires_size),
            Event::SlotInfo { .. } => {}
            Event::Aux { key, value } => handler.on_aux(&key, &value),
            Event::Function(code) => handler.on_function(&code),
            Event::ModuleAux(aux) => handler.on_module_aux(&aux),
            Event::Entry(entry) => {
                entries += 1;
                if handler.on_entry(entry).is_break() {
                    return Ok(DecodeSummary {
                        entries,
                        checksum: None,
                    });
                }
            }
            Event::End(status) => {
                handler.on_end(status);
                return Ok(DecodeSummary {
                    entries,
                    checksum: Some(status),
                });
            }
        }
    }
    Ok(DecodeSummary {
        entries,
        checksum: None,
    })
}

impl<F> RdbHandler for F
where
    F: FnMut(Entry) -> ControlFlow<()>,
{
    fn on_entry(&mut self, entry: Entry) -> ControlFlow<()> {
        self(entry)
    }
}
