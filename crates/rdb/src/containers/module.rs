//! Module payloads, captured without interpretation.
//!
//! Version-2 module values frame their content as a stream of typed
//! opcodes ending in `0`, so the payload length is known without the
//! module's own schema. The bytes are kept exactly as stored.

use std::io::Read;

use crate::cursor::Cursor;
use crate::error::{RdbError, Result};
use crate::format::{
    MODULE_OPCODE_DOUBLE, MODULE_OPCODE_EOF, MODULE_OPCODE_FLOAT, MODULE_OPCODE_SINT,
    MODULE_OPCODE_STRING, MODULE_OPCODE_UINT,
};
use crate::length::read_length;
use crate::model::ModuleId;
use crate::string::skip_string;

/// Walks a module opcode stream up to and including its EOF marker.
fn walk_opcodes<R: Read>(cursor: &mut Cursor<R>) -> Result<()> {
    loop {
        let offset = cursor.position();
        match read_length(cursor)? {
            MODULE_OPCODE_EOF => return Ok(()),
            MODULE_OPCODE_SINT | MODULE_OPCODE_UINT => {
                read_length(cursor)?;
            }
            MODULE_OPCODE_FLOAT => cursor.skip(4)?,
            MODULE_OPCODE_DOUBLE => cursor.skip(8)?,
            MODULE_OPCODE_STRING => {
                skip_string(cursor)?;
            }
            other => {
                return Err(RdbError::corrupt(
                    offset,
                    format!("unknown module opcode {}", other),
                ))
            }
        }
    }
}

/// Reads a module id followed by its opcode stream.
///
/// With `capture` set the opcode stream is returned byte-for-byte.
pub fn read_module_value<R: Read>(
    cursor: &mut Cursor<R>,
    capture: bool,
) -> Result<(ModuleId, Vec<u8>)> {
    let module = ModuleId::from_raw(read_length(cursor)?);
    if !capture {
        walk_opcodes(cursor)?;
        return Ok((module, Vec::new()));
    }
    cursor.start_capture();
    let walked = walk_opcodes(cursor);
    let raw = cursor.finish_capture();
    walked?;
    Ok((module, raw))
}

/// Auxiliary data a module stored outside any key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleAux {
    pub module: ModuleId,
    pub when: u64,
    pub raw: Vec<u8>,
}

/// Reads the body of a module-aux record.
pub fn read_module_aux<R: Read>(cursor: &mut Cursor<R>) -> Result<ModuleAux> {
    let module = ModuleId::from_raw(read_length(cursor)?);
    let when_opcode_offset = cursor.position();
    let when_opcode = read_length(cursor)?;
    if when_opcode != MODULE_OPCODE_UINT {
        return Err(RdbError::corrupt(
            when_opcode_offset,
            format!("module aux 'when' opcode {} is not uint", when_opcode),
        ));
    }
    let when = read_length(cursor)?;
    cursor.start_capture();
    let walked = walk_opcodes(cursor);
    let raw = cursor.finish_capture();
    walked?;
    Ok(ModuleAux { module, when, raw })
}
