//! LZF block decompression.
//!
//! Each control byte selects one of two instructions:
//!
//! ```text
//! 000LLLLL                    literal run: copy L+1 bytes from input
//! LLLooooo [l] oooooooo       back-reference: len = LLL (+ l when LLL == 7) + 2,
//!                             offset = (ooooo << 8 | oooooooo) + 1
//! ```

/// Decompresses `input` into a buffer of exactly `expected_len` bytes.
///
/// Returns a description of the first inconsistency found: a back-reference
/// reaching before the start of the output, output overrunning
/// `expected_len`, a truncated instruction, or a short result.
pub fn decompress(input: &[u8], expected_len: usize) -> Result<Vec<u8>, String> {
    // Cap the up-front allocation; the output grows as instructions run.
    let mut out = Vec::with_capacity(expected_len.min(input.len().saturating_mul(4).max(64)));
    let mut ip = 0;

    while ip < input.len() {
        let ctrl = input[ip] as usize;
        ip += 1;

        if ctrl < 32 {
            let run = ctrl + 1;
            if ip + run > input.len() {
                return Err(format!(
                    "literal run of {} bytes at input {} exceeds block",
                    run,
                    ip - 1
                ));
            }
            if out.len() + run > expected_len {
                return Err(format!(
                    "literal run overflows declared length {}",
                    expected_len
                ));
            }
            out.extend_from_slice(&input[ip..ip + run]);
            ip += run;
            continue;
        }

        let mut len = ctrl >> 5;
        if len == 7 {
            let extra = *input
                .get(ip)
                .ok_or_else(|| "missing extended length byte".to_string())?;
            len += extra as usize;
            ip += 1;
        }
        let low = *input
            .get(ip)
            .ok_or_else(|| "missing back-reference offset byte".to_string())?;
        ip += 1;
        len += 2;

        let distance = (((ctrl & 0x1F) << 8) | low as usize) + 1;
        if distance > out.len() {
            return Err(format!(
                "back-reference distance {} before start of output (len {})",
                distance,
                out.len()
            ));
        }
        if out.len() + len > expected_len {
            return Err(format!(
                "back-reference overflows declared length {}",
                expected_len
            ));
        }

        // Source and destination may overlap, so copy byte by byte.
        let mut src = out.len() - distance;
        for _ in 0..len {
            let b = out[src];
            out.push(b);
            src += 1;
        }
    }

    if out.len() != expected_len {
        return Err(format!(
            "decompressed {} bytes, expected {}",
            out.len(),
            expected_len
        ));
    }
    Ok(out)
}
