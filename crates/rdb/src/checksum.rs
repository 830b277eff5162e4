//! Running CRC-64 over consumed input and the trailing-field comparison.

use crc::{Crc, Digest, CRC_64_REDIS};

use crate::model::ChecksumStatus;

/// CRC-64 with the Jones polynomial, reflected, as written by the producer.
pub static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_REDIS);

/// Incremental checksum accumulator fed by the cursor.
#[derive(Clone)]
pub struct Checksum {
    digest: Digest<'static, u64>,
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Checksum({:#018x})", self.value())
    }
}

impl Checksum {
    pub fn new() -> Self {
        Self {
            digest: CRC64.digest(),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        self.digest.update(bytes);
    }

    /// Checksum of everything fed so far; the accumulator keeps running.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.digest.clone().finalize()
    }

    /// Compares the running value against the stored trailing field.
    ///
    /// An all-zero field means the producer disabled checksums.
    #[must_use]
    pub fn verify(&self, stored: u64) -> ChecksumStatus {
        if stored == 0 {
            return ChecksumStatus::Skipped;
        }
        let actual = self.value();
        if actual == stored {
            ChecksumStatus::Valid
        } else {
            ChecksumStatus::Mismatch {
                expected: stored,
                actual,
            }
        }
    }
}

impl Default for Checksum {
    fn default() -> Self {
        Self::new()
    }
}
