//! Shared types, wire constants, and the error taxonomy for asterix-core.

use serde::Serialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// ASTERIX block header: CAT (1 byte) + length indicator (2 bytes, BE).
pub const HEADER_SIZE: usize = 3;

/// Absolute minimum size of a valid data block:
/// CAT(1) + LEN(2) + FSPEC(1) + DATA(1).
pub const MIN_BLOCK_SIZE: usize = 5;

/// Maximum number of FSPEC bytes scanned before a record is rejected.
pub const MAX_FSPEC_BYTES: usize = 10;

/// Maximum Field Record Number supported by the flat handler table.
/// 128 covers all standard categories (the largest use ~70-80 FRNs).
pub const MAX_FRNS: usize = 128;

/// Number of ASTERIX categories (0-255).
pub const MAX_CATEGORIES: usize = 256;

/// Low bit of an FSPEC byte or extended-length octet: "continues".
pub const FX_BIT: u8 = 0x01;

// ---------------------------------------------------------------------------
// Source identity
// ---------------------------------------------------------------------------

/// (SAC, SIC) pair uniquely identifying a radar or service sensor.
///
/// Ordering is lexicographic (SAC first), which the derived impls provide
/// from field order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SourceIdentifier {
    /// System Area Code.
    pub sac: u8,
    /// System Identification Code.
    pub sic: u8,
}

impl SourceIdentifier {
    pub fn new(sac: u8, sic: u8) -> Self {
        SourceIdentifier { sac, sic }
    }
}

impl std::fmt::Display for SourceIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.sac, self.sic)
    }
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// All fail conditions produced while decoding.
///
/// These never cross the public boundary: each one increments its counter in
/// [`AsterixStats`](crate::stats::AsterixStats) and aborts the smallest
/// recoverable unit (block, record, or item).
#[derive(Debug, Error)]
pub enum AsterixError {
    #[error("payload shorter than the size reported for {0}")]
    NotEnoughData(&'static str),
    #[error("data block header rejected")]
    MalformedBlock,
    #[error("record FSPEC walk exhausted the payload")]
    MalformedRecord,
    #[error("protocol violation in {0}")]
    ProtocolViolation(&'static str),
    #[error("no handler registered for category {0}")]
    UnhandledCategory(u8),
    #[error("no decoder registered for FRN {0}")]
    UnhandledItem(u8),
}

impl AsterixError {
    /// The diagnostics counter this fail condition feeds.
    pub fn counter<'a>(
        &self,
        stats: &'a crate::stats::AsterixStats,
    ) -> &'a std::sync::atomic::AtomicU64 {
        match self {
            AsterixError::NotEnoughData(_) | AsterixError::MalformedRecord => {
                &stats.malformed_records
            }
            AsterixError::MalformedBlock => &stats.malformed_blocks,
            AsterixError::ProtocolViolation(_) => &stats.protocol_violations,
            AsterixError::UnhandledCategory(_) => &stats.unhandled_categories,
            AsterixError::UnhandledItem(_) => &stats.unhandled_items,
        }
    }
}

pub type Result<T> = std::result::Result<T, AsterixError>;

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_identifier_ordering() {
        let a = SourceIdentifier::new(1, 200);
        let b = SourceIdentifier::new(2, 0);
        assert!(a < b); // SAC dominates
        assert!(SourceIdentifier::new(1, 2) < SourceIdentifier::new(1, 3));
    }

    #[test]
    fn test_source_identifier_display() {
        assert_eq!(SourceIdentifier::new(25, 14).to_string(), "25/14");
    }
}
