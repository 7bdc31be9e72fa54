//! Stream-level diagnostic counters.
//!
//! The counters are observational only — nothing in the decode path reads
//! them back — so every access uses relaxed ordering. The block is
//! cache-line aligned to keep concurrent producers from false sharing with
//! neighbouring state.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Process-lifetime decoder counters. Shared by reference (`Arc`) between
/// the dispatcher and every registered category handler.
#[derive(Debug, Default)]
#[repr(align(64))]
pub struct AsterixStats {
    /// Buffers handed to `handle_packet`.
    pub total_packets: AtomicU64,
    /// Bytes left over after the last complete block of a packet.
    pub trailing_bytes_count: AtomicU64,
    /// Blocks whose category had no registered handler.
    pub unhandled_categories: AtomicU64,
    /// Blocks with an invalid length prefix.
    pub malformed_blocks: AtomicU64,
    /// Records whose FSPEC walk ran out of payload or FSPEC.
    pub malformed_records: AtomicU64,
    /// Records rejected before the category handler ran (FSPEC extent).
    pub record_parse_errors: AtomicU64,
    /// Records missing a mandatory item or rejected by an item decoder.
    pub protocol_violations: AtomicU64,
    /// Records carrying an FSPEC bit with no registered decoder.
    pub unhandled_items: AtomicU64,
}

impl AsterixStats {
    /// Bump one counter. All increments in the crate go through here.
    #[inline]
    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of every counter. Unsynchronised by design: each
    /// value is individually coherent, the set as a whole is approximate.
    pub fn snapshot(&self) -> AsterixStatsSnapshot {
        AsterixStatsSnapshot {
            total_packets: self.total_packets.load(Ordering::Relaxed),
            trailing_bytes_count: self.trailing_bytes_count.load(Ordering::Relaxed),
            unhandled_categories: self.unhandled_categories.load(Ordering::Relaxed),
            malformed_blocks: self.malformed_blocks.load(Ordering::Relaxed),
            malformed_records: self.malformed_records.load(Ordering::Relaxed),
            record_parse_errors: self.record_parse_errors.load(Ordering::Relaxed),
            protocol_violations: self.protocol_violations.load(Ordering::Relaxed),
            unhandled_items: self.unhandled_items.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter.
    pub fn reset(&self) {
        self.total_packets.store(0, Ordering::Relaxed);
        self.trailing_bytes_count.store(0, Ordering::Relaxed);
        self.unhandled_categories.store(0, Ordering::Relaxed);
        self.malformed_blocks.store(0, Ordering::Relaxed);
        self.malformed_records.store(0, Ordering::Relaxed);
        self.record_parse_errors.store(0, Ordering::Relaxed);
        self.protocol_violations.store(0, Ordering::Relaxed);
        self.unhandled_items.store(0, Ordering::Relaxed);
    }
}

/// Copyable snapshot of [`AsterixStats`], fit for printing or serializing.
/// Serialized field names match the wire-level counter names
/// (`totalPackets`, `trailingBytesCount`, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AsterixStatsSnapshot {
    pub total_packets: u64,
    pub trailing_bytes_count: u64,
    pub unhandled_categories: u64,
    pub malformed_blocks: u64,
    pub malformed_records: u64,
    pub record_parse_errors: u64,
    pub protocol_violations: u64,
    pub unhandled_items: u64,
}

impl AsterixStatsSnapshot {
    /// Total records that failed to decode for any reason.
    pub fn failed_records(&self) -> u64 {
        self.malformed_records
            + self.record_parse_errors
            + self.protocol_violations
            + self.unhandled_items
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
