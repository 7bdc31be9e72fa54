//! Top-level packet entry: block splitting and record dispatch.
//!
//! A single datagram or file chunk may hold several concatenated ASTERIX
//! data blocks; each block holds one or more records of one category. The
//! dispatcher validates each block's header, extracts each record's FSPEC,
//! and hands (fspec, payload) pairs to the registered category handler.
//!
//! Failure policy: a bad block length discards the rest of the packet, a
//! bad record discards the rest of its block, and every failure lands in a
//! counter. Nothing here panics on hostile input.

use std::sync::Arc;
use std::time::SystemTime;

use crate::category::CategoryHandler;
use crate::stats::{AsterixStats, AsterixStatsSnapshot};
use crate::types::{FX_BIT, HEADER_SIZE, MAX_CATEGORIES, MAX_FSPEC_BYTES, MIN_BLOCK_SIZE};

/// Decodes buffers of concatenated ASTERIX blocks and routes records to
/// category handlers.
///
/// Registration is single-threaded setup (`&mut self`); after that any
/// number of producer threads may call [`handle_packet`](Self::handle_packet)
/// concurrently — all shared state behind it is atomic or internally locked.
pub struct PacketDispatcher {
    categories: [Option<Box<dyn CategoryHandler>>; MAX_CATEGORIES],
    stats: Arc<AsterixStats>,
}

impl Default for PacketDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketDispatcher {
    pub fn new() -> Self {
        PacketDispatcher {
            categories: std::array::from_fn(|_| None),
            stats: Arc::new(AsterixStats::default()),
        }
    }

    /// Install `handler` for category `cat`, replacing any previous one.
    /// The central counters are linked in before the handler is reachable.
    pub fn register_category(&mut self, cat: u8, mut handler: Box<dyn CategoryHandler>) {
        handler.attach_stats(Arc::clone(&self.stats));
        self.categories[cat as usize] = Some(handler);
    }

    /// Process one buffer of concatenated data blocks.
    ///
    /// `rx` is the moment the buffer was received; category handlers use it
    /// as the time reference of last resort (see CAT 001).
    pub fn handle_packet(&self, data: &[u8], rx: SystemTime) {
        AsterixStats::bump(&self.stats.total_packets);
        if data.is_empty() {
            return;
        }

        let mut buffer = data;
        while buffer.len() >= MIN_BLOCK_SIZE {
            let block_length = self.process_block(buffer, rx);
            if block_length == 0 {
                // Bad length prefix: the stream position cannot be trusted,
                // discard the remainder without trailing-byte accounting.
                AsterixStats::bump(&self.stats.malformed_blocks);
                return;
            }
            buffer = &buffer[block_length..];
        }

        if !buffer.is_empty() {
            self.stats
                .trailing_bytes_count
                .fetch_add(buffer.len() as u64, std::sync::atomic::Ordering::Relaxed);
        }
    }

    /// Shared view of the live counters.
    pub fn stats(&self) -> &AsterixStats {
        &self.stats
    }

    /// Copyable point-in-time counter values.
    pub fn stats_snapshot(&self) -> AsterixStatsSnapshot {
        self.stats.snapshot()
    }

    /// Parse one block header and run its records. Returns the block's
    /// declared length (the caller's advance), or 0 when the header is
    /// invalid.
    fn process_block(&self, block: &[u8], rx: SystemTime) -> usize {
        if block.len() < HEADER_SIZE {
            return 0;
        }

        let category = block[0];
        let declared_length = usize::from(u16::from_be_bytes([block[1], block[2]]));

        // The length indicator includes the header and must fit the buffer.
        if declared_length < HEADER_SIZE || declared_length > block.len() {
            return 0;
        }

        let Some(handler) = &self.categories[category as usize] else {
            AsterixStats::bump(&self.stats.unhandled_categories);
            return declared_length;
        };

        let mut offset = HEADER_SIZE;
        while offset < declared_length {
            let consumed = self.dispatch_record(&block[offset..declared_length], handler.as_ref(), rx);
            if consumed == 0 {
                // Without this record's extent the rest of the block is
                // unaligned; skip to the next block.
                AsterixStats::bump(&self.stats.record_parse_errors);
                break;
            }
            offset += consumed;
        }

        declared_length
    }

    /// Find the record's FSPEC extent and hand it to the category handler.
    /// Returns total bytes consumed by the record, or 0 on error.
    fn dispatch_record(&self, record: &[u8], handler: &dyn CategoryHandler, rx: SystemTime) -> usize {
        let mut fspec_len = 0usize;
        let mut last_data_idx = 0usize;
        let mut last_data_value = 0u8;

        loop {
            if fspec_len >= record.len() || fspec_len >= MAX_FSPEC_BYTES {
                return 0;
            }

            let current = record[fspec_len];

            // Remember the furthest byte with an actual data bit set.
            if current > 1 {
                last_data_idx = fspec_len;
                last_data_value = current;
            }

            fspec_len += 1;

            if current & FX_BIT == 0 {
                break;
            }
        }

        // The furthest flagged FRN must not exceed 128: that is 18 full
        // FSPEC bytes plus bits 7-6 of the 19th.
        if last_data_value > 0 {
            if last_data_idx > 18 {
                return 0;
            }
            if last_data_idx == 18 && last_data_value & 0x3E != 0 {
                return 0;
            }
        }

        let (fspec, payload) = record.split_at(fspec_len);

        let consumed = handler.process_record(fspec, payload, rx);
        if consumed > 0 {
            fspec_len + consumed
        } else {
            0
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
