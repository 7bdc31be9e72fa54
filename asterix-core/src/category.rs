//! Per-category record pipeline: handler table, mandatory mask, FSPEC walk.

use std::sync::Arc;
use std::time::SystemTime;

use crate::item::FieldHandler;
use crate::stats::AsterixStats;
use crate::types::{AsterixError, FX_BIT, MAX_FRNS};

/// Widest mandatory mask we precompute; covers FRNs well past [`MAX_FRNS`].
const MANDATORY_MASK_BYTES: usize = 20;

/// Object-safe face a category handler presents to the packet dispatcher.
///
/// `rx` is the receive timestamp of the packet the record arrived in;
/// categories that reconstruct time use it as a last-resort reference.
pub trait CategoryHandler: Send + Sync {
    /// Link the dispatcher's central counters into this handler. Called once
    /// during registration, before the handler becomes reachable.
    fn attach_stats(&mut self, stats: Arc<AsterixStats>);

    /// Decode one record. Returns payload bytes consumed, or 0 on any
    /// failure (the counters say which kind).
    fn process_record(&self, fspec: &[u8], payload: &[u8], rx: SystemTime) -> usize;
}

/// FRN-indexed decode table shared by all concrete category handlers,
/// generic in the report type it populates.
///
/// The slot array is both lookup and owner: index `FRN - 1` holds the boxed
/// handler, and replacing a registration drops the previous owner in the
/// same assignment, so no two slots can ever alias one handler.
pub struct CategoryDecoder<R> {
    slots: [Option<Box<dyn FieldHandler<R>>>; MAX_FRNS],
    mandatory_fspec: [u8; MANDATORY_MASK_BYTES],
    /// Highest mask byte index touched + 1.
    mandatory_fspec_size: usize,
    stats: Arc<AsterixStats>,
}

impl<R> Default for CategoryDecoder<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> CategoryDecoder<R> {
    pub fn new() -> Self {
        CategoryDecoder {
            slots: std::array::from_fn(|_| None),
            mandatory_fspec: [0; MANDATORY_MASK_BYTES],
            mandatory_fspec_size: 0,
            stats: Arc::new(AsterixStats::default()),
        }
    }

    /// Install `handler` at `frn` (1-based). An out-of-range FRN is ignored;
    /// an occupied slot is replaced. Mandatory bits accumulate in the mask
    /// and are never cleared, so re-registering any set of handlers leaves
    /// the mask unchanged.
    pub fn add_handler(&mut self, handler: Box<dyn FieldHandler<R>>, frn: u8) {
        let frn = frn as usize;
        if frn == 0 || frn > MAX_FRNS {
            return;
        }

        if handler.mandatory() {
            let byte_idx = (frn - 1) / 7;
            let bit_idx = 7 - ((frn - 1) % 7); // bits 7 down to 1
            self.mandatory_fspec[byte_idx] |= 1 << bit_idx;
            self.mandatory_fspec_size = self.mandatory_fspec_size.max(byte_idx + 1);
        }

        self.slots[frn - 1] = Some(handler);
    }

    pub fn attach_stats(&mut self, stats: Arc<AsterixStats>) {
        self.stats = stats;
    }

    pub fn stats(&self) -> &Arc<AsterixStats> {
        &self.stats
    }

    /// Mandatory-mask prefix in use, for conformance checks and tests.
    pub fn mandatory_mask(&self) -> &[u8] {
        &self.mandatory_fspec[..self.mandatory_fspec_size]
    }

    /// Walk the FSPEC and dispatch each flagged item to its handler.
    ///
    /// Returns payload bytes consumed, or 0 after incrementing the counter
    /// matching the failure. Handlers observe items in FRN-ascending order.
    pub fn process(&self, fspec: &[u8], payload: &[u8], report: &mut R) -> usize {
        let stats = &self.stats;

        // Mandatory items first: cheap length gate, then bit-level check.
        // (required & !received) flags mandatory bits absent from the FSPEC.
        if fspec.len() < self.mandatory_fspec_size {
            AsterixStats::bump(&stats.protocol_violations);
            return 0;
        }
        for i in 0..self.mandatory_fspec_size {
            if self.mandatory_fspec[i] & !fspec[i] != 0 {
                AsterixStats::bump(&stats.protocol_violations);
                return 0;
            }
        }

        let mut frn_base: u16 = 1;
        let mut remaining = payload;

        for &fspec_byte in fspec {
            let mut item_bits = fspec_byte & !FX_BIT;

            while item_bits != 0 {
                // Index of the highest set bit: 0 = bit 7 (lowest FRN).
                let offset = item_bits.leading_zeros() as u16;
                let current_frn = frn_base + offset;

                if current_frn as usize > MAX_FRNS {
                    AsterixStats::bump(&stats.protocol_violations);
                    return 0;
                }

                let Some(handler) = &self.slots[current_frn as usize - 1] else {
                    // Without the item's size the rest of the payload is
                    // unaligned; skip the whole record.
                    AsterixStats::bump(&stats.unhandled_items);
                    return 0;
                };

                let item_size = handler.size(remaining);
                if item_size == 0 || item_size > remaining.len() {
                    AsterixStats::bump(&stats.malformed_records);
                    return 0;
                }

                if let Err(err) = handler.decode(report, &remaining[..item_size]) {
                    AsterixStats::bump(err.counter(stats));
                    return 0;
                }
                remaining = &remaining[item_size..];

                item_bits &= !(0x80 >> offset);
            }

            if fspec_byte & FX_BIT == 0 {
                return payload.len() - remaining.len();
            }
            frn_base += 7;
        }

        // Every FSPEC byte carried FX=1: the bitmap never terminated.
        AsterixStats::bump(&stats.malformed_records);
        0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::extended_size;
    use crate::types::Result;

    /// Minimal report for exercising the walk.
    #[derive(Default)]
    struct Probe {
        bytes: Vec<u8>,
        decodes: usize,
    }

    struct FixedProbe {
        len: usize,
        mandatory: bool,
    }

    impl FieldHandler<Probe> for FixedProbe {
        fn name(&self) -> &'static str {
            "probe fixed"
        }
        fn mandatory(&self) -> bool {
            self.mandatory
        }
        fn size(&self, _data: &[u8]) -> usize {
            self.len
        }
        fn decode(&self, report: &mut Probe, data: &[u8]) -> Result<()> {
            report.bytes.extend_from_slice(data);
            report.decodes += 1;
            Ok(())
        }
    }

    struct ExtendedProbe;

    impl FieldHandler<Probe> for ExtendedProbe {
        fn name(&self) -> &'static str {
            "probe extended"
        }
        fn size(&self, data: &[u8]) -> usize {
            extended_size(data, 1, 1)
        }
        fn decode(&self, report: &mut Probe, data: &[u8]) -> Result<()> {
            report.bytes.extend_from_slice(data);
            report.decodes += 1;
            Ok(())
        }
    }

    fn decoder() -> CategoryDecoder<Probe> {
        let mut d = CategoryDecoder::new();
        d.add_handler(Box::new(FixedProbe { len: 2, mandatory: true }), 1);
        d.add_handler(Box::new(ExtendedProbe), 2);
        d.add_handler(Box::new(FixedProbe { len: 1, mandatory: false }), 8);
        d
    }

    #[test]
    fn test_walk_single_fspec_byte() {
        let d = decoder();
        let mut report = Probe::default();
        // FRN 1 and 2 set, FX clear
        let consumed = d.process(&[0xC0], &[0x11, 0x22, 0x00], &mut report);
        assert_eq!(consumed, 3);
        assert_eq!(report.bytes, vec![0x11, 0x22, 0x00]);
        assert_eq!(report.decodes, 2);
    }

    #[test]
    fn test_walk_extended_fspec() {
        let d = decoder();
        let mut report = Probe::default();
        // Byte 1: FRN 1 + FX; byte 2: FRN 8, terminal
        let consumed = d.process(&[0x81, 0x80], &[0xAA, 0xBB, 0xCC], &mut report);
        assert_eq!(consumed, 3);
        assert_eq!(report.decodes, 2);
    }

    #[test]
    fn test_missing_mandatory_item() {
        let d = decoder();
        let mut report = Probe::default();
        // FRN 2 only; FRN 1 is mandatory
        assert_eq!(d.process(&[0x40], &[0x00], &mut report), 0);
        assert_eq!(d.stats().snapshot().protocol_violations, 1);
        assert_eq!(report.decodes, 0);
    }

    #[test]
    fn test_empty_fspec_fails_mandatory_gate() {
        let d = decoder();
        let mut report = Probe::default();
        assert_eq!(d.process(&[], &[], &mut report), 0);
        assert_eq!(d.stats().snapshot().protocol_violations, 1);
    }

    #[test]
    fn test_unhandled_item_skips_record() {
        let d = decoder();
        let mut report = Probe::default();
        // FRN 1 (ok) + FRN 3 (no decoder)
        assert_eq!(d.process(&[0xA0], &[0x01, 0x02, 0x03], &mut report), 0);
        assert_eq!(d.stats().snapshot().unhandled_items, 1);
    }

    #[test]
    fn test_payload_shorter_than_item() {
        let d = decoder();
        let mut report = Probe::default();
        assert_eq!(d.process(&[0x80], &[0x01], &mut report), 0);
        assert_eq!(d.stats().snapshot().malformed_records, 1);
    }

    #[test]
    fn test_unterminated_fspec() {
        let d = decoder();
        let mut report = Probe::default();
        // FX set on the only byte, no continuation supplied
        assert_eq!(d.process(&[0x81], &[0x01, 0x02], &mut report), 0);
        assert_eq!(d.stats().snapshot().malformed_records, 1);
    }

    #[test]
    fn test_mandatory_mask_idempotent_replace() {
        let mut d = decoder();
        let before = d.mandatory_mask().to_vec();
        // Re-register the same shape twice over
        d.add_handler(Box::new(FixedProbe { len: 2, mandatory: true }), 1);
        d.add_handler(Box::new(ExtendedProbe), 2);
        assert_eq!(d.mandatory_mask(), &before[..]);
    }

    #[test]
    fn test_fspec_bit_count_matches_decodes() {
        let d = decoder();
        let mut report = Probe::default();
        let fspec: [u8; 2] = [0x81, 0x80]; // 1 data bit + FX, then 1 data bit
        let ones: u32 = fspec.iter().map(|b| (b & 0xFE).count_ones()).sum();
        let consumed = d.process(&fspec, &[0xAA, 0xBB, 0x00], &mut report);
        assert!(consumed > 0);
        assert_eq!(report.decodes as u32, ones);
    }
}
