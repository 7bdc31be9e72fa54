//! Time-of-day reconstruction.
//!
//! ASTERIX carries time as 1/128 s units since midnight. Some CAT 001
//! records truncate it to the low 16 bits (I001/141), which wrap every
//! 512 s; [`expand_truncated_tod`] recovers the full value from the last
//! known reference of the same source. Expansion is correct as long as
//! successive updates from a source are less than ~256 s apart.

use std::time::{SystemTime, UNIX_EPOCH};

/// One 24-hour day in TOD units (1/128 s).
pub const MAX_TOD: u32 = 86_400 * 128;

const MSP_MASK: u32 = 0xFFFF_0000;
const WINDOW: u32 = 0x0001_0000;

/// Expand a truncated 16-bit TOD against a full 32-bit reference.
///
/// Three candidates share the truncated low half: the reference's own MSP
/// window, the previous window, and the next window (each wrapping at the
/// day boundary). The one nearest the reference by circular distance on
/// `[0, MAX_TOD)` wins; candidates outside the day are disqualified.
/// Ties resolve to the reference window, then the previous one.
pub fn expand_truncated_tod(lsp: u16, reference: u32) -> u32 {
    const TOP_MSP: u32 = (MAX_TOD - 1) & MSP_MASK;
    const HALF_DAY: u32 = MAX_TOD / 2;

    let ref_msp = reference & MSP_MASK;
    let lsp = u32::from(lsp);

    let tod_a = ref_msp | lsp;
    let tod_b = if ref_msp > 0 { tod_a - WINDOW } else { TOP_MSP | lsp };
    let tod_c = if ref_msp < TOP_MSP { tod_a + WINDOW } else { lsp };

    let dist = |t: u32| -> u32 {
        if t >= MAX_TOD {
            return MAX_TOD;
        }
        let d = t.abs_diff(reference);
        if d > HALF_DAY {
            MAX_TOD - d
        } else {
            d
        }
    };

    let mut best = tod_a;
    let mut min_dist = dist(tod_a);

    let d_b = dist(tod_b);
    if d_b < min_dist {
        min_dist = d_b;
        best = tod_b;
    }

    if dist(tod_c) < min_dist {
        best = tod_c;
    }

    best
}

/// TOD in 1/128 s units since the most recent UTC midnight, derived from a
/// wall-clock receive timestamp. Pre-epoch timestamps collapse to 0.
pub fn tod_from_timestamp(ts: SystemTime) -> u32 {
    let since_epoch = match ts.duration_since(UNIX_EPOCH) {
        Ok(d) => d,
        Err(_) => return 0,
    };

    let since_midnight_us = (since_epoch.as_micros() % (86_400 * 1_000_000)) as u64;

    // Multiply before dividing to keep sub-second precision.
    ((since_midnight_us * 128) / 1_000_000) as u32
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
