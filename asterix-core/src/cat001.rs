//! Category 001: monoradar target reports (plots).
//!
//! Decodes the plot-bearing subset of CAT 001 into [`Asterix1Report`]:
//! source identity, polar position, Mode-3/A, Mode-C, target report
//! descriptor, and the truncated detection clock. After a record decodes,
//! the handler reconstructs the full 32-bit time of day from the truncated
//! clock and the source's last known reference, updates the shared source
//! state, and fans the report out to listeners.

use std::sync::{Arc, Weak};
use std::time::SystemTime;

use serde::Serialize;

use crate::bits::BitReader;
use crate::category::{CategoryDecoder, CategoryHandler};
use crate::item::{extended_size, FieldHandler, OpaqueExtended, OpaqueFixed};
use crate::listener::{ListenerSet, ReportListener};
use crate::source::SourceStateStore;
use crate::stats::AsterixStats;
use crate::time::{expand_truncated_tod, tod_from_timestamp};
use crate::types::{AsterixError, Result, SourceIdentifier};

// ---------------------------------------------------------------------------
// Report model
// ---------------------------------------------------------------------------

/// Detection kind from the target report descriptor (I001/020 bits 5-4).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SsrPsr {
    #[default]
    NoDetection,
    SolePrimaryDetection,
    SoleSecondaryDetection,
    CombinedPrimaryAndSecondaryDetection,
}

impl SsrPsr {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => SsrPsr::NoDetection,
            1 => SsrPsr::SolePrimaryDetection,
            2 => SsrPsr::SoleSecondaryDetection,
            _ => SsrPsr::CombinedPrimaryAndSecondaryDetection,
        }
    }
}

/// Emergency condition from the descriptor's first extension (bits 6-5).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Ds1Ds2 {
    #[default]
    Default,
    UnlawfulInterference,
    RadioCommunicationFailure,
    Emergency,
}

impl Ds1Ds2 {
    fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0 => Ds1Ds2::Default,
            1 => Ds1Ds2::UnlawfulInterference,
            2 => Ds1Ds2::RadioCommunicationFailure,
            _ => Ds1Ds2::Emergency,
        }
    }
}

/// Mode-3/A code with its qualifier bits, kept separate and uncollapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Mode3A {
    /// 12-bit octal identification code.
    pub code: u16,
    pub validated: bool,
    pub garbled: bool,
    pub local: bool,
}

/// Mode-C height (sign-extended 14-bit flight level, converted to meters).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SsrHeight {
    pub height_m: f64,
    pub validated: bool,
    pub garbled: bool,
}

/// One decoded CAT 001 target report.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Asterix1Report {
    /// Radar station the plot came from (I001/010).
    pub source_id: SourceIdentifier,
    /// Full reconstructed time of day, 1/128 s units.
    pub tod: u32,

    /// Slant range in meters (I001/040).
    pub range_m: f64,
    /// Azimuth in radians, clockwise from north (I001/040).
    pub azimuth_rad: f64,

    pub mode3a: Option<Mode3A>,
    pub ssr_height: Option<SsrHeight>,

    pub detection: SsrPsr,
    pub emergency: Ds1Ds2,
    /// Special Position Identification flag.
    pub spi: bool,

    /// Raw truncated detection clock (I001/141), meaningful only when
    /// `has_lsp_clock` is set.
    pub tod_lsp: u16,
    pub has_lsp_clock: bool,
}

// ---------------------------------------------------------------------------
// Data item handlers
// ---------------------------------------------------------------------------

/// I001/010: Data Source Identifier. SAC then SIC.
struct DataSourceIdentifier;

impl FieldHandler<Asterix1Report> for DataSourceIdentifier {
    fn name(&self) -> &'static str {
        "I001/010 Data Source Identifier"
    }
    fn mandatory(&self) -> bool {
        true
    }
    fn size(&self, _data: &[u8]) -> usize {
        2
    }
    fn decode(&self, report: &mut Asterix1Report, data: &[u8]) -> Result<()> {
        report.source_id = SourceIdentifier::new(data[0], data[1]);
        Ok(())
    }
}

/// I001/020: Target Report Descriptor. FX-extended; the first octet carries
/// the detection kind and SPI, the first extension the emergency status.
/// Reserved bits must be zero and no second extension is defined.
struct TargetReportDescriptor;

impl FieldHandler<Asterix1Report> for TargetReportDescriptor {
    fn name(&self) -> &'static str {
        "I001/020 Target Report Descriptor"
    }
    fn mandatory(&self) -> bool {
        true
    }
    fn size(&self, data: &[u8]) -> usize {
        extended_size(data, 1, 1)
    }
    fn decode(&self, report: &mut Asterix1Report, data: &[u8]) -> Result<()> {
        let reject = || AsterixError::ProtocolViolation(self.name());

        let mut bits = BitReader::new(data);
        if bits.read_bits::<2>() != 0 {
            return Err(reject());
        }
        report.detection = SsrPsr::from_bits(bits.read_bits::<2>());
        bits.skip(1);
        report.spi = bits.read_bit();
        bits.skip(1);

        if bits.read_bit() {
            // First extension octet
            if bits.read_bit() {
                return Err(reject());
            }
            let emergency = bits.read_bits::<2>();
            if bits.read_bits::<2>() != 0 {
                return Err(reject());
            }
            bits.skip(2);
            if bits.read_bit() {
                // No further extension is defined for this item
                return Err(reject());
            }
            report.emergency = Ds1Ds2::from_bits(emergency);
        }
        Ok(())
    }
}

/// I001/040: Measured Position in Polar Co-ordinates.
/// Range LSB = 1/128 NM; azimuth LSB = 2π/65536.
struct MeasuredPositionPolar;

const NM_TO_METERS: f64 = 1852.0;
const AZIMUTH_SCALE: f64 = std::f64::consts::PI / 32768.0;

impl FieldHandler<Asterix1Report> for MeasuredPositionPolar {
    fn name(&self) -> &'static str {
        "I001/040 Measured Position (Polar)"
    }
    fn size(&self, _data: &[u8]) -> usize {
        4
    }
    fn decode(&self, report: &mut Asterix1Report, data: &[u8]) -> Result<()> {
        let raw_range = u16::from_be_bytes([data[0], data[1]]);
        let raw_azimuth = u16::from_be_bytes([data[2], data[3]]);

        report.range_m = f64::from(raw_range) / 128.0 * NM_TO_METERS;
        report.azimuth_rad = f64::from(raw_azimuth) * AZIMUTH_SCALE;
        Ok(())
    }
}

/// I001/070: Mode-3/A Code in Octal Representation.
struct Mode3ACode;

impl FieldHandler<Asterix1Report> for Mode3ACode {
    fn name(&self) -> &'static str {
        "I001/070 Mode-3/A Code"
    }
    fn size(&self, _data: &[u8]) -> usize {
        2
    }
    fn decode(&self, report: &mut Asterix1Report, data: &[u8]) -> Result<()> {
        let raw = u16::from_be_bytes([data[0], data[1]]);
        report.mode3a = Some(Mode3A {
            code: raw & 0x0FFF,
            validated: raw & 0x8000 != 0,
            garbled: raw & 0x4000 != 0,
            local: raw & 0x2000 != 0,
        });
        Ok(())
    }
}

/// I001/090: Mode-C Code in Binary Representation.
/// 14-bit signed flight level in 25 ft increments.
struct ModeCCode;

const MODE_C_SCALE_M: f64 = 25.0 * 0.3048;

impl FieldHandler<Asterix1Report> for ModeCCode {
    fn name(&self) -> &'static str {
        "I001/090 Mode-C Code (Flight Level)"
    }
    fn size(&self, _data: &[u8]) -> usize {
        2
    }
    fn decode(&self, report: &mut Asterix1Report, data: &[u8]) -> Result<()> {
        let raw = u16::from_be_bytes([data[0], data[1]]);
        let validated = raw & 0x8000 != 0;
        let garbled = raw & 0x4000 != 0;

        // Sign-extend the 14-bit value to 16 bits.
        let mut level = raw & 0x3FFF;
        if level & 0x2000 != 0 {
            level |= 0xC000;
        }
        let level = level as i16;

        report.ssr_height = Some(SsrHeight {
            height_m: f64::from(level) * MODE_C_SCALE_M,
            validated,
            garbled,
        });
        Ok(())
    }
}

/// I001/141: Truncated Time of Day. Raw 16-bit low half of the detection
/// clock; expansion happens after the whole record has decoded.
struct TruncatedTimeOfDay;

impl FieldHandler<Asterix1Report> for TruncatedTimeOfDay {
    fn name(&self) -> &'static str {
        "I001/141 Truncated Time of Day"
    }
    fn size(&self, _data: &[u8]) -> usize {
        2
    }
    fn decode(&self, report: &mut Asterix1Report, data: &[u8]) -> Result<()> {
        report.tod_lsp = u16::from_be_bytes([data[0], data[1]]);
        report.has_lsp_clock = true;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Category handler
// ---------------------------------------------------------------------------

/// CAT 001 record pipeline: decode, reconstruct TOD, publish.
pub struct Cat001Handler {
    decoder: CategoryDecoder<Asterix1Report>,
    sources: Arc<SourceStateStore>,
    listeners: ListenerSet<Asterix1Report>,
}

impl Cat001Handler {
    pub fn new(sources: Arc<SourceStateStore>) -> Self {
        let mut decoder = CategoryDecoder::new();

        decoder.add_handler(Box::new(DataSourceIdentifier), 1);
        decoder.add_handler(Box::new(TargetReportDescriptor), 2);
        decoder.add_handler(Box::new(MeasuredPositionPolar), 3);
        decoder.add_handler(Box::new(Mode3ACode), 4);
        decoder.add_handler(Box::new(ModeCCode), 5);
        decoder.add_handler(
            Box::new(OpaqueExtended {
                name: "I001/130 Radar Plot Characteristics",
                initial: 1,
                increment: 1,
            }),
            6,
        );
        decoder.add_handler(Box::new(TruncatedTimeOfDay), 7);
        decoder.add_handler(Box::new(OpaqueFixed { name: "I001/050 Mode-2 Code", len: 2 }), 8);
        decoder.add_handler(Box::new(OpaqueFixed { name: "I001/131 Received Power", len: 1 }), 10);
        decoder.add_handler(
            Box::new(OpaqueFixed { name: "I001/150 Presence of X-Pulse", len: 1 }),
            15,
        );

        Cat001Handler {
            decoder,
            sources,
            listeners: ListenerSet::new(),
        }
    }

    /// Subscribe a weak listener for decoded plots.
    pub fn add_listener(&self, listener: Weak<dyn ReportListener<Asterix1Report>>) {
        self.listeners.add(listener);
    }
}

impl CategoryHandler for Cat001Handler {
    fn attach_stats(&mut self, stats: Arc<AsterixStats>) {
        self.decoder.attach_stats(stats);
    }

    fn process_record(&self, fspec: &[u8], payload: &[u8], rx: SystemTime) -> usize {
        let mut report = Asterix1Report::default();

        let consumed = self.decoder.process(fspec, payload, &mut report);
        if consumed > 0 {
            // Best available full reference: the source's own last report,
            // else the wall clock the packet arrived on.
            let reference = self
                .sources
                .reference_time(report.source_id)
                .unwrap_or_else(|| tod_from_timestamp(rx));

            report.tod = if report.has_lsp_clock {
                expand_truncated_tod(report.tod_lsp, reference)
            } else {
                reference
            };

            self.sources.update_source_time(report.source_id, report.tod);
            self.listeners.fan_out(&report);
        }

        consumed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
