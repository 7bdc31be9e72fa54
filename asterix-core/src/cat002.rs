//! Category 002: monoradar service messages.
//!
//! North markers and sector crossings carry a full 24-bit time of day, so
//! every decoded record refreshes the source-state store — that is what
//! gives CAT 001 plots their expansion reference.

use std::sync::{Arc, Weak};
use std::time::SystemTime;

use serde::Serialize;

use crate::category::{CategoryDecoder, CategoryHandler};
use crate::item::{FieldHandler, OpaqueExtended, OpaqueFixed};
use crate::listener::{ListenerSet, ReportListener};
use crate::source::SourceStateStore;
use crate::stats::AsterixStats;
use crate::types::{Result, SourceIdentifier};

// ---------------------------------------------------------------------------
// Report model
// ---------------------------------------------------------------------------

/// One decoded CAT 002 service message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Asterix2Report {
    /// Service sensor the message came from (I002/010).
    pub source_id: SourceIdentifier,
    /// Full time of day, 1/128 s units (I002/030).
    pub tod: u32,
    /// Antenna rotation speed in RPM (I002/041), 0.0 when absent.
    pub antenna_speed_rpm: f32,
}

// ---------------------------------------------------------------------------
// Data item handlers
// ---------------------------------------------------------------------------

/// I002/010: Data Source Identifier. SAC then SIC.
struct DataSourceIdentifier;

impl FieldHandler<Asterix2Report> for DataSourceIdentifier {
    fn name(&self) -> &'static str {
        "I002/010 Data Source Identifier"
    }
    fn mandatory(&self) -> bool {
        true
    }
    fn size(&self, _data: &[u8]) -> usize {
        2
    }
    fn decode(&self, report: &mut Asterix2Report, data: &[u8]) -> Result<()> {
        report.source_id = SourceIdentifier::new(data[0], data[1]);
        Ok(())
    }
}

/// I002/030: Time of Day. 24-bit big-endian, 1/128 s units.
struct TimeOfDay;

impl FieldHandler<Asterix2Report> for TimeOfDay {
    fn name(&self) -> &'static str {
        "I002/030 Time of Day"
    }
    fn mandatory(&self) -> bool {
        true
    }
    fn size(&self, _data: &[u8]) -> usize {
        3
    }
    fn decode(&self, report: &mut Asterix2Report, data: &[u8]) -> Result<()> {
        report.tod =
            u32::from(data[0]) << 16 | u32::from(data[1]) << 8 | u32::from(data[2]);
        Ok(())
    }
}

/// I002/041: Antenna Rotation Speed. LSB = 1/128 RPM.
struct AntennaRotationSpeed;

impl FieldHandler<Asterix2Report> for AntennaRotationSpeed {
    fn name(&self) -> &'static str {
        "I002/041 Antenna Rotation Speed"
    }
    fn size(&self, _data: &[u8]) -> usize {
        2
    }
    fn decode(&self, report: &mut Asterix2Report, data: &[u8]) -> Result<()> {
        let raw = u16::from_be_bytes([data[0], data[1]]);
        report.antenna_speed_rpm = f32::from(raw) / 128.0;
        Ok(())
    }
}

/// I002/000: Message Type. Mandatory, recognised but not interpreted here.
struct MessageType;

impl FieldHandler<Asterix2Report> for MessageType {
    fn name(&self) -> &'static str {
        "I002/000 Message Type"
    }
    fn mandatory(&self) -> bool {
        true
    }
    fn size(&self, _data: &[u8]) -> usize {
        1
    }
}

// ---------------------------------------------------------------------------
// Category handler
// ---------------------------------------------------------------------------

/// CAT 002 record pipeline: decode, refresh source time, publish.
pub struct Cat002Handler {
    decoder: CategoryDecoder<Asterix2Report>,
    sources: Arc<SourceStateStore>,
    listeners: ListenerSet<Asterix2Report>,
}

impl Cat002Handler {
    pub fn new(sources: Arc<SourceStateStore>) -> Self {
        let mut decoder = CategoryDecoder::new();

        decoder.add_handler(Box::new(DataSourceIdentifier), 1);
        decoder.add_handler(Box::new(MessageType), 2);
        decoder.add_handler(Box::new(OpaqueFixed { name: "I002/020 Sector Number", len: 1 }), 3);
        decoder.add_handler(Box::new(TimeOfDay), 4);
        decoder.add_handler(Box::new(AntennaRotationSpeed), 5);
        decoder.add_handler(
            Box::new(OpaqueExtended {
                name: "I002/050 Station Configuration Status",
                initial: 1,
                increment: 1,
            }),
            6,
        );

        Cat002Handler {
            decoder,
            sources,
            listeners: ListenerSet::new(),
        }
    }

    /// Subscribe a weak listener for decoded service messages.
    pub fn add_listener(&self, listener: Weak<dyn ReportListener<Asterix2Report>>) {
        self.listeners.add(listener);
    }
}

impl CategoryHandler for Cat002Handler {
    fn attach_stats(&mut self, stats: Arc<AsterixStats>) {
        self.decoder.attach_stats(stats);
    }

    fn process_record(&self, fspec: &[u8], payload: &[u8], _rx: SystemTime) -> usize {
        let mut report = Asterix2Report::default();

        let consumed = self.decoder.process(fspec, payload, &mut report);
        if consumed > 0 {
            // The full TOD this record carries becomes the expansion
            // reference for subsequent plots from the same source.
            self.sources.update_source_time(report.source_id, report.tod);
            self.listeners.fan_out(&report);
        }

        consumed
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
