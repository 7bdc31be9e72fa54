//! Last-known full TOD per source.
//!
//! CAT 002 sector/north messages carry a full 24-bit time of day; CAT 001
//! plots often carry only the truncated 16-bit clock. The store keeps the
//! most recent full TOD per (SAC, SIC) so plot handlers can expand the
//! truncation. One store is shared by reference across every category
//! handler; entries live for the lifetime of the process.

use dashmap::DashMap;

use crate::types::SourceIdentifier;

/// Concurrent (SAC, SIC) → TOD map. Reads take no lock on the hot path.
#[derive(Debug, Default)]
pub struct SourceStateStore {
    sources: DashMap<SourceIdentifier, u32>,
}

impl SourceStateStore {
    pub fn new() -> Self {
        SourceStateStore::default()
    }

    /// Last full 32-bit TOD seen from `source`, if any.
    pub fn reference_time(&self, source: SourceIdentifier) -> Option<u32> {
        self.sources.get(&source).map(|entry| *entry)
    }

    /// Record the latest full TOD for `source`. Called whenever a record
    /// carrying (or reconstructing) a full time of day decodes.
    pub fn update_source_time(&self, source: SourceIdentifier, tod: u32) {
        self.sources.insert(source, tod);
    }

    /// Number of sources seen so far.
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_and_read_back() {
        let store = SourceStateStore::new();
        let radar = SourceIdentifier::new(25, 14);

        assert_eq!(store.reference_time(radar), None);

        store.update_source_time(radar, 0x0012_3456);
        assert_eq!(store.reference_time(radar), Some(0x0012_3456));

        store.update_source_time(radar, 0x0012_5678);
        assert_eq!(store.reference_time(radar), Some(0x0012_5678));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sources_are_independent() {
        let store = SourceStateStore::new();
        store.update_source_time(SourceIdentifier::new(1, 1), 100);
        store.update_source_time(SourceIdentifier::new(1, 2), 200);

        assert_eq!(store.reference_time(SourceIdentifier::new(1, 1)), Some(100));
        assert_eq!(store.reference_time(SourceIdentifier::new(1, 2)), Some(200));
        assert_eq!(store.reference_time(SourceIdentifier::new(2, 1)), None);
    }
}
