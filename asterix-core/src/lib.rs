//! asterix-core: Pure decode library for ASTERIX surveillance feeds.
//!
//! No async, no I/O — just algorithms. Callers hand byte buffers to a
//! [`PacketDispatcher`]; decoded reports come back synchronously through
//! weakly-held listeners, and every failure mode lands in a counter instead
//! of an error return.
//!
//! Pipeline: bytes → data blocks → records → FSPEC walk → field handlers
//! → typed report → listeners + per-source time state. Categories 001
//! (target reports) and 002 (service messages) ship with the crate; other
//! categories plug in through the same [`CategoryHandler`] /
//! [`FieldHandler`] traits without touching the core.

pub mod bits;
pub mod cat001;
pub mod cat002;
pub mod category;
pub mod dispatcher;
pub mod item;
pub mod listener;
pub mod source;
pub mod stats;
pub mod time;
pub mod types;

// Re-export commonly used types at crate root
pub use cat001::{Asterix1Report, Cat001Handler};
pub use cat002::{Asterix2Report, Cat002Handler};
pub use category::{CategoryDecoder, CategoryHandler};
pub use dispatcher::PacketDispatcher;
pub use item::FieldHandler;
pub use listener::ReportListener;
pub use source::SourceStateStore;
pub use stats::{AsterixStats, AsterixStatsSnapshot};
pub use time::{expand_truncated_tod, tod_from_timestamp};
pub use types::{AsterixError, SourceIdentifier};
