//! Hardware abstraction boundary for switch-hwsync.
//!
//! Everything the synchronization engine knows about a switching ASIC goes
//! through the narrow capability traits defined here:
//!
//! - [`HwBackend`]: apply state deltas, read back forwarding tables, manage
//!   event callbacks and warm-restart serialization
//! - [`HwEventSink`]: the callback surface a backend reports asynchronous
//!   hardware events into (link scan, packet RX, MAC learning)
//! - [`Platform`] / [`AsicFeature`]: per-ASIC capability queries (e.g. which
//!   generation of the ECMP read API the SDK exposes)
//!
//! Vendor SDK bindings implement these traits per ASIC family; this crate
//! contains no hardware-specific code itself.

mod backend;
mod error;
mod platform;
mod types;

pub use backend::{HwBackend, HwEventSink};
pub use error::{HwError, HwResult, SdkStatus, SdkStatusExt};
pub use platform::{AsicFeature, Platform};
pub use types::{
    EcmpGroupId, EcmpMember, EgressId, EgressMultiset, PortStats, RxPacket, TxPacket,
};
