//! Platform/ASIC capability descriptor.

use std::fmt;

/// Optional hardware capabilities a backend's ASIC may or may not have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AsicFeature {
    /// The newer SDK generation's ECMP read API, whose member records carry
    /// weights (a member may legitimately appear more than once). ASICs
    /// without it expose the older flat egress-id read path.
    ExtendedEcmpApi,
    /// Warm restart: the ASIC can be re-attached without clearing its tables.
    WarmRestart,
    /// Hardware-assisted MAC learning notifications.
    MacLearningEvents,
}

impl fmt::Display for AsicFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AsicFeature::ExtendedEcmpApi => "extended-ecmp-api",
            AsicFeature::WarmRestart => "warm-restart",
            AsicFeature::MacLearningEvents => "mac-learning-events",
        };
        write!(f, "{}", s)
    }
}

/// Describes one platform/ASIC combination. Queried once per backend
/// instance; everything else in the descriptor is opaque to the engine.
pub trait Platform: Send + Sync {
    /// Human-readable ASIC name for logs.
    fn asic_name(&self) -> &str;

    /// Capability query.
    fn supports(&self, feature: AsicFeature) -> bool;
}
