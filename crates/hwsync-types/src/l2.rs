//! Hardware MAC-learning facts.

use crate::{MacAddress, PortId, VlanId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One L2 entry as reported by the hardware learning pipeline: a MAC address
/// seen on a port within a VLAN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct L2Entry {
    pub mac: MacAddress,
    pub vlan: VlanId,
    pub port: PortId,
}

impl L2Entry {
    pub fn new(mac: MacAddress, vlan: VlanId, port: PortId) -> Self {
        Self { mac, vlan, port }
    }
}

impl fmt::Display for L2Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@vlan{} on {}", self.mac, self.vlan, self.port)
    }
}

/// The kind of change a hardware learning event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum L2EntryUpdateType {
    /// The MAC was learned (or moved/refreshed) on the reported port.
    Learned,
    /// The MAC aged out of the hardware table.
    Aged,
    /// The MAC was explicitly deleted (e.g., by a table flush).
    Deleted,
}

impl L2EntryUpdateType {
    /// Returns true if the update removes the entry from the table.
    pub const fn is_removal(&self) -> bool {
        matches!(self, L2EntryUpdateType::Aged | L2EntryUpdateType::Deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_l2_entry_display() {
        let entry = L2Entry::new(
            "02:00:00:00:00:01".parse().unwrap(),
            VlanId::new(100).unwrap(),
            PortId::new(5),
        );
        assert_eq!(entry.to_string(), "02:00:00:00:00:01@vlan100 on port5");
    }

    #[test]
    fn test_update_type_classification() {
        assert!(!L2EntryUpdateType::Learned.is_removal());
        assert!(L2EntryUpdateType::Aged.is_removal());
        assert!(L2EntryUpdateType::Deleted.is_removal());
    }
}
