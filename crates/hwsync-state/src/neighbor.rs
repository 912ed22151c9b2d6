//! Neighbor (ARP/NDP) tables.

use crate::node::{Published, StateNode};
use hwsync_types::{InterfaceId, IpAddress, MacAddress, PortId, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A key identifying a neighbor across all VLANs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborKey {
    pub vlan: VlanId,
    pub ip: IpAddress,
}

impl NeighborKey {
    pub fn new(vlan: VlanId, ip: IpAddress) -> Self {
        Self { vlan, ip }
    }
}

impl fmt::Display for NeighborKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vlan{}:{}", self.vlan, self.ip)
    }
}

/// One resolved neighbor: IP to MAC binding on a port, reachable through a
/// layer-3 interface. Replaced wholesale on change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NeighborEntry {
    pub ip: IpAddress,
    pub mac: MacAddress,
    pub port: PortId,
    pub interface: InterfaceId,
}

impl NeighborEntry {
    pub fn new(ip: IpAddress, mac: MacAddress, port: PortId, interface: InterfaceId) -> Self {
        Self {
            ip,
            mac,
            port,
            interface,
        }
    }
}

/// Neighbor entries of one VLAN, keyed by IP address.
///
/// The same node type backs both the ARP (v4) and NDP (v6) tables of a VLAN;
/// which protocol a table serves is decided by which slot of the [`Vlan`]
/// holds it.
///
/// [`Vlan`]: crate::Vlan
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NeighborTable {
    #[serde(skip)]
    published: Published,
    entries: BTreeMap<IpAddress, Arc<NeighborEntry>>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, ip: &IpAddress) -> Option<&Arc<NeighborEntry>> {
        self.entries.get(ip)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IpAddress, &Arc<NeighborEntry>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces an entry.
    pub fn add_entry(&mut self, entry: NeighborEntry) {
        self.published.assert_writable("NeighborTable");
        self.entries.insert(entry.ip, Arc::new(entry));
    }

    pub fn remove_entry(&mut self, ip: &IpAddress) -> Option<Arc<NeighborEntry>> {
        self.published.assert_writable("NeighborTable");
        self.entries.remove(ip)
    }

    pub fn publish(&self) {
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }

    pub(crate) fn map(&self) -> &BTreeMap<IpAddress, Arc<NeighborEntry>> {
        &self.entries
    }
}

impl StateNode for NeighborTable {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}
