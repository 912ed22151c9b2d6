//! VLAN nodes: each VLAN owns its ARP, NDP and learned-MAC tables.

use crate::mac_table::MacTable;
use crate::neighbor::NeighborTable;
use crate::node::{cow_detach, Published, StateNode};
use hwsync_types::VlanId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One VLAN and the layer-2/layer-3 resolution state scoped to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vlan {
    #[serde(skip)]
    published: Published,
    id: VlanId,
    arp_table: Arc<NeighborTable>,
    ndp_table: Arc<NeighborTable>,
    mac_table: Arc<MacTable>,
}

impl Vlan {
    pub fn new(id: VlanId) -> Self {
        Self {
            published: Published::new(),
            id,
            arp_table: Arc::new(NeighborTable::new()),
            ndp_table: Arc::new(NeighborTable::new()),
            mac_table: Arc::new(MacTable::new()),
        }
    }

    pub fn id(&self) -> VlanId {
        self.id
    }

    pub fn arp_table(&self) -> &Arc<NeighborTable> {
        &self.arp_table
    }

    pub fn ndp_table(&self) -> &Arc<NeighborTable> {
        &self.ndp_table
    }

    pub fn mac_table(&self) -> &Arc<MacTable> {
        &self.mac_table
    }

    /// Copy-on-write access to the ARP table.
    pub fn arp_table_mut(&mut self) -> &mut NeighborTable {
        self.published.assert_writable("Vlan");
        cow_detach(&mut self.arp_table)
    }

    /// Copy-on-write access to the NDP table.
    pub fn ndp_table_mut(&mut self) -> &mut NeighborTable {
        self.published.assert_writable("Vlan");
        cow_detach(&mut self.ndp_table)
    }

    /// Copy-on-write access to the MAC table.
    pub fn mac_table_mut(&mut self) -> &mut MacTable {
        self.published.assert_writable("Vlan");
        cow_detach(&mut self.mac_table)
    }

    /// Replaces the ARP table wholesale (used by teardown stripping).
    pub fn reset_arp_table(&mut self, table: NeighborTable) {
        self.published.assert_writable("Vlan");
        self.arp_table = Arc::new(table);
    }

    /// Replaces the NDP table wholesale.
    pub fn reset_ndp_table(&mut self, table: NeighborTable) {
        self.published.assert_writable("Vlan");
        self.ndp_table = Arc::new(table);
    }

    /// Replaces the MAC table wholesale.
    pub fn reset_mac_table(&mut self, table: MacTable) {
        self.published.assert_writable("Vlan");
        self.mac_table = Arc::new(table);
    }

    pub fn publish(&self) {
        self.arp_table.publish();
        self.ndp_table.publish();
        self.mac_table.publish();
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }
}

impl StateNode for Vlan {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}

/// VLANs keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VlanMap {
    #[serde(skip)]
    published: Published,
    vlans: BTreeMap<VlanId, Arc<Vlan>>,
}

impl VlanMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vlan(&self, id: VlanId) -> Option<&Arc<Vlan>> {
        self.vlans.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&VlanId, &Arc<Vlan>)> {
        self.vlans.iter()
    }

    pub fn len(&self) -> usize {
        self.vlans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vlans.is_empty()
    }

    pub fn add_vlan(&mut self, vlan: Vlan) {
        self.published.assert_writable("VlanMap");
        self.vlans.insert(vlan.id(), Arc::new(vlan));
    }

    pub fn remove_vlan(&mut self, id: VlanId) -> Option<Arc<Vlan>> {
        self.published.assert_writable("VlanMap");
        self.vlans.remove(&id)
    }

    /// Copy-on-write access to one VLAN.
    pub fn vlan_mut(&mut self, id: VlanId) -> Option<&mut Vlan> {
        self.published.assert_writable("VlanMap");
        self.vlans.get_mut(&id).map(cow_detach)
    }

    pub fn publish(&self) {
        for vlan in self.vlans.values() {
            vlan.publish();
        }
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }

    pub(crate) fn map(&self) -> &BTreeMap<VlanId, Arc<Vlan>> {
        &self.vlans
    }
}

impl StateNode for VlanMap {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbor::NeighborEntry;
    use hwsync_types::{InterfaceId, PortId};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_vlan_tables_start_empty() {
        let vlan = Vlan::new(VlanId::new(100).unwrap());
        assert!(vlan.arp_table().is_empty());
        assert!(vlan.ndp_table().is_empty());
        assert!(vlan.mac_table().is_empty());
    }

    #[test]
    fn test_vlan_mut_cow_preserves_published_original() {
        let mut map = VlanMap::new();
        map.add_vlan(Vlan::new(VlanId::new(100).unwrap()));
        map.publish();

        let published_vlan = Arc::clone(map.vlan(VlanId::new(100).unwrap()).unwrap());

        let mut next = map.clone();
        next.vlan_mut(VlanId::new(100).unwrap())
            .unwrap()
            .arp_table_mut()
            .add_entry(NeighborEntry::new(
                "10.0.0.1".parse().unwrap(),
                "00:11:22:33:44:55".parse().unwrap(),
                PortId::new(1),
                InterfaceId::new(10),
            ));

        assert!(published_vlan.arp_table().is_empty());
        assert_eq!(
            next.vlan(VlanId::new(100).unwrap())
                .unwrap()
                .arp_table()
                .len(),
            1
        );
    }

    #[test]
    #[should_panic(expected = "attempted to mutate published Vlan")]
    fn test_published_vlan_rejects_reset() {
        let vlan = Vlan::new(VlanId::new(100).unwrap());
        vlan.publish();
        let mut vlan = vlan;
        vlan.reset_arp_table(NeighborTable::new());
    }
}
