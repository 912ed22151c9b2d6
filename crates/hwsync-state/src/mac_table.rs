//! Learned-MAC (L2 forwarding) tables and the learning-event updater.

use crate::node::{Published, StateNode};
use crate::switch_state::SwitchState;
use hwsync_types::{L2Entry, L2EntryUpdateType, MacAddress, PortId, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A key identifying a learned MAC across all VLANs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MacKey {
    pub vlan: VlanId,
    pub mac: MacAddress,
}

impl MacKey {
    pub fn new(vlan: VlanId, mac: MacAddress) -> Self {
        Self { vlan, mac }
    }
}

impl fmt::Display for MacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vlan{}:{}", self.vlan, self.mac)
    }
}

/// One learned MAC binding. Replaced wholesale on change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacEntry {
    pub mac: MacAddress,
    pub port: PortId,
}

impl MacEntry {
    pub fn new(mac: MacAddress, port: PortId) -> Self {
        Self { mac, port }
    }
}

/// Learned MACs of one VLAN, keyed by address.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacTable {
    #[serde(skip)]
    published: Published,
    entries: BTreeMap<MacAddress, Arc<MacEntry>>,
}

impl MacTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, mac: &MacAddress) -> Option<&Arc<MacEntry>> {
        self.entries.get(mac)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&MacAddress, &Arc<MacEntry>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Inserts or replaces a binding (a re-learn on another port moves it).
    pub fn add_entry(&mut self, entry: MacEntry) {
        self.published.assert_writable("MacTable");
        self.entries.insert(entry.mac, Arc::new(entry));
    }

    pub fn remove_entry(&mut self, mac: &MacAddress) -> Option<Arc<MacEntry>> {
        self.published.assert_writable("MacTable");
        self.entries.remove(mac)
    }

    pub fn publish(&self) {
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }

    pub(crate) fn map(&self) -> &BTreeMap<MacAddress, Arc<MacEntry>> {
        &self.entries
    }
}

impl StateNode for MacTable {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}

/// Produces the state tree that results from applying one hardware learning
/// event to `state`.
///
/// A `Learned` update inserts (or refreshes/moves) the binding in the MAC
/// table of the entry's VLAN; `Aged` and `Deleted` remove it. Events for a
/// VLAN the state does not know are ignored and the input tree is returned
/// unchanged — the hardware can race a VLAN teardown.
pub fn update_mac_table(
    state: &Arc<SwitchState>,
    entry: &L2Entry,
    update: L2EntryUpdateType,
) -> Arc<SwitchState> {
    let mut new_state = Arc::clone(state);
    {
        let vlans = SwitchState::modify_vlans(&mut new_state);
        let Some(vlan) = vlans.vlan_mut(entry.vlan) else {
            return Arc::clone(state);
        };
        let mac_table = vlan.mac_table_mut();
        match update {
            L2EntryUpdateType::Learned => {
                mac_table.add_entry(MacEntry::new(entry.mac, entry.port));
            }
            L2EntryUpdateType::Aged | L2EntryUpdateType::Deleted => {
                mac_table.remove_entry(&entry.mac);
            }
        }
    }
    new_state
}
