//! Layer-3 interface nodes.

use crate::node::{cow_detach, Published, StateNode};
use hwsync_types::{InterfaceId, IpAddress, MacAddress, RouterId, VlanId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One routed interface: the attachment point between a VLAN and a virtual
/// router, carrying the interface's own addresses (address → mask length).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interface {
    #[serde(skip)]
    published: Published,
    id: InterfaceId,
    router: RouterId,
    vlan: VlanId,
    mac: MacAddress,
    addresses: BTreeMap<IpAddress, u8>,
}

impl Interface {
    pub fn new(id: InterfaceId, router: RouterId, vlan: VlanId, mac: MacAddress) -> Self {
        Self {
            published: Published::new(),
            id,
            router,
            vlan,
            mac,
            addresses: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn router(&self) -> RouterId {
        self.router
    }

    pub fn vlan(&self) -> VlanId {
        self.vlan
    }

    pub fn mac(&self) -> MacAddress {
        self.mac
    }

    pub fn addresses(&self) -> &BTreeMap<IpAddress, u8> {
        &self.addresses
    }

    pub fn add_address(&mut self, addr: IpAddress, mask_len: u8) {
        self.published.assert_writable("Interface");
        self.addresses.insert(addr, mask_len);
    }

    /// Replaces the address set wholesale (used by teardown stripping).
    pub fn set_addresses(&mut self, addresses: BTreeMap<IpAddress, u8>) {
        self.published.assert_writable("Interface");
        self.addresses = addresses;
    }

    pub fn publish(&self) {
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }
}

impl StateNode for Interface {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}

/// Interfaces keyed by id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceMap {
    #[serde(skip)]
    published: Published,
    interfaces: BTreeMap<InterfaceId, Arc<Interface>>,
}

impl InterfaceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&Arc<Interface>> {
        self.interfaces.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&InterfaceId, &Arc<Interface>)> {
        self.interfaces.iter()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn add_interface(&mut self, interface: Interface) {
        self.published.assert_writable("InterfaceMap");
        self.interfaces.insert(interface.id(), Arc::new(interface));
    }

    pub fn remove_interface(&mut self, id: InterfaceId) -> Option<Arc<Interface>> {
        self.published.assert_writable("InterfaceMap");
        self.interfaces.remove(&id)
    }

    /// Copy-on-write access to one interface.
    pub fn interface_mut(&mut self, id: InterfaceId) -> Option<&mut Interface> {
        self.published.assert_writable("InterfaceMap");
        self.interfaces.get_mut(&id).map(cow_detach)
    }

    pub fn publish(&self) {
        for interface in self.interfaces.values() {
            interface.publish();
        }
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }

    pub(crate) fn map(&self) -> &BTreeMap<InterfaceId, Arc<Interface>> {
        &self.interfaces
    }
}

impl StateNode for InterfaceMap {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}
