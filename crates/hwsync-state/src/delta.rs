//! Difference view over two published state trees.

use crate::interface::Interface;
use crate::mac_table::{MacEntry, MacKey, MacTable};
use crate::neighbor::{NeighborEntry, NeighborKey, NeighborTable};
use crate::route::{Route, RouteKey, RouteTable};
use crate::switch_state::SwitchState;
use crate::vlan::Vlan;
use hwsync_types::{InterfaceId, RouterId, VlanId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// One change between two versions of a keyed sub-tree.
#[derive(Debug, Clone)]
pub enum DeltaChange<K, V> {
    /// Present only in the new tree.
    Added(K, Arc<V>),
    /// Present only in the old tree.
    Removed(K, Arc<V>),
    /// Present in both with differing content: (key, old, new).
    Changed(K, Arc<V>, Arc<V>),
}

impl<K: Copy, V> DeltaChange<K, V> {
    pub fn key(&self) -> K {
        match self {
            DeltaChange::Added(k, _) | DeltaChange::Removed(k, _) | DeltaChange::Changed(k, _, _) => {
                *k
            }
        }
    }
}

/// Computes the ordered change list between two keyed maps of shared nodes.
///
/// Entries present in both maps compare by value, short-circuited by pointer
/// identity — structural sharing guarantees an untouched sub-tree is the same
/// allocation in both versions, so the fast path is sound.
fn map_delta<K: Ord + Clone, V: PartialEq>(
    old: &BTreeMap<K, Arc<V>>,
    new: &BTreeMap<K, Arc<V>>,
) -> Vec<DeltaChange<K, V>> {
    let mut changes = Vec::new();
    for (key, old_value) in old {
        match new.get(key) {
            None => changes.push(DeltaChange::Removed(key.clone(), Arc::clone(old_value))),
            Some(new_value) => {
                if !Arc::ptr_eq(old_value, new_value) && **old_value != **new_value {
                    changes.push(DeltaChange::Changed(
                        key.clone(),
                        Arc::clone(old_value),
                        Arc::clone(new_value),
                    ));
                }
            }
        }
    }
    for (key, new_value) in new {
        if !old.contains_key(key) {
            changes.push(DeltaChange::Added(key.clone(), Arc::clone(new_value)));
        }
    }
    changes
}

/// An ephemeral, derived view over two published [`SwitchState`] snapshots.
///
/// The delta is the sole input the hardware synchronization engine hands to a
/// backend. Computing it has no side effects; the per-category accessors
/// produce deterministic, key-ordered change lists on demand.
#[derive(Debug, Clone)]
pub struct StateDelta {
    old: Arc<SwitchState>,
    new: Arc<SwitchState>,
}

impl StateDelta {
    /// Wraps two published snapshots. Passing an unpublished tree is a
    /// programming error.
    pub fn new(old: Arc<SwitchState>, new: Arc<SwitchState>) -> Self {
        assert!(
            old.is_published() && new.is_published(),
            "state deltas are only defined over published trees"
        );
        Self { old, new }
    }

    pub fn old_state(&self) -> &Arc<SwitchState> {
        &self.old
    }

    pub fn new_state(&self) -> &Arc<SwitchState> {
        &self.new
    }

    /// Returns true if the two snapshots are leaf-equal.
    pub fn is_empty(&self) -> bool {
        Arc::ptr_eq(&self.old, &self.new) || *self.old == *self.new
    }

    /// Route changes across all virtual routers, flattened to
    /// (router, prefix) keys.
    pub fn route_delta(&self) -> Vec<DeltaChange<RouteKey, Route>> {
        if Arc::ptr_eq(self.old.route_tables(), self.new.route_tables()) {
            return Vec::new();
        }
        let mut changes = Vec::new();
        let table_changes = map_delta(self.old.route_tables().map(), self.new.route_tables().map());
        for change in table_changes {
            match change {
                DeltaChange::Removed(router, table) => {
                    Self::push_whole_table(&mut changes, router, &table, |k, v| {
                        DeltaChange::Removed(k, v)
                    });
                }
                DeltaChange::Added(router, table) => {
                    Self::push_whole_table(&mut changes, router, &table, |k, v| {
                        DeltaChange::Added(k, v)
                    });
                }
                DeltaChange::Changed(router, old_table, new_table) => {
                    for inner in map_delta(old_table.map(), new_table.map()) {
                        changes.push(match inner {
                            DeltaChange::Added(prefix, route) => {
                                DeltaChange::Added(RouteKey::new(router, prefix), route)
                            }
                            DeltaChange::Removed(prefix, route) => {
                                DeltaChange::Removed(RouteKey::new(router, prefix), route)
                            }
                            DeltaChange::Changed(prefix, old_route, new_route) => {
                                DeltaChange::Changed(
                                    RouteKey::new(router, prefix),
                                    old_route,
                                    new_route,
                                )
                            }
                        });
                    }
                }
            }
        }
        changes
    }

    fn push_whole_table(
        changes: &mut Vec<DeltaChange<RouteKey, Route>>,
        router: RouterId,
        table: &Arc<RouteTable>,
        make: impl Fn(RouteKey, Arc<Route>) -> DeltaChange<RouteKey, Route>,
    ) {
        for (prefix, route) in table.iter() {
            changes.push(make(RouteKey::new(router, *prefix), Arc::clone(route)));
        }
    }

    /// ARP changes across all VLANs, flattened to (vlan, ip) keys.
    pub fn arp_delta(&self) -> Vec<DeltaChange<NeighborKey, NeighborEntry>> {
        self.neighbor_delta(Vlan::arp_table)
    }

    /// NDP changes across all VLANs, flattened to (vlan, ip) keys.
    pub fn ndp_delta(&self) -> Vec<DeltaChange<NeighborKey, NeighborEntry>> {
        self.neighbor_delta(Vlan::ndp_table)
    }

    fn neighbor_delta(
        &self,
        table_of: fn(&Vlan) -> &Arc<NeighborTable>,
    ) -> Vec<DeltaChange<NeighborKey, NeighborEntry>> {
        let mut changes = Vec::new();
        self.for_each_vlan_pair(|vlan, old_vlan, new_vlan| {
            let old_empty = NeighborTable::new();
            let new_empty = NeighborTable::new();
            let old_table = old_vlan.map_or(&old_empty, |v| table_of(v).as_ref());
            let new_table = new_vlan.map_or(&new_empty, |v| table_of(v).as_ref());
            if let (Some(o), Some(n)) = (old_vlan, new_vlan) {
                if Arc::ptr_eq(table_of(o), table_of(n)) {
                    return;
                }
            }
            for inner in map_delta(old_table.map(), new_table.map()) {
                changes.push(match inner {
                    DeltaChange::Added(ip, e) => {
                        DeltaChange::Added(NeighborKey::new(vlan, ip), e)
                    }
                    DeltaChange::Removed(ip, e) => {
                        DeltaChange::Removed(NeighborKey::new(vlan, ip), e)
                    }
                    DeltaChange::Changed(ip, o, n) => {
                        DeltaChange::Changed(NeighborKey::new(vlan, ip), o, n)
                    }
                });
            }
        });
        changes
    }

    /// Learned-MAC changes across all VLANs, flattened to (vlan, mac) keys.
    pub fn mac_delta(&self) -> Vec<DeltaChange<MacKey, MacEntry>> {
        let mut changes = Vec::new();
        self.for_each_vlan_pair(|vlan, old_vlan, new_vlan| {
            let old_empty = MacTable::new();
            let new_empty = MacTable::new();
            let old_table = old_vlan.map_or(&old_empty, |v| v.mac_table().as_ref());
            let new_table = new_vlan.map_or(&new_empty, |v| v.mac_table().as_ref());
            if let (Some(o), Some(n)) = (old_vlan, new_vlan) {
                if Arc::ptr_eq(o.mac_table(), n.mac_table()) {
                    return;
                }
            }
            for inner in map_delta(old_table.map(), new_table.map()) {
                changes.push(match inner {
                    DeltaChange::Added(mac, e) => DeltaChange::Added(MacKey::new(vlan, mac), e),
                    DeltaChange::Removed(mac, e) => {
                        DeltaChange::Removed(MacKey::new(vlan, mac), e)
                    }
                    DeltaChange::Changed(mac, o, n) => {
                        DeltaChange::Changed(MacKey::new(vlan, mac), o, n)
                    }
                });
            }
        });
        changes
    }

    /// VLAN membership changes (a VLAN whose inner tables changed shows up as
    /// `Changed` here and with per-entry detail in the flattened categories).
    pub fn vlans_delta(&self) -> Vec<DeltaChange<VlanId, Vlan>> {
        if Arc::ptr_eq(self.old.vlans(), self.new.vlans()) {
            return Vec::new();
        }
        map_delta(self.old.vlans().map(), self.new.vlans().map())
    }

    /// Interface changes.
    pub fn interfaces_delta(&self) -> Vec<DeltaChange<InterfaceId, Interface>> {
        if Arc::ptr_eq(self.old.interfaces(), self.new.interfaces()) {
            return Vec::new();
        }
        map_delta(self.old.interfaces().map(), self.new.interfaces().map())
    }

    /// Walks the union of VLAN ids, handing each pair of (possibly absent)
    /// old/new VLAN nodes to `visit`.
    fn for_each_vlan_pair(&self, mut visit: impl FnMut(VlanId, Option<&Vlan>, Option<&Vlan>)) {
        if Arc::ptr_eq(self.old.vlans(), self.new.vlans()) {
            return;
        }
        for change in map_delta(self.old.vlans().map(), self.new.vlans().map()) {
            match change {
                DeltaChange::Removed(vlan, v) => visit(vlan, Some(v.as_ref()), None),
                DeltaChange::Added(vlan, v) => visit(vlan, None, Some(v.as_ref())),
                DeltaChange::Changed(vlan, o, n) => visit(vlan, Some(o.as_ref()), Some(n.as_ref())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neighbor::NeighborEntry;
    use crate::route::RouteTable;
    use hwsync_types::{IpPrefix, PortId};
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    fn state_with_routes(prefixes: &[&str]) -> Arc<SwitchState> {
        let mut state = Arc::new(SwitchState::new());
        {
            let tables = SwitchState::modify_route_tables(&mut state);
            let table = tables.table_mut_or_insert(RouterId::DEFAULT);
            for p in prefixes {
                table.add_route(Route::new(prefix(p), vec!["10.0.1.1".parse().unwrap()]));
            }
        }
        state.publish();
        state
    }

    #[test]
    fn test_empty_delta() {
        let state = state_with_routes(&["10.0.0.0/24"]);
        let delta = StateDelta::new(Arc::clone(&state), Arc::clone(&state));
        assert!(delta.is_empty());
        assert!(delta.route_delta().is_empty());
        assert!(delta.arp_delta().is_empty());
        assert!(delta.mac_delta().is_empty());
    }

    #[test]
    fn test_route_add_remove_change() {
        let old = state_with_routes(&["10.0.0.0/24", "10.0.1.0/24"]);

        let mut new = Arc::clone(&old);
        {
            let tables = SwitchState::modify_route_tables(&mut new);
            let table = tables.table_mut(RouterId::DEFAULT).unwrap();
            table.remove_route(&prefix("10.0.1.0/24"));
            table.add_route(Route::new(
                prefix("10.0.0.0/24"),
                vec!["10.0.9.9".parse().unwrap()],
            ));
            table.add_route(Route::new(
                prefix("10.0.2.0/24"),
                vec!["10.0.1.1".parse().unwrap()],
            ));
        }
        new.publish();

        let delta = StateDelta::new(old, new);
        let changes = delta.route_delta();
        assert_eq!(changes.len(), 3);

        let mut added = 0;
        let mut removed = 0;
        let mut changed = 0;
        for change in &changes {
            match change {
                DeltaChange::Added(key, _) => {
                    added += 1;
                    assert_eq!(key.prefix, prefix("10.0.2.0/24"));
                }
                DeltaChange::Removed(key, _) => {
                    removed += 1;
                    assert_eq!(key.prefix, prefix("10.0.1.0/24"));
                }
                DeltaChange::Changed(key, old_route, new_route) => {
                    changed += 1;
                    assert_eq!(key.prefix, prefix("10.0.0.0/24"));
                    assert_ne!(old_route.next_hops(), new_route.next_hops());
                }
            }
        }
        assert_eq!((added, removed, changed), (1, 1, 1));
    }

    #[test]
    fn test_unchanged_sibling_categories_short_circuit() {
        let old = state_with_routes(&["10.0.0.0/24"]);
        let mut new = Arc::clone(&old);
        SwitchState::modify_route_tables(&mut new)
            .table_mut(RouterId::DEFAULT)
            .unwrap()
            .add_route(Route::drop(prefix("10.0.7.0/24")));
        new.publish();

        let delta = StateDelta::new(old, new);
        // vlans/interfaces were never touched: the pointer fast path makes
        // those categories trivially empty
        assert!(delta.vlans_delta().is_empty());
        assert!(delta.interfaces_delta().is_empty());
        assert_eq!(delta.route_delta().len(), 1);
    }

    #[test]
    fn test_arp_delta_for_changed_vlan() {
        let vlan_id = VlanId::new(100).unwrap();
        let mut old = Arc::new(SwitchState::new());
        SwitchState::modify_vlans(&mut old).add_vlan(Vlan::new(vlan_id));
        old.publish();

        let mut new = Arc::clone(&old);
        SwitchState::modify_vlans(&mut new)
            .vlan_mut(vlan_id)
            .unwrap()
            .arp_table_mut()
            .add_entry(NeighborEntry::new(
                "10.0.0.1".parse().unwrap(),
                "00:11:22:33:44:55".parse().unwrap(),
                PortId::new(1),
                InterfaceId::new(10),
            ));
        new.publish();

        let delta = StateDelta::new(old, new);
        let arp = delta.arp_delta();
        assert_eq!(arp.len(), 1);
        assert!(matches!(&arp[0], DeltaChange::Added(key, _) if key.vlan == vlan_id));
        // the NDP and MAC tables of that VLAN were untouched
        assert!(delta.ndp_delta().is_empty());
        assert!(delta.mac_delta().is_empty());
        // the VLAN itself shows as changed
        assert!(matches!(
            delta.vlans_delta().as_slice(),
            [DeltaChange::Changed(id, _, _)] if *id == vlan_id
        ));
    }

    #[test]
    fn test_removed_vlan_reports_entries_removed() {
        let vlan_id = VlanId::new(100).unwrap();
        let mut old = Arc::new(SwitchState::new());
        {
            let vlans = SwitchState::modify_vlans(&mut old);
            let mut vlan = Vlan::new(vlan_id);
            vlan.arp_table_mut().add_entry(NeighborEntry::new(
                "10.0.0.1".parse().unwrap(),
                "00:11:22:33:44:55".parse().unwrap(),
                PortId::new(1),
                InterfaceId::new(10),
            ));
            vlans.add_vlan(vlan);
        }
        old.publish();

        let mut new = Arc::clone(&old);
        SwitchState::modify_vlans(&mut new).remove_vlan(vlan_id);
        new.publish();

        let delta = StateDelta::new(old, new);
        assert!(matches!(
            delta.arp_delta().as_slice(),
            [DeltaChange::Removed(key, _)] if key.vlan == vlan_id
        ));
    }

    #[test]
    fn test_delta_applied_to_old_reconstructs_new() {
        let old = state_with_routes(&["10.0.0.0/24", "10.0.1.0/24"]);
        let mut target = Arc::clone(&old);
        {
            let tables = SwitchState::modify_route_tables(&mut target);
            let table = tables.table_mut(RouterId::DEFAULT).unwrap();
            table.remove_route(&prefix("10.0.0.0/24"));
            table.add_route(Route::new(
                prefix("10.0.1.0/24"),
                vec!["10.0.5.5".parse().unwrap()],
            ));
            table.add_route(Route::drop(prefix("172.16.0.0/12")));
        }
        target.publish();

        let delta = StateDelta::new(Arc::clone(&old), Arc::clone(&target));

        // replay the delta on top of the old tree
        let mut replayed = Arc::clone(&old);
        {
            let tables = SwitchState::modify_route_tables(&mut replayed);
            for change in delta.route_delta() {
                match change {
                    DeltaChange::Added(key, route) | DeltaChange::Changed(key, _, route) => {
                        tables
                            .table_mut_or_insert(key.router)
                            .add_route(Route::clone(&route));
                    }
                    DeltaChange::Removed(key, _) => {
                        tables.table_mut(key.router).unwrap().remove_route(&key.prefix);
                    }
                }
            }
        }
        replayed.publish();

        assert_eq!(*replayed, *target);
    }

    #[test]
    #[should_panic(expected = "only defined over published trees")]
    fn test_unpublished_tree_rejected() {
        let published = state_with_routes(&[]);
        let unpublished = Arc::new(SwitchState::new());
        let _ = StateDelta::new(published, unpublished);
    }

    #[test]
    fn test_empty_route_table_map_delta() {
        let a = Arc::new(SwitchState::new());
        a.publish();
        let mut b = Arc::new(SwitchState::new());
        SwitchState::modify_route_tables(&mut b).add_table(RouteTable::new(RouterId::DEFAULT));
        b.publish();

        let delta = StateDelta::new(a, b);
        // a new empty table adds no route entries
        assert!(delta.route_delta().is_empty());
        assert!(!delta.is_empty());
    }
}
