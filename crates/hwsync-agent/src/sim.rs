//! In-memory simulated hardware backend.
//!
//! `SimSwitch` implements the full backend capability surface against plain
//! maps: routes resolve to allocated egress handles, multi-path routes are
//! expanded into ECMP groups (repeated next hops become weight), port
//! counters advance when packets are sent, and injected events are delivered
//! synchronously into the registered sink — tests call the inject hooks from
//! spawned threads to reproduce hardware driver-thread delivery.

use hwsync_hal::{
    AsicFeature, EcmpGroupId, EcmpMember, EgressId, HwBackend, HwError, HwEventSink, HwResult,
    Platform, PortStats, RxPacket, TxPacket,
};
use hwsync_state::{StateDelta, SwitchState};
use hwsync_types::{IpAddress, IpPrefix, L2Entry, L2EntryUpdateType, PortId, RouterId};
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Egress handle programmed for drop (null next-hop) routes.
pub const DROP_EGRESS: EgressId = EgressId::new(100000);

const FIRST_NEXTHOP_EGRESS: u32 = 100001;
const FIRST_ECMP_GROUP: u32 = 200001;

/// Simulated platform descriptor; picks which generation of the ECMP read
/// API the "ASIC" exposes.
pub struct SimPlatform {
    name: &'static str,
    extended_ecmp: bool,
}

impl SimPlatform {
    /// A platform with the newer, weight-aware ECMP read API.
    pub fn extended() -> Self {
        Self {
            name: "sim-asic-gen2",
            extended_ecmp: true,
        }
    }

    /// A platform with only the legacy flat ECMP read API.
    pub fn legacy() -> Self {
        Self {
            name: "sim-asic-gen1",
            extended_ecmp: false,
        }
    }
}

impl Platform for SimPlatform {
    fn asic_name(&self) -> &str {
        self.name
    }

    fn supports(&self, feature: AsicFeature) -> bool {
        match feature {
            AsicFeature::ExtendedEcmpApi => self.extended_ecmp,
            AsicFeature::WarmRestart => true,
            AsicFeature::MacLearningEvents => true,
        }
    }
}

#[derive(Default)]
struct SimTables {
    next_egress: u32,
    next_group: u32,
    nexthop_egress: BTreeMap<IpAddress, EgressId>,
    group_by_members: BTreeMap<Vec<(EgressId, u32)>, EcmpGroupId>,
    routes: BTreeMap<(RouterId, IpPrefix), EgressId>,
    live_groups: BTreeMap<EcmpGroupId, Vec<EcmpMember>>,
    port_stats: BTreeMap<PortId, PortStats>,
    applied: Vec<Arc<SwitchState>>,
}

impl SimTables {
    fn new(ports: &[PortId]) -> Self {
        Self {
            next_egress: FIRST_NEXTHOP_EGRESS,
            next_group: FIRST_ECMP_GROUP,
            port_stats: ports.iter().map(|p| (*p, PortStats::default())).collect(),
            ..Self::default()
        }
    }

    fn egress_for_nexthop(&mut self, nexthop: IpAddress) -> EgressId {
        if let Some(egress) = self.nexthop_egress.get(&nexthop) {
            return *egress;
        }
        let egress = EgressId::new(self.next_egress);
        self.next_egress += 1;
        self.nexthop_egress.insert(nexthop, egress);
        egress
    }

    /// Rebuilds the route and ECMP tables to match `state`. Next-hop egress
    /// handles and group ids are stable across calls so read-back stays
    /// comparable over successive applies.
    fn reprogram(&mut self, state: &SwitchState) {
        self.routes.clear();
        self.live_groups.clear();
        for (router, table) in state.route_tables().iter() {
            for (prefix, route) in table.iter() {
                let egress = if route.is_drop() {
                    DROP_EGRESS
                } else if route.next_hops().len() == 1 {
                    self.egress_for_nexthop(route.next_hops()[0])
                } else {
                    let mut weights: BTreeMap<EgressId, u32> = BTreeMap::new();
                    for nexthop in route.next_hops() {
                        let member = self.egress_for_nexthop(*nexthop);
                        *weights.entry(member).or_insert(0) += 1;
                    }
                    let key: Vec<(EgressId, u32)> =
                        weights.iter().map(|(e, w)| (*e, *w)).collect();
                    let next_group = &mut self.next_group;
                    let group = *self.group_by_members.entry(key.clone()).or_insert_with(|| {
                        let group = EcmpGroupId::new(*next_group);
                        *next_group += 1;
                        group
                    });
                    self.live_groups.insert(
                        group,
                        key.iter()
                            .map(|(egress, weight)| EcmpMember::new(*egress, *weight))
                            .collect(),
                    );
                    EgressId::from(group)
                };
                self.routes.insert((*router, *prefix), egress);
            }
        }
    }
}

/// A fully in-memory `HwBackend`.
pub struct SimSwitch {
    platform: SimPlatform,
    route_capacity: Option<usize>,
    partial_apply: bool,
    tables: Mutex<SimTables>,
    sink: Mutex<Option<Arc<dyn HwEventSink>>>,
    warm_state: Mutex<Option<Arc<SwitchState>>>,
}

impl SimSwitch {
    /// A simulated switch with four front-panel ports.
    pub fn new(platform: SimPlatform) -> Self {
        Self::with_ports(
            platform,
            &[PortId::new(1), PortId::new(2), PortId::new(3), PortId::new(4)],
        )
    }

    pub fn with_ports(platform: SimPlatform, ports: &[PortId]) -> Self {
        Self {
            platform,
            route_capacity: None,
            partial_apply: false,
            tables: Mutex::new(SimTables::new(ports)),
            sink: Mutex::new(None),
            warm_state: Mutex::new(None),
        }
    }

    /// Caps the simulated route table at `capacity` entries. With `partial`
    /// set the switch applies as much as fits (default routes first) and
    /// reports the truncated state as achieved; otherwise an over-capacity
    /// apply fails with a table-full error.
    pub fn with_route_capacity(mut self, capacity: usize, partial: bool) -> Self {
        self.route_capacity = Some(capacity);
        self.partial_apply = partial;
        self
    }

    /// Re-attaches warm: `init` will return the state restored from `blob`
    /// instead of an empty tree.
    pub fn from_warm_restart(platform: SimPlatform, blob: &[u8]) -> HwResult<Self> {
        let state: SwitchState =
            serde_json::from_slice(blob).map_err(|e| HwError::warm_restart(e.to_string()))?;
        let sim = Self::new(platform);
        *sim
            .warm_state
            .lock()
            .expect("sim warm-state lock poisoned") = Some(Arc::new(state));
        Ok(sim)
    }

    // ------------------------------------------------------------------
    // Event injection (the "hardware threads" of the simulation)
    // ------------------------------------------------------------------

    pub fn inject_link_event(&self, port: PortId, up: bool) {
        if let Some(sink) = self.current_sink() {
            sink.link_state_changed(port, up);
        }
    }

    pub fn inject_packet(&self, pkt: RxPacket) {
        if let Some(sink) = self.current_sink() {
            sink.packet_received(pkt);
        }
    }

    pub fn inject_learning_event(&self, entry: L2Entry, update_type: L2EntryUpdateType) {
        if let Some(sink) = self.current_sink() {
            sink.mac_learning_update(entry, update_type);
        }
    }

    // ------------------------------------------------------------------
    // Inspection hooks for tests and the demo binary
    // ------------------------------------------------------------------

    /// Every achieved state, in apply order.
    pub fn applied_history(&self) -> Vec<Arc<SwitchState>> {
        self.lock_tables().applied.clone()
    }

    /// Number of routes currently programmed.
    pub fn route_count(&self) -> usize {
        self.lock_tables().routes.len()
    }

    /// True while an event sink is registered.
    pub fn callbacks_registered(&self) -> bool {
        self.sink.lock().expect("sim sink lock poisoned").is_some()
    }

    fn current_sink(&self) -> Option<Arc<dyn HwEventSink>> {
        self.sink.lock().expect("sim sink lock poisoned").clone()
    }

    fn lock_tables(&self) -> std::sync::MutexGuard<'_, SimTables> {
        self.tables.lock().expect("sim tables lock poisoned")
    }
}

/// Keeps the default routes and the first routes that fit; everything past
/// `capacity` is dropped from the achieved state.
fn truncate_routes(state: &Arc<SwitchState>, capacity: usize) -> Arc<SwitchState> {
    let defaults: usize = state
        .route_tables()
        .iter()
        .map(|(_, table)| table.default_route_count())
        .sum();
    let mut budget = capacity.saturating_sub(defaults);

    let mut overflow: Vec<(RouterId, IpPrefix)> = Vec::new();
    for (router, table) in state.route_tables().iter() {
        for (prefix, _) in table.iter() {
            if prefix.is_default() {
                continue;
            }
            if budget > 0 {
                budget -= 1;
            } else {
                overflow.push((*router, *prefix));
            }
        }
    }
    if overflow.is_empty() {
        return Arc::clone(state);
    }

    let mut truncated = Arc::clone(state);
    let tables = SwitchState::modify_route_tables(&mut truncated);
    for (router, prefix) in overflow {
        if let Some(table) = tables.table_mut(router) {
            table.remove_route(&prefix);
        }
    }
    truncated
}

impl HwBackend for SimSwitch {
    fn platform(&self) -> &dyn Platform {
        &self.platform
    }

    fn init(&self) -> HwResult<Arc<SwitchState>> {
        let warm = self
            .warm_state
            .lock()
            .expect("sim warm-state lock poisoned")
            .take();
        match warm {
            Some(state) => {
                self.lock_tables().reprogram(&state);
                debug!("sim: warm init with {} routes", self.route_count());
                Ok(state)
            }
            None => Ok(Arc::new(SwitchState::new())),
        }
    }

    fn apply_delta(&self, delta: &StateDelta) -> HwResult<Arc<SwitchState>> {
        let requested = Arc::clone(delta.new_state());
        let total_routes: usize = requested
            .route_tables()
            .iter()
            .map(|(_, table)| table.len())
            .sum();

        let achieved = match self.route_capacity {
            Some(capacity) if total_routes > capacity => {
                if self.partial_apply {
                    truncate_routes(&requested, capacity)
                } else {
                    return Err(HwError::table_full("l3-route"));
                }
            }
            _ => requested,
        };

        let mut tables = self.lock_tables();
        tables.reprogram(&achieved);
        tables.applied.push(Arc::clone(&achieved));
        debug!(
            "sim: programmed {} routes, {} ecmp groups",
            tables.routes.len(),
            tables.live_groups.len()
        );
        Ok(achieved)
    }

    fn register_callbacks(&self, sink: Arc<dyn HwEventSink>) {
        *self.sink.lock().expect("sim sink lock poisoned") = Some(sink);
    }

    fn unregister_callbacks(&self) {
        *self.sink.lock().expect("sim sink lock poisoned") = None;
    }

    fn reports_partial_application(&self) -> bool {
        self.partial_apply
    }

    fn serialize_for_warm_restart(&self, state: &SwitchState) -> HwResult<Vec<u8>> {
        serde_json::to_vec(state).map_err(|e| HwError::warm_restart(e.to_string()))
    }

    fn ecmp_group_members(
        &self,
        group: EcmpGroupId,
        max_paths: usize,
    ) -> HwResult<Vec<EcmpMember>> {
        let tables = self.lock_tables();
        let members = tables
            .live_groups
            .get(&group)
            .ok_or_else(|| HwError::not_found(group.to_string()))?;
        Ok(members.iter().take(max_paths).copied().collect())
    }

    fn ecmp_group_egress_ids(
        &self,
        group: EcmpGroupId,
        max_paths: usize,
    ) -> HwResult<Vec<EgressId>> {
        let tables = self.lock_tables();
        let members = tables
            .live_groups
            .get(&group)
            .ok_or_else(|| HwError::not_found(group.to_string()))?;
        let mut flat = Vec::new();
        for member in members {
            for _ in 0..member.weight {
                if flat.len() == max_paths {
                    return Ok(flat);
                }
                flat.push(member.egress_id);
            }
        }
        Ok(flat)
    }

    fn traverse_ecmp(&self, visit: &mut dyn FnMut(EcmpGroupId, &[EcmpMember])) {
        let tables = self.lock_tables();
        for (group, members) in &tables.live_groups {
            visit(*group, members);
        }
    }

    fn traverse_ecmp_legacy(&self, visit: &mut dyn FnMut(EcmpGroupId, &[EgressId])) {
        let tables = self.lock_tables();
        for (group, members) in &tables.live_groups {
            let flat: Vec<EgressId> = members
                .iter()
                .flat_map(|m| std::iter::repeat(m.egress_id).take(m.weight as usize))
                .collect();
            visit(*group, &flat);
        }
    }

    fn egress_id_for_route(
        &self,
        ip: IpAddress,
        prefix_len: u8,
        router: RouterId,
    ) -> Option<EgressId> {
        let prefix = IpPrefix::new(ip, prefix_len).ok()?;
        self.lock_tables().routes.get(&(router, prefix)).copied()
    }

    fn port_stats(&self) -> BTreeMap<PortId, PortStats> {
        self.lock_tables().port_stats.clone()
    }

    fn send_packet_switched(&self, pkt: TxPacket) -> bool {
        let mut tables = self.lock_tables();
        let Some((_, stats)) = tables.port_stats.iter_mut().next() else {
            return false;
        };
        stats.out_bytes += pkt.len() as u64;
        stats.out_packets += 1;
        true
    }

    fn send_packet_out_of_port(&self, pkt: TxPacket, port: PortId) -> bool {
        let mut tables = self.lock_tables();
        match tables.port_stats.get_mut(&port) {
            Some(stats) => {
                stats.out_bytes += pkt.len() as u64;
                stats.out_packets += 1;
                true
            }
            None => false,
        }
    }
}
