//! The hardware synchronization engine.

use crate::alpm;
use crate::events::{HwEventBus, HwEventObserver, ObserverError};
use hwsync_hal::{HwBackend, HwEventSink, HwResult, PortStats, RxPacket, TxPacket};
use hwsync_state::{
    InterfaceMap, MacTable, NeighborTable, StateDelta, SwitchState, VlanMap,
};
use hwsync_types::{L2Entry, L2EntryUpdateType, PortId};
use log::{debug, error, info, warn};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const PORT_STATS_WAIT_TRIES: usize = 10;
const PORT_STATS_WAIT_INTERVAL: Duration = Duration::from_millis(20);

/// Engine configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncConfig {
    /// Tolerate a backend achieving less than the requested state. When
    /// false (the default), any divergence between requested and achieved
    /// state aborts the process: continuing with unknown forwarding tables
    /// is worse than dying.
    pub allow_partial_application: bool,
}

/// Owns the programmed-state pointer for one hardware backend and is the
/// sole path through which state reaches the ASIC.
///
/// The engine is also the backend's event sink: hardware events arriving on
/// driver threads are fanned out through its [`HwEventBus`] to registered
/// observers.
///
/// `apply_new_state` calls are serialized on an internal lock, but callers
/// should still serialize intent (e.g. a single control-plane thread): two
/// racing applies resolve in lock order, and the loser diffs against the
/// winner's result.
pub struct HwSyncEngine {
    backend: Arc<dyn HwBackend>,
    bus: HwEventBus,
    programmed: Mutex<Option<Arc<SwitchState>>>,
    allow_partial: bool,
    torn_down: AtomicBool,
}

impl HwSyncEngine {
    /// Attaches to the backend and brings the hardware to a usable baseline.
    ///
    /// Ordering matters here: the backend's event callbacks are registered
    /// first, the backend's initial state (cold empty or warm-restored)
    /// becomes the programmed state, and the default-route skeleton is
    /// applied before this function returns — no caller-supplied state can
    /// ever precede the LPM catch-all entries.
    pub fn bring_up(backend: Arc<dyn HwBackend>, config: SyncConfig) -> HwResult<Arc<Self>> {
        let engine = Arc::new(Self {
            backend: Arc::clone(&backend),
            bus: HwEventBus::new(),
            programmed: Mutex::new(None),
            allow_partial: config.allow_partial_application,
            torn_down: AtomicBool::new(false),
        });

        backend.register_callbacks(Arc::clone(&engine) as Arc<dyn HwEventSink>);

        let init_state = backend.init()?;
        init_state.publish();
        info!(
            "attached to {} ({} routers, {} vlans, {} interfaces restored)",
            backend.platform().asic_name(),
            init_state.route_tables().len(),
            init_state.vlans().len(),
            init_state.interfaces().len(),
        );
        *engine
            .programmed
            .lock()
            .expect("programmed-state lock poisoned") = Some(Arc::clone(&init_state));

        engine.apply_new_state(alpm::setup_alpm_state(init_state))?;
        Ok(engine)
    }

    /// The backend this engine drives.
    pub fn backend(&self) -> &Arc<dyn HwBackend> {
        &self.backend
    }

    /// The state currently believed to be programmed in hardware.
    pub fn programmed_state(&self) -> Arc<SwitchState> {
        let programmed = self
            .programmed
            .lock()
            .expect("programmed-state lock poisoned");
        let state = programmed
            .as_ref()
            .expect("programmed state requested before bring_up");
        assert!(
            state.is_published(),
            "programmed state must always be published"
        );
        Arc::clone(state)
    }

    /// Applies a new desired state and returns the state the hardware
    /// actually reached (which becomes the new programmed state).
    ///
    /// A backend error leaves the programmed state untouched and is returned
    /// to the caller; a divergence between requested and achieved state with
    /// partial application disallowed is fatal.
    pub fn apply_new_state(&self, new_state: Arc<SwitchState>) -> HwResult<Arc<SwitchState>> {
        assert!(
            !self.torn_down.load(Ordering::Acquire),
            "apply_new_state called after teardown"
        );
        let mut programmed = self
            .programmed
            .lock()
            .expect("programmed-state lock poisoned");
        let current = Arc::clone(
            programmed
                .as_ref()
                .expect("apply_new_state called before bring_up"),
        );
        if Arc::ptr_eq(&current, &new_state) {
            return Ok(current);
        }

        // the catch-all routes survive every transition
        let new_state = alpm::setup_alpm_state(new_state);
        new_state.publish();

        let delta = StateDelta::new(Arc::clone(&current), Arc::clone(&new_state));
        let achieved = self.backend.apply_delta(&delta)?;

        if Arc::ptr_eq(&achieved, &new_state) || *achieved == *new_state {
            debug!("applied state delta in full");
        } else if self.allow_partial {
            warn!("backend applied a partial state; continuing per configuration");
        } else {
            // the hardware and software models have silently diverged; no
            // further forwarding decision can be trusted
            panic!("hardware achieved state differs from requested state");
        }

        achieved.publish();
        *programmed = Some(Arc::clone(&achieved));
        Ok(achieved)
    }

    /// Tears the hardware state down to the default-route skeleton.
    ///
    /// Callbacks are unregistered first so no late hardware event races the
    /// teardown; the stripped state (routes, ARP/NDP, learned MACs and
    /// interface addresses removed, catch-all routes retained) is applied
    /// last.
    pub fn tear_down(&self) {
        if self.torn_down.load(Ordering::Acquire) {
            return;
        }
        self.backend.unregister_callbacks();

        let stripped = Self::stripped_state(&self.programmed_state());
        match self.apply_new_state(stripped) {
            Ok(state) => {
                let remaining: usize = state
                    .route_tables()
                    .iter()
                    .map(|(_, table)| table.len())
                    .sum();
                info!("hardware stripped to {} skeleton routes", remaining);
            }
            Err(e) => error!("teardown apply failed: {}", e),
        }
        self.torn_down.store(true, Ordering::Release);
    }

    /// Graceful warm-restart exit: unregister callbacks, then hand the
    /// programmed state to the backend for serialization. Returns the opaque
    /// blob to persist; the byte layout is the backend's business.
    pub fn graceful_exit(&self) -> HwResult<Vec<u8>> {
        self.backend.unregister_callbacks();
        let state = self.programmed_state();
        let blob = self.backend.serialize_for_warm_restart(&state)?;
        self.torn_down.store(true, Ordering::Release);
        info!("serialized {} bytes of warm-restart state", blob.len());
        Ok(blob)
    }

    /// Strips everything the teardown ordering rule says must go before the
    /// skeleton is applied: non-default routes, ARP/NDP tables, learned
    /// MACs, interface addresses.
    fn stripped_state(current: &Arc<SwitchState>) -> Arc<SwitchState> {
        let mut stripped = Arc::clone(current);

        {
            let tables = SwitchState::modify_route_tables(&mut stripped);
            let routers: Vec<_> = tables.iter().map(|(router, _)| *router).collect();
            for router in routers {
                if let Some(table) = tables.table_mut(router) {
                    table.retain_default_routes();
                }
            }
        }
        {
            let vlans: &mut VlanMap = SwitchState::modify_vlans(&mut stripped);
            let ids: Vec<_> = vlans.iter().map(|(id, _)| *id).collect();
            for id in ids {
                if let Some(vlan) = vlans.vlan_mut(id) {
                    vlan.reset_arp_table(NeighborTable::new());
                    vlan.reset_ndp_table(NeighborTable::new());
                    vlan.reset_mac_table(MacTable::new());
                }
            }
        }
        {
            let interfaces: &mut InterfaceMap = SwitchState::modify_interfaces(&mut stripped);
            let ids: Vec<_> = interfaces.iter().map(|(id, _)| *id).collect();
            for id in ids {
                if let Some(interface) = interfaces.interface_mut(id) {
                    interface.set_addresses(BTreeMap::new());
                }
            }
        }
        stripped
    }

    // ------------------------------------------------------------------
    // Observer registration (delegated to the bus)
    // ------------------------------------------------------------------

    pub fn add_observer(&self, observer: &Arc<dyn HwEventObserver>) -> Result<(), ObserverError> {
        self.bus.add_observer(observer)
    }

    pub fn remove_observer(
        &self,
        observer: &Arc<dyn HwEventObserver>,
    ) -> Result<(), ObserverError> {
        self.bus.remove_observer(observer)
    }

    pub fn observer_count(&self) -> usize {
        self.bus.observer_count()
    }

    // ------------------------------------------------------------------
    // Bounded polling for hardware-observable effects
    // ------------------------------------------------------------------

    /// Polls the backend's port counters until `condition` holds, with a
    /// fixed number of attempts and a fixed inter-attempt sleep. Returns
    /// false on timeout; absence of an effect within budget is an expected
    /// outcome, not an error.
    pub fn wait_port_stats_condition(
        &self,
        condition: impl Fn(&BTreeMap<PortId, PortStats>) -> bool,
    ) -> bool {
        let mut tries = PORT_STATS_WAIT_TRIES;
        let mut stats = self.backend.port_stats();
        while tries > 0 {
            if condition(&stats) {
                return true;
            }
            thread::sleep(PORT_STATS_WAIT_INTERVAL);
            stats = self.backend.port_stats();
            tries -= 1;
        }
        debug!("awaited port stats condition was never satisfied");
        false
    }

    /// Waits until any port's out-byte counter exceeds its value in
    /// `original`.
    pub fn wait_for_any_port_out_bytes_increment(
        &self,
        original: &BTreeMap<PortId, PortStats>,
    ) -> bool {
        self.wait_port_stats_condition(|stats| {
            original.iter().any(|(port, before)| {
                stats
                    .get(port)
                    .is_some_and(|now| now.out_bytes > before.out_bytes)
            })
        })
    }

    /// Sends a packet through the switched pipeline and confirms some port
    /// actually transmitted bytes.
    pub fn ensure_send_packet_switched(&self, pkt: TxPacket) -> bool {
        let original = self.backend.port_stats();
        let sent = self.backend.send_packet_switched(pkt);
        sent && self.wait_for_any_port_out_bytes_increment(&original)
    }

    /// Sends a packet out of a specific port and confirms the transmit
    /// counters moved.
    pub fn ensure_send_packet_out_of_port(&self, pkt: TxPacket, port: PortId) -> bool {
        let original = self.backend.port_stats();
        let sent = self.backend.send_packet_out_of_port(pkt, port);
        sent && self.wait_for_any_port_out_bytes_increment(&original)
    }
}

/// The engine is the callback target the backend reports into; every event
/// is fanned out to the observer set on the reporting thread.
impl HwEventSink for HwSyncEngine {
    fn link_state_changed(&self, port: PortId, up: bool) {
        self.bus.link_state_changed(port, up);
    }

    fn packet_received(&self, pkt: RxPacket) {
        self.bus.packet_received(&pkt);
    }

    fn mac_learning_update(&self, entry: L2Entry, update_type: L2EntryUpdateType) {
        self.bus.mac_learning_update(&entry, update_type);
    }
}

impl Drop for HwSyncEngine {
    fn drop(&mut self) {
        if !self.torn_down.load(Ordering::Acquire) {
            warn!("HwSyncEngine dropped without tear_down() or graceful_exit()");
        }
    }
}
