//! The backend capability trait every ASIC family implements.

use crate::error::HwResult;
use crate::platform::Platform;
use crate::types::{EcmpGroupId, EcmpMember, EgressId, PortStats, RxPacket, TxPacket};
use hwsync_state::{StateDelta, SwitchState};
use hwsync_types::{IpAddress, L2Entry, L2EntryUpdateType, PortId, RouterId};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Callback surface for asynchronous hardware events.
///
/// A backend invokes these on whatever thread drives the corresponding
/// hardware facility (link-scan thread, RX thread, learning thread). The
/// sink must therefore be `Send + Sync` and must not block for long: it
/// stalls the reporting hardware thread.
pub trait HwEventSink: Send + Sync {
    fn link_state_changed(&self, port: PortId, up: bool);
    fn packet_received(&self, pkt: RxPacket);
    fn mac_learning_update(&self, entry: L2Entry, update_type: L2EntryUpdateType);
}

/// One switching ASIC, as seen by the synchronization engine.
///
/// The engine drives programming exclusively through
/// [`Self::apply_delta`]; the read-back methods exist for verification and
/// never mutate hardware state.
pub trait HwBackend: Send + Sync {
    /// The platform/ASIC descriptor for capability queries.
    fn platform(&self) -> &dyn Platform;

    /// Attaches to the hardware and returns the state it currently holds:
    /// the restored tree on a warm start, an empty tree otherwise. The
    /// returned tree is unpublished; the engine publishes it.
    fn init(&self) -> HwResult<Arc<SwitchState>>;

    /// Programs the ASIC with the given delta and returns the state the
    /// hardware actually reached. Backends that cannot apply a delta
    /// partially return the delta's new state on success; backends that
    /// support partial application may return an intermediate tree (and
    /// advertise it via [`Self::reports_partial_application`]).
    fn apply_delta(&self, delta: &StateDelta) -> HwResult<Arc<SwitchState>>;

    /// Registers the sink hardware event callbacks are delivered into.
    /// Replaces any previously registered sink.
    fn register_callbacks(&self, sink: Arc<dyn HwEventSink>);

    /// Unregisters the event sink. After this returns no further events are
    /// delivered; teardown relies on that.
    fn unregister_callbacks(&self);

    /// True if this backend may legitimately achieve less than the requested
    /// state on apply.
    fn reports_partial_application(&self) -> bool {
        false
    }

    /// Serializes whatever the backend needs to re-attach warm into an
    /// opaque blob. Called by the engine after callbacks are unregistered,
    /// before process exit.
    fn serialize_for_warm_restart(&self, state: &SwitchState) -> HwResult<Vec<u8>>;

    // ------------------------------------------------------------------
    // Forwarding-table read-back (verification only)
    // ------------------------------------------------------------------

    /// Extended-API read of one ECMP group's member records (weight-aware).
    /// Only meaningful when the platform supports `ExtendedEcmpApi`.
    fn ecmp_group_members(
        &self,
        group: EcmpGroupId,
        max_paths: usize,
    ) -> HwResult<Vec<EcmpMember>>;

    /// Legacy-API read of one ECMP group as a flat egress-id array.
    fn ecmp_group_egress_ids(
        &self,
        group: EcmpGroupId,
        max_paths: usize,
    ) -> HwResult<Vec<EgressId>>;

    /// Extended-API traversal over all ECMP groups.
    fn traverse_ecmp(&self, visit: &mut dyn FnMut(EcmpGroupId, &[EcmpMember]));

    /// Legacy-API traversal over all ECMP groups.
    fn traverse_ecmp_legacy(&self, visit: &mut dyn FnMut(EcmpGroupId, &[EgressId]));

    /// Resolves the egress handle the hardware currently uses for the given
    /// prefix in the given virtual router, if any route matches exactly.
    fn egress_id_for_route(
        &self,
        ip: IpAddress,
        prefix_len: u8,
        router: RouterId,
    ) -> Option<EgressId>;

    // ------------------------------------------------------------------
    // Packet path and counters
    // ------------------------------------------------------------------

    /// Current per-port counters.
    fn port_stats(&self) -> BTreeMap<PortId, PortStats>;

    /// Injects a packet into the switched pipeline. Returns false if the
    /// hardware rejected it.
    fn send_packet_switched(&self, pkt: TxPacket) -> bool;

    /// Transmits a packet directly out of the given port.
    fn send_packet_out_of_port(&self, pkt: TxPacket, port: PortId) -> bool;
}
