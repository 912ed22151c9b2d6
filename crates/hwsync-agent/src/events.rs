//! Hardware event observer bus.
//!
//! A synchronous fan-out, not a message queue: events are delivered on
//! whatever thread the hardware backend reports them from (link-scan thread,
//! RX thread, learning thread), under a shared lock over the observer set.
//! Registration changes take the exclusive lock, so they never race a
//! delivery in progress. A slow observer stalls every other observer and the
//! reporting hardware thread — callbacks must not block indefinitely.

use hwsync_hal::RxPacket;
use hwsync_types::{L2Entry, L2EntryUpdateType, PortId};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors from observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ObserverError {
    /// The observer handle is already registered.
    #[error("observer was already added")]
    DuplicateObserver,

    /// The observer handle was never registered (or already removed).
    #[error("observer was never added")]
    NotFound,
}

/// A collaborator interested in asynchronous hardware events. All hooks
/// default to no-ops so observers implement only what they care about.
///
/// Observers must be independent of one another: delivery order within the
/// set is unspecified.
pub trait HwEventObserver: Send + Sync {
    fn on_link_state_changed(&self, _port: PortId, _up: bool) {}
    fn on_packet_received(&self, _pkt: &RxPacket) {}
    fn on_mac_learning_update(&self, _entry: &L2Entry, _update_type: L2EntryUpdateType) {}
}

/// Observer identity is the `Arc` allocation: registering two clones of the
/// same `Arc` is a duplicate, two equal-but-distinct allocations are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ObserverKey(usize);

impl ObserverKey {
    fn of(observer: &Arc<dyn HwEventObserver>) -> Self {
        ObserverKey(Arc::as_ptr(observer) as *const () as usize)
    }
}

/// Thread-safe publish/subscribe fan-out for hardware events.
#[derive(Default)]
pub struct HwEventBus {
    observers: RwLock<BTreeMap<ObserverKey, Arc<dyn HwEventObserver>>>,
}

impl HwEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    ///
    /// # Errors
    ///
    /// `DuplicateObserver` if this handle is already registered.
    pub fn add_observer(&self, observer: &Arc<dyn HwEventObserver>) -> Result<(), ObserverError> {
        let mut observers = self.observers.write().expect("observer set lock poisoned");
        let key = ObserverKey::of(observer);
        if observers.contains_key(&key) {
            return Err(ObserverError::DuplicateObserver);
        }
        observers.insert(key, Arc::clone(observer));
        Ok(())
    }

    /// Unregisters an observer.
    ///
    /// # Errors
    ///
    /// `NotFound` if this handle is not registered.
    pub fn remove_observer(
        &self,
        observer: &Arc<dyn HwEventObserver>,
    ) -> Result<(), ObserverError> {
        let mut observers = self.observers.write().expect("observer set lock poisoned");
        match observers.remove(&ObserverKey::of(observer)) {
            Some(_) => Ok(()),
            None => Err(ObserverError::NotFound),
        }
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers.read().expect("observer set lock poisoned").len()
    }

    /// Delivers a link state change to every observer, synchronously, on the
    /// calling thread.
    pub fn link_state_changed(&self, port: PortId, up: bool) {
        let observers = self.observers.read().expect("observer set lock poisoned");
        for observer in observers.values() {
            observer.on_link_state_changed(port, up);
        }
    }

    /// Delivers a received packet to every observer.
    pub fn packet_received(&self, pkt: &RxPacket) {
        let observers = self.observers.read().expect("observer set lock poisoned");
        for observer in observers.values() {
            observer.on_packet_received(pkt);
        }
    }

    /// Delivers a MAC learning update to every observer.
    pub fn mac_learning_update(&self, entry: &L2Entry, update_type: L2EntryUpdateType) {
        let observers = self.observers.read().expect("observer set lock poisoned");
        for observer in observers.values() {
            observer.on_mac_learning_update(entry, update_type);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hwsync_types::VlanId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct CountingObserver {
        link_events: AtomicUsize,
        packets: AtomicUsize,
        learning_events: AtomicUsize,
        last_link: Mutex<Option<(PortId, bool)>>,
    }

    impl HwEventObserver for CountingObserver {
        fn on_link_state_changed(&self, port: PortId, up: bool) {
            self.link_events.fetch_add(1, Ordering::SeqCst);
            *self.last_link.lock().unwrap() = Some((port, up));
        }

        fn on_packet_received(&self, _pkt: &RxPacket) {
            self.packets.fetch_add(1, Ordering::SeqCst);
        }

        fn on_mac_learning_update(&self, _entry: &L2Entry, _update_type: L2EntryUpdateType) {
            self.learning_events.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn counting() -> (Arc<CountingObserver>, Arc<dyn HwEventObserver>) {
        let concrete = Arc::new(CountingObserver::default());
        let dyn_handle: Arc<dyn HwEventObserver> = Arc::clone(&concrete) as _;
        (concrete, dyn_handle)
    }

    #[test]
    fn test_fan_out_reaches_every_observer_once() {
        let bus = HwEventBus::new();
        let mut handles = Vec::new();
        let mut concretes = Vec::new();
        for _ in 0..5 {
            let (concrete, handle) = counting();
            bus.add_observer(&handle).unwrap();
            concretes.push(concrete);
            handles.push(handle);
        }

        bus.link_state_changed(PortId::new(3), true);

        for concrete in &concretes {
            assert_eq!(concrete.link_events.load(Ordering::SeqCst), 1);
            assert_eq!(
                *concrete.last_link.lock().unwrap(),
                Some((PortId::new(3), true))
            );
        }
    }

    #[test]
    fn test_duplicate_add_rejected() {
        let bus = HwEventBus::new();
        let (_concrete, handle) = counting();
        bus.add_observer(&handle).unwrap();
        assert_eq!(
            bus.add_observer(&handle),
            Err(ObserverError::DuplicateObserver)
        );
        // a clone of the same Arc is the same observer
        let clone = Arc::clone(&handle);
        assert_eq!(
            bus.add_observer(&clone),
            Err(ObserverError::DuplicateObserver)
        );
    }

    #[test]
    fn test_remove_missing_rejected() {
        let bus = HwEventBus::new();
        let (_concrete, handle) = counting();
        assert_eq!(bus.remove_observer(&handle), Err(ObserverError::NotFound));

        bus.add_observer(&handle).unwrap();
        bus.remove_observer(&handle).unwrap();
        assert_eq!(bus.remove_observer(&handle), Err(ObserverError::NotFound));
        assert_eq!(bus.observer_count(), 0);
    }

    #[test]
    fn test_removed_observer_stops_receiving() {
        let bus = HwEventBus::new();
        let (a_concrete, a) = counting();
        let (b_concrete, b) = counting();
        bus.add_observer(&a).unwrap();
        bus.add_observer(&b).unwrap();

        bus.packet_received(&RxPacket::new(PortId::new(1), vec![0xde, 0xad]));
        bus.remove_observer(&a).unwrap();
        bus.packet_received(&RxPacket::new(PortId::new(1), vec![0xbe, 0xef]));

        assert_eq!(a_concrete.packets.load(Ordering::SeqCst), 1);
        assert_eq!(b_concrete.packets.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_delivery_from_foreign_thread() {
        let bus = Arc::new(HwEventBus::new());
        let (concrete, handle) = counting();
        bus.add_observer(&handle).unwrap();

        let entry = L2Entry::new(
            "02:00:00:00:00:01".parse().unwrap(),
            VlanId::new(100).unwrap(),
            PortId::new(2),
        );
        let bus_for_thread = Arc::clone(&bus);
        std::thread::spawn(move || {
            bus_for_thread.mac_learning_update(&entry, L2EntryUpdateType::Learned);
        })
        .join()
        .unwrap();

        assert_eq!(concrete.learning_events.load(Ordering::SeqCst), 1);
    }
}
