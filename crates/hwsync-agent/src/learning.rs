//! Reference observer for MAC-learning events.
//!
//! On every learning event it folds the learned/aged MAC into a new state
//! tree, applies it through the engine, records the event and wakes any
//! thread blocked in one of the wait calls. Verification code uses it to
//! synchronize with the asynchronous learning pipeline.

use crate::events::{HwEventObserver, ObserverError};
use crate::sync::HwSyncEngine;
use hwsync_state::update_mac_table;
use hwsync_types::{L2Entry, L2EntryUpdateType};
use log::error;
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

pub struct LearningUpdateObserver {
    engine: Arc<HwSyncEngine>,
    data: Mutex<Option<(L2Entry, L2EntryUpdateType)>>,
    cv: Condvar,
}

impl LearningUpdateObserver {
    pub fn new(engine: Arc<HwSyncEngine>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            data: Mutex::new(None),
            cv: Condvar::new(),
        })
    }

    /// Registers with the engine's event bus.
    pub fn start_observing(self: &Arc<Self>) -> Result<(), ObserverError> {
        self.engine.add_observer(&self.as_observer())
    }

    /// Unregisters from the engine's event bus.
    pub fn stop_observing(self: &Arc<Self>) -> Result<(), ObserverError> {
        self.engine.remove_observer(&self.as_observer())
    }

    /// Clears the recorded event so the next wait blocks until a fresh one.
    pub fn reset(&self) {
        *self.data.lock().expect("learning observer lock poisoned") = None;
    }

    /// Blocks until a learning event has been received and returns it.
    pub fn wait_for_learning_update(&self) -> (L2Entry, L2EntryUpdateType) {
        let mut data = self.data.lock().expect("learning observer lock poisoned");
        loop {
            if let Some(update) = data.as_ref() {
                return *update;
            }
            data = self
                .cv
                .wait(data)
                .expect("learning observer lock poisoned");
        }
    }

    /// Bounded variant: returns None if no event arrives within `timeout`.
    pub fn wait_for_learning_update_timeout(
        &self,
        timeout: Duration,
    ) -> Option<(L2Entry, L2EntryUpdateType)> {
        let deadline = Instant::now() + timeout;
        let mut data = self.data.lock().expect("learning observer lock poisoned");
        loop {
            if let Some(update) = data.as_ref() {
                return Some(*update);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (guard, _) = self
                .cv
                .wait_timeout(data, deadline - now)
                .expect("learning observer lock poisoned");
            data = guard;
        }
    }

    fn as_observer(self: &Arc<Self>) -> Arc<dyn HwEventObserver> {
        Arc::clone(self) as Arc<dyn HwEventObserver>
    }
}

impl HwEventObserver for LearningUpdateObserver {
    fn on_mac_learning_update(&self, entry: &L2Entry, update_type: L2EntryUpdateType) {
        let mut data = self.data.lock().expect("learning observer lock poisoned");

        let current = self.engine.programmed_state();
        let updated = update_mac_table(&current, entry, update_type);
        if let Err(e) = self.engine.apply_new_state(updated) {
            error!("failed to apply learning update {}: {}", entry, e);
        }

        *data = Some((*entry, update_type));
        self.cv.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{SimPlatform, SimSwitch};
    use crate::sync::SyncConfig;
    use hwsync_hal::HwBackend;
    use hwsync_state::{SwitchState, Vlan};
    use hwsync_types::{PortId, VlanId};
    use pretty_assertions::assert_eq;
    use std::thread;

    fn bring_up_with_vlan(vlan: VlanId) -> (Arc<SimSwitch>, Arc<HwSyncEngine>) {
        let sim = Arc::new(SimSwitch::new(SimPlatform::extended()));
        let engine =
            HwSyncEngine::bring_up(Arc::clone(&sim) as Arc<dyn HwBackend>, SyncConfig::default())
                .unwrap();
        let mut wanted = engine.programmed_state();
        SwitchState::modify_vlans(&mut wanted).add_vlan(Vlan::new(vlan));
        engine.apply_new_state(wanted).unwrap();
        (sim, engine)
    }

    #[test]
    fn test_learning_event_updates_programmed_state_and_wakes_waiter() {
        let vlan = VlanId::new(100).unwrap();
        let (sim, engine) = bring_up_with_vlan(vlan);

        let observer = LearningUpdateObserver::new(Arc::clone(&engine));
        observer.start_observing().unwrap();

        let entry = L2Entry::new("02:00:00:00:00:01".parse().unwrap(), vlan, PortId::new(3));
        // deliver from a separate thread, as the hardware learning thread
        // would
        let sim_for_thread = Arc::clone(&sim);
        let learner = thread::spawn(move || {
            sim_for_thread.inject_learning_event(entry, L2EntryUpdateType::Learned);
        });

        let (seen, kind) = observer.wait_for_learning_update();
        learner.join().unwrap();
        assert_eq!(seen, entry);
        assert_eq!(kind, L2EntryUpdateType::Learned);

        let programmed = engine.programmed_state();
        assert_eq!(
            programmed
                .vlans()
                .vlan(vlan)
                .unwrap()
                .mac_table()
                .entry(&entry.mac)
                .unwrap()
                .port,
            PortId::new(3)
        );

        // aging removes the entry again
        observer.reset();
        let sim_for_thread = Arc::clone(&sim);
        thread::spawn(move || {
            sim_for_thread.inject_learning_event(entry, L2EntryUpdateType::Aged);
        })
        .join()
        .unwrap();
        let (_, kind) = observer.wait_for_learning_update();
        assert_eq!(kind, L2EntryUpdateType::Aged);
        assert!(engine
            .programmed_state()
            .vlans()
            .vlan(vlan)
            .unwrap()
            .mac_table()
            .is_empty());

        observer.stop_observing().unwrap();
        engine.tear_down();
    }

    #[test]
    fn test_wait_timeout_returns_none_without_event() {
        let vlan = VlanId::new(100).unwrap();
        let (_sim, engine) = bring_up_with_vlan(vlan);

        let observer = LearningUpdateObserver::new(Arc::clone(&engine));
        observer.start_observing().unwrap();
        assert_eq!(
            observer.wait_for_learning_update_timeout(Duration::from_millis(50)),
            None
        );
        observer.stop_observing().unwrap();
        engine.tear_down();
    }

    #[test]
    fn test_double_registration_is_rejected() {
        let vlan = VlanId::new(100).unwrap();
        let (_sim, engine) = bring_up_with_vlan(vlan);

        let observer = LearningUpdateObserver::new(Arc::clone(&engine));
        observer.start_observing().unwrap();
        assert_eq!(
            observer.start_observing(),
            Err(ObserverError::DuplicateObserver)
        );
        observer.stop_observing().unwrap();
        assert_eq!(observer.stop_observing(), Err(ObserverError::NotFound));
        engine.tear_down();
    }
}
