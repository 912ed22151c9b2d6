//! switch-hwsync agent: reconciles declarative forwarding state with the
//! hardware tables of a switching ASIC.
//!
//! # Architecture
//!
//! ```text
//! [caller]──builds──> SwitchState ──┐
//!                                   ├──> [HwSyncEngine] ──delta──> [HwBackend] ──> ASIC
//!           programmed state <──────┘          ▲
//!                                              │ events (link scan / RX / learning)
//!                                       [HwEventBus] ──fan-out──> observers
//! ```
//!
//! A caller builds a new [`SwitchState`](hwsync_state::SwitchState) snapshot,
//! the [`HwSyncEngine`](sync::HwSyncEngine) diffs it against the currently
//! programmed snapshot and drives the backend; the achieved state becomes the
//! new programmed state. Asynchronous hardware events flow back through the
//! engine's [`HwEventBus`](events::HwEventBus) to any registered observers,
//! and the [`verify`] utilities read programmed tables straight back out of
//! the hardware for comparison.
//!
//! # Key components
//!
//! - [`sync::HwSyncEngine`]: owns the programmed-state pointer, enforces
//!   default-route (ALPM) ordering on bring-up and teardown
//! - [`events::HwEventBus`]: thread-safe synchronous observer fan-out
//! - [`learning::LearningUpdateObserver`]: reference observer that folds
//!   MAC-learning events back into the state tree
//! - [`verify`]: ECMP read-back across both vendor API generations
//! - [`sim::SimSwitch`]: in-memory backend used by the `hwagent` binary and
//!   the test suite

pub mod alpm;
pub mod events;
pub mod learning;
pub mod sim;
pub mod sync;
pub mod verify;

pub use events::{HwEventBus, HwEventObserver, ObserverError};
pub use learning::LearningUpdateObserver;
pub use sim::{SimPlatform, SimSwitch};
pub use sync::{HwSyncEngine, SyncConfig};
pub use verify::VerifyError;
