//! Versioned, copy-on-write switch state for the switch-hwsync control plane.
//!
//! The central type is [`SwitchState`]: an immutable, reference-counted tree
//! of forwarding-relevant entities (route tables, VLANs with their ARP/NDP
//! and MAC tables, layer-3 interfaces). A state tree is built unpublished,
//! [`published`](SwitchState::publish) exactly once, and from then on can only
//! be superseded by a new tree produced through the copy-on-write `modify`
//! accessors — unmodified sub-trees are shared between versions by `Arc`.
//!
//! [`StateDelta`] is the derived view over two published trees that the
//! hardware synchronization engine consumes: per-category lists of added,
//! removed and changed entries, computed by value with a pointer-equality
//! fast path that structural sharing makes sound.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use hwsync_state::{Route, SwitchState};
//! use hwsync_types::RouterId;
//!
//! let mut state = Arc::new(SwitchState::new());
//! let tables = SwitchState::modify_route_tables(&mut state);
//! let table = tables.table_mut_or_insert(RouterId::DEFAULT);
//! table.add_route(Route::drop("10.0.0.0/24".parse().unwrap()));
//! state.publish();
//! ```

mod delta;
mod interface;
mod mac_table;
mod neighbor;
mod node;
mod route;
mod switch_state;
mod vlan;

pub use delta::{DeltaChange, StateDelta};
pub use interface::{Interface, InterfaceMap};
pub use mac_table::{update_mac_table, MacEntry, MacKey, MacTable};
pub use neighbor::{NeighborEntry, NeighborKey, NeighborTable};
pub use route::{Route, RouteKey, RouteTable, RouteTableMap};
pub use switch_state::SwitchState;
pub use vlan::{Vlan, VlanMap};
