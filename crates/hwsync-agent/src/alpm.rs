//! Default-route handling for ALPM-style LPM hardware.
//!
//! Algorithmic LPM engines require their catch-all (default) routes to exist
//! continuously: before any other route is programmed and until after every
//! other route is gone. [`setup_alpm_state`] is the single place that
//! guarantees the skeleton; the synchronization engine runs every requested
//! state through it.

use hwsync_state::{Route, SwitchState};
use hwsync_types::{IpPrefix, RouterId};
use std::sync::Arc;

/// Number of routes in the minimal ALPM skeleton (v4 + v6 default).
pub const MIN_ALPM_ROUTE_COUNT: usize = 2;

/// Returns a state guaranteed to carry drop default routes (v4 and v6) in
/// the default virtual router. If `state` already satisfies that, it is
/// returned untouched; otherwise a copy-on-write successor is produced.
pub fn setup_alpm_state(state: Arc<SwitchState>) -> Arc<SwitchState> {
    let satisfied = state
        .route_tables()
        .table(RouterId::DEFAULT)
        .is_some_and(|table| table.has_default_routes());
    if satisfied {
        return state;
    }

    let mut with_defaults = state;
    let table =
        SwitchState::modify_route_tables(&mut with_defaults).table_mut_or_insert(RouterId::DEFAULT);
    if table.route(&IpPrefix::DEFAULT_V4).is_none() {
        table.add_route(Route::drop(IpPrefix::DEFAULT_V4));
    }
    if table.route(&IpPrefix::DEFAULT_V6).is_none() {
        table.add_route(Route::drop(IpPrefix::DEFAULT_V6));
    }
    with_defaults
}

/// True if the state carries the full default-route skeleton.
pub fn has_alpm_skeleton(state: &SwitchState) -> bool {
    state
        .route_tables()
        .table(RouterId::DEFAULT)
        .is_some_and(|table| table.has_default_routes())
}
