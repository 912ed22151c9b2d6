//! Route leaves and the per-router route tables.

use crate::node::{cow_detach, Published, StateNode};
use hwsync_types::{IpAddress, IpPrefix, RouterId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A key identifying a route across all routers: virtual router + prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteKey {
    pub router: RouterId,
    pub prefix: IpPrefix,
}

impl RouteKey {
    pub fn new(router: RouterId, prefix: IpPrefix) -> Self {
        Self { router, prefix }
    }
}

impl fmt::Display for RouteKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.router, self.prefix)
    }
}

/// One hardware-programmable route: prefix plus resolved next hops.
///
/// A leaf is replaced wholesale on change, never field-mutated, so it carries
/// no publish flag. An empty next-hop list is a drop route; a next hop
/// repeated n times carries weight n when the route is expanded into an ECMP
/// group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    prefix: IpPrefix,
    next_hops: Vec<IpAddress>,
}

impl Route {
    /// Creates a route. Next hops are stored sorted; duplicates are preserved
    /// (they express ECMP weight).
    pub fn new(prefix: IpPrefix, mut next_hops: Vec<IpAddress>) -> Self {
        next_hops.sort();
        Self { prefix, next_hops }
    }

    /// Creates a drop (null next-hop) route.
    pub fn drop(prefix: IpPrefix) -> Self {
        Self {
            prefix,
            next_hops: Vec::new(),
        }
    }

    pub fn prefix(&self) -> &IpPrefix {
        &self.prefix
    }

    pub fn next_hops(&self) -> &[IpAddress] {
        &self.next_hops
    }

    pub fn is_drop(&self) -> bool {
        self.next_hops.is_empty()
    }

    /// Returns true if this route expands into an ECMP group in hardware.
    pub fn is_ecmp(&self) -> bool {
        self.next_hops.len() > 1
    }
}

/// Routes of one virtual router, keyed by prefix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTable {
    #[serde(skip)]
    published: Published,
    router: RouterId,
    routes: BTreeMap<IpPrefix, Arc<Route>>,
}

impl RouteTable {
    pub fn new(router: RouterId) -> Self {
        Self {
            published: Published::new(),
            router,
            routes: BTreeMap::new(),
        }
    }

    pub fn router(&self) -> RouterId {
        self.router
    }

    pub fn route(&self, prefix: &IpPrefix) -> Option<&Arc<Route>> {
        self.routes.get(prefix)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&IpPrefix, &Arc<Route>)> {
        self.routes.iter()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Returns true if both the v4 and v6 default routes are present.
    pub fn has_default_routes(&self) -> bool {
        self.routes.contains_key(&IpPrefix::DEFAULT_V4)
            && self.routes.contains_key(&IpPrefix::DEFAULT_V6)
    }

    /// Number of default (catch-all) routes in this table.
    pub fn default_route_count(&self) -> usize {
        self.routes.keys().filter(|p| p.is_default()).count()
    }

    /// Inserts or replaces a route.
    pub fn add_route(&mut self, route: Route) {
        self.published.assert_writable("RouteTable");
        self.routes.insert(*route.prefix(), Arc::new(route));
    }

    pub fn remove_route(&mut self, prefix: &IpPrefix) -> Option<Arc<Route>> {
        self.published.assert_writable("RouteTable");
        self.routes.remove(prefix)
    }

    /// Removes every non-default route.
    pub fn retain_default_routes(&mut self) {
        self.published.assert_writable("RouteTable");
        self.routes.retain(|prefix, _| prefix.is_default());
    }

    pub fn publish(&self) {
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }

    pub(crate) fn map(&self) -> &BTreeMap<IpPrefix, Arc<Route>> {
        &self.routes
    }
}

impl StateNode for RouteTable {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}

/// Route tables keyed by virtual router.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteTableMap {
    #[serde(skip)]
    published: Published,
    tables: BTreeMap<RouterId, Arc<RouteTable>>,
}

impl RouteTableMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn table(&self, router: RouterId) -> Option<&Arc<RouteTable>> {
        self.tables.get(&router)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RouterId, &Arc<RouteTable>)> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn add_table(&mut self, table: RouteTable) {
        self.published.assert_writable("RouteTableMap");
        self.tables.insert(table.router(), Arc::new(table));
    }

    pub fn remove_table(&mut self, router: RouterId) -> Option<Arc<RouteTable>> {
        self.published.assert_writable("RouteTableMap");
        self.tables.remove(&router)
    }

    /// Copy-on-write access to one router's table.
    pub fn table_mut(&mut self, router: RouterId) -> Option<&mut RouteTable> {
        self.published.assert_writable("RouteTableMap");
        self.tables.get_mut(&router).map(cow_detach)
    }

    /// Copy-on-write access to one router's table, creating it if absent.
    pub fn table_mut_or_insert(&mut self, router: RouterId) -> &mut RouteTable {
        self.published.assert_writable("RouteTableMap");
        cow_detach(
            self.tables
                .entry(router)
                .or_insert_with(|| Arc::new(RouteTable::new(router))),
        )
    }

    pub fn publish(&self) {
        for table in self.tables.values() {
            table.publish();
        }
        self.published.set();
    }

    pub fn is_published(&self) -> bool {
        self.published.get()
    }

    pub(crate) fn map(&self) -> &BTreeMap<RouterId, Arc<RouteTable>> {
        &self.tables
    }
}

impl StateNode for RouteTableMap {
    fn publish_flag(&self) -> &Published {
        &self.published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn prefix(s: &str) -> IpPrefix {
        s.parse().unwrap()
    }

    #[test]
    fn test_route_next_hops_sorted() {
        let route = Route::new(
            prefix("10.0.0.0/24"),
            vec!["10.0.1.2".parse().unwrap(), "10.0.1.1".parse().unwrap()],
        );
        let hops: Vec<String> = route.next_hops().iter().map(|h| h.to_string()).collect();
        assert_eq!(hops, vec!["10.0.1.1", "10.0.1.2"]);
        assert!(route.is_ecmp());
    }

    #[test]
    fn test_drop_route() {
        let route = Route::drop(IpPrefix::DEFAULT_V4);
        assert!(route.is_drop());
        assert!(!route.is_ecmp());
    }

    #[test]
    fn test_route_table_defaults() {
        let mut table = RouteTable::new(RouterId::DEFAULT);
        assert!(!table.has_default_routes());

        table.add_route(Route::drop(IpPrefix::DEFAULT_V4));
        table.add_route(Route::drop(IpPrefix::DEFAULT_V6));
        table.add_route(Route::new(
            prefix("10.0.0.0/24"),
            vec!["10.0.1.1".parse().unwrap()],
        ));

        assert!(table.has_default_routes());
        assert_eq!(table.default_route_count(), 2);
        assert_eq!(table.len(), 3);

        table.retain_default_routes();
        assert_eq!(table.len(), 2);
        assert!(table.has_default_routes());
    }

    #[test]
    #[should_panic(expected = "attempted to mutate published RouteTable")]
    fn test_published_table_rejects_mutation() {
        let mut table = RouteTable::new(RouterId::DEFAULT);
        table.publish();
        table.add_route(Route::drop(IpPrefix::DEFAULT_V4));
    }

    #[test]
    fn test_table_map_cow() {
        let mut map = RouteTableMap::new();
        map.table_mut_or_insert(RouterId::DEFAULT)
            .add_route(Route::drop(IpPrefix::DEFAULT_V4));
        map.publish();

        // the published inner table must be cloned before mutation, so the
        // original Arc stays intact
        let published_table = Arc::clone(map.table(RouterId::DEFAULT).unwrap());

        let mut next = map.clone();
        next.table_mut(RouterId::DEFAULT)
            .unwrap()
            .add_route(Route::drop(IpPrefix::DEFAULT_V6));

        assert_eq!(published_table.len(), 1);
        assert_eq!(next.table(RouterId::DEFAULT).unwrap().len(), 2);
        assert!(!Arc::ptr_eq(
            &published_table,
            next.table(RouterId::DEFAULT).unwrap()
        ));
    }
}
