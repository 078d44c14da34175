//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;

use itertools::Itertools;
use tracing::warn;

use crate::af::AddressFamily;
use crate::message::{AddStatus, GenId, InternalMessage, RouteLookup};
use crate::peer::PeerInfo;
use crate::route::SubnetRoute;
use crate::table::{RouteTable, TableId, TableType, Tables};
use crate::trie::RefTrie;

// Stage remembering the routes modified upstream.
//
// Policy filters create a new copy of a modified route every time it goes
// through them. This stage makes sure the rest of the pipeline always sees
// the copy it was first given.
#[derive(Debug)]
pub struct CacheTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    next: Option<TableId>,
    peer: PeerInfo,
    routes: RefTrie<A::IpNetwork, CachedRoute<A>>,
}

#[derive(Debug)]
struct CachedRoute<A: AddressFamily> {
    route: Rc<SubnetRoute<A>>,
    genid: GenId,
}

// ===== impl CacheTable =====

impl<A> CacheTable<A>
where
    A: AddressFamily,
{
    pub fn new(id: TableId, peer: PeerInfo) -> CacheTable<A> {
        CacheTable {
            id,
            parent: None,
            next: None,
            peer,
            routes: RefTrie::new(),
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes.route_count()
    }

    // Stores the route of a message if it was modified upstream.
    fn store(&mut self, msg: &InternalMessage<A>) {
        if msg.changed() {
            let cached = CachedRoute {
                route: msg.route.clone(),
                genid: msg.genid,
            };
            self.routes.insert(*msg.prefix(), cached);
        }
    }

    // Replaces the route of a message by its cached copy, if any.
    fn substitute(&self, mut msg: InternalMessage<A>) -> InternalMessage<A> {
        if let Some(cached) = self.routes.get(msg.prefix()) {
            msg.route = cached.route.clone();
            msg.attrs = cached.route.attrs().clone();
        }
        msg
    }

    // Like `substitute`, but also drops the cached copy.
    fn take(&mut self, msg: InternalMessage<A>) -> InternalMessage<A> {
        let msg = self.substitute(msg);
        self.routes.erase(msg.prefix());
        msg
    }
}

impl<A> RouteTable<A> for CacheTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Cache
    }

    fn parent(&self) -> Option<TableId> {
        self.parent
    }

    fn set_parent(&mut self, parent: TableId) {
        self.parent = Some(parent);
    }

    fn next(&self) -> Option<TableId> {
        self.next
    }

    fn set_next(&mut self, next: TableId) {
        self.next = Some(next);
    }

    fn add_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        self.store(&msg);
        let next = self.expect_next("add_route");
        tables.add_route(next, msg, self.id)
    }

    fn replace_route(
        &mut self,
        tables: &mut Tables<A>,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        let old = self.take(old);
        self.store(&new);
        let next = self.expect_next("replace_route");
        tables.replace_route(next, old, new, self.id)
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        let msg = self.take(msg);
        let next = self.expect_next("delete_route");
        tables.delete_route(next, msg, self.id)
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        let msg = self.substitute(msg);
        let next = self.expect_next("route_dump");
        tables.route_dump(next, msg, self.id, dump_peer)
    }

    fn lookup_route(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        match self.routes.get(prefix) {
            Some(cached) => {
                Some(RouteLookup::new(cached.route.clone(), cached.genid))
            }
            None => tables.lookup_route(self.parent?, prefix),
        }
    }

    fn peering_down_complete(
        &mut self,
        tables: &mut Tables<A>,
        peer: &PeerInfo,
        genid: GenId,
        _caller: TableId,
    ) {
        // All routes of the old generation must be gone by now.
        let stale = self
            .routes
            .iter()
            .filter(|(_, cached)| cached.genid == genid)
            .map(|(prefix, _)| *prefix)
            .collect_vec();
        if !stale.is_empty() {
            let prefixes = stale.iter().join(", ");
            warn!(peer = %self.peer, %prefixes, "stale cached routes");
            for prefix in stale {
                self.routes.erase(&prefix);
            }
        }

        let next = self.expect_next("peering_down_complete");
        tables.peering_down_complete(next, peer, genid, self.id);
    }
}
