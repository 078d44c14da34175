//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;
use std::sync::Arc;

use crate::af::AddressFamily;
use crate::attrs::PathAttrs;
use crate::bgp_trie::BgpTrie;
use crate::debug::Debug;
use crate::message::{AddStatus, GenId, InternalMessage, RouteLookup};
use crate::peer::PeerInfo;
use crate::route::{AggrMarker, PolicyTags, SubnetRoute};
use crate::table::deletion::DeletionTable;
use crate::table::{
    RouteTable, Table, TableId, TableType, Tables, unexpected_operation,
};

// Ingress stage of a peer, holding the routes received from it.
#[derive(Debug)]
pub struct RibInTable<A: AddressFamily> {
    id: TableId,
    next: Option<TableId>,
    peer: PeerInfo,
    genid: GenId,
    up: bool,
    trie: BgpTrie<A>,
}

// ===== impl RibInTable =====

impl<A> RibInTable<A>
where
    A: AddressFamily,
{
    pub fn new(id: TableId, peer: PeerInfo) -> RibInTable<A> {
        RibInTable {
            id,
            next: None,
            peer,
            genid: 1,
            up: true,
            trie: Default::default(),
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn genid(&self) -> GenId {
        self.genid
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn route_count(&self) -> usize {
        self.trie.route_count()
    }

    pub fn trie(&self) -> &BgpTrie<A> {
        &self.trie
    }

    // Stores a route received from the peer and propagates it downstream,
    // either as a new route or as a replacement of the previous one.
    pub fn add_route(
        &mut self,
        tables: &mut Tables<A>,
        prefix: A::IpNetwork,
        attrs: PathAttrs,
        policy_tags: PolicyTags,
    ) -> AddStatus {
        let next = self.expect_next("add_route");

        // Nothing to do if the route didn't change. Whether it's in use is
        // kept up to date by the decision stage.
        if let Some(old) = self.trie.lookup(&prefix)
            && Arc::ptr_eq(old.attrs(), &attrs)
            && *old.policy_tags() == policy_tags
        {
            return if old.is_in_use() {
                AddStatus::Used
            } else {
                AddStatus::Unused
            };
        }

        let route =
            SubnetRoute::new(prefix, attrs, policy_tags, AggrMarker::Ignore);
        let msg = InternalMessage::new(route.clone(), self.peer, self.genid);
        match self.trie.insert(route) {
            Some(old) => {
                let old_msg = InternalMessage::new(old, self.peer, self.genid);
                let old_route = old_msg.route.clone();
                let status = tables.replace_route(next, old_msg, msg, self.id);
                old_route.unref();
                status
            }
            None => tables.add_route(next, msg, self.id),
        }
    }

    // Withdraws a route previously received from the peer.
    //
    // Returns false if no such route exists.
    pub fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        prefix: &A::IpNetwork,
    ) -> bool {
        let next = self.expect_next("delete_route");
        let Some(route) = self.trie.erase(prefix) else {
            return false;
        };
        let msg = InternalMessage::new(route.clone(), self.peer, self.genid);
        tables.delete_route(next, msg, self.id);
        route.unref();
        true
    }

    // Forwards a push request downstream.
    pub fn push_routes(&mut self, tables: &mut Tables<A>) {
        let next = self.expect_next("push");
        tables.push(next, self.id);
    }

    // Sends all routes to the given peer.
    pub fn dump_routes(
        &mut self,
        tables: &mut Tables<A>,
        dump_peer: &PeerInfo,
    ) {
        let Some(next) = self.next else {
            return;
        };
        for route in self.trie.iter() {
            let msg =
                InternalMessage::new(route.clone(), self.peer, self.genid);
            tables.route_dump(next, msg, self.id, dump_peer);
        }
    }

    // Handles the peering going down.
    //
    // The stored routes are handed over to a new deletion stage placed right
    // after this one, which withdraws them in the background. Returns the
    // new stage, if any.
    pub fn ribin_peering_went_down(
        &mut self,
        tables: &mut Tables<A>,
    ) -> Option<TableId> {
        let next = self.expect_next("peering_went_down");
        self.up = false;
        Debug::PeeringDown(&self.peer, self.genid).log();

        if self.trie.is_empty() {
            tables.peering_went_down(next, &self.peer, self.genid, self.id);
            tables.peering_down_complete(next, &self.peer, self.genid, self.id);
            return None;
        }

        let trie = std::mem::take(&mut self.trie);
        Debug::DeletionStart(&self.peer, self.genid, trie.route_count()).log();
        let deletion = tables.insert_with(|id| {
            Table::Deletion(DeletionTable::new(
                id,
                self.id,
                next,
                self.peer,
                self.genid,
                trie,
            ))
        });
        tables.set_parent(next, deletion);
        self.next = Some(deletion);
        tables.peering_went_down(deletion, &self.peer, self.genid, self.id);
        Some(deletion)
    }

    // Handles the peering coming back up, starting a new generation of
    // routes.
    pub fn ribin_peering_came_up(&mut self, tables: &mut Tables<A>) {
        let next = self.expect_next("peering_came_up");
        self.up = true;
        self.genid = self.genid.wrapping_add(1);
        Debug::PeeringUp(&self.peer, self.genid).log();
        tables.peering_came_up(next, &self.peer, self.genid, self.id);
    }
}

impl<A> RouteTable<A> for RibInTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::RibIn
    }

    fn parent(&self) -> Option<TableId> {
        None
    }

    fn set_parent(&mut self, _parent: TableId) {
        unexpected_operation(TableType::RibIn, "set_parent")
    }

    fn next(&self) -> Option<TableId> {
        self.next
    }

    fn set_next(&mut self, next: TableId) {
        self.next = Some(next);
    }

    fn add_route(
        &mut self,
        _tables: &mut Tables<A>,
        _msg: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        unexpected_operation(TableType::RibIn, "add_route")
    }

    fn replace_route(
        &mut self,
        _tables: &mut Tables<A>,
        _old: InternalMessage<A>,
        _new: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        unexpected_operation(TableType::RibIn, "replace_route")
    }

    fn delete_route(
        &mut self,
        _tables: &mut Tables<A>,
        _msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        unexpected_operation(TableType::RibIn, "delete_route")
    }

    fn route_dump(
        &mut self,
        _tables: &mut Tables<A>,
        _msg: InternalMessage<A>,
        _caller: TableId,
        _dump_peer: &PeerInfo,
    ) {
        unexpected_operation(TableType::RibIn, "route_dump")
    }

    fn push(&mut self, _tables: &mut Tables<A>, _caller: TableId) {
        unexpected_operation(TableType::RibIn, "push")
    }

    fn lookup_route(
        &self,
        _tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        self.trie
            .lookup(prefix)
            .map(|route| RouteLookup::new(Rc::clone(route), self.genid))
    }
}
