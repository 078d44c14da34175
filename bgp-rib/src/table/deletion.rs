//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;

use crate::af::AddressFamily;
use crate::bgp_trie::BgpTrie;
use crate::debug::Debug;
use crate::message::{
    AddStatus, GenId, InternalMessage, MsgFlags, RouteLookup,
};
use crate::peer::PeerInfo;
use crate::route::SubnetRoute;
use crate::table::{RouteTable, TableId, TableType, Tables};

// Stage withdrawing the routes of a peering that went down.
//
// The table sits right after the peer's RIB-In and holds the routes the
// peering had when it went down. Until they are all withdrawn, it keeps
// answering lookups for them and turns a re-announcement of one of them
// into a single replacement. Each call to `step` withdraws the routes of one
// chain. Once empty, the table removes itself from the pipeline.
#[derive(Debug)]
pub struct DeletionTable<A: AddressFamily> {
    id: TableId,
    parent: TableId,
    next: TableId,
    peer: PeerInfo,
    genid: GenId,
    trie: BgpTrie<A>,
}

// ===== impl DeletionTable =====

impl<A> DeletionTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        id: TableId,
        parent: TableId,
        next: TableId,
        peer: PeerInfo,
        genid: GenId,
        trie: BgpTrie<A>,
    ) -> DeletionTable<A> {
        DeletionTable {
            id,
            parent,
            next,
            peer,
            genid,
            trie,
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn genid(&self) -> GenId {
        self.genid
    }

    pub fn route_count(&self) -> usize {
        self.trie.route_count()
    }

    pub fn chain_count(&self) -> usize {
        self.trie.chain_count()
    }

    // Withdraws the routes of the next chain.
    //
    // Returns true once all routes were withdrawn, in which case the table
    // was removed from the pipeline.
    pub fn step(&mut self, tables: &mut Tables<A>) -> bool {
        if let Some((chain, prefixes)) = self.trie.first_chain() {
            Debug::DeletionChain(&self.peer, chain, prefixes.len()).log();

            for prefix in prefixes {
                let Some(idx) = self.trie.lookup_node(&prefix) else {
                    continue;
                };
                let noderef = self.trie.acquire(idx);
                if let Some(route) = self.trie.erase_node(idx) {
                    let msg = self.message(route.clone());
                    tables.delete_route(self.next, msg, self.id);
                    route.unref();
                }
                self.trie.release(noderef);
            }
            tables.push(self.next, self.id);
        }

        if !self.trie.is_empty() {
            return false;
        }

        // Unplumb.
        Debug::PeeringDownComplete(&self.peer, self.genid).log();
        tables.peering_down_complete(
            self.next,
            &self.peer,
            self.genid,
            self.id,
        );
        tables.set_next(self.parent, self.next);
        tables.set_parent(self.next, self.parent);
        tables.remove(self.id);
        true
    }

    // Sends the routes not withdrawn yet to the given peer.
    pub fn dump_routes(
        &mut self,
        tables: &mut Tables<A>,
        dump_peer: &PeerInfo,
    ) {
        for route in self.trie.iter() {
            let msg = self.message(route.clone());
            tables.route_dump(self.next, msg, self.id, dump_peer);
        }
    }

    fn message(&self, route: Rc<SubnetRoute<A>>) -> InternalMessage<A> {
        InternalMessage::new(route, self.peer, self.genid)
    }

    fn assert_absent(&self, prefix: &A::IpNetwork, operation: &str) {
        if self.trie.lookup(prefix).is_some() {
            panic!(
                "{} for {} present in deletion table of {}",
                operation, prefix, self.peer
            );
        }
    }
}

impl<A> RouteTable<A> for DeletionTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Deletion
    }

    fn parent(&self) -> Option<TableId> {
        Some(self.parent)
    }

    fn set_parent(&mut self, parent: TableId) {
        self.parent = parent;
    }

    fn next(&self) -> Option<TableId> {
        Some(self.next)
    }

    fn set_next(&mut self, next: TableId) {
        self.next = next;
    }

    fn add_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        // The route was re-announced before being withdrawn: replace it.
        match self.trie.erase(msg.prefix()) {
            Some(old) => {
                let mut old_msg = self.message(old.clone());
                old_msg.flags.insert(MsgFlags::FROM_PREVIOUS_PEERING);
                let status =
                    tables.replace_route(self.next, old_msg, msg, self.id);
                old.unref();
                status
            }
            None => tables.add_route(self.next, msg, self.id),
        }
    }

    fn replace_route(
        &mut self,
        tables: &mut Tables<A>,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        self.assert_absent(old.prefix(), "replace_route");
        tables.replace_route(self.next, old, new, self.id)
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        self.assert_absent(msg.prefix(), "delete_route");
        tables.delete_route(self.next, msg, self.id)
    }

    fn lookup_route(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        match self.trie.lookup(prefix) {
            Some(route) => Some(RouteLookup::new(Rc::clone(route), self.genid)),
            None => tables.lookup_route(self.parent, prefix),
        }
    }
}
