//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;

use crate::af::AddressFamily;
use crate::message::{AddStatus, GenId, InternalMessage};
use crate::peer::{PeerId, PeerInfo};
use crate::table::{
    RouteTable, TableId, TableType, Tables, unexpected_operation,
};

// Stage replicating route changes to the egress branch of every peer.
//
// Routes are never sent back to the peer they were learned from.
#[derive(Debug)]
pub struct FanoutTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    branches: BTreeMap<PeerId, FanoutBranch>,
    _marker: std::marker::PhantomData<A>,
}

#[derive(Debug)]
struct FanoutBranch {
    peer: PeerInfo,
    next: TableId,
    up: bool,
}

// ===== impl FanoutTable =====

impl<A> FanoutTable<A>
where
    A: AddressFamily,
{
    pub fn new(id: TableId) -> FanoutTable<A> {
        FanoutTable {
            id,
            parent: None,
            branches: Default::default(),
            _marker: Default::default(),
        }
    }

    // Attaches the egress branch of a peer. The branch starts up.
    pub fn add_branch(&mut self, peer: PeerInfo, next: TableId) {
        let branch = FanoutBranch {
            peer,
            next,
            up: true,
        };
        self.branches.insert(peer.id, branch);
    }

    pub fn remove_branch(&mut self, peer_id: PeerId) {
        self.branches.remove(&peer_id);
    }

    pub fn set_branch_up(&mut self, peer_id: PeerId, up: bool) {
        if let Some(branch) = self.branches.get_mut(&peer_id) {
            branch.up = up;
        }
    }

    pub fn branch_count(&self) -> usize {
        self.branches.len()
    }

    // Returns the branches interested in routes learned from the given
    // peer.
    fn targets(&self, origin: &PeerInfo) -> Vec<TableId> {
        self.branches
            .values()
            .filter(|branch| branch.up && branch.peer.id != origin.id)
            .map(|branch| branch.next)
            .collect()
    }
}

impl<A> RouteTable<A> for FanoutTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Fanout
    }

    fn parent(&self) -> Option<TableId> {
        self.parent
    }

    fn set_parent(&mut self, parent: TableId) {
        self.parent = Some(parent);
    }

    fn next(&self) -> Option<TableId> {
        None
    }

    fn set_next(&mut self, _next: TableId) {
        unexpected_operation(TableType::Fanout, "set_next")
    }

    fn add_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        self.targets(&msg.origin)
            .into_iter()
            .map(|next| tables.add_route(next, msg.clone(), self.id))
            .reduce(AddStatus::merge)
            .unwrap_or(AddStatus::Unused)
    }

    fn replace_route(
        &mut self,
        tables: &mut Tables<A>,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        let mut status = None;
        for branch in self.branches.values().filter(|branch| branch.up) {
            let has_old = branch.peer.id != old.origin.id;
            let has_new = branch.peer.id != new.origin.id;
            let branch_status = match (has_old, has_new) {
                (true, true) => tables.replace_route(
                    branch.next,
                    old.clone(),
                    new.clone(),
                    self.id,
                ),
                (true, false) => {
                    tables.delete_route(branch.next, old.clone(), self.id);
                    continue;
                }
                (false, true) => {
                    tables.add_route(branch.next, new.clone(), self.id)
                }
                (false, false) => continue,
            };
            status = Some(match status {
                Some(status) => AddStatus::merge(status, branch_status),
                None => branch_status,
            });
        }
        status.unwrap_or(AddStatus::Unused)
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        for next in self.targets(&msg.origin) {
            tables.delete_route(next, msg.clone(), self.id);
        }
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        let Some(branch) = self.branches.get(&dump_peer.id) else {
            return;
        };
        if branch.up && msg.origin.id != dump_peer.id {
            tables.route_dump(branch.next, msg, self.id, dump_peer);
        }
    }

    fn push(&mut self, tables: &mut Tables<A>, _caller: TableId) {
        for branch in self.branches.values().filter(|branch| branch.up) {
            tables.push(branch.next, self.id);
        }
    }

    // Peering events concern the ingress side of the pipeline only.
    fn peering_went_down(
        &mut self,
        _tables: &mut Tables<A>,
        _peer: &PeerInfo,
        _genid: GenId,
        _caller: TableId,
    ) {
    }

    fn peering_down_complete(
        &mut self,
        _tables: &mut Tables<A>,
        _peer: &PeerInfo,
        _genid: GenId,
        _caller: TableId,
    ) {
    }

    fn peering_came_up(
        &mut self,
        _tables: &mut Tables<A>,
        _peer: &PeerInfo,
        _genid: GenId,
        _caller: TableId,
    ) {
    }
}
