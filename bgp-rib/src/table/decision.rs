//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cmp::{Ordering, Reverse};
use std::collections::BTreeMap;

use tracing::warn;

use crate::af::AddressFamily;
use crate::debug::Debug;
use crate::message::{AddStatus, InternalMessage, MsgFlags, RouteLookup};
use crate::peer::{PeerInfo, PeerType};
use crate::table::{
    RouteTable, TableId, TableType, Tables, unexpected_operation,
};

// Stage selecting the best route of each prefix among all ingress branches.
//
// Only the winning route of a prefix is propagated downstream. When the
// winner goes away, the other branches are looked up for the next best
// route.
#[derive(Debug)]
pub struct DecisionTable<A: AddressFamily> {
    id: TableId,
    next: Option<TableId>,
    // Last stage of each ingress branch, along with the branch's peer.
    parents: BTreeMap<TableId, PeerInfo>,
    winners: BTreeMap<A::IpNetwork, Winner<A>>,
}

#[derive(Debug)]
struct Winner<A: AddressFamily> {
    msg: InternalMessage<A>,
    branch: TableId,
}

// ===== impl DecisionTable =====

impl<A> DecisionTable<A>
where
    A: AddressFamily,
{
    pub fn new(id: TableId) -> DecisionTable<A> {
        DecisionTable {
            id,
            next: None,
            parents: Default::default(),
            winners: Default::default(),
        }
    }

    pub fn add_parent(&mut self, parent: TableId, peer: PeerInfo) {
        self.parents.insert(parent, peer);
    }

    pub fn remove_parent(&mut self, parent: TableId) {
        self.parents.remove(&parent);
    }

    pub fn route_count(&self) -> usize {
        self.winners.len()
    }

    pub fn winner(&self, prefix: &A::IpNetwork) -> Option<&InternalMessage<A>> {
        self.winners.get(prefix).map(|winner| &winner.msg)
    }

    // Looks up the best route available on the branches other than the
    // given one.
    fn best_alternative(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
        exclude: TableId,
    ) -> Option<(TableId, InternalMessage<A>)> {
        self.parents
            .iter()
            .filter(|(branch, _)| **branch != exclude)
            .filter_map(|(branch, peer)| {
                let lookup = tables.lookup_route(*branch, prefix)?;
                Some((*branch, lookup_msg(lookup, *peer)))
            })
            .min_by(|(_, a), (_, b)| compare(a, b))
    }

    // Installs a new winner, returning the previous one.
    fn install(
        &mut self,
        mut msg: InternalMessage<A>,
        branch: TableId,
    ) -> Option<InternalMessage<A>> {
        let prefix = *msg.prefix();
        msg.route.set_is_winner(true, msg.route.igp_metric());
        msg.flags.remove(MsgFlags::PUSH);
        Debug::BestPathFound(prefix.into(), &msg.origin).log();
        let old = self.winners.insert(prefix, Winner { msg, branch })?;
        old.msg.route.set_is_winner(false, 0);
        old.msg.route.set_in_use(false);
        Some(old.msg)
    }

    // Removes the winner of a prefix.
    fn uninstall(&mut self, prefix: &A::IpNetwork) -> Option<Winner<A>> {
        let old = self.winners.remove(prefix)?;
        old.msg.route.set_is_winner(false, 0);
        old.msg.route.set_in_use(false);
        Some(old)
    }

    // Propagates a winner change downstream.
    //
    // The new winner is in use as long as some peer took it.
    fn announce(
        &mut self,
        tables: &mut Tables<A>,
        old: Option<InternalMessage<A>>,
        new: InternalMessage<A>,
        branch: TableId,
    ) -> AddStatus {
        let next = self.expect_next("add_route");
        let new_copy = new.clone();
        let route = new.route.clone();
        self.install(new, branch);
        let status = match old {
            Some(old) => tables.replace_route(next, old, new_copy, self.id),
            None => tables.add_route(next, new_copy, self.id),
        };
        route.set_in_use(status == AddStatus::Used);
        status
    }

    // Handles the loss of the winning route of a prefix, falling back to
    // the best route of the remaining branches.
    fn withdraw(
        &mut self,
        tables: &mut Tables<A>,
        prefix: &A::IpNetwork,
        branch: TableId,
    ) {
        let next = self.expect_next("delete_route");
        let Some(old) = self.uninstall(prefix) else {
            return;
        };
        match self.best_alternative(tables, prefix, branch) {
            Some((alt_branch, alt)) => {
                self.announce(tables, Some(old.msg), alt, alt_branch);
            }
            None => {
                Debug::BestPathNotFound((*prefix).into()).log();
                tables.delete_route(next, old.msg, self.id);
            }
        }
    }
}

impl<A> RouteTable<A> for DecisionTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Decision
    }

    fn parent(&self) -> Option<TableId> {
        None
    }

    fn set_parent(&mut self, _parent: TableId) {
        unexpected_operation(TableType::Decision, "set_parent")
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
        caller: TableId,
    ) -> AddStatus {
        let Some(winner) = self.winners.get(msg.prefix()) else {
            return self.announce(tables, None, msg, caller);
        };

        if winner.branch == caller {
            warn!(prefix = %msg.prefix(), "duplicate route from branch");
            let old = winner.msg.clone();
            return self.replace_route(tables, old, msg, caller);
        }

        if compare(&msg, &winner.msg) == Ordering::Less {
            let old = winner.msg.clone();
            self.announce(tables, Some(old), msg, caller)
        } else {
            AddStatus::Unused
        }
    }

    fn replace_route(
        &mut self,
        tables: &mut Tables<A>,
        _old: InternalMessage<A>,
        new: InternalMessage<A>,
        caller: TableId,
    ) -> AddStatus {
        let prefix = *new.prefix();
        let Some(winner) = self.winners.get(&prefix) else {
            return self.announce(tables, None, new, caller);
        };

        if winner.branch != caller {
            // The replaced route wasn't the winner.
            if compare(&new, &winner.msg) == Ordering::Less {
                let old = winner.msg.clone();
                return self.announce(tables, Some(old), new, caller);
            }
            return AddStatus::Unused;
        }

        // The winner was replaced: compare its replacement against the
        // other branches.
        let old = winner.msg.clone();
        match self.best_alternative(tables, &prefix, caller) {
            Some((alt_branch, alt))
                if compare(&alt, &new) == Ordering::Less =>
            {
                self.announce(tables, Some(old), alt, alt_branch);
                AddStatus::Unused
            }
            _ => self.announce(tables, Some(old), new, caller),
        }
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        caller: TableId,
    ) {
        let prefix = *msg.prefix();
        if self
            .winners
            .get(&prefix)
            .is_some_and(|winner| winner.branch == caller)
        {
            self.withdraw(tables, &prefix, caller);
        }
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        // Only the winners are dumped.
        let Some(winner) = self.winners.get(msg.prefix()) else {
            return;
        };
        if winner.branch != caller {
            return;
        }
        let next = self.expect_next("route_dump");
        tables.route_dump(next, winner.msg.clone(), self.id, dump_peer);
    }

    fn lookup_route(
        &self,
        _tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        self.winners.get(prefix).map(|winner| RouteLookup {
            route: winner.msg.route.clone(),
            genid: winner.msg.genid,
            attrs: winner.msg.attrs.clone(),
        })
    }
}

// ===== helper functions =====

fn lookup_msg<A>(lookup: RouteLookup<A>, origin: PeerInfo) -> InternalMessage<A>
where
    A: AddressFamily,
{
    InternalMessage {
        route: lookup.route,
        attrs: lookup.attrs,
        origin,
        genid: lookup.genid,
        flags: MsgFlags::empty(),
    }
}

// Orders two candidate routes for the same prefix, the best one first.
fn compare<A>(a: &InternalMessage<A>, b: &InternalMessage<A>) -> Ordering
where
    A: AddressFamily,
{
    fn peer_type_rank(peer_type: PeerType) -> u8 {
        match peer_type {
            PeerType::Local => 0,
            PeerType::External => 1,
            PeerType::Internal => 2,
        }
    }

    let key = |msg: &InternalMessage<A>| {
        let attrs = &msg.attrs.value;
        (
            !msg.route.is_nexthop_resolved(),
            Reverse(attrs.local_pref()),
            attrs.med(),
            peer_type_rank(msg.origin.peer_type),
            msg.route.igp_metric(),
            msg.origin.remote_addr,
            msg.origin.id,
        )
    };
    key(a).cmp(&key(b))
}
