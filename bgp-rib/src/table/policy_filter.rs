//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;

use ipnetwork::IpNetwork;

use crate::af::AddressFamily;
use crate::message::{AddStatus, InternalMessage, MsgFlags, RouteLookup};
use crate::peer::PeerInfo;
use crate::policy::{
    PolicyResult, RoutePolicy, RoutePolicyInfo, process_policies,
};
use crate::route::{FilterSlot, PolicyFilterKind, SubnetRoute};
use crate::table::{RouteTable, TableId, TableType, Tables};

// Stage running routing policies over the routes flowing through it.
//
// Routes modified by a policy are replaced by a copy referring back to the
// original. Import and source-match verdicts are recorded on the routes, so
// that withdrawals don't need to evaluate the policies again.
#[derive(Debug)]
pub struct PolicyFilterTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    next: Option<TableId>,
    kind: PolicyFilterKind,
    peer: PeerInfo,
    policies: Vec<Rc<dyn RoutePolicy>>,
    _marker: std::marker::PhantomData<A>,
}

// ===== impl PolicyFilterTable =====

impl<A> PolicyFilterTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        id: TableId,
        kind: PolicyFilterKind,
        peer: PeerInfo,
        policies: Vec<Rc<dyn RoutePolicy>>,
    ) -> PolicyFilterTable<A> {
        PolicyFilterTable {
            id,
            parent: None,
            next: None,
            kind,
            peer,
            policies,
            _marker: Default::default(),
        }
    }

    pub fn kind(&self) -> PolicyFilterKind {
        self.kind
    }

    pub fn set_policies(&mut self, policies: Vec<Rc<dyn RoutePolicy>>) {
        self.policies = policies;
    }

    // Runs the policies over a route, returning the message to propagate in
    // its place or `None` if the route was rejected.
    fn filter(
        &self,
        tables: &Tables<A>,
        msg: &InternalMessage<A>,
    ) -> Option<InternalMessage<A>> {
        let route = &msg.route;

        // Use the recorded verdict if possible.
        match route.filter_slot(self.kind) {
            FilterSlot::Accepted if self.kind.is_cached() => {
                return Some(msg.clone());
            }
            FilterSlot::Rejected if self.kind.is_cached() => {
                return None;
            }
            _ => (),
        }
        if self.policies.is_empty() {
            route.set_filter_slot(self.kind, FilterSlot::Accepted);
            return Some(msg.clone());
        }

        let prefix: IpNetwork = (*msg.prefix()).into();
        let rpinfo = RoutePolicyInfo::new(
            msg.origin,
            msg.attrs.value.clone(),
            route.policy_tags().clone(),
            route.aggr(),
        );
        let result = process_policies(
            &self.policies,
            &self.peer,
            &prefix,
            rpinfo.clone(),
        );
        match result {
            PolicyResult::Reject => {
                route.set_filter_slot(self.kind, FilterSlot::Rejected);
                if self.kind == PolicyFilterKind::Import {
                    route.set_filtered(true);
                }
                None
            }
            PolicyResult::Accept(result) if result == rpinfo => {
                route.set_filter_slot(self.kind, FilterSlot::Accepted);
                Some(msg.clone())
            }
            PolicyResult::Accept(result) => {
                route.set_filter_slot(self.kind, FilterSlot::Modified);
                let attrs = tables.attr_sets.borrow_mut().get(&result.attrs);
                let copy = SubnetRoute::derive(
                    route,
                    attrs,
                    result.policy_tags,
                    result.aggr,
                );
                let mut msg = msg.with_route(copy);
                msg.flags.insert(MsgFlags::CHANGED);
                Some(msg)
            }
        }
    }
}

impl<A> RouteTable<A> for PolicyFilterTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::PolicyFilter
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
        let Some(msg) = self.filter(tables, &msg) else {
            return AddStatus::Filtered;
        };
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
        let next = self.expect_next("replace_route");
        let old = self.filter(tables, &old);
        let new = self.filter(tables, &new);
        match (old, new) {
            (Some(old), Some(new)) => {
                tables.replace_route(next, old, new, self.id)
            }
            (Some(old), None) => {
                tables.delete_route(next, old, self.id);
                AddStatus::Filtered
            }
            (None, Some(new)) => tables.add_route(next, new, self.id),
            (None, None) => AddStatus::Filtered,
        }
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        if let Some(msg) = self.filter(tables, &msg) {
            let next = self.expect_next("delete_route");
            tables.delete_route(next, msg, self.id);
        }
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        if let Some(msg) = self.filter(tables, &msg) {
            let next = self.expect_next("route_dump");
            tables.route_dump(next, msg, self.id, dump_peer);
        }
    }

    fn lookup_route(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        let parent = self.parent?;
        let lookup = tables.lookup_route(parent, prefix)?;
        let msg = InternalMessage {
            route: lookup.route,
            attrs: lookup.attrs,
            origin: self.peer,
            genid: lookup.genid,
            flags: MsgFlags::empty(),
        };
        self.filter(tables, &msg).map(|msg| RouteLookup {
            route: msg.route,
            genid: msg.genid,
            attrs: msg.attrs,
        })
    }
}
