//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bgp_rib_utils::ip::{IpAddrKind, IpNetworkKind};
use serde::Serialize;
use tracing::warn;

use crate::af::AddressFamily;
use crate::attrs::PathAttributeList;
use crate::debug::Debug;
use crate::message::{AddStatus, InternalMessage, RouteLookup};
use crate::peer::PeerInfo;
use crate::route::{AggrMarker, SubnetRoute};
use crate::table::{RouteTable, TableId, TableType, Tables};
use crate::trie::RefTrie;

// Announcement state of an aggregate route.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Serialize)]
pub enum AggrState {
    // No contributing routes.
    NotAnnounced,
    // The aggregate is originated towards external peers.
    Announced,
    // A contributing route has the same prefix as the aggregate, which
    // is therefore not originated.
    Suppressed,
}

// Stage originating aggregate routes.
//
// Routes marked as eligible by policy contribute to the aggregate of the
// prefix length they were marked with. Contributing routes are always
// propagated to internal peers, while external peers get either the
// aggregate, the contributing routes, or both, depending on the aggregate
// state and mode.
#[derive(Debug)]
pub struct AggregationTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    next: Option<TableId>,
    aggregates: RefTrie<A::IpNetwork, AggregateRoute<A>>,
}

#[derive(Debug)]
struct AggregateRoute<A: AddressFamily> {
    prefix: A::IpNetwork,
    // Summary-only mode: don't send contributing routes to external peers.
    brief: bool,
    state: AggrState,
    announced: Option<InternalMessage<A>>,
    components: RefTrie<A::IpNetwork, ComponentRoute<A>>,
}

#[derive(Debug)]
struct ComponentRoute<A: AddressFamily> {
    msg: InternalMessage<A>,
    ibgp: InternalMessage<A>,
    ebgp: Option<InternalMessage<A>>,
}

// ===== impl AggregationTable =====

impl<A> AggregationTable<A>
where
    A: AddressFamily,
{
    pub fn new(id: TableId) -> AggregationTable<A> {
        AggregationTable {
            id,
            parent: None,
            next: None,
            aggregates: RefTrie::new(),
        }
    }

    pub fn aggregate_count(&self) -> usize {
        self.aggregates.route_count()
    }

    pub fn aggregate_state(&self, prefix: &A::IpNetwork) -> Option<AggrState> {
        self.aggregates.get(prefix).map(|aggr| aggr.state)
    }

    pub fn component_count(&self, prefix: &A::IpNetwork) -> usize {
        self.aggregates
            .get(prefix)
            .map(|aggr| aggr.components.route_count())
            .unwrap_or(0)
    }

    // Returns the aggregate entry of the given prefix, creating it if
    // necessary.
    fn aggregate_entry(
        &mut self,
        prefix: A::IpNetwork,
    ) -> &mut AggregateRoute<A> {
        let idx = match self.aggregates.lookup_node(&prefix) {
            Some(idx) => idx,
            None => self.aggregates.insert(prefix, AggregateRoute::new(prefix)),
        };
        match self.aggregates.payload_mut(idx) {
            Some(aggr) => aggr,
            None => unreachable!(),
        }
    }

    fn add_component(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        aggr_prefix: A::IpNetwork,
        brief: bool,
    ) -> AddStatus {
        let (id, next) = (self.id, self.expect_next("add_route"));
        let prefix = *msg.prefix();

        let ibgp = copy_with_aggr(&msg, AggrMarker::IbgpOnly);
        let status = tables.add_route(next, ibgp.clone(), id);

        let aggr = self.aggregate_entry(aggr_prefix);
        aggr.brief = brief;
        let component = ComponentRoute {
            msg,
            ibgp,
            ebgp: None,
        };
        aggr.components.insert(prefix, component);
        reevaluate(tables, id, next, aggr);
        status
    }

    fn delete_component(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        aggr_prefix: A::IpNetwork,
    ) {
        let (id, next) = (self.id, self.expect_next("delete_route"));
        let prefix = *msg.prefix();

        let Some(aggr) = self.aggregates.get_mut(&aggr_prefix) else {
            warn!(%prefix, "unknown aggregate component");
            return tables.delete_route(next, msg, id);
        };
        let Some(component) = aggr.components.get(&prefix) else {
            warn!(%prefix, "unknown aggregate component");
            return tables.delete_route(next, msg, id);
        };
        let ibgp = component.ibgp.clone();
        let ebgp = component.ebgp.clone();
        aggr.components.erase(&prefix);

        tables.delete_route(next, ibgp, id);
        if let Some(ebgp) = ebgp {
            tables.delete_route(next, ebgp, id);
        }
        reevaluate(tables, id, next, aggr);

        if aggr.components.is_empty() && aggr.state == AggrState::NotAnnounced
        {
            self.aggregates.erase(&aggr_prefix);
        }
    }

    // Replaces a component that keeps contributing to the same aggregate.
    fn replace_component(
        &mut self,
        tables: &mut Tables<A>,
        new: InternalMessage<A>,
        aggr_prefix: A::IpNetwork,
        brief: bool,
    ) -> AddStatus {
        let (id, next) = (self.id, self.expect_next("replace_route"));
        let prefix = *new.prefix();

        let Some(component) = self
            .aggregates
            .get_mut(&aggr_prefix)
            .and_then(|aggr| aggr.components.get_mut(&prefix))
        else {
            return self.add_component(tables, new, aggr_prefix, brief);
        };

        let ibgp = copy_with_aggr(&new, AggrMarker::IbgpOnly);
        let old_ibgp = std::mem::replace(&mut component.ibgp, ibgp.clone());
        let status = tables.replace_route(next, old_ibgp, ibgp, id);
        if let Some(old_ebgp) = component.ebgp.take() {
            let ebgp = copy_with_aggr(&new, AggrMarker::EbgpNotAggregated);
            component.ebgp = Some(ebgp.clone());
            tables.replace_route(next, old_ebgp, ebgp, id);
        }
        component.msg = new;

        // The mode might have changed.
        let aggr = self.aggregate_entry(aggr_prefix);
        if aggr.brief != brief {
            aggr.brief = brief;
            reevaluate(tables, id, next, aggr);
        }
        status
    }
}

impl<A> RouteTable<A> for AggregationTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Aggregation
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
        match aggregate_prefix(&msg) {
            Some((aggr_prefix, brief)) => {
                self.add_component(tables, msg, aggr_prefix, brief)
            }
            None => {
                let next = self.expect_next("add_route");
                tables.add_route(next, msg, self.id)
            }
        }
    }

    fn replace_route(
        &mut self,
        tables: &mut Tables<A>,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        caller: TableId,
    ) -> AddStatus {
        match (aggregate_prefix(&old), aggregate_prefix(&new)) {
            (None, None) => {
                let next = self.expect_next("replace_route");
                tables.replace_route(next, old, new, self.id)
            }
            (Some((old_aggr, _)), Some((new_aggr, brief)))
                if old_aggr == new_aggr =>
            {
                self.replace_component(tables, new, new_aggr, brief)
            }
            _ => {
                self.delete_route(tables, old, caller);
                self.add_route(tables, new, caller)
            }
        }
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        match aggregate_prefix(&msg) {
            Some((aggr_prefix, _)) => {
                self.delete_component(tables, msg, aggr_prefix)
            }
            None => {
                let next = self.expect_next("delete_route");
                tables.delete_route(next, msg, self.id)
            }
        }
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        let next = self.expect_next("route_dump");
        let Some((aggr_prefix, _)) = aggregate_prefix(&msg) else {
            return tables.route_dump(next, msg, self.id, dump_peer);
        };
        let Some(aggr) = self.aggregates.get(&aggr_prefix) else {
            return;
        };
        let Some(component) = aggr.components.get(msg.prefix()) else {
            return;
        };

        tables.route_dump(next, component.ibgp.clone(), self.id, dump_peer);
        if let Some(ebgp) = &component.ebgp {
            tables.route_dump(next, ebgp.clone(), self.id, dump_peer);
        }

        // The aggregate goes along with its first component.
        if let Some(announced) = &aggr.announced
            && aggr
                .components
                .iter()
                .next()
                .is_some_and(|(prefix, _)| prefix == msg.prefix())
        {
            tables.route_dump(next, announced.clone(), self.id, dump_peer);
        }
    }

    fn lookup_route(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        if let Some(announced) = self
            .aggregates
            .get(prefix)
            .and_then(|aggr| aggr.announced.as_ref())
        {
            return Some(RouteLookup::new(
                announced.route.clone(),
                announced.genid,
            ));
        }
        tables.lookup_route(self.parent?, prefix)
    }
}

// ===== impl AggregateRoute =====

impl<A> AggregateRoute<A>
where
    A: AddressFamily,
{
    fn new(prefix: A::IpNetwork) -> AggregateRoute<A> {
        AggregateRoute {
            prefix,
            brief: false,
            state: AggrState::NotAnnounced,
            announced: None,
            components: RefTrie::new(),
        }
    }

    fn compute_state(&self) -> AggrState {
        if self.components.is_empty() {
            AggrState::NotAnnounced
        } else if self.components.get(&self.prefix).is_some() {
            AggrState::Suppressed
        } else {
            AggrState::Announced
        }
    }
}

// ===== helper functions =====

// Returns the aggregate a route contributes to, along with the aggregate
// mode.
fn aggregate_prefix<A>(msg: &InternalMessage<A>) -> Option<(A::IpNetwork, bool)>
where
    A: AddressFamily,
{
    let (prefix_len, brief) = msg.route.aggr().eligible()?;
    let route_prefix = msg.prefix();

    // Routes less specific than their aggregate can't contribute to it.
    if prefix_len > route_prefix.prefix() {
        return None;
    }
    let aggr_prefix = A::IpNetwork::new(route_prefix.ip(), prefix_len).ok()?;
    Some((aggr_prefix.apply_mask(), brief))
}

fn copy_with_aggr<A>(
    msg: &InternalMessage<A>,
    aggr: AggrMarker,
) -> InternalMessage<A>
where
    A: AddressFamily,
{
    msg.with_route(SubnetRoute::with_aggr(&msg.route, aggr))
}

// Updates the state of an aggregate after its components changed,
// propagating the resulting changes downstream.
fn reevaluate<A>(
    tables: &mut Tables<A>,
    id: TableId,
    next: TableId,
    aggr: &mut AggregateRoute<A>,
) where
    A: AddressFamily,
{
    let old_state = aggr.state;
    let new_state = aggr.compute_state();

    // Withdraw the aggregate first.
    if old_state == AggrState::Announced
        && new_state != AggrState::Announced
        && let Some(announced) = aggr.announced.take()
    {
        tables.delete_route(next, announced, id);
    }

    // Reconcile the copies of the components sent to external peers.
    let want_ebgp = match new_state {
        AggrState::NotAnnounced => false,
        AggrState::Announced => !aggr.brief,
        AggrState::Suppressed => true,
    };
    let prefixes = aggr
        .components
        .iter()
        .map(|(prefix, _)| *prefix)
        .collect::<Vec<_>>();
    for prefix in prefixes {
        let Some(component) = aggr.components.get_mut(&prefix) else {
            continue;
        };
        match (want_ebgp, component.ebgp.take()) {
            (true, None) => {
                let ebgp = copy_with_aggr(
                    &component.msg,
                    AggrMarker::EbgpNotAggregated,
                );
                component.ebgp = Some(ebgp.clone());
                tables.add_route(next, ebgp, id);
            }
            (false, Some(ebgp)) => {
                tables.delete_route(next, ebgp, id);
            }
            (_, ebgp) => component.ebgp = ebgp,
        }
    }

    // Originate the aggregate.
    if new_state == AggrState::Announced && old_state != AggrState::Announced
    {
        let nexthop = <A::IpAddr as IpAddrKind>::unspecified().into();
        let mut attrs = PathAttributeList::new(nexthop);
        attrs.atomic_aggregate = true;
        let attrs = tables.attr_sets.borrow_mut().get(&attrs);
        let route = SubnetRoute::new(
            aggr.prefix,
            attrs,
            Default::default(),
            AggrMarker::EbgpAggregate,
        );
        let msg = InternalMessage::new(route, PeerInfo::local(nexthop), 0);
        aggr.announced = Some(msg.clone());
        tables.add_route(next, msg, id);
    }

    aggr.state = new_state;
    if old_state != new_state {
        Debug::AggregateTransition(aggr.prefix.into(), old_state, new_state)
            .log();
    }
}
