//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::marker::PhantomData;

use bgp_rib_utils::ip::IpAddrExt;

use crate::af::AddressFamily;
use crate::message::{AddStatus, InternalMessage, RouteLookup};
use crate::peer::{PeerInfo, PeerType};
use crate::route::{AggrMarker, SubnetRoute};
use crate::table::{RouteTable, TableId, TableType, Tables};

// Static filters, installed according to the type of the peering.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StaticFilter {
    // Drop routes whose nexthop can't be used.
    UnusableNexthop,
    // Don't send routes learned from an internal peer to internal peers.
    IbgpLoop,
    // Only let through the aggregation copies meant for this type of peer.
    AggregationTags,
}

#[derive(Debug)]
pub struct FilterTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    next: Option<TableId>,
    peer: PeerInfo,
    inbound: bool,
    filters: Vec<StaticFilter>,
    _marker: PhantomData<A>,
}

// ===== impl StaticFilter =====

impl StaticFilter {
    // Returns the filters applying to routes received from a peer.
    pub fn inbound(_peer: &PeerInfo) -> Vec<StaticFilter> {
        vec![StaticFilter::UnusableNexthop]
    }

    // Returns the filters applying to routes sent to a peer.
    pub fn outbound(peer: &PeerInfo) -> Vec<StaticFilter> {
        let mut filters = vec![StaticFilter::AggregationTags];
        if peer.peer_type == PeerType::Internal {
            filters.push(StaticFilter::IbgpLoop);
        }
        filters
    }

    fn accept<A: AddressFamily>(
        &self,
        peer: &PeerInfo,
        route: &SubnetRoute<A>,
        origin: Option<&PeerInfo>,
    ) -> bool {
        match self {
            StaticFilter::UnusableNexthop => {
                route.attrs().value.nexthop.is_usable()
            }
            StaticFilter::IbgpLoop => {
                !(peer.is_ibgp() && origin.is_some_and(PeerInfo::is_ibgp))
            }
            StaticFilter::AggregationTags => match route.aggr() {
                AggrMarker::Ignore | AggrMarker::Eligible { .. } => true,
                AggrMarker::IbgpOnly => peer.peer_type != PeerType::External,
                AggrMarker::EbgpAggregate | AggrMarker::EbgpNotAggregated => {
                    peer.peer_type == PeerType::External
                }
            },
        }
    }
}

// ===== impl FilterTable =====

impl<A> FilterTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        id: TableId,
        peer: PeerInfo,
        inbound: bool,
        filters: Vec<StaticFilter>,
    ) -> FilterTable<A> {
        FilterTable {
            id,
            parent: None,
            next: None,
            peer,
            inbound,
            filters,
            _marker: PhantomData,
        }
    }

    pub fn filters(&self) -> &[StaticFilter] {
        &self.filters
    }

    // Replaces the installed filters.
    pub fn reconfigure(&mut self, peer: PeerInfo, filters: Vec<StaticFilter>) {
        self.peer = peer;
        self.filters = filters;
    }

    fn accept(&self, msg: &InternalMessage<A>) -> bool {
        let accept = self.filters.iter().all(|filter| {
            filter.accept(&self.peer, &msg.route, Some(&msg.origin))
        });
        if self.inbound {
            msg.route.set_filtered(!accept);
        }
        accept
    }
}

impl<A> RouteTable<A> for FilterTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Filter
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
        if !self.accept(&msg) {
            return AddStatus::Filtered;
        }
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
        match (self.accept(&old), self.accept(&new)) {
            (true, true) => tables.replace_route(next, old, new, self.id),
            (true, false) => {
                tables.delete_route(next, old, self.id);
                AddStatus::Filtered
            }
            (false, true) => tables.add_route(next, new, self.id),
            (false, false) => AddStatus::Filtered,
        }
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        if self.accept(&msg) {
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
        if self.accept(&msg) {
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
        tables.lookup_route(parent, prefix).filter(|lookup| {
            self.filters
                .iter()
                .all(|filter| filter.accept(&self.peer, &lookup.route, None))
        })
    }
}
