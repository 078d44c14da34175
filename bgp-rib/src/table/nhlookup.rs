//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;
use std::rc::Rc;

use bgp_rib_utils::ip::IpAddrExt;

use crate::af::AddressFamily;
use crate::message::{AddStatus, InternalMessage};
use crate::table::{RouteTable, TableId, TableType, Tables};

// Source of nexthop reachability information.
pub trait NexthopResolver: std::fmt::Debug {
    // Returns the IGP metric to reach the given nexthop, or `None` if it's
    // unreachable.
    fn resolve(&self, nexthop: IpAddr) -> Option<u32>;
}

// Resolver treating every usable nexthop as directly connected.
#[derive(Debug, Default)]
pub struct DirectResolver;

// Stage resolving the nexthops of the routes flowing through it.
#[derive(Debug)]
pub struct NhLookupTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    next: Option<TableId>,
    resolver: Rc<dyn NexthopResolver>,
    _marker: std::marker::PhantomData<A>,
}

// ===== impl DirectResolver =====

impl NexthopResolver for DirectResolver {
    fn resolve(&self, nexthop: IpAddr) -> Option<u32> {
        nexthop.is_usable().then_some(0)
    }
}

// ===== impl NhLookupTable =====

impl<A> NhLookupTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        id: TableId,
        resolver: Rc<dyn NexthopResolver>,
    ) -> NhLookupTable<A> {
        NhLookupTable {
            id,
            parent: None,
            next: None,
            resolver,
            _marker: Default::default(),
        }
    }

    fn resolve(&self, msg: &InternalMessage<A>) {
        match self.resolver.resolve(msg.attrs.value.nexthop) {
            Some(metric) => msg.route.set_nexthop_resolved(true, metric),
            None => msg.route.set_nexthop_resolved(false, 0),
        }
    }
}

impl<A> RouteTable<A> for NhLookupTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::NhLookup
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
        self.resolve(&msg);
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
        self.resolve(&new);
        let next = self.expect_next("replace_route");
        tables.replace_route(next, old, new, self.id)
    }
}
