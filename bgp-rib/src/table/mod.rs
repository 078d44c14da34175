//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Route table stages of the RIB pipeline.
//!
//! Stages are kept in an arena and linked through [`TableId`]s. A stage
//! processing an operation is checked out of the arena for the duration of
//! the call, which gives it mutable access to itself and to the rest of the
//! pipeline at the same time. Re-entering a stage that is checked out is a
//! wiring bug and aborts.

pub mod aggregation;
pub mod cache;
pub mod damping;
pub mod decision;
pub mod deletion;
pub mod fanout;
pub mod filter;
pub mod nhlookup;
pub mod policy_filter;
pub mod ribin;
pub mod ribout;

use std::cell::RefCell;
use std::rc::Rc;

use enum_as_inner::EnumAsInner;
use generational_arena::{Arena, Index};

use crate::af::AddressFamily;
use crate::attrs::{AttrSets, PathAttributeList};
use crate::message::{AddStatus, GenId, InternalMessage, RouteLookup};
use crate::peer::PeerInfo;
use crate::table::aggregation::AggregationTable;
use crate::table::cache::CacheTable;
use crate::table::damping::DampingTable;
use crate::table::decision::DecisionTable;
use crate::table::deletion::DeletionTable;
use crate::table::fanout::FanoutTable;
use crate::table::filter::FilterTable;
use crate::table::nhlookup::NhLookupTable;
use crate::table::policy_filter::PolicyFilterTable;
use crate::table::ribin::RibInTable;
use crate::table::ribout::RibOutTable;

pub type TableId = Index;

// Kind of a pipeline stage.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TableType {
    RibIn,
    Deletion,
    Damping,
    Filter,
    PolicyFilter,
    Cache,
    NhLookup,
    Decision,
    Aggregation,
    Fanout,
    RibOut,
}

#[derive(Debug, EnumAsInner)]
pub enum Table<A: AddressFamily> {
    RibIn(RibInTable<A>),
    Deletion(DeletionTable<A>),
    Damping(DampingTable<A>),
    Filter(FilterTable<A>),
    PolicyFilter(PolicyFilterTable<A>),
    Cache(CacheTable<A>),
    NhLookup(NhLookupTable<A>),
    Decision(DecisionTable<A>),
    Aggregation(AggregationTable<A>),
    Fanout(FanoutTable<A>),
    RibOut(RibOutTable<A>),
}

// Operations supported by every stage.
//
// Route operations are pushed downstream, each stage forwarding what it
// doesn't consume to its next table. Lookups travel upstream. The default
// implementations simply relay to the neighboring stage.
pub trait RouteTable<A: AddressFamily> {
    fn id(&self) -> TableId;

    fn table_type(&self) -> TableType;

    fn parent(&self) -> Option<TableId>;

    fn set_parent(&mut self, parent: TableId);

    fn next(&self) -> Option<TableId>;

    fn set_next(&mut self, next: TableId);

    fn add_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        let next = self.expect_next("add_route");
        tables.add_route(next, msg, self.id())
    }

    fn replace_route(
        &mut self,
        tables: &mut Tables<A>,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        let next = self.expect_next("replace_route");
        tables.replace_route(next, old, new, self.id())
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        let next = self.expect_next("delete_route");
        tables.delete_route(next, msg, self.id())
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        let next = self.expect_next("route_dump");
        tables.route_dump(next, msg, self.id(), dump_peer)
    }

    fn push(&mut self, tables: &mut Tables<A>, _caller: TableId) {
        let next = self.expect_next("push");
        tables.push(next, self.id())
    }

    fn lookup_route(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        let parent = self.parent()?;
        tables.lookup_route(parent, prefix)
    }

    fn peering_went_down(
        &mut self,
        tables: &mut Tables<A>,
        peer: &PeerInfo,
        genid: GenId,
        _caller: TableId,
    ) {
        if let Some(next) = self.next() {
            tables.peering_went_down(next, peer, genid, self.id());
        }
    }

    fn peering_down_complete(
        &mut self,
        tables: &mut Tables<A>,
        peer: &PeerInfo,
        genid: GenId,
        _caller: TableId,
    ) {
        if let Some(next) = self.next() {
            tables.peering_down_complete(next, peer, genid, self.id());
        }
    }

    fn peering_came_up(
        &mut self,
        tables: &mut Tables<A>,
        peer: &PeerInfo,
        genid: GenId,
        _caller: TableId,
    ) {
        if let Some(next) = self.next() {
            tables.peering_came_up(next, peer, genid, self.id());
        }
    }

    fn expect_next(&self, operation: &str) -> TableId {
        match self.next() {
            Some(next) => next,
            None => panic!(
                "{:?} table has no downstream table for {}",
                self.table_type(),
                operation
            ),
        }
    }
}

// Arena of pipeline stages.
#[derive(Debug)]
pub struct Tables<A: AddressFamily> {
    arena: Arena<Option<Table<A>>>,
    pub attr_sets: Rc<RefCell<AttrSets<PathAttributeList>>>,
}

// ===== impl Table =====

impl<A> Table<A>
where
    A: AddressFamily,
{
    pub fn as_route_table(&self) -> &dyn RouteTable<A> {
        match self {
            Table::RibIn(table) => table,
            Table::Deletion(table) => table,
            Table::Damping(table) => table,
            Table::Filter(table) => table,
            Table::PolicyFilter(table) => table,
            Table::Cache(table) => table,
            Table::NhLookup(table) => table,
            Table::Decision(table) => table,
            Table::Aggregation(table) => table,
            Table::Fanout(table) => table,
            Table::RibOut(table) => table,
        }
    }

    pub fn as_route_table_mut(&mut self) -> &mut dyn RouteTable<A> {
        match self {
            Table::RibIn(table) => table,
            Table::Deletion(table) => table,
            Table::Damping(table) => table,
            Table::Filter(table) => table,
            Table::PolicyFilter(table) => table,
            Table::Cache(table) => table,
            Table::NhLookup(table) => table,
            Table::Decision(table) => table,
            Table::Aggregation(table) => table,
            Table::Fanout(table) => table,
            Table::RibOut(table) => table,
        }
    }

    pub fn table_type(&self) -> TableType {
        self.as_route_table().table_type()
    }
}

// ===== impl Tables =====

impl<A> Tables<A>
where
    A: AddressFamily,
{
    pub fn new(attr_sets: Rc<RefCell<AttrSets<PathAttributeList>>>) -> Self {
        Tables {
            arena: Arena::new(),
            attr_sets,
        }
    }

    // Creates a new stage.
    pub fn insert_with(
        &mut self,
        create: impl FnOnce(TableId) -> Table<A>,
    ) -> TableId {
        self.arena.insert_with(|id| Some(create(id)))
    }

    // Removes a stage. Stages can remove themselves while checked out.
    pub fn remove(&mut self, id: TableId) -> Option<Table<A>> {
        self.arena.remove(id).flatten()
    }

    pub fn contains(&self, id: TableId) -> bool {
        self.arena.contains(id)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    pub fn get(&self, id: TableId) -> &Table<A> {
        match self.arena.get(id) {
            Some(Some(table)) => table,
            Some(None) => panic!("table {id:?} is busy"),
            None => panic!("table {id:?} not found"),
        }
    }

    pub fn get_mut(&mut self, id: TableId) -> &mut Table<A> {
        match self.arena.get_mut(id) {
            Some(Some(table)) => table,
            Some(None) => panic!("table {id:?} is busy"),
            None => panic!("table {id:?} not found"),
        }
    }

    // Runs the given closure with the stage checked out of the arena.
    pub fn with_table<R>(
        &mut self,
        id: TableId,
        f: impl FnOnce(&mut Table<A>, &mut Tables<A>) -> R,
    ) -> R {
        let mut table = match self.arena.get_mut(id) {
            Some(slot) => match slot.take() {
                Some(table) => table,
                None => panic!("table {id:?} re-entered"),
            },
            None => panic!("table {id:?} not found"),
        };
        let ret = f(&mut table, self);
        if let Some(slot) = self.arena.get_mut(id) {
            *slot = Some(table);
        }
        ret
    }

    pub fn set_parent(&mut self, id: TableId, parent: TableId) {
        self.get_mut(id).as_route_table_mut().set_parent(parent);
    }

    pub fn set_next(&mut self, id: TableId, next: TableId) {
        self.get_mut(id).as_route_table_mut().set_next(next);
    }

    // ===== route operations =====

    pub fn add_route(
        &mut self,
        id: TableId,
        msg: InternalMessage<A>,
        caller: TableId,
    ) -> AddStatus {
        self.with_table(id, |table, tables| {
            table.as_route_table_mut().add_route(tables, msg, caller)
        })
    }

    pub fn replace_route(
        &mut self,
        id: TableId,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        caller: TableId,
    ) -> AddStatus {
        self.with_table(id, |table, tables| {
            table
                .as_route_table_mut()
                .replace_route(tables, old, new, caller)
        })
    }

    pub fn delete_route(
        &mut self,
        id: TableId,
        msg: InternalMessage<A>,
        caller: TableId,
    ) {
        self.with_table(id, |table, tables| {
            table.as_route_table_mut().delete_route(tables, msg, caller)
        })
    }

    pub fn route_dump(
        &mut self,
        id: TableId,
        msg: InternalMessage<A>,
        caller: TableId,
        dump_peer: &PeerInfo,
    ) {
        self.with_table(id, |table, tables| {
            table
                .as_route_table_mut()
                .route_dump(tables, msg, caller, dump_peer)
        })
    }

    pub fn push(&mut self, id: TableId, caller: TableId) {
        self.with_table(id, |table, tables| {
            table.as_route_table_mut().push(tables, caller)
        })
    }

    pub fn lookup_route(
        &self,
        id: TableId,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        self.get(id).as_route_table().lookup_route(self, prefix)
    }

    // ===== peering events =====

    pub fn peering_went_down(
        &mut self,
        id: TableId,
        peer: &PeerInfo,
        genid: GenId,
        caller: TableId,
    ) {
        self.with_table(id, |table, tables| {
            table
                .as_route_table_mut()
                .peering_went_down(tables, peer, genid, caller)
        })
    }

    pub fn peering_down_complete(
        &mut self,
        id: TableId,
        peer: &PeerInfo,
        genid: GenId,
        caller: TableId,
    ) {
        self.with_table(id, |table, tables| {
            table
                .as_route_table_mut()
                .peering_down_complete(tables, peer, genid, caller)
        })
    }

    pub fn peering_came_up(
        &mut self,
        id: TableId,
        peer: &PeerInfo,
        genid: GenId,
        caller: TableId,
    ) {
        self.with_table(id, |table, tables| {
            table
                .as_route_table_mut()
                .peering_came_up(tables, peer, genid, caller)
        })
    }

    // ===== route sources =====

    // Dumps the routes stored in a RIB-In or deletion stage to the given
    // peer.
    pub fn dump_routes(&mut self, id: TableId, dump_peer: &PeerInfo) {
        self.with_table(id, |table, tables| match table {
            Table::RibIn(table) => table.dump_routes(tables, dump_peer),
            Table::Deletion(table) => table.dump_routes(tables, dump_peer),
            _ => panic!("{:?} table can't source a dump", table.table_type()),
        })
    }

    pub fn with_rib_in<R>(
        &mut self,
        id: TableId,
        f: impl FnOnce(&mut RibInTable<A>, &mut Tables<A>) -> R,
    ) -> R {
        self.with_table(id, |table, tables| match table {
            Table::RibIn(table) => f(table, tables),
            _ => panic!("{:?} isn't a RIB-In table", table.table_type()),
        })
    }

    pub fn with_deletion<R>(
        &mut self,
        id: TableId,
        f: impl FnOnce(&mut DeletionTable<A>, &mut Tables<A>) -> R,
    ) -> R {
        self.with_table(id, |table, tables| match table {
            Table::Deletion(table) => f(table, tables),
            _ => panic!("{:?} isn't a deletion table", table.table_type()),
        })
    }

    pub fn with_damping<R>(
        &mut self,
        id: TableId,
        f: impl FnOnce(&mut DampingTable<A>, &mut Tables<A>) -> R,
    ) -> R {
        self.with_table(id, |table, tables| match table {
            Table::Damping(table) => f(table, tables),
            _ => panic!("{:?} isn't a damping table", table.table_type()),
        })
    }

    pub fn with_rib_out<R>(
        &mut self,
        id: TableId,
        f: impl FnOnce(&mut RibOutTable<A>, &mut Tables<A>) -> R,
    ) -> R {
        self.with_table(id, |table, tables| match table {
            Table::RibOut(table) => f(table, tables),
            _ => panic!("{:?} isn't a RIB-Out table", table.table_type()),
        })
    }
}

// ===== global functions =====

pub(crate) fn unexpected_operation(
    table_type: TableType,
    operation: &str,
) -> ! {
    panic!("{table_type:?} table can't handle {operation}")
}
