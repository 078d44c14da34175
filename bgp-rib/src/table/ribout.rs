//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::af::{AddressFamily, Safi};
use crate::debug::Debug;
use crate::message::{AddStatus, InternalMessage};
use crate::peer::{PeerHandler, PeerInfo, PeerOutputState, RouteUpdate};
use crate::table::{
    RouteTable, TableId, TableType, Tables, unexpected_operation,
};

// Egress stage of a peer.
//
// Route changes are queued until a push, at which point they are handed to
// the peer's handler. Changes to the same prefix are coalesced while queued.
// Once the handler reports being busy, output is held back until it signals
// otherwise.
#[derive(Debug)]
pub struct RibOutTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    peer: PeerInfo,
    safi: Safi,
    handler: Rc<RefCell<dyn PeerHandler>>,
    queue: BTreeMap<A::IpNetwork, QueuedChange>,
    up: bool,
    busy: bool,
}

#[derive(Clone, Debug)]
enum QueuedChange {
    Add(Change),
    Replace(Change, Change),
    Delete(Change),
}

#[derive(Clone, Debug)]
struct Change {
    update: RouteUpdate,
    ibgp: bool,
}

// ===== impl RibOutTable =====

impl<A> RibOutTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        id: TableId,
        peer: PeerInfo,
        safi: Safi,
        handler: Rc<RefCell<dyn PeerHandler>>,
    ) -> RibOutTable<A> {
        RibOutTable {
            id,
            parent: None,
            peer,
            safi,
            handler,
            queue: Default::default(),
            up: true,
            busy: false,
        }
    }

    pub fn peer(&self) -> &PeerInfo {
        &self.peer
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    // Enables or disables output. Pending output is dropped on disable.
    pub fn set_up(&mut self, up: bool) {
        self.up = up;
        if !up {
            self.queue.clear();
            self.busy = false;
        }
    }

    // Updates the peer information after the peering was reconfigured.
    pub fn set_peer(&mut self, peer: PeerInfo) {
        self.peer = peer;
    }

    // Resumes output after the peer drained its output buffer.
    pub fn output_no_longer_busy(&mut self) {
        if !self.busy {
            return;
        }
        self.busy = false;
        Debug::PeerOutputResume(&self.peer, self.queue.len()).log();
        self.flush();
        if !self.busy {
            self.handler.borrow_mut().output_no_longer_busy();
        }
    }

    fn enqueue(&mut self, prefix: A::IpNetwork, change: QueuedChange) {
        use QueuedChange::{Add, Delete, Replace};

        let merged = match (self.queue.remove(&prefix), change) {
            (None, change) => Some(change),
            // Never sent: forget about it.
            (Some(Add(_)), Delete(_)) => None,
            (Some(Add(_)), Add(new) | Replace(_, new)) => Some(Add(new)),
            (Some(Delete(old)), Add(new) | Replace(_, new)) => {
                Some(Replace(old, new))
            }
            (Some(Delete(old) | Replace(old, _)), Delete(_)) => {
                Some(Delete(old))
            }
            (Some(Replace(old, _)), Add(new) | Replace(_, new)) => {
                Some(Replace(old, new))
            }
        };
        if let Some(change) = merged {
            self.queue.insert(prefix, change);
        }
    }

    // Hands the queued changes to the peer.
    fn flush(&mut self) {
        if !self.up || self.busy || self.queue.is_empty() {
            return;
        }

        let queue = std::mem::take(&mut self.queue);
        let mut handler = self.handler.borrow_mut();
        for change in queue.into_values() {
            match change {
                QueuedChange::Add(new) => {
                    Debug::RouteTx(&self.peer, &new.update).log();
                    handler.add_route(&new.update, new.ibgp, self.safi);
                }
                QueuedChange::Replace(old, new) => {
                    Debug::RouteTx(&self.peer, &new.update).log();
                    handler.replace_route(
                        &old.update,
                        old.ibgp,
                        &new.update,
                        new.ibgp,
                        self.safi,
                    );
                }
                QueuedChange::Delete(old) => {
                    Debug::RouteTx(&self.peer, &old.update).log();
                    handler.delete_route(&old.update, old.ibgp, self.safi);
                }
            }
        }
        if handler.push_packet() == PeerOutputState::Busy {
            self.busy = true;
            Debug::PeerOutputBusy(&self.peer).log();
        }
    }

    fn flush_if_pushed(&mut self, msg_push: bool) {
        if msg_push {
            self.flush();
        }
    }
}

impl<A> RouteTable<A> for RibOutTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::RibOut
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
        unexpected_operation(TableType::RibOut, "set_next")
    }

    fn add_route(
        &mut self,
        _tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        if !self.up {
            return AddStatus::Unused;
        }
        self.enqueue(*msg.prefix(), QueuedChange::Add(Change::from(&msg)));
        self.flush_if_pushed(msg.push());
        AddStatus::Used
    }

    fn replace_route(
        &mut self,
        _tables: &mut Tables<A>,
        old: InternalMessage<A>,
        new: InternalMessage<A>,
        _caller: TableId,
    ) -> AddStatus {
        if !self.up {
            return AddStatus::Unused;
        }
        let change =
            QueuedChange::Replace(Change::from(&old), Change::from(&new));
        self.enqueue(*new.prefix(), change);
        self.flush_if_pushed(new.push());
        AddStatus::Used
    }

    fn delete_route(
        &mut self,
        _tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        if !self.up {
            return;
        }
        self.enqueue(*msg.prefix(), QueuedChange::Delete(Change::from(&msg)));
        self.flush_if_pushed(msg.push());
    }

    fn route_dump(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        caller: TableId,
        _dump_peer: &PeerInfo,
    ) {
        self.add_route(tables, msg, caller);
    }

    fn push(&mut self, _tables: &mut Tables<A>, _caller: TableId) {
        self.flush();
    }
}

// ===== impl Change =====

impl<A> From<&InternalMessage<A>> for Change
where
    A: AddressFamily,
{
    fn from(msg: &InternalMessage<A>) -> Change {
        Change {
            update: RouteUpdate::new((*msg.prefix()).into(), msg.attrs.clone()),
            ibgp: msg.origin.is_ibgp(),
        }
    }
}
