//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::time::Instant;

use crate::af::AddressFamily;
use crate::config::DampingCfg;
use crate::debug::Debug;
use crate::message::{AddStatus, InternalMessage, MsgFlags, RouteLookup};
use crate::peer::PeerInfo;
use crate::table::{RouteTable, TableId, TableType, Tables};

// Stage damping the routes of a peer that flap too often.
//
// Withdrawing a route adds a penalty to its figure of merit. Changing its
// attributes adds half of it. The figure of merit decays exponentially over
// time, and a route is held back while its figure of merit stays above the
// suppress threshold, until it decays below the reuse threshold.
//
// Time only moves forward on `tick`. When damping is disabled, everything
// goes through untouched.
#[derive(Debug)]
pub struct DampingTable<A: AddressFamily> {
    id: TableId,
    parent: Option<TableId>,
    next: Option<TableId>,
    peer: PeerInfo,
    config: DampingCfg,
    clock: Instant,
    entries: BTreeMap<A::IpNetwork, DampEntry<A>>,
}

#[derive(Debug)]
struct DampEntry<A: AddressFamily> {
    merit: u32,
    updated: Instant,
    suppressed: bool,
    // Route held back while suppressed.
    held: Option<InternalMessage<A>>,
}

// ===== impl DampingTable =====

impl<A> DampingTable<A>
where
    A: AddressFamily,
{
    pub fn new(
        id: TableId,
        peer: PeerInfo,
        config: DampingCfg,
    ) -> DampingTable<A> {
        DampingTable {
            id,
            parent: None,
            next: None,
            peer,
            config,
            clock: Instant::now(),
            entries: Default::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_suppressed(&self, prefix: &A::IpNetwork) -> bool {
        self.entries
            .get(prefix)
            .is_some_and(|entry| entry.suppressed)
    }

    // Returns the figure of merit of a route as of its last update.
    pub fn figure_of_merit(&self, prefix: &A::IpNetwork) -> Option<u32> {
        self.entries.get(prefix).map(|entry| entry.merit)
    }

    // Advances the clock to the given time, releasing the routes whose figure
    // of merit decayed below the reuse threshold.
    //
    // Returns true while some route is still being tracked.
    pub fn tick(&mut self, tables: &mut Tables<A>, now: Instant) -> bool {
        if now > self.clock {
            self.clock = now;
        }
        let config = self.config;
        let clock = self.clock;

        let mut released = vec![];
        self.entries.retain(|_, entry| {
            let was_suppressed = entry.suppressed;
            if !entry.update(&config, clock, 0)
                && was_suppressed
                && let Some(msg) = entry.held.take()
            {
                released.push(msg);
            }
            entry.suppressed || entry.merit >= config.reuse / 2
        });

        for mut msg in released {
            Debug::RouteReused(&self.peer, (*msg.prefix()).into()).log();
            msg.flags.insert(MsgFlags::PUSH);
            let next = self.expect_next("add_route");
            tables.add_route(next, msg, self.id);
        }

        !self.entries.is_empty()
    }

    fn entry(&mut self, prefix: A::IpNetwork) -> &mut DampEntry<A> {
        let clock = self.clock;
        self.entries
            .entry(prefix)
            .or_insert_with(|| DampEntry::new(clock))
    }
}

impl<A> RouteTable<A> for DampingTable<A>
where
    A: AddressFamily,
{
    fn id(&self) -> TableId {
        self.id
    }

    fn table_type(&self) -> TableType {
        TableType::Damping
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
        let next = self.expect_next("add_route");
        if !self.config.enabled {
            return tables.add_route(next, msg, self.id);
        }

        let prefix = *msg.prefix();
        let (config, clock) = (self.config, self.clock);
        if let Some(entry) = self.entries.get_mut(&prefix)
            && entry.update(&config, clock, 0)
        {
            Debug::RouteSuppressed(&self.peer, prefix.into(), entry.merit)
                .log();
            entry.held = Some(msg);
            return AddStatus::Unused;
        }
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
        if !self.config.enabled {
            return tables.replace_route(next, old, new, self.id);
        }

        // A route replacing one from a previous peering stands for a
        // withdrawal followed by a new announcement.
        let penalty = if old.from_previous_peering() {
            self.config.penalty
        } else {
            self.config.penalty / 2
        };
        let prefix = *new.prefix();
        let (config, clock) = (self.config, self.clock);
        let entry = self.entry(prefix);
        let held = entry.held.take();
        let suppressed = entry.update(&config, clock, penalty);
        let merit = entry.merit;

        match (held, suppressed) {
            (None, false) => tables.replace_route(next, old, new, self.id),
            (None, true) => {
                Debug::RouteSuppressed(&self.peer, prefix.into(), merit).log();
                self.entry(prefix).held = Some(new);
                tables.delete_route(next, old, self.id);
                AddStatus::Unused
            }
            (Some(_), true) => {
                self.entry(prefix).held = Some(new);
                AddStatus::Unused
            }
            // The old route never made it downstream.
            (Some(_), false) => tables.add_route(next, new, self.id),
        }
    }

    fn delete_route(
        &mut self,
        tables: &mut Tables<A>,
        msg: InternalMessage<A>,
        _caller: TableId,
    ) {
        let next = self.expect_next("delete_route");
        if !self.config.enabled {
            return tables.delete_route(next, msg, self.id);
        }

        let (config, clock) = (self.config, self.clock);
        let entry = self.entry(*msg.prefix());
        let held = entry.held.take();
        entry.update(&config, clock, config.penalty);
        if held.is_none() {
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
        if self.is_suppressed(msg.prefix()) {
            return;
        }
        let next = self.expect_next("route_dump");
        tables.route_dump(next, msg, self.id, dump_peer)
    }

    fn lookup_route(
        &self,
        tables: &Tables<A>,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        if self.is_suppressed(prefix) {
            return None;
        }
        tables.lookup_route(self.parent?, prefix)
    }
}

// ===== impl DampEntry =====

impl<A> DampEntry<A>
where
    A: AddressFamily,
{
    fn new(clock: Instant) -> DampEntry<A> {
        DampEntry {
            merit: 0,
            updated: clock,
            suppressed: false,
            held: None,
        }
    }

    // Decays the figure of merit up to the given time and adds a penalty to
    // it. Returns whether the route is suppressed.
    fn update(
        &mut self,
        config: &DampingCfg,
        clock: Instant,
        penalty: u32,
    ) -> bool {
        let elapsed = clock.saturating_duration_since(self.updated);
        self.merit = config.decay(self.merit, elapsed);
        self.merit = self.merit.saturating_add(penalty).min(config.ceiling());
        self.updated = clock;

        if self.merit > config.suppress {
            self.suppressed = true;
        } else if self.merit < config.reuse {
            self.suppressed = false;
        }
        self.suppressed
    }
}
