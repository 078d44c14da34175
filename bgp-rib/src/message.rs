//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::af::AddressFamily;
use crate::attrs::PathAttrs;
use crate::peer::PeerInfo;
use crate::route::SubnetRoute;

// Generation of a peer's RIB-In, bumped every time the peering comes up.
pub type GenId = u32;

// Envelope of a route traveling through the pipeline.
#[derive(Debug)]
pub struct InternalMessage<A: AddressFamily> {
    pub route: Rc<SubnetRoute<A>>,
    pub attrs: PathAttrs,
    pub origin: PeerInfo,
    pub genid: GenId,
    pub flags: MsgFlags,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct MsgFlags: u8 {
        // The route was modified by a stage of the pipeline.
        const CHANGED = 0x01;
        // The message isn't part of a batch closed by a push, so the egress
        // stages should send it right away.
        const PUSH = 0x02;
        // The route belongs to a peering that has since gone down.
        const FROM_PREVIOUS_PEERING = 0x04;
    }
}

// Outcome of propagating a new route downstream.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AddStatus {
    // The route made it to at least one peer.
    Used,
    // The route was accepted but isn't used (e.g. not the best one).
    Unused,
    // The route was rejected by a filter.
    Filtered,
}

// Result of a route lookup.
#[derive(Debug)]
pub struct RouteLookup<A: AddressFamily> {
    pub route: Rc<SubnetRoute<A>>,
    pub genid: GenId,
    pub attrs: PathAttrs,
}

// ===== impl InternalMessage =====

impl<A> InternalMessage<A>
where
    A: AddressFamily,
{
    pub fn new(
        route: Rc<SubnetRoute<A>>,
        origin: PeerInfo,
        genid: GenId,
    ) -> InternalMessage<A> {
        let attrs = route.attrs().clone();
        InternalMessage {
            route,
            attrs,
            origin,
            genid,
            flags: MsgFlags::empty(),
        }
    }

    // Returns a message carrying a modified version of this message's
    // route.
    pub fn with_route(&self, route: Rc<SubnetRoute<A>>) -> InternalMessage<A> {
        let attrs = route.attrs().clone();
        InternalMessage {
            route,
            attrs,
            origin: self.origin,
            genid: self.genid,
            flags: self.flags,
        }
    }

    pub fn prefix(&self) -> &A::IpNetwork {
        self.route.prefix()
    }

    pub fn changed(&self) -> bool {
        self.flags.contains(MsgFlags::CHANGED)
    }

    pub fn push(&self) -> bool {
        self.flags.contains(MsgFlags::PUSH)
    }

    pub fn from_previous_peering(&self) -> bool {
        self.flags.contains(MsgFlags::FROM_PREVIOUS_PEERING)
    }
}

impl<A> Clone for InternalMessage<A>
where
    A: AddressFamily,
{
    fn clone(&self) -> InternalMessage<A> {
        InternalMessage {
            route: self.route.clone(),
            attrs: self.attrs.clone(),
            origin: self.origin,
            genid: self.genid,
            flags: self.flags,
        }
    }
}

// ===== impl AddStatus =====

impl AddStatus {
    // Merges the outcomes of sending the same route to several branches.
    pub fn merge(self, other: AddStatus) -> AddStatus {
        use AddStatus::*;
        match (self, other) {
            (Used, _) | (_, Used) => Used,
            (Unused, _) | (_, Unused) => Unused,
            (Filtered, Filtered) => Filtered,
        }
    }
}

impl std::fmt::Display for AddStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AddStatus::Used => write!(f, "used"),
            AddStatus::Unused => write!(f, "unused"),
            AddStatus::Filtered => write!(f, "filtered"),
        }
    }
}

// ===== impl RouteLookup =====

impl<A> RouteLookup<A>
where
    A: AddressFamily,
{
    pub fn new(route: Rc<SubnetRoute<A>>, genid: GenId) -> RouteLookup<A> {
        let attrs = route.attrs().clone();
        RouteLookup {
            route,
            genid,
            attrs,
        }
    }
}
