//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::IpAddr;

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::af::Safi;
use crate::attrs::PathAttrs;

pub type PeerId = u32;

// Identifier reserved for routes originated by the pipeline itself.
pub const LOCAL_PEER_ID: PeerId = 0;

// BGP peer type.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
pub enum PeerType {
    Internal,
    External,
    Local,
}

// Peer a route was learned from, or is sent to.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct PeerInfo {
    pub id: PeerId,
    pub remote_addr: IpAddr,
    pub peer_type: PeerType,
}

// Output state reported by a peer after a batch of updates was handed to
// it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PeerOutputState {
    Ok,
    Busy,
}

// Route as handed to a peer.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct RouteUpdate {
    pub prefix: IpNetwork,
    pub attrs: PathAttrs,
}

// Consumer of the routes leaving the pipeline for a given peer.
//
// This is typically the outgoing side of a BGP session, but can be anything
// interested in the best routes (e.g. the system RIB).
pub trait PeerHandler: std::fmt::Debug {
    fn add_route(&mut self, route: &RouteUpdate, ibgp: bool, safi: Safi);

    fn replace_route(
        &mut self,
        old: &RouteUpdate,
        old_ibgp: bool,
        new: &RouteUpdate,
        new_ibgp: bool,
        safi: Safi,
    );

    fn delete_route(&mut self, route: &RouteUpdate, ibgp: bool, safi: Safi);

    // Signals the end of a batch of updates.
    fn push_packet(&mut self) -> PeerOutputState;

    // Called once queued output was delivered after the peer stopped being
    // busy.
    fn output_no_longer_busy(&mut self) {}
}

// ===== impl PeerType =====

impl PeerType {
    pub fn is_ibgp(&self) -> bool {
        *self == PeerType::Internal
    }
}

impl std::fmt::Display for PeerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeerType::Internal => write!(f, "internal"),
            PeerType::External => write!(f, "external"),
            PeerType::Local => write!(f, "local"),
        }
    }
}

// ===== impl PeerInfo =====

impl PeerInfo {
    // Pseudo-peer used as the origin of locally generated routes.
    pub fn local(remote_addr: IpAddr) -> PeerInfo {
        PeerInfo {
            id: LOCAL_PEER_ID,
            remote_addr,
            peer_type: PeerType::Local,
        }
    }

    pub fn is_ibgp(&self) -> bool {
        self.peer_type.is_ibgp()
    }
}

impl std::fmt::Display for PeerInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.remote_addr, self.peer_type)
    }
}
