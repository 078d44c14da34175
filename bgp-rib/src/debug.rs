//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use ipnetwork::IpNetwork;
use tracing::{debug, debug_span};

use crate::bgp_trie::ChainId;
use crate::message::GenId;
use crate::peer::{PeerInfo, RouteUpdate};
use crate::table::aggregation::AggrState;

// RIB debug messages.
#[derive(Debug)]
pub enum Debug<'a> {
    PeeringCreate(&'a PeerInfo),
    PeeringDelete(&'a PeerInfo),
    PeeringDown(&'a PeerInfo, GenId),
    PeeringUp(&'a PeerInfo, GenId),
    PeeringDownComplete(&'a PeerInfo, GenId),
    DeletionStart(&'a PeerInfo, GenId, usize),
    DeletionChain(&'a PeerInfo, ChainId, usize),
    BestPathFound(IpNetwork, &'a PeerInfo),
    BestPathNotFound(IpNetwork),
    AggregateTransition(IpNetwork, AggrState, AggrState),
    RouteSuppressed(&'a PeerInfo, IpNetwork, u32),
    RouteReused(&'a PeerInfo, IpNetwork),
    PeerOutputBusy(&'a PeerInfo),
    PeerOutputResume(&'a PeerInfo, usize),
    RouteTx(&'a PeerInfo, &'a RouteUpdate),
}

// ===== impl Debug =====

impl Debug<'_> {
    // Log debug message using the tracing API.
    pub(crate) fn log(&self) {
        match self {
            Debug::PeeringCreate(peer) | Debug::PeeringDelete(peer) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug!(
                        id = %peer.id,
                        peer_type = %peer.peer_type,
                        "{}", self
                    );
                });
            }
            Debug::PeeringDown(peer, genid)
            | Debug::PeeringUp(peer, genid)
            | Debug::PeeringDownComplete(peer, genid) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug!(%genid, "{}", self);
                });
            }
            Debug::DeletionStart(peer, genid, routes) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug_span!("deletion").in_scope(|| {
                        debug!(%genid, %routes, "{}", self);
                    })
                });
            }
            Debug::DeletionChain(peer, chain, routes) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug_span!("deletion").in_scope(|| {
                        debug!(%chain, %routes, "{}", self);
                    })
                });
            }
            Debug::BestPathFound(prefix, peer) => {
                // Parent span(s): bgp-rib
                debug!(%prefix, peer = %peer.remote_addr, "{}", self);
            }
            Debug::BestPathNotFound(prefix) => {
                // Parent span(s): bgp-rib
                debug!(%prefix, "{}", self);
            }
            Debug::AggregateTransition(prefix, old_state, new_state) => {
                // Parent span(s): bgp-rib
                debug_span!("aggregation").in_scope(|| {
                    debug!(%prefix, ?old_state, ?new_state, "{}", self);
                });
            }
            Debug::RouteSuppressed(peer, prefix, merit) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug_span!("damping").in_scope(|| {
                        debug!(%prefix, %merit, "{}", self);
                    })
                });
            }
            Debug::RouteReused(peer, prefix) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug_span!("damping").in_scope(|| {
                        debug!(%prefix, "{}", self);
                    })
                });
            }
            Debug::PeerOutputBusy(peer) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug!("{}", self);
                });
            }
            Debug::PeerOutputResume(peer, queued) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug!(%queued, "{}", self);
                });
            }
            Debug::RouteTx(peer, update) => {
                // Parent span(s): bgp-rib
                debug_span!("peer", addr = %peer.remote_addr).in_scope(|| {
                    debug_span!("output").in_scope(|| {
                        let data =
                            serde_json::to_string(update).unwrap_or_default();
                        debug!(%data, "{}", self);
                    })
                });
            }
        }
    }
}

impl std::fmt::Display for Debug<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Debug::PeeringCreate(..) => {
                write!(f, "peering created")
            }
            Debug::PeeringDelete(..) => {
                write!(f, "peering deleted")
            }
            Debug::PeeringDown(..) => {
                write!(f, "peering went down")
            }
            Debug::PeeringUp(..) => {
                write!(f, "peering came up")
            }
            Debug::PeeringDownComplete(..) => {
                write!(f, "peering route withdrawal complete")
            }
            Debug::DeletionStart(..) => {
                write!(f, "starting background route deletion")
            }
            Debug::DeletionChain(..) => {
                write!(f, "deleting routes sharing path attributes")
            }
            Debug::BestPathFound(..) => {
                write!(f, "best path found")
            }
            Debug::BestPathNotFound(..) => {
                write!(f, "best path not found")
            }
            Debug::AggregateTransition(..) => {
                write!(f, "aggregate state transition")
            }
            Debug::RouteSuppressed(..) => {
                write!(f, "route suppressed")
            }
            Debug::RouteReused(..) => {
                write!(f, "route no longer suppressed")
            }
            Debug::PeerOutputBusy(..) => {
                write!(f, "peer output busy")
            }
            Debug::PeerOutputResume(..) => {
                write!(f, "peer output no longer busy")
            }
            Debug::RouteTx(..) => {
                write!(f, "route")
            }
        }
    }
}
