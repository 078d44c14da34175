//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

mod aggregation;
mod config;
mod damping;
mod route;
mod trie;

use std::cell::RefCell;
use std::net::IpAddr;
use std::rc::Rc;
use std::sync::Once;

use bgp_rib::af::Safi;
use bgp_rib::attrs::PathAttributeList;
use bgp_rib::config::Config;
use bgp_rib::peer::{
    PeerHandler, PeerId, PeerInfo, PeerOutputState, PeerType, RouteUpdate,
};
use bgp_rib::plumbing::BgpPlumbing;
use bgp_rib::policy::PeerPolicies;
use bgp_rib::table::nhlookup::DirectResolver;
use ipnetwork::IpNetwork;
use tracing::info;

static INIT: Once = Once::new();

// Update as seen by a peer.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PeerEvent {
    Add(IpNetwork, IpAddr),
    Replace(IpNetwork, IpAddr, IpAddr),
    Delete(IpNetwork),
    Push,
}

// Peer recording everything the pipeline sends to it.
#[derive(Debug, Default)]
pub struct TestPeer {
    pub events: Vec<PeerEvent>,
    pub busy: bool,
    pub resumed: usize,
}

// ===== impl TestPeer =====

impl TestPeer {
    // Returns the recorded events, clearing them.
    pub fn take(&mut self) -> Vec<PeerEvent> {
        std::mem::take(&mut self.events)
    }
}

impl PeerHandler for TestPeer {
    fn add_route(&mut self, route: &RouteUpdate, _ibgp: bool, _safi: Safi) {
        let nexthop = route.attrs.value.nexthop;
        self.events.push(PeerEvent::Add(route.prefix, nexthop));
    }

    fn replace_route(
        &mut self,
        old: &RouteUpdate,
        _old_ibgp: bool,
        new: &RouteUpdate,
        _new_ibgp: bool,
        _safi: Safi,
    ) {
        self.events.push(PeerEvent::Replace(
            new.prefix,
            old.attrs.value.nexthop,
            new.attrs.value.nexthop,
        ));
    }

    fn delete_route(&mut self, route: &RouteUpdate, _ibgp: bool, _safi: Safi) {
        self.events.push(PeerEvent::Delete(route.prefix));
    }

    fn push_packet(&mut self) -> PeerOutputState {
        self.events.push(PeerEvent::Push);
        if self.busy {
            PeerOutputState::Busy
        } else {
            PeerOutputState::Ok
        }
    }

    fn output_no_longer_busy(&mut self) {
        self.resumed += 1;
    }
}

// ===== helper functions =====

// Initializes tracing subscriber.
fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt::Subscriber::builder()
            .with_target(false)
            .with_ansi(false)
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .init();

        info!("starting");
    });
}

fn rib(config: &Config) -> BgpPlumbing {
    init_tracing();
    BgpPlumbing::new(config, Rc::new(DirectResolver))
}

fn add_peer(
    rib: &mut BgpPlumbing,
    id: PeerId,
    remote_addr: IpAddr,
    peer_type: PeerType,
) -> Rc<RefCell<TestPeer>> {
    let peer = PeerInfo::new(id, remote_addr, peer_type);
    let handler = Rc::new(RefCell::new(TestPeer::default()));
    rib.add_peering(peer, handler.clone(), PeerPolicies::default())
        .unwrap();
    handler
}

fn attrs(nexthop: IpAddr) -> PathAttributeList {
    PathAttributeList::new(nexthop)
}

fn announce(
    rib: &mut BgpPlumbing,
    peer_id: PeerId,
    prefix: IpNetwork,
    attrs: PathAttributeList,
) {
    rib.add_route(peer_id, prefix, attrs, Default::default())
        .unwrap();
    rib.push(peer_id).unwrap();
}

fn withdraw(rib: &mut BgpPlumbing, peer_id: PeerId, prefix: IpNetwork) {
    rib.delete_route(peer_id, prefix).unwrap();
    rib.push(peer_id).unwrap();
}

// Runs deletion ticks until there's nothing left to withdraw, returning the
// number of ticks.
fn drain_deletions(rib: &mut BgpPlumbing) -> usize {
    let mut ticks = 0;
    loop {
        ticks += 1;
        if !rib.run_deletion_tick() {
            return ticks;
        }
    }
}
