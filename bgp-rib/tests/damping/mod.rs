//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::time::{Duration, Instant};

use bgp_rib::config::{Config, DampingCfg};
use bgp_rib::message::AddStatus;
use bgp_rib::peer::PeerType;
use const_addrs::{ip, net, net4};

use crate::PeerEvent::{Add, Delete, Push, Replace};
use crate::{add_peer, announce, attrs, drain_deletions, rib, withdraw};

const MINUTE: Duration = Duration::from_secs(60);

#[test]
fn test_flapping_route_suppressed() {
    let mut rib = rib(&damping_config());
    add_peer(&mut rib, 1, ip!("10.0.0.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("10.0.0.2"), PeerType::External);
    let start = Instant::now();

    let prefix = net!("192.168.1.0/24");
    let prefix4 = net4!("192.168.1.0/24");
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
    withdraw(&mut rib, 1, prefix);
    let damping = rib.ipv4.damping(1).unwrap();
    assert_eq!(damping.figure_of_merit(&prefix4), Some(1000));
    assert!(!damping.is_suppressed(&prefix4));

    // The second withdrawal crosses the suppress threshold. The withdrawal
    // itself still goes through.
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
    peer2.borrow_mut().take();
    withdraw(&mut rib, 1, prefix);
    assert_eq!(peer2.borrow_mut().take(), vec![Delete(prefix), Push]);
    let damping = rib.ipv4.damping(1).unwrap();
    assert_eq!(damping.figure_of_merit(&prefix4), Some(2000));
    assert!(damping.is_suppressed(&prefix4));

    // Announcements are held back.
    let status = rib
        .add_route(1, prefix, attrs(ip!("10.0.0.1")), Default::default())
        .unwrap();
    assert_eq!(status, AddStatus::Unused);
    rib.push(1).unwrap();
    assert!(peer2.borrow_mut().take().is_empty());
    assert!(rib.lookup_route(prefix).is_none());

    // One half-life later the figure of merit is still above the reuse
    // threshold.
    assert!(rib.run_damping_tick(start + 15 * MINUTE));
    assert!(peer2.borrow_mut().take().is_empty());
    assert!(rib.ipv4.damping(1).unwrap().is_suppressed(&prefix4));

    // Two half-lives later the route is released right away.
    assert!(rib.run_damping_tick(start + 30 * MINUTE));
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Add(prefix, ip!("10.0.0.1")), Push]
    );
    assert!(rib.lookup_route(prefix).is_some());
    let ribin = rib.ipv4.rib_in(1).unwrap();
    assert!(ribin.trie().lookup(&prefix4).unwrap().is_in_use());

    // Forgotten once the figure of merit is negligible.
    assert!(!rib.run_damping_tick(start + 60 * MINUTE));
    assert_eq!(rib.ipv4.damping(1).unwrap().entry_count(), 0);
}

#[test]
fn test_suppressed_route_withdrawn() {
    let mut rib = rib(&damping_config());
    add_peer(&mut rib, 1, ip!("10.0.0.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("10.0.0.2"), PeerType::External);
    let start = Instant::now();

    let prefix = net!("192.168.1.0/24");
    for _ in 0..2 {
        announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
        withdraw(&mut rib, 1, prefix);
    }
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
    peer2.borrow_mut().take();

    // Withdrawing the held route sends nothing, and nothing is left to
    // release later.
    withdraw(&mut rib, 1, prefix);
    assert!(peer2.borrow_mut().take().is_empty());
    assert!(!rib.run_damping_tick(start + 60 * MINUTE));
    assert!(peer2.borrow_mut().take().is_empty());
    assert!(rib.lookup_route(prefix).is_none());
}

#[test]
fn test_attribute_changes_penalized() {
    let mut rib = rib(&damping_config());
    add_peer(&mut rib, 1, ip!("10.0.0.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("10.0.0.2"), PeerType::External);

    let prefix = net!("192.168.1.0/24");
    let prefix4 = net4!("192.168.1.0/24");
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));

    // A route re-announced before the end of the background withdrawal
    // costs as much as a withdrawal.
    rib.peering_went_down(1).unwrap();
    rib.peering_came_up(1).unwrap();
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
    drain_deletions(&mut rib);
    let damping = rib.ipv4.damping(1).unwrap();
    assert_eq!(damping.figure_of_merit(&prefix4), Some(1000));
    peer2.borrow_mut().take();

    // Attribute changes cost half as much.
    let changed = attrs(ip!("10.0.0.1")).with_med(5);
    announce(&mut rib, 1, prefix, changed);
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Replace(prefix, ip!("10.0.0.1"), ip!("10.0.0.1")), Push]
    );
    let damping = rib.ipv4.damping(1).unwrap();
    assert_eq!(damping.figure_of_merit(&prefix4), Some(1500));
    assert!(!damping.is_suppressed(&prefix4));

    // Suppressing a route already sent withdraws it.
    let changed = attrs(ip!("10.0.0.1")).with_med(6);
    announce(&mut rib, 1, prefix, changed);
    assert_eq!(peer2.borrow_mut().take(), vec![Delete(prefix), Push]);
    assert!(rib.ipv4.damping(1).unwrap().is_suppressed(&prefix4));
    assert!(rib.lookup_route(prefix).is_none());
}

#[test]
fn test_suppressed_route_not_dumped() {
    let mut rib = rib(&damping_config());
    add_peer(&mut rib, 1, ip!("10.0.0.1"), PeerType::External);

    let prefix = net!("192.168.1.0/24");
    for _ in 0..2 {
        announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
        withdraw(&mut rib, 1, prefix);
    }
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
    announce(&mut rib, 1, net!("192.168.2.0/24"), attrs(ip!("10.0.0.1")));

    let peer2 = add_peer(&mut rib, 2, ip!("10.0.0.2"), PeerType::External);
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Add(net!("192.168.2.0/24"), ip!("10.0.0.1")), Push]
    );
}

#[test]
fn test_damping_disabled() {
    let mut rib = rib(&Config::default());
    add_peer(&mut rib, 1, ip!("10.0.0.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("10.0.0.2"), PeerType::External);

    let prefix = net!("192.168.1.0/24");
    for _ in 0..5 {
        announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
        withdraw(&mut rib, 1, prefix);
    }
    announce(&mut rib, 1, prefix, attrs(ip!("10.0.0.1")));
    assert_eq!(
        peer2.borrow_mut().take().last_chunk::<2>(),
        Some(&[Add(prefix, ip!("10.0.0.1")), Push])
    );

    let damping = rib.ipv4.damping(1).unwrap();
    assert!(!damping.is_enabled());
    assert_eq!(damping.entry_count(), 0);
    assert!(!rib.run_damping_tick(Instant::now()));
}

// ===== helper functions =====

fn damping_config() -> Config {
    Config {
        damping: DampingCfg {
            enabled: true,
            suppress: 1500,
            ..Default::default()
        },
        ..Default::default()
    }
}
