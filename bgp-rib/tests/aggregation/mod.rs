//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use bgp_rib::config::Config;
use bgp_rib::peer::PeerType;
use bgp_rib::plumbing::BgpPlumbing;
use bgp_rib::table::aggregation::AggrState;
use const_addrs::{ip, net, net4};

use crate::PeerEvent::{Add, Delete, Push, Replace};
use crate::{add_peer, announce, attrs, rib, withdraw};

fn aggregate_config(summary_only: bool) -> Config {
    let config = format!(
        r#"
        [[aggregates]]
        prefix = "10.0.0.0/8"
        summary_only = {summary_only}
        "#
    );
    Config::parse(&config).unwrap()
}

fn aggregate_state(rib: &BgpPlumbing) -> Option<AggrState> {
    rib.ipv4
        .aggregation()
        .aggregate_state(&net4!("10.0.0.0/8"))
}

#[test]
fn test_aggregate_announce_withdraw() {
    let mut rib = rib(&aggregate_config(false));
    let peer1 = add_peer(&mut rib, 1, ip!("192.0.2.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("192.0.2.2"), PeerType::External);
    let peer3 = add_peer(&mut rib, 3, ip!("192.0.2.3"), PeerType::Internal);

    let aggr = net!("10.0.0.0/8");
    let component = net!("10.1.0.0/16");
    announce(&mut rib, 1, component, attrs(ip!("192.0.2.1")));

    // The aggregate is locally originated, so even the source of the
    // component gets it.
    assert_eq!(
        peer1.borrow_mut().take(),
        vec![Add(aggr, ip!("0.0.0.0")), Push]
    );
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![
            Add(aggr, ip!("0.0.0.0")),
            Add(component, ip!("192.0.2.1")),
            Push
        ]
    );
    // Internal peers only get the component.
    assert_eq!(
        peer3.borrow_mut().take(),
        vec![Add(component, ip!("192.0.2.1")), Push]
    );
    assert_eq!(aggregate_state(&rib), Some(AggrState::Announced));
    let aggregation = rib.ipv4.aggregation();
    assert_eq!(aggregation.component_count(&net4!("10.0.0.0/8")), 1);

    let lookup = rib.lookup_route(aggr).unwrap();
    assert_eq!(lookup.value.nexthop, ip!("0.0.0.0"));
    assert!(lookup.value.atomic_aggregate);

    withdraw(&mut rib, 1, component);
    assert_eq!(peer1.borrow_mut().take(), vec![Delete(aggr), Push]);
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Delete(aggr), Delete(component), Push]
    );
    assert_eq!(peer3.borrow_mut().take(), vec![Delete(component), Push]);
    assert_eq!(rib.ipv4.aggregation().aggregate_count(), 0);
    assert!(rib.lookup_route(aggr).is_none());
}

#[test]
fn test_aggregate_multiple_components() {
    let mut rib = rib(&aggregate_config(false));
    add_peer(&mut rib, 1, ip!("192.0.2.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("192.0.2.2"), PeerType::External);

    let aggr = net!("10.0.0.0/8");
    let component1 = net!("10.1.0.0/16");
    let component2 = net!("10.2.0.0/16");
    announce(&mut rib, 1, component1, attrs(ip!("192.0.2.1")));
    announce(&mut rib, 1, component2, attrs(ip!("192.0.2.1")));
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![
            Add(aggr, ip!("0.0.0.0")),
            Add(component1, ip!("192.0.2.1")),
            Push,
            Add(component2, ip!("192.0.2.1")),
            Push
        ]
    );
    let aggregation = rib.ipv4.aggregation();
    assert_eq!(aggregation.component_count(&net4!("10.0.0.0/8")), 2);

    // The aggregate stays while a single component remains.
    withdraw(&mut rib, 1, component1);
    assert_eq!(peer2.borrow_mut().take(), vec![Delete(component1), Push]);
    assert_eq!(aggregate_state(&rib), Some(AggrState::Announced));

    // And goes away with the last one.
    withdraw(&mut rib, 1, component2);
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Delete(aggr), Delete(component2), Push]
    );
    assert_eq!(aggregate_state(&rib), None);
    assert_eq!(rib.ipv4.aggregation().aggregate_count(), 0);
    assert!(rib.lookup_route(aggr).is_none());
}

#[test]
fn test_routes_outside_aggregate() {
    let mut rib = rib(&aggregate_config(false));
    add_peer(&mut rib, 1, ip!("192.0.2.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("192.0.2.2"), PeerType::External);

    let prefix = net!("172.16.0.0/16");
    announce(&mut rib, 1, prefix, attrs(ip!("192.0.2.1")));
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Add(prefix, ip!("192.0.2.1")), Push]
    );
    assert_eq!(rib.ipv4.aggregation().aggregate_count(), 0);
}

#[test]
fn test_summary_only() {
    let mut rib = rib(&aggregate_config(true));
    let peer1 = add_peer(&mut rib, 1, ip!("192.0.2.1"), PeerType::External);
    let peer2 = add_peer(&mut rib, 2, ip!("192.0.2.2"), PeerType::External);
    let peer3 = add_peer(&mut rib, 3, ip!("192.0.2.3"), PeerType::Internal);

    let aggr = net!("10.0.0.0/8");
    let component = net!("10.1.0.0/16");
    announce(&mut rib, 1, component, attrs(ip!("192.0.2.1")));

    // External peers only get the aggregate.
    assert_eq!(
        peer1.borrow_mut().take(),
        vec![Add(aggr, ip!("0.0.0.0")), Push]
    );
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![Add(aggr, ip!("0.0.0.0")), Push]
    );
    assert_eq!(
        peer3.borrow_mut().take(),
        vec![Add(component, ip!("192.0.2.1")), Push]
    );

    // A route with the same prefix as the aggregate suppresses it, and the
    // contributing routes are sent as they are.
    announce(&mut rib, 1, aggr, attrs(ip!("192.0.2.1")));
    assert_eq!(aggregate_state(&rib), Some(AggrState::Suppressed));
    assert_eq!(peer1.borrow_mut().take(), vec![Delete(aggr), Push]);
    assert_eq!(
        peer2.borrow_mut().take(),
        vec![
            Replace(aggr, ip!("0.0.0.0"), ip!("192.0.2.1")),
            Add(component, ip!("192.0.2.1")),
            Push
        ]
    );
    assert_eq!(
        peer3.borrow_mut().take(),
        vec![Add(aggr, ip!("192.0.2.1")), Push]
    );
}

#[test]
fn test_aggregate_dumped_to_new_peer() {
    let mut rib = rib(&aggregate_config(false));
    add_peer(&mut rib, 1, ip!("192.0.2.1"), PeerType::External);

    let aggr = net!("10.0.0.0/8");
    let component = net!("10.1.0.0/16");
    announce(&mut rib, 1, component, attrs(ip!("192.0.2.1")));

    let peer4 = add_peer(&mut rib, 4, ip!("192.0.2.4"), PeerType::External);
    assert_eq!(
        peer4.borrow_mut().take(),
        vec![
            Add(aggr, ip!("0.0.0.0")),
            Add(component, ip!("192.0.2.1")),
            Push
        ]
    );
}
