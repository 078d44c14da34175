//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;

use bgp_rib::af::Ipv4;
use bgp_rib::attrs::{AttrSets, PathAttributeList};
use bgp_rib::route::{AggrMarker, SubnetRoute};
use const_addrs::{ip, net4};
use maplit::btreeset;

#[test]
fn test_derivation_chain() {
    let mut attr_sets = AttrSets::default();
    let attrs1 = attr_sets.get(&PathAttributeList::new(ip!("192.0.2.1")));
    let attrs2 = attr_sets.get(&PathAttributeList::new(ip!("192.0.2.2")));

    let route = SubnetRoute::<Ipv4>::new(
        net4!("10.1.0.0/16"),
        attrs1,
        Default::default(),
        AggrMarker::Ignore,
    );
    let copy1 =
        SubnetRoute::derive(&route, attrs2, btreeset! {1}, AggrMarker::Ignore);
    let copy2 = SubnetRoute::with_aggr(&copy1, AggrMarker::IbgpOnly);
    assert!(route.parent().is_none());
    assert!(Rc::ptr_eq(copy1.parent().unwrap(), &route));
    assert!(Rc::ptr_eq(copy2.parent().unwrap(), &copy1));
    assert!(Rc::ptr_eq(&copy2.original(), &route));
    assert_eq!(copy2.policy_tags(), &btreeset! {1});
    assert_eq!(copy2.attrs().value.nexthop, ip!("192.0.2.2"));
    assert_eq!(copy2.aggr(), AggrMarker::IbgpOnly);

    // Flag updates travel up the whole chain, even once the intermediate
    // copy is no longer held by anyone else.
    drop(copy1);
    copy2.set_in_use(true);
    copy2.set_is_winner(true, 10);
    assert!(route.is_in_use());
    assert!(route.is_winner());
    assert_eq!(route.igp_metric(), 10);
    assert!(copy2.parent().unwrap().is_in_use());

    // But never down.
    route.set_filtered(true);
    assert!(!copy2.is_filtered());
}

#[test]
fn test_derived_state() {
    let mut attr_sets = AttrSets::default();
    let attrs = attr_sets.get(&PathAttributeList::new(ip!("192.0.2.1")));

    let route = SubnetRoute::<Ipv4>::new(
        net4!("10.1.0.0/16"),
        attrs,
        Default::default(),
        AggrMarker::Ignore,
    );
    route.set_nexthop_resolved(true, 5);
    Rc::clone(&route).unref();
    assert!(route.is_deleted());

    // Copies inherit the state of their parent, except for the deletion
    // mark.
    let copy = SubnetRoute::with_aggr(&route, AggrMarker::EbgpAggregate);
    assert!(copy.is_nexthop_resolved());
    assert_eq!(copy.igp_metric(), 5);
    assert!(!copy.is_deleted());
}
