//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeSet;

use bgp_rib::af::Ipv4;
use bgp_rib::attrs::{AttrSets, PathAttributeList};
use bgp_rib::bgp_trie::BgpTrie;
use bgp_rib::route::{AggrMarker, SubnetRoute};
use bgp_rib::trie::{RefTrie, TraversalOrder};
use const_addrs::{ip, ip4, net4};
use ipnetwork::Ipv4Network;
use maplit::btreeset;

fn trie() -> RefTrie<Ipv4Network, u32> {
    let mut trie = RefTrie::new();
    trie.insert(net4!("10.0.0.0/8"), 1);
    trie.insert(net4!("10.1.0.0/16"), 2);
    trie.insert(net4!("10.2.0.0/16"), 3);
    trie.insert(net4!("11.0.0.0/8"), 4);
    trie
}

fn keys(trie: &RefTrie<Ipv4Network, u32>) -> Vec<Ipv4Network> {
    trie.iter().map(|(key, _)| *key).collect()
}

#[test]
fn test_insert_erase() {
    let mut trie = trie();
    assert_eq!(trie.route_count(), 4);
    assert_eq!(trie.get(&net4!("10.1.0.0/16")), Some(&2));
    assert_eq!(trie.get(&net4!("10.0.0.0/14")), None);

    // Iteration is sorted by network address and then by prefix length.
    assert_eq!(
        keys(&trie),
        vec![
            net4!("10.0.0.0/8"),
            net4!("10.1.0.0/16"),
            net4!("10.2.0.0/16"),
            net4!("11.0.0.0/8"),
        ]
    );

    assert!(trie.erase(&net4!("10.0.0.0/8")));
    assert!(!trie.erase(&net4!("10.0.0.0/8")));
    assert_eq!(trie.route_count(), 3);
    assert_eq!(trie.get(&net4!("10.1.0.0/16")), Some(&2));

    // Inserting over an existing entry replaces it.
    trie.insert(net4!("11.0.0.0/8"), 5);
    assert_eq!(trie.route_count(), 3);
    assert_eq!(trie.get(&net4!("11.0.0.0/8")), Some(&5));
}

#[test]
fn test_longest_match() {
    let trie = trie();

    let idx = trie.find_addr(ip4!("10.1.2.3")).unwrap();
    assert_eq!(trie.key(idx), Some(net4!("10.1.0.0/16")));
    let idx = trie.find_addr(ip4!("10.3.0.1")).unwrap();
    assert_eq!(trie.key(idx), Some(net4!("10.0.0.0/8")));
    assert!(trie.find_addr(ip4!("12.0.0.1")).is_none());

    let idx = trie.find(&net4!("10.1.2.0/24")).unwrap();
    assert_eq!(trie.key(idx), Some(net4!("10.1.0.0/16")));
    let idx = trie.find_less_specific(&net4!("10.1.0.0/16")).unwrap();
    assert_eq!(trie.key(idx), Some(net4!("10.0.0.0/8")));
    assert!(trie.find_less_specific(&net4!("10.0.0.0/8")).is_none());
}

#[test]
fn test_subtree() {
    let mut trie = trie();
    let subtree = trie
        .iter_subtree(&net4!("10.0.0.0/8"))
        .map(|(key, _)| *key)
        .collect::<Vec<_>>();
    assert_eq!(
        subtree,
        vec![
            net4!("10.0.0.0/8"),
            net4!("10.1.0.0/16"),
            net4!("10.2.0.0/16"),
        ]
    );

    let mut cursor = trie.find_subtree(&net4!("10.0.0.0/12"));
    let mut payloads = vec![];
    while let Some((_, payload)) = cursor.entry() {
        payloads.push(*payload);
        cursor.advance();
    }
    assert!(cursor.is_end());
    drop(cursor);
    assert_eq!(payloads, vec![2, 3]);
}

#[test]
fn test_cursor_survives_erase() {
    let mut trie = trie();
    let mut visited = vec![];

    let mut cursor = trie.cursor(TraversalOrder::PreOrder);
    while let Some((key, _)) = cursor.entry() {
        visited.push(key);
        if key == net4!("10.1.0.0/16") {
            // Erase both the current entry and the next one.
            cursor.trie_mut().erase(&key);
            cursor.trie_mut().erase(&net4!("10.2.0.0/16"));
            let idx = cursor.node().unwrap();
            assert!(cursor.trie().is_deleted(idx));
            assert_eq!(cursor.entry().unwrap().1, &2);
        }
        cursor.advance();
    }
    drop(cursor);

    assert_eq!(
        visited,
        vec![
            net4!("10.0.0.0/8"),
            net4!("10.1.0.0/16"),
            net4!("11.0.0.0/8"),
        ]
    );
    assert_eq!(trie.route_count(), 2);
    assert!(trie.lookup_node(&net4!("10.1.0.0/16")).is_none());
}

#[test]
fn test_cursor_dropped_early() {
    let mut trie = trie();
    let idx = trie.lookup_node(&net4!("10.1.0.0/16")).unwrap();

    // Stop half-way through, right after erasing the current entry.
    let mut cursor = trie.find_subtree(&net4!("10.0.0.0/8"));
    while let Some((key, _)) = cursor.entry() {
        if key == net4!("10.1.0.0/16") {
            cursor.trie_mut().erase(&key);
            break;
        }
        cursor.advance();
    }
    assert_eq!(cursor.trie().refs(idx), 1);
    assert_eq!(cursor.trie().payload(idx), Some(&2));
    drop(cursor);

    // Dropping the cursor released the erased node.
    assert_eq!(trie.refs(idx), 0);
    assert!(trie.payload(idx).is_none());
    assert_eq!(trie.route_count(), 3);
    assert_eq!(
        keys(&trie),
        vec![
            net4!("10.0.0.0/8"),
            net4!("10.2.0.0/16"),
            net4!("11.0.0.0/8"),
        ]
    );
}

#[test]
fn test_node_reference() {
    let mut trie = trie();
    let idx = trie.lookup_node(&net4!("10.2.0.0/16")).unwrap();
    let noderef = trie.acquire(idx);

    trie.erase_node(idx);
    assert_eq!(trie.route_count(), 3);
    assert!(trie.get(&net4!("10.2.0.0/16")).is_none());
    assert_eq!(trie.payload(idx), Some(&3));
    assert_eq!(trie.refs(idx), 1);

    trie.release(noderef);
    assert!(trie.payload(idx).is_none());

    // The slot can be reused by a new entry.
    trie.insert(net4!("10.2.0.0/16"), 6);
    assert_eq!(trie.get(&net4!("10.2.0.0/16")), Some(&6));
}

#[test]
fn test_find_bounds() {
    let trie = trie();
    assert_eq!(
        trie.find_bounds(ip4!("10.0.0.1")),
        (ip4!("10.0.0.0"), ip4!("10.0.255.255"))
    );
    assert_eq!(
        trie.find_bounds(ip4!("10.1.2.3")),
        (ip4!("10.1.0.0"), ip4!("10.1.255.255"))
    );
    assert_eq!(
        trie.find_bounds(ip4!("12.0.0.1")),
        (ip4!("12.0.0.0"), ip4!("255.255.255.255"))
    );

    let mut trie = RefTrie::new();
    trie.insert(net4!("10.0.0.0/8"), 1);
    trie.insert(net4!("10.1.0.0/16"), 2);
    assert_eq!(
        trie.find_bounds(ip4!("10.2.0.0")),
        (ip4!("10.2.0.0"), ip4!("10.255.255.255"))
    );
    assert_eq!(
        trie.find_bounds(ip4!("9.255.255.255")),
        (ip4!("0.0.0.0"), ip4!("9.255.255.255"))
    );
}

#[test]
fn test_lower_bound() {
    let trie = trie();
    let lower_bound = |key: Ipv4Network| {
        trie.lower_bound(&key).and_then(|idx| trie.key(idx))
    };
    assert_eq!(
        lower_bound(net4!("10.1.5.0/24")),
        Some(net4!("10.2.0.0/16"))
    );
    assert_eq!(
        lower_bound(net4!("10.0.0.0/9")),
        Some(net4!("10.1.0.0/16"))
    );
    assert_eq!(
        lower_bound(net4!("10.1.0.0/16")),
        Some(net4!("10.1.0.0/16"))
    );
    assert_eq!(lower_bound(net4!("12.0.0.0/8")), None);
}

#[test]
fn test_route_chains() {
    let mut attr_sets = AttrSets::default();
    let attrs1 = attr_sets.get(&PathAttributeList::new(ip!("192.0.2.1")));
    let attrs2 = attr_sets.get(&PathAttributeList::new(ip!("192.0.2.2")));

    let mut trie = BgpTrie::<Ipv4>::default();
    for (prefix, attrs) in [
        (net4!("10.1.0.0/16"), &attrs1),
        (net4!("10.2.0.0/16"), &attrs1),
        (net4!("10.3.0.0/16"), &attrs2),
    ] {
        let route = SubnetRoute::new(
            prefix,
            attrs.clone(),
            Default::default(),
            AggrMarker::Ignore,
        );
        assert!(trie.insert(route).is_none());
    }
    assert_eq!(trie.route_count(), 3);
    assert_eq!(trie.chain_count(), 2);
    assert_eq!(
        trie.chain(attrs1.index),
        Some(&btreeset! {net4!("10.1.0.0/16"), net4!("10.2.0.0/16")})
    );

    // Moving a route to another chain.
    let route = SubnetRoute::new(
        net4!("10.2.0.0/16"),
        attrs2.clone(),
        Default::default(),
        AggrMarker::Ignore,
    );
    let old = trie.insert(route).unwrap();
    assert_eq!(old.attrs().index, attrs1.index);
    assert_eq!(
        trie.chain(attrs2.index),
        Some(&btreeset! {net4!("10.2.0.0/16"), net4!("10.3.0.0/16")})
    );

    let (chain, prefixes) = trie.first_chain().unwrap();
    assert_eq!(chain, attrs1.index);
    assert_eq!(prefixes, vec![net4!("10.1.0.0/16")]);

    // Erasing the last route of a chain drops the chain.
    trie.erase(&net4!("10.1.0.0/16")).unwrap();
    assert_eq!(trie.chain_count(), 1);
    assert!(trie.chain(attrs1.index).is_none());

    let route = trie.find_addr(ip4!("10.3.1.1")).unwrap();
    assert_eq!(route.prefix(), &net4!("10.3.0.0/16"));
    let chains = trie
        .iter()
        .map(|route| route.attrs().index)
        .collect::<BTreeSet<_>>();
    assert_eq!(chains, btreeset! {attrs2.index});
}
