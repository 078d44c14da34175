//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

use crate::af::AddressFamily;
use crate::route::SubnetRoute;
use crate::trie::{NodeIndex, NodeRef, RefTrie};

// Identifier of a chain: the index of the interned attribute set shared by
// all of its routes.
pub type ChainId = u64;

// Route stored in a `BgpTrie`, remembering the chain it belongs to.
#[derive(Debug)]
pub struct ChainedSubnetRoute<A: AddressFamily> {
    pub route: Rc<SubnetRoute<A>>,
    pub chain: ChainId,
}

// Prefix trie of routes, where routes sharing the same path attributes are
// also grouped into chains.
#[derive(Debug)]
pub struct BgpTrie<A: AddressFamily> {
    trie: RefTrie<A::IpNetwork, ChainedSubnetRoute<A>>,
    pathmap: BTreeMap<ChainId, BTreeSet<A::IpNetwork>>,
}

// ===== impl ChainedSubnetRoute =====

impl<A> ChainedSubnetRoute<A>
where
    A: AddressFamily,
{
    pub fn new(route: Rc<SubnetRoute<A>>) -> ChainedSubnetRoute<A> {
        let chain = route.attrs().index;
        ChainedSubnetRoute { route, chain }
    }
}

// ===== impl BgpTrie =====

impl<A> BgpTrie<A>
where
    A: AddressFamily,
{
    // Stores a route, returning the one it replaced, if any.
    pub fn insert(
        &mut self,
        route: Rc<SubnetRoute<A>>,
    ) -> Option<Rc<SubnetRoute<A>>> {
        let prefix = *route.prefix();
        let old = self.erase(&prefix);

        let chained = ChainedSubnetRoute::new(route);
        self.pathmap
            .entry(chained.chain)
            .or_default()
            .insert(prefix);
        self.trie.insert(prefix, chained);
        old
    }

    // Removes the route of the given prefix.
    pub fn erase(
        &mut self,
        prefix: &A::IpNetwork,
    ) -> Option<Rc<SubnetRoute<A>>> {
        let idx = self.trie.lookup_node(prefix)?;
        self.erase_node(idx)
    }

    // Removes the route held by the given node.
    //
    // The node stays readable while referenced.
    pub fn erase_node(
        &mut self,
        idx: NodeIndex,
    ) -> Option<Rc<SubnetRoute<A>>> {
        if self.trie.is_deleted(idx) {
            return None;
        }
        let prefix = self.trie.key(idx)?;
        let chained = self.trie.payload(idx)?;
        let (chain, route) = (chained.chain, chained.route.clone());
        self.unchain(chain, &prefix);
        self.trie.erase_node(idx);
        Some(route)
    }

    // Detaches a route from its chain, dropping the chain when it becomes
    // empty.
    pub fn unchain(&mut self, chain: ChainId, prefix: &A::IpNetwork) {
        if let Some(prefixes) = self.pathmap.get_mut(&chain) {
            prefixes.remove(prefix);
            if prefixes.is_empty() {
                self.pathmap.remove(&chain);
            }
        }
    }

    pub fn lookup(
        &self,
        prefix: &A::IpNetwork,
    ) -> Option<&Rc<SubnetRoute<A>>> {
        self.trie.get(prefix).map(|chained| &chained.route)
    }

    pub fn lookup_node(&self, prefix: &A::IpNetwork) -> Option<NodeIndex> {
        self.trie.lookup_node(prefix)
    }

    // Longest-prefix match for the given address.
    pub fn find_addr(&self, addr: A::IpAddr) -> Option<&Rc<SubnetRoute<A>>> {
        self.trie
            .find_addr(addr)
            .and_then(|idx| self.trie.payload(idx))
            .map(|chained| &chained.route)
    }

    pub fn acquire(&mut self, idx: NodeIndex) -> NodeRef {
        self.trie.acquire(idx)
    }

    pub fn release(&mut self, noderef: NodeRef) {
        self.trie.release(noderef)
    }

    // Returns the prefixes of the given chain.
    pub fn chain(&self, chain: ChainId) -> Option<&BTreeSet<A::IpNetwork>> {
        self.pathmap.get(&chain)
    }

    // Returns the first chain of the pathmap, if any.
    pub fn first_chain(&self) -> Option<(ChainId, Vec<A::IpNetwork>)> {
        self.pathmap
            .first_key_value()
            .map(|(chain, prefixes)| {
                (*chain, prefixes.iter().copied().collect())
            })
    }

    pub fn chain_count(&self) -> usize {
        self.pathmap.len()
    }

    pub fn route_count(&self) -> usize {
        self.trie.route_count()
    }

    pub fn is_empty(&self) -> bool {
        self.trie.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rc<SubnetRoute<A>>> {
        self.trie.iter().map(|(_, chained)| &chained.route)
    }

    pub fn trie(&self) -> &RefTrie<A::IpNetwork, ChainedSubnetRoute<A>> {
        &self.trie
    }
}

impl<A> Default for BgpTrie<A>
where
    A: AddressFamily,
{
    fn default() -> BgpTrie<A> {
        BgpTrie {
            trie: RefTrie::new(),
            pathmap: Default::default(),
        }
    }
}
