//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Reference-counted binary radix trie keyed by network prefixes.
//!
//! Nodes live in a generational arena and are addressed by [`NodeIndex`].
//! Erasing an entry only tombstones its node while some cursor or
//! [`NodeRef`] still points at it: the payload stays readable through the
//! reference, lookups no longer see it, and the node is reclaimed when the
//! last reference is released. This keeps iteration safe while the trie is
//! being modified from within the same call stack.

mod iter;
mod key;

use generational_arena::{Arena, Index};
use tracing::warn;

pub use self::iter::{Iter, TraversalOrder, TrieCursor};
pub use self::key::TrieKey;

pub type NodeIndex = Index;

#[derive(Debug)]
pub struct RefTrie<K: TrieKey, P> {
    nodes: Arena<TrieNode<K, P>>,
    root: Option<NodeIndex>,
    count: usize,
}

#[derive(Debug)]
pub struct TrieNode<K, P> {
    key: K,
    payload: Option<P>,
    parent: Option<NodeIndex>,
    left: Option<NodeIndex>,
    right: Option<NodeIndex>,
    refs: u32,
    deleted: bool,
}

// Reference that keeps a trie node (and its payload) alive until released.
#[must_use]
#[derive(Debug, Eq, PartialEq)]
pub struct NodeRef(NodeIndex);

// ===== impl RefTrie =====

impl<K, P> RefTrie<K, P>
where
    K: TrieKey,
{
    pub fn new() -> RefTrie<K, P> {
        RefTrie {
            nodes: Arena::new(),
            root: None,
            count: 0,
        }
    }

    // Number of live entries.
    pub fn route_count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    // Inserts an entry, returning the index of the node holding it.
    //
    // Inserting over an existing entry replaces its payload.
    pub fn insert(&mut self, key: K, payload: P) -> NodeIndex {
        let key = key.normalized();

        let Some(mut cur) = self.root else {
            let idx = self.alloc(key, Some(payload), None);
            self.root = Some(idx);
            self.count += 1;
            return idx;
        };

        loop {
            let y = self.nodes[cur].key;

            // Exact match.
            if y == key {
                let node = &mut self.nodes[cur];
                if node.is_active() {
                    warn!(%key, "duplicate trie entry, replacing payload");
                } else {
                    self.count += 1;
                }
                node.payload = Some(payload);
                node.deleted = false;
                return cur;
            }

            // The new key is inside the left or right half of `y`.
            if y.covers(&key) {
                let right = key.bit(y.prefix_len());
                match self.nodes[cur].child(right) {
                    Some(child) => {
                        cur = child;
                        continue;
                    }
                    None => {
                        let idx = self.alloc(key, Some(payload), Some(cur));
                        self.nodes[cur].set_child(right, Some(idx));
                        self.count += 1;
                        return idx;
                    }
                }
            }

            // `y` is inside the left or right half of the new key.
            let parent = self.nodes[cur].parent;
            if key.covers(&y) {
                let idx = self.alloc(key, Some(payload), parent);
                self.relink(parent, cur, Some(idx));
                self.nodes[idx].set_child(y.bit(key.prefix_len()), Some(cur));
                self.nodes[cur].parent = Some(idx);
                self.count += 1;
                return idx;
            }

            // Disjoint keys: split with a new common ancestor.
            let common = key.common_prefix(&y);
            let split = self.alloc(common, None, parent);
            self.relink(parent, cur, Some(split));
            let idx = self.alloc(key, Some(payload), Some(split));
            let right = key.bit(common.prefix_len());
            self.nodes[split].set_child(right, Some(idx));
            self.nodes[split].set_child(!right, Some(cur));
            self.nodes[cur].parent = Some(split);
            self.count += 1;
            return idx;
        }
    }

    // Erases the entry with the given key. Returns false if it wasn't present.
    pub fn erase(&mut self, key: &K) -> bool {
        match self.lookup_node(key) {
            Some(idx) => {
                self.erase_node(idx);
                true
            }
            None => false,
        }
    }

    // Erases the entry held by the given node.
    //
    // The node is only reclaimed once no reference points to it anymore.
    pub fn erase_node(&mut self, idx: NodeIndex) {
        let Some(node) = self.nodes.get_mut(idx) else {
            return;
        };
        if !node.is_active() {
            return;
        }
        node.deleted = true;
        self.count -= 1;
        if node.refs == 0 {
            self.reclaim(idx);
        }
    }

    // Removes all entries. Outstanding references become stale.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.count = 0;
    }

    // Exact-match lookup.
    pub fn lookup_node(&self, key: &K) -> Option<NodeIndex> {
        let key = key.normalized();
        let mut cur = self.root;
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            if !node.key.covers(&key) {
                return None;
            }
            if node.key.prefix_len() == key.prefix_len() {
                return node.is_active().then_some(idx);
            }
            cur = node.child(key.bit(node.key.prefix_len()));
        }
        None
    }

    // Longest-prefix match for the given prefix.
    pub fn find(&self, key: &K) -> Option<NodeIndex> {
        self.find_covering(key, key.prefix_len())
    }

    // Longest-prefix match for the given address.
    pub fn find_addr(&self, addr: K::Addr) -> Option<NodeIndex> {
        self.find(&K::host(addr))
    }

    // Longest entry strictly less specific than the given prefix.
    pub fn find_less_specific(&self, key: &K) -> Option<NodeIndex> {
        if key.prefix_len() == 0 {
            return None;
        }
        self.find_covering(key, key.prefix_len() - 1)
    }

    // Returns a cursor over the entries at or below the given prefix,
    // positioned at the first of them.
    pub fn find_subtree(&mut self, key: &K) -> TrieCursor<'_, K, P> {
        let bound = key.normalized();
        let start = self.subtree_root(&bound);
        let first = start.and_then(|idx| {
            self.first_active(idx, TraversalOrder::PreOrder, Some(&bound))
        });
        TrieCursor::new(self, first, TraversalOrder::PreOrder, Some(bound))
    }

    // First entry, in iteration order, not less than the given prefix.
    //
    // Pre-order iteration visits prefixes sorted by network address and then
    // by prefix length.
    pub fn lower_bound(&self, key: &K) -> Option<NodeIndex> {
        let key = key.normalized();
        let target = (key.first_bits(), key.prefix_len());
        let mut cur = self.root;
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            if node.key.last_bits() < target.0 {
                cur = self.preorder_skip(idx, None);
                continue;
            }
            if node.is_active()
                && (node.key.first_bits(), node.key.prefix_len()) >= target
            {
                return Some(idx);
            }
            cur = self.preorder_next(idx, None);
        }
        None
    }

    // Returns the contiguous range of addresses around `addr` whose
    // longest-prefix match is the same as the one of `addr`.
    pub fn find_bounds(&self, addr: K::Addr) -> (K::Addr, K::Addr) {
        let a = K::addr_to_bits(addr);
        let scope = self.find_addr(addr).map(|idx| self.nodes[idx].key);
        let (mut lo, mut hi) = match &scope {
            Some(key) => (key.first_bits(), key.last_bits()),
            None => (0, K::host(addr).last_bits() | max_bits::<K>()),
        };

        let mut cur = match &scope {
            Some(key) => self.subtree_root(key),
            None => self.root,
        };
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            let (first, last) = (node.key.first_bits(), node.key.last_bits());

            // Nothing in this subtree can narrow the range any further.
            if last < lo || first > hi {
                cur = self.preorder_skip(idx, scope.as_ref());
                continue;
            }

            // A more specific entry not covering the address splits the
            // range.
            if node.is_active() && !(first <= a && a <= last) {
                if last < a {
                    lo = last + 1;
                } else {
                    hi = first - 1;
                }
                cur = self.preorder_skip(idx, scope.as_ref());
                continue;
            }

            cur = self.preorder_next(idx, scope.as_ref());
        }

        (K::addr_from_bits(lo), K::addr_from_bits(hi))
    }

    // Returns the key of the given node.
    pub fn key(&self, idx: NodeIndex) -> Option<K> {
        self.nodes.get(idx).map(|node| node.key)
    }

    // Returns the payload of the given node.
    //
    // Payloads of erased nodes remain readable while referenced.
    pub fn payload(&self, idx: NodeIndex) -> Option<&P> {
        self.nodes.get(idx).and_then(|node| node.payload.as_ref())
    }

    pub fn payload_mut(&mut self, idx: NodeIndex) -> Option<&mut P> {
        self.nodes.get_mut(idx).and_then(|node| node.payload.as_mut())
    }

    // Returns true if the node's entry was erased while still referenced.
    pub fn is_deleted(&self, idx: NodeIndex) -> bool {
        self.nodes.get(idx).is_some_and(|node| node.deleted)
    }

    // Returns the number of references held on the given node.
    pub fn refs(&self, idx: NodeIndex) -> u32 {
        self.nodes.get(idx).map(|node| node.refs).unwrap_or(0)
    }

    // Returns the payload of the entry with the given key.
    pub fn get(&self, key: &K) -> Option<&P> {
        self.lookup_node(key).and_then(|idx| self.payload(idx))
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut P> {
        self.lookup_node(key).and_then(|idx| self.payload_mut(idx))
    }

    // Takes a reference on the given node.
    pub fn acquire(&mut self, idx: NodeIndex) -> NodeRef {
        self.nodes[idx].refs += 1;
        NodeRef(idx)
    }

    // Releases a node reference, reclaiming the node if it was erased in the
    // meantime and this was the last reference.
    pub fn release(&mut self, noderef: NodeRef) {
        let idx = noderef.0;
        let Some(node) = self.nodes.get_mut(idx) else {
            return;
        };
        node.refs -= 1;
        if node.refs == 0 && node.deleted {
            self.reclaim(idx);
        }
    }

    // Borrowing pre-order iterator over live entries.
    pub fn iter(&self) -> Iter<'_, K, P> {
        Iter::new(self, TraversalOrder::PreOrder, None)
    }

    // Borrowing post-order iterator over live entries.
    pub fn iter_postorder(&self) -> Iter<'_, K, P> {
        Iter::new(self, TraversalOrder::PostOrder, None)
    }

    // Borrowing pre-order iterator over the live entries at or below the
    // given prefix.
    pub fn iter_subtree(&self, key: &K) -> Iter<'_, K, P> {
        Iter::new(self, TraversalOrder::PreOrder, Some(key.normalized()))
    }

    // ===== cursors =====

    // Returns a cursor positioned at the first live entry.
    pub fn cursor(&mut self, order: TraversalOrder) -> TrieCursor<'_, K, P> {
        let first = self.root.and_then(|root| {
            self.first_active(self.order_start(root, order), order, None)
        });
        TrieCursor::new(self, first, order, None)
    }

    // ===== structural helpers =====

    fn alloc(
        &mut self,
        key: K,
        payload: Option<P>,
        parent: Option<NodeIndex>,
    ) -> NodeIndex {
        self.nodes.insert(TrieNode {
            key,
            payload,
            parent,
            left: None,
            right: None,
            refs: 0,
            deleted: false,
        })
    }

    // Makes `new` take the place of `old` under `parent`.
    fn relink(
        &mut self,
        parent: Option<NodeIndex>,
        old: NodeIndex,
        new: Option<NodeIndex>,
    ) {
        match parent {
            Some(parent) => {
                let parent = &mut self.nodes[parent];
                if parent.left == Some(old) {
                    parent.left = new;
                } else {
                    parent.right = new;
                }
            }
            None => self.root = new,
        }
    }

    // Drops the payload of an erased node and removes whatever structure
    // became useless.
    fn reclaim(&mut self, idx: NodeIndex) {
        let node = &mut self.nodes[idx];
        node.payload = None;
        node.deleted = false;
        self.collapse(idx);
    }

    // Removes payload-less nodes with less than two children, walking up the
    // tree.
    fn collapse(&mut self, mut idx: NodeIndex) {
        loop {
            let node = &self.nodes[idx];
            if node.payload.is_some() || node.refs > 0 {
                return;
            }
            let parent = node.parent;
            match (node.left, node.right) {
                (Some(_), Some(_)) => return,
                (Some(child), None) | (None, Some(child)) => {
                    self.relink(parent, idx, Some(child));
                    self.nodes[child].parent = parent;
                    self.nodes.remove(idx);
                    return;
                }
                (None, None) => {
                    self.relink(parent, idx, None);
                    self.nodes.remove(idx);
                    match parent {
                        Some(parent) => idx = parent,
                        None => return,
                    }
                }
            }
        }
    }

    // Longest live entry covering `key` whose length doesn't exceed
    // `max_len`.
    fn find_covering(&self, key: &K, max_len: u8) -> Option<NodeIndex> {
        let key = key.normalized();
        let mut best = None;
        let mut cur = self.root;
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            if !node.key.covers(&key) || node.key.prefix_len() > max_len {
                break;
            }
            if node.is_active() {
                best = Some(idx);
            }
            if node.key.prefix_len() == key.prefix_len() {
                break;
            }
            cur = node.child(key.bit(node.key.prefix_len()));
        }
        best
    }

    // Topmost node whose key is at or below the given prefix.
    fn subtree_root(&self, bound: &K) -> Option<NodeIndex> {
        let mut cur = self.root;
        while let Some(idx) = cur {
            let node = &self.nodes[idx];
            if bound.covers(&node.key) {
                return Some(idx);
            }
            if !node.key.covers(bound) {
                return None;
            }
            cur = node.child(bound.bit(node.key.prefix_len()));
        }
        None
    }

    // First node of the subtree rooted at `idx` in the given order.
    fn order_start(&self, idx: NodeIndex, order: TraversalOrder) -> NodeIndex {
        match order {
            TraversalOrder::PreOrder => idx,
            TraversalOrder::PostOrder => self.postorder_descend(idx),
        }
    }

    // First live node at or after `idx` in the given order.
    fn first_active(
        &self,
        idx: NodeIndex,
        order: TraversalOrder,
        bound: Option<&K>,
    ) -> Option<NodeIndex> {
        let mut cur = Some(idx);
        while let Some(idx) = cur {
            if self.nodes[idx].is_active() {
                return Some(idx);
            }
            cur = self.next_in_order(idx, order, bound);
        }
        None
    }

    fn next_in_order(
        &self,
        idx: NodeIndex,
        order: TraversalOrder,
        bound: Option<&K>,
    ) -> Option<NodeIndex> {
        match order {
            TraversalOrder::PreOrder => self.preorder_next(idx, bound),
            TraversalOrder::PostOrder => self.postorder_next(idx, bound),
        }
    }

    fn preorder_next(
        &self,
        idx: NodeIndex,
        bound: Option<&K>,
    ) -> Option<NodeIndex> {
        let node = &self.nodes[idx];
        node.left
            .or(node.right)
            .or_else(|| self.preorder_skip(idx, bound))
    }

    // Next node in pre-order once the whole subtree of `idx` was visited.
    fn preorder_skip(
        &self,
        mut idx: NodeIndex,
        bound: Option<&K>,
    ) -> Option<NodeIndex> {
        loop {
            let parent = self.nodes[idx].parent?;
            let pnode = &self.nodes[parent];
            if let Some(bound) = bound
                && !bound.covers(&pnode.key)
            {
                return None;
            }
            if pnode.left == Some(idx)
                && let Some(right) = pnode.right
            {
                return Some(right);
            }
            idx = parent;
        }
    }

    fn postorder_next(
        &self,
        idx: NodeIndex,
        bound: Option<&K>,
    ) -> Option<NodeIndex> {
        let parent = self.nodes[idx].parent?;
        let pnode = &self.nodes[parent];
        if let Some(bound) = bound
            && !bound.covers(&pnode.key)
        {
            return None;
        }
        if pnode.left == Some(idx)
            && let Some(right) = pnode.right
        {
            return Some(self.postorder_descend(right));
        }
        Some(parent)
    }

    // Deepest leftmost node of the given subtree.
    fn postorder_descend(&self, mut idx: NodeIndex) -> NodeIndex {
        loop {
            let node = &self.nodes[idx];
            match node.left.or(node.right) {
                Some(child) => idx = child,
                None => return idx,
            }
        }
    }

    pub(crate) fn node(&self, idx: NodeIndex) -> &TrieNode<K, P> {
        &self.nodes[idx]
    }

    pub(crate) fn root(&self) -> Option<NodeIndex> {
        self.root
    }
}

impl<K, P> Default for RefTrie<K, P>
where
    K: TrieKey,
{
    fn default() -> RefTrie<K, P> {
        RefTrie::new()
    }
}

// ===== impl TrieNode =====

impl<K, P> TrieNode<K, P> {
    // Returns true if the node holds a live entry.
    pub(crate) fn is_active(&self) -> bool {
        self.payload.is_some() && !self.deleted
    }

    pub(crate) fn key(&self) -> &K {
        &self.key
    }

    pub(crate) fn payload(&self) -> Option<&P> {
        self.payload.as_ref()
    }

    fn child(&self, right: bool) -> Option<NodeIndex> {
        if right { self.right } else { self.left }
    }

    fn set_child(&mut self, right: bool, child: Option<NodeIndex>) {
        if right {
            self.right = child;
        } else {
            self.left = child;
        }
    }
}

// ===== helper functions =====

// All address bits set.
fn max_bits<K: TrieKey>() -> u128 {
    bgp_rib_utils::ip::mask_bits(K::MAX_LEN, K::MAX_LEN)
}
