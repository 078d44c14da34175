//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use super::{NodeIndex, NodeRef, RefTrie, TrieKey};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TraversalOrder {
    PreOrder,
    PostOrder,
}

// Position within a trie that survives modifications of the trie.
//
// The cursor holds a reference on the node it points at, so erasing that
// entry through `trie_mut` doesn't invalidate it. The reference moves along
// with the cursor and is released when the cursor is dropped.
#[must_use]
#[derive(Debug)]
pub struct TrieCursor<'a, K: TrieKey, P> {
    trie: &'a mut RefTrie<K, P>,
    node: Option<NodeIndex>,
    order: TraversalOrder,
    bound: Option<K>,
}

// Borrowing iterator over the live entries of a trie.
pub struct Iter<'a, K: TrieKey, P> {
    trie: &'a RefTrie<K, P>,
    next: Option<NodeIndex>,
    order: TraversalOrder,
    bound: Option<K>,
}

// ===== impl TrieCursor =====

impl<'a, K, P> TrieCursor<'a, K, P>
where
    K: TrieKey,
{
    pub(super) fn new(
        trie: &'a mut RefTrie<K, P>,
        node: Option<NodeIndex>,
        order: TraversalOrder,
        bound: Option<K>,
    ) -> TrieCursor<'a, K, P> {
        if let Some(idx) = node {
            trie.nodes[idx].refs += 1;
        }
        TrieCursor {
            trie,
            node,
            order,
            bound,
        }
    }

    pub fn node(&self) -> Option<NodeIndex> {
        self.node
    }

    pub fn is_end(&self) -> bool {
        self.node.is_none()
    }

    // Returns the entry the cursor points at, which may have been erased
    // since.
    pub fn entry(&self) -> Option<(K, &P)> {
        let node = self.trie.nodes.get(self.node?)?;
        node.payload.as_ref().map(|payload| (node.key, payload))
    }

    // Moves the cursor to the next live entry.
    pub fn advance(&mut self) {
        let Some(cur) = self.node else {
            return;
        };
        let trie = &*self.trie;
        let next = trie
            .next_in_order(cur, self.order, self.bound.as_ref())
            .and_then(|idx| {
                trie.first_active(idx, self.order, self.bound.as_ref())
            });
        if let Some(next) = next {
            self.trie.nodes[next].refs += 1;
        }
        self.node = next;
        self.trie.release(NodeRef(cur));
    }

    pub fn trie(&self) -> &RefTrie<K, P> {
        self.trie
    }

    pub fn trie_mut(&mut self) -> &mut RefTrie<K, P> {
        self.trie
    }
}

impl<K, P> Drop for TrieCursor<'_, K, P>
where
    K: TrieKey,
{
    fn drop(&mut self) {
        if let Some(idx) = self.node.take() {
            self.trie.release(NodeRef(idx));
        }
    }
}

// ===== impl Iter =====

impl<'a, K, P> Iter<'a, K, P>
where
    K: TrieKey,
{
    pub(super) fn new(
        trie: &'a RefTrie<K, P>,
        order: TraversalOrder,
        bound: Option<K>,
    ) -> Iter<'a, K, P> {
        let start = match &bound {
            Some(bound) => trie.subtree_root(bound),
            None => trie.root(),
        };
        let next = start.and_then(|idx| {
            let start = trie.order_start(idx, order);
            trie.first_active(start, order, bound.as_ref())
        });
        Iter {
            trie,
            next,
            order,
            bound,
        }
    }
}

impl<'a, K, P> Iterator for Iter<'a, K, P>
where
    K: TrieKey,
{
    type Item = (&'a K, &'a P);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.next?;
        let trie = self.trie;
        self.next = trie
            .next_in_order(idx, self.order, self.bound.as_ref())
            .and_then(|next| {
                trie.first_active(next, self.order, self.bound.as_ref())
            });

        let node = trie.node(idx);
        node.payload().map(|payload| (node.key(), payload))
    }
}
