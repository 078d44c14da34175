//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::Arc;

use derive_new::new;
use serde::{Deserialize, Serialize};

// Path attributes of a route.
//
// Only the attributes taking part in route selection and aggregation are
// decoded. Everything else is carried as an opaque encoded blob.
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct PathAttributeList {
    pub nexthop: IpAddr,
    #[new(default)]
    pub local_pref: Option<u32>,
    #[new(default)]
    pub med: Option<u32>,
    #[new(default)]
    pub atomic_aggregate: bool,
    #[new(default)]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opaque: Vec<u8>,
}

// Shared, immutable handle to an interned attribute list.
pub type PathAttrs = Arc<AttrSet<PathAttributeList>>;

// Interning store for attribute values.
#[derive(Debug, Eq, PartialEq)]
pub struct AttrSets<T> {
    pub tree: BTreeMap<T, Arc<AttrSet<T>>>,
    next_index: u64,
}

#[derive(Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub struct AttrSet<T> {
    pub index: u64,
    pub value: T,
}

// ===== impl PathAttributeList =====

impl PathAttributeList {
    pub const DFLT_LOCAL_PREF: u32 = 100;

    pub fn with_local_pref(mut self, local_pref: u32) -> Self {
        self.local_pref = Some(local_pref);
        self
    }

    pub fn with_med(mut self, med: u32) -> Self {
        self.med = Some(med);
        self
    }

    // Returns the LOCAL_PREF value used for route selection.
    pub fn local_pref(&self) -> u32 {
        self.local_pref.unwrap_or(Self::DFLT_LOCAL_PREF)
    }

    // Returns the MED value used for route selection.
    pub fn med(&self) -> u32 {
        self.med.unwrap_or(0)
    }
}

// ===== impl AttrSets =====

impl<T> AttrSets<T>
where
    T: Clone + Eq + Ord + PartialEq + PartialOrd,
{
    // Returns the shared handle for the given value, interning it if
    // necessary.
    pub fn get(&mut self, attr: &T) -> Arc<AttrSet<T>> {
        if let Some(attr_set) = self.tree.get(attr) {
            Arc::clone(attr_set)
        } else {
            self.next_index += 1;
            let attr_set = Arc::new(AttrSet {
                index: self.next_index,
                value: attr.clone(),
            });
            self.tree.insert(attr.clone(), Arc::clone(&attr_set));
            attr_set
        }
    }

    // Removes the values no longer referenced outside the store.
    pub fn purge_unused(&mut self) -> usize {
        let before = self.tree.len();
        self.tree.retain(|_, attr_set| Arc::strong_count(attr_set) > 1);
        before - self.tree.len()
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl<T> Default for AttrSets<T> {
    fn default() -> AttrSets<T> {
        AttrSets {
            tree: Default::default(),
            next_index: 0,
        }
    }
}
