//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::Cell;
use std::collections::BTreeSet;
use std::rc::Rc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::af::AddressFamily;
use crate::attrs::PathAttrs;

pub type PolicyTags = BTreeSet<u32>;

// Route stored by the pipeline.
//
// Routes are shared through `Rc` handles. A stage that needs a locally
// modified version of an upstream route creates a copy holding on to the
// route it was derived from, so that flag updates travel back up the whole
// derivation chain.
#[derive(Debug)]
pub struct SubnetRoute<A: AddressFamily> {
    prefix: A::IpNetwork,
    attrs: PathAttrs,
    policy_tags: PolicyTags,
    aggr: AggrMarker,
    flags: Cell<RouteFlags>,
    igp_metric: Cell<u32>,
    filters: Cell<[FilterSlot; PolicyFilterKind::COUNT]>,
    parent: Option<Rc<SubnetRoute<A>>>,
}

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
    #[derive(Deserialize, Serialize)]
    #[serde(transparent)]
    pub struct RouteFlags: u8 {
        const IN_USE = 0x01;
        const WINNER = 0x02;
        const FILTERED = 0x04;
        const NEXTHOP_RESOLVED = 0x08;
        const DELETED = 0x10;
    }
}

// Aggregation marker.
//
// Set by policy on the routes that should contribute to an aggregate, and
// rewritten by the aggregation stage to tell which kind of peers each copy
// is meant for.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum AggrMarker {
    #[default]
    Ignore,
    Eligible {
        prefix_len: u8,
        brief: bool,
    },
    IbgpOnly,
    EbgpAggregate,
    EbgpNotAggregated,
}

// Policy filter stages whose verdicts are recorded on routes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum PolicyFilterKind {
    Import,
    SourceMatch,
    Export,
}

// Verdict of a policy filter stage.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
#[derive(Deserialize, Serialize)]
pub enum FilterSlot {
    #[default]
    Unset,
    Accepted,
    Modified,
    Rejected,
}

// ===== impl SubnetRoute =====

impl<A> SubnetRoute<A>
where
    A: AddressFamily,
{
    pub fn new(
        prefix: A::IpNetwork,
        attrs: PathAttrs,
        policy_tags: PolicyTags,
        aggr: AggrMarker,
    ) -> Rc<SubnetRoute<A>> {
        Rc::new(SubnetRoute {
            prefix,
            attrs,
            policy_tags,
            aggr,
            flags: Default::default(),
            igp_metric: Cell::new(0),
            filters: Default::default(),
            parent: None,
        })
    }

    // Creates a modified copy of the given route.
    //
    // The copy inherits the state of the given route and keeps it alive, even
    // if no stage retains it.
    pub fn derive(
        parent: &Rc<SubnetRoute<A>>,
        attrs: PathAttrs,
        policy_tags: PolicyTags,
        aggr: AggrMarker,
    ) -> Rc<SubnetRoute<A>> {
        Rc::new(SubnetRoute {
            prefix: parent.prefix,
            attrs,
            policy_tags,
            aggr,
            flags: Cell::new(parent.flags.get() - RouteFlags::DELETED),
            igp_metric: Cell::new(parent.igp_metric.get()),
            filters: Cell::new(parent.filters.get()),
            parent: Some(Rc::clone(parent)),
        })
    }

    // Creates a copy of the given route carrying another aggregation
    // marker.
    pub fn with_aggr(
        parent: &Rc<SubnetRoute<A>>,
        aggr: AggrMarker,
    ) -> Rc<SubnetRoute<A>> {
        SubnetRoute::derive(
            parent,
            parent.attrs.clone(),
            parent.policy_tags.clone(),
            aggr,
        )
    }

    // Releases this handle to the route.
    //
    // The route is marked as deleted, so that holders of other handles can
    // tell it was withdrawn, and is freed once the last handle goes away.
    pub fn unref(self: Rc<Self>) {
        self.update_flags(|flags| flags.insert(RouteFlags::DELETED));
    }

    pub fn prefix(&self) -> &A::IpNetwork {
        &self.prefix
    }

    pub fn attrs(&self) -> &PathAttrs {
        &self.attrs
    }

    pub fn policy_tags(&self) -> &PolicyTags {
        &self.policy_tags
    }

    pub fn aggr(&self) -> AggrMarker {
        self.aggr
    }

    pub fn flags(&self) -> RouteFlags {
        self.flags.get()
    }

    // Returns the route this one was derived from.
    pub fn parent(&self) -> Option<&Rc<SubnetRoute<A>>> {
        self.parent.as_ref()
    }

    // Returns the route at the root of the derivation chain.
    pub fn original(self: &Rc<Self>) -> Rc<SubnetRoute<A>> {
        let mut route = self;
        while let Some(parent) = &route.parent {
            route = parent;
        }
        Rc::clone(route)
    }

    pub fn is_in_use(&self) -> bool {
        self.flags().contains(RouteFlags::IN_USE)
    }

    pub fn is_winner(&self) -> bool {
        self.flags().contains(RouteFlags::WINNER)
    }

    pub fn is_filtered(&self) -> bool {
        self.flags().contains(RouteFlags::FILTERED)
    }

    pub fn is_nexthop_resolved(&self) -> bool {
        self.flags().contains(RouteFlags::NEXTHOP_RESOLVED)
    }

    pub fn is_deleted(&self) -> bool {
        self.flags().contains(RouteFlags::DELETED)
    }

    pub fn igp_metric(&self) -> u32 {
        self.igp_metric.get()
    }

    pub fn set_in_use(&self, value: bool) {
        self.propagate(&|route: &SubnetRoute<A>| {
            route.update_flags(|flags| flags.set(RouteFlags::IN_USE, value))
        });
    }

    // Marks the route as the best one for its prefix, recording the IGP
    // metric it won with.
    pub fn set_is_winner(&self, value: bool, igp_metric: u32) {
        self.propagate(&|route: &SubnetRoute<A>| {
            route.update_flags(|flags| flags.set(RouteFlags::WINNER, value));
            route.igp_metric.set(igp_metric);
        });
    }

    pub fn set_filtered(&self, value: bool) {
        self.propagate(&|route: &SubnetRoute<A>| {
            route.update_flags(|flags| flags.set(RouteFlags::FILTERED, value))
        });
    }

    pub fn set_nexthop_resolved(&self, value: bool, igp_metric: u32) {
        self.propagate(&|route: &SubnetRoute<A>| {
            route.update_flags(|flags| {
                flags.set(RouteFlags::NEXTHOP_RESOLVED, value)
            });
            route.igp_metric.set(igp_metric);
        });
    }

    pub fn filter_slot(&self, kind: PolicyFilterKind) -> FilterSlot {
        self.filters.get()[kind as usize]
    }

    // Records the verdict of a policy filter stage.
    //
    // Export verdicts depend on the target peer and are never recorded.
    pub fn set_filter_slot(&self, kind: PolicyFilterKind, slot: FilterSlot) {
        if !kind.is_cached() {
            return;
        }
        let mut filters = self.filters.get();
        filters[kind as usize] = slot;
        self.filters.set(filters);
    }

    fn update_flags(&self, f: impl FnOnce(&mut RouteFlags)) {
        let mut flags = self.flags.get();
        f(&mut flags);
        self.flags.set(flags);
    }

    // Applies the given mutation to this route and all the routes it was
    // derived from.
    fn propagate(&self, f: &dyn Fn(&SubnetRoute<A>)) {
        f(self);
        if let Some(parent) = &self.parent {
            parent.propagate(f);
        }
    }
}

// ===== impl PolicyFilterKind =====

impl PolicyFilterKind {
    const COUNT: usize = 3;

    pub fn is_cached(&self) -> bool {
        !matches!(self, PolicyFilterKind::Export)
    }
}

impl std::fmt::Display for PolicyFilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyFilterKind::Import => write!(f, "import"),
            PolicyFilterKind::SourceMatch => write!(f, "source-match"),
            PolicyFilterKind::Export => write!(f, "export"),
        }
    }
}

// ===== impl AggrMarker =====

impl AggrMarker {
    // Returns the aggregate prefix length if the route should contribute to
    // an aggregate.
    pub fn eligible(&self) -> Option<(u8, bool)> {
        match self {
            AggrMarker::Eligible { prefix_len, brief } => {
                Some((*prefix_len, *brief))
            }
            _ => None,
        }
    }
}
