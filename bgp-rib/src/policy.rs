//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::rc::Rc;

use derive_new::new;
use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};

use crate::attrs::PathAttributeList;
use crate::peer::PeerInfo;
use crate::route::{AggrMarker, PolicyTags};

// Represents a simplified version of `SubnetRoute`, containing only
// information relevant for the application of routing policies.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(new)]
#[derive(Deserialize, Serialize)]
pub struct RoutePolicyInfo {
    pub origin: PeerInfo,
    pub attrs: PathAttributeList,
    pub policy_tags: PolicyTags,
    pub aggr: AggrMarker,
}

#[derive(Debug)]
#[derive(Deserialize, Serialize)]
pub enum PolicyResult<T> {
    Accept(T),
    Reject,
}

// Routing policy evaluated by the policy filter stages.
//
// `peer` is the peer owning the pipeline branch the policy is attached to:
// the route's source for import policies and its destination for export
// policies.
pub trait RoutePolicy: std::fmt::Debug {
    fn name(&self) -> &str;

    fn process(
        &self,
        peer: &PeerInfo,
        prefix: &IpNetwork,
        rpinfo: RoutePolicyInfo,
    ) -> PolicyResult<RoutePolicyInfo>;
}

// Policies of a peering.
#[derive(Clone, Debug, Default)]
pub struct PeerPolicies {
    pub import: Vec<Rc<dyn RoutePolicy>>,
    pub export: Vec<Rc<dyn RoutePolicy>>,
}

// Marks the routes falling within a configured aggregate as eligible for
// aggregation.
#[derive(Clone, Debug, Eq, PartialEq)]
#[derive(new)]
pub struct AggregatePolicy {
    pub prefix: IpNetwork,
    pub summary_only: bool,
}

// ===== impl AggregatePolicy =====

impl AggregatePolicy {
    fn covers(&self, prefix: &IpNetwork) -> bool {
        match (self.prefix, prefix) {
            (IpNetwork::V4(aggr), IpNetwork::V4(prefix)) => {
                aggr.prefix() <= prefix.prefix() && aggr.contains(prefix.ip())
            }
            (IpNetwork::V6(aggr), IpNetwork::V6(prefix)) => {
                aggr.prefix() <= prefix.prefix() && aggr.contains(prefix.ip())
            }
            _ => false,
        }
    }
}

impl RoutePolicy for AggregatePolicy {
    fn name(&self) -> &str {
        "aggregate"
    }

    fn process(
        &self,
        _peer: &PeerInfo,
        prefix: &IpNetwork,
        mut rpinfo: RoutePolicyInfo,
    ) -> PolicyResult<RoutePolicyInfo> {
        if self.covers(prefix) && rpinfo.aggr == AggrMarker::Ignore {
            rpinfo.aggr = AggrMarker::Eligible {
                prefix_len: self.prefix.prefix(),
                brief: self.summary_only,
            };
        }
        PolicyResult::Accept(rpinfo)
    }
}

// ===== global functions =====

// Runs a chain of policies over a route.
//
// A route is accepted unless one of the policies rejects it.
pub fn process_policies(
    policies: &[Rc<dyn RoutePolicy>],
    peer: &PeerInfo,
    prefix: &IpNetwork,
    mut rpinfo: RoutePolicyInfo,
) -> PolicyResult<RoutePolicyInfo> {
    for policy in policies {
        match policy.process(peer, prefix, rpinfo) {
            PolicyResult::Accept(result) => rpinfo = result,
            PolicyResult::Reject => return PolicyResult::Reject,
        }
    }

    PolicyResult::Accept(rpinfo)
}
