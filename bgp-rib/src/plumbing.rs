//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Instant;

use bgp_rib_utils::ip::IpNetworkExt;
use ipnetwork::IpNetwork;
use itertools::Itertools;
use tracing::debug_span;

use crate::af::{AddressFamily, Afi, Ipv4, Ipv6, Safi};
use crate::attrs::{AttrSets, PathAttributeList, PathAttrs};
use crate::config::{Config, DampingCfg};
use crate::debug::Debug;
use crate::error::Error;
use crate::message::{AddStatus, RouteLookup};
use crate::peer::{LOCAL_PEER_ID, PeerHandler, PeerId, PeerInfo};
use crate::policy::{PeerPolicies, RoutePolicy};
use crate::route::{PolicyFilterKind, PolicyTags};
use crate::table::aggregation::AggregationTable;
use crate::table::cache::CacheTable;
use crate::table::damping::DampingTable;
use crate::table::decision::DecisionTable;
use crate::table::fanout::FanoutTable;
use crate::table::filter::{FilterTable, StaticFilter};
use crate::table::nhlookup::{NexthopResolver, NhLookupTable};
use crate::table::policy_filter::PolicyFilterTable;
use crate::table::ribin::RibInTable;
use crate::table::ribout::RibOutTable;
use crate::table::{Table, TableId, Tables};

// Route pipeline of all address families.
#[derive(Debug)]
pub struct BgpPlumbing {
    pub ipv4: BgpPlumbingAf<Ipv4>,
    pub ipv6: Option<BgpPlumbingAf<Ipv6>>,
    attr_sets: Rc<RefCell<AttrSets<PathAttributeList>>>,
}

// Route pipeline of a single address family.
//
// Routes received from a peer go through its ingress branch into the shared
// decision, aggregation and fanout stages, which feed the egress branch of
// every peer:
//
// RibIn -> Damping -> Filter -> PolicyFilter(import) ->
// PolicyFilter(source-match) -> Cache -> NhLookup -> Decision ->
// Aggregation -> Fanout -> Filter -> PolicyFilter(export) -> RibOut
//
// While a peering goes down, a deletion stage is spliced in between its
// RibIn and Damping stages.
#[derive(Debug)]
pub struct BgpPlumbingAf<A: AddressFamily> {
    safi: Safi,
    tables: Tables<A>,
    decision: TableId,
    aggregation: TableId,
    fanout: TableId,
    peers: BTreeMap<PeerId, PeerPipeline>,
    // Deletion stages still withdrawing routes, along with their peer.
    deletions: Vec<(PeerId, TableId)>,
    resolver: Rc<dyn NexthopResolver>,
    source_match: Vec<Rc<dyn RoutePolicy>>,
    damping: DampingCfg,
}

// Stages of a peer's ingress and egress branches.
#[derive(Clone, Copy, Debug)]
pub struct PeerPipeline {
    pub peer: PeerInfo,
    pub ribin: TableId,
    pub damping: TableId,
    pub filter_in: TableId,
    pub policy_import: TableId,
    pub policy_source_match: TableId,
    pub cache: TableId,
    pub nhlookup: TableId,
    pub filter_out: TableId,
    pub policy_export: TableId,
    pub ribout: TableId,
}

// ===== impl BgpPlumbing =====

impl BgpPlumbing {
    pub fn new(config: &Config, resolver: Rc<dyn NexthopResolver>) -> Self {
        let attr_sets = Rc::new(RefCell::new(AttrSets::default()));
        let source_match = config
            .aggregate_policies()
            .into_iter()
            .map(|policy| Rc::new(policy) as Rc<dyn RoutePolicy>)
            .collect_vec();
        let ipv4 = BgpPlumbingAf::new(
            config.safi,
            attr_sets.clone(),
            resolver.clone(),
            source_match.clone(),
            config.damping,
        );
        let ipv6 = config.ipv6.then(|| {
            BgpPlumbingAf::new(
                config.safi,
                attr_sets.clone(),
                resolver,
                source_match,
                config.damping,
            )
        });
        BgpPlumbing {
            ipv4,
            ipv6,
            attr_sets,
        }
    }

    // Builds the pipelines from the configuration file at the given path, or
    // at the default location if none is given.
    pub fn load(
        path: Option<&str>,
        resolver: Rc<dyn NexthopResolver>,
    ) -> Result<Self, Error> {
        let config = Config::load(path)
            .map_err(Error::from)
            .inspect_err(Error::log)?;
        Ok(BgpPlumbing::new(&config, resolver))
    }

    // Creates the pipelines of a new peer in all address families.
    pub fn add_peering(
        &mut self,
        peer: PeerInfo,
        handler: Rc<RefCell<dyn PeerHandler>>,
        policies: PeerPolicies,
    ) -> Result<(), Error> {
        if peer.id == LOCAL_PEER_ID || self.ipv4.peers.contains_key(&peer.id) {
            let error = Error::PeerExists(peer.id);
            error.log();
            return Err(error);
        }
        Debug::PeeringCreate(&peer).log();
        self.ipv4
            .add_peering(peer, handler.clone(), &policies)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.add_peering(peer, handler, &policies),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    pub fn delete_peering(&mut self, peer_id: PeerId) -> Result<(), Error> {
        self.ipv4
            .delete_peering(peer_id)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.delete_peering(peer_id),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    pub fn peering_went_down(&mut self, peer_id: PeerId) -> Result<(), Error> {
        self.ipv4
            .peering_went_down(peer_id)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.peering_went_down(peer_id),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    pub fn peering_came_up(&mut self, peer_id: PeerId) -> Result<(), Error> {
        self.ipv4
            .peering_came_up(peer_id)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.peering_came_up(peer_id),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    // Replaces the import and export policies of a peer.
    //
    // The new policies apply to the routes processed from now on. Routes
    // already stored are left alone.
    pub fn set_peer_policies(
        &mut self,
        peer_id: PeerId,
        policies: PeerPolicies,
    ) -> Result<(), Error> {
        self.ipv4
            .set_peer_policies(peer_id, &policies)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.set_peer_policies(peer_id, &policies),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    // Adds or updates a route received from a peer.
    pub fn add_route(
        &mut self,
        peer_id: PeerId,
        prefix: IpNetwork,
        attrs: PathAttributeList,
        policy_tags: PolicyTags,
    ) -> Result<AddStatus, Error> {
        let attrs = self.attr_sets.borrow_mut().get(&attrs);
        let result = match prefix.apply_mask() {
            IpNetwork::V4(prefix) => {
                self.ipv4.add_route(peer_id, prefix, attrs, policy_tags)
            }
            IpNetwork::V6(prefix) => self.ipv6_mut().and_then(|ipv6| {
                ipv6.add_route(peer_id, prefix, attrs, policy_tags)
            }),
        };
        result.inspect_err(Error::log)
    }

    // Withdraws a route received from a peer.
    pub fn delete_route(
        &mut self,
        peer_id: PeerId,
        prefix: IpNetwork,
    ) -> Result<(), Error> {
        let result = match prefix.apply_mask() {
            IpNetwork::V4(prefix) => self.ipv4.delete_route(peer_id, &prefix),
            IpNetwork::V6(prefix) => self
                .ipv6_mut()
                .and_then(|ipv6| ipv6.delete_route(peer_id, &prefix)),
        };
        result.inspect_err(Error::log)
    }

    // Flushes the changes caused by a batch of updates from a peer.
    pub fn push(&mut self, peer_id: PeerId) -> Result<(), Error> {
        self.ipv4
            .push(peer_id)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.push(peer_id),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    pub fn output_no_longer_busy(
        &mut self,
        peer_id: PeerId,
    ) -> Result<(), Error> {
        self.ipv4
            .output_no_longer_busy(peer_id)
            .and_then(|()| match &mut self.ipv6 {
                Some(ipv6) => ipv6.output_no_longer_busy(peer_id),
                None => Ok(()),
            })
            .inspect_err(Error::log)
    }

    // Returns the attributes of the best route of a prefix.
    pub fn lookup_route(&self, prefix: IpNetwork) -> Option<PathAttrs> {
        match prefix.apply_mask() {
            IpNetwork::V4(prefix) => {
                self.ipv4.lookup_route(&prefix).map(|lookup| lookup.attrs)
            }
            IpNetwork::V6(prefix) => self
                .ipv6
                .as_ref()?
                .lookup_route(&prefix)
                .map(|lookup| lookup.attrs),
        }
    }

    // Advances every active deletion stage by one chain. Returns true if
    // there's more work to do.
    pub fn run_deletion_tick(&mut self) -> bool {
        let mut pending = self.ipv4.run_deletion_tick();
        if let Some(ipv6) = &mut self.ipv6 {
            pending |= ipv6.run_deletion_tick();
        }
        pending
    }

    // Advances the damping clock of every peer to the given time, releasing
    // the routes that are no longer suppressed. Returns true while damping
    // still tracks some route.
    pub fn run_damping_tick(&mut self, now: Instant) -> bool {
        let mut pending = self.ipv4.run_damping_tick(now);
        if let Some(ipv6) = &mut self.ipv6 {
            pending |= ipv6.run_damping_tick(now);
        }
        pending
    }

    // Drops the attribute sets no longer used by any route.
    pub fn purge_unused_attrs(&mut self) -> usize {
        self.attr_sets.borrow_mut().purge_unused()
    }

    pub fn attr_sets(&self) -> &Rc<RefCell<AttrSets<PathAttributeList>>> {
        &self.attr_sets
    }

    fn ipv6_mut(&mut self) -> Result<&mut BgpPlumbingAf<Ipv6>, Error> {
        self.ipv6
            .as_mut()
            .ok_or(Error::AddressFamilyDisabled(Afi::Ipv6))
    }
}

// ===== impl BgpPlumbingAf =====

impl<A> BgpPlumbingAf<A>
where
    A: AddressFamily,
{
    pub fn new(
        safi: Safi,
        attr_sets: Rc<RefCell<AttrSets<PathAttributeList>>>,
        resolver: Rc<dyn NexthopResolver>,
        source_match: Vec<Rc<dyn RoutePolicy>>,
        damping: DampingCfg,
    ) -> BgpPlumbingAf<A> {
        let mut tables = Tables::new(attr_sets);
        let decision = tables
            .insert_with(|id| Table::Decision(DecisionTable::new(id)));
        let aggregation = tables
            .insert_with(|id| Table::Aggregation(AggregationTable::new(id)));
        let fanout =
            tables.insert_with(|id| Table::Fanout(FanoutTable::new(id)));
        link(&mut tables, decision, aggregation);
        link(&mut tables, aggregation, fanout);

        BgpPlumbingAf {
            safi,
            tables,
            decision,
            aggregation,
            fanout,
            peers: Default::default(),
            deletions: Default::default(),
            resolver,
            source_match,
            damping,
        }
    }

    // Builds the branches of a new peer and sends it the current table.
    pub fn add_peering(
        &mut self,
        peer: PeerInfo,
        handler: Rc<RefCell<dyn PeerHandler>>,
        policies: &PeerPolicies,
    ) -> Result<(), Error> {
        if self.peers.contains_key(&peer.id) {
            return Err(Error::PeerExists(peer.id));
        }
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        // Ingress branch.
        let tables = &mut self.tables;
        let ribin =
            tables.insert_with(|id| Table::RibIn(RibInTable::new(id, peer)));
        let damping = tables.insert_with(|id| {
            Table::Damping(DampingTable::new(id, peer, self.damping))
        });
        let filter_in = tables.insert_with(|id| {
            let filters = StaticFilter::inbound(&peer);
            Table::Filter(FilterTable::new(id, peer, true, filters))
        });
        let policy_import = tables.insert_with(|id| {
            Table::PolicyFilter(PolicyFilterTable::new(
                id,
                PolicyFilterKind::Import,
                peer,
                policies.import.clone(),
            ))
        });
        let policy_source_match = tables.insert_with(|id| {
            Table::PolicyFilter(PolicyFilterTable::new(
                id,
                PolicyFilterKind::SourceMatch,
                peer,
                self.source_match.clone(),
            ))
        });
        let cache =
            tables.insert_with(|id| Table::Cache(CacheTable::new(id, peer)));
        let nhlookup = tables.insert_with(|id| {
            Table::NhLookup(NhLookupTable::new(id, self.resolver.clone()))
        });
        link(tables, ribin, damping);
        link(tables, damping, filter_in);
        link(tables, filter_in, policy_import);
        link(tables, policy_import, policy_source_match);
        link(tables, policy_source_match, cache);
        link(tables, cache, nhlookup);
        tables.set_next(nhlookup, self.decision);
        decision_mut(tables, self.decision).add_parent(nhlookup, peer);

        // Egress branch.
        let filter_out = tables.insert_with(|id| {
            let filters = StaticFilter::outbound(&peer);
            Table::Filter(FilterTable::new(id, peer, false, filters))
        });
        let policy_export = tables.insert_with(|id| {
            Table::PolicyFilter(PolicyFilterTable::new(
                id,
                PolicyFilterKind::Export,
                peer,
                policies.export.clone(),
            ))
        });
        let ribout = tables.insert_with(|id| {
            Table::RibOut(RibOutTable::new(id, peer, self.safi, handler))
        });
        tables.set_parent(filter_out, self.fanout);
        link(tables, filter_out, policy_export);
        link(tables, policy_export, ribout);
        fanout_mut(tables, self.fanout).add_branch(peer, filter_out);

        let pipeline = PeerPipeline {
            peer,
            ribin,
            damping,
            filter_in,
            policy_import,
            policy_source_match,
            cache,
            nhlookup,
            filter_out,
            policy_export,
            ribout,
        };
        self.peers.insert(peer.id, pipeline);

        self.dump_entire_table(&peer);
        Ok(())
    }

    // Removes the branches of a peer, withdrawing all of its routes first.
    pub fn delete_peering(&mut self, peer_id: PeerId) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        if self.is_up(&pipeline) {
            self.peering_went_down(peer_id)?;
        }
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();
        Debug::PeeringDelete(&pipeline.peer).log();

        // Drain the peer's deletion stages.
        let (drained, remaining) = std::mem::take(&mut self.deletions)
            .into_iter()
            .partition::<Vec<_>, _>(|(owner, _)| *owner == peer_id);
        self.deletions = remaining;
        for (_, deletion) in drained {
            while !self.step_deletion(deletion) {}
        }

        // Unplumb.
        let tables = &mut self.tables;
        decision_mut(tables, self.decision).remove_parent(pipeline.nhlookup);
        fanout_mut(tables, self.fanout).remove_branch(peer_id);
        for id in [
            pipeline.ribin,
            pipeline.damping,
            pipeline.filter_in,
            pipeline.policy_import,
            pipeline.policy_source_match,
            pipeline.cache,
            pipeline.nhlookup,
            pipeline.filter_out,
            pipeline.policy_export,
            pipeline.ribout,
        ] {
            tables.remove(id);
        }
        self.peers.remove(&peer_id);
        Ok(())
    }

    // Handles a peering going down.
    //
    // The routes received from the peer are withdrawn in the background and
    // the peer stops receiving updates.
    pub fn peering_went_down(&mut self, peer_id: PeerId) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        if !self.is_up(&pipeline) {
            return Err(Error::PeerDown(peer_id));
        }
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        // Detach the egress branch.
        fanout_mut(&mut self.tables, self.fanout).set_branch_up(peer_id, false);
        self.tables
            .with_rib_out(pipeline.ribout, |ribout, _| ribout.set_up(false));

        let deletion = self
            .tables
            .with_rib_in(pipeline.ribin, |ribin, tables| {
                ribin.ribin_peering_went_down(tables)
            });
        if let Some(deletion) = deletion {
            self.deletions.push((peer_id, deletion));
        }
        Ok(())
    }

    // Handles a peering coming back up.
    pub fn peering_came_up(&mut self, peer_id: PeerId) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        if self.is_up(&pipeline) {
            return Err(Error::PeerUp(peer_id));
        }
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();
        let peer = pipeline.peer;

        self.tables
            .with_rib_in(pipeline.ribin, |ribin, tables| {
                ribin.ribin_peering_came_up(tables)
            });

        // Reinstall the static filters.
        filter_mut(&mut self.tables, pipeline.filter_in)
            .reconfigure(peer, StaticFilter::inbound(&peer));
        filter_mut(&mut self.tables, pipeline.filter_out)
            .reconfigure(peer, StaticFilter::outbound(&peer));

        // Reattach the egress branch.
        fanout_mut(&mut self.tables, self.fanout).set_branch_up(peer_id, true);
        self.tables.with_rib_out(pipeline.ribout, |ribout, _| {
            ribout.set_peer(peer);
            ribout.set_up(true);
        });

        self.dump_entire_table(&peer);
        Ok(())
    }

    pub fn set_peer_policies(
        &mut self,
        peer_id: PeerId,
        policies: &PeerPolicies,
    ) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        policy_filter_mut(&mut self.tables, pipeline.policy_import)
            .set_policies(policies.import.clone());
        policy_filter_mut(&mut self.tables, pipeline.policy_export)
            .set_policies(policies.export.clone());
        Ok(())
    }

    pub fn add_route(
        &mut self,
        peer_id: PeerId,
        prefix: A::IpNetwork,
        attrs: PathAttrs,
        policy_tags: PolicyTags,
    ) -> Result<AddStatus, Error> {
        let pipeline = self.pipeline(peer_id)?;
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        self.tables.with_rib_in(pipeline.ribin, |ribin, tables| {
            if !ribin.is_up() {
                return Err(Error::PeerDown(peer_id));
            }
            Ok(ribin.add_route(tables, prefix, attrs, policy_tags))
        })
    }

    pub fn delete_route(
        &mut self,
        peer_id: PeerId,
        prefix: &A::IpNetwork,
    ) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        self.tables.with_rib_in(pipeline.ribin, |ribin, tables| {
            if !ribin.is_up() {
                return Err(Error::PeerDown(peer_id));
            }
            if !ribin.delete_route(tables, prefix) {
                return Err(Error::RouteNotFound(peer_id, (*prefix).into()));
            }
            Ok(())
        })
    }

    pub fn push(&mut self, peer_id: PeerId) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        self.tables.with_rib_in(pipeline.ribin, |ribin, tables| {
            ribin.push_routes(tables)
        });
        Ok(())
    }

    pub fn output_no_longer_busy(
        &mut self,
        peer_id: PeerId,
    ) -> Result<(), Error> {
        let pipeline = self.pipeline(peer_id)?;
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        self.tables.with_rib_out(pipeline.ribout, |ribout, _| {
            ribout.output_no_longer_busy()
        });
        Ok(())
    }

    // Returns the best route of a prefix, as seen by the egress branches.
    pub fn lookup_route(
        &self,
        prefix: &A::IpNetwork,
    ) -> Option<RouteLookup<A>> {
        self.tables.lookup_route(self.fanout, prefix)
    }

    pub fn run_deletion_tick(&mut self) -> bool {
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        for (peer_id, deletion) in std::mem::take(&mut self.deletions) {
            if !self.step_deletion(deletion) {
                self.deletions.push((peer_id, deletion));
            }
        }
        !self.deletions.is_empty()
    }

    pub fn run_damping_tick(&mut self, now: Instant) -> bool {
        let span = debug_span!("bgp-rib", afi = %A::AFI);
        let _span_guard = span.enter();

        let mut pending = false;
        for pipeline in self.peers.values() {
            pending |= self
                .tables
                .with_damping(pipeline.damping, |damping, tables| {
                    damping.tick(tables, now)
                });
        }
        pending
    }

    // Sends all the best routes to the given peer.
    //
    // Routes of peerings still being withdrawn are included, since
    // downstream stages only learn about their withdrawal later.
    pub fn dump_entire_table(&mut self, peer: &PeerInfo) {
        let Some(pipeline) = self.peers.get(&peer.id).copied() else {
            return;
        };
        let sources = self
            .peers
            .values()
            .map(|pipeline| pipeline.ribin)
            .chain(self.deletions.iter().map(|(_, deletion)| *deletion))
            .collect_vec();
        for source in sources {
            self.tables.dump_routes(source, peer);
        }
        self.tables.push(pipeline.ribout, self.fanout);
    }

    pub fn safi(&self) -> Safi {
        self.safi
    }

    pub fn tables(&self) -> &Tables<A> {
        &self.tables
    }

    pub fn peer_pipeline(&self, peer_id: PeerId) -> Option<&PeerPipeline> {
        self.peers.get(&peer_id)
    }

    pub fn decision(&self) -> &DecisionTable<A> {
        match self.tables.get(self.decision).as_decision() {
            Some(decision) => decision,
            None => panic!("decision stage not found"),
        }
    }

    pub fn aggregation(&self) -> &AggregationTable<A> {
        match self.tables.get(self.aggregation).as_aggregation() {
            Some(aggregation) => aggregation,
            None => panic!("aggregation stage not found"),
        }
    }

    pub fn rib_in(&self, peer_id: PeerId) -> Option<&RibInTable<A>> {
        let pipeline = self.peers.get(&peer_id)?;
        self.tables.get(pipeline.ribin).as_rib_in()
    }

    pub fn damping(&self, peer_id: PeerId) -> Option<&DampingTable<A>> {
        let pipeline = self.peers.get(&peer_id)?;
        self.tables.get(pipeline.damping).as_damping()
    }

    pub fn rib_out(&self, peer_id: PeerId) -> Option<&RibOutTable<A>> {
        let pipeline = self.peers.get(&peer_id)?;
        self.tables.get(pipeline.ribout).as_rib_out()
    }

    // Returns the number of deletion stages still withdrawing routes.
    pub fn deletion_count(&self) -> usize {
        self.deletions.len()
    }

    fn pipeline(&self, peer_id: PeerId) -> Result<PeerPipeline, Error> {
        self.peers
            .get(&peer_id)
            .copied()
            .ok_or(Error::PeerNotFound(peer_id))
    }

    // Withdraws the next chain of a deletion stage. Returns true once the
    // stage is gone.
    fn step_deletion(&mut self, deletion: TableId) -> bool {
        self.tables
            .with_deletion(deletion, |deletion, tables| deletion.step(tables))
    }

    fn is_up(&self, pipeline: &PeerPipeline) -> bool {
        self.tables
            .get(pipeline.ribin)
            .as_rib_in()
            .is_some_and(|ribin| ribin.is_up())
    }
}

// ===== helper functions =====

fn link<A>(tables: &mut Tables<A>, parent: TableId, next: TableId)
where
    A: AddressFamily,
{
    tables.set_next(parent, next);
    tables.set_parent(next, parent);
}

fn decision_mut<A>(tables: &mut Tables<A>, id: TableId) -> &mut DecisionTable<A>
where
    A: AddressFamily,
{
    match tables.get_mut(id).as_decision_mut() {
        Some(decision) => decision,
        None => panic!("decision stage not found"),
    }
}

fn fanout_mut<A>(tables: &mut Tables<A>, id: TableId) -> &mut FanoutTable<A>
where
    A: AddressFamily,
{
    match tables.get_mut(id).as_fanout_mut() {
        Some(fanout) => fanout,
        None => panic!("fanout stage not found"),
    }
}

fn filter_mut<A>(tables: &mut Tables<A>, id: TableId) -> &mut FilterTable<A>
where
    A: AddressFamily,
{
    match tables.get_mut(id).as_filter_mut() {
        Some(filter) => filter,
        None => panic!("filter stage not found"),
    }
}

fn policy_filter_mut<A>(
    tables: &mut Tables<A>,
    id: TableId,
) -> &mut PolicyFilterTable<A>
where
    A: AddressFamily,
{
    match tables.get_mut(id).as_policy_filter_mut() {
        Some(policy_filter) => policy_filter,
        None => panic!("policy filter stage not found"),
    }
}
