//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bgp_rib_utils::ip::{IpAddrKind, IpNetworkKind};
use ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};
use serde::{Deserialize, Serialize};

use crate::trie::TrieKey;

// Address Family Identifier.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Afi {
    Ipv4,
    Ipv6,
}

// Subsequent Address Family Identifier.
#[derive(Clone, Copy, Debug, Default, Eq, Ord, PartialEq, PartialOrd)]
#[derive(Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Safi {
    #[default]
    Unicast,
    Multicast,
}

// BGP address family.
pub trait AddressFamily: Sized + std::fmt::Debug + 'static {
    // Address Family Identifier.
    const AFI: Afi;

    // The type of IP address used by this address family.
    type IpAddr: IpAddrKind;
    // The type of IP network used by this address family.
    type IpNetwork: IpNetworkKind<Self::IpAddr> + TrieKey<Addr = Self::IpAddr>;

    // Extract an address of this family from a generic IP address.
    fn addr(addr: IpAddr) -> Option<Self::IpAddr> {
        <Self::IpAddr as IpAddrKind>::get(addr)
    }

    // Extract a prefix of this family from a generic IP prefix.
    fn prefix(prefix: IpNetwork) -> Option<Self::IpNetwork> {
        <Self::IpNetwork as IpNetworkKind<Self::IpAddr>>::get(prefix)
    }
}

#[derive(Debug)]
pub struct Ipv4;

#[derive(Debug)]
pub struct Ipv6;

// ===== impl Afi =====

impl std::fmt::Display for Afi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Afi::Ipv4 => write!(f, "ipv4"),
            Afi::Ipv6 => write!(f, "ipv6"),
        }
    }
}

// ===== impl Safi =====

impl std::fmt::Display for Safi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Safi::Unicast => write!(f, "unicast"),
            Safi::Multicast => write!(f, "multicast"),
        }
    }
}

// ===== impl Ipv4 =====

impl AddressFamily for Ipv4 {
    const AFI: Afi = Afi::Ipv4;

    type IpAddr = Ipv4Addr;
    type IpNetwork = Ipv4Network;
}

// ===== impl Ipv6 =====

impl AddressFamily for Ipv6 {
    const AFI: Afi = Afi::Ipv6;

    type IpAddr = Ipv6Addr;
    type IpNetwork = Ipv6Network;
}
