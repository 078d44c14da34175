//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipnetwork::{IpNetwork, IpNetworkError, Ipv4Network, Ipv6Network};
use serde::Serialize;
use serde::de::DeserializeOwned;

// Extension methods for IpAddr.
pub trait IpAddrExt {
    // Returns true if this is an usable address.
    fn is_usable(&self) -> bool;
}

// Extension methods for IpNetwork.
pub trait IpNetworkExt {
    // Apply mask to prefix.
    #[must_use]
    fn apply_mask(&self) -> IpNetwork;
}

// Address types usable as keys of a prefix trie.
//
// Addresses are handled as right-aligned integers of `MAX_PREFIXLEN` bits, so
// that IPv4 and IPv6 share the same bit-level helpers.
pub trait IpAddrKind:
    std::fmt::Debug
    + std::fmt::Display
    + Clone
    + Copy
    + Eq
    + std::hash::Hash
    + Ord
    + PartialEq
    + PartialOrd
    + DeserializeOwned
    + Serialize
    + Into<IpAddr>
{
    const MAX_PREFIXLEN: u8;

    fn get(addr: IpAddr) -> Option<Self>;

    // Returns true if this is an usable address.
    fn is_usable(&self) -> bool;

    fn unspecified() -> Self;

    fn to_bits(&self) -> u128;

    fn from_bits(bits: u128) -> Self;
}

pub trait IpNetworkKind<I: IpAddrKind>:
    std::fmt::Debug
    + std::fmt::Display
    + Clone
    + Copy
    + Eq
    + std::hash::Hash
    + Ord
    + PartialEq
    + PartialOrd
    + DeserializeOwned
    + Serialize
    + Into<IpNetwork>
{
    fn new(addr: I, prefix: u8) -> Result<Self, IpNetworkError>;

    fn get(prefix: IpNetwork) -> Option<Self>;

    fn ip(&self) -> I;

    fn prefix(&self) -> u8;

    // Apply mask to prefix.
    #[must_use]
    fn apply_mask(&self) -> Self {
        let bits = self.first_bits();
        Self::from_bits(bits, self.prefix())
    }

    // Returns true if this is a host prefix.
    fn is_host_prefix(&self) -> bool {
        self.prefix() == I::MAX_PREFIXLEN
    }

    // Returns the host prefix covering only the given address.
    fn host(addr: I) -> Self {
        Self::from_bits(addr.to_bits(), I::MAX_PREFIXLEN)
    }

    // Network address as a right-aligned integer.
    fn first_bits(&self) -> u128 {
        self.ip().to_bits() & mask_bits(I::MAX_PREFIXLEN, self.prefix())
    }

    // Last address covered by this network as a right-aligned integer.
    fn last_bits(&self) -> u128 {
        self.first_bits()
            | (mask_bits(I::MAX_PREFIXLEN, I::MAX_PREFIXLEN)
                & !mask_bits(I::MAX_PREFIXLEN, self.prefix()))
    }

    // Returns the value of the address bit at the given position, counting
    // from the most significant bit.
    fn bit(&self, pos: u8) -> bool {
        addr_bit::<I>(self.ip().to_bits(), pos)
    }

    // Returns the longest network covering both `self` and `other`.
    fn common_prefix(&self, other: &Self) -> Self {
        let width = I::MAX_PREFIXLEN;
        let diff = self.first_bits() ^ other.first_bits();
        let same = (diff.leading_zeros() - (128 - width as u32)) as u8;
        let len = same.min(self.prefix()).min(other.prefix());
        Self::from_bits(self.first_bits() & mask_bits(width, len), len)
    }

    // Builds a network out of an address in integer form.
    //
    // The prefix length must not exceed the address length.
    fn from_bits(bits: u128, prefix: u8) -> Self;
}

// ===== impl IpAddr =====

impl IpAddrExt for IpAddr {
    fn is_usable(&self) -> bool {
        match self {
            IpAddr::V4(addr) => addr.is_usable(),
            IpAddr::V6(addr) => addr.is_usable(),
        }
    }
}

// ===== impl Ipv4Addr =====

impl IpAddrKind for Ipv4Addr {
    const MAX_PREFIXLEN: u8 = 32;

    fn get(addr: IpAddr) -> Option<Self> {
        match addr {
            IpAddr::V4(addr) => Some(addr),
            _ => None,
        }
    }

    fn is_usable(&self) -> bool {
        !(self.is_loopback()
            || self.is_broadcast()
            || self.is_multicast()
            || self.is_unspecified())
    }

    fn unspecified() -> Self {
        Ipv4Addr::UNSPECIFIED
    }

    fn to_bits(&self) -> u128 {
        u32::from(*self) as u128
    }

    fn from_bits(bits: u128) -> Self {
        Ipv4Addr::from(bits as u32)
    }
}

// ===== impl Ipv6Addr =====

impl IpAddrKind for Ipv6Addr {
    const MAX_PREFIXLEN: u8 = 128;

    fn get(addr: IpAddr) -> Option<Self> {
        match addr {
            IpAddr::V6(addr) => Some(addr),
            _ => None,
        }
    }

    fn is_usable(&self) -> bool {
        !(self.is_loopback() || self.is_multicast() || self.is_unspecified())
    }

    fn unspecified() -> Self {
        Ipv6Addr::UNSPECIFIED
    }

    fn to_bits(&self) -> u128 {
        u128::from(*self)
    }

    fn from_bits(bits: u128) -> Self {
        Ipv6Addr::from(bits)
    }
}

// ===== impl IpNetwork =====

impl IpNetworkExt for IpNetwork {
    fn apply_mask(&self) -> IpNetwork {
        match self {
            IpNetwork::V4(prefix) => {
                IpNetwork::V4(IpNetworkKind::apply_mask(prefix))
            }
            IpNetwork::V6(prefix) => {
                IpNetwork::V6(IpNetworkKind::apply_mask(prefix))
            }
        }
    }
}

// ===== impl Ipv4Network =====

impl IpNetworkKind<Ipv4Addr> for Ipv4Network {
    fn new(addr: Ipv4Addr, prefix: u8) -> Result<Self, IpNetworkError> {
        Ipv4Network::new(addr, prefix)
    }

    fn get(prefix: IpNetwork) -> Option<Self> {
        match prefix {
            IpNetwork::V4(prefix) => Some(prefix),
            _ => None,
        }
    }

    fn ip(&self) -> Ipv4Addr {
        Ipv4Network::ip(*self)
    }

    fn prefix(&self) -> u8 {
        Ipv4Network::prefix(*self)
    }

    fn from_bits(bits: u128, prefix: u8) -> Self {
        let addr = <Ipv4Addr as IpAddrKind>::from_bits(bits);
        match Ipv4Network::new(addr, prefix) {
            Ok(network) => network,
            Err(error) => panic!("invalid IPv4 prefix length: {error}"),
        }
    }
}

// ===== impl Ipv6Network =====

impl IpNetworkKind<Ipv6Addr> for Ipv6Network {
    fn new(addr: Ipv6Addr, prefix: u8) -> Result<Self, IpNetworkError> {
        Ipv6Network::new(addr, prefix)
    }

    fn get(prefix: IpNetwork) -> Option<Self> {
        match prefix {
            IpNetwork::V6(prefix) => Some(prefix),
            _ => None,
        }
    }

    fn ip(&self) -> Ipv6Addr {
        Ipv6Network::ip(self)
    }

    fn prefix(&self) -> u8 {
        Ipv6Network::prefix(self)
    }

    fn from_bits(bits: u128, prefix: u8) -> Self {
        let addr = <Ipv6Addr as IpAddrKind>::from_bits(bits);
        match Ipv6Network::new(addr, prefix) {
            Ok(network) => network,
            Err(error) => panic!("invalid IPv6 prefix length: {error}"),
        }
    }
}

// ===== global functions =====

// Returns a mask with the `len` most significant bits of a `width`-bit
// address set.
pub fn mask_bits(width: u8, len: u8) -> u128 {
    if len == 0 {
        return 0;
    }
    (u128::MAX << (128 - len as u32)) >> (128 - width as u32)
}

// Returns the value of the address bit at the given position, counting from
// the most significant bit.
pub fn addr_bit<I: IpAddrKind>(bits: u128, pos: u8) -> bool {
    (bits >> (I::MAX_PREFIXLEN - 1 - pos)) & 1 == 1
}

// ===== unit tests =====
