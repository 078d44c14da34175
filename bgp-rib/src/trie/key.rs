//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::{Ipv4Addr, Ipv6Addr};

use bgp_rib_utils::ip::{IpAddrKind, IpNetworkKind, mask_bits};
use ipnetwork::{Ipv4Network, Ipv6Network};

// Keys of a `RefTrie`.
//
// A key is a network prefix: a run of `prefix_len()` significant address
// bits. Addresses are manipulated as right-aligned integers.
pub trait TrieKey:
    Copy + Eq + Ord + std::fmt::Debug + std::fmt::Display
{
    type Addr: Copy + Eq + Ord + std::fmt::Debug + std::fmt::Display;

    // Number of bits of an address.
    const MAX_LEN: u8;

    fn prefix_len(&self) -> u8;

    // Value of the address bit at the given position.
    fn bit(&self, pos: u8) -> bool;

    // First covered address.
    fn first_bits(&self) -> u128;

    // Last covered address.
    fn last_bits(&self) -> u128;

    // Longest prefix covering both keys.
    fn common_prefix(&self, other: &Self) -> Self;

    // Copy of the key with host bits cleared.
    fn normalized(&self) -> Self;

    // Host prefix of the given address.
    fn host(addr: Self::Addr) -> Self;

    fn addr_to_bits(addr: Self::Addr) -> u128;

    fn addr_from_bits(bits: u128) -> Self::Addr;

    // Returns true if `other` is equal to or more specific than `self`.
    fn covers(&self, other: &Self) -> bool {
        self.prefix_len() <= other.prefix_len()
            && other.first_bits() & mask_bits(Self::MAX_LEN, self.prefix_len())
                == self.first_bits()
    }

    // Returns true if the given address falls within this key.
    fn covers_addr(&self, addr: Self::Addr) -> bool {
        let bits = Self::addr_to_bits(addr);
        self.first_bits() <= bits && bits <= self.last_bits()
    }
}

macro_rules! impl_trie_key {
    ($network:ty, $addr:ty) => {
        impl TrieKey for $network {
            type Addr = $addr;

            const MAX_LEN: u8 = <$addr as IpAddrKind>::MAX_PREFIXLEN;

            fn prefix_len(&self) -> u8 {
                IpNetworkKind::prefix(self)
            }

            fn bit(&self, pos: u8) -> bool {
                IpNetworkKind::bit(self, pos)
            }

            fn first_bits(&self) -> u128 {
                IpNetworkKind::first_bits(self)
            }

            fn last_bits(&self) -> u128 {
                IpNetworkKind::last_bits(self)
            }

            fn common_prefix(&self, other: &Self) -> Self {
                IpNetworkKind::common_prefix(self, other)
            }

            fn normalized(&self) -> Self {
                IpNetworkKind::apply_mask(self)
            }

            fn host(addr: $addr) -> Self {
                <$network as IpNetworkKind<$addr>>::host(addr)
            }

            fn addr_to_bits(addr: $addr) -> u128 {
                IpAddrKind::to_bits(&addr)
            }

            fn addr_from_bits(bits: u128) -> $addr {
                <$addr as IpAddrKind>::from_bits(bits)
            }
        }
    };
}

impl_trie_key!(Ipv4Network, Ipv4Addr);
impl_trie_key!(Ipv6Network, Ipv6Addr);
