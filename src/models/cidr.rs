//! CIDR parsing and address arithmetic for IPv4 and IPv6.
//!
//! Both families are handled on a `u128` integer representation: IPv4
//! addresses are zero-extended from `u32`, IPv6 addresses are native. All
//! masks are computed against the family width, so the same code computes
//! network, last and gateway addresses for either family.

use crate::error::{IpamError, IpamResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// Maximum prefix length for an IPv4 network (32 bits).
pub const IPV4_MAX_LENGTH: u8 = 32;
/// Maximum prefix length for an IPv6 network (128 bits).
pub const IPV6_MAX_LENGTH: u8 = 128;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    Ipv4,
    Ipv6,
}

impl AddressFamily {
    /// Width of an address of this family in bits.
    pub fn bits(self) -> u8 {
        match self {
            AddressFamily::Ipv4 => IPV4_MAX_LENGTH,
            AddressFamily::Ipv6 => IPV6_MAX_LENGTH,
        }
    }

    pub fn of(addr: IpAddr) -> AddressFamily {
        match addr {
            IpAddr::V4(_) => AddressFamily::Ipv4,
            IpAddr::V6(_) => AddressFamily::Ipv6,
        }
    }
}

impl fmt::Display for AddressFamily {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AddressFamily::Ipv4 => write!(f, "ipv4"),
            AddressFamily::Ipv6 => write!(f, "ipv6"),
        }
    }
}

/// Convert an address to its integer value, zero-extending IPv4.
pub fn addr_to_u128(addr: IpAddr) -> u128 {
    match addr {
        IpAddr::V4(v4) => u32::from(v4) as u128,
        IpAddr::V6(v6) => u128::from(v6),
    }
}

/// Convert an integer value back to an address of the given family.
///
/// Values wider than 32 bits are truncated for IPv4; callers only pass values
/// derived from an IPv4 range.
pub fn u128_to_addr(value: u128, family: AddressFamily) -> IpAddr {
    match family {
        AddressFamily::Ipv4 => IpAddr::V4(Ipv4Addr::from(value as u32)),
        AddressFamily::Ipv6 => IpAddr::V6(Ipv6Addr::from(value)),
    }
}

/// Bits of an address below the prefix, as a mask.
///
/// # Examples
/// ```
/// use ipam_subnet_engine::models::{host_mask, AddressFamily};
/// assert_eq!(host_mask(24, AddressFamily::Ipv4), 0xFF);
/// ```
pub fn host_mask(len: u8, family: AddressFamily) -> u128 {
    let host_bits = family.bits().saturating_sub(len);
    if host_bits >= 128 {
        u128::MAX
    } else {
        (1u128 << host_bits) - 1
    }
}

/// Convert a prefix length to a network mask within the family width.
pub fn get_cidr_mask(len: u8, family: AddressFamily) -> u128 {
    let width_mask = host_mask(0, family);
    width_mask & !host_mask(len, family)
}

/// Get the network address (numeric floor) for a given address and prefix length.
pub fn cut_addr(addr: IpAddr, len: u8) -> IpAddr {
    let family = AddressFamily::of(addr);
    u128_to_addr(addr_to_u128(addr) & get_cidr_mask(len, family), family)
}

/// Get the last address (numeric ceiling) of the range; the broadcast address for IPv4.
pub fn last_addr(addr: IpAddr, len: u8) -> IpAddr {
    let family = AddressFamily::of(addr);
    let network = addr_to_u128(addr) & get_cidr_mask(len, family);
    u128_to_addr(network | host_mask(len, family), family)
}

/// Number of addresses in a range with this prefix, saturating at `u128::MAX`.
///
/// Only an IPv6 `/0` (2^128 addresses) saturates.
pub fn total_addresses(len: u8, family: AddressFamily) -> u128 {
    let host_bits = family.bits().saturating_sub(len);
    if host_bits >= 128 {
        u128::MAX
    } else {
        1u128 << host_bits
    }
}

/// Split a CIDR string into its address and prefix length tokens.
///
/// Host bits are kept; [`CidrDescriptor::parse`] clears them.
pub fn split_cidr(addr_cidr: &str) -> IpamResult<(IpAddr, u8)> {
    let addr_cidr = addr_cidr.trim();
    let parts: Vec<&str> = addr_cidr.split('/').collect();
    if parts.len() != 2 {
        return Err(IpamError::MalformedInput(format!(
            "expected <address>/<prefix length>, got '{addr_cidr}'"
        )));
    }
    let (addr_str, len_str) = (parts[0].trim(), parts[1].trim());
    if addr_str.is_empty() {
        return Err(IpamError::MalformedInput("missing address".to_string()));
    }
    if len_str.is_empty() {
        return Err(IpamError::MalformedInput("missing prefix length".to_string()));
    }
    let addr: IpAddr = addr_str
        .parse()
        .map_err(|_| IpamError::MalformedInput(format!("malformed address '{addr_str}'")))?;
    if !len_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(IpamError::MalformedInput(format!(
            "malformed prefix length '{len_str}'"
        )));
    }
    let family = AddressFamily::of(addr);
    // Digits only; anything too large for u8 is out of range rather than malformed.
    let len: u8 = match len_str.parse::<u8>() {
        Ok(len) => len,
        Err(_) => {
            return Err(IpamError::OutOfRangePrefix {
                family,
                prefix_len: u8::MAX,
                max: family.bits(),
            })
        }
    };
    if len > family.bits() {
        return Err(IpamError::OutOfRangePrefix {
            family,
            prefix_len: len,
            max: family.bits(),
        });
    }
    Ok((addr, len))
}

/// Structured description of a CIDR range. Derived, never persisted.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct CidrDescriptor {
    pub family: AddressFamily,
    /// Canonical network address with all host bits cleared.
    pub network_address: IpAddr,
    pub prefix_len: u8,
    /// Numeric ceiling of the range.
    pub last_address: IpAddr,
    /// IPv4 only; equals `last_address`.
    pub broadcast_address: Option<IpAddr>,
    /// Second address of the range when the range carries reservations.
    pub gateway_address: Option<IpAddr>,
    pub total_addresses: u128,
    pub usable_addresses: u128,
}

impl CidrDescriptor {
    /// Parse a CIDR string such as `192.168.10.0/24` or `2001:db8::/64`.
    pub fn parse(addr_cidr: &str) -> IpamResult<CidrDescriptor> {
        let (addr, len) = split_cidr(addr_cidr)?;
        Ok(CidrDescriptor::from_parts(addr, len))
    }

    /// Build a descriptor from an address and an already validated prefix length.
    pub fn from_parts(addr: IpAddr, prefix_len: u8) -> CidrDescriptor {
        let family = AddressFamily::of(addr);
        let network_address = cut_addr(addr, prefix_len);
        let last_address = last_addr(addr, prefix_len);
        let total = total_addresses(prefix_len, family);
        let reserved = reserved_boundaries(family, prefix_len);

        let usable_addresses = match (family, reserved) {
            (AddressFamily::Ipv4, true) => total.saturating_sub(2),
            // 2^n - 1 is exact even where `total` saturates.
            (AddressFamily::Ipv6, true) => host_mask(prefix_len, family),
            (_, false) => total,
        };
        let gateway_address = if reserved && usable_addresses > 0 {
            Some(u128_to_addr(addr_to_u128(network_address) + 1, family))
        } else {
            None
        };
        let broadcast_address = match family {
            AddressFamily::Ipv4 => Some(last_address),
            AddressFamily::Ipv6 => None,
        };

        CidrDescriptor {
            family,
            network_address,
            prefix_len,
            last_address,
            broadcast_address,
            gateway_address,
            total_addresses: total,
            usable_addresses,
        }
    }

    /// Canonical `network/prefix` string.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.network_address, self.prefix_len)
    }

    pub fn first_u128(&self) -> u128 {
        addr_to_u128(self.network_address)
    }

    pub fn last_u128(&self) -> u128 {
        addr_to_u128(self.last_address)
    }

    /// Whether the range reserves its network (and, for IPv4, broadcast) address.
    ///
    /// Point-to-point (/31, /127) and host routes (/32, /128) reserve nothing.
    pub fn has_reserved_boundaries(&self) -> bool {
        reserved_boundaries(self.family, self.prefix_len)
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        if AddressFamily::of(addr) != self.family {
            return false;
        }
        let value = addr_to_u128(addr);
        self.first_u128() <= value && value <= self.last_u128()
    }

    /// True when `total_addresses` could not represent the exact count.
    pub fn is_total_saturated(&self) -> bool {
        self.family.bits() - self.prefix_len >= 128
    }
}

fn reserved_boundaries(family: AddressFamily, prefix_len: u8) -> bool {
    prefix_len + 2 <= family.bits()
}

impl FromStr for CidrDescriptor {
    type Err = IpamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CidrDescriptor::parse(s)
    }
}

impl fmt::Display for CidrDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.network_address, self.prefix_len)
    }
}
