//! Domain models for the subnet engine.
//!
//! This module contains the core data structures used throughout the crate:
//! - [`CidrDescriptor`] - parsed CIDR range with reserved addresses and counts
//! - [`Subnet`] - a registered subnet
//! - [`IpAddressRecord`] and [`AddressDraft`] - individually tracked addresses

mod address;
mod cidr;
mod subnet;

// Re-export public types
pub use address::{
    AddressDraft, AddressId, AddressRole, AddressStatus, IpAddressRecord, StatusChange,
};
pub use cidr::{
    addr_to_u128, cut_addr, get_cidr_mask, host_mask, last_addr, split_cidr, total_addresses,
    u128_to_addr, AddressFamily, CidrDescriptor, IPV4_MAX_LENGTH, IPV6_MAX_LENGTH,
};
pub use subnet::{NewSubnet, Subnet, SubnetId, SubnetUpdate};
