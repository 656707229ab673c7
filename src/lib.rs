//! IP address management subnet engine.
//!
//! Parses and validates CIDR prefixes, detects overlap with registered
//! subnets, enumerates a range into trackable address records under a scale
//! policy, and materialises those records transactionally.
//!
//! The pure entry points are free functions re-exported here; storage-backed
//! operations live on [`service::IpamService`].

pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod processing;
pub mod service;
pub mod store;

pub use config::IpamConfig;
pub use error::{IpamError, IpamResult};
pub use models::{
    AddressDraft, AddressFamily, AddressRole, AddressStatus, CidrDescriptor, IpAddressRecord,
    Subnet, SubnetId,
};
pub use processing::{
    generate_address_records, validate_cidr, Enumeration, EnumerationMode, ReservationPolicy,
    ScaleGuard, ValidationPolicy, ValidationReport,
};
pub use service::{IpamService, SubnetCreation, SubnetRequest};
pub use store::{IpamStore, JsonFileStore, MemoryStore};

/// Parse a CIDR string into its range descriptor.
///
/// # Examples
/// ```
/// let d = ipam_subnet_engine::parse_cidr("192.168.10.0/24").unwrap();
/// assert_eq!(d.usable_addresses, 254);
/// ```
pub fn parse_cidr(cidr: &str) -> IpamResult<CidrDescriptor> {
    CidrDescriptor::parse(cidr)
}
