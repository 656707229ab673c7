//! Subnet engine processing logic.
//!
//! This module contains the pure parts of the engine:
//! - [`validate`] - live validation of candidate CIDR strings
//! - [`overlap`] - overlap detection against registered subnets
//! - [`enumerate`] - drafting address records for a range
//! - [`scale`] - scale policy bounding batch sizes

mod enumerate;
mod overlap;
mod scale;
mod validate;

// Re-export public functions
pub use enumerate::{
    enumerate_descriptor, generate_address_records, role_for, special_addresses,
    AddressEnumerator, Enumeration, EnumerationMode, ReservationPolicy,
};
pub use overlap::{check_overlap, find_overlaps, log_overlaps, ranges_overlap, OverlapConflict};
pub use scale::{ScaleGuard, DEFAULT_SCALE_THRESHOLD};
pub use validate::{is_private_ipv4, validate_cidr, ValidationPolicy, ValidationReport};
