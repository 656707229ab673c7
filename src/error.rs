//! Error types for the subnet engine.
//!
//! Every failure mode of parsing, storage and materialisation is a variant of
//! [`IpamError`]. Running past the scale threshold is not an error; see
//! [`crate::processing::EnumerationMode`].

use crate::models::{AddressFamily, AddressStatus, SubnetId};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;

/// Result alias used across the crate.
pub type IpamResult<T> = Result<T, IpamError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IpamError {
    /// The CIDR string cannot be tokenized into address and prefix length.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("prefix length /{prefix_len} is out of range for {family} (0-{max})")]
    OutOfRangePrefix {
        family: AddressFamily,
        prefix_len: u8,
        max: u8,
    },

    /// The candidate range intersects an already registered subnet.
    #[error("{0}")]
    RangeOverlap(String),

    #[error("address record conflict in subnet {subnet_id} for {address}: {reason}")]
    PersistenceConflict {
        subnet_id: SubnetId,
        address: IpAddr,
        reason: String,
    },

    #[error("subnet {0} not found")]
    SubnetNotFound(SubnetId),

    #[error("address {address} not found in subnet {subnet_id}")]
    AddressNotFound { subnet_id: SubnetId, address: IpAddr },

    #[error("address {address} is outside subnet {cidr}")]
    AddressOutsideSubnet { cidr: String, address: IpAddr },

    #[error("address {address} cannot move from {from} to {to}")]
    InvalidTransition {
        address: IpAddr,
        from: AddressStatus,
        to: AddressStatus,
    },

    #[error("invalid field: {0}")]
    InvalidField(String),

    #[error("storage operation '{operation}' timed out after {timeout:?}")]
    Timeout {
        operation: &'static str,
        timeout: Duration,
    },

    /// Failure reported by the store before anything was committed.
    #[error("storage failure: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl IpamError {
    /// Whether a failed storage call may be attempted again.
    ///
    /// A timed out write may still have committed in the background, so only
    /// idempotent calls are retried after a timeout.
    pub fn is_transient(&self, idempotent: bool) -> bool {
        match self {
            IpamError::Storage(_) => true,
            IpamError::Timeout { .. } => idempotent,
            _ => false,
        }
    }
}
