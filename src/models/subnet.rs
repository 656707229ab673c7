//! Persisted subnet model.

use super::{AddressFamily, CidrDescriptor};
use crate::error::{IpamError, IpamResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Store-assigned identity of a subnet.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct SubnetId(pub u64);

impl fmt::Display for SubnetId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A registered subnet. The CIDR is immutable once created.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Subnet {
    pub id: SubnetId,
    pub name: String,
    pub description: Option<String>,
    pub family: AddressFamily,
    /// Canonical CIDR string, host bits cleared.
    pub cidr: String,
    pub network_address: IpAddr,
    pub prefix_len: u8,
    /// `None` when the range has no gateway candidate or it was not reserved.
    pub gateway_address: Option<IpAddr>,
    pub gateway_name: Option<String>,
    /// IPv4 only.
    pub broadcast_address: Option<IpAddr>,
    /// Cached at creation time.
    pub total_addresses: u128,
    /// Cached at creation time.
    pub usable_addresses: u128,
    pub vlan_id: Option<u16>,
    /// Weak reference to an owning location.
    pub location_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subnet {
    /// Recompute the range descriptor from the stored network and prefix.
    pub fn descriptor(&self) -> CidrDescriptor {
        CidrDescriptor::from_parts(self.network_address, self.prefix_len)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "'{}' ({})", self.name, self.cidr)
    }
}

/// Request to register a new subnet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSubnet {
    pub name: String,
    pub description: Option<String>,
    pub descriptor: CidrDescriptor,
    /// Record the descriptor's gateway candidate as the subnet gateway.
    pub reserve_gateway: bool,
    /// Only kept when a gateway is recorded.
    pub gateway_name: Option<String>,
    pub vlan_id: Option<u16>,
    pub location_id: Option<String>,
}

impl NewSubnet {
    pub fn new(name: impl Into<String>, descriptor: CidrDescriptor) -> NewSubnet {
        NewSubnet {
            name: name.into(),
            description: None,
            descriptor,
            reserve_gateway: true,
            gateway_name: None,
            vlan_id: None,
            location_id: None,
        }
    }

    pub fn validate(&self) -> IpamResult<()> {
        validate_name(&self.name)?;
        if let Some(vlan) = self.vlan_id {
            validate_vlan(vlan)?;
        }
        Ok(())
    }
}

/// Changes to the descriptive fields of a subnet.
///
/// `None` leaves a field as it is; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubnetUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub vlan_id: Option<Option<u16>>,
    pub location_id: Option<Option<String>>,
}

impl SubnetUpdate {
    pub fn validate(&self) -> IpamResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(Some(vlan)) = self.vlan_id {
            validate_vlan(vlan)?;
        }
        Ok(())
    }

    pub fn apply(&self, subnet: &mut Subnet) {
        if let Some(name) = &self.name {
            subnet.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            subnet.description = description.clone();
        }
        if let Some(vlan_id) = self.vlan_id {
            subnet.vlan_id = vlan_id;
        }
        if let Some(location_id) = &self.location_id {
            subnet.location_id = location_id.clone();
        }
    }
}

fn validate_name(name: &str) -> IpamResult<()> {
    if name.trim().is_empty() {
        return Err(IpamError::InvalidField("subnet name must not be empty".to_string()));
    }
    Ok(())
}

/// 802.1Q VLAN ids 0 and 4095 are reserved.
fn validate_vlan(vlan: u16) -> IpamResult<()> {
    if !(1..=4094).contains(&vlan) {
        return Err(IpamError::InvalidField(format!("VLAN id {vlan} is outside 1-4094")));
    }
    Ok(())
}
