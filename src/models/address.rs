//! IP address record model.

use super::SubnetId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;

/// Store-assigned identity of an address record.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct AddressId(pub u64);

impl fmt::Display for AddressId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Structural role of an address inside its subnet. Never changes after creation.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AddressRole {
    Network,
    Gateway,
    Broadcast,
    Host,
}

impl AddressRole {
    /// Network and broadcast addresses cannot be reserved, assigned or released.
    pub fn is_structural(self) -> bool {
        matches!(self, AddressRole::Network | AddressRole::Broadcast)
    }
}

impl fmt::Display for AddressRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AddressRole::Network => "network",
            AddressRole::Gateway => "gateway",
            AddressRole::Broadcast => "broadcast",
            AddressRole::Host => "host",
        };
        write!(f, "{s}")
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AddressStatus {
    Available,
    Reserved,
    Used,
}

impl AddressStatus {
    /// Allowed lifecycle moves: available -> reserved -> used, and back to
    /// available on release. Assigning straight from available is allowed.
    pub fn can_transition_to(self, to: AddressStatus) -> bool {
        use AddressStatus::*;
        matches!(
            (self, to),
            (Available, Reserved) | (Available, Used) | (Reserved, Used) | (_, Available)
        )
    }
}

impl fmt::Display for AddressStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let s = match self {
            AddressStatus::Available => "available",
            AddressStatus::Reserved => "reserved",
            AddressStatus::Used => "used",
        };
        write!(f, "{s}")
    }
}

/// An address record to be materialised, as produced by the enumerator.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AddressDraft {
    pub address: IpAddr,
    pub role: AddressRole,
    pub status: AddressStatus,
    pub name: Option<String>,
}

/// A persisted address inside a subnet. Exactly one exists per (subnet, address).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct IpAddressRecord {
    pub id: AddressId,
    pub subnet_id: SubnetId,
    pub address: IpAddr,
    pub role: AddressRole,
    pub status: AddressStatus,
    pub name: Option<String>,
    pub note: Option<String>,
    /// Weak reference to the equipment occupying this address.
    pub equipment_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A requested change of an address record's lifecycle status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    pub status: AddressStatus,
    /// Replaces the equipment link; ignored (cleared) when releasing.
    pub equipment_id: Option<String>,
    /// `Some` replaces the display name, `None` keeps it.
    pub name: Option<String>,
    /// `Some` replaces the note, `None` keeps it.
    pub note: Option<String>,
}

impl StatusChange {
    pub fn reserve() -> StatusChange {
        StatusChange {
            status: AddressStatus::Reserved,
            equipment_id: None,
            name: None,
            note: None,
        }
    }

    pub fn assign(equipment_id: Option<String>) -> StatusChange {
        StatusChange {
            status: AddressStatus::Used,
            equipment_id,
            name: None,
            note: None,
        }
    }

    pub fn release() -> StatusChange {
        StatusChange {
            status: AddressStatus::Available,
            equipment_id: None,
            name: None,
            note: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> StatusChange {
        self.name = Some(name.into());
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> StatusChange {
        self.note = Some(note.into());
        self
    }
}
