//! Transactional store state shared by the in-memory and file stores.
//!
//! Every mutation runs against a scratch copy handed out by a
//! [`super::StateBackend`]; a failed operation is simply dropped, so all
//! checks here may bail out halfway without leaving partial writes behind.

use crate::error::{IpamError, IpamResult};
use crate::models::{
    addr_to_u128, AddressDraft, AddressFamily, AddressId, AddressRole, AddressStatus,
    CidrDescriptor, IpAddressRecord, NewSubnet, StatusChange, Subnet, SubnetId, SubnetUpdate,
};
use crate::processing::{find_overlaps, role_for, ReservationPolicy};
use chrono::Utc;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreState {
    #[serde(default)]
    next_subnet_id: u64,
    #[serde(default)]
    next_address_id: u64,
    #[serde(default)]
    subnets: Vec<Subnet>,
    #[serde(default)]
    addresses: Vec<IpAddressRecord>,
}

impl StoreState {
    pub fn list_subnets(&self, family: Option<AddressFamily>) -> Vec<Subnet> {
        let mut subnets: Vec<Subnet> = self
            .subnets
            .iter()
            .filter(|s| family.map_or(true, |f| s.family == f))
            .cloned()
            .collect();
        subnets.sort_by_key(|s| (s.family, addr_to_u128(s.network_address), s.prefix_len));
        subnets
    }

    pub fn get_subnet(&self, id: SubnetId) -> IpamResult<&Subnet> {
        self.subnets
            .iter()
            .find(|s| s.id == id)
            .ok_or(IpamError::SubnetNotFound(id))
    }

    fn get_subnet_mut(&mut self, id: SubnetId) -> IpamResult<&mut Subnet> {
        self.subnets
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(IpamError::SubnetNotFound(id))
    }

    /// Register a subnet and its initial drafts. The overlap check runs under
    /// the same exclusive write as the insert.
    pub fn create_subnet(
        &mut self,
        new: NewSubnet,
        drafts: &[AddressDraft],
    ) -> IpamResult<(Subnet, usize)> {
        new.validate()?;
        let descriptor = new.descriptor;

        let conflicts = find_overlaps(&descriptor, &self.subnets);
        if let Some(conflict) = conflicts.first() {
            return Err(IpamError::RangeOverlap(conflict.describe()));
        }

        self.next_subnet_id += 1;
        let now = Utc::now();
        let gateway_address = descriptor.gateway_address.filter(|_| new.reserve_gateway);
        let gateway_name = gateway_address.and(new.gateway_name);
        let subnet = Subnet {
            id: SubnetId(self.next_subnet_id),
            name: new.name.trim().to_string(),
            description: new.description,
            family: descriptor.family,
            cidr: descriptor.cidr(),
            network_address: descriptor.network_address,
            prefix_len: descriptor.prefix_len,
            gateway_address,
            gateway_name,
            broadcast_address: descriptor.broadcast_address,
            total_addresses: descriptor.total_addresses,
            usable_addresses: descriptor.usable_addresses,
            vlan_id: new.vlan_id,
            location_id: new.location_id,
            created_at: now,
            updated_at: now,
        };
        let id = subnet.id;
        self.subnets.push(subnet);
        let created = self.insert_addresses(id, drafts)?;
        Ok((self.get_subnet(id)?.clone(), created))
    }

    pub fn update_subnet(&mut self, id: SubnetId, update: &SubnetUpdate) -> IpamResult<Subnet> {
        update.validate()?;
        let subnet = self.get_subnet_mut(id)?;
        update.apply(subnet);
        subnet.updated_at = Utc::now();
        Ok(subnet.clone())
    }

    /// Remove a subnet together with its address records.
    pub fn delete_subnet(&mut self, id: SubnetId) -> IpamResult<usize> {
        self.get_subnet(id)?;
        self.subnets.retain(|s| s.id != id);
        let before = self.addresses.len();
        self.addresses.retain(|a| a.subnet_id != id);
        Ok(before - self.addresses.len())
    }

    /// Insert the drafts that are not materialised yet.
    ///
    /// A draft whose address already exists with the same role is already
    /// satisfied. Any other clash rejects the whole batch, as does a role that
    /// does not fit the address's position in the range. A gateway draft on
    /// the gateway candidate of a subnet without a gateway records it as the
    /// subnet gateway.
    pub fn insert_addresses(&mut self, id: SubnetId, drafts: &[AddressDraft]) -> IpamResult<usize> {
        let subnet = self.get_subnet(id)?.clone();
        let descriptor = subnet.descriptor();

        if let Some(draft) = drafts.iter().find(|d| !descriptor.contains(d.address)) {
            return Err(IpamError::AddressOutsideSubnet {
                cidr: subnet.cidr.clone(),
                address: draft.address,
            });
        }
        if let Some(dup) = drafts.iter().duplicates_by(|d| d.address).next() {
            return Err(IpamError::PersistenceConflict {
                subnet_id: id,
                address: dup.address,
                reason: "address drafted more than once in the batch".to_string(),
            });
        }
        for draft in drafts {
            check_draft_role(&subnet, &descriptor, draft)?;
        }

        let existing: HashMap<IpAddr, AddressRole> = self
            .addresses
            .iter()
            .filter(|a| a.subnet_id == id)
            .map(|a| (a.address, a.role))
            .collect();

        let mut missing = Vec::new();
        for draft in drafts {
            match existing.get(&draft.address) {
                Some(role) if *role == draft.role => continue,
                Some(role) => {
                    return Err(IpamError::PersistenceConflict {
                        subnet_id: id,
                        address: draft.address,
                        reason: format!("existing {role} record, drafted as {}", draft.role),
                    })
                }
                None => missing.push(draft),
            }
        }

        let designated = missing
            .iter()
            .find(|d| d.role == AddressRole::Gateway && subnet.gateway_address.is_none())
            .map(|d| d.address);

        let now = Utc::now();
        for draft in &missing {
            self.next_address_id += 1;
            self.addresses.push(IpAddressRecord {
                id: AddressId(self.next_address_id),
                subnet_id: id,
                address: draft.address,
                role: draft.role,
                status: draft.status,
                name: draft.name.clone(),
                note: None,
                equipment_id: None,
                created_at: now,
                updated_at: now,
            });
        }
        if let Some(gateway) = designated {
            let subnet = self.get_subnet_mut(id)?;
            subnet.gateway_address = Some(gateway);
            subnet.updated_at = now;
            log::info!("subnet {id}: {gateway} recorded as gateway");
        }
        log::debug!(
            "subnet {id}: inserted {} of {} drafted addresses",
            missing.len(),
            drafts.len()
        );
        Ok(missing.len())
    }

    pub fn list_addresses(&self, id: SubnetId) -> IpamResult<Vec<IpAddressRecord>> {
        self.get_subnet(id)?;
        let mut records: Vec<IpAddressRecord> = self
            .addresses
            .iter()
            .filter(|a| a.subnet_id == id)
            .cloned()
            .collect();
        records.sort_by_key(|a| addr_to_u128(a.address));
        Ok(records)
    }

    pub fn set_address_status(
        &mut self,
        id: SubnetId,
        address: IpAddr,
        change: &StatusChange,
    ) -> IpamResult<IpAddressRecord> {
        self.get_subnet(id)?;
        let record = self
            .addresses
            .iter_mut()
            .find(|a| a.subnet_id == id && a.address == address)
            .ok_or(IpamError::AddressNotFound {
                subnet_id: id,
                address,
            })?;

        if record.role.is_structural() || !record.status.can_transition_to(change.status) {
            return Err(IpamError::InvalidTransition {
                address,
                from: record.status,
                to: change.status,
            });
        }

        record.status = change.status;
        record.equipment_id = match change.status {
            AddressStatus::Available => None,
            _ => change.equipment_id.clone().or(record.equipment_id.take()),
        };
        if let Some(name) = &change.name {
            record.name = Some(name.clone());
        }
        if let Some(note) = &change.note {
            record.note = Some(note.clone());
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    /// Check a loaded snapshot and move the id counters past every stored id.
    ///
    /// Snapshots written by hand may lack the counters or carry stale ones.
    pub fn reconcile(&mut self) -> IpamResult<()> {
        if let Some(dup) = self.subnets.iter().map(|s| s.id).duplicates().next() {
            return Err(IpamError::Storage(format!("duplicate subnet id {dup}")));
        }
        if let Some(dup) = self.addresses.iter().map(|a| a.id).duplicates().next() {
            return Err(IpamError::Storage(format!("duplicate address id {dup}")));
        }
        if let Some(record) = self
            .addresses
            .iter()
            .find(|a| !self.subnets.iter().any(|s| s.id == a.subnet_id))
        {
            return Err(IpamError::Storage(format!(
                "address {} references missing subnet {}",
                record.id, record.subnet_id
            )));
        }
        if let Some(max) = self.subnets.iter().map(|s| s.id.0).max() {
            self.next_subnet_id = self.next_subnet_id.max(max);
        }
        if let Some(max) = self.addresses.iter().map(|a| a.id.0).max() {
            self.next_address_id = self.next_address_id.max(max);
        }
        Ok(())
    }

    /// Release every address held by `equipment_id`. Records are kept.
    pub fn release_equipment(&mut self, equipment_id: &str) -> usize {
        let now = Utc::now();
        let mut released = 0;
        for record in self
            .addresses
            .iter_mut()
            .filter(|a| a.equipment_id.as_deref() == Some(equipment_id))
        {
            record.status = AddressStatus::Available;
            record.equipment_id = None;
            record.updated_at = now;
            released += 1;
        }
        released
    }
}

/// Reject a draft whose role does not match its position in the subnet.
fn check_draft_role(
    subnet: &Subnet,
    descriptor: &CidrDescriptor,
    draft: &AddressDraft,
) -> IpamResult<()> {
    let policy = ReservationPolicy {
        reserve_gateway: subnet.gateway_address.is_some(),
        gateway_name: None,
    };
    let expected = role_for(descriptor, &policy, draft.address);
    let designates_gateway = draft.role == AddressRole::Gateway
        && expected == AddressRole::Host
        && descriptor.gateway_address == Some(draft.address);
    if draft.role == expected || designates_gateway {
        return Ok(());
    }
    Err(IpamError::PersistenceConflict {
        subnet_id: subnet.id,
        address: draft.address,
        reason: format!(
            "drafted as {}, but the address is the {expected} position of {}",
            draft.role, subnet.cidr
        ),
    })
}
