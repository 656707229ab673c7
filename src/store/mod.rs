//! Persistence of subnets and address records.
//!
//! This module handles all storage operations:
//! - [`IpamStore`] - the storage collaborator consumed by the service
//! - [`MemoryStore`] - mutex-guarded, process-local store
//! - [`JsonFileStore`] - the same, snapshotted to a JSON file on every commit
//!
//! Each store operation is one exclusive transaction: either everything it
//! writes is committed or nothing is. Overlap checking inside
//! [`IpamStore::create_subnet`] happens under that same exclusion.

mod json_file;
mod memory;
mod state;

use crate::error::IpamResult;
use crate::models::{
    AddressDraft, AddressFamily, IpAddressRecord, NewSubnet, StatusChange, Subnet, SubnetId,
    SubnetUpdate,
};
use std::net::IpAddr;

pub use json_file::JsonFileStore;
pub use memory::MemoryStore;
pub use state::StoreState;

/// Storage collaborator for subnets and their address records.
pub trait IpamStore: Send + Sync + 'static {
    fn list_subnets(&self, family: Option<AddressFamily>) -> IpamResult<Vec<Subnet>>;

    fn get_subnet(&self, id: SubnetId) -> IpamResult<Subnet>;

    /// Check for overlap and insert the subnet with its initial drafts, atomically.
    fn create_subnet(&self, new: NewSubnet, drafts: &[AddressDraft]) -> IpamResult<(Subnet, usize)>;

    fn update_subnet(&self, id: SubnetId, update: &SubnetUpdate) -> IpamResult<Subnet>;

    /// Delete a subnet and its address records; returns the number of records removed.
    fn delete_subnet(&self, id: SubnetId) -> IpamResult<usize>;

    /// Insert missing drafts as one batch; returns the number created.
    fn insert_addresses(&self, id: SubnetId, drafts: &[AddressDraft]) -> IpamResult<usize>;

    fn list_addresses(&self, id: SubnetId) -> IpamResult<Vec<IpAddressRecord>>;

    fn set_address_status(
        &self,
        id: SubnetId,
        address: IpAddr,
        change: &StatusChange,
    ) -> IpamResult<IpAddressRecord>;

    /// Release every address occupied by the equipment; returns how many.
    fn release_equipment(&self, equipment_id: &str) -> IpamResult<usize>;
}

/// Exclusive access to a [`StoreState`].
///
/// `write` must run the closure against a scratch copy and commit it only
/// when the closure succeeds.
pub trait StateBackend: Send + Sync + 'static {
    fn read<T>(&self, f: impl FnOnce(&StoreState) -> IpamResult<T>) -> IpamResult<T>;

    fn write<T>(&self, f: impl FnOnce(&mut StoreState) -> IpamResult<T>) -> IpamResult<T>;
}

impl<B: StateBackend> IpamStore for B {
    fn list_subnets(&self, family: Option<AddressFamily>) -> IpamResult<Vec<Subnet>> {
        self.read(|state| Ok(state.list_subnets(family)))
    }

    fn get_subnet(&self, id: SubnetId) -> IpamResult<Subnet> {
        self.read(|state| state.get_subnet(id).cloned())
    }

    fn create_subnet(
        &self,
        new: NewSubnet,
        drafts: &[AddressDraft],
    ) -> IpamResult<(Subnet, usize)> {
        self.write(|state| state.create_subnet(new, drafts))
    }

    fn update_subnet(&self, id: SubnetId, update: &SubnetUpdate) -> IpamResult<Subnet> {
        self.write(|state| state.update_subnet(id, update))
    }

    fn delete_subnet(&self, id: SubnetId) -> IpamResult<usize> {
        self.write(|state| state.delete_subnet(id))
    }

    fn insert_addresses(&self, id: SubnetId, drafts: &[AddressDraft]) -> IpamResult<usize> {
        self.write(|state| state.insert_addresses(id, drafts))
    }

    fn list_addresses(&self, id: SubnetId) -> IpamResult<Vec<IpAddressRecord>> {
        self.read(|state| state.list_addresses(id))
    }

    fn set_address_status(
        &self,
        id: SubnetId,
        address: IpAddr,
        change: &StatusChange,
    ) -> IpamResult<IpAddressRecord> {
        self.write(|state| state.set_address_status(id, address, change))
    }

    fn release_equipment(&self, equipment_id: &str) -> IpamResult<usize> {
        self.write(|state| Ok(state.release_equipment(equipment_id)))
    }
}
