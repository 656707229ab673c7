//! Subnet engine facade consumed by presentation layers.
//!
//! Pure operations (parse, validate, enumerate) run inline. Every storage call
//! runs on tokio's blocking pool under a per-attempt timeout, and transient
//! failures are retried with exponential backoff. Dropping a returned future
//! abandons the wait; store writes are atomic, so an abandoned write is either
//! fully committed or not at all.

use crate::config::IpamConfig;
use crate::error::{IpamError, IpamResult};
use crate::models::{
    AddressDraft, AddressFamily, CidrDescriptor, IpAddressRecord, NewSubnet, StatusChange, Subnet,
    SubnetId, SubnetUpdate,
};
use crate::processing::{
    self, enumerate_descriptor, validate_cidr, Enumeration, EnumerationMode, ReservationPolicy,
    ValidationReport,
};
use crate::store::IpamStore;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::Arc;

/// Input of the subnet creation step.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubnetRequest {
    pub name: String,
    pub cidr: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub gateway_name: Option<String>,
    #[serde(default)]
    pub vlan_id: Option<u16>,
    #[serde(default)]
    pub location_id: Option<String>,
    /// Materialise address records as part of the creation.
    #[serde(default)]
    pub auto_generate: bool,
    /// Overrides the configured gateway reservation.
    #[serde(default)]
    pub reserve_gateway: Option<bool>,
}

impl SubnetRequest {
    pub fn new(name: impl Into<String>, cidr: impl Into<String>) -> SubnetRequest {
        SubnetRequest {
            name: name.into(),
            cidr: cidr.into(),
            description: None,
            gateway_name: None,
            vlan_id: None,
            location_id: None,
            auto_generate: false,
            reserve_gateway: None,
        }
    }
}

/// Outcome of creating a subnet or generating its addresses.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SubnetCreation {
    pub subnet: Subnet,
    /// Address records created by this call.
    pub created: usize,
    /// `None` when no addresses were requested.
    pub mode: Option<EnumerationMode>,
}

impl SubnetCreation {
    pub fn hosts_skipped(&self) -> bool {
        matches!(self.mode, Some(EnumerationMode::SpecialOnly { .. }))
    }
}

pub struct IpamService<S: IpamStore> {
    store: Arc<S>,
    config: IpamConfig,
}

impl<S: IpamStore> IpamService<S> {
    pub fn new(store: S, config: IpamConfig) -> IpamService<S> {
        IpamService::with_shared_store(Arc::new(store), config)
    }

    pub fn with_shared_store(store: Arc<S>, config: IpamConfig) -> IpamService<S> {
        IpamService { store, config }
    }

    pub fn config(&self) -> &IpamConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn parse_cidr(&self, cidr: &str) -> IpamResult<CidrDescriptor> {
        CidrDescriptor::parse(cidr)
    }

    pub fn validate_cidr(&self, cidr: &str) -> ValidationReport {
        validate_cidr(cidr, &self.config.validation_policy())
    }

    pub fn generate_address_records(
        &self,
        cidr: &str,
        policy: &ReservationPolicy,
    ) -> IpamResult<Enumeration> {
        processing::generate_address_records(cidr, policy, &self.config.scale_guard())
    }

    pub fn allow_auto_generate(&self, total_addresses: u128) -> bool {
        self.config.scale_guard().allow_auto_generate(total_addresses)
    }

    /// Describe the first registered subnet of `family` that overlaps `cidr`.
    pub async fn check_overlap(
        &self,
        cidr: &str,
        family: AddressFamily,
    ) -> IpamResult<Option<String>> {
        let descriptor = CidrDescriptor::parse(cidr)?;
        if descriptor.family != family {
            return Err(IpamError::MalformedInput(format!("{cidr} is not an {family} prefix")));
        }
        let existing = self
            .call("list_subnets", true, move |store| {
                store.list_subnets(Some(family))
            })
            .await?;
        Ok(processing::check_overlap(&descriptor, &existing))
    }

    /// Register a subnet, optionally with its address records, in one transaction.
    pub async fn create_subnet(&self, request: SubnetRequest) -> IpamResult<SubnetCreation> {
        let descriptor = CidrDescriptor::parse(&request.cidr)?;
        for warning in self.validate_cidr(&request.cidr).warnings {
            log::info!("create_subnet '{}': {warning}", request.name);
        }

        let policy = self.policy_for(request.reserve_gateway, request.gateway_name.clone());
        let (drafts, mode) = if request.auto_generate {
            let enumeration =
                enumerate_descriptor(&descriptor, &policy, &self.config.scale_guard());
            (enumeration.drafts, Some(enumeration.mode))
        } else {
            (Vec::new(), None)
        };

        let new = NewSubnet {
            name: request.name,
            description: request.description,
            descriptor,
            reserve_gateway: policy.reserve_gateway,
            gateway_name: request.gateway_name,
            vlan_id: request.vlan_id,
            location_id: request.location_id,
        };
        new.validate()?;

        let (subnet, created) = self
            .call("create_subnet", false, move |store| {
                store.create_subnet(new.clone(), &drafts)
            })
            .await?;
        log::info!(
            "created subnet #{} {} with {created} address record(s)",
            subnet.id,
            subnet
        );
        Ok(SubnetCreation {
            subnet,
            created,
            mode,
        })
    }

    /// Persist drafts for a subnet as one batch. Drafts already present are skipped.
    pub async fn materialize_addresses(
        &self,
        id: SubnetId,
        drafts: Vec<AddressDraft>,
    ) -> IpamResult<usize> {
        let total = drafts.len();
        let created = self
            .call("insert_addresses", true, move |store| {
                store.insert_addresses(id, &drafts)
            })
            .await?;
        log::info!("subnet #{id}: materialized {created} of {total} drafted address(es)");
        Ok(created)
    }

    /// Enumerate a registered subnet's range now and materialise what is missing.
    ///
    /// The gateway is reserved as recorded on the subnet unless
    /// `reserve_gateway` overrides it. Above the scale threshold only the
    /// special addresses are materialised.
    pub async fn generate_addresses_now(
        &self,
        id: SubnetId,
        reserve_gateway: Option<bool>,
    ) -> IpamResult<SubnetCreation> {
        let subnet = self.get_subnet(id).await?;
        let reserve_gateway = reserve_gateway.unwrap_or(subnet.gateway_address.is_some());
        let policy = self.policy_for(Some(reserve_gateway), subnet.gateway_name.clone());
        let enumeration =
            enumerate_descriptor(&subnet.descriptor(), &policy, &self.config.scale_guard());
        let created = self.materialize_addresses(id, enumeration.drafts).await?;
        Ok(SubnetCreation {
            subnet: self.get_subnet(id).await?,
            created,
            mode: Some(enumeration.mode),
        })
    }

    pub async fn get_subnet(&self, id: SubnetId) -> IpamResult<Subnet> {
        self.call("get_subnet", true, move |store| store.get_subnet(id))
            .await
    }

    pub async fn list_subnets(&self, family: Option<AddressFamily>) -> IpamResult<Vec<Subnet>> {
        self.call("list_subnets", true, move |store| store.list_subnets(family))
            .await
    }

    /// Change descriptive fields. The CIDR cannot be changed.
    pub async fn update_subnet(&self, id: SubnetId, update: SubnetUpdate) -> IpamResult<Subnet> {
        update.validate()?;
        self.call("update_subnet", true, move |store| {
            store.update_subnet(id, &update)
        })
        .await
    }

    /// Delete a subnet and its address records; returns the records removed.
    pub async fn delete_subnet(&self, id: SubnetId) -> IpamResult<usize> {
        let removed = self
            .call("delete_subnet", false, move |store| store.delete_subnet(id))
            .await?;
        log::info!("deleted subnet #{id} and {removed} address record(s)");
        Ok(removed)
    }

    pub async fn list_addresses(&self, id: SubnetId) -> IpamResult<Vec<IpAddressRecord>> {
        self.call("list_addresses", true, move |store| store.list_addresses(id))
            .await
    }

    pub async fn set_address_status(
        &self,
        id: SubnetId,
        address: IpAddr,
        change: StatusChange,
    ) -> IpamResult<IpAddressRecord> {
        self.call("set_address_status", false, move |store| {
            store.set_address_status(id, address, &change)
        })
        .await
    }

    pub async fn reserve_address(
        &self,
        id: SubnetId,
        address: IpAddr,
    ) -> IpamResult<IpAddressRecord> {
        self.set_address_status(id, address, StatusChange::reserve())
            .await
    }

    pub async fn assign_address(
        &self,
        id: SubnetId,
        address: IpAddr,
        equipment_id: Option<String>,
    ) -> IpamResult<IpAddressRecord> {
        self.set_address_status(id, address, StatusChange::assign(equipment_id))
            .await
    }

    pub async fn release_address(
        &self,
        id: SubnetId,
        address: IpAddr,
    ) -> IpamResult<IpAddressRecord> {
        self.set_address_status(id, address, StatusChange::release())
            .await
    }

    /// Release every address held by removed equipment. No record is deleted.
    pub async fn release_equipment(&self, equipment_id: &str) -> IpamResult<usize> {
        let equipment_id = equipment_id.to_string();
        let released = self
            .call("release_equipment", true, move |store| {
                store.release_equipment(&equipment_id)
            })
            .await?;
        log::info!("released {released} address(es)");
        Ok(released)
    }

    fn policy_for(
        &self,
        reserve_gateway: Option<bool>,
        gateway_name: Option<String>,
    ) -> ReservationPolicy {
        ReservationPolicy {
            reserve_gateway: reserve_gateway.unwrap_or(self.config.reserve_gateway),
            gateway_name,
        }
    }

    /// Run a store operation on the blocking pool with timeout and retries.
    ///
    /// `idempotent` marks operations that may be repeated after a timeout.
    async fn call<T, F>(&self, operation: &'static str, idempotent: bool, f: F) -> IpamResult<T>
    where
        T: Send + 'static,
        F: Fn(&S) -> IpamResult<T> + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let timeout = self.config.storage_timeout;
        let mut attempt: u32 = 0;
        loop {
            let store = Arc::clone(&self.store);
            let op = Arc::clone(&f);
            let task = tokio::task::spawn_blocking(move || (*op)(store.as_ref()));
            let result = match tokio::time::timeout(timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_error)) => Err(IpamError::Storage(format!(
                    "{operation} task failed: {join_error}"
                ))),
                Err(_) => Err(IpamError::Timeout { operation, timeout }),
            };

            match result {
                Err(e) if e.is_transient(idempotent) && attempt < self.config.storage_retries => {
                    let delay = self.config.backoff_for(attempt);
                    attempt += 1;
                    log::warn!(
                        "{operation} failed (attempt {attempt}): {e}; retrying in {delay:?}"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_transient(idempotent) {
                        log::error!("{operation} failed after {} attempt(s): {e}", attempt + 1);
                    }
                    return Err(e);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}
