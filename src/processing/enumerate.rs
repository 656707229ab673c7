//! Address enumeration for a parsed CIDR range.
//!
//! [`AddressEnumerator`] walks `[network, network + total)` lazily and tags
//! each address with its role. [`generate_address_records`] wraps it with the
//! scale policy: above the threshold only the structural addresses are drafted.

use super::ScaleGuard;
use crate::error::IpamResult;
use crate::models::{
    addr_to_u128, u128_to_addr, AddressDraft, AddressFamily, AddressRole, AddressStatus,
    CidrDescriptor,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Which special addresses to reserve when drafting a subnet's address space.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ReservationPolicy {
    pub reserve_gateway: bool,
    pub gateway_name: Option<String>,
}

impl Default for ReservationPolicy {
    fn default() -> Self {
        ReservationPolicy {
            reserve_gateway: true,
            gateway_name: None,
        }
    }
}

/// Whether enumeration covered every address or only the special ones.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationMode {
    Full,
    /// Host enumeration was skipped because the range exceeds the scale threshold.
    SpecialOnly { total_addresses: u128, threshold: u128 },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Enumeration {
    pub drafts: Vec<AddressDraft>,
    pub mode: EnumerationMode,
}

impl Enumeration {
    pub fn hosts_skipped(&self) -> bool {
        matches!(self.mode, EnumerationMode::SpecialOnly { .. })
    }
}

/// Lazy, ordered, restartable sequence of drafts for every address in a range.
///
/// The cursor walks `[first, last]` inclusively, so the saturated `::/0` still
/// ends on its last address.
#[derive(Debug, Clone)]
pub struct AddressEnumerator {
    descriptor: CidrDescriptor,
    policy: ReservationPolicy,
    /// Integer value of the next address; `None` once `last` was emitted.
    cursor: Option<u128>,
}

impl AddressEnumerator {
    pub fn new(descriptor: CidrDescriptor, policy: ReservationPolicy) -> AddressEnumerator {
        let cursor = Some(descriptor.first_u128());
        AddressEnumerator {
            descriptor,
            policy,
            cursor,
        }
    }

    /// Rewind to the network address.
    pub fn restart(&mut self) {
        self.cursor = Some(self.descriptor.first_u128());
    }

    /// Addresses left to yield, saturating at `u128::MAX` for a fresh `::/0`.
    pub fn remaining(&self) -> u128 {
        match self.cursor {
            Some(value) => (self.descriptor.last_u128() - value).saturating_add(1),
            None => 0,
        }
    }
}

impl Iterator for AddressEnumerator {
    type Item = AddressDraft;

    fn next(&mut self) -> Option<AddressDraft> {
        let value = self.cursor?;
        self.cursor = if value == self.descriptor.last_u128() {
            None
        } else {
            Some(value + 1)
        };
        let address = u128_to_addr(value, self.descriptor.family);
        let role = role_for(&self.descriptor, &self.policy, address);
        let draft = make_draft(address, role, &self.policy);
        log::trace!("enumerated {} as {}", draft.address, draft.role);
        Some(draft)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match usize::try_from(self.remaining()) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Role of `address` inside the range under the given policy.
pub fn role_for(
    descriptor: &CidrDescriptor,
    policy: &ReservationPolicy,
    address: IpAddr,
) -> AddressRole {
    if descriptor.has_reserved_boundaries() {
        if address == descriptor.network_address {
            return AddressRole::Network;
        }
        if descriptor.family == AddressFamily::Ipv4 && address == descriptor.last_address {
            return AddressRole::Broadcast;
        }
    }
    if policy.reserve_gateway && descriptor.gateway_address == Some(address) {
        return AddressRole::Gateway;
    }
    AddressRole::Host
}

fn make_draft(address: IpAddr, role: AddressRole, policy: &ReservationPolicy) -> AddressDraft {
    let (status, name) = match role {
        AddressRole::Host => (AddressStatus::Available, None),
        AddressRole::Network => (AddressStatus::Reserved, Some("Network".to_string())),
        AddressRole::Broadcast => (AddressStatus::Reserved, Some("Broadcast".to_string())),
        AddressRole::Gateway => (
            AddressStatus::Reserved,
            Some(
                policy
                    .gateway_name
                    .clone()
                    .unwrap_or_else(|| "Gateway".to_string()),
            ),
        ),
    };
    AddressDraft {
        address,
        role,
        status,
        name,
    }
}

/// Drafts for the structural addresses only: network, gateway, broadcast, in address order.
pub fn special_addresses(
    descriptor: &CidrDescriptor,
    policy: &ReservationPolicy,
) -> Vec<AddressDraft> {
    let mut candidates = Vec::with_capacity(3);
    if descriptor.has_reserved_boundaries() {
        candidates.push(descriptor.network_address);
    }
    if let Some(gateway) = descriptor.gateway_address {
        candidates.push(gateway);
    }
    if descriptor.has_reserved_boundaries() && descriptor.family == AddressFamily::Ipv4 {
        candidates.push(descriptor.last_address);
    }
    candidates.sort_by_key(|a| addr_to_u128(*a));
    candidates.dedup();

    candidates
        .into_iter()
        .map(|address| (address, role_for(descriptor, policy, address)))
        .filter(|(_, role)| *role != AddressRole::Host)
        .map(|(address, role)| make_draft(address, role, policy))
        .collect()
}

/// Draft the address records for a descriptor, honouring the scale guard.
pub fn enumerate_descriptor(
    descriptor: &CidrDescriptor,
    policy: &ReservationPolicy,
    guard: &ScaleGuard,
) -> Enumeration {
    if guard.allow_auto_generate(descriptor.total_addresses) {
        let drafts: Vec<AddressDraft> =
            AddressEnumerator::new(descriptor.clone(), policy.clone()).collect();
        log::debug!("enumerated {} drafts for {}", drafts.len(), descriptor);
        Enumeration {
            drafts,
            mode: EnumerationMode::Full,
        }
    } else {
        let drafts = special_addresses(descriptor, policy);
        log::info!(
            "{} has {} addresses (threshold {}), drafting {} special addresses only",
            descriptor,
            descriptor.total_addresses,
            guard.threshold,
            drafts.len()
        );
        Enumeration {
            drafts,
            mode: EnumerationMode::SpecialOnly {
                total_addresses: descriptor.total_addresses,
                threshold: guard.threshold,
            },
        }
    }
}

/// Parse `cidr` and draft its address records.
pub fn generate_address_records(
    cidr: &str,
    policy: &ReservationPolicy,
    guard: &ScaleGuard,
) -> IpamResult<Enumeration> {
    let descriptor = CidrDescriptor::parse(cidr)?;
    Ok(enumerate_descriptor(&descriptor, policy, guard))
}

#[cfg(test)]
mod tests {
    use super::*;
    use itertools::Itertools;

    fn roles(drafts: &[AddressDraft]) -> Vec<AddressRole> {
        drafts.iter().map(|d| d.role).collect()
    }

    #[test]
    fn test_slash_30_with_gateway() {
        let e = generate_address_records(
            "192.168.10.0/30",
            &ReservationPolicy::default(),
            &ScaleGuard::default(),
        )
        .unwrap();
        assert_eq!(e.mode, EnumerationMode::Full);
        assert_eq!(
            roles(&e.drafts),
            vec![
                AddressRole::Network,
                AddressRole::Gateway,
                AddressRole::Host,
                AddressRole::Broadcast
            ]
        );
        assert_eq!(e.drafts[1].address.to_string(), "192.168.10.1");
        assert_eq!(e.drafts[1].name.as_deref(), Some("Gateway"));
        assert_eq!(e.drafts[2].status, AddressStatus::Available);
        assert_eq!(e.drafts[3].status, AddressStatus::Reserved);
    }

    #[test]
    fn test_without_gateway_reservation() {
        let policy = ReservationPolicy {
            reserve_gateway: false,
            gateway_name: None,
        };
        let e = generate_address_records("10.0.0.0/29", &policy, &ScaleGuard::default()).unwrap();
        assert_eq!(e.drafts.len(), 8);
        assert_eq!(e.drafts[1].role, AddressRole::Host);
        assert_eq!(
            e.drafts.iter().filter(|d| d.role == AddressRole::Host).count(),
            6
        );
    }

    #[test]
    fn test_point_to_point_has_no_reservations() {
        let e = generate_address_records(
            "10.0.0.0/31",
            &ReservationPolicy::default(),
            &ScaleGuard::default(),
        )
        .unwrap();
        assert_eq!(roles(&e.drafts), vec![AddressRole::Host, AddressRole::Host]);

        let e = generate_address_records(
            "10.0.0.9/32",
            &ReservationPolicy::default(),
            &ScaleGuard::default(),
        )
        .unwrap();
        assert_eq!(e.drafts.len(), 1);
        assert_eq!(e.drafts[0].role, AddressRole::Host);
    }

    #[test]
    fn test_ipv6_reduced_reservation() {
        let policy = ReservationPolicy {
            reserve_gateway: true,
            gateway_name: Some("core-rtr".to_string()),
        };
        let e = generate_address_records("fd00:1::/120", &policy, &ScaleGuard::default()).unwrap();
        assert_eq!(e.drafts.len(), 256);
        assert_eq!(e.drafts[0].role, AddressRole::Network);
        assert_eq!(e.drafts[1].role, AddressRole::Gateway);
        assert_eq!(e.drafts[1].name.as_deref(), Some("core-rtr"));
        assert_eq!(e.drafts[255].role, AddressRole::Host);
        assert!(!e.drafts.iter().any(|d| d.role == AddressRole::Broadcast));
    }

    #[test]
    fn test_completeness_and_uniqueness() {
        for cidr in ["172.16.4.0/22", "10.9.8.0/24", "192.168.0.0/28", "fd00::/116"] {
            let d = CidrDescriptor::parse(cidr).unwrap();
            let e = enumerate_descriptor(&d, &ReservationPolicy::default(), &ScaleGuard::default());
            assert_eq!(e.drafts.len() as u128, d.total_addresses, "{cidr}");
            assert!(e.drafts.iter().map(|x| x.address).all_unique(), "{cidr}");
            let count = |role| e.drafts.iter().filter(|x| x.role == role).count();
            assert_eq!(count(AddressRole::Network), 1, "{cidr}");
            assert_eq!(count(AddressRole::Gateway), 1, "{cidr}");
            let broadcasts = if d.family == AddressFamily::Ipv4 { 1 } else { 0 };
            assert_eq!(count(AddressRole::Broadcast), broadcasts, "{cidr}");
            assert!(e
                .drafts
                .iter()
                .tuple_windows()
                .all(|(a, b)| addr_to_u128(a.address) < addr_to_u128(b.address)));
        }
    }

    #[test]
    fn test_scale_guard_yields_special_only() {
        let e = generate_address_records(
            "10.20.0.0/16",
            &ReservationPolicy::default(),
            &ScaleGuard::default(),
        )
        .unwrap();
        assert!(e.hosts_skipped());
        assert_eq!(
            e.mode,
            EnumerationMode::SpecialOnly {
                total_addresses: 65536,
                threshold: 4096
            }
        );
        assert_eq!(
            roles(&e.drafts),
            vec![
                AddressRole::Network,
                AddressRole::Gateway,
                AddressRole::Broadcast
            ]
        );
        assert_eq!(e.drafts[2].address.to_string(), "10.20.255.255");
    }

    #[test]
    fn test_special_only_without_gateway() {
        let d = CidrDescriptor::parse("2001:db8::/64").unwrap();
        let policy = ReservationPolicy {
            reserve_gateway: false,
            gateway_name: None,
        };
        let drafts = special_addresses(&d, &policy);
        assert_eq!(roles(&drafts), vec![AddressRole::Network]);
    }

    #[test]
    fn test_enumerator_is_restartable() {
        let d = CidrDescriptor::parse("10.0.0.0/29").unwrap();
        let mut it = AddressEnumerator::new(d, ReservationPolicy::default());
        assert_eq!(it.size_hint(), (8, Some(8)));
        let first: Vec<_> = it.by_ref().take(3).collect();
        assert_eq!(it.remaining(), 5);
        it.restart();
        let again: Vec<_> = it.by_ref().take(3).collect();
        assert_eq!(first, again);
        assert_eq!(it.count(), 5);
    }

    #[test]
    fn test_whole_ipv6_space_ends_on_last_address() {
        let d = CidrDescriptor::parse("::/0").unwrap();
        let mut it = AddressEnumerator::new(d, ReservationPolicy::default());
        assert_eq!(it.remaining(), u128::MAX);
        assert_eq!(it.size_hint(), (usize::MAX, None));

        it.cursor = Some(u128::MAX - 1);
        assert_eq!(it.remaining(), 2);
        let tail: Vec<String> = it.by_ref().map(|x| x.address.to_string()).collect();
        assert_eq!(
            tail,
            vec![
                "ffff:ffff:ffff:ffff:ffff:ffff:ffff:fffe",
                "ffff:ffff:ffff:ffff:ffff:ffff:ffff:ffff"
            ]
        );
        assert_eq!(it.remaining(), 0);
        assert!(it.next().is_none());

        it.restart();
        let first = it.next().unwrap();
        assert_eq!(first.address.to_string(), "::");
        assert_eq!(first.role, AddressRole::Network);
    }

    #[test]
    fn test_malformed_input_propagates() {
        assert!(generate_address_records(
            "10.0.0/24",
            &ReservationPolicy::default(),
            &ScaleGuard::default()
        )
        .is_err());
    }
}
