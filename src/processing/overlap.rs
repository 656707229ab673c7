//! Overlapping subnet range detection.
//!
//! Detects whether a candidate range intersects subnets that are already
//! registered. Only ranges of the same address family can overlap.

use crate::models::{CidrDescriptor, Subnet};

/// An existing subnet that intersects a candidate range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapConflict {
    pub candidate: String,
    pub existing: Subnet,
}

impl OverlapConflict {
    /// Human readable description naming the conflicting subnet.
    pub fn describe(&self) -> String {
        format!(
            "{} overlaps existing subnet '{}' ({})",
            self.candidate, self.existing.name, self.existing.cidr
        )
    }
}

/// Whether two ranges share at least one address.
///
/// Closed intervals `[first, last]` are compared so that the full IPv6 space
/// never needs a range size of 2^128.
pub fn ranges_overlap(a: &CidrDescriptor, b: &CidrDescriptor) -> bool {
    a.family == b.family && a.first_u128() <= b.last_u128() && b.first_u128() <= a.last_u128()
}

/// Find every registered subnet that overlaps `candidate`, in input order.
pub fn find_overlaps<'a, I>(candidate: &CidrDescriptor, existing: I) -> Vec<OverlapConflict>
where
    I: IntoIterator<Item = &'a Subnet>,
{
    existing
        .into_iter()
        .filter(|subnet| subnet.family == candidate.family)
        .filter(|subnet| ranges_overlap(candidate, &subnet.descriptor()))
        .map(|subnet| OverlapConflict {
            candidate: candidate.cidr(),
            existing: subnet.clone(),
        })
        .collect()
}

/// Check a candidate against registered subnets.
///
/// # Returns
/// * `None` - no overlap
/// * `Some(description)` - naming the first conflicting subnet
pub fn check_overlap<'a, I>(candidate: &CidrDescriptor, existing: I) -> Option<String>
where
    I: IntoIterator<Item = &'a Subnet>,
{
    let conflicts = find_overlaps(candidate, existing);
    log_overlaps(&conflicts);
    conflicts.first().map(OverlapConflict::describe)
}

/// Log overlap conflicts as warnings.
pub fn log_overlaps(conflicts: &[OverlapConflict]) {
    if conflicts.is_empty() {
        log::debug!("No overlapping subnets found.");
        return;
    }
    log::warn!(
        "Found {} overlapping subnet(s) for {}:",
        conflicts.len(),
        conflicts[0].candidate
    );
    for conflict in conflicts {
        log::warn!(
            "  - Subnet #{} '{}' {}",
            conflict.existing.id,
            conflict.existing.name,
            conflict.existing.cidr
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SubnetId;
    use chrono::Utc;

    fn subnet(id: u64, name: &str, cidr: &str) -> Subnet {
        let d = CidrDescriptor::parse(cidr).unwrap();
        let now = Utc::now();
        Subnet {
            id: SubnetId(id),
            name: name.to_string(),
            description: None,
            family: d.family,
            cidr: d.cidr(),
            network_address: d.network_address,
            prefix_len: d.prefix_len,
            gateway_address: d.gateway_address,
            gateway_name: None,
            broadcast_address: d.broadcast_address,
            total_addresses: d.total_addresses,
            usable_addresses: d.usable_addresses,
            vlan_id: None,
            location_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn parse(cidr: &str) -> CidrDescriptor {
        CidrDescriptor::parse(cidr).unwrap()
    }

    #[test]
    fn test_ranges_overlap_symmetry() {
        let pairs = [
            ("10.0.0.0/8", "10.20.0.0/16", true),
            ("192.168.10.0/24", "192.168.10.128/25", true),
            ("192.168.10.0/25", "192.168.10.128/25", false),
            ("192.168.10.0/24", "192.168.11.0/24", false),
            ("0.0.0.0/0", "203.0.113.7/32", true),
            ("::/0", "2001:db8::/32", true),
            ("2001:db8::/33", "2001:db8:8000::/33", false),
            ("10.0.0.0/8", "::a00:0/104", false),
        ];
        for (a, b, expected) in pairs {
            let (a, b) = (parse(a), parse(b));
            assert_eq!(ranges_overlap(&a, &b), expected, "{a} vs {b}");
            assert_eq!(ranges_overlap(&b, &a), expected, "{b} vs {a}");
            assert!(ranges_overlap(&a, &a));
        }
    }

    #[test]
    fn test_check_overlap_names_conflict() {
        let existing = vec![
            subnet(1, "office-lan", "192.168.10.0/24"),
            subnet(2, "dmz", "192.168.20.0/24"),
        ];
        let msg = check_overlap(&parse("192.168.10.128/25"), &existing).unwrap();
        assert_eq!(
            msg,
            "192.168.10.128/25 overlaps existing subnet 'office-lan' (192.168.10.0/24)"
        );
        assert_eq!(check_overlap(&parse("192.168.30.0/24"), &existing), None);
    }

    #[test]
    fn test_find_overlaps_all_conflicts() {
        let existing = vec![
            subnet(1, "a", "10.0.0.0/24"),
            subnet(2, "b", "10.0.1.0/24"),
            subnet(3, "c", "fd00::/64"),
            subnet(4, "d", "10.0.2.0/24"),
        ];
        let conflicts = find_overlaps(&parse("10.0.0.0/23"), &existing);
        let ids: Vec<_> = conflicts.iter().map(|c| c.existing.id.0).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_cross_family_never_overlaps() {
        let existing = vec![subnet(1, "v6-all", "::/0")];
        assert_eq!(check_overlap(&parse("10.0.0.0/8"), &existing), None);
    }
}
