//! Live validation of candidate CIDR strings.
//!
//! [`validate_cidr`] never fails: it always returns a [`ValidationReport`]
//! with ordered errors and warnings, so it can run on every keystroke. It
//! holds no state between calls; debouncing belongs to the caller.

use crate::error::IpamError;
use crate::models::{addr_to_u128, split_cidr, AddressFamily, CidrDescriptor};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::sync::OnceLock;

/// Dotted quad shape, used to explain why an IPv4-looking token failed to parse.
static DOTTED_QUAD_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_dotted_quad_regex() -> &'static Regex {
    DOTTED_QUAD_REGEX.get_or_init(|| {
        Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").expect("Invalid Regex")
    })
}

/// RFC 1918 private IPv4 blocks.
const PRIVATE_IPV4_RANGES: [&str; 3] = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

/// Special-purpose ranges that are rarely meant as a regular subnet.
const SPECIAL_RANGES: [(&str, &str); 13] = [
    ("0.0.0.0/8", "the unspecified/\"this network\" range"),
    ("127.0.0.0/8", "the loopback range"),
    ("169.254.0.0/16", "the link-local range"),
    ("224.0.0.0/4", "the multicast range"),
    ("192.0.2.0/24", "a documentation range (TEST-NET-1)"),
    ("198.51.100.0/24", "a documentation range (TEST-NET-2)"),
    ("203.0.113.0/24", "a documentation range (TEST-NET-3)"),
    ("255.255.255.255/32", "the limited broadcast address"),
    ("::/128", "the unspecified address"),
    ("::1/128", "the loopback address"),
    ("fe80::/10", "the link-local range"),
    ("ff00::/8", "the multicast range"),
    ("2001:db8::/32", "the documentation range"),
];

/// Organisational checks that only produce warnings.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub warn_non_private_ipv4: bool,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            warn_non_private_ipv4: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// The parsed range, when the input is valid.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<CidrDescriptor>,
}

impl ValidationReport {
    fn invalid(error: String) -> ValidationReport {
        ValidationReport {
            valid: false,
            errors: vec![error],
            warnings: vec![],
            descriptor: None,
        }
    }
}

/// Validate a candidate CIDR string.
pub fn validate_cidr(cidr: &str, policy: &ValidationPolicy) -> ValidationReport {
    let cidr = cidr.trim();
    if cidr.is_empty() {
        return ValidationReport::invalid("CIDR is empty".to_string());
    }

    let (addr, len) = match split_cidr(cidr) {
        Ok(parts) => parts,
        Err(e) => return ValidationReport::invalid(describe_error(cidr, e)),
    };
    let descriptor = CidrDescriptor::from_parts(addr, len);
    let warnings = collect_warnings(addr, &descriptor, policy);

    log::trace!("validated {cidr}: {} warning(s)", warnings.len());
    ValidationReport {
        valid: true,
        errors: vec![],
        warnings,
        descriptor: Some(descriptor),
    }
}

fn describe_error(cidr: &str, error: IpamError) -> String {
    match error {
        IpamError::MalformedInput(msg) if msg.starts_with("malformed address") => {
            let token = cidr.split('/').next().unwrap_or_default().trim();
            match explain_dotted_quad(token) {
                Some(detail) => format!("Malformed IPv4 address '{token}': {detail}"),
                None => format!("Malformed address '{token}'"),
            }
        }
        IpamError::MalformedInput(msg) => format!("Malformed CIDR '{cidr}': {msg}"),
        IpamError::OutOfRangePrefix {
            family,
            prefix_len,
            max,
        } => {
            if prefix_len == u8::MAX {
                format!("Prefix length is out of range for {family} (0-{max})")
            } else {
                format!("Prefix length /{prefix_len} is out of range for {family} (0-{max})")
            }
        }
        other => other.to_string(),
    }
}

fn explain_dotted_quad(token: &str) -> Option<String> {
    let caps = get_dotted_quad_regex().captures(token)?;
    caps.iter()
        .skip(1)
        .flatten()
        .map(|m| m.as_str())
        .find(|octet| octet.parse::<u16>().map(|v| v > 255).unwrap_or(true))
        .map(|octet| format!("octet {octet} exceeds 255"))
}

fn collect_warnings(
    addr: IpAddr,
    descriptor: &CidrDescriptor,
    policy: &ValidationPolicy,
) -> Vec<String> {
    let mut warnings = Vec::new();

    if addr != descriptor.network_address {
        warnings.push(format!(
            "Address {addr} has host bits set; it will be normalized to {descriptor}"
        ));
    }

    // Reserved boundaries never leave a range without usable addresses, so the
    // prefixes worth flagging are the ones that reserve nothing at all.
    if !descriptor.has_reserved_boundaries() {
        let kind = if descriptor.total_addresses == 1 {
            "a single-host route"
        } else {
            "a point-to-point range"
        };
        warnings.push(format!(
            "{descriptor} is {kind}: no network, broadcast or gateway address is reserved"
        ));
    }

    let special: Vec<(CidrDescriptor, &str)> = SPECIAL_RANGES
        .iter()
        .filter_map(|(cidr, label)| CidrDescriptor::parse(cidr).ok().map(|d| (d, *label)))
        .filter(|(d, _)| d.family == descriptor.family)
        .collect();
    let mut is_special = false;
    for (range, label) in &special {
        if range.contains(descriptor.network_address) {
            warnings.push(format!("{descriptor} lies in {label} ({range})"));
            is_special = true;
        }
    }

    if policy.warn_non_private_ipv4
        && descriptor.family == AddressFamily::Ipv4
        && !is_special
        && !is_private_ipv4(descriptor)
    {
        warnings.push(format!("{descriptor} is not inside an RFC 1918 private range"));
    }

    warnings
}

/// Whether the whole range lies inside one RFC 1918 block.
pub fn is_private_ipv4(descriptor: &CidrDescriptor) -> bool {
    PRIVATE_IPV4_RANGES
        .iter()
        .filter_map(|cidr| CidrDescriptor::parse(cidr).ok())
        .any(|block| {
            block.first_u128() <= addr_to_u128(descriptor.network_address)
                && addr_to_u128(descriptor.last_address) <= block.last_u128()
                && block.family == descriptor.family
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validate(cidr: &str) -> ValidationReport {
        validate_cidr(cidr, &ValidationPolicy::default())
    }

    #[test]
    fn test_valid_private() {
        let r = validate("192.168.10.0/24");
        assert!(r.valid);
        assert!(r.errors.is_empty());
        assert!(r.warnings.is_empty(), "{:?}", r.warnings);
        assert_eq!(r.descriptor.unwrap().cidr(), "192.168.10.0/24");
    }

    #[test]
    fn test_malformed_octet() {
        let r = validate("300.1.1.0/24");
        assert!(!r.valid);
        assert_eq!(r.errors.len(), 1);
        assert!(r.errors[0].contains("Malformed"), "{}", r.errors[0]);
        assert!(r.errors[0].contains("address"), "{}", r.errors[0]);
        assert!(r.errors[0].contains("octet 300 exceeds 255"));
        assert!(r.descriptor.is_none());
    }

    #[test]
    fn test_structural_errors() {
        for input in ["", "   ", "10.0.0.0", "10.0.0.0/", "/24", "10.0.0.0/24/1", "zz::/64"] {
            let r = validate(input);
            assert!(!r.valid, "{input:?} should be invalid");
            assert_eq!(r.errors.len(), 1, "{input:?}");
        }
        assert!(validate("10.0.0.0/").errors[0].contains("missing prefix length"));
        assert!(validate("/24").errors[0].contains("missing address"));
        assert!(validate("zz::/64").errors[0].starts_with("Malformed address"));
    }

    #[test]
    fn test_prefix_out_of_range() {
        let r = validate("10.0.0.0/33");
        assert!(!r.valid);
        assert_eq!(
            r.errors,
            vec!["Prefix length /33 is out of range for ipv4 (0-32)".to_string()]
        );
        let r = validate("fd00::/129");
        assert!(r.errors[0].contains("ipv6 (0-128)"));
        assert!(validate("fd00::/64").valid);
    }

    #[test]
    fn test_host_bits_warning() {
        let r = validate("10.1.2.3/16");
        assert!(r.valid);
        assert_eq!(
            r.warnings,
            vec!["Address 10.1.2.3 has host bits set; it will be normalized to 10.1.0.0/16"
                .to_string()]
        );
    }

    #[test]
    fn test_point_to_point_warning() {
        let r = validate("10.0.0.0/31");
        assert!(r.valid);
        assert!(r.warnings[0].contains("point-to-point"));
        let r = validate("10.0.0.1/32");
        assert!(r.warnings[0].contains("single-host"));

        let r = validate("fd00::/127");
        assert_eq!(
            r.warnings,
            vec!["fd00::/127 is a point-to-point range: no network, broadcast or gateway \
                  address is reserved"
                .to_string()]
        );
        assert!(validate("fd00::1/128").warnings[0].contains("single-host"));
        assert!(validate("fd00::/126").warnings.is_empty());
    }

    #[test]
    fn test_every_prefix_keeps_usable_addresses() {
        for len in 0..=32 {
            let cidr = format!("10.0.0.0/{len}");
            let d = validate(&cidr).descriptor.unwrap();
            assert!(d.usable_addresses > 0, "{cidr}");
        }
        for len in 0..=128 {
            let cidr = format!("fd00::/{len}");
            let d = validate(&cidr).descriptor.unwrap();
            assert!(d.usable_addresses > 0, "{cidr}");
        }
    }

    #[test]
    fn test_non_private_warning_is_configurable() {
        let r = validate("8.8.8.0/24");
        assert!(r.valid);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("RFC 1918"));

        let lenient = ValidationPolicy {
            warn_non_private_ipv4: false,
        };
        assert!(validate_cidr("8.8.8.0/24", &lenient).warnings.is_empty());
        // Straddles 172.16.0.0/12
        assert!(!is_private_ipv4(&CidrDescriptor::parse("172.0.0.0/8").unwrap()));
        assert!(is_private_ipv4(&CidrDescriptor::parse("172.20.0.0/16").unwrap()));
    }

    #[test]
    fn test_special_range_warnings() {
        let r = validate("127.0.0.0/8");
        assert!(r.valid);
        assert_eq!(r.warnings.len(), 1);
        assert!(r.warnings[0].contains("loopback"));

        let r = validate("2001:db8:1::/48");
        assert!(r.warnings.iter().any(|w| w.contains("documentation")));

        let r = validate("fe80::/64");
        assert!(r.warnings.iter().any(|w| w.contains("link-local")));

        assert!(validate("fd00:10::/64").warnings.is_empty());
    }
}
