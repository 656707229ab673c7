//! Engine configuration.
//!
//! Defaults can be overridden with `IPAM_*` environment variables; the binary
//! loads a `.env` file before reading them.

use crate::error::{IpamError, IpamResult};
use crate::processing::{ReservationPolicy, ScaleGuard, ValidationPolicy, DEFAULT_SCALE_THRESHOLD};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const ENV_SCALE_THRESHOLD: &str = "IPAM_SCALE_THRESHOLD";
pub const ENV_WARN_NON_PRIVATE_IPV4: &str = "IPAM_WARN_NON_PRIVATE_IPV4";
pub const ENV_RESERVE_GATEWAY: &str = "IPAM_RESERVE_GATEWAY";
pub const ENV_STORAGE_TIMEOUT_MS: &str = "IPAM_STORAGE_TIMEOUT_MS";
pub const ENV_STORAGE_RETRIES: &str = "IPAM_STORAGE_RETRIES";
pub const ENV_RETRY_BACKOFF_MS: &str = "IPAM_RETRY_BACKOFF_MS";
pub const ENV_RETRY_BACKOFF_MAX_MS: &str = "IPAM_RETRY_BACKOFF_MAX_MS";
pub const ENV_STORE_PATH: &str = "IPAM_STORE_PATH";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpamConfig {
    pub scale_threshold: u128,
    pub warn_non_private_ipv4: bool,
    pub reserve_gateway: bool,
    /// Per attempt.
    pub storage_timeout: Duration,
    /// Attempts after the first one.
    pub storage_retries: u32,
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    pub store_path: Option<PathBuf>,
}

impl Default for IpamConfig {
    fn default() -> Self {
        IpamConfig {
            scale_threshold: DEFAULT_SCALE_THRESHOLD,
            warn_non_private_ipv4: true,
            reserve_gateway: true,
            storage_timeout: Duration::from_millis(2000),
            storage_retries: 3,
            retry_backoff: Duration::from_millis(50),
            retry_backoff_max: Duration::from_millis(2000),
            store_path: None,
        }
    }
}

impl IpamConfig {
    /// Read overrides from the process environment.
    pub fn from_env() -> IpamResult<IpamConfig> {
        IpamConfig::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through `lookup`; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> IpamResult<IpamConfig> {
        let mut config = IpamConfig::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get(ENV_SCALE_THRESHOLD) {
            config.scale_threshold = parse_value(ENV_SCALE_THRESHOLD, &v)?;
        }
        if let Some(v) = get(ENV_WARN_NON_PRIVATE_IPV4) {
            config.warn_non_private_ipv4 = parse_bool(ENV_WARN_NON_PRIVATE_IPV4, &v)?;
        }
        if let Some(v) = get(ENV_RESERVE_GATEWAY) {
            config.reserve_gateway = parse_bool(ENV_RESERVE_GATEWAY, &v)?;
        }
        if let Some(v) = get(ENV_STORAGE_TIMEOUT_MS) {
            config.storage_timeout =
                Duration::from_millis(parse_value(ENV_STORAGE_TIMEOUT_MS, &v)?);
        }
        if let Some(v) = get(ENV_STORAGE_RETRIES) {
            config.storage_retries = parse_value(ENV_STORAGE_RETRIES, &v)?;
        }
        if let Some(v) = get(ENV_RETRY_BACKOFF_MS) {
            config.retry_backoff = Duration::from_millis(parse_value(ENV_RETRY_BACKOFF_MS, &v)?);
        }
        if let Some(v) = get(ENV_RETRY_BACKOFF_MAX_MS) {
            config.retry_backoff_max =
                Duration::from_millis(parse_value(ENV_RETRY_BACKOFF_MAX_MS, &v)?);
        }
        if let Some(v) = get(ENV_STORE_PATH) {
            config.store_path = Some(PathBuf::from(v));
        }

        if config.storage_timeout.is_zero() {
            let msg = format!("{ENV_STORAGE_TIMEOUT_MS} must be greater than 0");
            return Err(IpamError::Config(msg));
        }
        log::debug!("config: {config:?}");
        Ok(config)
    }

    pub fn scale_guard(&self) -> ScaleGuard {
        ScaleGuard::new(self.scale_threshold)
    }

    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            warn_non_private_ipv4: self.warn_non_private_ipv4,
        }
    }

    pub fn reservation_policy(&self) -> ReservationPolicy {
        ReservationPolicy {
            reserve_gateway: self.reserve_gateway,
            gateway_name: None,
        }
    }

    /// Delay before retry number `attempt` (starting at 0), doubling up to the cap.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.retry_backoff
            .saturating_mul(factor)
            .min(self.retry_backoff_max)
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> IpamResult<T> {
    value
        .parse()
        .map_err(|_| IpamError::Config(format!("{key}: invalid value '{value}'")))
}

fn parse_bool(key: &str, value: &str) -> IpamResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(IpamError::Config(format!("{key}: expected a boolean, got '{value}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = IpamConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, IpamConfig::default());
        assert_eq!(config.scale_guard().threshold, 4096);
        assert!(config.validation_policy().warn_non_private_ipv4);
        assert!(config.reservation_policy().reserve_gateway);
    }

    #[test]
    fn test_overrides() {
        let config = IpamConfig::from_lookup(lookup(&[
            (ENV_SCALE_THRESHOLD, "65536"),
            (ENV_WARN_NON_PRIVATE_IPV4, "off"),
            (ENV_RESERVE_GATEWAY, "false"),
            (ENV_STORAGE_TIMEOUT_MS, "500"),
            (ENV_STORAGE_RETRIES, "0"),
            (ENV_STORE_PATH, "/var/lib/ipam/store.json"),
        ]))
        .unwrap();
        assert_eq!(config.scale_threshold, 65536);
        assert!(!config.warn_non_private_ipv4);
        assert!(!config.reserve_gateway);
        assert_eq!(config.storage_timeout, Duration::from_millis(500));
        assert_eq!(config.storage_retries, 0);
        assert_eq!(
            config.store_path,
            Some(PathBuf::from("/var/lib/ipam/store.json"))
        );
    }

    #[test]
    fn test_invalid_values() {
        let err = IpamConfig::from_lookup(lookup(&[(ENV_SCALE_THRESHOLD, "lots")])).unwrap_err();
        assert_eq!(
            err,
            IpamError::Config("IPAM_SCALE_THRESHOLD: invalid value 'lots'".to_string())
        );
        assert!(IpamConfig::from_lookup(lookup(&[(ENV_RESERVE_GATEWAY, "maybe")])).is_err());
        assert!(IpamConfig::from_lookup(lookup(&[(ENV_STORAGE_TIMEOUT_MS, "0")])).is_err());
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = IpamConfig::default();
        assert_eq!(config.backoff_for(0), Duration::from_millis(50));
        assert_eq!(config.backoff_for(1), Duration::from_millis(100));
        assert_eq!(config.backoff_for(3), Duration::from_millis(400));
        assert_eq!(config.backoff_for(10), Duration::from_millis(2000));
        assert_eq!(config.backoff_for(40), Duration::from_millis(2000));
    }
}
