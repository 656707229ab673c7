//! Scale policy for address enumeration.

use serde::{Deserialize, Serialize};

/// Default number of addresses above which hosts are not enumerated automatically (a /20).
pub const DEFAULT_SCALE_THRESHOLD: u128 = 4096;

/// Gate that bounds the size of automatic address batches.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleGuard {
    pub threshold: u128,
}

impl ScaleGuard {
    pub fn new(threshold: u128) -> ScaleGuard {
        ScaleGuard { threshold }
    }

    /// Whether every address of a range this size may be enumerated.
    pub fn allow_auto_generate(&self, total_addresses: u128) -> bool {
        let allow = total_addresses <= self.threshold;
        if !allow {
            log::debug!(
                "scale guard: {total_addresses} addresses exceeds threshold {}",
                self.threshold
            );
        }
        allow
    }
}

impl Default for ScaleGuard {
    fn default() -> Self {
        ScaleGuard::new(DEFAULT_SCALE_THRESHOLD)
    }
}
