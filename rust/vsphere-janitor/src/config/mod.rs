//! Cleanup configuration and startup validation.
//!
//! [`JanitorConfig`] is built once at startup (from CLI flags and environment
//! variables in the binary) and is immutable for every pass afterwards.
//!
//! ```rust,ignore
//! use vsphere_janitor::config::{validate_vm_paths, JanitorConfig};
//!
//! let config = JanitorConfig::default().with_skip_destroy(true);
//! validate_vm_paths(&["/dc1/vm/ci".to_string()])?;
//! ```

pub mod duration;
pub mod error;

pub use duration::{format_duration, parse_duration};
pub use error::{ConfigResult, ConfigurationError};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Policy cutoffs and executor limits for cleanup passes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JanitorConfig {
    /// Maximum uptime before a VM with a known boot time is retired.
    #[serde(default = "default_cutoff")]
    pub cutoff: Duration,

    /// Maximum wall-clock age since boot for a VM stuck at zero uptime.
    #[serde(default = "default_zero_uptime_cutoff")]
    pub zero_uptime_cutoff: Duration,

    /// Never touch VMs reporting zero uptime.
    #[serde(default = "default_true")]
    pub skip_zero_uptime: bool,

    /// Never touch VMs without a recorded boot time.
    #[serde(default = "default_true")]
    pub skip_no_boot_time: bool,

    /// Only power VMs off, never destroy them.
    #[serde(default)]
    pub skip_destroy: bool,

    /// Maximum retirements in flight; 0 means one worker per candidate.
    #[serde(default)]
    pub concurrency: usize,

    /// Maximum retirements started per second; 0 means unlimited.
    #[serde(default = "default_rate_per_second")]
    pub rate_per_second: u32,
}

fn default_cutoff() -> Duration {
    Duration::from_secs(2 * 60 * 60)
}
fn default_zero_uptime_cutoff() -> Duration {
    Duration::from_secs(5 * 60)
}
fn default_true() -> bool {
    true
}
fn default_rate_per_second() -> u32 {
    5
}

impl Default for JanitorConfig {
    fn default() -> Self {
        Self {
            cutoff: default_cutoff(),
            zero_uptime_cutoff: default_zero_uptime_cutoff(),
            skip_zero_uptime: true,
            skip_no_boot_time: true,
            skip_destroy: false,
            concurrency: 0,
            rate_per_second: default_rate_per_second(),
        }
    }
}

impl JanitorConfig {
    /// Set the uptime cutoff.
    #[must_use]
    pub fn with_cutoff(mut self, cutoff: Duration) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Set the zero-uptime cutoff.
    #[must_use]
    pub fn with_zero_uptime_cutoff(mut self, cutoff: Duration) -> Self {
        self.zero_uptime_cutoff = cutoff;
        self
    }

    /// Set whether zero-uptime VMs are always skipped.
    #[must_use]
    pub fn with_skip_zero_uptime(mut self, skip: bool) -> Self {
        self.skip_zero_uptime = skip;
        self
    }

    /// Set whether VMs without a boot time are always skipped.
    #[must_use]
    pub fn with_skip_no_boot_time(mut self, skip: bool) -> Self {
        self.skip_no_boot_time = skip;
        self
    }

    /// Set whether destroy is skipped after power-off.
    #[must_use]
    pub fn with_skip_destroy(mut self, skip: bool) -> Self {
        self.skip_destroy = skip;
        self
    }

    /// Set the worker concurrency.
    #[must_use]
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Set the admission rate.
    #[must_use]
    pub fn with_rate_per_second(mut self, rate: u32) -> Self {
        self.rate_per_second = rate;
        self
    }
}

/// Validate the inventory paths the janitor will sweep.
///
/// Paths are vSphere inventory paths such as `/dc1/vm/ci`.
pub fn validate_vm_paths(paths: &[String]) -> ConfigResult<()> {
    if paths.is_empty() {
        return Err(ConfigurationError::missing_required(
            "vSphere VM paths",
            "--vsphere-vm-paths or VSPHERE_JANITOR_VSPHERE_VM_PATHS",
        ));
    }

    let errors = paths
        .iter()
        .filter_map(|path| {
            if path.trim().is_empty() {
                Some(ConfigurationError::invalid(
                    "a VM path is blank",
                    "Remove empty entries from --vsphere-vm-paths",
                ))
            } else if !path.starts_with('/') {
                Some(ConfigurationError::invalid(
                    format!("VM path '{path}' is not an absolute inventory path"),
                    "Use the full inventory path, e.g. /datacenter/vm/folder",
                ))
            } else {
                None
            }
        })
        .collect();

    ConfigurationError::from_list(errors)
}
