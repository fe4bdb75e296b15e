//! Eligibility policy: decides whether a VM snapshot should be retired.
//!
//! Rules are evaluated in order and the first match wins:
//!
//! 1. powered off VMs are skipped;
//! 2. VMs without a boot time are skipped when `skip_no_boot_time` is set,
//!    otherwise retired because their age cannot be established;
//! 3. VMs reporting zero uptime are skipped when `skip_zero_uptime` is set,
//!    otherwise retired once the wall-clock age since boot exceeds
//!    `zero_uptime_cutoff`;
//! 4. everything else is retired once uptime exceeds `cutoff`.
//!
//! Zero uptime gets its own threshold because the platform reports zero
//! both right after boot and for VMs that never finish booting.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::JanitorConfig;
use crate::vm::VirtualMachine;

/// Why a VM was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not running.
    PoweredOff,
    /// No boot time and `skip_no_boot_time` is set.
    NoBootTime,
    /// Zero uptime and `skip_zero_uptime` is set.
    ZeroUptime,
    /// Zero uptime but booted within `zero_uptime_cutoff`.
    WithinZeroUptimeCutoff,
    /// Uptime within `cutoff`.
    WithinCutoff,
}

impl SkipReason {
    /// Convert reason to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PoweredOff => "powered_off",
            Self::NoBootTime => "no_boot_time",
            Self::ZeroUptime => "zero_uptime",
            Self::WithinZeroUptimeCutoff => "within_zero_uptime_cutoff",
            Self::WithinCutoff => "within_cutoff",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a VM was selected for retirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetireReason {
    /// No boot time and `skip_no_boot_time` is disabled.
    NoBootTime,
    /// Zero uptime and booted longer ago than `zero_uptime_cutoff`.
    ZeroUptimeExpired,
    /// Uptime exceeds `cutoff`.
    UptimeExpired,
}

impl RetireReason {
    /// Convert reason to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoBootTime => "no_boot_time",
            Self::ZeroUptimeExpired => "zero_uptime_expired",
            Self::UptimeExpired => "uptime_expired",
        }
    }
}

impl fmt::Display for RetireReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the eligibility check for one VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "decision", content = "reason")]
pub enum Decision {
    Skip(SkipReason),
    Retire(RetireReason),
}

impl Decision {
    pub fn is_retire(&self) -> bool {
        matches!(self, Decision::Retire(_))
    }
}

/// Decide whether `vm` should be retired at time `now`.
pub fn decide(vm: &dyn VirtualMachine, now: DateTime<Utc>, config: &JanitorConfig) -> Decision {
    decide_snapshot(vm.powered_on(), vm.boot_time(), vm.uptime(), now, config)
}

/// [`decide`] over raw snapshot fields.
pub fn decide_snapshot(
    powered_on: bool,
    boot_time: Option<DateTime<Utc>>,
    uptime: Duration,
    now: DateTime<Utc>,
    config: &JanitorConfig,
) -> Decision {
    if !powered_on {
        return Decision::Skip(SkipReason::PoweredOff);
    }

    let Some(boot_time) = boot_time else {
        return if config.skip_no_boot_time {
            Decision::Skip(SkipReason::NoBootTime)
        } else {
            Decision::Retire(RetireReason::NoBootTime)
        };
    };

    if uptime.is_zero() {
        if config.skip_zero_uptime {
            return Decision::Skip(SkipReason::ZeroUptime);
        }
        return if age_since(boot_time, now) > config.zero_uptime_cutoff {
            Decision::Retire(RetireReason::ZeroUptimeExpired)
        } else {
            Decision::Skip(SkipReason::WithinZeroUptimeCutoff)
        };
    }

    if uptime > config.cutoff {
        Decision::Retire(RetireReason::UptimeExpired)
    } else {
        Decision::Skip(SkipReason::WithinCutoff)
    }
}

/// Wall-clock time since `boot_time`; a boot time in the future counts as zero.
fn age_since(boot_time: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - boot_time).to_std().unwrap_or(Duration::ZERO)
}
