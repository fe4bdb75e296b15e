//! Per-VM outcomes and pass-level results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::policy::SkipReason;
use crate::vm::VirtualMachine;

/// What was actually done to a VM during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VmAction {
    /// Nothing was changed on the platform.
    Skipped,
    /// Powered off, not destroyed.
    PoweredOff,
    /// Powered off and destroyed.
    Destroyed,
}

impl VmAction {
    /// Convert action to string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::PoweredOff => "powered_off",
            Self::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for VmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure recorded against a single VM. Never aborts the pass.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "message")]
pub enum VmActionError {
    #[error("couldn't power off VM: {0}")]
    PowerOff(String),

    #[error("couldn't destroy VM: {0}")]
    Destroy(String),

    #[error("cancelled before the VM was touched")]
    Cancelled,

    #[error("worker panicked: {0}")]
    WorkerPanicked(String),
}

/// Result of processing one VM.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmOutcome {
    pub id: String,
    pub name: String,
    pub action: VmAction,
    /// Set only for VMs the policy left alone.
    pub skip_reason: Option<SkipReason>,
    pub error: Option<VmActionError>,
}

impl VmOutcome {
    fn for_vm(vm: &dyn VirtualMachine, action: VmAction) -> Self {
        Self {
            id: vm.id().to_string(),
            name: vm.name().to_string(),
            action,
            skip_reason: None,
            error: None,
        }
    }

    /// The policy decided to leave the VM alone.
    pub fn skipped(vm: &dyn VirtualMachine, reason: SkipReason) -> Self {
        Self {
            skip_reason: Some(reason),
            ..Self::for_vm(vm, VmAction::Skipped)
        }
    }

    /// The VM was retired successfully (`PoweredOff` or `Destroyed`).
    pub fn retired(vm: &dyn VirtualMachine, action: VmAction) -> Self {
        Self::for_vm(vm, action)
    }

    /// Retirement failed after `action` had been achieved.
    pub fn failed(vm: &dyn VirtualMachine, action: VmAction, error: VmActionError) -> Self {
        Self {
            error: Some(error),
            ..Self::for_vm(vm, action)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.error, Some(VmActionError::Cancelled))
    }
}

/// Counts by outcome for one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassSummary {
    /// VMs returned by the inventory.
    pub inspected: usize,
    /// VMs the policy selected for retirement.
    pub candidates: usize,
    /// VMs nothing was done to (policy skips, failures and cancellations).
    pub skipped: usize,
    pub powered_off: usize,
    pub destroyed: usize,
    /// Outcomes carrying an action error other than cancellation.
    pub failed: usize,
    pub cancelled: usize,
}

impl PassSummary {
    /// VMs that were at least powered off.
    pub fn retired(&self) -> usize {
        self.powered_off + self.destroyed
    }
}

/// Aggregated result of one cleanup pass over one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassResult {
    pub location: String,
    pub now: DateTime<Utc>,
    pub outcomes: Vec<VmOutcome>,
    pub summary: PassSummary,
}

impl PassResult {
    /// Build a result and its summary from per-VM outcomes.
    pub fn new(
        location: impl Into<String>,
        now: DateTime<Utc>,
        candidates: usize,
        outcomes: Vec<VmOutcome>,
    ) -> Self {
        let mut summary = PassSummary {
            inspected: outcomes.len(),
            candidates,
            ..PassSummary::default()
        };

        for outcome in &outcomes {
            match outcome.action {
                VmAction::Skipped => summary.skipped += 1,
                VmAction::PoweredOff => summary.powered_off += 1,
                VmAction::Destroyed => summary.destroyed += 1,
            }
            match outcome.error {
                Some(VmActionError::Cancelled) => summary.cancelled += 1,
                Some(_) => summary.failed += 1,
                None => {}
            }
        }

        Self {
            location: location.into(),
            now,
            outcomes,
            summary,
        }
    }

    /// Outcomes that carry an error, cancellations included.
    pub fn errors(&self) -> impl Iterator<Item = &VmOutcome> {
        self.outcomes.iter().filter(|o| o.is_error())
    }

    pub fn has_errors(&self) -> bool {
        self.summary.failed > 0 || self.summary.cancelled > 0
    }
}
