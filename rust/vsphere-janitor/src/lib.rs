//! vSphere Janitor
//!
//! Periodically powers off, and optionally destroys, VMs in vSphere inventory
//! folders that have been running longer than an allowed age.
//!
//! A pass over one folder lists its VMs, applies the age policy in
//! [`policy`], and retires the selected VMs through the rate-limited,
//! bounded-concurrency [`executor`]. Per-VM failures are collected in the
//! [`outcome::PassResult`] and never abort the rest of the batch.

pub mod config;
pub mod error;
pub mod executor;
pub mod janitor;
pub mod metrics;
pub mod outcome;
pub mod policy;
pub mod rate_limit;
pub mod telemetry;
pub mod vm;
pub mod vsphere;

pub use config::JanitorConfig;
pub use error::{JanitorError, JanitorResult, VsphereError};
pub use janitor::Janitor;
pub use outcome::{PassResult, PassSummary, VmAction, VmActionError, VmOutcome};
pub use policy::{Decision, RetireReason, SkipReason};
pub use vm::{VirtualMachine, VmHandle, VmLister};
