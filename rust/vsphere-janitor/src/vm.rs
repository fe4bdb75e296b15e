//! VM handles and inventory listing.
//!
//! These traits are the seam between the cleanup engine and the platform
//! client. [`crate::vsphere::VsphereClient`] is the production lister; tests
//! provide in-memory doubles.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::VsphereError;

/// Name reported for VMs whose configuration could not be read.
pub const UNNAMED_VM: &str = "<unnamed>";

/// A point-in-time snapshot of one VM plus the actions that retire it.
///
/// The accessors never refresh: every decision made during a pass sees the
/// values captured when the inventory was listed. `power_off` and `destroy`
/// change platform state, not the snapshot.
#[async_trait]
pub trait VirtualMachine: Send + Sync {
    /// Display name, [`UNNAMED_VM`] when unknown.
    fn name(&self) -> &str;

    /// Platform-assigned unique id, empty when unknown.
    fn id(&self) -> &str;

    /// Reported uptime; zero when powered off or not yet reported.
    fn uptime(&self) -> Duration;

    /// Time of the most recent power-on, if the platform recorded one.
    fn boot_time(&self) -> Option<DateTime<Utc>>;

    /// Power state at snapshot time.
    fn powered_on(&self) -> bool;

    /// Power the VM off and wait for the platform task to finish.
    async fn power_off(&self) -> Result<(), VsphereError>;

    /// Delete the VM and wait for the platform task to finish.
    async fn destroy(&self) -> Result<(), VsphereError>;
}

impl fmt::Debug for dyn VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualMachine")
            .field("name", &self.name())
            .field("id", &self.id())
            .field("uptime", &self.uptime())
            .field("boot_time", &self.boot_time())
            .field("powered_on", &self.powered_on())
            .finish()
    }
}

/// Shared handle to a VM snapshot.
pub type VmHandle = Arc<dyn VirtualMachine>;

/// Source of VM handles for an inventory location.
#[async_trait]
pub trait VmLister: Send + Sync {
    /// List the VMs directly inside `location`.
    ///
    /// Non-VM entries are omitted. VMs whose properties cannot be read are
    /// skipped rather than failing the whole listing.
    async fn list_vms(&self, location: &str) -> Result<Vec<VmHandle>, VsphereError>;
}
