//! Cleanup orchestration for one inventory location.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::{format_duration, JanitorConfig};
use crate::error::{JanitorError, JanitorResult};
use crate::executor::RetirementExecutor;
use crate::metrics;
use crate::outcome::{PassResult, VmOutcome};
use crate::policy::{self, Decision};
use crate::vm::{VmHandle, VmLister};

/// Runs cleanup passes against an inventory source.
///
/// A `Janitor` holds no state between passes: every call to
/// [`Janitor::cleanup`] works only from the current inventory, the supplied
/// time, and the configuration given at construction.
pub struct Janitor {
    lister: Arc<dyn VmLister>,
    config: JanitorConfig,
    executor: RetirementExecutor,
}

impl fmt::Debug for Janitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Janitor")
            .field("lister", &"<Arc<dyn VmLister>>")
            .field("config", &self.config)
            .field("executor", &self.executor)
            .finish()
    }
}

impl Janitor {
    pub fn new(lister: Arc<dyn VmLister>, config: JanitorConfig) -> Self {
        let executor = RetirementExecutor::new(&config);
        Self {
            lister,
            config,
            executor,
        }
    }

    /// Run one cleanup pass over `location`.
    ///
    /// An inventory failure is returned as an error and no VM is touched.
    /// Per-VM failures are recorded in the returned [`PassResult`].
    pub async fn cleanup(
        &self,
        location: &str,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> JanitorResult<PassResult> {
        let start = Instant::now();

        tracing::info!(
            location = %location,
            cutoff = %format_duration(self.config.cutoff),
            zero_uptime_cutoff = %format_duration(self.config.zero_uptime_cutoff),
            skip_destroy = self.config.skip_destroy,
            "Starting cleanup pass"
        );

        let vms = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(JanitorError::Cancelled { location: location.to_string() });
            }
            listed = self.lister.list_vms(location) => listed,
        };

        let vms = match vms {
            Ok(vms) => vms,
            Err(source) => {
                metrics::record_pass_error(start.elapsed());
                return Err(JanitorError::Inventory {
                    location: location.to_string(),
                    source,
                });
            }
        };

        let (mut slots, candidates) = self.partition(location, &vms, now);
        let candidate_count = candidates.len();

        let handles: Vec<VmHandle> = candidates.iter().map(|(_, vm)| Arc::clone(vm)).collect();
        let retired = self.executor.execute(&handles, cancel).await;

        for ((index, _), outcome) in candidates.into_iter().zip(retired) {
            slots[index] = Some(outcome);
        }
        let outcomes: Vec<VmOutcome> = slots.into_iter().flatten().collect();

        let result = PassResult::new(location, now, candidate_count, outcomes);
        let elapsed = start.elapsed();
        metrics::record_pass(&result, elapsed);

        let summary = &result.summary;
        tracing::info!(
            location = %location,
            inspected = summary.inspected,
            candidates = summary.candidates,
            skipped = summary.skipped,
            powered_off = summary.powered_off,
            destroyed = summary.destroyed,
            failed = summary.failed,
            cancelled = summary.cancelled,
            duration_ms = elapsed.as_millis(),
            "Cleanup pass completed"
        );

        Ok(result)
    }

    /// Apply the policy to every VM, keeping inventory order.
    ///
    /// Returns one slot per VM (filled for skipped VMs) and the retirement
    /// candidates with their slot index.
    fn partition(
        &self,
        location: &str,
        vms: &[VmHandle],
        now: DateTime<Utc>,
    ) -> (Vec<Option<VmOutcome>>, Vec<(usize, VmHandle)>) {
        let mut slots = Vec::with_capacity(vms.len());
        let mut candidates = Vec::new();

        for (index, vm) in vms.iter().enumerate() {
            match policy::decide(vm.as_ref(), now, &self.config) {
                Decision::Skip(reason) => {
                    tracing::debug!(
                        location = %location,
                        vm_id = %vm.id(),
                        vm_name = %vm.name(),
                        reason = %reason,
                        "Skipping VM"
                    );
                    slots.push(Some(VmOutcome::skipped(vm.as_ref(), reason)));
                }
                Decision::Retire(reason) => {
                    tracing::info!(
                        location = %location,
                        vm_id = %vm.id(),
                        vm_name = %vm.name(),
                        uptime = %format_duration(vm.uptime()),
                        reason = %reason,
                        "VM selected for retirement"
                    );
                    slots.push(None);
                    candidates.push((index, Arc::clone(vm)));
                }
            }
        }

        (slots, candidates)
    }
}
