//! Retirement executor: powers off and destroys candidate VMs.
//!
//! One tokio task is spawned per candidate. A semaphore bounds how many
//! retirements are in flight and a shared [`AdmissionLimiter`] bounds how many
//! start per second. Every task returns its own [`VmOutcome`], so failures stay
//! local to the VM that produced them.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::JanitorConfig;
use crate::outcome::{VmAction, VmActionError, VmOutcome};
use crate::rate_limit::AdmissionLimiter;
use crate::vm::VmHandle;

/// Carries out retirements for a batch of candidates.
#[derive(Debug, Clone)]
pub struct RetirementExecutor {
    skip_destroy: bool,
    concurrency: usize,
    rate_per_second: u32,
}

impl RetirementExecutor {
    /// Create an executor using the limits in `config`.
    pub fn new(config: &JanitorConfig) -> Self {
        Self {
            skip_destroy: config.skip_destroy,
            concurrency: config.concurrency,
            rate_per_second: config.rate_per_second,
        }
    }

    /// Retire every candidate and return one outcome per candidate, in order.
    ///
    /// Returns only after every candidate has reached a terminal outcome.
    /// When `cancel` fires, candidates still waiting for a worker slot or an
    /// admission get a [`VmActionError::Cancelled`] outcome; candidates already
    /// admitted run their power-off/destroy to completion.
    pub async fn execute(
        &self,
        candidates: &[VmHandle],
        cancel: &CancellationToken,
    ) -> Vec<VmOutcome> {
        if candidates.is_empty() {
            return Vec::new();
        }

        // One limiter per pass, shared by all of its workers.
        let limiter = Arc::new(AdmissionLimiter::new(self.rate_per_second));
        let semaphore = (self.concurrency > 0).then(|| Arc::new(Semaphore::new(self.concurrency)));

        tracing::debug!(
            candidates = candidates.len(),
            concurrency = self.concurrency,
            rate_per_second = self.rate_per_second,
            skip_destroy = self.skip_destroy,
            "Dispatching retirements"
        );

        let handles: Vec<_> = candidates
            .iter()
            .map(|vm| {
                let worker = Worker {
                    vm: Arc::clone(vm),
                    skip_destroy: self.skip_destroy,
                    semaphore: semaphore.as_ref().map(Arc::clone),
                    limiter: Arc::clone(&limiter),
                    cancel: cancel.clone(),
                };
                let span = tracing::info_span!("retire", vm_id = %vm.id(), vm_name = %vm.name());
                tokio::spawn(worker.run().instrument(span))
            })
            .collect();

        let joined = futures::future::join_all(handles).await;

        joined
            .into_iter()
            .zip(candidates)
            .map(|(joined, vm)| {
                joined.unwrap_or_else(|e| {
                    tracing::error!(
                        vm_id = %vm.id(),
                        vm_name = %vm.name(),
                        error = %e,
                        "Retirement worker died"
                    );
                    VmOutcome::failed(
                        vm.as_ref(),
                        VmAction::Skipped,
                        VmActionError::WorkerPanicked(e.to_string()),
                    )
                })
            })
            .collect()
    }
}

/// Everything one retirement task needs.
struct Worker {
    vm: VmHandle,
    skip_destroy: bool,
    semaphore: Option<Arc<Semaphore>>,
    limiter: Arc<AdmissionLimiter>,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) -> VmOutcome {
        let vm = self.vm.as_ref();

        // Held until this function returns, covering power-off and destroy.
        let _permit = match &self.semaphore {
            Some(semaphore) => {
                let acquired = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => None,
                    permit = Arc::clone(semaphore).acquire_owned() => permit.ok(),
                };
                match acquired {
                    Some(permit) => Some(permit),
                    None => return cancelled(vm),
                }
            }
            None => None,
        };

        if self.limiter.admit(&self.cancel).await.is_err() {
            return cancelled(vm);
        }

        // Past admission: run to completion even if cancellation fires now.
        tracing::info!("Powering off VM");
        if let Err(e) = vm.power_off().await {
            tracing::warn!(error = %e, "Couldn't power off VM");
            return VmOutcome::failed(vm, VmAction::Skipped, VmActionError::PowerOff(e.to_string()));
        }

        if self.skip_destroy {
            tracing::info!("Powered off VM, skipping destroy");
            return VmOutcome::retired(vm, VmAction::PoweredOff);
        }

        tracing::info!("Destroying VM");
        if let Err(e) = vm.destroy().await {
            tracing::warn!(error = %e, "Couldn't destroy VM, leaving it powered off");
            return VmOutcome::failed(vm, VmAction::PoweredOff, VmActionError::Destroy(e.to_string()));
        }

        tracing::info!("Destroyed VM");
        VmOutcome::retired(vm, VmAction::Destroyed)
    }
}

fn cancelled(vm: &dyn crate::vm::VirtualMachine) -> VmOutcome {
    tracing::debug!("Retirement cancelled before admission");
    VmOutcome::failed(vm, VmAction::Skipped, VmActionError::Cancelled)
}
