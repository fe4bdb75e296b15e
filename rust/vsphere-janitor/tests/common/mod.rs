// In-memory VM and lister doubles shared by the integration tests.
#![allow(dead_code, reason = "each test binary uses a different subset of the doubles")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;

use vsphere_janitor::{VirtualMachine, VmHandle, VmLister, VsphereError};

/// Tracks how many VM actions run at the same time.
#[derive(Debug, Default)]
pub struct InFlight {
    current: AtomicUsize,
    max: AtomicUsize,
}

impl InFlight {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.max.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn max(&self) -> usize {
        self.max.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
pub struct FakeVm {
    name: String,
    id: String,
    uptime: Duration,
    boot_time: Option<DateTime<Utc>>,
    powered_on: bool,
    fail_power_off: bool,
    fail_destroy: bool,
    action_delay: Duration,
    in_flight: Option<Arc<InFlight>>,
    pub power_off_calls: AtomicUsize,
    pub destroy_calls: AtomicUsize,
    pub power_off_started: Mutex<Option<Instant>>,
}

impl FakeVm {
    /// A powered-on VM booted `age` before `now`, reporting `age` of uptime.
    pub fn running(name: &str, age: Duration, now: DateTime<Utc>) -> Self {
        let boot = now - TimeDelta::from_std(age).unwrap_or(TimeDelta::zero());
        Self {
            name: name.to_string(),
            id: format!("uuid-{name}"),
            uptime: age,
            boot_time: Some(boot),
            powered_on: true,
            fail_power_off: false,
            fail_destroy: false,
            action_delay: Duration::ZERO,
            in_flight: None,
            power_off_calls: AtomicUsize::new(0),
            destroy_calls: AtomicUsize::new(0),
            power_off_started: Mutex::new(None),
        }
    }

    /// A running VM well past the default two hour cutoff.
    pub fn expired(name: &str, now: DateTime<Utc>) -> Self {
        Self::running(name, Duration::from_secs(3 * 3600), now)
    }

    /// A running VM well inside the default cutoff.
    pub fn fresh(name: &str, now: DateTime<Utc>) -> Self {
        Self::running(name, Duration::from_secs(10 * 60), now)
    }

    pub fn powered_off(mut self) -> Self {
        self.powered_on = false;
        self.uptime = Duration::ZERO;
        self
    }

    pub fn without_boot_time(mut self) -> Self {
        self.boot_time = None;
        self
    }

    pub fn with_zero_uptime(mut self) -> Self {
        self.uptime = Duration::ZERO;
        self
    }

    pub fn failing_power_off(mut self) -> Self {
        self.fail_power_off = true;
        self
    }

    pub fn failing_destroy(mut self) -> Self {
        self.fail_destroy = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.action_delay = delay;
        self
    }

    pub fn tracked(mut self, in_flight: &Arc<InFlight>) -> Self {
        self.in_flight = Some(Arc::clone(in_flight));
        self
    }

    pub fn power_offs(&self) -> usize {
        self.power_off_calls.load(Ordering::SeqCst)
    }

    pub fn destroys(&self) -> usize {
        self.destroy_calls.load(Ordering::SeqCst)
    }

    async fn act(&self) {
        if let Some(in_flight) = &self.in_flight {
            in_flight.enter();
        }
        if !self.action_delay.is_zero() {
            tokio::time::sleep(self.action_delay).await;
        }
        if let Some(in_flight) = &self.in_flight {
            in_flight.exit();
        }
    }
}

#[async_trait]
impl VirtualMachine for FakeVm {
    fn name(&self) -> &str {
        &self.name
    }

    fn id(&self) -> &str {
        &self.id
    }

    fn uptime(&self) -> Duration {
        self.uptime
    }

    fn boot_time(&self) -> Option<DateTime<Utc>> {
        self.boot_time
    }

    fn powered_on(&self) -> bool {
        self.powered_on
    }

    async fn power_off(&self) -> Result<(), VsphereError> {
        self.power_off_started.lock().get_or_insert_with(Instant::now);
        self.power_off_calls.fetch_add(1, Ordering::SeqCst);
        self.act().await;
        if self.fail_power_off {
            return Err(VsphereError::TaskFailed {
                task: format!("task-{}", self.name),
                message: "power off refused".to_string(),
            });
        }
        Ok(())
    }

    async fn destroy(&self) -> Result<(), VsphereError> {
        self.destroy_calls.fetch_add(1, Ordering::SeqCst);
        self.act().await;
        if self.fail_destroy {
            return Err(VsphereError::TaskFailed {
                task: format!("task-{}", self.name),
                message: "destroy refused".to_string(),
            });
        }
        Ok(())
    }
}

/// Lister returning a fixed inventory, or a fixed error.
pub struct FakeLister {
    vms: Vec<Arc<FakeVm>>,
    error: Option<String>,
    pub calls: AtomicUsize,
}

impl FakeLister {
    pub fn new(vms: &[Arc<FakeVm>]) -> Self {
        Self {
            vms: vms.to_vec(),
            error: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            vms: Vec::new(),
            error: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VmLister for FakeLister {
    async fn list_vms(&self, location: &str) -> Result<Vec<VmHandle>, VsphereError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.error {
            return Err(VsphereError::Network(format!("{location}: {message}")));
        }
        Ok(self
            .vms
            .iter()
            .map(|vm| Arc::clone(vm) as VmHandle)
            .collect())
    }
}

pub fn handles(vms: &[Arc<FakeVm>]) -> Vec<VmHandle> {
    vms.iter().map(|vm| Arc::clone(vm) as VmHandle).collect()
}
