// Retirement executor: concurrency and rate bounds, failure isolation,
// cancellation.

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use common::{handles, FakeVm, InFlight};
use vsphere_janitor::executor::RetirementExecutor;
use vsphere_janitor::{JanitorConfig, VmAction, VmActionError};

fn config() -> JanitorConfig {
    JanitorConfig::default()
        .with_concurrency(0)
        .with_rate_per_second(0)
}

#[tokio::test]
async fn test_empty_batch_returns_no_outcomes() {
    let executor = RetirementExecutor::new(&config());
    let outcomes = executor.execute(&[], &CancellationToken::new()).await;
    assert!(outcomes.is_empty());
}

#[tokio::test]
async fn test_destroys_every_candidate_in_order() {
    let now = Utc::now();
    let vms: Vec<Arc<FakeVm>> = (0..5)
        .map(|i| Arc::new(FakeVm::expired(&format!("ci-{i}"), now)))
        .collect();

    let executor = RetirementExecutor::new(&config());
    let outcomes = executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert_eq!(outcomes.len(), 5);
    for (i, outcome) in outcomes.iter().enumerate() {
        assert_eq!(outcome.name, format!("ci-{i}"));
        assert_eq!(outcome.id, format!("uuid-ci-{i}"));
        assert_eq!(outcome.action, VmAction::Destroyed);
        assert!(outcome.error.is_none());
    }
    for vm in &vms {
        assert_eq!(vm.power_offs(), 1);
        assert_eq!(vm.destroys(), 1);
    }
}

#[tokio::test]
async fn test_skip_destroy_only_powers_off() {
    let now = Utc::now();
    let vms = vec![
        Arc::new(FakeVm::expired("ci-1", now)),
        Arc::new(FakeVm::expired("ci-2", now)),
    ];

    let executor = RetirementExecutor::new(&config().with_skip_destroy(true));
    let outcomes = executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert!(outcomes.iter().all(|o| o.action == VmAction::PoweredOff && o.error.is_none()));
    for vm in &vms {
        assert_eq!(vm.power_offs(), 1);
        assert_eq!(vm.destroys(), 0);
    }
}

#[tokio::test]
async fn test_power_off_failure_is_isolated_and_skips_destroy() {
    let now = Utc::now();
    let vms = vec![
        Arc::new(FakeVm::expired("ci-1", now)),
        Arc::new(FakeVm::expired("ci-2", now).failing_power_off()),
        Arc::new(FakeVm::expired("ci-3", now)),
    ];

    let executor = RetirementExecutor::new(&config());
    let outcomes = executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert_eq!(outcomes[0].action, VmAction::Destroyed);
    assert_eq!(outcomes[2].action, VmAction::Destroyed);

    let failed = &outcomes[1];
    assert_eq!(failed.action, VmAction::Skipped);
    assert!(matches!(
        &failed.error,
        Some(VmActionError::PowerOff(msg)) if msg.contains("power off refused")
    ));
    assert_eq!(vms[1].power_offs(), 1);
    assert_eq!(vms[1].destroys(), 0, "destroy must not follow a failed power-off");
}

#[tokio::test]
async fn test_destroy_failure_leaves_vm_powered_off() {
    let now = Utc::now();
    let vms = vec![
        Arc::new(FakeVm::expired("ci-1", now).failing_destroy()),
        Arc::new(FakeVm::expired("ci-2", now)),
    ];

    let executor = RetirementExecutor::new(&config());
    let outcomes = executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert_eq!(outcomes[0].action, VmAction::PoweredOff);
    assert!(matches!(outcomes[0].error, Some(VmActionError::Destroy(_))));
    assert_eq!(outcomes[1].action, VmAction::Destroyed);
    assert!(outcomes[1].error.is_none());
}

#[tokio::test]
async fn test_concurrency_limit_bounds_in_flight_actions() {
    let now = Utc::now();
    let in_flight = Arc::new(InFlight::default());
    let vms: Vec<Arc<FakeVm>> = (0..8)
        .map(|i| {
            Arc::new(
                FakeVm::expired(&format!("ci-{i}"), now)
                    .with_delay(Duration::from_millis(30))
                    .tracked(&in_flight),
            )
        })
        .collect();

    let executor = RetirementExecutor::new(&config().with_concurrency(2));
    let outcomes = executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert!(outcomes.iter().all(|o| o.action == VmAction::Destroyed));
    assert!(in_flight.max() <= 2, "max in flight was {}", in_flight.max());
    assert!(in_flight.max() >= 1);
}

#[tokio::test]
async fn test_unbounded_concurrency_runs_candidates_together() {
    let now = Utc::now();
    let in_flight = Arc::new(InFlight::default());
    let vms: Vec<Arc<FakeVm>> = (0..6)
        .map(|i| {
            Arc::new(
                FakeVm::expired(&format!("ci-{i}"), now)
                    .with_delay(Duration::from_millis(100))
                    .tracked(&in_flight),
            )
        })
        .collect();

    let executor = RetirementExecutor::new(&config());
    let start = Instant::now();
    executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert_eq!(in_flight.max(), 6);
    // Power-off plus destroy, run side by side rather than one VM after another.
    assert!(start.elapsed() < Duration::from_millis(1000));
}

#[tokio::test]
async fn test_rate_limit_spaces_admissions() {
    let now = Utc::now();
    let rate = 10;
    let vms: Vec<Arc<FakeVm>> = (0..=rate)
        .map(|i| Arc::new(FakeVm::expired(&format!("ci-{i}"), now)))
        .collect();

    let executor = RetirementExecutor::new(&config().with_rate_per_second(rate));
    let start = Instant::now();
    let outcomes = executor.execute(&handles(&vms), &CancellationToken::new()).await;

    assert!(outcomes.iter().all(|o| o.action == VmAction::Destroyed));
    // rate + 1 admissions cannot all fit in one second.
    assert!(
        start.elapsed() >= Duration::from_millis(900),
        "elapsed {:?}",
        start.elapsed()
    );

    let mut started: Vec<Instant> = vms
        .iter()
        .map(|vm| (*vm.power_off_started.lock()).expect("power off was called"))
        .collect();
    started.sort();
    let window = started[rate as usize].duration_since(started[0]);
    assert!(window >= Duration::from_millis(900), "window {window:?}");
}

#[tokio::test]
async fn test_cancelled_before_start_touches_nothing() {
    let now = Utc::now();
    let vms: Vec<Arc<FakeVm>> = (0..4)
        .map(|i| Arc::new(FakeVm::expired(&format!("ci-{i}"), now)))
        .collect();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let executor = RetirementExecutor::new(&config().with_concurrency(2).with_rate_per_second(5));
    let outcomes = executor.execute(&handles(&vms), &cancel).await;

    assert_eq!(outcomes.len(), 4);
    for outcome in &outcomes {
        assert_eq!(outcome.action, VmAction::Skipped);
        assert_eq!(outcome.error, Some(VmActionError::Cancelled));
        assert!(outcome.is_cancelled());
    }
    assert!(vms.iter().all(|vm| vm.power_offs() == 0));
}

#[tokio::test]
async fn test_cancel_mid_batch_lets_admitted_work_finish() {
    let now = Utc::now();
    let vms: Vec<Arc<FakeVm>> = (0..5)
        .map(|i| {
            Arc::new(
                FakeVm::expired(&format!("ci-{i}"), now).with_delay(Duration::from_millis(150)),
            )
        })
        .collect();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let executor = RetirementExecutor::new(&config().with_concurrency(1));
    let outcomes = executor.execute(&handles(&vms), &cancel).await;

    let destroyed = outcomes
        .iter()
        .filter(|o| o.action == VmAction::Destroyed)
        .count();
    let cancelled = outcomes.iter().filter(|o| o.is_cancelled()).count();
    assert_eq!(destroyed, 1, "the admitted VM runs to completion");
    assert_eq!(cancelled, 4);

    let touched = vms.iter().filter(|vm| vm.power_offs() > 0).count();
    assert_eq!(touched, 1);
    for (vm, outcome) in vms.iter().zip(&outcomes) {
        if outcome.is_cancelled() {
            assert_eq!(vm.power_offs(), 0);
            assert_eq!(vm.destroys(), 0);
        }
    }
}
