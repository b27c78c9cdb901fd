// Inspection run tests
// Drive the orchestrator end to end against in-memory collaborators

mod common;

use certwatch::InspectError;
use certwatch::inspector::{CertProbe, CertStatus, InspectionState};
use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

#[tokio::test]
async fn test_every_target_is_saved_once() {
    let harness = Harness::new(
        MemoryDomains::with_targets(domains(7)),
        MemoryEndpoints::with_targets(endpoints(5)),
    );
    let mut inspector = harness.inspector(
        Arc::new(TableProber::default()),
        Arc::new(StatusHttp(200)),
        vec![],
        &settings(),
    );

    let summary = inspector.start().await.unwrap();

    assert_eq!(inspector.state(), InspectionState::Done);
    assert_eq!(harness.domains.saved_count(), 7);
    assert_eq!(harness.endpoints.saved_count(), 5);
    assert_eq!(summary.domains_checked, 7);
    assert_eq!(summary.endpoints_checked, 5);

    // Unreachable hosts are all reported, healthy endpoints are not
    assert_eq!(summary.bad_cert_events, 7);
    assert_eq!(summary.failed_healthcheck_events, 0);
    assert!(
        harness
            .domains
            .saved
            .lock()
            .unwrap()
            .iter()
            .all(|c| c.status == "CannotConnect" && c.expiry.is_none())
    );

    // No preferences, so nothing is delivered
    assert_eq!(summary.notifications_sent, 0);
    assert_eq!(harness.webhook.count(), 0);

    assert_eq!(harness.domains.cleanup_count(), 1);
    assert_eq!(harness.endpoints.cleanup_count(), 1);
}

#[tokio::test]
async fn test_zero_targets_reaches_done() {
    let harness = Harness::new(
        MemoryDomains::with_targets(vec![]),
        MemoryEndpoints::with_targets(vec![]),
    );
    let mut inspector = harness.inspector(
        Arc::new(TableProber::default()),
        Arc::new(StatusHttp(200)),
        vec![preference("slack", "https://hooks.example/T1")],
        &settings(),
    );

    let summary = tokio::time::timeout(Duration::from_secs(10), inspector.start())
        .await
        .expect("run with no targets must finish")
        .unwrap();

    assert_eq!(inspector.state(), InspectionState::Done);
    assert_eq!(summary.domains_checked, 0);
    assert_eq!(summary.endpoints_checked, 0);
    assert_eq!(summary.failed_jobs, 0);
    assert_eq!(harness.domains.cleanup_count(), 1);
}

#[tokio::test]
async fn test_load_failures_still_reach_done() {
    let harness = Harness::new(
        MemoryDomains::failing("relation \"domains\" does not exist"),
        MemoryEndpoints::failing("connection reset"),
    );
    let mut inspector = harness.inspector(
        Arc::new(TableProber::default()),
        Arc::new(StatusHttp(200)),
        vec![],
        &settings(),
    );

    let summary = tokio::time::timeout(Duration::from_secs(10), inspector.start())
        .await
        .expect("run with failing repositories must finish")
        .unwrap();

    assert_eq!(inspector.state(), InspectionState::Done);
    assert_eq!(summary.failed_jobs, 2);
    assert_eq!(harness.domains.saved_count(), 0);
    // Cleanup is independent of the checking jobs
    assert_eq!(harness.domains.cleanup_count(), 1);
    assert_eq!(harness.endpoints.cleanup_count(), 1);
}

#[tokio::test]
async fn test_expiring_certificate_notifies_webhook() {
    let domain = certwatch::db::Domain::new("user-1", "expiring.example");
    let not_after = Utc::now() + ChronoDuration::hours(10);

    let harness = Harness::new(
        MemoryDomains::with_targets(vec![domain.clone()]),
        MemoryEndpoints::with_targets(vec![]),
    );
    let prober = TableProber::default().answer(
        "expiring.example",
        CertProbe::Handshake {
            not_after,
            hostname_verified: true,
        },
    );
    let mut inspector = harness.inspector(
        Arc::new(prober),
        Arc::new(StatusHttp(200)),
        vec![preference("slack", "https://hooks.example/T1")],
        &settings(),
    );

    let summary = inspector.start().await.unwrap();

    let saved = harness.domains.saved.lock().unwrap().clone();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].domain_id, domain.id);
    assert_eq!(saved[0].status, CertStatus::AboutToExpire.to_string());
    assert_eq!(saved[0].expiry, Some(not_after));

    assert_eq!(summary.bad_cert_events, 1);
    assert_eq!(summary.notifications_sent, 1);

    let sent = harness.webhook.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "https://hooks.example/T1");
    assert!(sent[0].body.contains("expiring.example"));
    assert!(sent[0].body.contains("AboutToExpire"));
    assert_eq!(harness.email.count(), 0);
}

#[tokio::test]
async fn test_failed_endpoint_notifies_each_channel() {
    let harness = Harness::new(
        MemoryDomains::with_targets(vec![]),
        MemoryEndpoints::with_targets(endpoints(1)),
    );
    let mut inspector = harness.inspector(
        Arc::new(TableProber::default()),
        Arc::new(StatusHttp(503)),
        vec![
            preference("email", "ops@example.com"),
            preference("slack", "https://hooks.example/T1"),
        ],
        &settings(),
    );

    let summary = inspector.start().await.unwrap();

    assert_eq!(summary.failed_healthcheck_events, 1);
    assert_eq!(summary.notifications_sent, 2);
    assert_eq!(harness.email.count(), 1);
    assert_eq!(harness.webhook.count(), 1);
    assert!(
        harness.webhook.sent.lock().unwrap()[0]
            .body
            .contains("Want: 200, got: 503")
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_worker_cap_bounds_concurrent_checks() {
    let harness = Harness::new(
        MemoryDomains::with_targets(domains(12)),
        MemoryEndpoints::with_targets(vec![]),
    );
    let prober = Arc::new(TableProber::with_delay(Duration::from_millis(20)));
    let mut settings = settings();
    settings.max_workers = 3;

    let mut inspector =
        harness.inspector(prober.clone(), Arc::new(StatusHttp(200)), vec![], &settings);
    let summary = inspector.start().await.unwrap();

    assert_eq!(summary.domains_checked, 12);
    assert!(prober.peak.load(Ordering::SeqCst) <= 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_burst_of_failures_with_slow_notifier_completes() {
    let harness = Harness::new(
        MemoryDomains::with_targets(domains(200)),
        MemoryEndpoints::with_targets(endpoints(200)),
    )
    .with_webhook(RecordingNotifier::slow(Duration::from_millis(2)));

    let mut settings = settings();
    settings.max_workers = 50;
    settings.event_buffer = 2;

    let mut inspector = harness.inspector(
        Arc::new(TableProber::default()),
        Arc::new(StatusHttp(500)),
        vec![preference("slack", "https://hooks.example/T1")],
        &settings,
    );

    let summary = tokio::time::timeout(Duration::from_secs(60), inspector.start())
        .await
        .expect("run must not deadlock under a burst of events")
        .unwrap();

    assert_eq!(summary.bad_cert_events, 200);
    assert_eq!(summary.failed_healthcheck_events, 200);
    assert_eq!(harness.webhook.count(), 400);
    assert_eq!(summary.notifications_sent, 400);
}

#[tokio::test]
async fn test_start_twice_is_rejected() {
    let harness = Harness::new(
        MemoryDomains::with_targets(domains(1)),
        MemoryEndpoints::with_targets(vec![]),
    );
    let mut inspector = harness.inspector(
        Arc::new(TableProber::default()),
        Arc::new(StatusHttp(200)),
        vec![],
        &settings(),
    );

    inspector.start().await.unwrap();
    let err = inspector.start().await.unwrap_err();

    assert!(matches!(err, InspectError::AlreadyStarted { .. }));
    assert_eq!(harness.domains.saved_count(), 1);
}

#[tokio::test]
async fn test_panicking_target_does_not_abort_run() {
    let targets = domains(5);
    let bad_host = targets[2].domain.clone();

    let harness = Harness::new(
        MemoryDomains::with_targets(targets),
        MemoryEndpoints::with_targets(endpoints(2)),
    );
    let prober = TableProber::panicking_on(bad_host);
    let mut inspector = harness.inspector(
        Arc::new(prober),
        Arc::new(StatusHttp(200)),
        vec![],
        &settings(),
    );

    let summary = inspector.start().await.unwrap();

    assert_eq!(inspector.state(), InspectionState::Done);
    assert_eq!(harness.domains.saved_count(), 4);
    assert_eq!(harness.endpoints.saved_count(), 2);
    assert_eq!(summary.domains_checked, 4);
    assert_eq!(summary.panicked_units, 1);
    assert_eq!(summary.failed_jobs, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_state_moves_through_running_and_draining() {
    let harness = Harness::new(
        MemoryDomains::with_targets(domains(3)),
        MemoryEndpoints::with_targets(vec![]),
    )
    .with_webhook(RecordingNotifier::slow(Duration::from_millis(300)));

    let mut inspector = harness.inspector(
        Arc::new(TableProber::with_delay(Duration::from_millis(200))),
        Arc::new(StatusHttp(200)),
        vec![preference("slack", "https://hooks.example/T1")],
        &settings(),
    );
    let mut states = inspector.subscribe_state();
    assert_eq!(*states.borrow(), InspectionState::Idle);

    let run = tokio::spawn(async move {
        let summary = inspector.start().await;
        (inspector, summary)
    });

    let wait = Duration::from_secs(10);
    tokio::time::timeout(wait, states.wait_for(|s| *s == InspectionState::Running))
        .await
        .expect("run must report Running")
        .unwrap();
    assert_eq!(harness.domains.saved_count(), 0);

    tokio::time::timeout(wait, states.wait_for(|s| *s == InspectionState::Draining))
        .await
        .expect("run must report Draining")
        .unwrap();
    // Every check is stored, alerts are still going out
    assert_eq!(harness.domains.saved_count(), 3);
    assert!(harness.webhook.count() < 3);

    let (inspector, summary) = run.await.unwrap();
    let summary = summary.unwrap();
    assert_eq!(inspector.state(), InspectionState::Done);
    assert_eq!(summary.bad_cert_events, 3);
    assert_eq!(harness.webhook.count(), 3);
}
