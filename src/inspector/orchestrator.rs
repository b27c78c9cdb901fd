// Inspection Orchestrator
//
// One run spawns four jobs (cert checks, healthchecks and the two history
// cleanups) into a JoinSet and drains their events into the notification
// router. The run is over once every job has been joined and both event
// channels have closed, which happens only after the last worker drops its
// sender. State goes Idle -> Running -> Draining (all jobs joined, buffered
// events still being routed) -> Done, and can be watched while a run is live.

use crate::db::traits::{DomainRepository, EndpointRepository};
use crate::inspector::cert::CertChecker;
use crate::inspector::cleanup::remove_expired_history;
use crate::inspector::config::InspectorSettings;
use crate::inspector::endpoint::EndpointChecker;
use crate::inspector::pool::{WorkerPool, contain_panic};
use crate::inspector::router::{NotificationRouter, RouteOutcome};
use crate::inspector::types::{
    BadCertEvent, FailedHealthcheckEvent, InspectionState, RunSummary,
};
use crate::{InspectError, Result};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{Instrument, Span};

/// Outcome of one checking job
#[derive(Debug, Clone, Copy, Default)]
struct CheckJobReport {
    checked: usize,
    panicked: usize,
    load_failed: bool,
}

impl CheckJobReport {
    fn load_failed() -> Self {
        Self {
            load_failed: true,
            ..Default::default()
        }
    }
}

/// What each of the four jobs hands back when joined
#[derive(Debug)]
enum JobReport {
    CertChecks(CheckJobReport),
    Healthchecks(CheckJobReport),
    CertCleanup(Option<u64>),
    HealthcheckCleanup(Option<u64>),
}

/// Runs one inspection pass over every domain and endpoint
pub struct Inspector {
    domains: Arc<DomainRepository>,
    endpoints: Arc<EndpointRepository>,
    cert_checker: Arc<CertChecker>,
    endpoint_checker: Arc<EndpointChecker>,
    router: NotificationRouter,
    max_workers: usize,
    event_buffer: usize,
    retention: chrono::Duration,
    span: Span,
    state: watch::Sender<InspectionState>,
}

impl Inspector {
    pub fn new(
        domains: Arc<DomainRepository>,
        endpoints: Arc<EndpointRepository>,
        cert_checker: Arc<CertChecker>,
        endpoint_checker: Arc<EndpointChecker>,
        router: NotificationRouter,
        settings: &InspectorSettings,
        span: Span,
    ) -> Self {
        Self {
            domains,
            endpoints,
            cert_checker,
            endpoint_checker,
            router,
            max_workers: settings.max_workers.max(1),
            event_buffer: settings.event_buffer.max(1),
            retention: settings.retention(),
            span,
            state: watch::Sender::new(InspectionState::Idle),
        }
    }

    pub fn state(&self) -> InspectionState {
        *self.state.borrow()
    }

    /// Receiver that sees every state change of this inspector
    pub fn subscribe_state(&self) -> watch::Receiver<InspectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: InspectionState) {
        tracing::debug!("Inspection state: {}", state);
        self.state.send_replace(state);
    }

    /// Run the inspection to completion.
    ///
    /// Per-target failures never fail the run. The only error is starting an
    /// inspector that has already run.
    pub async fn start(&mut self) -> Result<RunSummary> {
        let state = self.state();
        if state != InspectionState::Idle {
            return Err(InspectError::AlreadyStarted {
                state: state.to_string(),
            });
        }

        let span = self.span.clone();
        Ok(self.run().instrument(span).await)
    }

    async fn run(&mut self) -> RunSummary {
        let started = Instant::now();
        self.set_state(InspectionState::Running);
        tracing::info!("Starting inspection run");

        let (bad_tx, mut bad_rx) = mpsc::channel::<BadCertEvent>(self.event_buffer);
        let (fail_tx, mut fail_rx) = mpsc::channel::<FailedHealthcheckEvent>(self.event_buffer);

        let mut jobs = self.spawn_jobs(bad_tx, fail_tx);

        let mut summary = RunSummary::default();
        let mut notifications = RouteOutcome::default();

        loop {
            tokio::select! {
                biased;

                Some(joined) = jobs.join_next() => {
                    record_job(joined, &mut summary);
                    if jobs.is_empty() {
                        // No producers left; only buffered events remain
                        self.set_state(InspectionState::Draining);
                    }
                }
                Some(event) = bad_rx.recv() => {
                    summary.bad_cert_events += 1;
                    notifications.merge(self.router.route_bad_cert(&event).await);
                }
                Some(event) = fail_rx.recv() => {
                    summary.failed_healthcheck_events += 1;
                    notifications.merge(self.router.route_failed_healthcheck(&event).await);
                }
                else => break,
            }
        }

        summary.notifications_sent = notifications.sent;
        summary.notifications_failed = notifications.failed;
        summary.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.set_state(InspectionState::Done);
        tracing::info!("Inspection run finished: {}", summary);

        summary
    }

    /// Spawn the four jobs. The senders move into the checking jobs, so the
    /// event channels close when those jobs and their workers are done.
    fn spawn_jobs(
        &self,
        bad_tx: mpsc::Sender<BadCertEvent>,
        fail_tx: mpsc::Sender<FailedHealthcheckEvent>,
    ) -> JoinSet<Option<JobReport>> {
        let mut jobs = JoinSet::new();

        let cert_job = check_domains(
            Arc::clone(&self.domains),
            Arc::clone(&self.cert_checker),
            bad_tx,
            self.max_workers,
            self.span.clone(),
        );
        jobs.spawn(
            async move {
                contain_panic("Cert check job", cert_job)
                    .await
                    .map(JobReport::CertChecks)
            }
            .instrument(self.span.clone()),
        );

        let endpoint_job = check_endpoints(
            Arc::clone(&self.endpoints),
            Arc::clone(&self.endpoint_checker),
            fail_tx,
            self.max_workers,
            self.span.clone(),
        );
        jobs.spawn(
            async move {
                contain_panic("Healthcheck job", endpoint_job)
                    .await
                    .map(JobReport::Healthchecks)
            }
            .instrument(self.span.clone()),
        );

        let domains = Arc::clone(&self.domains);
        let retention = self.retention;
        jobs.spawn(
            async move {
                let cleanup = async {
                    log_cleanup(
                        "cert checks",
                        remove_expired_history("cert checks", domains.as_ref(), retention).await,
                    )
                };
                contain_panic("Cert check cleanup job", cleanup)
                    .await
                    .map(JobReport::CertCleanup)
            }
            .instrument(self.span.clone()),
        );

        let endpoints = Arc::clone(&self.endpoints);
        jobs.spawn(
            async move {
                let cleanup = async {
                    log_cleanup(
                        "healthchecks",
                        remove_expired_history("healthchecks", endpoints.as_ref(), retention)
                            .await,
                    )
                };
                contain_panic("Healthcheck cleanup job", cleanup)
                    .await
                    .map(JobReport::HealthcheckCleanup)
            }
            .instrument(self.span.clone()),
        );

        jobs
    }
}

async fn check_domains(
    repository: Arc<DomainRepository>,
    checker: Arc<CertChecker>,
    events: mpsc::Sender<BadCertEvent>,
    max_workers: usize,
    span: Span,
) -> CheckJobReport {
    let domains = match repository.get_all().await {
        Ok(domains) => domains,
        Err(e) => {
            tracing::error!("Failed to load domains: {}", e);
            return CheckJobReport::load_failed();
        }
    };

    tracing::info!("Domains to check: {}", domains.len());

    let pool = WorkerPool::with_span(domains.len().min(max_workers), span);
    for domain in domains {
        let checker = Arc::clone(&checker);
        let events = events.clone();
        pool.add(async move {
            checker.check(&domain, &events).await;
        })
        .await;
    }
    drop(events);

    let report = pool.wait().await;
    CheckJobReport {
        checked: report.completed.saturating_sub(report.panicked),
        panicked: report.panicked,
        load_failed: false,
    }
}

async fn check_endpoints(
    repository: Arc<EndpointRepository>,
    checker: Arc<EndpointChecker>,
    events: mpsc::Sender<FailedHealthcheckEvent>,
    max_workers: usize,
    span: Span,
) -> CheckJobReport {
    let endpoints = match repository.get_all().await {
        Ok(endpoints) => endpoints,
        Err(e) => {
            tracing::error!("Failed to load endpoints: {}", e);
            return CheckJobReport::load_failed();
        }
    };

    tracing::info!("Endpoints to check: {}", endpoints.len());

    let pool = WorkerPool::with_span(endpoints.len().min(max_workers), span);
    for endpoint in endpoints {
        let checker = Arc::clone(&checker);
        let events = events.clone();
        pool.add(async move {
            checker.check(&endpoint, &events).await;
        })
        .await;
    }
    drop(events);

    let report = pool.wait().await;
    CheckJobReport {
        checked: report.completed.saturating_sub(report.panicked),
        panicked: report.panicked,
        load_failed: false,
    }
}

fn log_cleanup(label: &str, result: Result<u64>) -> Option<u64> {
    match result {
        Ok(removed) => Some(removed),
        Err(e) => {
            tracing::error!("Failed to remove old {}: {}", label, e);
            None
        }
    }
}

fn record_job(joined: std::result::Result<Option<JobReport>, JoinError>, summary: &mut RunSummary) {
    match joined {
        Ok(Some(JobReport::CertChecks(report))) => {
            summary.domains_checked = report.checked;
            summary.panicked_units += report.panicked;
            if report.load_failed {
                summary.failed_jobs += 1;
            }
        }
        Ok(Some(JobReport::Healthchecks(report))) => {
            summary.endpoints_checked = report.checked;
            summary.panicked_units += report.panicked;
            if report.load_failed {
                summary.failed_jobs += 1;
            }
        }
        Ok(Some(JobReport::CertCleanup(removed))) => match removed {
            Some(removed) => summary.cert_checks_removed = removed,
            None => summary.failed_jobs += 1,
        },
        Ok(Some(JobReport::HealthcheckCleanup(removed))) => match removed {
            Some(removed) => summary.healthchecks_removed = removed,
            None => summary.failed_jobs += 1,
        },
        Ok(None) => {
            // Panic already logged by contain_panic
            summary.panicked_units += 1;
            summary.failed_jobs += 1;
        }
        Err(e) => {
            tracing::error!("Inspection job failed: {}", e);
            summary.failed_jobs += 1;
        }
    }
}
