// Endpoint Checker - HTTP healthchecks with latency tracking

use crate::Result;
use crate::db::models::{Endpoint, Healthcheck};
use crate::db::traits::EndpointRepository;
use crate::inspector::types::{FailedHealthcheckEvent, UNREACHABLE_STATUS};
use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{Instrument, Span};

/// Network side of the healthcheck
#[async_trait]
pub trait HttpProber: Send + Sync {
    /// GET `url` and return the response status, or a description of the
    /// transport error
    async fn get(&self, url: &str) -> std::result::Result<u16, String>;
}

/// HTTP prober sharing one reqwest client across all workers
pub struct ReqwestProber {
    client: reqwest::Client,
}

impl ReqwestProber {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("certwatch/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpProber for ReqwestProber {
    async fn get(&self, url: &str) -> std::result::Result<u16, String> {
        let response = self.client.get(url).send().await.map_err(|e| e.to_string())?;
        let status = response.status().as_u16();

        // Drain the body so the connection is released
        if let Err(e) = response.bytes().await {
            tracing::debug!("Failed to drain response body from \"{}\": {}", url, e);
        }

        Ok(status)
    }
}

/// Whether `actual` should be reported against the endpoint's expected code
pub fn is_failure(actual: u16, expected: i32) -> bool {
    actual == UNREACHABLE_STATUS || i32::from(actual) != expected
}

/// Checks one endpoint: request, persist latency and status, then report
/// unexpected statuses
pub struct EndpointChecker {
    prober: Arc<dyn HttpProber>,
    repository: Arc<EndpointRepository>,
    span: Span,
}

impl EndpointChecker {
    pub fn new(prober: Arc<dyn HttpProber>, repository: Arc<EndpointRepository>, span: Span) -> Self {
        Self {
            prober,
            repository,
            span,
        }
    }

    /// Check one endpoint and return the recorded status code
    pub async fn check(
        &self,
        endpoint: &Endpoint,
        events: &mpsc::Sender<FailedHealthcheckEvent>,
    ) -> u16 {
        self.check_inner(endpoint, events)
            .instrument(self.span.clone())
            .await
    }

    async fn check_inner(
        &self,
        endpoint: &Endpoint,
        events: &mpsc::Sender<FailedHealthcheckEvent>,
    ) -> u16 {
        tracing::info!("Pinging \"{}\"", endpoint.url);

        let started = Instant::now();
        let status = match self.prober.get(&endpoint.url).await {
            Ok(status) => status,
            Err(reason) => {
                tracing::warn!("Request to \"{}\" failed: {}", endpoint.url, reason);
                UNREACHABLE_STATUS
            }
        };
        let took_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
        let now = Utc::now();

        let check = Healthcheck::new(&endpoint.id, status, took_ms, now);
        if let Err(e) = self.repository.save_check(&check).await {
            tracing::error!("Failed to save healthcheck for \"{}\": {}", endpoint.url, e);
            return status;
        }

        if is_failure(status, endpoint.success_code) {
            let event = FailedHealthcheckEvent {
                endpoint_id: endpoint.id.clone(),
                check_id: check.id.clone(),
                url: endpoint.url.clone(),
                expected_code: u16::try_from(endpoint.success_code).unwrap_or_default(),
                actual_code: status,
                time: now,
            };

            if events.send(event).await.is_err() {
                tracing::error!(
                    "Failed healthcheck event for \"{}\" dropped: event loop closed",
                    endpoint.url
                );
            }
        }

        status
    }
}
