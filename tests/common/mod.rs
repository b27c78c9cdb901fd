// Shared in-memory collaborators for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use certwatch::db::models::*;
use certwatch::db::traits::{PreferenceRepository, TargetRef, TargetRepository};
use certwatch::inspector::{
    CertChecker, CertProbe, CertProber, EndpointChecker, HttpProber, InspectorSettings,
    NotificationRouter,
};
use certwatch::notify::{Message, Notifier};
use certwatch::{InspectError, Inspector, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::Span;

/// Target repository backed by a fixed list
pub struct MemoryRepository<T, C> {
    targets: std::result::Result<Vec<T>, String>,
    pub saved: Mutex<Vec<C>>,
    pub cutoffs: Mutex<Vec<DateTime<Utc>>>,
}

impl<T, C> MemoryRepository<T, C> {
    pub fn with_targets(targets: Vec<T>) -> Self {
        Self {
            targets: Ok(targets),
            saved: Mutex::new(Vec::new()),
            cutoffs: Mutex::new(Vec::new()),
        }
    }

    /// Every `get_all` fails with `message`
    pub fn failing(message: &str) -> Self {
        Self {
            targets: Err(message.to_string()),
            saved: Mutex::new(Vec::new()),
            cutoffs: Mutex::new(Vec::new()),
        }
    }

    pub fn saved_count(&self) -> usize {
        self.saved.lock().unwrap().len()
    }

    pub fn cleanup_count(&self) -> usize {
        self.cutoffs.lock().unwrap().len()
    }
}

#[async_trait]
impl<T, C> TargetRepository for MemoryRepository<T, C>
where
    T: Clone + Send + Sync + 'static,
    C: Clone + Send + Sync + 'static,
{
    type Target = T;
    type Check = C;

    async fn get_all(&self) -> Result<Vec<T>> {
        self.targets.clone().map_err(InspectError::Database)
    }

    async fn save_check(&self, check: &C) -> Result<()> {
        self.saved.lock().unwrap().push(check.clone());
        Ok(())
    }

    async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.cutoffs.lock().unwrap().push(cutoff);
        Ok(0)
    }
}

pub type MemoryDomains = MemoryRepository<Domain, CertCheck>;
pub type MemoryEndpoints = MemoryRepository<Endpoint, Healthcheck>;

/// Returns the same preferences for every target
pub struct FixedPreferences(pub Vec<NotificationPreference>);

#[async_trait]
impl PreferenceRepository for FixedPreferences {
    async fn get_enabled_by_owner(
        &self,
        _target: TargetRef<'_>,
    ) -> Result<Vec<NotificationPreference>> {
        Ok(self.0.iter().filter(|p| p.enabled).cloned().collect())
    }
}

pub fn preference(channel: &str, recipient: &str) -> NotificationPreference {
    NotificationPreference {
        id: 1,
        user_id: "user-1".to_string(),
        channel: channel.to_string(),
        recipient: recipient.to_string(),
        enabled: true,
    }
}

/// Cert prober answering from a per-host table, unreachable otherwise
#[derive(Default)]
pub struct TableProber {
    pub answers: HashMap<String, CertProbe>,
    pub panic_on: Option<String>,
    pub delay: Duration,
    pub active: AtomicUsize,
    pub peak: AtomicUsize,
}

impl TableProber {
    /// Every lookup sleeps for `delay` while counted as in flight
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    /// Lookups for `host` panic
    pub fn panicking_on(host: impl Into<String>) -> Self {
        Self {
            panic_on: Some(host.into()),
            ..Default::default()
        }
    }

    pub fn answer(mut self, host: &str, probe: CertProbe) -> Self {
        self.answers.insert(host.to_string(), probe);
        self
    }
}

#[async_trait]
impl CertProber for TableProber {
    async fn probe(&self, hostname: &str) -> CertProbe {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(active, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        if self.panic_on.as_deref() == Some(hostname) {
            panic!("malformed certificate for {}", hostname);
        }

        self.answers
            .get(hostname)
            .cloned()
            .unwrap_or_else(|| CertProbe::Unreachable {
                reason: "connection refused".to_string(),
            })
    }
}

/// HTTP prober answering every URL with one status
pub struct StatusHttp(pub u16);

#[async_trait]
impl HttpProber for StatusHttp {
    async fn get(&self, _url: &str) -> std::result::Result<u16, String> {
        Ok(self.0)
    }
}

/// Notifier that records every message, optionally sleeping first
#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Message>>,
    pub delay: Duration,
}

impl RecordingNotifier {
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Default::default()
        }
    }

    pub fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, message: &Message) -> Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent.lock().unwrap().push(message.clone());
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "recording"
    }
}

pub fn settings() -> InspectorSettings {
    InspectorSettings::new(
        Duration::from_secs(72 * 3600),
        Duration::from_secs(5),
        Duration::from_secs(30 * 24 * 3600),
    )
}

/// Wires fakes into an `Inspector`
pub struct Harness {
    pub domains: Arc<MemoryDomains>,
    pub endpoints: Arc<MemoryEndpoints>,
    pub email: Arc<RecordingNotifier>,
    pub webhook: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new(domains: MemoryDomains, endpoints: MemoryEndpoints) -> Self {
        Self {
            domains: Arc::new(domains),
            endpoints: Arc::new(endpoints),
            email: Arc::new(RecordingNotifier::default()),
            webhook: Arc::new(RecordingNotifier::default()),
        }
    }

    pub fn with_webhook(mut self, webhook: RecordingNotifier) -> Self {
        self.webhook = Arc::new(webhook);
        self
    }

    pub fn inspector(
        &self,
        cert_prober: Arc<dyn CertProber>,
        http_prober: Arc<dyn HttpProber>,
        preferences: Vec<NotificationPreference>,
        settings: &InspectorSettings,
    ) -> Inspector {
        let router = NotificationRouter::new(
            Arc::new(FixedPreferences(preferences)),
            self.email.clone(),
            self.webhook.clone(),
        )
        .unwrap();

        let cert_checker = Arc::new(CertChecker::new(
            cert_prober,
            self.domains.clone(),
            settings.cert_expiry_threshold(),
            Span::none(),
        ));
        let endpoint_checker = Arc::new(EndpointChecker::new(
            http_prober,
            self.endpoints.clone(),
            Span::none(),
        ));

        Inspector::new(
            self.domains.clone(),
            self.endpoints.clone(),
            cert_checker,
            endpoint_checker,
            router,
            settings,
            Span::none(),
        )
    }
}

pub fn domains(count: usize) -> Vec<Domain> {
    (0..count)
        .map(|i| Domain::new("user-1", format!("host{}.example", i)))
        .collect()
}

pub fn endpoints(count: usize) -> Vec<Endpoint> {
    (0..count)
        .map(|i| Endpoint::new("user-1", format!("https://host{}.example/health", i), 200))
        .collect()
}
