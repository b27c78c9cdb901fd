// Notification Router - fans one event out to the owner's enabled channels

use crate::db::models::{ChannelKind, NotificationPreference};
use crate::db::traits::{PreferenceRepository, TargetRef};
use crate::inspector::types::{BadCertEvent, FailedHealthcheckEvent};
use crate::notify::{AlertTemplate, EmailTemplates, Message, Notifier};
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Delivery counts for one routed event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteOutcome {
    pub sent: usize,
    pub failed: usize,
}

impl RouteOutcome {
    pub fn merge(&mut self, other: RouteOutcome) {
        self.sent += other.sent;
        self.failed += other.failed;
    }
}

/// Routes inspection events to email and webhook notifiers
pub struct NotificationRouter {
    preferences: Arc<dyn PreferenceRepository>,
    email: Arc<dyn Notifier>,
    webhook: Arc<dyn Notifier>,
    templates: EmailTemplates,
}

impl NotificationRouter {
    /// Build the router, registering the email templates
    pub fn new(
        preferences: Arc<dyn PreferenceRepository>,
        email: Arc<dyn Notifier>,
        webhook: Arc<dyn Notifier>,
    ) -> Result<Self> {
        Ok(Self {
            preferences,
            email,
            webhook,
            templates: EmailTemplates::new()?,
        })
    }

    pub async fn route_bad_cert(&self, event: &BadCertEvent) -> RouteOutcome {
        let Some(preferences) = self.lookup(TargetRef::Domain(&event.domain_id)).await else {
            return RouteOutcome::default();
        };

        let data = json!({
            "domain": event.domain,
            "status": event.status.to_string(),
            "expiry": event
                .expiry
                .map(format_time)
                .unwrap_or_else(|| "unknown".to_string()),
            "time": format_time(event.time),
        });
        let text = format!(
            "Trouble with certificate for domain \"{}\": {}.",
            event.domain, event.status
        );

        self.dispatch(&preferences, AlertTemplate::Cert, &data, &text)
            .await
    }

    pub async fn route_failed_healthcheck(&self, event: &FailedHealthcheckEvent) -> RouteOutcome {
        let Some(preferences) = self.lookup(TargetRef::Endpoint(&event.endpoint_id)).await else {
            return RouteOutcome::default();
        };

        let data = json!({
            "url": event.url,
            "expected": event.expected_code,
            "actual": event.actual_code,
            "time": format_time(event.time),
        });
        let text = format!(
            "Endpoint \"{}\" is unhealthy. Want: {}, got: {}.",
            event.url, event.expected_code, event.actual_code
        );

        self.dispatch(&preferences, AlertTemplate::Healthcheck, &data, &text)
            .await
    }

    /// Enabled preferences for the target's owner, `None` if there is nothing to do
    async fn lookup(&self, target: TargetRef<'_>) -> Option<Vec<NotificationPreference>> {
        match self.preferences.get_enabled_by_owner(target).await {
            Ok(preferences) if preferences.is_empty() => {
                tracing::info!("User does not have any notification preferences set");
                None
            }
            Ok(preferences) => Some(preferences),
            Err(e) => {
                tracing::error!("Failed to load notification preferences for {:?}: {}", target, e);
                None
            }
        }
    }

    async fn dispatch(
        &self,
        preferences: &[NotificationPreference],
        template: AlertTemplate,
        data: &serde_json::Value,
        text: &str,
    ) -> RouteOutcome {
        let mut outcome = RouteOutcome::default();

        for preference in preferences.iter().filter(|p| p.enabled) {
            let (notifier, message): (&dyn Notifier, Message) = match preference.channel_kind() {
                Some(ChannelKind::Email) => match self.templates.render(template, data) {
                    Ok(email) => (
                        self.email.as_ref(),
                        Message::new(&preference.recipient, email.subject, email.body),
                    ),
                    Err(e) => {
                        tracing::error!("Failed to render {} email: {}", template.name(), e);
                        outcome.failed += 1;
                        continue;
                    }
                },
                Some(ChannelKind::Slack) => (
                    self.webhook.as_ref(),
                    Message::new(&preference.recipient, "", text),
                ),
                None => {
                    tracing::info!(
                        "Skipping unsupported notification channel \"{}\"",
                        preference.channel
                    );
                    continue;
                }
            };

            match notifier.notify(&message).await {
                Ok(()) => outcome.sent += 1,
                Err(e) => {
                    tracing::error!(
                        "Failed to send {} notification to \"{}\": {}",
                        notifier.channel_name(),
                        message.to,
                        e
                    );
                    outcome.failed += 1;
                }
            }
        }

        outcome
    }
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format(TIME_FORMAT).to_string()
}
