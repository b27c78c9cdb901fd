// Core types for an inspection run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synthetic status recorded when an endpoint could not be reached at all
pub const UNREACHABLE_STATUS: u16 = 523;

/// Classification of one certificate check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CertStatus {
    #[serde(rename = "OK")]
    Ok,
    AboutToExpire,
    Expired,
    CannotConnect,
}

impl CertStatus {
    /// Whether this outcome should be reported to the owner
    pub fn is_notifiable(&self) -> bool {
        !matches!(self, CertStatus::Ok)
    }
}

impl fmt::Display for CertStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CertStatus::Ok => write!(f, "OK"),
            CertStatus::AboutToExpire => write!(f, "AboutToExpire"),
            CertStatus::Expired => write!(f, "Expired"),
            CertStatus::CannotConnect => write!(f, "CannotConnect"),
        }
    }
}

impl FromStr for CertStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(CertStatus::Ok),
            "AboutToExpire" => Ok(CertStatus::AboutToExpire),
            "Expired" => Ok(CertStatus::Expired),
            "CannotConnect" => Ok(CertStatus::CannotConnect),
            other => Err(format!("unknown certificate status: {}", other)),
        }
    }
}

/// A certificate outcome worth notifying the domain owner about
#[derive(Debug, Clone, Serialize)]
pub struct BadCertEvent {
    pub domain_id: String,
    pub domain: String,
    pub status: CertStatus,
    pub expiry: Option<DateTime<Utc>>,
    pub time: DateTime<Utc>,
}

/// An endpoint that did not answer with its expected status
#[derive(Debug, Clone, Serialize)]
pub struct FailedHealthcheckEvent {
    pub endpoint_id: String,
    pub check_id: String,
    pub url: String,
    pub expected_code: u16,
    pub actual_code: u16,
    pub time: DateTime<Utc>,
}

/// Lifecycle of an inspection run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InspectionState {
    Idle,
    Running,
    Draining,
    Done,
}

impl fmt::Display for InspectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectionState::Idle => write!(f, "Idle"),
            InspectionState::Running => write!(f, "Running"),
            InspectionState::Draining => write!(f, "Draining"),
            InspectionState::Done => write!(f, "Done"),
        }
    }
}

/// Counters describing one completed run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub domains_checked: usize,
    pub endpoints_checked: usize,
    pub bad_cert_events: usize,
    pub failed_healthcheck_events: usize,
    pub notifications_sent: usize,
    pub notifications_failed: usize,
    pub cert_checks_removed: u64,
    pub healthchecks_removed: u64,
    pub panicked_units: usize,
    pub failed_jobs: usize,
    pub elapsed_ms: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "domains={} endpoints={} bad_certs={} failed_healthchecks={} \
             notified={} notify_failures={} removed_cert_checks={} removed_healthchecks={} \
             panics={} failed_jobs={} elapsed={}ms",
            self.domains_checked,
            self.endpoints_checked,
            self.bad_cert_events,
            self.failed_healthcheck_events,
            self.notifications_sent,
            self.notifications_failed,
            self.cert_checks_removed,
            self.healthchecks_removed,
            self.panicked_units,
            self.failed_jobs,
            self.elapsed_ms
        )
    }
}
