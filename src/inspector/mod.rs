// Inspection core
//
// cert / endpoint: per-target checkers
// pool: bounded worker pool shared by both checking jobs
// router: event to notification fan-out
// orchestrator: the run itself

pub mod cert;
pub mod cleanup;
pub mod config;
pub mod endpoint;
pub mod orchestrator;
pub mod pool;
pub mod router;
pub mod types;

pub use cert::{CertChecker, CertProbe, CertProber, RustlsProber, classify};
pub use config::{EmailConfig, InspectorConfig, InspectorSettings};
pub use endpoint::{EndpointChecker, HttpProber, ReqwestProber};
pub use orchestrator::Inspector;
pub use pool::{PoolReport, WorkerPool, contain_panic};
pub use router::{NotificationRouter, RouteOutcome};
pub use types::{
    BadCertEvent, CertStatus, FailedHealthcheckEvent, InspectionState, RunSummary,
    UNREACHABLE_STATUS,
};
