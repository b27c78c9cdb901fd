// Database Models Module
// Re-exports all database model types

pub mod domain;
pub mod endpoint;
pub mod preference;

pub use domain::{CertCheck, Domain};
pub use endpoint::{Endpoint, Healthcheck};
pub use preference::{ChannelKind, NotificationPreference};
