// certwatch - Periodic TLS certificate and HTTP endpoint inspection
// Copyright (C) 2025 certwatch contributors
// Licensed under GPL-3.0

//! certwatch inspects a set of registered domains and HTTP endpoints in a
//! single batch run. Every target is probed with bounded concurrency, the
//! outcome is classified and persisted, and notification-worthy outcomes are
//! routed to the owning user's enabled notification channels.

pub mod cli;
pub mod db;
pub mod error;
pub mod inspector;
pub mod notify;
pub mod utils;

// Re-export commonly used types
pub use crate::cli::Args;
pub use crate::error::InspectError;
pub use crate::inspector::{Inspector, InspectorConfig, RunSummary};

/// Result type for certwatch operations
pub type Result<T> = std::result::Result<T, InspectError>;
