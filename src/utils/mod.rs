// Utils module - Utility functions

pub mod run_lock;

pub use run_lock::{DEFAULT_STALE_AFTER, RunLock};
