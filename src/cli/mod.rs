// CLI module - Command line interface and argument parsing
// Copyright (C) 2025 certwatch contributors
// Licensed under GPL-3.0

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// certwatch - Periodic TLS certificate and HTTP endpoint inspection
///
/// Runs one inspection pass over every registered domain and endpoint, then
/// exits. Meant to be launched by an external scheduler such as cron.
#[derive(Parser, Debug, Clone)]
#[command(author, about, long_about = None)]
#[command(name = "certwatch")]
pub struct Args {
    /// Configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "FILE", default_value = "certwatch.toml")]
    pub config: PathBuf,

    /// Write an example configuration to FILE and exit
    #[arg(long = "config-example", value_name = "FILE")]
    pub config_example: Option<PathBuf>,

    /// Refuse to run while another run holds this lock file
    #[arg(long = "lock-file", value_name = "FILE")]
    pub lock_file: Option<PathBuf>,

    /// Age in seconds after which an existing lock file is taken over
    #[arg(long = "lock-stale-seconds", value_name = "SECONDS", default_value_t = 600)]
    pub lock_stale_seconds: u64,

    /// Display version information and exit
    #[arg(long = "version", short = 'V')]
    pub version: bool,
}

impl Args {
    /// Validate CLI arguments for logical consistency
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.lock_file.is_some() && self.lock_stale_seconds == 0 {
            anyhow::bail!("--lock-stale-seconds must be greater than zero when --lock-file is set");
        }

        Ok(())
    }

    pub fn lock_stale_after(&self) -> Duration {
        Duration::from_secs(self.lock_stale_seconds)
    }
}
