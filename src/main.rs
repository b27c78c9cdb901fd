// certwatch - Periodic TLS certificate and HTTP endpoint inspection
// Copyright (C) 2025 certwatch contributors
// Licensed under GPL-3.0
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, version 3.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.

use anyhow::{Context, Result};
use certwatch::db::CertwatchDatabase;
use certwatch::inspector::{
    CertChecker, EndpointChecker, InspectorConfig, NotificationRouter, ReqwestProber,
    RustlsProber,
};
use certwatch::notify::{DisabledNotifier, EmailNotifier, Notifier, WebhookNotifier};
use certwatch::utils::RunLock;
use certwatch::{Args, Inspector};
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - respect RUST_LOG environment variable
    let log_level = std::env::var("RUST_LOG")
        .ok()
        .and_then(|s| s.parse::<Level>().ok())
        .unwrap_or(Level::INFO);

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // reqwest and the TLS prober share the ring provider
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let args = Args::parse();
    args.validate()?;

    if args.version {
        println!("certwatch v{}", env!("CARGO_PKG_VERSION"));
        println!("Periodic TLS certificate and HTTP endpoint inspection");
        println!("Licensed under GPL-3.0");
        return Ok(());
    }

    if let Some(path) = &args.config_example {
        InspectorConfig::create_example(path)?;
        println!("Example configuration saved to: {}", path.display());
        return Ok(());
    }

    let _lock = match &args.lock_file {
        Some(path) => match RunLock::acquire(path, args.lock_stale_after())? {
            Some(lock) => Some(lock),
            None => {
                info!("Another inspection run is already in progress, exiting");
                return Ok(());
            }
        },
        None => None,
    };

    let config = InspectorConfig::from_file(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    let database = CertwatchDatabase::new(&config.database)
        .await
        .context("Failed to open database")?;

    let settings = &config.inspector;
    let span = tracing::info_span!("inspection", run = %uuid::Uuid::new_v4());

    let email: Arc<dyn Notifier> = match &config.notifications.email {
        Some(email) if email.enabled => Arc::new(EmailNotifier::new(email.clone())?),
        _ => Arc::new(DisabledNotifier::new("email")),
    };
    let webhook: Arc<dyn Notifier> = Arc::new(WebhookNotifier::new(Duration::from_secs(
        config.notifications.webhook.timeout_seconds,
    ))?);
    info!("Notification channels: {}", config.enabled_channels().join(", "));

    let router = NotificationRouter::new(database.preferences(), email, webhook)?;

    let cert_checker = Arc::new(CertChecker::new(
        Arc::new(RustlsProber::new(settings.network_timeout(), settings.tls_port)?),
        database.domains(),
        settings.cert_expiry_threshold(),
        span.clone(),
    ));
    let endpoint_checker = Arc::new(EndpointChecker::new(
        Arc::new(ReqwestProber::new(settings.network_timeout())?),
        database.endpoints(),
        span.clone(),
    ));

    let mut inspector = Inspector::new(
        database.domains(),
        database.endpoints(),
        cert_checker,
        endpoint_checker,
        router,
        settings,
        span,
    );

    let summary = inspector.start().await?;
    info!(
        "Checked {} domains and {} endpoints in {}ms",
        summary.domains_checked, summary.endpoints_checked, summary.elapsed_ms
    );

    database.close().await;

    Ok(())
}
