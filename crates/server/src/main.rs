// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! platend — the platen conversion gateway daemon.
//!
//! Accepts document uploads over HTTP and returns PDFs, multiplexing
//! requests onto supervised converter backends:
//! - a pool of office worker processes (one per concurrency slot)
//! - a single headless browser with hot-swap restarts
//! - an optional per-job markup converter

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod dispatch;
mod http;
mod queue;

use std::sync::Arc;

use platen_backends::{BrowserSupervisor, MarkupConverter, OfficePool};
use platen_core::{Config, Health, HealthBoard};
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::dispatch::Backends;
use crate::http::AppState;
use crate::queue::JobQueue;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    setup_logging();

    let config = Arc::new(Config::load()?);
    info!(
        port = config.webserver_port,
        concurrency = config.max_concurrent_jobs,
        queue = config.max_queued_jobs,
        markup = config.markup_enabled(),
        "starting conversion gateway"
    );

    let health = HealthBoard::new(config.markup_enabled(), &config.office_ports());

    let office = OfficePool::start(Arc::clone(&config), health.clone());
    let browser = BrowserSupervisor::start(Arc::clone(&config), health.clone());
    let markup = MarkupConverter::from_config(&config);
    if let Some(converter) = markup.clone() {
        let health = health.clone();
        tokio::spawn(async move {
            let status = if converter.probe().await {
                Health::Healthy
            } else {
                error!("markup converter probe failed");
                Health::Unhealthy
            };
            health.set_pandoc(status);
        });
    }

    let backends = Arc::new(Backends {
        office,
        browser,
        markup,
    });
    let queue = JobQueue::start(&config, health.clone(), move |job| {
        dispatch::run_job(job, Arc::clone(&backends))
    });

    let state = AppState {
        config: Arc::clone(&config),
        queue,
        health: health.clone(),
    };
    let app = http::router(state);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.webserver_port)).await?;
    health.set_webserver(Health::Healthy);
    info!(port = config.webserver_port, "gateway ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sig) => sig,
        Err(err) => {
            error!(error = %err, "failed to install SIGTERM handler");
            return std::future::pending().await;
        }
    };
    let mut sigint = match signal(SignalKind::interrupt()) {
        Ok(sig) => sig,
        Err(err) => {
            error!(error = %err, "failed to install SIGINT handler");
            return std::future::pending().await;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        _ = sigint.recv() => info!("Received SIGINT, shutting down..."),
    }
}

fn setup_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
}
