// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Headless browser supervision with reference-counted hot-swap.
//!
//! One Chromium instance serves all HTML conversions. It is restarted
//! on a schedule and on crash; in both cases a fresh holder replaces
//! the current one and the predecessor drains its outstanding renders
//! before teardown.

mod holder;
mod render;

use std::sync::Arc;
use std::time::Instant;

use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use parking_lot::Mutex;
use platen_core::{BackendKind, Config, ConvertError, Health, HealthBoard, RestartBudget};
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

pub use holder::{BrowserHolder, BrowserRef};
pub use render::PageResource;

use render::RenderContext;

/// Launch flags: no GPU, no extensions, no translation, no /dev/shm,
/// no crash UI. The sandbox is disabled through the config builder.
const BROWSER_ARGS: [&str; 5] = [
    "--disable-gpu",
    "--disable-extensions",
    "--disable-features=Translate",
    "--disable-dev-shm-usage",
    "--noerrdialogs",
];

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser config: {0}")]
    Config(String),
    #[error(transparent)]
    Cdp(#[from] chromiumoxide::error::CdpError),
    #[error("browser launch timed out")]
    LaunchTimeout,
    #[error("browser instance already collected")]
    Collected,
}

struct Shared {
    config: Arc<Config>,
    health: HealthBoard,
    current: Mutex<Option<Arc<BrowserHolder>>>,
}

/// Handle to the supervised browser. Cheap to clone.
#[derive(Clone)]
pub struct BrowserSupervisor {
    shared: Arc<Shared>,
}

impl BrowserSupervisor {
    /// Spawn the supervisor task and return the handle.
    pub fn start(config: Arc<Config>, health: HealthBoard) -> Self {
        let supervisor = Self {
            shared: Arc::new(Shared {
                config,
                health,
                current: Mutex::new(None),
            }),
        };
        tokio::spawn(supervisor.clone().run());
        supervisor
    }

    /// Render `input` (HTML) to PDF with its enumerated resources.
    pub async fn convert(
        &self,
        input: Vec<u8>,
        resources: Vec<PageResource>,
    ) -> Result<Vec<u8>, ConvertError> {
        let holder = self
            .shared
            .current
            .lock()
            .clone()
            .ok_or_else(|| unavailable("browser is not running"))?;
        let reference = holder
            .acquire()
            .ok_or_else(|| unavailable("browser is restarting"))?;

        let token = Uuid::new_v4().simple().to_string();
        let ctx = Arc::new(RenderContext::new(&token, input, resources));

        let page = reference.new_page().await.map_err(|err| ConvertError::Backend {
            backend: BackendKind::Browser,
            code: None,
            stderr: err.to_string(),
        })?;

        let deadline = self.shared.config.pdf_render_timeout;
        let result = match tokio::time::timeout(deadline, render::render_on_page(&page, ctx)).await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(ConvertError::Timeout {
                backend: BackendKind::Browser,
            }),
        };

        if let Err(err) = page.close().await {
            tracing::warn!(error = %err, "failed to close page");
        }
        drop(reference);
        result
    }

    async fn run(self) {
        let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel::<u64>();
        let mut budget = RestartBudget::new(
            self.shared.config.max_restarts,
            self.shared.config.restart_window(),
        );
        let mut generation: u64 = 0;

        if !self
            .launch_until_up(&mut budget, &mut generation, &disconnect_tx)
            .await
        {
            return;
        }

        // Scheduled restart timer, installed once after the first
        // successful start.
        let interval = self.shared.config.browser_restart_interval;
        let mut restart_tick =
            tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);

        loop {
            tokio::select! {
                Some(gen) = disconnect_rx.recv() => {
                    let superseded = {
                        let current = self.shared.current.lock();
                        !matches!(
                            current.as_ref(),
                            Some(holder) if holder.generation() == gen && !holder.is_marked()
                        )
                    };
                    if superseded {
                        // A replaced instance finished draining; the
                        // refcount drives its cleanup.
                        continue;
                    }

                    budget.exited(Instant::now());
                    self.shared.health.set_browser(Health::Unhealthy);
                    tracing::warn!(generation = gen, "browser disconnected");
                    if let Some(holder) = self.shared.current.lock().take() {
                        holder.mark();
                    }

                    tokio::time::sleep(self.shared.config.restart_delay).await;
                    if !self
                        .launch_until_up(&mut budget, &mut generation, &disconnect_tx)
                        .await
                    {
                        return;
                    }
                }
                _ = restart_tick.tick() => {
                    tracing::info!("scheduled browser restart");
                    if !self
                        .launch_until_up(&mut budget, &mut generation, &disconnect_tx)
                        .await
                    {
                        return;
                    }
                }
            }
        }
    }

    /// Start a fresh browser, retrying until the budget runs out.
    ///
    /// On success the new holder is swapped in and the previous one is
    /// marked for collection. Returns false on permanent failure.
    async fn launch_until_up(
        &self,
        budget: &mut RestartBudget,
        generation: &mut u64,
        disconnect_tx: &mpsc::UnboundedSender<u64>,
    ) -> bool {
        loop {
            if let Err(err) = budget.try_begin(Instant::now()) {
                tracing::error!(error = %err, "browser failed permanently");
                self.shared.health.set_browser(Health::Unhealthy);
                return false;
            }
            *generation += 1;

            match self.launch(*generation, disconnect_tx).await {
                Ok(holder) => {
                    budget.started(Instant::now());
                    let previous = self.shared.current.lock().replace(holder);
                    if let Some(previous) = previous {
                        previous.mark();
                    }
                    self.shared.health.set_browser(Health::Healthy);
                    tracing::info!(generation = *generation, "browser ready");
                    return true;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "browser launch failed");
                    tokio::time::sleep(self.shared.config.restart_delay).await;
                }
            }
        }
    }

    async fn launch(
        &self,
        generation: u64,
        disconnect_tx: &mpsc::UnboundedSender<u64>,
    ) -> Result<Arc<BrowserHolder>, BrowserError> {
        let config = &self.shared.config;
        let user_data_dir = config
            .tmp_dir
            .join(format!("browser-{}", Uuid::new_v4().simple()));

        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .user_data_dir(&user_data_dir)
            .args(BROWSER_ARGS.to_vec());
        if let Some(bin) = &config.chromium_bin {
            builder = builder.chrome_executable(bin);
        }
        let browser_config = builder.build().map_err(BrowserError::Config)?;

        let (browser, mut handler) =
            tokio::time::timeout(config.browser_launch_timeout, Browser::launch(browser_config))
                .await
                .map_err(|_| BrowserError::LaunchTimeout)??;

        // Drive CDP messages; the loop ending is the disconnect event.
        let tx = disconnect_tx.clone();
        tokio::spawn(async move {
            while let Some(message) = handler.next().await {
                if message.is_err() {
                    break;
                }
            }
            let _ = tx.send(generation);
        });

        Ok(BrowserHolder::new(
            generation,
            browser,
            user_data_dir,
            config.tmp_dir.clone(),
        ))
    }
}

fn unavailable(detail: &str) -> ConvertError {
    ConvertError::Backend {
        backend: BackendKind::Browser,
        code: None,
        stderr: detail.to_string(),
    }
}
