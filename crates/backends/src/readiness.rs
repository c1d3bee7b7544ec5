// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem readiness detection for launching backends.
//!
//! An office worker is ready once its pid file and its user-profile
//! directory both exist. A `notify` watcher on the temp root wakes the
//! wait early; a coarse poll covers platforms where the watcher cannot
//! be created.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use thiserror::Error;
use tokio::sync::mpsc;

/// Poll fallback interval while waiting for paths to appear.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum ReadinessError {
    #[error("paths did not appear within {}s: {missing:?}", timeout.as_secs())]
    Timeout {
        timeout: Duration,
        missing: Vec<PathBuf>,
    },
}

/// Wait until every path in `paths` exists, or the timeout elapses.
///
/// `watch_root` must be a directory containing the awaited paths (they
/// are created directly beneath it).
pub async fn await_paths(
    watch_root: &Path,
    paths: &[&Path],
    timeout: Duration,
) -> Result<(), ReadinessError> {
    let (tx, mut rx) = mpsc::channel::<()>(32);

    // Keep the watcher alive for the duration of the wait.
    let _watcher = match notify::recommended_watcher(move |_event| {
        // Wake the waiter; a full channel means it is already awake.
        let _ = tx.try_send(());
    }) {
        Ok(mut watcher) => match watcher.watch(watch_root, RecursiveMode::NonRecursive) {
            Ok(()) => Some(watcher),
            Err(err) => {
                tracing::warn!(error = %err, "file watcher failed, using fallback polling");
                None
            }
        },
        Err(err) => {
            tracing::warn!(error = %err, "file watcher failed, using fallback polling");
            None
        }
    };

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    let wait = async {
        loop {
            if paths.iter().all(|p| p.exists()) {
                return;
            }
            tokio::select! {
                _ = rx.recv() => {}
                _ = poll.tick() => {}
            }
        }
    };

    match tokio::time::timeout(timeout, wait).await {
        Ok(()) => Ok(()),
        Err(_elapsed) => Err(ReadinessError::Timeout {
            timeout,
            missing: paths
                .iter()
                .filter(|p| !p.exists())
                .map(|p| p.to_path_buf())
                .collect(),
        }),
    }
}

#[cfg(test)]
#[path = "readiness_tests.rs"]
mod tests;
