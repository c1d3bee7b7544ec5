// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reference-counted browser holder with one-shot deferred cleanup.
//!
//! Every restart supersedes the current holder: the old one is marked
//! for collection and torn down once its last reference drains. All
//! three fields (count, marked, cleaned) transition under one mutex so
//! cleanup runs exactly once.

use std::path::PathBuf;
use std::sync::Arc;

use chromiumoxide::{Browser, Page};
use parking_lot::Mutex;
use tokio::sync::Notify;

/// Pure reference-count state machine. `true` returns mean "run the
/// cleanup now" — the caller owns the async teardown.
#[derive(Debug, Default)]
pub(crate) struct RefCount {
    count: u32,
    marked: bool,
    cleaned: bool,
}

impl RefCount {
    /// Take a reference. Fails once marked for collection.
    pub(crate) fn acquire(&mut self) -> bool {
        if self.marked {
            return false;
        }
        self.count += 1;
        true
    }

    /// Drop a reference.
    pub(crate) fn release(&mut self) -> bool {
        self.count = self.count.saturating_sub(1);
        self.should_clean()
    }

    /// Mark for collection; cleanup runs immediately when nobody holds
    /// a reference.
    pub(crate) fn mark(&mut self) -> bool {
        self.marked = true;
        self.should_clean()
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.marked
    }

    fn should_clean(&mut self) -> bool {
        if self.marked && self.count == 0 && !self.cleaned {
            self.cleaned = true;
            return true;
        }
        false
    }
}

/// One live browser instance plus its teardown state.
pub struct BrowserHolder {
    generation: u64,
    user_data_dir: PathBuf,
    tmp_root: PathBuf,
    browser: tokio::sync::Mutex<Option<Browser>>,
    state: Mutex<RefCount>,
    collect: Notify,
}

impl BrowserHolder {
    pub(crate) fn new(
        generation: u64,
        browser: Browser,
        user_data_dir: PathBuf,
        tmp_root: PathBuf,
    ) -> Arc<Self> {
        let holder = Arc::new(Self {
            generation,
            user_data_dir,
            tmp_root,
            browser: tokio::sync::Mutex::new(Some(browser)),
            state: Mutex::new(RefCount::default()),
            collect: Notify::new(),
        });
        // Collector waits for the mark/release transition that elects it.
        let collector = Arc::clone(&holder);
        tokio::spawn(async move {
            collector.collect.notified().await;
            collector.collect_now().await;
        });
        holder
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }

    /// Acquire a reference; `None` once the holder is marked.
    pub fn acquire(self: &Arc<Self>) -> Option<BrowserRef> {
        if self.state.lock().acquire() {
            Some(BrowserRef {
                holder: Arc::clone(self),
            })
        } else {
            None
        }
    }

    /// Mark for collection; triggers cleanup when no references remain.
    pub(crate) fn mark(&self) {
        if self.state.lock().mark() {
            self.collect.notify_one();
        }
    }

    pub(crate) fn is_marked(&self) -> bool {
        self.state.lock().is_marked()
    }

    /// Close the browser and remove its user-data directory.
    async fn collect_now(&self) {
        let browser = self.browser.lock().await.take();
        if let Some(mut browser) = browser {
            if let Err(err) = browser.close().await {
                tracing::warn!(generation = self.generation, error = %err, "browser close failed");
            }
            if let Err(err) = browser.wait().await {
                tracing::debug!(generation = self.generation, error = %err, "browser wait failed");
            }
        }
        // Only ever delete a directory we created under the temp root.
        if self.user_data_dir.starts_with(&self.tmp_root) && self.user_data_dir.is_dir() {
            if let Err(err) = std::fs::remove_dir_all(&self.user_data_dir) {
                tracing::warn!(
                    generation = self.generation,
                    error = %err,
                    "failed to remove browser user-data dir"
                );
            }
        }
        tracing::info!(generation = self.generation, "browser instance collected");
    }
}

/// A live reference to a holder; releasing is the drop.
pub struct BrowserRef {
    holder: Arc<BrowserHolder>,
}

impl BrowserRef {
    /// Open a fresh page on the held browser.
    pub(crate) async fn new_page(&self) -> Result<Page, super::BrowserError> {
        let guard = self.holder.browser.lock().await;
        let browser = guard.as_ref().ok_or(super::BrowserError::Collected)?;
        Ok(browser.new_page("about:blank").await?)
    }
}

impl Drop for BrowserRef {
    fn drop(&mut self) {
        if self.holder.state.lock().release() {
            self.holder.collect.notify_one();
        }
    }
}

#[cfg(test)]
#[path = "holder_tests.rs"]
mod tests;
