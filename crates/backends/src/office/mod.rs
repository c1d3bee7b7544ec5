// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervised pool of office worker processes.
//!
//! Each worker is bound to a fixed port for its whole life; only its
//! underlying backend process dies and respawns. Workers are fully
//! independent — one worker's crash never touches another.

mod worker;

use std::sync::Arc;

use platen_core::{Config, ConvertError, HealthBoard};

pub use worker::OfficeWorker;

/// The pool of office workers, in stable port order.
#[derive(Clone)]
pub struct OfficePool {
    workers: Arc<Vec<Arc<OfficeWorker>>>,
}

impl OfficePool {
    /// Create the workers and spawn one supervisor task per worker.
    pub fn start(config: Arc<Config>, health: HealthBoard) -> Self {
        let workers: Vec<Arc<OfficeWorker>> = config
            .office_ports()
            .into_iter()
            .map(|port| OfficeWorker::new(port, Arc::clone(&config), health.clone()))
            .collect();
        for worker in &workers {
            tokio::spawn(Arc::clone(worker).supervise());
        }
        Self {
            workers: Arc::new(workers),
        }
    }

    /// Claim the first available worker in port order.
    ///
    /// The claim is a compare-and-set on the worker's availability flag,
    /// so two dispatchers can never win the same worker.
    pub fn try_claim(&self) -> Option<OfficeLease> {
        self.workers
            .iter()
            .find(|worker| worker.try_claim())
            .map(|worker| OfficeLease {
                worker: Arc::clone(worker),
            })
    }

    /// Convert `input` on the first available worker.
    ///
    /// Admission already happened at the queue; an exhausted pool is an
    /// overload condition, not queue-full.
    pub async fn convert(&self, input: &[u8]) -> Result<Vec<u8>, ConvertError> {
        let lease = self.try_claim().ok_or(ConvertError::Overload)?;
        lease.convert(input).await
    }

    #[cfg(test)]
    pub(crate) fn workers(&self) -> &[Arc<OfficeWorker>] {
        &self.workers
    }
}

/// An exclusive claim on one worker; released on drop.
pub struct OfficeLease {
    worker: Arc<OfficeWorker>,
}

impl OfficeLease {
    /// Run one conversion on the claimed worker.
    pub async fn convert(self, input: &[u8]) -> Result<Vec<u8>, ConvertError> {
        self.worker.convert_claimed(input).await
        // Drop releases the claim.
    }

    #[cfg(test)]
    pub(crate) fn port(&self) -> u16 {
        self.worker.port()
    }
}

impl Drop for OfficeLease {
    fn drop(&mut self) {
        self.worker.release();
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
