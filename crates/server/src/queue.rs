// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded job queue with non-blocking admission.
//!
//! Admission is an O(1) `try_send` into a channel of `MAX_QUEUED_JOBS`
//! capacity. The dispatch loop takes a concurrency permit *before*
//! dequeuing, so a full pool never drains the queue early and FIFO
//! dispatch order is preserved.

use std::future::Future;
use std::sync::Arc;

use platen_backends::PageResource;
use platen_core::{Config, ConvertError, Health, HealthBoard};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Semaphore};

/// One admitted conversion request, bound to its response sink.
pub struct Job {
    pub input: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    /// Client-supplied explicit type hint.
    pub requested_type: Option<String>,
    pub resources: Vec<PageResource>,
    /// Exactly one response is sent per admitted job.
    pub respond_to: oneshot::Sender<Result<Vec<u8>, ConvertError>>,
}

/// Admission handle. Cheap to clone.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Job>,
}

impl JobQueue {
    /// Start the dispatch loop; `runner` executes one job to completion.
    pub fn start<F, Fut>(config: &Config, health: HealthBoard, runner: F) -> Self
    where
        F: Fn(Job) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(config.max_queued_jobs);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs));
        tokio::spawn(dispatch_loop(rx, semaphore, runner));
        health.set_job_queue(Health::Healthy);
        Self { tx }
    }

    /// Admit a job, or reject immediately when the queue is full.
    pub fn admit(&self, job: Job) -> Result<(), ConvertError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ConvertError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(ConvertError::internal("job queue is gone")),
        }
    }
}

async fn dispatch_loop<F, Fut>(
    mut rx: mpsc::Receiver<Job>,
    semaphore: Arc<Semaphore>,
    runner: F,
) where
    F: Fn(Job) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    loop {
        // Permit first: a job is only dequeued once it can actually run.
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(_closed) => return,
        };
        let Some(job) = rx.recv().await else {
            return;
        };
        let fut = runner(job);
        tokio::spawn(async move {
            let _permit = permit;
            fut.await;
        });
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
