// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job fan-out: resolve the media type, pick a backend, convert.

use std::sync::Arc;

use platen_backends::{BrowserSupervisor, MarkupConverter, OfficePool};
use platen_core::{resolve_media_type, BackendKind, ConvertError};

use crate::queue::Job;

/// The three converter backends plus the identity path.
pub struct Backends {
    pub office: OfficePool,
    pub browser: BrowserSupervisor,
    /// Absent when no markup converter is configured.
    pub markup: Option<MarkupConverter>,
}

/// Execute one admitted job and send its response.
pub async fn run_job(job: Job, backends: Arc<Backends>) {
    let Job {
        input,
        file_name,
        content_type,
        requested_type,
        resources,
        respond_to,
    } = job;

    let result = convert(
        &backends,
        input,
        &file_name,
        &content_type,
        requested_type.as_deref(),
        resources,
    )
    .await;

    if let Err(ref err) = result {
        tracing::warn!(file_name, error = %err, "conversion failed");
    }
    // The receiver may have hung up; the job is still consumed.
    let _ = respond_to.send(result);
}

async fn convert(
    backends: &Backends,
    input: Vec<u8>,
    file_name: &str,
    content_type: &str,
    requested_type: Option<&str>,
    resources: Vec<platen_backends::PageResource>,
) -> Result<Vec<u8>, ConvertError> {
    let media = resolve_media_type(file_name, content_type, requested_type)
        .map_err(|err| ConvertError::UnsupportedMedia(err.to_string()))?;

    tracing::debug!(
        file_name,
        tag = media.tag,
        backend = %media.backend,
        bytes = input.len(),
        "dispatching conversion"
    );

    match media.backend {
        BackendKind::Passthrough => Ok(input),
        BackendKind::Browser => backends.browser.convert(input, resources).await,
        BackendKind::Office => backends.office.convert(&input).await,
        BackendKind::Markup => match &backends.markup {
            Some(converter) => converter.convert(&input, media.tag).await,
            None => Err(ConvertError::UnsupportedMedia(format!(
                "no markup converter configured for {}",
                media.tag
            ))),
        },
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
