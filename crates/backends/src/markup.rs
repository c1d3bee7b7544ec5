// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-job markup conversion through a pandoc-style process.
//!
//! Unlike the office and browser backends there is no long-lived
//! process: every job spawns its own converter, streams the input over
//! stdin, and reads the PDF from stdout.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use platen_core::{BackendKind, Config, ConvertError};
use tokio::process::Command;

use crate::encoding;
use crate::subprocess::{run_with_input, run_with_timeout, SubprocessError, PROBE_TIMEOUT};

/// Markup converter backend. Present only when a converter binary is
/// configured.
#[derive(Clone)]
pub struct MarkupConverter {
    bin: PathBuf,
    pdf_engine: String,
    timeout: Duration,
}

impl MarkupConverter {
    pub fn from_config(config: &Arc<Config>) -> Option<Self> {
        config.pandoc_bin.as_ref().map(|bin| Self {
            bin: bin.clone(),
            pdf_engine: config.pandoc_pdf_engine.clone(),
            timeout: config.pdf_render_timeout,
        })
    }

    /// Check that the converter binary runs at all.
    pub async fn probe(&self) -> bool {
        let mut cmd = Command::new(&self.bin);
        cmd.arg("--version");
        match run_with_timeout(cmd, PROBE_TIMEOUT, "markup converter probe").await {
            Ok(output) => output.status.success(),
            Err(err) => {
                tracing::warn!(error = %err, "markup converter probe failed");
                false
            }
        }
    }

    /// Convert `input` with the given source-format tag.
    pub async fn convert(&self, input: &[u8], tag: &str) -> Result<Vec<u8>, ConvertError> {
        // The converter expects UTF-8 on stdin.
        let input = encoding::to_utf8(input);

        let mut cmd = Command::new(&self.bin);
        cmd.args(build_args(tag, &self.pdf_engine));

        match run_with_input(cmd, &input, self.timeout, "markup conversion").await {
            Ok(output) if output.status.success() => Ok(output.stdout),
            Ok(output) => Err(ConvertError::Backend {
                backend: BackendKind::Markup,
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }),
            Err(err @ SubprocessError::Timeout { .. }) => {
                tracing::warn!(tag, error = %err, "markup conversion timed out");
                Err(ConvertError::Timeout {
                    backend: BackendKind::Markup,
                })
            }
            Err(err) => Err(ConvertError::internal(err)),
        }
    }
}

/// Arguments for one conversion: source tag, PDF engine, standalone
/// document, stdin to stdout.
fn build_args(tag: &str, pdf_engine: &str) -> Vec<String> {
    vec![
        "--from".to_string(),
        tag.to_string(),
        "--pdf-engine".to_string(),
        pdf_engine.to_string(),
        "--standalone".to_string(),
        "--output".to_string(),
        "-".to_string(),
    ]
}

#[cfg(test)]
#[path = "markup_tests.rs"]
mod tests;
