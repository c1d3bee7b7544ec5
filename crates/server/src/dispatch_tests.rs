// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use platen_core::{Config, HealthBoard};
use tokio::sync::oneshot;

/// Backends whose external binaries do not exist: the office pool has no
/// available worker, the browser never comes up, markup is optional.
fn offline_backends(markup: bool, tmp: &std::path::Path) -> Arc<Backends> {
    let tmp = tmp.display().to_string();
    let mut vars = vec![
        ("UNOSERVER_BIN", "/nonexistent/unoserver".to_string()),
        ("UNOCONVERT_BIN", "/nonexistent/unoconvert".to_string()),
        ("CHROMIUM_BIN", "/nonexistent/chromium".to_string()),
        ("RESTART_DELAY", "60000".to_string()),
        ("MAX_CONCURRENT_JOBS", "1".to_string()),
        ("TMP_DIR", tmp),
    ];
    if markup {
        vars.push(("PANDOC_BIN", "/nonexistent/pandoc".to_string()));
    }
    let config = Arc::new(
        Config::from_lookup(move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        })
        .unwrap(),
    );
    let health = HealthBoard::new(markup, &config.office_ports());
    Arc::new(Backends {
        office: OfficePool::start(Arc::clone(&config), health.clone()),
        browser: BrowserSupervisor::start(Arc::clone(&config), health),
        markup: MarkupConverter::from_config(&config),
    })
}

fn job_for(
    file_name: &str,
    content_type: &str,
    requested: Option<&str>,
    input: &[u8],
) -> (Job, oneshot::Receiver<Result<Vec<u8>, ConvertError>>) {
    let (tx, rx) = oneshot::channel();
    (
        Job {
            input: input.to_vec(),
            file_name: file_name.to_string(),
            content_type: content_type.to_string(),
            requested_type: requested.map(str::to_string),
            resources: Vec::new(),
            respond_to: tx,
        },
        rx,
    )
}

#[tokio::test]
async fn pdf_input_passes_through_byte_identical() {
    let tmp = tempfile::tempdir().unwrap();
    let backends = offline_backends(false, tmp.path());
    let payload = b"%PDF-1.7 fake body".repeat(32);
    let (job, rx) = job_for("doc.pdf", "application/pdf", None, &payload);

    run_job(job, backends).await;
    let output = rx.await.unwrap().unwrap();
    assert_eq!(output, payload);
}

#[tokio::test]
async fn unknown_type_is_unsupported_media() {
    let tmp = tempfile::tempdir().unwrap();
    let backends = offline_backends(false, tmp.path());
    let (job, rx) = job_for("thing.xyz", "application/octet-stream", None, b"??");

    run_job(job, backends).await;
    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedMedia(_)));
}

#[tokio::test]
async fn contradictory_type_is_unsupported_media() {
    let tmp = tempfile::tempdir().unwrap();
    let backends = offline_backends(false, tmp.path());
    let (job, rx) = job_for("note.md", "text/markdown", Some("docx"), b"# hi");

    run_job(job, backends).await;
    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedMedia(_)));
}

#[tokio::test]
async fn office_with_no_available_worker_is_overload() {
    let tmp = tempfile::tempdir().unwrap();
    let backends = offline_backends(false, tmp.path());
    let (job, rx) = job_for("report.docx", "application/octet-stream", None, b"doc");

    run_job(job, backends).await;
    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, ConvertError::Overload));
}

#[tokio::test]
async fn markup_without_converter_is_unsupported_media() {
    let tmp = tempfile::tempdir().unwrap();
    let backends = offline_backends(false, tmp.path());
    let (job, rx) = job_for("note.md", "text/markdown", None, b"# hi");

    run_job(job, backends).await;
    let err = rx.await.unwrap().unwrap_err();
    assert!(matches!(err, ConvertError::UnsupportedMedia(_)));
}

#[tokio::test]
async fn every_job_gets_exactly_one_response() {
    let tmp = tempfile::tempdir().unwrap();
    let backends = offline_backends(false, tmp.path());
    let (job, rx) = job_for("thing.xyz", "application/octet-stream", None, b"??");

    run_job(job, backends).await;
    // One response, then the channel is closed.
    assert!(rx.await.is_ok());
}
