// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-page PDF render with request interception.
//!
//! Every conversion gets a fresh random host acting as an origin
//! barrier. The interceptor serves the document and its enumerated
//! resources from memory; everything else is aborted or denied by
//! offline mode. The gateway never fetches on behalf of an upload.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chromiumoxide::cdp::browser_protocol::emulation::SetScriptExecutionDisabledParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, FailRequestParams, FulfillRequestParams,
    HeaderEntry,
};
use chromiumoxide::cdp::browser_protocol::network::{
    EmulateNetworkConditionsParams, ErrorReason, SetCacheDisabledParams,
};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use futures::StreamExt;
use platen_core::{BackendKind, ConvertError};

use crate::encoding;

/// A4 paper, inches.
const A4_WIDTH_IN: f64 = 8.27;
const A4_HEIGHT_IN: f64 = 11.69;

/// An uploaded sub-resource served to the rendering page.
#[derive(Debug, Clone)]
pub struct PageResource {
    /// Original file name; matched against the request path.
    pub name: String,
    /// Declared content type, echoed back verbatim.
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Everything the interceptor needs, fixed for one conversion.
pub(crate) struct RenderContext {
    /// Host URL with trailing slash, e.g. `http://<token>/`.
    pub(crate) host_url: String,
    /// Host origin without trailing slash, used for CORS and initiator
    /// checks.
    pub(crate) origin: String,
    pub(crate) charset: &'static str,
    pub(crate) input: Vec<u8>,
    pub(crate) resources: Vec<PageResource>,
}

impl RenderContext {
    pub(crate) fn new(token: &str, input: Vec<u8>, resources: Vec<PageResource>) -> Self {
        let origin = format!("http://{token}");
        Self {
            host_url: format!("{origin}/"),
            origin,
            charset: encoding::charset_label(&input),
            input,
            resources,
        }
    }
}

/// What to do with one paused request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InterceptDecision {
    /// Serve the uploaded document.
    ServeDocument,
    /// Serve the resource at this index.
    ServeResource(usize),
    /// Cross-origin initiator: abort.
    Abort,
    /// Let it continue; offline mode turns this into a deny.
    Continue,
}

/// Interception rules, evaluated in order.
pub(crate) fn decide(
    ctx: &RenderContext,
    request_url: &str,
    initiator: Option<&str>,
) -> InterceptDecision {
    // 1. The document itself (the navigation has no initiator).
    if request_url == ctx.host_url || request_url == ctx.origin {
        return InterceptDecision::ServeDocument;
    }

    // 2. Origin isolation: only the document may pull sub-resources.
    let from_host = initiator.is_some_and(|url| url.starts_with(&ctx.origin));
    if !from_host {
        return InterceptDecision::Abort;
    }

    // 3. Enumerated resources, matched by name against the path.
    if let Some(path) = request_url.strip_prefix(&ctx.host_url) {
        let name = path.split(['?', '#']).next().unwrap_or("");
        if let Some(index) = ctx.resources.iter().position(|r| r.name == name) {
            return InterceptDecision::ServeResource(index);
        }
    }

    InterceptDecision::Continue
}

/// Configure the page and render the document to PDF.
///
/// The caller owns the deadline and the page close.
pub(crate) async fn render_on_page(
    page: &Page,
    ctx: Arc<RenderContext>,
) -> Result<Vec<u8>, ConvertError> {
    page.execute(SetScriptExecutionDisabledParams::new(true))
        .await
        .map_err(backend_err)?;
    page.execute(SetCacheDisabledParams::new(true))
        .await
        .map_err(backend_err)?;
    let offline = EmulateNetworkConditionsParams::builder()
        .offline(true)
        .latency(0.)
        .download_throughput(-1.)
        .upload_throughput(-1.)
        .build()
        .map_err(ConvertError::Internal)?;
    page.execute(offline).await.map_err(backend_err)?;
    page.execute(fetch::EnableParams::default())
        .await
        .map_err(backend_err)?;

    let mut requests = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(backend_err)?;
    let interceptor_page = page.clone();
    let interceptor_ctx = Arc::clone(&ctx);
    let interceptor = tokio::spawn(async move {
        while let Some(event) = requests.next().await {
            handle_paused(&interceptor_page, &interceptor_ctx, &event).await;
        }
    });

    let rendered = async {
        page.goto(ctx.host_url.as_str()).await?;
        page.wait_for_navigation().await?;
        page.pdf(PrintToPdfParams {
            paper_width: Some(A4_WIDTH_IN),
            paper_height: Some(A4_HEIGHT_IN),
            ..Default::default()
        })
        .await
    }
    .await;
    interceptor.abort();

    rendered.map_err(backend_err)
}

async fn handle_paused(page: &Page, ctx: &RenderContext, event: &EventRequestPaused) {
    let initiator = referer(event);
    let decision = decide(ctx, &event.request.url, initiator.as_deref());

    let outcome = match decision {
        InterceptDecision::ServeDocument => {
            let content_type = format!("text/html;charset={}", ctx.charset);
            fulfill(page, event, &content_type, &ctx.input, &ctx.origin).await
        }
        InterceptDecision::ServeResource(index) => {
            let resource = &ctx.resources[index];
            fulfill(page, event, &resource.content_type, &resource.bytes, &ctx.origin).await
        }
        InterceptDecision::Abort => abort(page, event).await,
        InterceptDecision::Continue => {
            page.execute(ContinueRequestParams::new(event.request_id.clone()))
                .await
                .map(|_| ())
        }
    };

    if let Err(err) = outcome {
        tracing::debug!(
            url = %event.request.url,
            decision = ?decision,
            error = %err,
            "request interception reply failed"
        );
    }
}

/// The CDP pause event carries no initiator; with scripts disabled every
/// sub-resource fetch originates from the document, so its `Referer` is
/// the document URL.
fn referer(event: &EventRequestPaused) -> Option<String> {
    let headers = serde_json::to_value(&event.request.headers).ok()?;
    headers
        .get("Referer")
        .or_else(|| headers.get("referer"))
        .and_then(|value| value.as_str())
        .map(str::to_string)
}

async fn fulfill(
    page: &Page,
    event: &EventRequestPaused,
    content_type: &str,
    body: &[u8],
    origin: &str,
) -> Result<(), chromiumoxide::error::CdpError> {
    let params = FulfillRequestParams::builder()
        .request_id(event.request_id.clone())
        .response_code(200)
        .response_header(HeaderEntry {
            name: "Content-Type".to_string(),
            value: content_type.to_string(),
        })
        .response_header(HeaderEntry {
            name: "Access-Control-Allow-Origin".to_string(),
            value: origin.to_string(),
        })
        .body(BASE64.encode(body))
        .build()
        .map_err(chromiumoxide::error::CdpError::msg)?;
    page.execute(params).await.map(|_| ())
}

async fn abort(
    page: &Page,
    event: &EventRequestPaused,
) -> Result<(), chromiumoxide::error::CdpError> {
    let params = FailRequestParams::builder()
        .request_id(event.request_id.clone())
        .error_reason(ErrorReason::BlockedByClient)
        .build()
        .map_err(chromiumoxide::error::CdpError::msg)?;
    page.execute(params).await.map(|_| ())
}

fn backend_err(err: chromiumoxide::error::CdpError) -> ConvertError {
    ConvertError::Backend {
        backend: BackendKind::Browser,
        code: None,
        stderr: err.to_string(),
    }
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
