// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP surface: the conversion endpoint and the health endpoint.

use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::Multipart;
use platen_backends::PageResource;
use platen_core::{Config, ConvertError, HealthBoard};
use serde_json::json;
use tokio::sync::oneshot;

use crate::queue::{Job, JobQueue};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub queue: JobQueue,
    pub health: HealthBoard,
}

pub fn router(state: AppState) -> Router {
    let body_limit = state.config.max_file_size;
    Router::new()
        .route("/", post(convert).options(convert_options))
        .route("/healthcheck", get(healthcheck).options(healthcheck_options))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Map an error kind to its HTTP status.
fn status_for(err: &ConvertError) -> StatusCode {
    match err {
        ConvertError::Validation(_) => StatusCode::BAD_REQUEST,
        ConvertError::UnsupportedMedia(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
        ConvertError::QueueFull => StatusCode::SERVICE_UNAVAILABLE,
        ConvertError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ConvertError::Backend { .. } => StatusCode::BAD_GATEWAY,
        ConvertError::Overload => StatusCode::BAD_GATEWAY,
        ConvertError::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ConvertError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(err: ConvertError) -> Response {
    (status_for(&err), err.to_string()).into_response()
}

async fn convert(State(state): State<AppState>, mut multipart: Multipart) -> Response {
    let upload = match read_upload(&mut multipart, &state.config).await {
        Ok(upload) => upload,
        Err(err) => return error_response(err),
    };

    let (respond_to, response) = oneshot::channel();
    let job = Job {
        input: upload.input,
        file_name: upload.file_name,
        content_type: upload.content_type,
        requested_type: upload.requested_type,
        resources: upload.resources,
        respond_to,
    };
    if let Err(err) = state.queue.admit(job) {
        return error_response(err);
    }

    match response.await {
        Ok(Ok(pdf)) => (
            [(header::CONTENT_TYPE, HeaderValue::from_static("application/pdf"))],
            pdf,
        )
            .into_response(),
        Ok(Err(err)) => error_response(err),
        Err(_recv) => error_response(ConvertError::internal("conversion task dropped")),
    }
}

async fn convert_options() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("multipart/form-data"));
    headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
    (StatusCode::NO_CONTENT, headers).into_response()
}

async fn healthcheck(State(state): State<AppState>) -> Response {
    let snapshot = state.health.snapshot();
    let status = if snapshot.aggregate().is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "health": snapshot }))).into_response()
}

async fn healthcheck_options() -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(header::ALLOW, HeaderValue::from_static("GET"));
    (StatusCode::NO_CONTENT, headers).into_response()
}

struct Upload {
    input: Vec<u8>,
    file_name: String,
    content_type: String,
    requested_type: Option<String>,
    resources: Vec<PageResource>,
}

/// Walk the multipart fields: one `input`, up to `MAX_RESOURCE_COUNT`
/// `resources`, an optional `type` string. Unknown fields are skipped.
async fn read_upload(multipart: &mut Multipart, config: &Config) -> Result<Upload, ConvertError> {
    let mut input: Option<(String, String, Vec<u8>)> = None;
    let mut resources = Vec::new();
    let mut requested_type: Option<String> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return Err(multipart_error(err)),
        };

        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("input") => {
                if input.is_some() {
                    return Err(ConvertError::Validation(
                        "multiple input files".to_string(),
                    ));
                }
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_else(|| "input".to_string());
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                input = Some((file_name, content_type, bytes.to_vec()));
            }
            Some("resources") => {
                if resources.len() >= config.max_resource_count {
                    return Err(ConvertError::Validation(format!(
                        "more than {} resource files",
                        config.max_resource_count
                    )));
                }
                let name = field
                    .file_name()
                    .map(str::to_string)
                    .unwrap_or_default();
                let content_type = field
                    .content_type()
                    .map(str::to_string)
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let bytes = field.bytes().await.map_err(multipart_error)?;
                resources.push(PageResource {
                    name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            Some("type") => {
                // A file here (or a repeat) is not a plain string value.
                if requested_type.is_some() || field.file_name().is_some() {
                    return Err(ConvertError::Validation(
                        "type must be a single string".to_string(),
                    ));
                }
                let value = field.text().await.map_err(multipart_error)?;
                requested_type = Some(value);
            }
            _ => continue,
        }
    }

    let (file_name, content_type, bytes) =
        input.ok_or_else(|| ConvertError::Validation("input file is required".to_string()))?;

    Ok(Upload {
        input: bytes,
        file_name,
        content_type,
        requested_type,
        resources,
    })
}

fn multipart_error(err: axum_extra::extract::multipart::MultipartError) -> ConvertError {
    match err.status() {
        StatusCode::PAYLOAD_TOO_LARGE => ConvertError::TooLarge,
        StatusCode::BAD_REQUEST => ConvertError::Validation(err.to_string()),
        _ => ConvertError::internal(err),
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
