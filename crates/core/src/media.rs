// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Media type resolution and backend routing tables.
//!
//! The MIME→tag and extension→tag tables are normative: anything that
//! falls through both is unsupported. A client-supplied `type` overrides
//! the declared type but must not contradict it.

use std::fmt;

use thiserror::Error;

/// Which converter a resolved media type routes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Headless browser render.
    Browser,
    /// Office worker pool.
    Office,
    /// Identity: input is already a PDF.
    Passthrough,
    /// Per-job markup converter.
    Markup,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BackendKind::Browser => "browser",
            BackendKind::Office => "office",
            BackendKind::Passthrough => "passthrough",
            BackendKind::Markup => "markup",
        };
        f.write_str(name)
    }
}

/// A resolved source-format tag plus its routing class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaType {
    /// Normalized source-format tag (pandoc-style for markup formats).
    pub tag: &'static str,
    pub backend: BackendKind,
}

/// Why a media type could not be resolved.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MediaTypeError {
    #[error("could not determine source format")]
    Undetermined,
    #[error("unrecognized source format: {0}")]
    Unrecognized(String),
    #[error("requested type {requested} contradicts detected type {declared}")]
    Contradiction {
        requested: String,
        declared: &'static str,
    },
}

/// Declared MIME type → tag. Parameters (`; charset=...`) are ignored.
fn tag_for_mime(mime: &str) -> Option<&'static str> {
    let essence = mime.split(';').next().unwrap_or("").trim();
    let tag = match essence.to_ascii_lowercase().as_str() {
        "text/html" | "application/xhtml+xml" => "html",
        "application/pdf" => "pdf",
        "application/rtf" | "text/rtf" => "rtf",
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => "docx",
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => "xlsx",
        "application/vnd.openxmlformats-officedocument.presentationml.presentation" => "pptx",
        "application/vnd.oasis.opendocument.text" => "odt",
        "application/vnd.oasis.opendocument.spreadsheet"
        | "application/vnd.oasis.opendocument.presentation"
        | "application/vnd.oasis.opendocument.graphics" => "opendocument",
        "text/markdown" | "text/x-markdown" => "markdown",
        "text/x-rst" => "rst",
        "application/x-latex" | "application/x-tex" | "text/x-tex" => "latex",
        "text/csv" => "csv",
        "text/tab-separated-values" => "tsv",
        "application/epub+zip" => "epub",
        "application/x-ipynb+json" => "ipynb",
        "text/x-org" => "org",
        "text/x-textile" => "textile",
        _ => return None,
    };
    Some(tag)
}

/// File extension → tag, consulted when the MIME type is uninformative.
fn tag_for_extension(file_name: &str) -> Option<&'static str> {
    let ext = file_name.rsplit_once('.')?.1;
    let tag = match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" | "xhtml" => "html",
        "pdf" => "pdf",
        "rtf" => "rtf",
        "docx" => "docx",
        "xlsx" => "xlsx",
        "pptx" => "pptx",
        "odt" => "odt",
        "ods" | "odp" | "odg" => "opendocument",
        "md" | "markdown" => "markdown",
        "rst" => "rst",
        "tex" | "latex" => "latex",
        "csv" => "csv",
        "tsv" => "tsv",
        "epub" => "epub",
        "ipynb" => "ipynb",
        "org" => "org",
        "textile" => "textile",
        _ => return None,
    };
    Some(tag)
}

/// Routing class for a recognized tag.
fn backend_for_tag(tag: &str) -> Option<MediaType> {
    let known = [
        ("html", BackendKind::Browser),
        ("pdf", BackendKind::Passthrough),
        ("rtf", BackendKind::Office),
        ("docx", BackendKind::Office),
        ("xlsx", BackendKind::Office),
        ("pptx", BackendKind::Office),
        ("odt", BackendKind::Office),
        ("opendocument", BackendKind::Office),
        ("markdown", BackendKind::Markup),
        ("rst", BackendKind::Markup),
        ("latex", BackendKind::Markup),
        ("csv", BackendKind::Markup),
        ("tsv", BackendKind::Markup),
        ("epub", BackendKind::Markup),
        ("ipynb", BackendKind::Markup),
        ("org", BackendKind::Markup),
        ("textile", BackendKind::Markup),
    ];
    known
        .iter()
        .find(|(known_tag, _)| *known_tag == tag)
        .map(|&(tag, backend)| MediaType { tag, backend })
}

/// Resolve the effective media type for an upload.
///
/// Declared type comes from the MIME table, falling back to the extension
/// table. A client-supplied `requested` tag wins, unless the declared type
/// exists and differs — the upload's own evidence then contradicts the
/// request and resolution fails.
pub fn resolve_media_type(
    file_name: &str,
    mime: &str,
    requested: Option<&str>,
) -> Result<MediaType, MediaTypeError> {
    let declared = tag_for_mime(mime).or_else(|| tag_for_extension(file_name));

    let effective = match (requested, declared) {
        (Some(requested), Some(declared)) => {
            let requested = requested.trim().to_ascii_lowercase();
            if requested != declared {
                return Err(MediaTypeError::Contradiction {
                    requested,
                    declared,
                });
            }
            declared.to_string()
        }
        (Some(requested), None) => requested.trim().to_ascii_lowercase(),
        (None, Some(declared)) => declared.to_string(),
        (None, None) => return Err(MediaTypeError::Undetermined),
    };

    backend_for_tag(&effective).ok_or(MediaTypeError::Unrecognized(effective))
}

#[cfg(test)]
#[path = "media_tests.rs"]
mod tests;
