// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Character encoding detection and transcoding.
//!
//! Uploaded documents declare no reliable charset. Valid UTF-8 is taken
//! as-is; anything else is sniffed with `chardetng` and decoded with
//! `encoding_rs`.

use std::borrow::Cow;

use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

/// Detect the character encoding of `bytes`; UTF-8 when valid or
/// undetectable.
pub fn detect(bytes: &[u8]) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        return UTF_8;
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Charset label for an HTTP `Content-Type` header.
pub fn charset_label(bytes: &[u8]) -> &'static str {
    detect(bytes).name()
}

/// Transcode `bytes` to UTF-8. Borrows when the input already is UTF-8.
pub fn to_utf8(bytes: &[u8]) -> Cow<'_, [u8]> {
    if std::str::from_utf8(bytes).is_ok() {
        return Cow::Borrowed(bytes);
    }
    let encoding = detect(bytes);
    let (text, _, _had_errors) = encoding.decode(bytes);
    Cow::Owned(text.into_owned().into_bytes())
}

#[cfg(test)]
#[path = "encoding_tests.rs"]
mod tests;
