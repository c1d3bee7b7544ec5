// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn config_with(vars: &[(&str, &str)]) -> Arc<Config> {
    let vars: Vec<(String, String)> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let lookup = move |name: &str| {
        vars.iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    };
    Arc::new(Config::from_lookup(lookup).unwrap())
}

#[test]
fn absent_binary_disables_the_backend() {
    let config = config_with(&[]);
    assert!(MarkupConverter::from_config(&config).is_none());
}

#[test]
fn configured_binary_enables_the_backend() {
    let config = config_with(&[("PANDOC_BIN", "/usr/bin/pandoc")]);
    assert!(MarkupConverter::from_config(&config).is_some());
}

#[test]
fn args_select_tag_engine_and_standalone() {
    let args = build_args("rst", "weasyprint");
    assert_eq!(
        args,
        vec![
            "--from",
            "rst",
            "--pdf-engine",
            "weasyprint",
            "--standalone",
            "--output",
            "-",
        ]
    );
}

#[tokio::test]
async fn probe_fails_for_a_missing_binary() {
    let config = config_with(&[("PANDOC_BIN", "/nonexistent/pandoc")]);
    let converter = MarkupConverter::from_config(&config).unwrap();
    assert!(!converter.probe().await);
}

#[tokio::test]
async fn conversion_surfaces_backend_failures() {
    // `false` reads nothing and exits 1: a backend error, not a timeout.
    let config = config_with(&[("PANDOC_BIN", "/bin/false")]);
    let converter = MarkupConverter::from_config(&config).unwrap();
    let err = converter.convert(b"# hi", "markdown").await.unwrap_err();
    match err {
        ConvertError::Backend { backend, .. } => assert_eq!(backend, BackendKind::Markup),
        other => panic!("expected backend error, got: {other}"),
    }
}
