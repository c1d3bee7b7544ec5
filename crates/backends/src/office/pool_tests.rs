// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use platen_core::Config;

fn test_config(tmp: &std::path::Path) -> Arc<Config> {
    let tmp = tmp.display().to_string();
    let vars = [
        ("MAX_CONCURRENT_JOBS", "2"),
        // Keep the supervisors quiet: the backend binary does not exist
        // and the retry delay is long enough to not fire during a test.
        ("UNOSERVER_BIN", "/nonexistent/unoserver"),
        ("RESTART_DELAY", "60000"),
        ("TMP_DIR", tmp.as_str()),
    ];
    let lookup = |name: &str| {
        vars.iter()
            .find(|(key, _)| *key == name)
            .map(|(_, value)| value.to_string())
    };
    Arc::new(Config::from_lookup(lookup).unwrap())
}

fn idle_pool(config: Arc<Config>) -> OfficePool {
    let health = HealthBoard::new(false, &config.office_ports());
    OfficePool::start(config, health)
}

#[tokio::test]
async fn claim_prefers_the_lowest_port() {
    let tmp = tempfile::tempdir().unwrap();
    let pool = idle_pool(test_config(tmp.path()));
    for worker in pool.workers() {
        worker.set_available_for_test(true);
    }

    let first = pool.try_claim().unwrap();
    assert_eq!(first.port(), 2003);
    let second = pool.try_claim().unwrap();
    assert_eq!(second.port(), 2004);
    assert!(pool.try_claim().is_none());
}

#[tokio::test]
async fn claim_is_won_by_exactly_one_contender() {
    let tmp = tempfile::tempdir().unwrap();
    let pool = idle_pool(test_config(tmp.path()));
    pool.workers()[0].set_available_for_test(true);

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pool = pool.clone();
        handles.push(tokio::spawn(async move { pool.try_claim().is_some() }));
    }
    let mut wins = 0;
    for handle in handles {
        if handle.await.unwrap() {
            wins += 1;
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn dropping_the_lease_releases_the_worker() {
    let tmp = tempfile::tempdir().unwrap();
    let pool = idle_pool(test_config(tmp.path()));
    pool.workers()[0].set_available_for_test(true);

    let lease = pool.try_claim().unwrap();
    assert!(!pool.workers()[0].is_available());
    drop(lease);
    assert!(pool.workers()[0].is_available());
}

#[tokio::test]
async fn exhausted_pool_is_an_overload() {
    let tmp = tempfile::tempdir().unwrap();
    let pool = idle_pool(test_config(tmp.path()));

    let err = pool.convert(b"doc").await.unwrap_err();
    assert!(matches!(err, ConvertError::Overload));
}

#[tokio::test]
async fn worker_artifacts_are_derived_from_the_port() {
    let tmp = tempfile::tempdir().unwrap();
    let config = test_config(tmp.path());
    let pool = idle_pool(Arc::clone(&config));

    let (pid_path, profile_dir) = pool.workers()[0].paths_for_test();
    assert_eq!(
        pid_path.file_name().unwrap().to_str().unwrap(),
        "office-2003.pid"
    );
    let profile_name = profile_dir.file_name().unwrap().to_str().unwrap();
    assert!(profile_name.starts_with("office-2003-"), "got: {profile_name}");
    assert!(pid_path.starts_with(&config.tmp_dir));
}
