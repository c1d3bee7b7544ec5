// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Supervisor lifecycle tests against a fake office backend.

use super::*;
use std::time::Duration;

/// Write a stand-in backend: it honors `--pidfile` and
/// `--user-installation` like the real daemon, stays up for
/// `run_secs`, then exits with `exit_code`.
fn write_fake_backend(dir: &std::path::Path, run_secs: &str, exit_code: i32) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-unoserver.sh");
    let script = format!(
        "#!/bin/sh\n\
         pidfile=\"\"\n\
         profile=\"\"\n\
         while [ $# -gt 0 ]; do\n\
           case \"$1\" in\n\
             --pidfile) pidfile=\"$2\"; shift 2 ;;\n\
             --user-installation) profile=\"$2\"; shift 2 ;;\n\
             *) shift ;;\n\
           esac\n\
         done\n\
         echo $$ > \"$pidfile\"\n\
         mkdir -p \"$profile\"\n\
         sleep {run_secs}\n\
         exit {exit_code}\n"
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn supervised_config(tmp: &std::path::Path, backend: &std::path::Path, max_restarts: &str) -> Arc<Config> {
    let vars = [
        ("MAX_CONCURRENT_JOBS", "1".to_string()),
        ("MAX_RESTARTS", max_restarts.to_string()),
        ("RESTART_DELAY", "200".to_string()),
        ("OFFICE_LAUNCH_TIMEOUT", "5000".to_string()),
        ("UNOSERVER_BIN", backend.display().to_string()),
        ("TMP_DIR", tmp.display().to_string()),
    ];
    Arc::new(
        Config::from_lookup(move |name| {
            vars.iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
        })
        .unwrap(),
    )
}

async fn wait_for_health(health: &HealthBoard, port: u16, want: Health, deadline: Duration) {
    let start = tokio::time::Instant::now();
    loop {
        let snapshot = health.snapshot();
        if snapshot.unoservers.get(&port.to_string()) == Some(&want) {
            return;
        }
        assert!(
            start.elapsed() < deadline,
            "worker {port} never became {want:?}"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[tokio::test]
async fn crash_recovery_flips_health_across_a_restart_cycle() {
    let tmp = tempfile::tempdir().unwrap();
    let backend = write_fake_backend(tmp.path(), "0.5", 1);
    let config = supervised_config(tmp.path(), &backend, "3");
    let port = config.office_ports()[0];
    let health = HealthBoard::new(false, &config.office_ports());

    let worker = OfficeWorker::new(port, Arc::clone(&config), health.clone());
    tokio::spawn(Arc::clone(&worker).supervise());

    // First start: backend writes its pid file and profile dir, the
    // readiness wait observes both, the worker reports in.
    wait_for_health(&health, port, Health::Healthy, Duration::from_secs(10)).await;
    assert!(worker.is_available());
    let (pid_path, profile_dir) = worker.paths_for_test();
    assert!(pid_path.exists());
    assert!(profile_dir.is_dir());

    // Backend dies: health drops and the claim flag with it.
    wait_for_health(&health, port, Health::Unhealthy, Duration::from_secs(10)).await;

    // One restart delay later the supervisor has respawned it.
    wait_for_health(&health, port, Health::Healthy, Duration::from_secs(10)).await;
    assert!(worker.is_available());
}

#[tokio::test]
async fn an_exhausted_budget_fails_the_worker_permanently() {
    let tmp = tempfile::tempdir().unwrap();
    // One allowed start; the run dies well inside the reset window.
    let backend = write_fake_backend(tmp.path(), "0.1", 1);
    let config = supervised_config(tmp.path(), &backend, "1");
    let port = config.office_ports()[0];
    let health = HealthBoard::new(false, &config.office_ports());

    let worker = OfficeWorker::new(port, Arc::clone(&config), health.clone());
    tokio::spawn(Arc::clone(&worker).supervise());

    wait_for_health(&health, port, Health::Healthy, Duration::from_secs(10)).await;
    wait_for_health(&health, port, Health::Unhealthy, Duration::from_secs(10)).await;

    // The budget is spent; no further start attempt may succeed.
    tokio::time::sleep(Duration::from_millis(800)).await;
    let snapshot = health.snapshot();
    assert_eq!(
        snapshot.unoservers.get(&port.to_string()),
        Some(&Health::Unhealthy)
    );
    assert!(!worker.is_available());
}

#[tokio::test]
async fn exit_cleanup_removes_the_worker_artifacts() {
    let tmp = tempfile::tempdir().unwrap();
    // A single short run with no restart budget left afterwards, so the
    // artifacts stay gone once observed.
    let backend = write_fake_backend(tmp.path(), "0.3", 1);
    let config = supervised_config(tmp.path(), &backend, "1");
    let port = config.office_ports()[0];
    let health = HealthBoard::new(false, &config.office_ports());

    let worker = OfficeWorker::new(port, Arc::clone(&config), health.clone());
    tokio::spawn(Arc::clone(&worker).supervise());

    wait_for_health(&health, port, Health::Healthy, Duration::from_secs(10)).await;
    wait_for_health(&health, port, Health::Unhealthy, Duration::from_secs(10)).await;

    // Cleanup runs between the exit and the (refused) next attempt.
    let (pid_path, profile_dir) = worker.paths_for_test();
    let start = tokio::time::Instant::now();
    while pid_path.exists() || profile_dir.exists() {
        assert!(
            start.elapsed() < Duration::from_secs(5),
            "worker artifacts were not cleaned up"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
