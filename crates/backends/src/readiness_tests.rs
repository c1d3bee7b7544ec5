// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn returns_immediately_when_paths_exist() {
    let dir = tempfile::tempdir().unwrap();
    let pid = dir.path().join("office-2003.pid");
    std::fs::write(&pid, "123").unwrap();

    await_paths(dir.path(), &[&pid], Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test]
async fn wakes_when_paths_appear_later() {
    let dir = tempfile::tempdir().unwrap();
    let pid = dir.path().join("office-2003.pid");
    let profile = dir.path().join("office-2003-abc");

    let root = dir.path().to_path_buf();
    let writer = {
        let pid = pid.clone();
        let profile = profile.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            std::fs::write(&pid, "123").unwrap();
            std::fs::create_dir(&profile).unwrap();
        })
    };

    await_paths(&root, &[&pid, &profile], Duration::from_secs(5))
        .await
        .unwrap();
    writer.await.unwrap();
}

#[tokio::test]
async fn times_out_when_a_path_never_appears() {
    let dir = tempfile::tempdir().unwrap();
    let pid = dir.path().join("office-2003.pid");
    let profile = dir.path().join("office-2003-abc");
    std::fs::write(&pid, "123").unwrap();

    let err = await_paths(dir.path(), &[&pid, &profile], Duration::from_millis(200))
        .await
        .unwrap_err();
    let ReadinessError::Timeout { missing, .. } = err;
    assert_eq!(missing, vec![profile]);
}
