// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn all_healthy_board() -> HealthBoard {
    let board = HealthBoard::new(true, &[2003, 2004]);
    board.set_webserver(Health::Healthy);
    board.set_job_queue(Health::Healthy);
    board.set_browser(Health::Healthy);
    board.set_pandoc(Health::Healthy);
    board.set_office_worker(2003, Health::Healthy);
    board.set_office_worker(2004, Health::Healthy);
    board
}

#[test]
fn everything_healthy_aggregates_healthy() {
    let board = all_healthy_board();
    assert_eq!(board.snapshot().aggregate(), Health::Healthy);
}

#[test]
fn starts_unhealthy() {
    let board = HealthBoard::new(false, &[2003]);
    assert_eq!(board.snapshot().aggregate(), Health::Unhealthy);
}

#[test]
fn one_office_worker_down_is_still_healthy() {
    let board = all_healthy_board();
    board.set_office_worker(2004, Health::Unhealthy);
    assert_eq!(board.snapshot().aggregate(), Health::Healthy);
}

#[test]
fn all_office_workers_down_is_unhealthy() {
    let board = all_healthy_board();
    board.set_office_worker(2003, Health::Unhealthy);
    board.set_office_worker(2004, Health::Unhealthy);
    assert_eq!(board.snapshot().aggregate(), Health::Unhealthy);
}

#[test]
fn browser_down_is_unhealthy() {
    let board = all_healthy_board();
    board.set_browser(Health::Unhealthy);
    assert_eq!(board.snapshot().aggregate(), Health::Unhealthy);
}

#[test]
fn pandoc_is_ignored_when_not_configured() {
    let board = HealthBoard::new(false, &[2003]);
    board.set_webserver(Health::Healthy);
    board.set_job_queue(Health::Healthy);
    board.set_browser(Health::Healthy);
    // Setter is a no-op without configuration.
    board.set_pandoc(Health::Unhealthy);
    board.set_office_worker(2003, Health::Healthy);
    let snapshot = board.snapshot();
    assert!(snapshot.pandoc.is_none());
    assert_eq!(snapshot.aggregate(), Health::Healthy);
}

#[test]
fn snapshot_serializes_with_expected_keys() {
    let board = all_healthy_board();
    let json = serde_json::to_value(board.snapshot()).unwrap();
    assert_eq!(json["webserver"], "healthy");
    assert_eq!(json["jobQueue"], "healthy");
    assert_eq!(json["browser"], "healthy");
    assert_eq!(json["pandoc"], "healthy");
    assert_eq!(json["unoservers"]["2003"], "healthy");
    assert_eq!(json["unoservers"]["2004"], "healthy");
}

#[test]
fn unconfigured_pandoc_is_absent_from_serialization() {
    let board = HealthBoard::new(false, &[2003]);
    let json = serde_json::to_value(board.snapshot()).unwrap();
    assert!(json.get("pandoc").is_none());
}
