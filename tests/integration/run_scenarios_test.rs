// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{build_manager, test_config, MockItem, MockRenderer, MockTableWriter, RUN_LABEL};
use snaprs::domain::models::capture_record::Target;
use snaprs::domain::models::run::{RunOutcome, RunState};
use snaprs::utils::errors::RunError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

const A: &str = "https://x.com/alice";
const B: &str = "https://x.com/bob";

fn targets(urls: &[&str]) -> Vec<Target> {
    urls.iter().map(|u| Target::from(*u)).collect()
}

fn two_fresh(handle: &str) -> Vec<MockItem> {
    vec![MockItem::fresh(handle, 1), MockItem::fresh(handle, 2)]
}

#[tokio::test]
async fn test_completed_run_writes_primary_table() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new()
        .with_page(A, two_fresh("alice"))
        .with_page(B, two_fresh("bob"));
    let writer = Arc::new(MockTableWriter::new());
    let config = test_config(dir.path(), 1, 1);
    let primary = config.primary_table_path(RUN_LABEL);
    let manager = build_manager(&renderer, writer.clone(), config);

    let report = manager
        .run_labeled(targets(&[A, B]), RUN_LABEL)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.captured, 2);
    assert_eq!(manager.store().len(), 2);
    assert_eq!(report.table_path.as_deref(), Some(primary.as_path()));
    assert_eq!(writer.written_paths(), vec![primary.clone()]);
    assert!(primary.exists());

    // One record per target, in batch order
    let handles: Vec<String> = manager
        .store()
        .snapshot()
        .into_iter()
        .map(|r| r.source_handle)
        .collect();
    assert_eq!(handles, vec!["alice", "bob"]);

    let shot = dir
        .path()
        .join("screenshots")
        .join(RUN_LABEL)
        .join("alice_1.png");
    assert!(shot.exists());

    assert_eq!(renderer.sessions_opened(), 1);
    assert_eq!(renderer.sessions_closed(), 1);
    assert_eq!(manager.active_sessions(), 0);
    assert_eq!(manager.state(), RunState::Idle);
    assert!(!manager.token().is_set());
}

#[tokio::test]
async fn test_stop_mid_run_writes_partial_table_only() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(MockTableWriter::new());
    let config = test_config(dir.path(), 1, 1);
    let primary = config.primary_table_path(RUN_LABEL);
    let partial = config.partial_table_path(RUN_LABEL);

    let renderer = MockRenderer::new()
        .with_page(A, two_fresh("alice"))
        .with_page(B, two_fresh("bob"));
    let manager = build_manager(&renderer, writer.clone(), config);
    let renderer = renderer.stop_when_navigating(B, manager.token());

    let report = manager
        .run_labeled(targets(&[A, B]), RUN_LABEL)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(report.captured, 1);

    let records = manager.store().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_handle, "alice");

    assert_eq!(writer.written_paths(), vec![partial.clone()]);
    assert!(partial.exists());
    assert!(!primary.exists());

    assert_eq!(renderer.sessions_opened(), renderer.sessions_closed());
    assert_eq!(manager.state(), RunState::Idle);
    assert!(!manager.token().is_set());
}

#[tokio::test]
async fn test_empty_target_list_is_rejected_before_running() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new();
    let writer = Arc::new(MockTableWriter::new());
    let manager = build_manager(&renderer, writer.clone(), test_config(dir.path(), 2, 1));

    let result = manager.run_labeled(Vec::new(), RUN_LABEL).await;

    assert!(matches!(result, Err(RunError::NoTargets)));
    assert_eq!(manager.state(), RunState::Idle);
    assert_eq!(renderer.sessions_opened(), 0);
    assert_eq!(writer.attempts(), 0);
    assert!(!dir.path().join("screenshots").exists());
}

#[tokio::test]
async fn test_invalid_numeric_range_is_rejected() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new().with_page(A, two_fresh("alice"));
    let writer = Arc::new(MockTableWriter::new());
    let mut config = test_config(dir.path(), 1, 1);
    config.time_window_minutes = 0;
    let manager = build_manager(&renderer, writer, config);

    let result = manager.run_labeled(targets(&[A]), RUN_LABEL).await;

    assert!(matches!(result, Err(RunError::InvalidConfig(_))));
    assert_eq!(manager.state(), RunState::Idle);
    assert_eq!(renderer.sessions_opened(), 0);
}

#[tokio::test]
async fn test_exhausted_navigation_abandons_only_that_target() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new()
        .with_page(A, two_fresh("alice"))
        .with_nav_failures(A, 3)
        .with_page(B, two_fresh("bob"));
    let writer = Arc::new(MockTableWriter::new());
    let manager = build_manager(&renderer, writer.clone(), test_config(dir.path(), 2, 2));

    let report = manager
        .run_labeled(targets(&[A, B]), RUN_LABEL)
        .await
        .unwrap();

    // Initial try plus two retries
    assert_eq!(renderer.nav_attempts(A), 3);
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.captured, 2);
    assert!(manager
        .store()
        .snapshot()
        .iter()
        .all(|r| r.source_handle == "bob"));
    assert_eq!(renderer.sessions_opened(), 2);
    assert_eq!(renderer.sessions_closed(), 2);
}

#[tokio::test]
async fn test_table_write_failures_keep_in_memory_count() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new()
        .with_page(A, two_fresh("alice"))
        .with_page(B, two_fresh("bob"));
    let writer = Arc::new(MockTableWriter::failing(3));
    let manager = build_manager(&renderer, writer.clone(), test_config(dir.path(), 2, 1));

    let report = manager
        .run_labeled(targets(&[A, B]), RUN_LABEL)
        .await
        .unwrap();

    assert_eq!(writer.attempts(), 3);
    assert!(writer.written_paths().is_empty());
    assert!(report.table_path.is_none());
    assert!(report.persistence_error.is_some());
    assert_eq!(report.captured, 2);
    assert_eq!(manager.store().len(), 2);
    assert_eq!(manager.state(), RunState::Idle);
}

#[tokio::test]
async fn test_missing_table_dependency_is_fatal() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new().with_page(A, two_fresh("alice"));
    let writer = Arc::new(MockTableWriter::missing_dependency());
    let manager = build_manager(&renderer, writer.clone(), test_config(dir.path(), 1, 2));

    let result = manager.run_labeled(targets(&[A]), RUN_LABEL).await;

    assert!(matches!(result, Err(RunError::Persistence(e)) if e.is_fatal()));
    assert_eq!(writer.attempts(), 1);
    assert_eq!(manager.store().len(), 2);
    assert_eq!(manager.state(), RunState::Idle);
}

#[tokio::test]
async fn test_stale_and_pinned_items_yield_no_data() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new().with_page(
        A,
        vec![
            MockItem::fresh("alice", 1).pinned(),
            MockItem::posted("alice", 2, 120),
        ],
    );
    let writer = Arc::new(MockTableWriter::new());
    let manager = build_manager(&renderer, writer.clone(), test_config(dir.path(), 1, 5));

    let report = manager.run_labeled(targets(&[A]), RUN_LABEL).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::NoData);
    assert_eq!(report.captured, 0);
    assert_eq!(writer.attempts(), 0);
}

#[tokio::test]
async fn test_browser_launch_failure_does_not_fail_run() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new()
        .with_page(A, two_fresh("alice"))
        .failing_open();
    let writer = Arc::new(MockTableWriter::new());
    let manager = build_manager(&renderer, writer, test_config(dir.path(), 2, 1));

    let report = manager
        .run_labeled(targets(&[A, B]), RUN_LABEL)
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::NoData);
    assert_eq!(manager.state(), RunState::Idle);
}

#[tokio::test]
async fn test_forced_reclamation_unblocks_stuck_worker() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new().hang_when_navigating(A);
    let writer = Arc::new(MockTableWriter::new());
    let manager = Arc::new(build_manager(
        &renderer,
        writer.clone(),
        test_config(dir.path(), 1, 1),
    ));

    let stopper = manager.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();
    });

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        manager.run_labeled(targets(&[A]), RUN_LABEL),
    )
    .await
    .expect("run should finish after stop")
    .unwrap();

    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(report.captured, 0);
    assert_eq!(writer.attempts(), 0);
    assert_eq!(renderer.sessions_closed(), 1);
    assert_eq!(manager.active_sessions(), 0);
}

#[tokio::test]
async fn test_slow_session_close_does_not_delay_shutdown() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new()
        .hang_when_navigating(A)
        .with_slow_close(Duration::from_secs(3));
    let writer = Arc::new(MockTableWriter::new());
    let manager = Arc::new(build_manager(
        &renderer,
        writer.clone(),
        test_config(dir.path(), 1, 1),
    ));

    let stopper = manager.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        stopper.stop();
    });

    let started = Instant::now();
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        manager.run_labeled(targets(&[A]), RUN_LABEL),
    )
    .await
    .expect("run should finish after stop")
    .unwrap();

    // Grace period is 300ms; the 3s close must not be awaited inline
    assert!(started.elapsed() < Duration::from_secs(1), "took {:?}", started.elapsed());
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(writer.attempts(), 0);
    assert_eq!(manager.state(), RunState::Idle);
    assert!(!manager.token().is_set());
}

#[tokio::test]
async fn test_worker_ignoring_stop_is_aborted_after_grace_period() {
    let dir = TempDir::new().unwrap();
    let writer = Arc::new(MockTableWriter::new());
    let config = test_config(dir.path(), 1, 1);
    let primary = config.primary_table_path(RUN_LABEL);
    let partial = config.partial_table_path(RUN_LABEL);

    let renderer = MockRenderer::new()
        .with_page(A, two_fresh("alice"))
        .with_page(B, two_fresh("bob"))
        .stall_when_navigating(B);
    let manager = build_manager(&renderer, writer.clone(), config);
    let renderer = renderer.stop_when_navigating(B, manager.token());

    let started = Instant::now();
    let report = tokio::time::timeout(
        Duration::from_secs(5),
        manager.run_labeled(targets(&[A, B]), RUN_LABEL),
    )
    .await
    .expect("stalled worker should be aborted")
    .unwrap();

    // Grace period plus a few poll intervals
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(manager.state(), RunState::Idle);
    assert_eq!(renderer.nav_attempts(B), 1);

    let records = manager.store().snapshot();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source_handle, "alice");

    assert_eq!(writer.written_paths(), vec![partial.clone()]);
    assert_eq!(writer.written_rows(), 1);
    assert!(!primary.exists());
}

#[tokio::test]
async fn test_second_run_while_running_is_rejected() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new()
        .hang_when_navigating(A)
        .with_page(B, two_fresh("bob"));
    let writer = Arc::new(MockTableWriter::new());
    let manager = Arc::new(build_manager(&renderer, writer, test_config(dir.path(), 1, 1)));

    let running = manager.clone();
    let first = tokio::spawn(async move { running.run_labeled(targets(&[A]), RUN_LABEL).await });

    while manager.state() == RunState::Idle {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let second = manager.run_labeled(targets(&[B]), "second").await;
    assert!(matches!(second, Err(RunError::AlreadyRunning)));

    manager.stop();
    let report = first.await.unwrap().unwrap();
    assert_eq!(report.outcome, RunOutcome::Stopped);
    assert_eq!(manager.state(), RunState::Idle);
}

#[tokio::test]
async fn test_stop_before_start_does_not_leak_into_next_run() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new().with_page(A, two_fresh("alice"));
    let writer = Arc::new(MockTableWriter::new());
    let manager = build_manager(&renderer, writer, test_config(dir.path(), 1, 1));

    manager.stop();
    let report = manager.run_labeled(targets(&[A]), RUN_LABEL).await.unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert_eq!(report.captured, 1);
}

#[tokio::test]
async fn test_each_run_starts_with_empty_store() {
    let dir = TempDir::new().unwrap();
    let renderer = MockRenderer::new().with_page(A, two_fresh("alice"));
    let writer = Arc::new(MockTableWriter::new());
    let manager = build_manager(&renderer, writer.clone(), test_config(dir.path(), 1, 2));

    let first = manager.run_labeled(targets(&[A]), "run-1").await.unwrap();
    let second = manager.run_labeled(targets(&[A]), "run-2").await.unwrap();

    assert_eq!(first.captured, 2);
    assert_eq!(second.captured, 2);
    assert_eq!(manager.store().len(), 2);
    assert_eq!(writer.written_rows(), 4);
}
