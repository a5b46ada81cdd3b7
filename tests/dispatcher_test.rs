// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Integration tests for batch dispatch: completeness, ordering, bounded
//! concurrency, timeouts and connection cleanup.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use common::{credential, targets, Behavior, MockTransport};
use mooon::executor::{
    Dispatcher, ErrorKind, NoRetry, TaskKey, TaskKind, TaskStatus, DEFAULT_CONCURRENCY,
};

fn hosts(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("node{i:02}")).collect()
}

fn command(_: &mooon::target::Target) -> Vec<TaskKind> {
    vec![TaskKind::command("hostname")]
}

#[tokio::test]
async fn test_every_task_has_exactly_one_outcome() {
    let names = hosts(12);
    let host_refs: Vec<&str> = names.iter().map(String::as_str).collect();

    for concurrency in [0, 1, 3, 12, 50] {
        let mut transport = MockTransport::new(Behavior::ok("up"));
        // Three failing hosts of different kinds
        transport = transport
            .with_host("node02", Behavior::Refuse)
            .with_host("node05", Behavior::exit(1))
            .with_host("node09", Behavior::Signal("TERM".to_string()));

        let report = Dispatcher::new(Arc::new(transport), credential())
            .with_concurrency(concurrency)
            .with_retry_policy(NoRetry)
            .run(&targets(&host_refs), command)
            .await
            .unwrap();

        assert_eq!(report.len(), 12, "concurrency {concurrency}");
        assert_eq!(report.counts().succeeded, 9, "concurrency {concurrency}");
        assert_eq!(report.counts().failed, 3, "concurrency {concurrency}");

        let order: Vec<usize> = report.outcomes().iter().map(|o| o.key.target_index).collect();
        assert_eq!(order, (0..12).collect::<Vec<_>>());
    }
}

#[tokio::test]
async fn test_concurrency_never_exceeds_bound() {
    let names = hosts(20);
    let host_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let transport = MockTransport::new(Behavior::ok("up")).with_latency(Duration::from_millis(30));
    let stats = Arc::clone(&transport.stats);

    let report = Dispatcher::new(Arc::new(transport), credential())
        .with_concurrency(4)
        .run(&targets(&host_refs), command)
        .await
        .unwrap();

    assert!(report.is_success());
    assert!(stats.max_in_flight() <= 4, "saw {}", stats.max_in_flight());
    assert!(stats.max_in_flight() >= 2, "workers did not overlap");
}

#[tokio::test]
async fn test_default_concurrency_bound() {
    let names = hosts(DEFAULT_CONCURRENCY + 8);
    let host_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let transport = MockTransport::new(Behavior::ok("up")).with_latency(Duration::from_millis(30));
    let stats = Arc::clone(&transport.stats);

    Dispatcher::new(Arc::new(transport), credential())
        .run(&targets(&host_refs), command)
        .await
        .unwrap();

    assert!(stats.max_in_flight() <= DEFAULT_CONCURRENCY);
}

#[tokio::test]
async fn test_single_worker_starts_tasks_in_submission_order() {
    let transport = MockTransport::new(Behavior::ok("up"));
    let stats = Arc::clone(&transport.stats);

    Dispatcher::new(Arc::new(transport), credential())
        .with_concurrency(1)
        .run(&targets(&["c", "a", "b"]), command)
        .await
        .unwrap();

    assert_eq!(stats.dial_order(), vec!["c", "a", "b"]);
    assert_eq!(stats.max_in_flight(), 1);
}

#[tokio::test]
async fn test_hung_host_times_out_without_delaying_others() {
    let transport = MockTransport::new(Behavior::ok("up"))
        .with_host("stuck-run", Behavior::HangOnRun)
        .with_host("stuck-dial", Behavior::HangOnDial);
    let stats = Arc::clone(&transport.stats);

    let started = Instant::now();
    let report = Dispatcher::new(Arc::new(transport), credential())
        .with_concurrency(0)
        .with_task_timeout(Some(Duration::from_millis(200)))
        .with_grace(Duration::from_millis(100))
        .run(&targets(&["ok1", "stuck-run", "stuck-dial", "ok2"]), command)
        .await
        .unwrap();
    let elapsed = started.elapsed();

    let statuses: Vec<TaskStatus> = report.outcomes().iter().map(|o| o.status).collect();
    assert_eq!(
        statuses,
        vec![
            TaskStatus::Succeeded,
            TaskStatus::TimedOut,
            TaskStatus::TimedOut,
            TaskStatus::Succeeded
        ]
    );
    assert_eq!(report.outcomes()[1].error_kind(), Some(ErrorKind::Timeout));
    assert!(report.outcomes()[0].elapsed < Duration::from_millis(200));
    assert!(elapsed < Duration::from_secs(2), "run took {elapsed:?}");

    // The hung command's connection was still closed; the hung dial never opened one
    assert_eq!(stats.opened.load(Ordering::SeqCst), 3);
    assert_eq!(stats.closed.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_failed_command_keeps_output_and_classification() {
    let transport = MockTransport::new(Behavior::Run {
        stdout: "partial\n".to_string(),
        exit_status: 127,
    });

    let report = Dispatcher::new(Arc::new(transport), credential())
        .run(&targets(&["web1"]), command)
        .await
        .unwrap();

    let outcome = &report.outcomes()[0];
    assert_eq!(outcome.status, TaskStatus::Failed);
    assert_eq!(outcome.stdout(), "partial\n");
    let error = outcome.error.as_ref().unwrap();
    assert_eq!(error.kind, ErrorKind::RemoteExecution);
    assert!(error.message.contains("command not found"));
    // Non-zero exits are never retried
    assert_eq!(outcome.attempt, 1);
}

#[tokio::test]
async fn test_every_opened_connection_is_closed() {
    let names = hosts(10);
    let host_refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let transport = MockTransport::new(Behavior::ok("up"))
        .with_host("node03", Behavior::exit(2))
        .with_host("node04", Behavior::Refuse);
    let stats = Arc::clone(&transport.stats);

    Dispatcher::new(Arc::new(transport), credential())
        .with_concurrency(3)
        .with_retry_policy(NoRetry)
        .run(&targets(&host_refs), command)
        .await
        .unwrap();

    assert_eq!(stats.opened.load(Ordering::SeqCst), 9);
    assert_eq!(
        stats.opened.load(Ordering::SeqCst),
        stats.closed.load(Ordering::SeqCst)
    );
}

#[tokio::test]
async fn test_connection_closed_when_operation_panics() {
    let transport = MockTransport::new(Behavior::ok("up")).with_host("node00", Behavior::PanicOnRun);
    let stats = Arc::clone(&transport.stats);

    let report = Dispatcher::new(Arc::new(transport), credential())
        .with_retry_policy(NoRetry)
        .run(&targets(&["node00", "node01"]), command)
        .await
        .unwrap();

    let crashed = &report.outcomes()[0];
    assert_eq!(crashed.status, TaskStatus::Failed);
    assert_eq!(crashed.error_kind(), Some(ErrorKind::Internal));
    assert!(crashed
        .error
        .as_ref()
        .unwrap()
        .message
        .contains("command handler crashed on node00"));
    assert!(report.outcomes()[1].is_success());
    assert_eq!(stats.opened.load(Ordering::SeqCst), 2);
    assert_eq!(stats.closed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_upload_creates_task_per_target_and_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let first = dir.path().join("app.conf");
    let second = dir.path().join("run.sh");
    std::fs::write(&first, "listen 80\n").unwrap();
    std::fs::write(&second, "#!/bin/sh\n").unwrap();

    let transport = MockTransport::new(Behavior::ok(""))
        .with_host("b", Behavior::TransferError("permission denied".to_string()));
    let stats = Arc::clone(&transport.stats);

    let files = vec![first.clone(), second.clone()];
    let report = Dispatcher::new(Arc::new(transport), credential())
        .run(&targets(&["a", "b"]), |_| {
            files
                .iter()
                .map(|f| TaskKind::upload(f.clone(), "/etc/app"))
                .collect()
        })
        .await
        .unwrap();

    let keys: Vec<TaskKey> = report.outcomes().iter().map(|o| o.key).collect();
    assert_eq!(
        keys,
        vec![
            TaskKey::new(0, 0),
            TaskKey::new(0, 1),
            TaskKey::new(1, 0),
            TaskKey::new(1, 1)
        ]
    );
    assert_eq!(report.counts().succeeded, 2);
    assert!(report.outcomes()[2..]
        .iter()
        .all(|o| o.error_kind() == Some(ErrorKind::Transfer)));

    let mut uploads = stats.uploads();
    uploads.sort();
    assert_eq!(
        uploads,
        vec![
            ("a".to_string(), "/etc/app/app.conf".to_string()),
            ("a".to_string(), "/etc/app/run.sh".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_missing_local_file_is_transfer_failure() {
    let transport = MockTransport::new(Behavior::ok(""));
    let report = Dispatcher::new(Arc::new(transport), credential())
        .run(&targets(&["a"]), |_| {
            vec![TaskKind::upload("/nonexistent/mooon/app.conf", "/tmp")]
        })
        .await
        .unwrap();

    assert_eq!(report.outcomes()[0].error_kind(), Some(ErrorKind::Transfer));
}
