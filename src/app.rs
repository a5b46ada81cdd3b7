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

//! Glue between a validated [`BatchConfig`] and the dispatcher, shared by
//! both binaries.

use anyhow::{Context, Result};
use std::io::IsTerminal;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::executor::{BatchReport, ConnectRetryPolicy, Dispatcher, DEFAULT_RETRY_DELAY};
use crate::report::{self, Reporter, EXIT_BATCH_FAILURE};
use crate::transport::{SshTransport, Transport};

/// Run the batch described by `config` over `transport`.
///
/// Cancelling `cancel` stops new hosts from starting; hosts already in flight
/// get the configured grace period before they are reported as cancelled.
pub async fn run_batch(
    config: &BatchConfig,
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
) -> Result<BatchReport> {
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let task_count = config.task_count();
    let progress = if config.progress && std::io::stderr().is_terminal() {
        let color = report::should_use_colors(config.no_color);
        tokio::spawn(report::run_progress(task_count, color, events_rx))
    } else {
        tokio::spawn(report::drain_events(events_rx))
    };

    let dispatcher = Dispatcher::new(transport, Arc::clone(&config.credential))
        .with_concurrency(config.concurrency)
        .with_task_timeout(config.task_timeout)
        .with_retry_policy(ConnectRetryPolicy::new(
            config.max_attempts,
            DEFAULT_RETRY_DELAY,
        ))
        .with_cancellation(cancel)
        .with_grace(config.grace)
        .with_events(events_tx);

    let result = dispatcher
        .run(&config.targets, |target| config.operation.tasks_for(target))
        .await;

    // The dispatcher dropped its sender, so the display task ends on its own
    if let Err(e) = progress.await {
        tracing::debug!("Progress display task failed: {e}");
    }

    result.context("Batch finished without an outcome for every task")
}

/// Cancel `token` on the first Ctrl-C or SIGTERM.
pub fn cancel_on_signal(token: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::warn!("Failed to install SIGTERM handler: {e}");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => tracing::info!("Received SIGINT (Ctrl+C)"),
            _ = terminate => tracing::info!("Received SIGTERM"),
        }
        eprintln!("Interrupted: cancelling remaining hosts");
        token.cancel();
    })
}

/// Run a batch over SSH, print the report, and return the process exit code.
pub async fn execute(config: BatchConfig) -> i32 {
    let transport: Arc<dyn Transport> = Arc::new(SshTransport::new(config.connect_timeout));
    let cancel = CancellationToken::new();
    let signals = cancel_on_signal(cancel.clone());

    let result = run_batch(&config, transport, cancel).await;
    signals.abort();

    match result {
        Ok(report) => {
            print!("{}", Reporter::detect(config.no_color).render(&report));
            Reporter::exit_code(&report)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            EXIT_BATCH_FAILURE
        }
    }
}
