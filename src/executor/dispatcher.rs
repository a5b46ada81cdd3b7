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

//! Bounded, fault-isolated fan-out of tasks over a transport.
//!
//! A fixed pool of workers pulls tasks from a shared FIFO queue, so tasks
//! start in submission order and at most `concurrency` of them are in flight.
//! Each task runs in its own spawned future: a panic inside it is turned into
//! a failed outcome instead of tearing down the batch.
//!
//! Every attempt opens its own connection and closes it, bounded by the grace
//! period, before its outcome is recorded. This holds on success, failure,
//! timeout, cancellation and a panic inside the operation alike.

use futures::future::join_all;
use futures::FutureExt;
use std::any::Any;
use std::collections::VecDeque;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::aggregator::{AggregateError, Aggregator, BatchReport};
use super::outcome::{ErrorKind, Outcome, OutcomeDetail, TaskError};
use super::retry::{ConnectRetryPolicy, RetryPolicy};
use super::task::{Task, TaskKey, TaskKind};
use crate::credential::Credential;
use crate::target::Target;
use crate::transport::{Connection, Transfer, Transport};

/// Workers used when no concurrency is configured
pub const DEFAULT_CONCURRENCY: usize = 16;

/// How long cancellation waits for in-flight work and for connection close
pub const DEFAULT_GRACE: Duration = Duration::from_secs(5);

/// Live progress notifications, delivered in completion order.
#[derive(Debug, Clone)]
pub enum DispatchEvent {
    Started {
        key: TaskKey,
        target: Target,
        attempt: u32,
    },
    Finished(Outcome),
}

/// Runs a batch of tasks against a [`Transport`].
pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    credential: Arc<Credential>,
    concurrency: usize,
    task_timeout: Option<Duration>,
    retry_policy: Arc<dyn RetryPolicy>,
    cancel: CancellationToken,
    grace: Duration,
    events: Option<UnboundedSender<DispatchEvent>>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, credential: Arc<Credential>) -> Self {
        Self {
            transport,
            credential,
            concurrency: DEFAULT_CONCURRENCY,
            task_timeout: None,
            retry_policy: Arc::new(ConnectRetryPolicy::default()),
            cancel: CancellationToken::new(),
            grace: DEFAULT_GRACE,
            events: None,
        }
    }

    /// Maximum tasks in flight; 0 runs every task at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Time limit for a task across all of its attempts; `None` waits forever.
    pub fn with_task_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Arc::new(policy);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn with_events(mut self, events: UnboundedSender<DispatchEvent>) -> Self {
        self.events = Some(events);
        self
    }

    /// Number of workers spawned for `task_count` tasks.
    pub fn worker_count(&self, task_count: usize) -> usize {
        if self.concurrency == 0 {
            task_count
        } else {
            self.concurrency.min(task_count)
        }
    }

    /// Run every task produced by `task_factory` for `targets` to completion.
    ///
    /// Returns only once every task has a terminal outcome. Individual task
    /// failures never make this return early or fail.
    pub async fn run<F>(self, targets: &[Target], task_factory: F) -> Result<BatchReport, AggregateError>
    where
        F: Fn(&Target) -> Vec<TaskKind>,
    {
        let tasks: VecDeque<Task> = targets
            .iter()
            .enumerate()
            .flat_map(|(target_index, target)| {
                task_factory(target)
                    .into_iter()
                    .enumerate()
                    .map(move |(file_index, kind)| {
                        Task::new(TaskKey::new(target_index, file_index), target.clone(), kind)
                    })
            })
            .collect();

        let aggregator = Arc::new(Aggregator::new(tasks.iter().map(|t| t.key).collect()));
        let workers = self.worker_count(tasks.len());
        tracing::info!(
            "Dispatching {} task(s) to {} target(s) with {workers} worker(s)",
            tasks.len(),
            targets.len()
        );

        let context = Arc::new(WorkerContext {
            transport: self.transport,
            credential: self.credential,
            task_timeout: self.task_timeout,
            retry_policy: self.retry_policy,
            cancel: self.cancel,
            grace: self.grace,
            events: self.events,
            aggregator: Arc::clone(&aggregator),
            queue: Mutex::new(tasks),
        });

        let handles: Vec<_> = (0..workers)
            .map(|worker_id| tokio::spawn(worker_loop(worker_id, Arc::clone(&context))))
            .collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                tracing::error!("Dispatcher worker terminated abnormally: {e}");
            }
        }
        drop(context);

        match Arc::try_unwrap(aggregator) {
            Ok(aggregator) => aggregator.finalize(),
            // Unreachable once every worker has joined; report what is missing.
            Err(shared) => Err(AggregateError::IncompleteBatch {
                missing: shared.missing(),
            }),
        }
    }
}

struct WorkerContext {
    transport: Arc<dyn Transport>,
    credential: Arc<Credential>,
    task_timeout: Option<Duration>,
    retry_policy: Arc<dyn RetryPolicy>,
    cancel: CancellationToken,
    grace: Duration,
    events: Option<UnboundedSender<DispatchEvent>>,
    aggregator: Arc<Aggregator>,
    queue: Mutex<VecDeque<Task>>,
}

impl WorkerContext {
    fn next_task(&self) -> Option<Task> {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    fn emit(&self, event: DispatchEvent) {
        if let Some(events) = &self.events {
            // A dropped receiver only means nobody is watching
            let _ = events.send(event);
        }
    }

    fn finish(&self, outcome: Outcome) {
        self.aggregator.record(outcome.clone());
        self.emit(DispatchEvent::Finished(outcome));
    }
}

async fn worker_loop(worker_id: usize, context: Arc<WorkerContext>) {
    while let Some(task) = context.next_task() {
        if context.cancel.is_cancelled() {
            tracing::debug!("Worker {worker_id}: skipping {} after cancellation", task.target);
            context.finish(Outcome::cancelled(&task, 0, Duration::ZERO));
            continue;
        }

        let started = Instant::now();
        let handle = tokio::spawn(run_task(Arc::clone(&context), task.clone()));
        let outcome = match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Worker {worker_id}: task for {} panicked: {e}", task.target);
                Outcome::failed(
                    &task,
                    OutcomeDetail::None,
                    TaskError::new(ErrorKind::Internal, format!("task panicked: {e}")),
                    1,
                    started.elapsed(),
                )
            }
        };
        context.finish(outcome);
    }
}

/// Run all attempts of one task and return the outcome that counts.
///
/// The task timeout covers every attempt together with the delays between
/// them; a task still retrying when it expires is recorded as timed out.
async fn run_task(context: Arc<WorkerContext>, task: Task) -> Outcome {
    let clock = TaskClock::start(context.task_timeout);
    let mut attempt = 1;
    loop {
        context.emit(DispatchEvent::Started {
            key: task.key,
            target: task.target.clone(),
            attempt,
        });
        let outcome = run_attempt(&context, &task, attempt, &clock).await;

        if outcome.is_success()
            || context.cancel.is_cancelled()
            || !context.retry_policy.should_retry(&outcome, attempt)
        {
            return outcome;
        }

        let delay = context.retry_policy.delay(attempt);
        tracing::warn!(
            "{} attempt {attempt} failed ({}), retrying in {:?}",
            task.target,
            outcome
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("unknown error"),
            delay
        );
        context.aggregator.record(outcome);

        tokio::select! {
            biased;
            _ = context.cancel.cancelled() => {
                return Outcome::cancelled(&task, attempt, clock.elapsed());
            }
            _ = clock.expired() => {
                return clock.timed_out(&task, attempt);
            }
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Start time and optional deadline shared by every attempt of a task.
struct TaskClock {
    started: Instant,
    limit: Option<Duration>,
    deadline: Option<tokio::time::Instant>,
}

impl TaskClock {
    fn start(limit: Option<Duration>) -> Self {
        Self {
            started: Instant::now(),
            limit,
            deadline: limit.map(|limit| tokio::time::Instant::now() + limit),
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Resolves when the deadline passes; never without a timeout.
    async fn expired(&self) {
        match self.deadline {
            Some(deadline) => tokio::time::sleep_until(deadline).await,
            None => std::future::pending::<()>().await,
        }
    }

    fn timed_out(&self, task: &Task, attempt: u32) -> Outcome {
        match self.limit {
            Some(limit) => Outcome::timed_out(task, limit, attempt, self.elapsed()),
            None => Outcome::cancelled(task, attempt, self.elapsed()),
        }
    }
}

enum Step<T> {
    Done(T),
    TimedOut,
    Cancelled,
}

/// Drive `future` until it completes, the task deadline passes, or the
/// batch is cancelled and the grace period has elapsed.
async fn bounded<T>(
    context: &WorkerContext,
    clock: &TaskClock,
    future: impl Future<Output = T>,
) -> Step<T> {
    let cancelled = async {
        context.cancel.cancelled().await;
        tokio::time::sleep(context.grace).await;
    };

    tokio::select! {
        biased;
        output = future => Step::Done(output),
        _ = clock.expired() => Step::TimedOut,
        _ = cancelled => Step::Cancelled,
    }
}

async fn run_attempt(
    context: &WorkerContext,
    task: &Task,
    attempt: u32,
    clock: &TaskClock,
) -> Outcome {
    let interrupted = |step: Step<()>| match step {
        Step::TimedOut => clock.timed_out(task, attempt),
        _ => Outcome::cancelled(task, attempt, clock.elapsed()),
    };

    tracing::debug!("Connecting to {} (attempt {attempt})", task.target);
    let dial = context.transport.dial(&task.target, &context.credential);
    let mut connection = match bounded(context, clock, dial).await {
        Step::Done(Ok(connection)) => connection,
        Step::Done(Err(e)) => {
            return Outcome::failed(
                task,
                OutcomeDetail::None,
                TaskError::from_transport(&e),
                attempt,
                clock.elapsed(),
            )
        }
        Step::TimedOut => return interrupted(Step::TimedOut),
        Step::Cancelled => return interrupted(Step::Cancelled),
    };

    // A panic inside the operation must not skip the close below
    let operation = AssertUnwindSafe(execute(connection.as_mut(), &task.kind)).catch_unwind();
    let step = bounded(context, clock, operation).await;
    close_connection(context, &task.target, connection.as_mut()).await;
    let elapsed = clock.elapsed();

    match step {
        Step::Done(Ok(Ok((detail, None)))) => Outcome::succeeded(task, detail, attempt, elapsed),
        Step::Done(Ok(Ok((detail, Some(error))))) => {
            Outcome::failed(task, detail, error, attempt, elapsed)
        }
        Step::Done(Ok(Err(error))) => {
            Outcome::failed(task, OutcomeDetail::None, error, attempt, elapsed)
        }
        Step::Done(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            tracing::error!("Task for {} panicked: {message}", task.target);
            Outcome::failed(
                task,
                OutcomeDetail::None,
                TaskError::new(ErrorKind::Internal, format!("task panicked: {message}")),
                attempt,
                elapsed,
            )
        }
        Step::TimedOut => interrupted(Step::TimedOut),
        Step::Cancelled => interrupted(Step::Cancelled),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Perform the task's operation on an open connection.
///
/// A command that ran but failed keeps its captured output alongside the
/// error, so the report can show what the remote side printed.
async fn execute(
    connection: &mut dyn Connection,
    kind: &TaskKind,
) -> Result<(OutcomeDetail, Option<TaskError>), TaskError> {
    match kind {
        TaskKind::Command { command } => {
            let output = connection
                .run(command)
                .await
                .map_err(|e| TaskError::from_transport(&e))?;
            let error = TaskError::from_run_output(&output);
            let detail = OutcomeDetail::Output {
                stdout: output.stdout_string(),
                stderr: output.stderr_string(),
            };
            Ok((detail, error))
        }
        TaskKind::Upload {
            local_path,
            remote_dir,
            if_exists,
        } => {
            let transfer = connection
                .put_file(local_path, remote_dir, *if_exists)
                .await
                .map_err(|e| {
                    // Channel problems while uploading are still transfer failures
                    let kind = match e.kind() {
                        ErrorKind::RemoteExecution => ErrorKind::Transfer,
                        other => other,
                    };
                    TaskError::new(kind, e.to_string())
                })?;
            let detail = match transfer {
                Transfer::Written { bytes } => OutcomeDetail::Written { bytes },
                Transfer::Skipped => OutcomeDetail::Skipped,
            };
            Ok((detail, None))
        }
    }
}

async fn close_connection(context: &WorkerContext, target: &Target, connection: &mut dyn Connection) {
    match tokio::time::timeout(context.grace, connection.close()).await {
        Ok(Ok(())) => tracing::debug!("Closed connection to {target}"),
        Ok(Err(e)) => tracing::debug!("Closing connection to {target} failed: {e}"),
        Err(_) => tracing::warn!(
            "Closing connection to {target} did not finish within {:?}",
            context.grace
        ),
    }
}
