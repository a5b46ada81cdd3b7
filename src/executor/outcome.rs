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

//! Terminal results of task attempts.

use std::fmt;
use std::time::Duration;

use super::task::{Task, TaskKey, TaskKind, TaskStatus};
use crate::target::Target;
use crate::transport::{RunOutput, TransportError};

/// Failure category of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Dial, handshake or authentication failed; nothing ran remotely
    Connect,
    /// Command exited non-zero, was killed by a signal, or was rejected
    RemoteExecution,
    /// Reading the local file or writing the remote one failed
    Transfer,
    Timeout,
    Cancelled,
    /// The worker running the task panicked
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connect => "connect",
            Self::RemoteExecution => "remote execution",
            Self::Transfer => "transfer",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Structured task failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskError {
    pub kind: ErrorKind,
    pub message: String,
}

impl TaskError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn from_transport(error: &TransportError) -> Self {
        Self::new(error.kind(), error.to_string())
    }

    /// Classify a finished remote command; `None` when it succeeded.
    pub fn from_run_output(output: &RunOutput) -> Option<Self> {
        if output.is_success() {
            return None;
        }
        let message = match (&output.exit_signal, output.exit_status) {
            (Some(signal), _) => format!("terminated by signal {signal}"),
            (None, Some(126)) => "command not executable (exit status 126)".to_string(),
            (None, Some(status @ (127 | 255))) => {
                format!("command not found (exit status {status})")
            }
            (None, Some(status)) => format!("exit status {status}"),
            (None, None) => "no exit status reported".to_string(),
        };
        Some(Self::new(ErrorKind::RemoteExecution, message))
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            format!("did not finish within {}s", limit.as_secs_f64()),
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "batch was cancelled")
    }
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl std::error::Error for TaskError {}

/// Payload of an outcome, independent of success.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OutcomeDetail {
    /// Nothing was produced (failed before any remote work happened)
    #[default]
    None,
    /// Captured output of a command, present even when it exited non-zero
    Output { stdout: String, stderr: String },
    Written { bytes: u64 },
    /// Upload destination existed and the skip policy was in effect
    Skipped,
}

/// Terminal result of one task attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub key: TaskKey,
    pub target: Target,
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub detail: OutcomeDetail,
    pub error: Option<TaskError>,
    /// 1-based attempt number; 0 when the task never started
    pub attempt: u32,
    pub elapsed: Duration,
}

impl Outcome {
    fn from_task(task: &Task, status: TaskStatus, attempt: u32, elapsed: Duration) -> Self {
        Self {
            key: task.key,
            target: task.target.clone(),
            kind: task.kind.clone(),
            status,
            detail: OutcomeDetail::None,
            error: None,
            attempt,
            elapsed,
        }
    }

    pub fn succeeded(task: &Task, detail: OutcomeDetail, attempt: u32, elapsed: Duration) -> Self {
        Self {
            detail,
            ..Self::from_task(task, TaskStatus::Succeeded, attempt, elapsed)
        }
    }

    pub fn failed(
        task: &Task,
        detail: OutcomeDetail,
        error: TaskError,
        attempt: u32,
        elapsed: Duration,
    ) -> Self {
        Self {
            detail,
            error: Some(error),
            ..Self::from_task(task, TaskStatus::Failed, attempt, elapsed)
        }
    }

    pub fn timed_out(task: &Task, limit: Duration, attempt: u32, elapsed: Duration) -> Self {
        Self {
            error: Some(TaskError::timeout(limit)),
            ..Self::from_task(task, TaskStatus::TimedOut, attempt, elapsed)
        }
    }

    pub fn cancelled(task: &Task, attempt: u32, elapsed: Duration) -> Self {
        Self {
            error: Some(TaskError::cancelled()),
            ..Self::from_task(task, TaskStatus::Cancelled, attempt, elapsed)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.kind)
    }

    /// Captured stdout, empty for uploads and for failures before execution
    pub fn stdout(&self) -> &str {
        match &self.detail {
            OutcomeDetail::Output { stdout, .. } => stdout,
            _ => "",
        }
    }

    pub fn stderr(&self) -> &str {
        match &self.detail {
            OutcomeDetail::Output { stderr, .. } => stderr,
            _ => "",
        }
    }
}
