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

//! Units of work handed to the dispatcher.

use std::fmt;
use std::path::PathBuf;

use crate::target::Target;
use crate::transport::ExistingFilePolicy;

/// What a task does on its target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    Command {
        command: String,
    },
    Upload {
        local_path: PathBuf,
        remote_dir: String,
        if_exists: ExistingFilePolicy,
    },
}

impl TaskKind {
    pub fn command(command: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
        }
    }

    pub fn upload(local_path: impl Into<PathBuf>, remote_dir: impl Into<String>) -> Self {
        Self::Upload {
            local_path: local_path.into(),
            remote_dir: remote_dir.into(),
            if_exists: ExistingFilePolicy::default(),
        }
    }

    pub fn is_upload(&self) -> bool {
        matches!(self, Self::Upload { .. })
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command { command } => write!(f, "run `{command}`"),
            Self::Upload {
                local_path,
                remote_dir,
                ..
            } => write!(f, "upload {} -> {remote_dir}", local_path.display()),
        }
    }
}

/// Identity of a task within a batch.
///
/// `target_index` is the position of the target in resolution order and
/// `file_index` the position of the operation produced for that target
/// (always 0 in command mode). Ordering keys sorts tasks in submission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    pub target_index: usize,
    pub file_index: usize,
}

impl TaskKey {
    pub const fn new(target_index: usize, file_index: usize) -> Self {
        Self {
            target_index,
            file_index,
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.target_index, self.file_index)
    }
}

/// Lifecycle of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    TimedOut,
    Cancelled,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCESS",
            Self::Failed => "FAILURE",
            Self::TimedOut => "TIMEOUT",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A unit of work bound to one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub key: TaskKey,
    pub target: Target,
    pub kind: TaskKind,
}

impl Task {
    pub fn new(key: TaskKey, target: Target, kind: TaskKind) -> Self {
        Self { key, target, kind }
    }
}
