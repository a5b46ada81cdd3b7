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

//! Validated, immutable batch configuration.
//!
//! Everything that can be checked without touching the network is checked
//! here, so a bad parameter never results in a partial batch.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::cli::{ConnectionArgs, SshArgs, UploadArgs};
use crate::credential::Credential;
use crate::executor::{TaskKind, DEFAULT_CONCURRENCY};
use crate::target::{self, ResolveError, Target};
use crate::transport::ExistingFilePolicy;
use crate::utils::fs::{is_glob_pattern, resolve_source_files};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter {flag} is not set{}", env_hint(.env))]
    Missing {
        flag: &'static str,
        env: Option<&'static str>,
    },

    #[error("parameter {flag} is empty")]
    Empty { flag: &'static str },

    #[error("parameter {flag} has an invalid value '{value}': {reason}")]
    InvalidValue {
        flag: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid host specification: {0}")]
    Resolve(#[from] ResolveError),

    #[error("invalid source pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("source pattern '{pattern}' matches no files")]
    UnmatchedSource { pattern: String },

    #[error("source '{path}' is a directory; use a pattern such as '{path}/*'")]
    SourceIsDirectory { path: String },

    #[error("several sources share the file name '{name}' and would overwrite each other")]
    DuplicateFileName { name: String },
}

fn env_hint(env: &Option<&'static str>) -> String {
    match env {
        Some(var) => format!(" (or set the {var} environment variable)"),
        None => String::new(),
    }
}

/// What every task of the batch does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Command {
        command: String,
    },
    Upload {
        files: Vec<PathBuf>,
        remote_dir: String,
        if_exists: ExistingFilePolicy,
    },
}

impl Operation {
    /// Tasks for one target: one in command mode, one per file in upload mode.
    pub fn tasks_for(&self, _target: &Target) -> Vec<TaskKind> {
        match self {
            Self::Command { command } => vec![TaskKind::Command {
                command: command.clone(),
            }],
            Self::Upload {
                files,
                remote_dir,
                if_exists,
            } => files
                .iter()
                .map(|file| TaskKind::Upload {
                    local_path: file.clone(),
                    remote_dir: remote_dir.clone(),
                    if_exists: *if_exists,
                })
                .collect(),
        }
    }

    pub fn tasks_per_target(&self) -> usize {
        match self {
            Self::Command { .. } => 1,
            Self::Upload { files, .. } => files.len(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchConfig {
    pub targets: Vec<Target>,
    pub credential: Arc<Credential>,
    pub operation: Operation,
    pub connect_timeout: Duration,
    /// Worker bound handed to the dispatcher; 0 means unbounded
    pub concurrency: usize,
    pub task_timeout: Option<Duration>,
    pub max_attempts: u32,
    pub grace: Duration,
    pub verbosity: u8,
    pub no_color: bool,
    pub progress: bool,
}

impl BatchConfig {
    pub fn from_ssh_args(args: &SshArgs) -> Result<Self, ConfigError> {
        let command = required(args.command.as_deref(), "-c", None)?;
        Self::build(
            &args.connection,
            Operation::Command {
                command: command.to_string(),
            },
        )
    }

    pub fn from_upload_args(args: &UploadArgs) -> Result<Self, ConfigError> {
        let sources = required(args.sources.as_deref(), "-s", None)?;
        let remote_dir = required(args.destination.as_deref(), "-d", None)?;
        let files = resolve_sources(sources)?;
        Self::build(
            &args.connection,
            Operation::Upload {
                files,
                remote_dir: remote_dir.trim().to_string(),
                if_exists: args.if_exists,
            },
        )
    }

    fn build(args: &ConnectionArgs, operation: Operation) -> Result<Self, ConfigError> {
        let hosts = required(args.hosts.as_deref(), "-h", Some("H"))?;
        let user = required(args.user.as_deref(), "-u", Some("U"))?;
        let password = required(args.password.as_deref(), "-p", Some("P"))?;
        if args.port == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "-P",
                value: args.port.to_string(),
                reason: "port must be between 1 and 65535".to_string(),
            });
        }

        let targets = target::resolve(hosts, args.port)?;

        Ok(Self {
            targets,
            credential: Arc::new(Credential::new(user.trim(), password)),
            operation,
            connect_timeout: Duration::from_secs(args.connect_timeout),
            concurrency: args.concurrency.unwrap_or(DEFAULT_CONCURRENCY),
            task_timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
            max_attempts: args.retries.max(1),
            grace: Duration::from_secs(args.grace),
            verbosity: args.verbose,
            no_color: args.no_color,
            progress: !args.no_progress,
        })
    }

    pub fn task_count(&self) -> usize {
        self.targets.len() * self.operation.tasks_per_target()
    }
}

/// A parameter must be present and not blank. The value is returned as
/// given, so passwords keep surrounding whitespace.
fn required<'a>(
    value: Option<&'a str>,
    flag: &'static str,
    env: Option<&'static str>,
) -> Result<&'a str, ConfigError> {
    match value {
        None => Err(ConfigError::Missing { flag, env }),
        Some(v) if v.trim().is_empty() => Err(ConfigError::Empty { flag }),
        Some(v) => Ok(v),
    }
}

/// Expand the comma-separated `-s` list into local files.
///
/// Literal paths are kept as given, even if they do not exist yet: a missing
/// file is reported per host as a transfer failure. Glob patterns must match
/// at least one regular file.
pub fn resolve_sources(spec: &str) -> Result<Vec<PathBuf>, ConfigError> {
    let mut files = Vec::new();
    for entry in spec.split(',').map(str::trim) {
        if entry.is_empty() {
            return Err(ConfigError::Empty { flag: "-s" });
        }
        if is_glob_pattern(entry) {
            let matched =
                resolve_source_files(entry).map_err(|e| ConfigError::InvalidPattern {
                    pattern: entry.to_string(),
                    reason: e.to_string(),
                })?;
            if matched.is_empty() {
                return Err(ConfigError::UnmatchedSource {
                    pattern: entry.to_string(),
                });
            }
            files.extend(matched);
        } else {
            let path = PathBuf::from(entry);
            if path.is_dir() {
                return Err(ConfigError::SourceIsDirectory {
                    path: entry.to_string(),
                });
            }
            files.push(path);
        }
    }

    let mut seen = HashSet::new();
    files.retain(|file| seen.insert(file.clone()));

    let mut names = HashSet::new();
    for file in &files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| ConfigError::InvalidValue {
                flag: "-s",
                value: file.display().to_string(),
                reason: "path has no file name".to_string(),
            })?;
        if !names.insert(name.clone()) {
            return Err(ConfigError::DuplicateFileName { name });
        }
    }

    Ok(files)
}
