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

//! Remote-shell transport abstraction.
//!
//! The executor only talks to hosts through [`Transport`] and [`Connection`],
//! so the SSH implementation in [`ssh`] can be swapped for an in-process fake
//! in tests. A connection is owned by exactly one task attempt and is closed
//! by that attempt on every exit path.

mod error;
pub mod ssh;

pub use error::TransportError;
pub use ssh::SshTransport;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::credential::Credential;
use crate::target::Target;

/// Output of a remote command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Exit status reported by the remote shell, if any
    pub exit_status: Option<u32>,
    /// Name of the signal that terminated the command, if any
    pub exit_signal: Option<String>,
}

impl RunOutput {
    pub fn stdout_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).to_string()
    }

    pub fn stderr_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).to_string()
    }

    /// Exit status 0 and no terminating signal
    pub fn is_success(&self) -> bool {
        self.exit_status == Some(0) && self.exit_signal.is_none()
    }
}

/// What happened to a single uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Written { bytes: u64 },
    /// Destination existed and [`ExistingFilePolicy::Skip`] was requested
    Skipped,
}

/// Behavior when an upload destination already exists on the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExistingFilePolicy {
    #[default]
    Fail,
    Overwrite,
    Skip,
}

impl FromStr for ExistingFilePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "overwrite" => Ok(Self::Overwrite),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "invalid value '{other}' (expected fail, overwrite or skip)"
            )),
        }
    }
}

impl fmt::Display for ExistingFilePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Fail => "fail",
            Self::Overwrite => "overwrite",
            Self::Skip => "skip",
        };
        f.write_str(name)
    }
}

/// Factory for authenticated connections.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn dial(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> Result<Box<dyn Connection>, TransportError>;
}

/// An authenticated session with one host.
#[async_trait]
pub trait Connection: Send {
    /// Execute `command` in a fresh remote shell and collect its output.
    async fn run(&mut self, command: &str) -> Result<RunOutput, TransportError>;

    /// Copy `local_path` into `remote_dir`, keeping the file name.
    async fn put_file(
        &mut self,
        local_path: &Path,
        remote_dir: &str,
        if_exists: ExistingFilePolicy,
    ) -> Result<Transfer, TransportError>;

    /// Release the session. Called exactly once per connection.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Remote path for `local_path` placed inside `remote_dir`.
pub fn remote_file_path(local_path: &Path, remote_dir: &str) -> Result<String, TransportError> {
    let file_name = local_path
        .file_name()
        .ok_or_else(|| TransportError::LocalFile {
            path: local_path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no file name"),
        })?
        .to_string_lossy();

    let dir = remote_dir.trim_end_matches('/');
    if dir.is_empty() && remote_dir.starts_with('/') {
        Ok(format!("/{file_name}"))
    } else if dir.is_empty() {
        Ok(file_name.to_string())
    } else {
        Ok(format!("{dir}/{file_name}"))
    }
}
