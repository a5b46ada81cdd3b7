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

use std::io;
use thiserror::Error;

use crate::executor::ErrorKind;

/// Errors reported by a [`Transport`](super::Transport) or one of its connections.
///
/// The variants are grouped by the stage that produced them so the executor
/// can classify failures without looking at message text:
/// dial/handshake/authentication problems happen before anything ran on the
/// remote host, everything else happens on an established connection.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {address}: {source}")]
    Connect {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("connection to {address} timed out after {seconds}s")]
    ConnectTimeout { address: String, seconds: u64 },

    #[error("SSH handshake failed: {0}")]
    Handshake(String),

    #[error("authentication failed for user '{user}'")]
    Authentication { user: String },

    #[error("SSH channel error: {0}")]
    Channel(String),

    #[error("remote command terminated without reporting an exit status")]
    NoExitStatus,

    #[error("cannot read local file {path}: {source}")]
    LocalFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("remote file {path} already exists")]
    RemoteFileExists { path: String },

    #[error("SFTP error: {0}")]
    Sftp(String),

    #[error("failed to close connection: {0}")]
    Disconnect(String),
}

impl TransportError {
    /// Category used to classify the owning task's failure.
    pub fn kind(&self) -> ErrorKind {
        if self.is_connect_failure() {
            ErrorKind::Connect
        } else if self.is_transfer_failure() {
            ErrorKind::Transfer
        } else {
            ErrorKind::RemoteExecution
        }
    }

    /// True when the error happened before a session was established.
    ///
    /// Nothing has been executed or written on the remote host in that case,
    /// which is what makes these failures safe to retry.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. }
                | Self::ConnectTimeout { .. }
                | Self::Handshake(_)
                | Self::Authentication { .. }
        )
    }

    /// True when the error came from moving file contents.
    pub fn is_transfer_failure(&self) -> bool {
        matches!(
            self,
            Self::LocalFile { .. } | Self::RemoteFileExists { .. } | Self::Sftp(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failures() {
        let refused = TransportError::Connect {
            address: "10.0.0.2:22".to_string(),
            source: io::Error::from(io::ErrorKind::ConnectionRefused),
        };
        assert!(refused.is_connect_failure());
        assert!(TransportError::Authentication {
            user: "root".to_string()
        }
        .is_connect_failure());
        assert!(!TransportError::NoExitStatus.is_connect_failure());
        assert!(!TransportError::Sftp("denied".to_string()).is_connect_failure());
    }

    #[test]
    fn test_transfer_failures() {
        assert!(TransportError::RemoteFileExists {
            path: "/tmp/a".to_string()
        }
        .is_transfer_failure());
        assert!(!TransportError::Channel("closed".to_string()).is_transfer_failure());
    }

    #[test]
    fn test_kind() {
        assert_eq!(
            TransportError::Handshake("kex".to_string()).kind(),
            ErrorKind::Connect
        );
        assert_eq!(TransportError::NoExitStatus.kind(), ErrorKind::RemoteExecution);
        assert_eq!(
            TransportError::RemoteFileExists {
                path: "/etc/hosts".to_string()
            }
            .kind(),
            ErrorKind::Transfer
        );
    }

    #[test]
    fn test_display_includes_address() {
        let err = TransportError::ConnectTimeout {
            address: "db1:22".to_string(),
            seconds: 60,
        };
        assert_eq!(err.to_string(), "connection to db1:22 timed out after 60s");
    }
}
