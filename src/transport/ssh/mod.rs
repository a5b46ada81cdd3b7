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

//! SSH transport built on russh.
//!
//! Each [`SshConnection`] owns one authenticated session. Commands run on a
//! fresh exec channel and uploads on a fresh sftp subsystem channel, so a
//! connection can be reused for several operations when the caller wants to.

mod auth;
mod exec;
mod handler;
mod sftp;

use async_trait::async_trait;
use russh::client::{Config, Handle};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use self::handler::ClientHandler;
use super::{Connection, ExistingFilePolicy, RunOutput, Transfer, Transport, TransportError};
use crate::credential::Credential;
use crate::target::Target;

/// Default connect timeout, matches the historical `-t` default
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(60);

/// Dials hosts over SSH with password credentials.
#[derive(Clone)]
pub struct SshTransport {
    connect_timeout: Duration,
    config: Arc<Config>,
}

impl SshTransport {
    pub fn new(connect_timeout: Duration) -> Self {
        Self {
            connect_timeout,
            config: Arc::new(Config::default()),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    async fn connect(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> Result<SshConnection, TransportError> {
        let address = target.to_string();
        let connect_error = |source: io::Error| TransportError::Connect {
            address: address.clone(),
            source,
        };

        let socket_addrs = tokio::net::lookup_host((target.host.as_str(), target.port))
            .await
            .map_err(connect_error)?;

        let mut connect_res = Err(connect_error(io::Error::new(
            io::ErrorKind::InvalidInput,
            "could not resolve to any addresses",
        )));
        for socket_addr in socket_addrs {
            let handler = ClientHandler::new(address.clone());
            match russh::client::connect(self.config.clone(), socket_addr, handler).await {
                Ok(handle) => {
                    connect_res = Ok(handle);
                    break;
                }
                Err(russh::Error::IO(e)) => {
                    tracing::debug!("Connecting to {address} via {socket_addr} failed: {e}");
                    connect_res = Err(connect_error(e));
                }
                Err(e) => connect_res = Err(TransportError::Handshake(e.to_string())),
            }
        }
        let mut connection = SshConnection {
            handle: connect_res?,
            address,
            closed: false,
        };

        if let Err(e) = auth::authenticate(&mut connection.handle, credential).await {
            if let Err(close_err) = connection.close().await {
                tracing::debug!(
                    "Closing {} after failed authentication: {close_err}",
                    connection.address
                );
            }
            return Err(e);
        }
        tracing::debug!(
            "Authenticated to {} as {}",
            connection.address,
            credential.user()
        );

        Ok(connection)
    }
}

impl Default for SshTransport {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECT_TIMEOUT)
    }
}

#[async_trait]
impl Transport for SshTransport {
    async fn dial(
        &self,
        target: &Target,
        credential: &Credential,
    ) -> Result<Box<dyn Connection>, TransportError> {
        match tokio::time::timeout(self.connect_timeout, self.connect(target, credential)).await {
            Ok(Ok(connection)) => Ok(Box::new(connection)),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(TransportError::ConnectTimeout {
                address: target.to_string(),
                seconds: self.connect_timeout.as_secs(),
            }),
        }
    }
}

/// An authenticated russh session with one host.
pub struct SshConnection {
    handle: Handle<ClientHandler>,
    address: String,
    closed: bool,
}

impl std::fmt::Debug for SshConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshConnection")
            .field("address", &self.address)
            .field("closed", &self.closed)
            .finish()
    }
}

#[async_trait]
impl Connection for SshConnection {
    async fn run(&mut self, command: &str) -> Result<RunOutput, TransportError> {
        exec::run_command(&self.handle, command).await
    }

    async fn put_file(
        &mut self,
        local_path: &Path,
        remote_dir: &str,
        if_exists: ExistingFilePolicy,
    ) -> Result<Transfer, TransportError> {
        sftp::upload_file(&self.handle, local_path, remote_dir, if_exists).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if self.handle.is_closed() {
            return Ok(());
        }
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()))
    }
}
