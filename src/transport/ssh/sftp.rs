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

use russh::client::Handle;
use russh_sftp::{client::SftpSession, protocol::OpenFlags};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use super::handler::ClientHandler;
use crate::transport::{remote_file_path, ExistingFilePolicy, Transfer, TransportError};

/// Chunk size used when streaming a local file to the remote side
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

/// Upload one file over a new SFTP subsystem channel.
///
/// The remote server must enable the sftp subsystem
/// (`Subsystem sftp internal-sftp` or the external `sftp-server`).
pub(super) async fn upload_file(
    handle: &Handle<ClientHandler>,
    local_path: &Path,
    remote_dir: &str,
    if_exists: ExistingFilePolicy,
) -> Result<Transfer, TransportError> {
    let local_error = |source: std::io::Error| TransportError::LocalFile {
        path: local_path.display().to_string(),
        source,
    };
    let sftp_error = |e: russh_sftp::client::error::Error| TransportError::Sftp(e.to_string());

    // Open the local side first so a missing source never touches the remote host
    let mut local = tokio::fs::File::open(local_path).await.map_err(local_error)?;
    let dest = remote_file_path(local_path, remote_dir)?;

    let channel = handle
        .channel_open_session()
        .await
        .map_err(|e| TransportError::Channel(e.to_string()))?;
    channel
        .request_subsystem(true, "sftp")
        .await
        .map_err(|e| TransportError::Channel(e.to_string()))?;
    let sftp = SftpSession::new(channel.into_stream())
        .await
        .map_err(sftp_error)?;

    if if_exists != ExistingFilePolicy::Overwrite
        && sftp.try_exists(dest.clone()).await.map_err(sftp_error)?
    {
        if if_exists == ExistingFilePolicy::Skip {
            tracing::debug!("Skipping existing remote file {dest}");
            return Ok(Transfer::Skipped);
        }
        return Err(TransportError::RemoteFileExists { path: dest });
    }

    let mut remote = sftp
        .open_with_flags(
            dest.clone(),
            OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
        )
        .await
        .map_err(sftp_error)?;

    let remote_io = |e: std::io::Error| TransportError::Sftp(format!("{dest}: {e}"));
    let mut buffer = vec![0u8; UPLOAD_CHUNK_SIZE];
    let mut bytes = 0u64;
    loop {
        let n = local.read(&mut buffer).await.map_err(local_error)?;
        if n == 0 {
            break;
        }
        remote.write_all(&buffer[..n]).await.map_err(remote_io)?;
        bytes += n as u64;
    }
    remote.flush().await.map_err(remote_io)?;
    remote.shutdown().await.map_err(remote_io)?;

    tracing::debug!("Uploaded {} ({bytes} bytes) to {dest}", local_path.display());
    Ok(Transfer::Written { bytes })
}
