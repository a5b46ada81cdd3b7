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
use russh::{ChannelMsg, Sig};

use super::handler::ClientHandler;
use crate::transport::{RunOutput, TransportError};

/// Initial stdout buffer capacity, matches a typical channel window packet
const STDOUT_BUFFER_SIZE: usize = 8192;
const STDERR_BUFFER_SIZE: usize = 1024;

/// Execute `command` on a fresh session channel and collect everything it writes.
///
/// Every invocation is a new shell context, so `cd` and variable assignments
/// do not carry over between calls.
pub(super) async fn run_command(
    handle: &Handle<ClientHandler>,
    command: &str,
) -> Result<RunOutput, TransportError> {
    let mut channel = handle
        .channel_open_session()
        .await
        .map_err(|e| TransportError::Channel(e.to_string()))?;
    channel
        .exec(true, command)
        .await
        .map_err(|e| TransportError::Channel(e.to_string()))?;

    let mut output = RunOutput {
        stdout: Vec::with_capacity(STDOUT_BUFFER_SIZE),
        stderr: Vec::with_capacity(STDERR_BUFFER_SIZE),
        exit_status: None,
        exit_signal: None,
    };

    while let Some(msg) = channel.wait().await {
        match msg {
            ChannelMsg::Data { ref data } => output.stdout.extend_from_slice(data),
            ChannelMsg::ExtendedData { ref data, ext } => {
                if ext == 1 {
                    output.stderr.extend_from_slice(data);
                }
            }
            // Exit status may arrive before the last data packet; keep reading
            // until the channel closes.
            ChannelMsg::ExitStatus { exit_status } => output.exit_status = Some(exit_status),
            ChannelMsg::ExitSignal { signal_name, .. } => {
                output.exit_signal = Some(signal_label(&signal_name));
            }
            _ => {}
        }
    }

    if output.exit_status.is_none() && output.exit_signal.is_none() {
        return Err(TransportError::NoExitStatus);
    }
    Ok(output)
}

fn signal_label(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{other:?}"),
    }
}
