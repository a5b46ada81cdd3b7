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

//! Password authentication with a keyboard-interactive fallback.
//!
//! Many PAM-backed sshd configurations disable the plain `password` method
//! and only offer `keyboard-interactive`, in which case every prompt is
//! answered with the same password.

use russh::client::{Handle, Handler, KeyboardInteractiveAuthResponse};

use crate::credential::Credential;
use crate::transport::TransportError;

/// Upper bound on keyboard-interactive rounds before giving up
const MAX_INTERACTIVE_ROUNDS: usize = 8;

pub(super) async fn authenticate<H: Handler>(
    handle: &mut Handle<H>,
    credential: &Credential,
) -> Result<(), TransportError> {
    let user = credential.user();

    let result = handle
        .authenticate_password(user, credential.password())
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;
    if result.success() {
        return Ok(());
    }

    tracing::debug!("Password authentication rejected for {user}, trying keyboard-interactive");
    if keyboard_interactive(handle, credential).await? {
        Ok(())
    } else {
        Err(TransportError::Authentication {
            user: user.to_string(),
        })
    }
}

async fn keyboard_interactive<H: Handler>(
    handle: &mut Handle<H>,
    credential: &Credential,
) -> Result<bool, TransportError> {
    let mut response = handle
        .authenticate_keyboard_interactive_start(credential.user(), None::<String>)
        .await
        .map_err(|e| TransportError::Handshake(e.to_string()))?;

    for _ in 0..MAX_INTERACTIVE_ROUNDS {
        let prompts = match response {
            KeyboardInteractiveAuthResponse::Success => return Ok(true),
            KeyboardInteractiveAuthResponse::Failure { .. } => return Ok(false),
            KeyboardInteractiveAuthResponse::InfoRequest { prompts, .. } => prompts,
        };

        let answers = prompts
            .iter()
            .map(|_| credential.password().to_string())
            .collect::<Vec<_>>();
        response = handle
            .authenticate_keyboard_interactive_respond(answers)
            .await
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
    }

    Ok(false)
}
