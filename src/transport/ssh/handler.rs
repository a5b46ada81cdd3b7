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

use russh::client::Handler;
use russh::keys::{HashAlg, PublicKey};

/// Client-side event handler for an SSH session.
///
/// Fleet hosts are frequently re-imaged, so host keys are accepted without
/// a known_hosts lookup. The fingerprint is logged to keep an audit trail.
#[derive(Debug, Clone)]
pub struct ClientHandler {
    address: String,
}

impl ClientHandler {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

impl Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        tracing::debug!(
            "Accepting host key for {}: {}",
            self.address,
            server_public_key.fingerprint(HashAlg::Sha256)
        );
        Ok(true)
    }
}
