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

//! SSH transport against an in-process russh server that rejects every
//! login attempt.

use std::sync::Arc;
use std::time::Duration;

use mooon::credential::Credential;
use mooon::target::Target;
use mooon::transport::{SshTransport, Transport, TransportError};
use russh::keys::{Algorithm, PrivateKey};
use russh::server::{Auth, Config};
use tokio::net::TcpListener;

struct RejectingHandler;

impl russh::server::Handler for RejectingHandler {
    type Error = russh::Error;

    async fn auth_password(&mut self, _user: &str, _password: &str) -> Result<Auth, Self::Error> {
        Ok(Auth::Reject {
            proceed_with_methods: None,
            partial_success: false,
        })
    }
}

fn server_config() -> Arc<Config> {
    let key = PrivateKey::random(&mut rand::thread_rng(), Algorithm::Ed25519).unwrap();
    Arc::new(Config {
        keys: vec![key],
        auth_rejection_time: Duration::ZERO,
        auth_rejection_time_initial: Some(Duration::ZERO),
        ..Default::default()
    })
}

#[tokio::test]
async fn test_rejected_login_is_authentication_failure_and_session_ends() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    let config = server_config();

    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let session = russh::server::run_stream(config, stream, RejectingHandler)
            .await
            .unwrap();
        // Resolves once the client has closed the session
        let _ = session.await;
    });

    let transport = SshTransport::new(Duration::from_secs(10));
    let err = transport
        .dial(
            &Target::new("127.0.0.1", port),
            &Credential::new("deploy", "wrong-password"),
        )
        .await
        .err()
        .unwrap();

    assert!(
        matches!(err, TransportError::Authentication { ref user } if user == "deploy"),
        "unexpected error: {err}"
    );
    assert!(err.is_connect_failure());

    tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server session still open after failed authentication")
        .unwrap();
}
