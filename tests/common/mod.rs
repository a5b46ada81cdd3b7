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

//! Scripted in-process transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mooon::credential::Credential;
use mooon::target::Target;
use mooon::transport::{
    Connection, ExistingFilePolicy, RunOutput, Transfer, Transport, TransportError,
};

/// How a scripted host behaves.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Command prints `stdout` and exits with `exit_status`
    Run { stdout: String, exit_status: u32 },
    /// Command is killed by a signal
    Signal(String),
    /// Dial fails with connection refused
    Refuse,
    /// Dial fails `n` times with connection refused, then behaves like `then`
    RefuseTimes(usize, Box<Behavior>),
    /// Dial takes the given time, then fails with connection refused
    SlowRefuse(Duration),
    /// Dial never completes
    HangOnDial,
    /// Dial succeeds, the command never completes
    HangOnRun,
    /// Uploads fail with an SFTP error
    TransferError(String),
    /// Dial succeeds, running the command panics
    PanicOnRun,
}

impl Behavior {
    pub fn ok(stdout: &str) -> Self {
        Self::Run {
            stdout: stdout.to_string(),
            exit_status: 0,
        }
    }

    pub fn exit(exit_status: u32) -> Self {
        Self::Run {
            stdout: String::new(),
            exit_status,
        }
    }
}

#[derive(Debug, Default)]
pub struct Stats {
    pub dials: AtomicUsize,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    dials_per_host: Mutex<HashMap<String, usize>>,
    dial_order: Mutex<Vec<String>>,
    uploads: Mutex<Vec<(String, String)>>,
}

impl Stats {
    pub fn dials_for(&self, host: &str) -> usize {
        self.dials_per_host
            .lock()
            .unwrap()
            .get(host)
            .copied()
            .unwrap_or(0)
    }

    pub fn dial_order(&self) -> Vec<String> {
        self.dial_order.lock().unwrap().clone()
    }

    /// `(host, remote path)` pairs written so far
    pub fn uploads(&self) -> Vec<(String, String)> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlightGuard {
            stats: Arc::clone(self),
        }
    }
}

/// Counts an attempt as in flight until dropped.
struct InFlightGuard {
    stats: Arc<Stats>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockTransport {
    behaviors: HashMap<String, Behavior>,
    default: Behavior,
    latency: Duration,
    pub stats: Arc<Stats>,
}

impl MockTransport {
    pub fn new(default: Behavior) -> Self {
        Self {
            behaviors: HashMap::new(),
            default,
            latency: Duration::ZERO,
            stats: Arc::new(Stats::default()),
        }
    }

    pub fn with_host(mut self, host: &str, behavior: Behavior) -> Self {
        self.behaviors.insert(host.to_string(), behavior);
        self
    }

    /// Time every command or upload takes
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn behavior_for(&self, host: &str, dial_number: usize) -> Behavior {
        let behavior = self.behaviors.get(host).unwrap_or(&self.default).clone();
        match behavior {
            Behavior::RefuseTimes(n, then) if dial_number > n => *then,
            Behavior::RefuseTimes(..) => Behavior::Refuse,
            other => other,
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn dial(
        &self,
        target: &Target,
        _credential: &Credential,
    ) -> Result<Box<dyn Connection>, TransportError> {
        let guard = self.stats.enter();
        self.stats.dials.fetch_add(1, Ordering::SeqCst);
        self.stats.dial_order.lock().unwrap().push(target.host.clone());
        let dial_number = {
            let mut per_host = self.stats.dials_per_host.lock().unwrap();
            let count = per_host.entry(target.host.clone()).or_insert(0);
            *count += 1;
            *count
        };

        match self.behavior_for(&target.host, dial_number) {
            Behavior::Refuse => Err(TransportError::Connect {
                address: target.to_string(),
                source: io::Error::from(io::ErrorKind::ConnectionRefused),
            }),
            Behavior::SlowRefuse(delay) => {
                tokio::time::sleep(delay).await;
                Err(TransportError::Connect {
                    address: target.to_string(),
                    source: io::Error::from(io::ErrorKind::ConnectionRefused),
                })
            }
            Behavior::HangOnDial => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            behavior => {
                self.stats.opened.fetch_add(1, Ordering::SeqCst);
                Ok(Box::new(MockConnection {
                    host: target.host.clone(),
                    behavior,
                    latency: self.latency,
                    stats: Arc::clone(&self.stats),
                    _guard: guard,
                }))
            }
        }
    }
}

pub struct MockConnection {
    host: String,
    behavior: Behavior,
    latency: Duration,
    stats: Arc<Stats>,
    _guard: InFlightGuard,
}

#[async_trait]
impl Connection for MockConnection {
    async fn run(&mut self, _command: &str) -> Result<RunOutput, TransportError> {
        tokio::time::sleep(self.latency).await;
        match &self.behavior {
            Behavior::Run {
                stdout,
                exit_status,
            } => Ok(RunOutput {
                stdout: stdout.as_bytes().to_vec(),
                stderr: Vec::new(),
                exit_status: Some(*exit_status),
                exit_signal: None,
            }),
            Behavior::Signal(signal) => Ok(RunOutput {
                exit_signal: Some(signal.clone()),
                ..Default::default()
            }),
            Behavior::HangOnRun => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Behavior::PanicOnRun => panic!("command handler crashed on {}", self.host),
            other => Err(TransportError::Channel(format!("unexpected behavior {other:?}"))),
        }
    }

    async fn put_file(
        &mut self,
        local_path: &Path,
        remote_dir: &str,
        _if_exists: ExistingFilePolicy,
    ) -> Result<Transfer, TransportError> {
        tokio::time::sleep(self.latency).await;
        if let Behavior::HangOnRun = self.behavior {
            std::future::pending::<()>().await;
        }
        if let Behavior::TransferError(message) = &self.behavior {
            return Err(TransportError::Sftp(message.clone()));
        }
        let bytes = tokio::fs::metadata(local_path)
            .await
            .map_err(|source| TransportError::LocalFile {
                path: local_path.display().to_string(),
                source,
            })?
            .len();
        let remote = mooon::transport::remote_file_path(local_path, remote_dir)?;
        self.stats
            .uploads
            .lock()
            .unwrap()
            .push((self.host.clone(), remote));
        Ok(Transfer::Written { bytes })
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.stats.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub fn credential() -> Arc<Credential> {
    Arc::new(Credential::new("root", "secret"))
}

pub fn targets(hosts: &[&str]) -> Vec<Target> {
    hosts.iter().map(|host| Target::new(*host, 22)).collect()
}
