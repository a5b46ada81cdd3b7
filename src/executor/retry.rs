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

use std::time::Duration;

use super::outcome::{ErrorKind, Outcome};

pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Decides whether a failed attempt gets another try.
pub trait RetryPolicy: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that produced `outcome`.
    fn should_retry(&self, outcome: &Outcome, attempt: u32) -> bool;

    /// Pause before attempt `attempt + 1`.
    fn delay(&self, _attempt: u32) -> Duration {
        Duration::ZERO
    }
}

/// Retries connection failures only.
///
/// A command that reached the host and exited non-zero is never rerun since
/// it may not be idempotent; the same goes for partially written uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl ConnectRetryPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
        }
    }
}

impl Default for ConnectRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }
}

impl RetryPolicy for ConnectRetryPolicy {
    fn should_retry(&self, outcome: &Outcome, attempt: u32) -> bool {
        !outcome.is_success()
            && outcome.error_kind() == Some(ErrorKind::Connect)
            && attempt < self.max_attempts
    }

    fn delay(&self, _attempt: u32) -> Duration {
        self.retry_delay
    }
}

/// Never retries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _outcome: &Outcome, _attempt: u32) -> bool {
        false
    }
}
