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

//! Concurrent execution of a batch of tasks across many targets.

mod aggregator;
mod dispatcher;
mod outcome;
mod retry;
mod task;

pub use aggregator::{AggregateError, Aggregator, BatchCounts, BatchReport, BatchStatus};
pub use dispatcher::{DispatchEvent, Dispatcher, DEFAULT_CONCURRENCY, DEFAULT_GRACE};
pub use outcome::{ErrorKind, Outcome, OutcomeDetail, TaskError};
pub use retry::{
    ConnectRetryPolicy, NoRetry, RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY,
};
pub use task::{Task, TaskKey, TaskKind, TaskStatus};
