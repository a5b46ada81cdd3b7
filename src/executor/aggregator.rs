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

//! Thread-safe collection of task outcomes and the final batch report.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use super::outcome::Outcome;
use super::task::{TaskKey, TaskStatus};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("batch finalized with {} task(s) missing an outcome: {}", .missing.len(), format_keys(.missing))]
    IncompleteBatch { missing: Vec<TaskKey> },
}

fn format_keys(keys: &[TaskKey]) -> String {
    keys.iter()
        .map(|key| key.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Collects one outcome per expected task.
///
/// `record` may be called concurrently from any worker. Recording a key
/// twice keeps the later outcome, which is how a retried task replaces its
/// earlier attempts.
#[derive(Debug)]
pub struct Aggregator {
    expected: Vec<TaskKey>,
    known: HashSet<TaskKey>,
    outcomes: Mutex<HashMap<TaskKey, Outcome>>,
}

impl Aggregator {
    /// `expected` must be in submission order; the report follows it.
    pub fn new(expected: Vec<TaskKey>) -> Self {
        let capacity = expected.len();
        let known = expected.iter().copied().collect();
        Self {
            expected,
            known,
            outcomes: Mutex::new(HashMap::with_capacity(capacity)),
        }
    }

    pub fn record(&self, outcome: Outcome) {
        if !self.known.contains(&outcome.key) {
            tracing::warn!("Ignoring outcome for unknown task {}", outcome.key);
            return;
        }
        let mut outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = outcomes.insert(outcome.key, outcome) {
            tracing::debug!(
                "Replaced outcome of {} (attempt {})",
                previous.key,
                previous.attempt
            );
        }
    }

    pub fn recorded(&self) -> usize {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Keys without an outcome yet, in submission order
    pub fn missing(&self) -> Vec<TaskKey> {
        let outcomes = self.outcomes.lock().unwrap_or_else(PoisonError::into_inner);
        self.expected
            .iter()
            .filter(|key| !outcomes.contains_key(key))
            .copied()
            .collect()
    }

    pub fn finalize(self) -> Result<BatchReport, AggregateError> {
        let mut outcomes = self
            .outcomes
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let missing: Vec<TaskKey> = self
            .expected
            .iter()
            .filter(|key| !outcomes.contains_key(key))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(AggregateError::IncompleteBatch { missing });
        }

        let ordered = self
            .expected
            .iter()
            .filter_map(|key| outcomes.remove(key))
            .collect();
        Ok(BatchReport::new(ordered))
    }
}

/// Overall result of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStatus {
    Success,
    Failure,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub succeeded: usize,
    pub failed: usize,
    pub timed_out: usize,
    pub cancelled: usize,
}

impl BatchCounts {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed + self.timed_out + self.cancelled
    }

    /// Everything that did not succeed
    pub fn unsuccessful(&self) -> usize {
        self.failed + self.timed_out + self.cancelled
    }
}

/// Final, ordered outcomes of a batch.
#[derive(Debug, Clone)]
pub struct BatchReport {
    outcomes: Vec<Outcome>,
    counts: BatchCounts,
}

impl BatchReport {
    pub fn new(outcomes: Vec<Outcome>) -> Self {
        let mut counts = BatchCounts::default();
        for outcome in &outcomes {
            match outcome.status {
                TaskStatus::Succeeded => counts.succeeded += 1,
                TaskStatus::TimedOut => counts.timed_out += 1,
                TaskStatus::Cancelled => counts.cancelled += 1,
                TaskStatus::Failed | TaskStatus::Pending | TaskStatus::Running => {
                    counts.failed += 1
                }
            }
        }
        Self { outcomes, counts }
    }

    pub fn outcomes(&self) -> &[Outcome] {
        &self.outcomes
    }

    pub fn counts(&self) -> BatchCounts {
        self.counts
    }

    pub fn status(&self) -> BatchStatus {
        if self.counts.unsuccessful() == 0 {
            BatchStatus::Success
        } else {
            BatchStatus::Failure
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() == BatchStatus::Success
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}
