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

//! Error types for host specification resolution

use thiserror::Error;

/// Errors that can occur while resolving a host specification into targets
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The whole specification is empty or whitespace
    #[error("host specification is empty")]
    EmptySpec,

    /// An entry between two commas is empty (e.g., `a,,b` or `a,b,`)
    #[error("empty host entry at position {position} in '{spec}'")]
    EmptyEntry { spec: String, position: usize },

    /// A `host:port` entry whose port is not a number in 1-65535
    #[error("invalid port '{port}' in host entry '{entry}'")]
    InvalidPort { entry: String, port: String },

    /// An entry that cannot be split into a host and an optional port
    #[error("malformed host entry '{entry}': {reason}")]
    MalformedEntry { entry: String, reason: String },

    /// A host name that is not a valid RFC 1123 name or address
    #[error("invalid host '{host}' in entry '{entry}': {reason}")]
    InvalidHost {
        entry: String,
        host: String,
        reason: String,
    },

    /// Unclosed bracket (e.g., `node[1-5`)
    #[error("unclosed bracket in '{expression}'")]
    UnclosedBracket { expression: String },

    /// Unmatched closing bracket (e.g., `node]1-5[`)
    #[error("unmatched closing bracket in '{expression}'")]
    UnmatchedBracket { expression: String },

    /// Invalid range syntax (e.g., `node[a-z]` or `node[]`)
    #[error("invalid range '{range}' in '{expression}'")]
    InvalidRange { expression: String, range: String },

    /// Reversed range (e.g., `node[5-1]`)
    #[error("reversed range '{start}-{end}' in '{expression}' (start must be <= end)")]
    ReversedRange {
        expression: String,
        start: u64,
        end: u64,
    },

    /// Range produces too many hosts
    #[error("'{expression}' expands to {count} hosts, exceeding limit of {limit}")]
    RangeTooLarge {
        expression: String,
        count: usize,
        limit: usize,
    },

    /// Error reading a `^path` host file
    #[error("failed to read host file '{path}': {reason}")]
    HostFile { path: String, reason: String },
}
