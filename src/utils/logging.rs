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

use tracing_subscriber::EnvFilter;

/// Build the log filter for a `-v` count.
///
/// `RUST_LOG` takes precedence so russh internals can be traced without
/// changing the command line.
pub fn create_env_filter(verbosity: u8) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbosity {
            0 => EnvFilter::new("mooon=warn"),
            1 => EnvFilter::new("mooon=info"),
            // -vv: include russh debug logs for SSH troubleshooting
            2 => EnvFilter::new("mooon=debug,russh=debug"),
            _ => EnvFilter::new("mooon=trace,russh=trace,russh_sftp=debug"),
        }
    }
}

/// Install the global subscriber. Logs go to stderr so stdout only carries
/// the batch report.
///
/// Calling this more than once is harmless; later calls are ignored.
pub fn init_logging(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(create_env_filter(verbosity))
        .with_writer(std::io::stderr)
        .with_target(verbosity >= 2)
        .try_init();
}
