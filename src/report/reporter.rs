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

//! Plain-text rendering of a batch report and the process exit code.
//!
//! The layout follows the historical tools: one `[target STATUS] N seconds`
//! header per task followed by its output, then a `SUCCESS: n, FAILURE: m`
//! summary line.

use owo_colors::{OwoColorize, Style};
use std::fmt::Write;

use crate::executor::{BatchReport, BatchStatus, Outcome, OutcomeDetail, TaskKind, TaskStatus};
use crate::utils::format_bytes;

/// Every task succeeded
pub const EXIT_SUCCESS: i32 = 0;
/// At least one task failed, timed out or was cancelled
pub const EXIT_BATCH_FAILURE: i32 = 1;
/// Invalid parameters or host specification; nothing was dispatched
pub const EXIT_PREFLIGHT: i32 = 2;

/// Check if stdout is an interactive terminal outside CI.
pub fn is_tty() -> bool {
    use std::io::IsTerminal;

    let is_terminal = std::io::stdout().is_terminal();
    let is_ci = std::env::var("CI").is_ok()
        || std::env::var("GITHUB_ACTIONS").is_ok()
        || std::env::var("GITLAB_CI").is_ok()
        || std::env::var("JENKINS_URL").is_ok();

    is_terminal && !is_ci
}

/// Colors are used only on a TTY, without `NO_COLOR`, and with a non-dumb `TERM`.
pub fn should_use_colors(no_color_flag: bool) -> bool {
    if no_color_flag || !is_tty() {
        return false;
    }
    if std::env::var_os("NO_COLOR").is_some() {
        return false;
    }
    !matches!(std::env::var("TERM").as_deref(), Ok("dumb"))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reporter {
    color: bool,
}

impl Reporter {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    /// Reporter with colors decided from the environment.
    pub fn detect(no_color_flag: bool) -> Self {
        Self::new(should_use_colors(no_color_flag))
    }

    pub fn exit_code(report: &BatchReport) -> i32 {
        match report.status() {
            BatchStatus::Success => EXIT_SUCCESS,
            BatchStatus::Failure => EXIT_BATCH_FAILURE,
        }
    }

    pub fn render(&self, report: &BatchReport) -> String {
        let mut out = String::new();
        for outcome in report.outcomes() {
            self.render_outcome(&mut out, outcome);
        }
        self.render_summary(&mut out, report);
        out
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    fn status_style(status: TaskStatus) -> Style {
        match status {
            TaskStatus::Succeeded => Style::new().green(),
            TaskStatus::TimedOut | TaskStatus::Cancelled => Style::new().yellow(),
            _ => Style::new().red(),
        }
    }

    fn render_outcome(&self, out: &mut String, outcome: &Outcome) {
        let status = self.paint(outcome.status.label(), Self::status_style(outcome.status));
        let target = self.paint(&outcome.target.to_string(), Style::new().bold());
        let _ = write!(out, "[{target} {status}] {:.2} seconds", outcome.elapsed.as_secs_f64());
        if outcome.attempt > 1 {
            let _ = write!(out, " (attempt {})", outcome.attempt);
        }
        out.push('\n');

        if let TaskKind::Upload {
            local_path,
            remote_dir,
            ..
        } = &outcome.kind
        {
            let _ = write!(out, "{} -> {remote_dir}", local_path.display());
            match &outcome.detail {
                OutcomeDetail::Written { bytes } => {
                    let _ = write!(out, ": {bytes} bytes ({})", format_bytes(*bytes));
                }
                OutcomeDetail::Skipped => out.push_str(": skipped, remote file exists"),
                _ => {}
            }
            out.push('\n');
        }

        push_block(out, outcome.stdout());
        let stderr = outcome.stderr();
        if !stderr.is_empty() {
            push_block(out, &self.paint(stderr, Style::new().dimmed()));
        }

        if let Some(error) = &outcome.error {
            let line = format!("{} error: {}", error.kind, error.message);
            out.push_str(&self.paint(&line, Self::status_style(outcome.status)));
            out.push('\n');
        }
    }

    fn render_summary(&self, out: &mut String, report: &BatchReport) {
        let counts = report.counts();
        let rule = "─".repeat(40);
        out.push_str(&self.paint(&rule, Style::new().dimmed()));
        out.push('\n');

        let success = format!("SUCCESS: {}", counts.succeeded);
        let failure = format!("FAILURE: {}", counts.unsuccessful());
        let _ = write!(
            out,
            "{}, {}",
            self.paint(&success, Style::new().green()),
            if counts.unsuccessful() > 0 {
                self.paint(&failure, Style::new().red())
            } else {
                failure
            }
        );
        if counts.timed_out > 0 || counts.cancelled > 0 {
            let _ = write!(
                out,
                " (TIMEOUT: {}, CANCELLED: {})",
                counts.timed_out, counts.cancelled
            );
        }
        out.push('\n');
    }
}

fn push_block(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    out.push_str(text);
    if !text.ends_with('\n') {
        out.push('\n');
    }
}
