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

//! Live status display fed by dispatcher events.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use owo_colors::{OwoColorize, Style};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::executor::{DispatchEvent, Outcome, TaskKey, TaskStatus};
use crate::target::Target;

const PROGRESS_BAR_TICK_RATE_MS: u64 = 80;
const MAX_PREFIX_WIDTH: usize = 24;

fn spinner_style(color: bool) -> ProgressStyle {
    let template = if color {
        "{prefix:.bold} {spinner:.cyan} {msg}"
    } else {
        "{prefix} {spinner} {msg}"
    };
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ ")
}

fn overall_style(color: bool) -> ProgressStyle {
    let template = if color {
        "{spinner:.cyan} [{elapsed_precise}] {bar:30.cyan/blue} {pos}/{len} {msg}"
    } else {
        "{spinner} [{elapsed_precise}] {bar:30} {pos}/{len} {msg}"
    };
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

fn format_target_display(target: &Target) -> String {
    let display = target.to_string();
    if display.chars().count() > MAX_PREFIX_WIDTH {
        let truncated: String = display.chars().take(MAX_PREFIX_WIDTH - 3).collect();
        format!("{truncated}...")
    } else {
        display
    }
}

/// Spinners for in-flight tasks above an overall completion bar.
pub struct ProgressView {
    multi: MultiProgress,
    overall: ProgressBar,
    active: HashMap<TaskKey, ProgressBar>,
    failures: u64,
    color: bool,
}

impl ProgressView {
    pub fn new(total: usize, color: bool) -> Self {
        let multi = MultiProgress::new();
        let overall = multi.add(ProgressBar::new(total as u64));
        overall.set_style(overall_style(color));
        overall.enable_steady_tick(Duration::from_millis(PROGRESS_BAR_TICK_RATE_MS));
        Self {
            multi,
            overall,
            active: HashMap::new(),
            failures: 0,
            color,
        }
    }

    fn paint(&self, text: &str, style: Style) -> String {
        if self.color {
            text.style(style).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn handle(&mut self, event: DispatchEvent) {
        match event {
            DispatchEvent::Started {
                key,
                target,
                attempt,
            } => {
                let message = if attempt > 1 {
                    format!("Retrying (attempt {attempt})...")
                } else {
                    "Running...".to_string()
                };
                let message = self.paint(&message, Style::new().cyan());
                let pb = self.active.entry(key).or_insert_with(|| {
                    let pb = self
                        .multi
                        .insert_before(&self.overall, ProgressBar::new_spinner());
                    pb.set_style(spinner_style(self.color));
                    pb.set_prefix(format!("[{}]", format_target_display(&target)));
                    pb.enable_steady_tick(Duration::from_millis(PROGRESS_BAR_TICK_RATE_MS));
                    pb
                });
                pb.set_message(message);
            }
            DispatchEvent::Finished(outcome) => self.finish(&outcome),
        }
    }

    fn finish(&mut self, outcome: &Outcome) {
        if let Some(pb) = self.active.remove(&outcome.key) {
            pb.finish_and_clear();
        }
        if !outcome.is_success() {
            self.failures += 1;
            self.overall.println(self.failure_line(outcome));
        }
        self.overall.inc(1);
        if self.failures > 0 {
            let message = self.paint(&format!("{} failed", self.failures), Style::new().red());
            self.overall.set_message(message);
        }
    }

    fn failure_line(&self, outcome: &Outcome) -> String {
        let reason = outcome
            .error
            .as_ref()
            .map(|e| e.message.as_str())
            .unwrap_or_default();
        let status_style = match outcome.status {
            TaskStatus::TimedOut | TaskStatus::Cancelled => Style::new().yellow(),
            _ => Style::new().red(),
        };
        format!(
            "{} {} {} {reason}",
            self.paint("●", Style::new().red()),
            self.paint(&format_target_display(&outcome.target), Style::new().bold()),
            self.paint(outcome.status.label(), status_style)
        )
    }

    pub fn finish_all(&mut self) {
        for (_, pb) in self.active.drain() {
            pb.finish_and_clear();
        }
        self.overall.finish_and_clear();
    }
}

/// Consume events until the dispatcher drops its sender.
pub async fn run_progress(
    total: usize,
    color: bool,
    mut events: UnboundedReceiver<DispatchEvent>,
) {
    let mut view = ProgressView::new(total, color);
    while let Some(event) = events.recv().await {
        view.handle(event);
    }
    view.finish_all();
}

/// Drain events without drawing anything.
pub async fn drain_events(mut events: UnboundedReceiver<DispatchEvent>) {
    while events.recv().await.is_some() {}
}
