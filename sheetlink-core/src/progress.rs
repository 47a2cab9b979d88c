//! Progress reporting for uploads and job monitoring.
//!
//! The CLI uses `IndicatifReporter` for user-visible progress bars.
//! Library callers can use `NoopReporter` or provide their own implementation.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Trait for reporting progress of a long-running operation.
pub trait ProgressReporter: Send + Sync {
    /// Begin a new task with an optional total count.
    fn start(&self, task: &str, total: Option<u64>);

    /// Move to an absolute position (bytes sent, percent complete).
    fn set_position(&self, pos: u64);

    /// Replace the status line shown next to the bar.
    fn set_status(&self, status: &str);

    /// Mark the current task as finished.
    fn finish(&self);

    /// Display an informational message.
    fn message(&self, msg: &str);
}

/// No-op reporter for library callers that don't need progress output.
#[derive(Debug, Default)]
pub struct NoopReporter;

impl ProgressReporter for NoopReporter {
    fn start(&self, _task: &str, _total: Option<u64>) {}
    fn set_position(&self, _pos: u64) {}
    fn set_status(&self, _status: &str) {}
    fn finish(&self) {}
    fn message(&self, _msg: &str) {}
}

/// Reporter backed by an `indicatif` progress bar for CLI use.
#[derive(Debug)]
pub struct IndicatifReporter {
    bar: ProgressBar,
}

impl Default for IndicatifReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatifReporter {
    /// Bar drawn on stderr.
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    /// Bar that draws nothing; for `--quiet` and tests.
    pub fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        Self {
            bar: ProgressBar::with_draw_target(None, target),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
}

impl ProgressReporter for IndicatifReporter {
    fn start(&self, task: &str, total: Option<u64>) {
        if let Some(total) = total {
            self.bar.set_length(total);
            self.bar.set_style(style(
                "{spinner:.green} {prefix} [{bar:30.cyan/blue}] {pos}/{len} {msg}",
            ));
        } else {
            self.bar.set_length(0);
            self.bar.set_style(style("{spinner:.green} {prefix} {msg}"));
        }
        self.bar.set_prefix(task.to_string());
        self.bar.set_message(String::new());
        self.bar.reset();
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn set_status(&self, status: &str) {
        self.bar.set_message(status.to_string());
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }

    fn message(&self, msg: &str) {
        self.bar.println(msg);
    }
}
