use indicatif::{ProgressBar, ProgressStyle};

use crate::train::replica::{Mode, ReplicaResult};

/// Receives per-step progress of a pass. Purely observational.
pub trait ProgressReporter {
    fn start(&mut self, mode: Mode, expected_steps: usize);

    fn step(&mut self, mode: Mode, step: usize, reduced: ReplicaResult);

    fn finish(&mut self, mode: Mode);
}

/// Reports nothing.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn start(&mut self, _mode: Mode, _expected_steps: usize) {}

    fn step(&mut self, _mode: Mode, _step: usize, _reduced: ReplicaResult) {}

    fn finish(&mut self, _mode: Mode) {}
}

/// Terminal progress bar, one per pass.
#[derive(Debug, Default)]
pub struct BarProgress {
    bar: Option<ProgressBar>,
}

impl ProgressReporter for BarProgress {
    fn start(&mut self, mode: Mode, expected_steps: usize) {
        let bar = ProgressBar::new(expected_steps as u64);
        if let Ok(style) = ProgressStyle::with_template("{prefix:>10} [{bar:30}] {pos}/{len} {msg}") {
            bar.set_style(style.progress_chars("=> "));
        }
        bar.set_prefix(mode.as_str());
        self.bar = Some(bar);
    }

    fn step(&mut self, _mode: Mode, step: usize, reduced: ReplicaResult) {
        if let Some(bar) = &self.bar {
            bar.set_position(step as u64 + 1);
            bar.set_message(format!("loss {:.4} dice {:.4}", reduced.loss, reduced.metric));
        }
    }

    fn finish(&mut self, _mode: Mode) {
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }
}
