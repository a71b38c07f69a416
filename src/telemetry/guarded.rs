use tracing::warn;

use crate::error::TelemetryError;
use crate::math::matrix::Matrix;
use crate::telemetry::sink::{HistogramSummary, TelemetrySink};
use crate::train::history::EpochRecord;

/// Wraps an optional sink so that its failures never reach training.
///
/// The first failing call (including `init`) logs a warning and disables
/// the sink for the rest of the run.
pub struct GuardedTelemetry {
    sink: Option<Box<dyn TelemetrySink>>,
}

impl GuardedTelemetry {
    pub fn new(sink: Box<dyn TelemetrySink>) -> GuardedTelemetry {
        GuardedTelemetry { sink: Some(sink) }
    }

    pub fn disabled() -> GuardedTelemetry {
        GuardedTelemetry { sink: None }
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    fn guard<F>(&mut self, what: &str, call: F)
    where
        F: FnOnce(&mut dyn TelemetrySink) -> Result<(), TelemetryError>,
    {
        if let Some(sink) = self.sink.as_deref_mut() {
            if let Err(error) = call(sink) {
                warn!(%error, call = what, "telemetry failed; continuing without it");
                self.sink = None;
            }
        }
    }

    pub fn init(&mut self, run_name: &str) {
        self.guard("init", |s| s.init(run_name));
    }

    pub fn scalar(&mut self, scope: &str, name: &str, value: f64, epoch: usize) {
        self.guard("scalar", |s| s.scalar(scope, name, value, epoch));
    }

    pub fn histograms(&mut self, params: &[(String, &Matrix)], epoch: usize) {
        for (name, tensor) in params {
            let summary = HistogramSummary::of(tensor);
            self.guard("histogram", |s| s.histogram(name, &summary, epoch));
        }
    }

    pub fn log_metrics(&mut self, record: &EpochRecord) {
        self.guard("log_metrics", |s| s.log_metrics(record));
    }

    pub fn finish(&mut self) {
        self.guard("finish", |s| s.finish());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Flaky {
        calls: Arc<Mutex<usize>>,
        fail_on: usize,
    }

    impl TelemetrySink for Flaky {
        fn scalar(&mut self, _: &str, _: &str, _: f64, _: usize) -> Result<(), TelemetryError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.fail_on {
                return Err(TelemetryError::Unavailable("down".into()));
            }
            Ok(())
        }
    }

    #[test]
    fn first_failure_disables_sink() {
        let calls = Arc::new(Mutex::new(0));
        let mut t = GuardedTelemetry::new(Box::new(Flaky { calls: Arc::clone(&calls), fail_on: 2 }));
        t.scalar("train", "loss", 1.0, 0);
        assert!(t.is_active());
        t.scalar("train", "loss", 1.0, 1);
        assert!(!t.is_active());
        t.scalar("train", "loss", 1.0, 2);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn failed_init_downgrades_to_disabled() {
        struct Down;
        impl TelemetrySink for Down {
            fn init(&mut self, _: &str) -> Result<(), TelemetryError> {
                Err(TelemetryError::Unavailable("no service".into()))
            }
            fn scalar(&mut self, _: &str, _: &str, _: f64, _: usize) -> Result<(), TelemetryError> {
                Ok(())
            }
        }
        let mut t = GuardedTelemetry::new(Box::new(Down));
        t.init("run");
        assert!(!t.is_active());
    }
}
