use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use serde::Serialize;
use serde_json::json;

use crate::error::TelemetryError;
use crate::math::matrix::Matrix;
use crate::train::history::EpochRecord;

/// Compact summary of a parameter tensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSummary {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std: f64,
    /// Counts over equal-width buckets spanning [min, max].
    pub counts: Vec<usize>,
}

impl HistogramSummary {
    pub const BUCKETS: usize = 10;

    pub fn of(tensor: &Matrix) -> HistogramSummary {
        let values: Vec<f64> = tensor.values().collect();
        if values.is_empty() {
            return HistogramSummary { min: 0.0, max: 0.0, mean: 0.0, std: 0.0, counts: vec![0; Self::BUCKETS] };
        }
        let n = values.len() as f64;
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        let mut counts = vec![0; Self::BUCKETS];
        let width = (max - min) / Self::BUCKETS as f64;
        for v in values {
            let bucket = if width > 0.0 { ((v - min) / width) as usize } else { 0 };
            counts[bucket.min(Self::BUCKETS - 1)] += 1;
        }
        HistogramSummary { min, max, mean, std, counts }
    }
}

/// External scalar logging / run tracking.
///
/// Every method may fail; the orchestrator treats failures as non-fatal.
pub trait TelemetrySink: Send {
    fn init(&mut self, _run_name: &str) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// `scope` is the pass the value belongs to ("train" or "validation").
    fn scalar(&mut self, scope: &str, name: &str, value: f64, epoch: usize) -> Result<(), TelemetryError>;

    fn histogram(&mut self, _name: &str, _summary: &HistogramSummary, _epoch: usize) -> Result<(), TelemetryError> {
        Ok(())
    }

    /// Per-epoch metric dict for run tracking.
    fn log_metrics(&mut self, _record: &EpochRecord) -> Result<(), TelemetryError> {
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NoopTelemetry;

impl TelemetrySink for NoopTelemetry {
    fn scalar(&mut self, _scope: &str, _name: &str, _value: f64, _epoch: usize) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Appends one JSON object per event to a file.
#[derive(Debug)]
pub struct JsonlTelemetry {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl JsonlTelemetry {
    pub fn new(path: impl Into<PathBuf>) -> JsonlTelemetry {
        JsonlTelemetry { path: path.into(), writer: None }
    }

    fn write(&mut self, event: serde_json::Value) -> Result<(), TelemetryError> {
        let writer = self.writer.as_mut()
            .ok_or_else(|| TelemetryError::Unavailable(format!("{} not opened", self.path.display())))?;
        serde_json::to_writer(&mut *writer, &event)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl TelemetrySink for JsonlTelemetry {
    fn init(&mut self, run_name: &str) -> Result<(), TelemetryError> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.writer = Some(BufWriter::new(file));
        self.write(json!({ "event": "init", "run": run_name }))
    }

    fn scalar(&mut self, scope: &str, name: &str, value: f64, epoch: usize) -> Result<(), TelemetryError> {
        self.write(json!({ "event": "scalar", "scope": scope, "name": name, "value": value, "epoch": epoch }))
    }

    fn histogram(&mut self, name: &str, summary: &HistogramSummary, epoch: usize) -> Result<(), TelemetryError> {
        self.write(json!({ "event": "histogram", "name": name, "epoch": epoch, "summary": summary }))
    }

    fn log_metrics(&mut self, record: &EpochRecord) -> Result<(), TelemetryError> {
        self.write(json!({ "event": "metrics", "metrics": record }))
    }

    fn finish(&mut self) -> Result<(), TelemetryError> {
        self.write(json!({ "event": "finish" }))?;
        self.writer = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_buckets_cover_range() {
        let m = Matrix::from_data(vec![vec![0.0, 1.0, 2.0, 10.0]]);
        let h = HistogramSummary::of(&m);
        assert_eq!((h.min, h.max), (0.0, 10.0));
        assert_eq!(h.counts.iter().sum::<usize>(), 4);
        assert_eq!(h.counts[0], 1);
        assert_eq!(h.counts[9], 1);
        assert!((h.mean - 3.25).abs() < 1e-12);
    }

    #[test]
    fn jsonl_writes_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.jsonl");
        let mut sink = JsonlTelemetry::new(&path);
        sink.init("run").unwrap();
        sink.scalar("train", "loss", 0.5, 0).unwrap();
        sink.finish().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1]["name"], "loss");
        assert_eq!(lines[1]["value"], 0.5);
    }

    #[test]
    fn jsonl_without_init_is_unavailable() {
        let mut sink = JsonlTelemetry::new("unused.jsonl");
        assert!(matches!(sink.scalar("train", "loss", 0.1, 0), Err(TelemetryError::Unavailable(_))));
    }
}
