use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

#[derive(Serialize)]
struct ScalarPoint<'a> {
    tag: &'a str,
    value: f64,
    step: usize,
}

/// Sink for live scalar metrics emitted while a benchmark runs.
pub trait MetricsSink {
    fn scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()>;
}

/// Appends scalar points as JSON lines, flushed per point so the series
/// is readable while the run is still going.
pub struct JsonlSink {
    out: BufWriter<File>,
}

impl JsonlSink {
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating metrics dir {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        Ok(Self {
            out: BufWriter::new(file),
        })
    }
}

impl MetricsSink for JsonlSink {
    fn scalar(&mut self, tag: &str, value: f64, step: usize) -> Result<()> {
        let line = serde_json::to_string(&ScalarPoint { tag, value, step })?;
        writeln!(self.out, "{}", line)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Log a whole curve as one scalar per position.
pub fn log_curve(sink: &mut dyn MetricsSink, tag: &str, curve: &[f64]) -> Result<()> {
    for (i, v) in curve.iter().enumerate() {
        sink.scalar(tag, *v, i)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sink_writes_one_json_line_per_point() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("metrics.jsonl");
        let mut sink = JsonlSink::create(&path).unwrap();
        sink.scalar("roc_value", 0.75, 0).unwrap();
        log_curve(&mut sink, "roc_curve", &[0.0, 1.0]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0]["tag"], "roc_value");
        assert_eq!(lines[0]["value"], 0.75);
        assert_eq!(lines[2]["tag"], "roc_curve");
        assert_eq!(lines[2]["step"], 1);
    }
}
