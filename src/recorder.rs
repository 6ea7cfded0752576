use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};

use crate::frames::{DetectionError, DetectionReport};

/// Writes detection outcomes as JSON lines, one report or failure per line.
pub struct ReportWriter<W: Write> {
    writer: W,
    reports: usize,
    failures: usize,
}

impl ReportWriter<BufWriter<File>> {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create report file {}", path.display()))?;
        Ok(Self::new(BufWriter::new(file)))
    }
}

impl<W: Write> ReportWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            reports: 0,
            failures: 0,
        }
    }

    pub fn write_report(&mut self, report: &DetectionReport) -> Result<()> {
        serde_json::to_writer(&mut self.writer, report).context("failed to serialize report")?;
        writeln!(self.writer)?;
        self.reports += 1;
        Ok(())
    }

    /// Failures are recorded with their key so the caller can reschedule them.
    pub fn write_failure(&mut self, error: &DetectionError) -> Result<()> {
        let line = serde_json::json!({
            "key": error.key,
            "error": error.source.to_string(),
            "retryable": error.is_retryable(),
        });
        serde_json::to_writer(&mut self.writer, &line).context("failed to serialize failure")?;
        writeln!(self.writer)?;
        self.failures += 1;
        Ok(())
    }

    pub fn counts(&self) -> (usize, usize) {
        (self.reports, self.failures)
    }

    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frames::FrameError;
    use crate::types::SessionKey;

    #[test]
    fn writes_one_line_per_outcome() {
        let report = DetectionReport {
            key: SessionKey::new("O17", "s1"),
            bin_width: 30,
            series_start: 0,
            series_len: 10,
            windows: vec![],
        };
        let failure = DetectionError::new(
            SessionKey::new("O18", "s2"),
            FrameError::IncompleteCoverage {
                required: 12,
                covered: 8,
            },
        );
        let mut writer = ReportWriter::new(Vec::new());
        writer.write_report(&report).unwrap();
        writer.write_failure(&failure).unwrap();
        assert_eq!(writer.counts(), (1, 1));

        let bytes = writer.finish().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: DetectionReport = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed, report);
        let failure_line: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(failure_line["retryable"], true);
        assert_eq!(failure_line["key"]["specimen_id"], "O18");
    }
}
