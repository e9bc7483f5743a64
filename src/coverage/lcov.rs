// src/coverage/lcov.rs

//! Minimal lcov tracefile reader, enough to summarise a report.

use std::fmt;

/// Totals over every `SF:` record of an lcov report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoverageSummary {
    pub files: usize,
    pub lines_found: u64,
    pub lines_hit: u64,
    pub branches_found: u64,
    pub branches_hit: u64,
}

impl CoverageSummary {
    pub fn is_empty(&self) -> bool {
        self.files == 0
    }

    /// Line coverage in percent; `None` when no lines were instrumented.
    pub fn line_rate(&self) -> Option<f64> {
        (self.lines_found > 0).then(|| self.lines_hit as f64 * 100.0 / self.lines_found as f64)
    }

    pub fn branch_rate(&self) -> Option<f64> {
        (self.branches_found > 0)
            .then(|| self.branches_hit as f64 * 100.0 / self.branches_found as f64)
    }
}

impl fmt::Display for CoverageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} files, lines {}/{}", self.files, self.lines_hit, self.lines_found)?;
        if let Some(rate) = self.line_rate() {
            write!(f, " ({rate:.1}%)")?;
        }
        if let Some(rate) = self.branch_rate() {
            write!(
                f,
                ", branches {}/{} ({rate:.1}%)",
                self.branches_hit, self.branches_found
            )?;
        }
        Ok(())
    }
}

/// Summarise an lcov report.
///
/// Uses the `LF`/`LH`/`BRF`/`BRH` totals when a record has them and falls back
/// to counting `DA:` lines otherwise. Unknown lines are ignored.
pub fn summarize(report: &str) -> CoverageSummary {
    let mut summary = CoverageSummary::default();
    let mut record = Record::default();

    for line in report.lines().map(str::trim) {
        if line.starts_with("SF:") {
            record = Record::default();
            summary.files += 1;
        } else if let Some(rest) = line.strip_prefix("DA:") {
            record.da_found += 1;
            let hits = rest.split(',').nth(1).and_then(|h| h.parse::<u64>().ok());
            if hits.is_some_and(|h| h > 0) {
                record.da_hit += 1;
            }
        } else if let Some(v) = line.strip_prefix("LF:") {
            record.lf = v.parse().ok();
        } else if let Some(v) = line.strip_prefix("LH:") {
            record.lh = v.parse().ok();
        } else if let Some(v) = line.strip_prefix("BRF:") {
            record.brf = v.parse().unwrap_or(0);
        } else if let Some(v) = line.strip_prefix("BRH:") {
            record.brh = v.parse().unwrap_or(0);
        } else if line == "end_of_record" {
            summary.lines_found += record.lf.unwrap_or(record.da_found);
            summary.lines_hit += record.lh.unwrap_or(record.da_hit);
            summary.branches_found += record.brf;
            summary.branches_hit += record.brh;
            record = Record::default();
        }
    }

    summary
}

#[derive(Default)]
struct Record {
    da_found: u64,
    da_hit: u64,
    lf: Option<u64>,
    lh: Option<u64>,
    brf: u64,
    brh: u64,
}
