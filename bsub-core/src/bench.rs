//! Benchmark result sets
//!
//! A [`BenchResultSet`] is produced once at the end of a benchmark run and is
//! never modified afterwards. It is stored as JSON so two runs can later be
//! compared with [`diff`].
//!
//! Averages are computed over every attempted file, including the ones that
//! failed and therefore carry zero latencies. This depresses the average as
//! failures increase; `avg_success_total_ms` gives the mean over successful
//! files only.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome of one benchmarked file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BenchStatus {
    #[serde(alias = "completed")]
    Finished,
    Failed,
    SubmitFailed,
    WaitFailed,
    Error,
    #[serde(other)]
    Unknown,
}

impl BenchStatus {
    pub fn is_success(self) -> bool {
        self == BenchStatus::Finished
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BenchStatus::Finished => "finished",
            BenchStatus::Failed => "failed",
            BenchStatus::SubmitFailed => "submit_failed",
            BenchStatus::WaitFailed => "wait_failed",
            BenchStatus::Error => "error",
            BenchStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for BenchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Measurement for a single input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResult {
    pub file: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    pub submit_ms: u64,
    pub total_ms: u64,
    pub status: BenchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BenchResult {
    /// Row for a file that never produced latency figures
    pub fn failed(
        file: impl Into<String>,
        size: u64,
        status: BenchStatus,
        error: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            size,
            job_id: None,
            submit_ms: 0,
            total_ms: 0,
            status,
            error: Some(error.into()),
        }
    }
}

/// All measurements of one benchmark run plus derived aggregates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchResultSet {
    job_type: String,
    total_files: usize,
    successful: usize,
    avg_submit_ms: u64,
    avg_total_ms: u64,
    #[serde(default)]
    avg_success_total_ms: u64,
    results: Vec<BenchResult>,
}

impl BenchResultSet {
    /// Build a result set and compute its aggregates
    pub fn new(job_type: impl Into<String>, results: Vec<BenchResult>) -> Self {
        let total_files = results.len();
        let successful = results.iter().filter(|r| r.status.is_success()).count();

        let submit_sum: u64 = results.iter().map(|r| r.submit_ms).sum();
        let total_sum: u64 = results.iter().map(|r| r.total_ms).sum();
        let success_sum: u64 = results
            .iter()
            .filter(|r| r.status.is_success())
            .map(|r| r.total_ms)
            .sum();

        Self {
            job_type: job_type.into(),
            total_files,
            successful,
            avg_submit_ms: mean(submit_sum, total_files),
            avg_total_ms: mean(total_sum, total_files),
            avg_success_total_ms: mean(success_sum, successful),
            results,
        }
    }

    pub fn job_type(&self) -> &str {
        &self.job_type
    }

    pub fn total_files(&self) -> usize {
        self.total_files
    }

    pub fn successful(&self) -> usize {
        self.successful
    }

    /// Mean submit latency over all rows
    pub fn avg_submit_ms(&self) -> u64 {
        self.avg_submit_ms
    }

    /// Mean total latency over all rows
    pub fn avg_total_ms(&self) -> u64 {
        self.avg_total_ms
    }

    /// Mean total latency over successful rows only
    pub fn avg_success_total_ms(&self) -> u64 {
        self.avg_success_total_ms
    }

    pub fn results(&self) -> &[BenchResult] {
        &self.results
    }
}

fn mean(sum: u64, count: usize) -> u64 {
    if count == 0 { 0 } else { sum / count as u64 }
}

/// Percentage change from `baseline` to `candidate`
///
/// Returns `None` when the baseline is zero.
pub fn percent_change(baseline: u64, candidate: u64) -> Option<f64> {
    if baseline == 0 {
        return None;
    }
    Some((candidate as f64 - baseline as f64) / baseline as f64 * 100.0)
}

/// Render a percentage change, `-` when there is nothing to compare
pub fn format_change(change: Option<f64>) -> String {
    match change {
        Some(pct) if pct > 0.0 => format!("+{:.1}%", pct),
        Some(pct) => format!("{:.1}%", pct),
        None => "-".to_string(),
    }
}

/// One line of a comparison
#[derive(Debug, Clone, PartialEq)]
pub struct DiffRow {
    pub label: String,
    pub baseline_ms: u64,
    /// `None` when the file is missing from the candidate set
    pub candidate_ms: Option<u64>,
    /// `None` when no comparison is possible
    pub change: Option<f64>,
}

/// Comparison of two result sets, joined by file name
#[derive(Debug, Clone, PartialEq)]
pub struct BenchDiff {
    pub baseline_job_type: String,
    pub candidate_job_type: String,
    pub rows: Vec<DiffRow>,
    pub summary: DiffRow,
}

/// Compare `candidate` against `baseline`
///
/// Rows follow the order of `baseline`. Files absent from `candidate` are
/// listed without a comparison; files that did not finish in either set are
/// left out. The summary compares the stored all-rows averages.
pub fn diff(baseline: &BenchResultSet, candidate: &BenchResultSet) -> BenchDiff {
    let mut rows = Vec::new();

    for base in baseline.results() {
        let Some(cand) = candidate.results().iter().find(|r| r.file == base.file) else {
            rows.push(DiffRow {
                label: base.file.clone(),
                baseline_ms: base.total_ms,
                candidate_ms: None,
                change: None,
            });
            continue;
        };

        if !base.status.is_success() || !cand.status.is_success() {
            continue;
        }

        rows.push(DiffRow {
            label: base.file.clone(),
            baseline_ms: base.total_ms,
            candidate_ms: Some(cand.total_ms),
            change: percent_change(base.total_ms, cand.total_ms),
        });
    }

    let summary = DiffRow {
        label: "Average".to_string(),
        baseline_ms: baseline.avg_total_ms(),
        candidate_ms: Some(candidate.avg_total_ms()),
        change: percent_change(baseline.avg_total_ms(), candidate.avg_total_ms()),
    };

    BenchDiff {
        baseline_job_type: baseline.job_type().to_string(),
        candidate_job_type: candidate.job_type().to_string(),
        rows,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finished(file: &str, submit_ms: u64, total_ms: u64) -> BenchResult {
        BenchResult {
            file: file.to_string(),
            size: 10_000,
            job_id: Some(Uuid::new_v4()),
            submit_ms,
            total_ms,
            status: BenchStatus::Finished,
            error: None,
        }
    }

    #[test]
    fn test_averages_include_failed_rows() {
        let set = BenchResultSet::new(
            "pdf_extract",
            vec![
                finished("a.pdf", 30, 900),
                BenchResult::failed("b.pdf", 2048, BenchStatus::SubmitFailed, "HTTP 500"),
                finished("c.pdf", 60, 1200),
            ],
        );

        assert_eq!(set.total_files(), 3);
        assert_eq!(set.successful(), 2);
        assert_eq!(set.avg_submit_ms(), 30);
        assert_eq!(set.avg_total_ms(), 700);
        assert_eq!(set.avg_success_total_ms(), 1050);
        assert_eq!(
            set.results().iter().filter(|r| r.status == BenchStatus::SubmitFailed).count(),
            1
        );
    }

    #[test]
    fn test_empty_set_has_zero_averages() {
        let set = BenchResultSet::new("pdf_extract", vec![]);
        assert_eq!(set.avg_total_ms(), 0);
        assert_eq!(set.avg_success_total_ms(), 0);
    }

    #[test]
    fn test_diff_against_itself_is_zero() {
        let set = BenchResultSet::new(
            "pdf_extract",
            vec![
                finished("a.pdf", 30, 900),
                BenchResult::failed("b.pdf", 10, BenchStatus::WaitFailed, "timed out"),
                finished("c.pdf", 60, 1200),
            ],
        );

        let report = diff(&set, &set);

        assert_eq!(report.rows.len(), 2);
        for row in &report.rows {
            assert_eq!(row.change, Some(0.0));
            assert_eq!(format_change(row.change), "0.0%");
        }
        assert_eq!(report.summary.change, Some(0.0));
    }

    #[test]
    fn test_diff_survives_json_storage() {
        let set = BenchResultSet::new(
            "pdf_extract",
            vec![finished("a.pdf", 30, 900), finished("b.pdf", 40, 1100)],
        );

        let stored = serde_json::to_string_pretty(&set).unwrap();
        let loaded: BenchResultSet = serde_json::from_str(&stored).unwrap();

        assert_eq!(loaded, set);
        assert!(diff(&set, &loaded).rows.iter().all(|r| r.change == Some(0.0)));
    }

    #[test]
    fn test_zero_baseline_has_no_percentage() {
        let baseline = BenchResultSet::new("a", vec![finished("a.pdf", 0, 0)]);
        let candidate = BenchResultSet::new("b", vec![finished("a.pdf", 10, 500)]);

        let report = diff(&baseline, &candidate);

        assert_eq!(report.rows[0].change, None);
        assert_eq!(format_change(report.rows[0].change), "-");
        assert_eq!(report.summary.change, None);
    }

    #[test]
    fn test_percent_change_sign() {
        assert_eq!(format_change(percent_change(1000, 1250)), "+25.0%");
        assert_eq!(format_change(percent_change(1000, 800)), "-20.0%");
    }

    #[test]
    fn test_missing_file_is_listed_without_comparison() {
        let baseline = BenchResultSet::new(
            "a",
            vec![finished("a.pdf", 10, 100), finished("b.pdf", 10, 200)],
        );
        let candidate = BenchResultSet::new("b", vec![finished("a.pdf", 10, 150)]);

        let report = diff(&baseline, &candidate);

        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[0].change, Some(50.0));
        assert_eq!(report.rows[1].label, "b.pdf");
        assert_eq!(report.rows[1].candidate_ms, None);
        assert_eq!(report.rows[1].change, None);
    }

    #[test]
    fn test_completed_is_read_as_finished() {
        let row: BenchResult = serde_json::from_str(
            r#"{"file":"a.pdf","size":1,"submit_ms":1,"total_ms":2,"status":"completed"}"#,
        )
        .unwrap();
        assert!(row.status.is_success());
    }
}
