//! Benchmark harness
//!
//! Runs every file of a corpus through submit and wait, one file at a time,
//! and records how long each stage took. Failures are recorded per file and
//! never abort the run.

use anyhow::{Result, bail};
use std::path::{Path, PathBuf};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use bsub_client::{JobError, JobLifecycle, JobService, WaitOptions};
use bsub_core::bench::{BenchResult, BenchResultSet, BenchStatus};

/// Progress notifications emitted while a run is in flight
#[derive(Debug)]
pub enum BenchProgress<'a> {
    /// A file is about to be submitted
    Started { file: &'a str, size: u64 },
    /// The file was accepted by the service
    Submitted { job_id: Uuid, submit_ms: u64 },
    /// The file's row is complete
    Recorded(&'a BenchResult),
}

/// Drives files through a [`JobLifecycle`] and measures them
pub struct Harness<'a, S> {
    lifecycle: &'a JobLifecycle<S>,
    wait: WaitOptions,
    cancel: &'a CancellationToken,
}

impl<'a, S: JobService> Harness<'a, S> {
    pub fn new(
        lifecycle: &'a JobLifecycle<S>,
        wait: WaitOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            lifecycle,
            wait,
            cancel,
        }
    }

    /// Benchmark `files` sequentially as jobs of type `job_type`
    ///
    /// Stops early, keeping the rows recorded so far, once `cancel` fires.
    pub async fn run<P>(
        &self,
        files: &[PathBuf],
        job_type: &str,
        mut on_progress: P,
    ) -> BenchResultSet
    where
        P: FnMut(&BenchProgress<'_>),
    {
        let mut results = Vec::with_capacity(files.len());

        for path in files {
            if self.cancel.is_cancelled() {
                warn!("Benchmark cancelled after {} file(s)", results.len());
                break;
            }

            let result = self.measure(path, job_type, &mut on_progress).await;
            on_progress(&BenchProgress::Recorded(&result));
            results.push(result);
        }

        BenchResultSet::new(job_type, results)
    }

    async fn measure<P>(&self, path: &Path, job_type: &str, on_progress: &mut P) -> BenchResult
    where
        P: FnMut(&BenchProgress<'_>),
    {
        let file = file_name(path);

        let size = match tokio::fs::metadata(path).await {
            Ok(metadata) => metadata.len(),
            Err(err) => return BenchResult::failed(file, 0, BenchStatus::Error, err.to_string()),
        };

        on_progress(&BenchProgress::Started { file: &file, size });

        let started = Instant::now();
        let mut handle = match self.lifecycle.submit(path, job_type).await {
            Ok(handle) => handle,
            Err(err) => {
                debug!("Submit of {} failed: {}", file, err);
                return BenchResult::failed(
                    file,
                    size,
                    BenchStatus::SubmitFailed,
                    err.to_string(),
                );
            }
        };
        let submit_ms = elapsed_ms(started);

        on_progress(&BenchProgress::Submitted {
            job_id: handle.id(),
            submit_ms,
        });

        let waited = self
            .lifecycle
            .await_completion(&mut handle, &self.wait, self.cancel, |_| {})
            .await;
        let total_ms = elapsed_ms(started);

        let mut result = BenchResult {
            file,
            size,
            job_id: Some(handle.id()),
            submit_ms,
            total_ms,
            status: BenchStatus::Finished,
            error: None,
        };

        match waited {
            Ok(_) => {}
            Err(JobError::Failed(message)) => {
                result.status = BenchStatus::Failed;
                result.error = Some(message);
            }
            Err(err) => {
                result.status = BenchStatus::WaitFailed;
                result.total_ms = 0;
                result.error = Some(err.to_string());
            }
        }

        result
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Find the files in `dir` whose names match `pattern`, sorted by name
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("data directory not found: {}", dir.display())
        }
        Err(e) => bail!("failed to access data directory {}: {}", dir.display(), e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        if matches_pattern(pattern, &name.to_string_lossy()) {
            files.push(entry.path());
        }
    }

    if files.is_empty() {
        bail!(
            "no test files found in {} matching {}",
            dir.display(),
            pattern
        );
    }

    files.sort();
    Ok(files)
}

/// Shell-style match supporting `*`, `?` and `[...]` classes
fn matches_pattern(pattern: &str, name: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let name: Vec<char> = name.chars().collect();

    let (mut p, mut n) = (0, 0);
    // Position after the last `*` and the name index it was tried at
    let mut backtrack: Option<(usize, usize)> = None;

    while n < name.len() {
        // Pattern chars consumed when the current element matches name[n]
        let step = match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p + 1, n));
                p += 1;
                continue;
            }
            Some('?') => Some(1),
            Some('[') => match match_class(&pattern[p..], name[n]) {
                Some((matched, len)) => matched.then_some(len),
                None => (name[n] == '[').then_some(1),
            },
            Some(c) => (*c == name[n]).then_some(1),
            None => None,
        };

        match (step, backtrack) {
            (Some(len), _) => {
                p += len;
                n += 1;
            }
            (None, Some((bp, bn))) => {
                p = bp;
                n = bn + 1;
                backtrack = Some((bp, bn + 1));
            }
            (None, None) => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Match `c` against the class opening `class`
///
/// Supports `!`/`^` negation and `a-z` ranges. Returns whether `c` matched
/// and the class length including both brackets, or `None` when the class is
/// never closed (the `[` is then literal).
fn match_class(class: &[char], c: char) -> Option<(bool, usize)> {
    let mut i = 1;
    let negated = matches!(class.get(i), Some('!' | '^'));
    if negated {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    loop {
        let lo = *class.get(i)?;
        if lo == ']' && !first {
            break;
        }
        first = false;

        match (class.get(i + 1), class.get(i + 2)) {
            (Some('-'), Some(&hi)) if hi != ']' => {
                matched |= lo <= c && c <= hi;
                i += 3;
            }
            _ => {
                matched |= lo == c;
                i += 1;
            }
        }
    }

    Some((matched != negated, i + 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bsub_client::{ClientError, Result as ClientResult};
    use bsub_core::domain::job::{Job, JobStatus, JobType, ServerVersion};
    use bsub_core::dto::job::JobFilter;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Accepts every file except the ones named in `reject`; jobs take
    /// `polls` status checks to finish
    struct FakeService {
        reject: Vec<String>,
        fail_with: Option<String>,
        polls: Mutex<u32>,
    }

    impl FakeService {
        fn new(reject: &[&str]) -> Self {
            Self {
                reject: reject.iter().map(|s| s.to_string()).collect(),
                fail_with: None,
                polls: Mutex::new(0),
            }
        }
    }

    fn job(status: JobStatus, error_message: Option<String>) -> Job {
        Job {
            id: Uuid::new_v4(),
            job_type: Some("pdf_extract".to_string()),
            status,
            data_size: None,
            created_at: None,
            claimed_at: None,
            finished_at: None,
            claimed_by: None,
            error_message,
        }
    }

    #[async_trait]
    impl JobService for FakeService {
        async fn create_and_submit(
            &self,
            _job_type: &str,
            file_name: &str,
            _data: Vec<u8>,
        ) -> ClientResult<Job> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            if self.reject.iter().any(|r| r == file_name) {
                return Err(ClientError::api_error(400, "unsupported file"));
            }
            Ok(job(JobStatus::Pending, None))
        }

        async fn get_job(&self, _job_id: Uuid) -> ClientResult<Job> {
            let mut polls = self.polls.lock().unwrap();
            *polls += 1;
            if *polls % 2 == 1 {
                return Ok(job(JobStatus::Claimed, None));
            }
            match &self.fail_with {
                Some(message) => Ok(job(JobStatus::Failed, Some(message.clone()))),
                None => Ok(job(JobStatus::Finished, None)),
            }
        }

        async fn get_output(&self, _job_id: Uuid) -> ClientResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn get_logs(&self, _job_id: Uuid) -> ClientResult<Vec<u8>> {
            Ok(Vec::new())
        }

        async fn list_jobs(&self, _filter: &JobFilter) -> ClientResult<Vec<Job>> {
            Ok(Vec::new())
        }

        async fn cancel_job(&self, _job_id: Uuid) -> ClientResult<()> {
            Ok(())
        }

        async fn delete_job(&self, _job_id: Uuid) -> ClientResult<()> {
            Ok(())
        }

        async fn list_types(&self) -> ClientResult<Vec<JobType>> {
            Ok(Vec::new())
        }

        async fn server_version(&self) -> ClientResult<ServerVersion> {
            Ok(ServerVersion { version: None })
        }
    }

    fn corpus(names: &[&str]) -> (PathBuf, Vec<PathBuf>) {
        let dir = std::env::temp_dir().join(format!("bsub-bench-{}", Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let files = names
            .iter()
            .map(|name| {
                let path = dir.join(name);
                std::fs::write(&path, vec![0u8; 1000]).unwrap();
                path
            })
            .collect();
        (dir, files)
    }

    fn options() -> WaitOptions {
        WaitOptions {
            interval: Duration::from_secs(1),
            timeout: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_is_recorded_and_run_continues() {
        let (_dir, files) = corpus(&["1.pdf", "2.pdf", "3.pdf"]);
        let lifecycle = JobLifecycle::new(FakeService::new(&["2.pdf"]));
        let cancel = CancellationToken::new();

        let set = Harness::new(&lifecycle, options(), &cancel)
            .run(&files, "pdf_extract", |_| {})
            .await;

        assert_eq!(set.total_files(), 3);
        assert_eq!(set.results().len(), 3);
        assert_eq!(set.successful(), 2);

        let failed = &set.results()[1];
        assert_eq!(failed.file, "2.pdf");
        assert_eq!(failed.status, BenchStatus::SubmitFailed);
        assert_eq!(failed.total_ms, 0);
        assert!(failed.job_id.is_none());

        // Finished rows: 200ms submit, one 1s sleep between the two polls
        let finished = &set.results()[0];
        assert_eq!(finished.submit_ms, 200);
        assert_eq!(finished.total_ms, 1200);

        // Inclusive averages: the failed row counts with zero latencies
        assert_eq!(set.avg_submit_ms(), 400 / 3);
        assert_eq!(set.avg_total_ms(), 2400 / 3);
        assert_eq!(set.avg_success_total_ms(), 1200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_keeps_latency_and_message() {
        let (_dir, files) = corpus(&["a.pdf"]);
        let mut service = FakeService::new(&[]);
        service.fail_with = Some("bad input".to_string());
        let lifecycle = JobLifecycle::new(service);
        let cancel = CancellationToken::new();

        let set = Harness::new(&lifecycle, options(), &cancel)
            .run(&files, "pdf_extract", |_| {})
            .await;

        let row = &set.results()[0];
        assert_eq!(row.status, BenchStatus::Failed);
        assert_eq!(row.error.as_deref(), Some("bad input"));
        assert_eq!(row.total_ms, 1200);
        assert_eq!(set.successful(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_timeout_is_wait_failed() {
        let (_dir, files) = corpus(&["a.pdf"]);
        let lifecycle = JobLifecycle::new(FakeService::new(&[]));
        let cancel = CancellationToken::new();
        let wait = WaitOptions {
            interval: Duration::from_secs(5),
            timeout: Some(Duration::from_secs(2)),
        };

        let set = Harness::new(&lifecycle, wait, &cancel)
            .run(&files, "pdf_extract", |_| {})
            .await;

        let row = &set.results()[0];
        assert_eq!(row.status, BenchStatus::WaitFailed);
        assert!(row.job_id.is_some());
        assert_eq!(row.submit_ms, 200);
        assert!(row.error.as_deref().unwrap().contains("deadline"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_file_is_error_row() {
        let (dir, mut files) = corpus(&["a.pdf"]);
        files.insert(0, dir.join("gone.pdf"));
        let lifecycle = JobLifecycle::new(FakeService::new(&[]));
        let cancel = CancellationToken::new();

        let set = Harness::new(&lifecycle, options(), &cancel)
            .run(&files, "pdf_extract", |_| {})
            .await;

        assert_eq!(set.results()[0].status, BenchStatus::Error);
        assert_eq!(set.results()[1].status, BenchStatus::Finished);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_run_stops_before_next_file() {
        let (_dir, files) = corpus(&["a.pdf", "b.pdf"]);
        let lifecycle = JobLifecycle::new(FakeService::new(&[]));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let set = Harness::new(&lifecycle, options(), &cancel)
            .run(&files, "pdf_extract", |_| {})
            .await;

        assert_eq!(set.total_files(), 0);
    }

    #[test]
    fn test_pattern_matching() {
        assert!(matches_pattern("*.pdf", "report.pdf"));
        assert!(matches_pattern("*.pdf", ".pdf"));
        assert!(!matches_pattern("*.pdf", "report.pdf.bak"));
        assert!(matches_pattern("scan-??.png", "scan-01.png"));
        assert!(!matches_pattern("scan-??.png", "scan-1.png"));
        assert!(matches_pattern("*a*b*", "xxaxxbxx"));
        assert!(matches_pattern("*", "anything"));
        assert!(!matches_pattern("a*c", "abcd"));
    }

    #[test]
    fn test_pattern_character_classes() {
        assert!(matches_pattern("scan-[0-9].png", "scan-7.png"));
        assert!(!matches_pattern("scan-[0-9].png", "scan-x.png"));
        assert!(matches_pattern("*.[jp][pn]g", "photo.png"));
        assert!(matches_pattern("*.[jp][pn]g", "photo.jpg"));
        assert!(!matches_pattern("*.[jp][pn]g", "photo.gif"));
        assert!(matches_pattern("[!.]*", "report.pdf"));
        assert!(!matches_pattern("[!.]*", ".hidden"));
        assert!(matches_pattern("[^a-c]x", "dx"));
        assert!(!matches_pattern("[^a-c]x", "bx"));
        assert!(matches_pattern("[a-]", "-"));
        assert!(matches_pattern("[]]", "]"));
        assert!(matches_pattern("doc[1", "doc[1"));
        assert!(matches_pattern("*[0-9]*.pdf", "draft-2-final.pdf"));
    }

    #[test]
    fn test_discover_sorts_and_filters() {
        let (dir, _) = corpus(&["b.pdf", "a.pdf", "notes.txt"]);

        let files = discover(&dir, "*.pdf").unwrap();
        let names: Vec<String> = files.iter().map(|p| file_name(p)).collect();

        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
        assert!(discover(&dir, "*.docx").is_err());
        assert!(discover(&dir.join("missing"), "*.pdf").is_err());
    }
}
