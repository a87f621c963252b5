//! background batch jobs
//!
//! large historical files are imported on tokio's blocking pool.
//! job state lives in a synchronized map from submission until it
//! expires through `cleanup_expired`

use crate::batch::{BatchResult, CancelToken, HistoricalBatchSplitter};
use crate::importer::{ImportOutcome, Importer};
use crate::Result;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde_derive::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

pub type JobId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    pub id: JobId,
    pub filename: String,
    pub status: JobStatus,
    /// dates attempted so far
    pub current: usize,
    pub total: usize,
    pub last_date: Option<NaiveDate>,
    pub submitted_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub result: Option<BatchResult>,
}

struct Job {
    state: JobState,
    cancel: CancelToken,
    touched: Instant,
}

/// answer of `BatchJobs::import`
#[derive(Debug)]
pub enum Submission {
    /// imported on the caller's thread
    Done(ImportOutcome),
    /// running in background
    Queued(JobId),
}

type JobMap = Arc<Mutex<HashMap<JobId, Job>>>;

// job state stays readable even if a worker panicked while holding the map
fn lock_jobs(jobs: &JobMap) -> MutexGuard<'_, HashMap<JobId, Job>> {
    match jobs.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn update<F>(jobs: &JobMap, id: JobId, f: F)
where
    F: FnOnce(&mut JobState),
{
    if let Some(job) = lock_jobs(jobs).get_mut(&id) {
        f(&mut job.state);
        job.state.updated_at = Local::now().naive_local();
        job.touched = Instant::now();
    }
}

#[derive(Clone)]
pub struct BatchJobs {
    importer: Arc<Importer>,
    jobs: JobMap,
    next_id: Arc<AtomicU64>,
}

impl BatchJobs {
    pub fn new(importer: Arc<Importer>) -> Self {
        BatchJobs {
            importer,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// routes the content like `Importer::import`, but historical content
    /// of at least `async_line_threshold` lines is queued in background.
    /// queuing requires a running tokio runtime
    pub fn import(&self, content: String, filename: String, overwrite: bool) -> Result<Submission> {
        let detection = self.importer.detect(&content, &filename)?;
        let n_lines = content.lines().filter(|l| !l.trim().is_empty()).count();
        if detection.kind.is_multi_date() && n_lines >= self.importer.config().async_line_threshold {
            let (id, _handle) = self.submit(content, filename, overwrite);
            return Ok(Submission::Queued(id));
        }
        let outcome = self.importer.import(&content, &filename, overwrite)?;
        Ok(Submission::Done(outcome))
    }

    /// starts a batch on the blocking pool, must be called within a tokio runtime
    pub fn submit(
        &self,
        content: String,
        filename: String,
        overwrite: bool,
    ) -> (JobId, JoinHandle<BatchResult>) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let cancel = CancelToken::new();
        let now = Local::now().naive_local();
        lock_jobs(&self.jobs).insert(
            id,
            Job {
                state: JobState {
                    id,
                    filename: filename.clone(),
                    status: JobStatus::Running,
                    current: 0,
                    total: 0,
                    last_date: None,
                    submitted_at: now,
                    updated_at: now,
                    result: None,
                },
                cancel: cancel.clone(),
                touched: Instant::now(),
            },
        );
        log::info!("batch job {} submitted for {}", id, filename);

        let importer = Arc::clone(&self.importer);
        let jobs = Arc::clone(&self.jobs);
        let handle = tokio::task::spawn_blocking(move || {
            let result = HistoricalBatchSplitter::new(&importer)
                .overwrite(overwrite)
                .cancel_token(cancel)
                .run(&content, &filename, |current, total, date, _| {
                    update(&jobs, id, |s| {
                        s.current = current;
                        s.total = total;
                        s.last_date = Some(date);
                    });
                });
            update(&jobs, id, |s| {
                s.total = result.total_dates;
                s.status = if result.cancelled {
                    JobStatus::Cancelled
                } else {
                    JobStatus::Completed
                };
                s.result = Some(result.clone());
            });
            log::info!("batch job {} finished, success={}", id, result.success);
            result
        });
        (id, handle)
    }

    pub fn get(&self, id: JobId) -> Option<JobState> {
        lock_jobs(&self.jobs).get(&id).map(|j| j.state.clone())
    }

    /// all known jobs ordered by id
    pub fn list(&self) -> Vec<JobState> {
        let mut states: Vec<JobState> = lock_jobs(&self.jobs)
            .values()
            .map(|j| j.state.clone())
            .collect();
        states.sort_by_key(|s| s.id);
        states
    }

    /// requests cancellation, returns false if the job is unknown or finished
    pub fn cancel(&self, id: JobId) -> bool {
        match lock_jobs(&self.jobs).get(&id) {
            Some(job) if job.state.status == JobStatus::Running => {
                job.cancel.cancel();
                log::info!("batch job {} cancellation requested", id);
                true
            }
            _ => false,
        }
    }

    /// drops finished jobs not updated within `max_age`,
    /// running jobs are always kept
    pub fn cleanup_expired(&self, max_age: Duration) -> usize {
        let mut jobs = lock_jobs(&self.jobs);
        let before = jobs.len();
        jobs.retain(|_, j| j.state.status == JobStatus::Running || j.touched.elapsed() < max_age);
        let removed = before - jobs.len();
        if removed > 0 {
            log::debug!("{} expired batch jobs removed", removed);
        }
        removed
    }

    /// cleanup with the configured retention
    pub fn cleanup(&self) -> usize {
        let hours = self.importer.config().job_retention_hours;
        self.cleanup_expired(Duration::from_secs(hours * 3600))
    }
}
