//! Parallel analysis of many images.
//!
//! Jobs are fed through a channel to a fixed set of worker threads. Each image
//! is analyzed independently; the only shared state is the read-only
//! configuration. A per-image wall-clock budget can be imposed, and an overrun
//! is reported like a failed analysis.

use chrono::{DateTime, Local};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::DetectorConfig;
use crate::input::{load_detections, load_gray, load_mask};
use crate::pipeline::{analyze, AnalysisInput, AnalysisReport};

/// One image to analyze.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Position in the batch (0-based); outcomes are returned in this order
    pub id: usize,
    pub mask_path: PathBuf,
    pub gray_path: Option<PathBuf>,
    pub ocr_path: Option<PathBuf>,
    /// When the job was queued
    pub queued_at: DateTime<Local>,
}

impl BatchJob {
    pub fn new(id: usize, mask_path: PathBuf) -> Self {
        Self {
            id,
            mask_path,
            gray_path: None,
            ocr_path: None,
            queued_at: Local::now(),
        }
    }

    pub fn with_gray(mut self, gray_path: PathBuf) -> Self {
        self.gray_path = Some(gray_path);
        self
    }

    pub fn with_ocr(mut self, ocr_path: PathBuf) -> Self {
        self.ocr_path = Some(ocr_path);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    /// Worker threads; 0 means one per available core
    pub workers: usize,
    /// Analyses taking longer than this count as failed
    pub per_image_budget: Option<Duration>,
    /// Masks have dark keys on a light background
    pub invert_mask: bool,
}

impl BatchOptions {
    fn worker_count(&self, jobs: usize) -> usize {
        let wanted = if self.workers == 0 {
            thread::available_parallelism().map(|n| n.get()).unwrap_or(1)
        } else {
            self.workers
        };
        wanted.min(jobs).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    Completed,
    Failed { reason: String },
    TimedOut { budget_ms: u64 },
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchOutcome {
    pub id: usize,
    pub mask_path: PathBuf,
    pub elapsed_ms: f64,
    #[serde(flatten)]
    pub status: BatchStatus,
    /// Present only for completed jobs
    pub report: Option<AnalysisReport>,
}

/// Creates the job queue: the sender side feeds workers, the receiver side is
/// shared between them.
pub fn create_job_queue() -> (Sender<BatchJob>, Receiver<BatchJob>) {
    channel()
}

fn load_and_analyze(
    job: &BatchJob,
    config: &DetectorConfig,
    invert_mask: bool,
) -> anyhow::Result<AnalysisReport> {
    let mask = load_mask(&job.mask_path, invert_mask)?;
    let gray = job.gray_path.as_deref().map(load_gray).transpose()?;
    let detections = job.ocr_path.as_deref().map(load_detections).transpose()?;

    let mut input = AnalysisInput::new(&mask);
    if let Some(gray) = &gray {
        input = input.with_gray(gray);
    }
    if let Some(detections) = &detections {
        input = input.with_ocr(detections);
    }
    Ok(analyze(&input, config)?)
}

/// Analyzes a single job and times it against the budget.
pub fn run_job(job: &BatchJob, config: &DetectorConfig, options: &BatchOptions) -> BatchOutcome {
    let started = Instant::now();
    let result = load_and_analyze(job, config, options.invert_mask);
    let elapsed = started.elapsed();

    let (status, report) = match result {
        Ok(_) if options.per_image_budget.is_some_and(|budget| elapsed > budget) => {
            let budget_ms = options.per_image_budget.map_or(0, |b| b.as_millis() as u64);
            warn!(
                "Job {} ({}) took {:.1}ms, over the {}ms budget",
                job.id,
                job.mask_path.display(),
                elapsed.as_secs_f64() * 1000.0,
                budget_ms
            );
            (BatchStatus::TimedOut { budget_ms }, None)
        }
        Ok(report) => (BatchStatus::Completed, Some(report)),
        Err(e) => {
            warn!("Job {} ({}) failed: {:#}", job.id, job.mask_path.display(), e);
            (BatchStatus::Failed { reason: format!("{:#}", e) }, None)
        }
    };

    BatchOutcome {
        id: job.id,
        mask_path: job.mask_path.clone(),
        elapsed_ms: elapsed.as_secs_f64() * 1000.0,
        status,
        report,
    }
}

/// Runs the worker loop until the job channel is closed.
fn run_worker(
    worker: usize,
    jobs: &Mutex<Receiver<BatchJob>>,
    results: Sender<BatchOutcome>,
    config: &DetectorConfig,
    options: &BatchOptions,
) {
    debug!("Batch worker {} started", worker);

    loop {
        // Hold the lock only while taking the next job
        let next = match jobs.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok(job) = next else {
            // Channel closed, every job was handed out
            break;
        };

        debug!("Batch worker {}: job {} ({})", worker, job.id, job.mask_path.display());
        let outcome = run_job(&job, config, options);
        if results.send(outcome).is_err() {
            break;
        }
    }

    debug!("Batch worker {} finished", worker);
}

/// Analyzes every job on a pool of worker threads.
///
/// Returns one outcome per job, ordered by job id.
pub fn run_batch(jobs: Vec<BatchJob>, config: &DetectorConfig, options: &BatchOptions) -> Vec<BatchOutcome> {
    let total = jobs.len();
    if total == 0 {
        return Vec::new();
    }
    let workers = options.worker_count(total);
    info!("Batch: {} images on {} workers", total, workers);

    let (job_sender, job_receiver) = create_job_queue();
    for job in jobs {
        // The receiver is alive until the scope below ends
        let _ = job_sender.send(job);
    }
    drop(job_sender);

    let job_receiver = Mutex::new(job_receiver);
    let (result_sender, result_receiver) = channel();

    thread::scope(|scope| {
        for worker in 0..workers {
            let results = result_sender.clone();
            let job_receiver = &job_receiver;
            scope.spawn(move || run_worker(worker, job_receiver, results, config, options));
        }
    });
    drop(result_sender);

    let mut outcomes: Vec<BatchOutcome> = result_receiver.into_iter().collect();
    outcomes.sort_by_key(|o| o.id);

    let completed = outcomes
        .iter()
        .filter(|o| o.status == BatchStatus::Completed)
        .count();
    info!("Batch finished: {}/{} completed", completed, total);

    outcomes
}
