//! Background job dispatch with bounded concurrency.

use std::sync::Arc;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::pipeline::Pipeline;
use crate::request::JobRequest;

/// Submission side of the job queue.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    tx: mpsc::Sender<JobRequest>,
}

impl Dispatcher {
    /// Create a dispatcher and the receiver that workers drain.
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<JobRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    /// Queue a whole batch without waiting; either every job is queued or none.
    ///
    /// Returns the number of jobs queued.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::QueueFull`] if the free slots cannot hold the
    /// batch, and [`PipelineError::DispatcherClosed`] once the workers are gone.
    pub fn try_submit_all(&self, jobs: Vec<JobRequest>) -> Result<usize, PipelineError> {
        let requested = jobs.len();
        if requested == 0 {
            return Ok(0);
        }
        let permits = self.tx.try_reserve_many(requested).map_err(|e| match e {
            TrySendError::Full(()) => {
                PipelineError::QueueFull { requested, available: self.tx.capacity() }
            }
            TrySendError::Closed(()) => PipelineError::DispatcherClosed,
        })?;
        for (permit, job) in permits.zip(jobs) {
            permit.send(job);
        }
        Ok(requested)
    }
}

/// Drain `rx`, running at most `workers` jobs at once.
///
/// The supervisor ends when every [`Dispatcher`] clone has been dropped.
pub fn spawn_workers(
    mut rx: mpsc::Receiver<JobRequest>,
    pipeline: Arc<Pipeline>,
    workers: usize,
) -> JoinHandle<()> {
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    tokio::spawn(async move {
        while let Some(request) = rx.recv().await {
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move {
                let _permit = permit;
                match pipeline.run(&request).await {
                    Ok(report) => info!(
                        job_id = %report.job_id,
                        saved = report.saved.len(),
                        "Background job completed"
                    ),
                    Err(e) => error!(category = ?request.category, error = %e, "Background job failed"),
                }
            });
        }
        info!("Dispatcher queue closed");
    })
}
