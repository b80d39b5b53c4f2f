//! Bounded job queue feeding a fixed pool of worker tasks.
//!
//! A submission first reserves a queue slot and only then creates the job
//! record, so a rejected submission leaves no trace in the store.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{error, info};
use uuid::Uuid;

use crate::jobs::manager::JobManager;
use crate::jobs::models::JobInputs;
use crate::jobs::pipeline::Pipeline;

#[derive(Debug, Error, PartialEq)]
pub enum QueueError {
    #[error("Job queue is full, try again later")]
    Full,

    #[error("Job queue is shutting down")]
    Closed,
}

struct QueuedJob {
    id: Uuid,
    inputs: JobInputs,
}

#[derive(Clone)]
pub struct JobQueue {
    sender: Arc<Mutex<Option<mpsc::Sender<QueuedJob>>>>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    jobs: JobManager,
}

impl JobQueue {
    /// Spawns `workers` worker tasks reading from a queue of `capacity` slots.
    pub fn start(pipeline: Arc<Pipeline>, jobs: JobManager, workers: usize, capacity: usize) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let handles = (0..workers.max(1))
            .map(|n| {
                tokio::spawn(worker_loop(
                    n,
                    Arc::clone(&receiver),
                    Arc::clone(&pipeline),
                    jobs.clone(),
                ))
            })
            .collect();

        info!("Job queue started: {} worker(s), capacity {}", workers.max(1), capacity.max(1));

        Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            workers: Arc::new(Mutex::new(handles)),
            jobs,
        }
    }

    /// Creates a job record and enqueues it. Returns the new job id.
    pub async fn submit(&self, inputs: JobInputs) -> Result<Uuid, QueueError> {
        let guard = self.sender.lock().await;
        let sender = guard.as_ref().ok_or(QueueError::Closed)?;

        let permit = sender.try_reserve().map_err(|e| match e {
            TrySendError::Full(()) => QueueError::Full,
            TrySendError::Closed(()) => QueueError::Closed,
        })?;

        let id = self.jobs.create().await;
        permit.send(QueuedJob { id, inputs });
        info!("Job {id} queued ({} tracked)", self.jobs.len().await);
        Ok(id)
    }

    /// Stops accepting jobs, lets workers drain what is already queued, and
    /// waits for them to exit.
    pub async fn shutdown(&self) {
        self.sender.lock().await.take();

        let handles = std::mem::take(&mut *self.workers.lock().await);
        for handle in handles {
            if let Err(e) = handle.await {
                error!("Job worker ended abnormally: {e}");
            }
        }
        info!("Job queue drained");
    }
}

async fn worker_loop(
    worker: usize,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    pipeline: Arc<Pipeline>,
    jobs: JobManager,
) {
    loop {
        let next = receiver.lock().await.recv().await;
        let Some(QueuedJob { id, inputs }) = next else {
            break;
        };

        // Run on its own task so a panic fails the job instead of killing the worker.
        let run = {
            let pipeline = Arc::clone(&pipeline);
            let jobs = jobs.clone();
            tokio::spawn(async move { pipeline.execute(&jobs, id, inputs).await })
        };

        if let Err(e) = run.await {
            error!("Worker {worker}: job {id} panicked: {e}");
            let finished = jobs
                .get(id)
                .await
                .is_some_and(|record| record.status.is_terminal());
            if !finished {
                if let Err(e) = jobs.fail(id, format!("Internal error: {e}")).await {
                    error!("Worker {worker}: job {id} could not be marked failed: {e}");
                }
            }
        }
    }
    info!("Worker {worker} stopped");
}
