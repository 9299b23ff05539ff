// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Fixed-size pool of workers draining the job queue.

use crate::jobs::{JobProcessor, JobReceiver};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `workers` tasks. Each exits once the queue is closed and empty.
    pub fn spawn(workers: usize, receiver: JobReceiver, processor: Arc<JobProcessor>) -> Self {
        let handles = (0..workers)
            .map(|id| {
                let receiver = receiver.clone();
                let processor = processor.clone();
                tokio::spawn(async move {
                    debug!("Worker {} started", id);
                    while let Some(job) = receiver.recv().await {
                        let action = job.action;
                        let repo = job.config.repo_full_name.clone();
                        let pr = job.config.pr_number;

                        match processor.process(job).await {
                            Ok(()) => info!("Job {} for {}#{} done", action, repo, pr),
                            Err(e) => error!("Job {} for {}#{} failed: {}", action, repo, pr, e),
                        }
                    }
                    debug!("Worker {} stopped", id);
                })
            })
            .collect();

        info!("Started {} preview workers", workers);
        Self { handles }
    }

    /// Wait for the workers to drain the queue, aborting them after `grace`.
    /// Returns false when workers had to be aborted.
    pub async fn shutdown(self, grace: Duration) -> bool {
        let aborts: Vec<_> = self.handles.iter().map(|h| h.abort_handle()).collect();

        match tokio::time::timeout(grace, join_all(self.handles)).await {
            Ok(_) => {
                info!("All workers finished");
                true
            }
            Err(_) => {
                warn!(
                    "Workers still busy after {}s, aborting",
                    grace.as_secs()
                );
                aborts.iter().for_each(|h| h.abort());
                false
            }
        }
    }
}
