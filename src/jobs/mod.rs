// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bounded job queue between the webhook and the workers.

pub mod locks;
pub mod processor;
pub mod worker;

use crate::build::BuildConfig;
use crate::error::{PreviewError, Result};
use crate::notify::PullRequestInfo;
use crate::preview::{NamespaceMode, PreviewConfig};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;

pub use locks::IdentityLocks;
pub use processor::JobProcessor;
pub use worker::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreviewAction {
    Opened,
    Reopened,
    Synchronize,
    Closed,
}

impl PreviewAction {
    /// Map a `pull_request` webhook action. Actions that never change a
    /// preview (labeled, edited, ...) map to `None`.
    pub fn from_github(action: &str) -> Option<Self> {
        match action {
            "opened" => Some(PreviewAction::Opened),
            "reopened" => Some(PreviewAction::Reopened),
            "synchronize" => Some(PreviewAction::Synchronize),
            "closed" => Some(PreviewAction::Closed),
            _ => None,
        }
    }

    pub fn is_upsert(self) -> bool {
        self != PreviewAction::Closed
    }
}

impl fmt::Display for PreviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PreviewAction::Opened => "opened",
            PreviewAction::Reopened => "reopened",
            PreviewAction::Synchronize => "synchronize",
            PreviewAction::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// One unit of work for a worker
#[derive(Debug, Clone)]
pub struct PreviewJob {
    pub action: PreviewAction,
    pub config: PreviewConfig,
    pub pull_request: PullRequestInfo,
    pub clone_url: Option<String>,
    /// Build settings when the image must be built before deploying
    pub build: Option<BuildConfig>,
    /// Decides on delete whether the namespace goes too
    pub namespace_mode: NamespaceMode,
}

/// Sending half of the job queue. Enqueueing never waits.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<PreviewJob>,
}

impl JobQueue {
    pub fn try_enqueue(&self, job: PreviewJob) -> Result<()> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(PreviewError::QueueFull),
            Err(TrySendError::Closed(_)) => Err(PreviewError::QueueClosed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving half, shared by all workers
#[derive(Clone)]
pub struct JobReceiver {
    rx: Arc<Mutex<mpsc::Receiver<PreviewJob>>>,
}

impl JobReceiver {
    /// Next job, or `None` once every `JobQueue` is dropped and the queue is drained
    pub async fn recv(&self) -> Option<PreviewJob> {
        self.rx.lock().await.recv().await
    }
}

pub fn channel(capacity: usize) -> (JobQueue, JobReceiver) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        JobQueue { tx },
        JobReceiver {
            rx: Arc::new(Mutex::new(rx)),
        },
    )
}
