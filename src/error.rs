// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("Failed to render preview config: {0}")]
    RenderError(String),

    #[error("Failed to apply {kind}: {source}")]
    ApplyError {
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("Failed to delete {kind}: {source}")]
    DeleteError {
        kind: &'static str,
        #[source]
        source: kube::Error,
    },

    #[error("Namespace operation failed: {0}")]
    NamespaceError(String),

    #[error("Job queue is full")]
    QueueFull,

    #[error("Job queue is closed")]
    QueueClosed,

    #[error("Image build failed: {0}")]
    BuildError(String),

    #[error("Notification failed: {0}")]
    NotifyError(String),

    #[error("Invalid app mapping: {0}")]
    MappingError(String),

    #[error("{stage} timed out after {}s", .timeout.as_secs())]
    Timeout {
        stage: &'static str,
        timeout: Duration,
    },
}

pub type Result<T> = std::result::Result<T, PreviewError>;
