// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! HTTP surface: the GitHub webhook receiver and health endpoints.

pub mod events;
pub mod signature;

use crate::config::Config;
use crate::constants::webhook::{
    EVENT_HEADER, MAX_BODY_BYTES, PULL_REQUEST_EVENT, SIGNATURE_HEADER,
};
use crate::error::PreviewError;
use crate::jobs::JobQueue;
use crate::preview::MappingFile;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use events::{job_for_event, PullRequestEvent};
use signature::verify_signature;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub config: Arc<Config>,
    pub mapping: Arc<MappingFile>,
    /// Fired once shutdown starts; readiness drops before the queue drains
    pub shutdown: CancellationToken,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook/github", post(github_webhook))
        .route("/healthz", get(|| async { "ok" }))
        .route("/readyz", get(readyz))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Serve until `shutdown` fires, then finish in-flight requests
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    info!("Webhook server listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

async fn readyz(State(state): State<AppState>) -> (StatusCode, &'static str) {
    if state.shutdown.is_cancelled() {
        (StatusCode::SERVICE_UNAVAILABLE, "shutting down")
    } else if state.queue.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, "queue closed")
    } else {
        (StatusCode::OK, "ok")
    }
}

async fn github_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, String) {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    if !verify_signature(&state.config.webhook_secret, &body, header(SIGNATURE_HEADER)) {
        warn!("Rejected webhook delivery with invalid signature");
        return (StatusCode::UNAUTHORIZED, "invalid signature".to_string());
    }

    let event_type = header(EVENT_HEADER).unwrap_or_default();
    if event_type != PULL_REQUEST_EVENT {
        debug!("Ignoring {} event", event_type);
        return (StatusCode::ACCEPTED, "ignored".to_string());
    }

    let event = match PullRequestEvent::parse(&body) {
        Ok(event) => event,
        Err(e) => return (StatusCode::BAD_REQUEST, e),
    };
    let repo = event.repository.full_name.as_str();
    let pr = event.pull_request.number;

    if !state.config.org_allowed(repo) {
        warn!("Repository {} is not in an allowed org", repo);
        return (StatusCode::FORBIDDEN, "organization not allowed".to_string());
    }

    let Some(app) = state.mapping.get(repo) else {
        info!("No app mapped for {}, ignoring", repo);
        return (StatusCode::ACCEPTED, "repository not mapped".to_string());
    };

    let job = match job_for_event(&event, &state.config.preview, app, state.config.build.as_ref()) {
        Ok(Some(job)) => job,
        Ok(None) => return (StatusCode::ACCEPTED, "no action".to_string()),
        Err(e) => {
            error!("Failed to resolve preview for {}#{}: {}", repo, pr, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string());
        }
    };

    let action = job.action;
    match state.queue.try_enqueue(job) {
        Ok(()) => {
            info!("Queued {} for {}#{}", action, repo, pr);
            (StatusCode::ACCEPTED, "queued".to_string())
        }
        Err(e @ (PreviewError::QueueFull | PreviewError::QueueClosed)) => {
            warn!("Dropping {} for {}#{}: {}", action, repo, pr, e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string())
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}
