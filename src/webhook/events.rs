// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! `pull_request` webhook payload and its translation into a job.

use crate::build::BuildConfig;
use crate::config::PreviewSettings;
use crate::error::Result;
use crate::jobs::{PreviewAction, PreviewJob};
use crate::notify::PullRequestInfo;
use crate::preview::{resolve_preview_config, AppMapping};
use serde::Deserialize;
use tracing::debug;

/// The parts of a GitHub `pull_request` event previews care about
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequestEvent {
    #[serde(default)]
    pub action: String,
    pub repository: Repository,
    pub pull_request: PullRequest,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    pub full_name: String,
    #[serde(default)]
    pub clone_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub merged: bool,
    #[serde(default)]
    pub head: Head,
    #[serde(default)]
    pub html_url: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Head {
    #[serde(default)]
    pub sha: String,
    #[serde(default, rename = "ref")]
    pub ref_: String,
}

impl PullRequestEvent {
    /// Parse and sanity-check a delivery body
    pub fn parse(body: &[u8]) -> std::result::Result<Self, String> {
        let event: PullRequestEvent =
            serde_json::from_slice(body).map_err(|e| format!("invalid payload: {}", e))?;
        if event.repository.full_name.is_empty() {
            return Err("repository.full_name is missing".to_string());
        }
        if event.pull_request.number == 0 {
            return Err("pull_request.number is missing".to_string());
        }
        Ok(event)
    }
}

/// Build the job for an event, or `None` when the event needs no work
pub fn job_for_event(
    event: &PullRequestEvent,
    settings: &PreviewSettings,
    app: &AppMapping,
    build: Option<&BuildConfig>,
) -> Result<Option<PreviewJob>> {
    let Some(action) = PreviewAction::from_github(&event.action) else {
        debug!("Ignoring pull_request action {}", event.action);
        return Ok(None);
    };
    if action == PreviewAction::Closed && event.pull_request.merged && settings.keep_on_merge {
        debug!(
            "Keeping preview of merged {}#{}",
            event.repository.full_name, event.pull_request.number
        );
        return Ok(None);
    }

    let pr = &event.pull_request;
    let config = resolve_preview_config(
        settings,
        app,
        &event.repository.full_name,
        pr.number,
        &pr.head.sha,
    )?;

    let build = build.filter(|_| action.is_upsert() && !event.repository.clone_url.is_empty());
    Ok(Some(PreviewJob {
        action,
        config,
        pull_request: PullRequestInfo {
            html_url: pr.html_url.clone(),
            head_ref: pr.head.ref_.clone(),
            title: pr.title.clone(),
        },
        clone_url: build.map(|_| event.repository.clone_url.clone()),
        build: build.cloned(),
        namespace_mode: settings.namespace_mode,
    }))
}
