// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Outbound notifications fired after a preview is deployed.

pub mod github;
pub mod slack;

use crate::error::Result;
use crate::preview::naming::short_sha;
use crate::preview::PreviewConfig;
use async_trait::async_trait;

pub use github::GitHubCommenter;
pub use slack::{SlackConfig, SlackNotifier};

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    async fn send(&self, config: &PreviewConfig, text: &str) -> Result<()>;
}

/// Pull request details carried along for the notification text
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequestInfo {
    pub html_url: String,
    pub head_ref: String,
    pub title: String,
}

pub fn preview_message(config: &PreviewConfig, pr: &PullRequestInfo, created: bool) -> String {
    let mut lines = vec![
        format!(
            "Preview {} for {}#{}",
            if created { "deployed" } else { "updated" },
            config.repo_full_name,
            config.pr_number
        ),
        format!("URL: https://{}{}", config.route_host, config.route_path),
        format!("Image: {}", config.image_ref),
    ];
    if !pr.head_ref.is_empty() {
        lines.push(format!("Branch: {}", pr.head_ref));
    }
    if !config.head_sha.is_empty() {
        lines.push(format!("SHA: {}", short_sha(&config.head_sha)));
    }
    if !pr.title.trim().is_empty() {
        lines.push(format!("Title: {}", pr.title.trim()));
    }
    if !pr.html_url.is_empty() {
        lines.push(format!("Pull request: {}", pr.html_url));
    }
    lines.join("\n")
}
