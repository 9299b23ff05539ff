// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Pull request comments through the GitHub REST API.

use crate::constants::USER_AGENT;
use crate::error::{PreviewError, Result};
use crate::notify::Notifier;
use crate::preview::PreviewConfig;
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

pub struct GitHubCommenter {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GitHubCommenter {
    pub fn new(token: &str, api_url: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PreviewError::NotifyError(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn comments_url(&self, repo_full_name: &str, pr_number: u64) -> Result<String> {
        let (owner, repo) = repo_full_name
            .split_once('/')
            .filter(|(owner, repo)| !owner.is_empty() && !repo.is_empty() && !repo.contains('/'))
            .ok_or_else(|| {
                PreviewError::NotifyError(format!("invalid repository name {:?}", repo_full_name))
            })?;
        if pr_number == 0 {
            return Err(PreviewError::NotifyError("invalid pr number 0".to_string()));
        }
        Ok(format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_url, owner, repo, pr_number
        ))
    }
}

#[async_trait]
impl Notifier for GitHubCommenter {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn send(&self, config: &PreviewConfig, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(PreviewError::NotifyError("comment body is empty".to_string()));
        }
        let url = self.comments_url(&config.repo_full_name, config.pr_number)?;

        let resp = self
            .http
            .post(&url)
            .header(reqwest::header::ACCEPT, "application/vnd.github+json")
            .bearer_auth(&self.token)
            .json(&json!({ "body": text }))
            .send()
            .await
            .map_err(|e| PreviewError::NotifyError(format!("comment request failed: {}", e)))?;

        let status = resp.status();
        if status != reqwest::StatusCode::CREATED {
            let body = resp.text().await.unwrap_or_default();
            return Err(PreviewError::NotifyError(format!(
                "comment failed: status={} body={}",
                status.as_u16(),
                body.trim()
            )));
        }

        debug!(
            "Commented on {}#{}",
            config.repo_full_name, config.pr_number
        );
        Ok(())
    }
}
